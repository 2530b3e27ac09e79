use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;

use baton_core::error::{BatonError, Result};
use baton_core::traits::ToolAdapter;
use baton_core::types::{ToolOutput, ToolRequest};

#[derive(Debug, Clone)]
enum Reply {
    /// Succeed with the task text as stdout.
    Echo,
    Output(ToolOutput),
    SpawnError(String),
}

/// Scripted tool adapter.
///
/// Replies are consumed in order; once the script runs out the fallback
/// reply repeats. The default fallback echoes the task back as stdout.
pub struct MockTool {
    name: String,
    default_model: String,
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    delay: Option<Duration>,
    calls: Mutex<Vec<ToolRequest>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default_model: "mock-model".to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: Reply::Echo,
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Always succeed with `stdout`.
    pub fn with_output(mut self, stdout: &str) -> Self {
        self.fallback = Reply::Output(ToolOutput::success(stdout));
        self
    }

    /// Succeed with each of `outputs` in turn.
    pub fn with_outputs(self, outputs: &[&str]) -> Self {
        self.script
            .lock()
            .unwrap()
            .extend(outputs.iter().map(|o| Reply::Output(ToolOutput::success(*o))));
        self
    }

    /// Always exit non-zero.
    pub fn failing(mut self, exit_code: i32, stderr: &str) -> Self {
        self.fallback = Reply::Output(ToolOutput::failure(exit_code, stderr));
        self
    }

    /// Always fail to start.
    pub fn unspawnable(mut self, message: &str) -> Self {
        self.fallback = Reply::SpawnError(message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_default_model(mut self, model: &str) -> Self {
        self.default_model = model.to_string();
        self
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<ToolRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of invocations observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl ToolAdapter for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn invoke(&self, request: ToolRequest) -> BoxFuture<'_, Result<ToolOutput>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request.clone());
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let reply = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            match reply {
                Reply::Echo => Ok(ToolOutput::success(request.task)),
                Reply::Output(output) => Ok(output),
                Reply::SpawnError(message) => Err(BatonError::ExecFailed {
                    tool: self.name.clone(),
                    message,
                }),
            }
        })
    }
}
