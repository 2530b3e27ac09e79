use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, info, warn};

use baton_core::bundle::ToolStep;
use baton_core::error::Result;
use baton_core::traits::OutputSink;
use baton_core::types::{ToolOutput, ToolRequest};
use baton_core::{Envelope, ErrorCode};
use baton_tools::ToolRegistry;

use crate::context::Context;

const STDERR_EXCERPT: usize = 500;

/// Runs a single external tool invocation.
pub struct ToolExecutor {
    tools: Arc<ToolRegistry>,
    workdir_input: String,
}

impl ToolExecutor {
    pub fn new(tools: Arc<ToolRegistry>, workdir_input: impl Into<String>) -> Self {
        Self {
            tools,
            workdir_input: workdir_input.into(),
        }
    }

    /// Tools run in the directory named by the configured input, or the
    /// process working directory when that input is absent or empty.
    fn working_dir(&self, ctx: &Context) -> PathBuf {
        match ctx.input(&self.workdir_input) {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Invoke the step's tool and record its output.
    ///
    /// Unknown tools and failed invocations become Failure envelopes. Only a
    /// sink write error is returned as `Err`.
    pub async fn execute(
        &self,
        step: &str,
        spec: &ToolStep,
        save: Option<&str>,
        ctx: &Context,
        sink: &dyn OutputSink,
    ) -> Result<Envelope> {
        let Some(tool) = self.tools.get(&spec.tool) else {
            warn!(step = %step, tool = %spec.tool, "Unknown tool");
            return Ok(Envelope::failure(
                ErrorCode::ToolNotFound,
                format!("Unknown tool: {}", spec.tool),
            )
            .tool(&spec.tool)
            .build());
        };

        let task = ctx.resolve(&spec.task);
        let model = match &spec.model {
            Some(model) if !model.trim().is_empty() => ctx.resolve(model),
            _ => tool.default_model().to_string(),
        };
        let working_dir = self.working_dir(ctx);
        debug!(step = %step, tool = %spec.tool, model = %model, task = %task, "Invoking tool");

        let start = Instant::now();
        let invocation = tool
            .invoke(ToolRequest {
                task,
                model: model.clone(),
                working_dir,
            })
            .await;
        let elapsed = start.elapsed();

        let output = match invocation {
            Ok(output) => output,
            Err(e) => {
                warn!(step = %step, tool = %spec.tool, error = %e, "Tool invocation failed");
                return Ok(Envelope::failure(ErrorCode::ExecFailed, e.to_string())
                    .tool(&spec.tool)
                    .duration(elapsed)
                    .build());
            }
        };

        let payload = json!({
            "stdout": output.stdout,
            "stderr": output.stderr,
            "success": output.success,
            "exit_code": output.exit_code,
            "model": model,
        });
        let output_ref = sink.write_output(step, &payload).await?;

        if !output.success {
            let message = failure_message(&output);
            warn!(step = %step, tool = %spec.tool, error = %message, "Tool exited unsuccessfully");
            return Ok(Envelope::failure(ErrorCode::ExecFailed, message)
                .tool(&spec.tool)
                .output_ref(output_ref)
                .duration(elapsed)
                .build());
        }

        let mut builder = Envelope::success()
            .tool(&spec.tool)
            .output_ref(output_ref)
            .duration(elapsed)
            .result("output_length", output.stdout.len())
            .result("output", output.stdout.as_str());
        if let Some(file_name) = save {
            let saved = sink.save(file_name, &output.stdout).await?;
            builder = builder.result("saved", saved);
        }

        info!(
            step = %step,
            tool = %spec.tool,
            duration_ms = elapsed.as_millis() as u64,
            bytes = output.stdout.len(),
            "Tool finished"
        );
        Ok(builder.build())
    }
}

fn failure_message(output: &ToolOutput) -> String {
    let status = match output.exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        return status;
    }
    let excerpt: String = stderr.chars().take(STDERR_EXCERPT).collect();
    format!("{}: {}", status, excerpt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_core::Status;
    use baton_test_utils::{inputs, registry_with, MemorySink, MockTool};

    fn step(tool: &str, task: &str) -> ToolStep {
        ToolStep {
            tool: tool.into(),
            model: None,
            task: task.into(),
        }
    }

    fn executor(tools: &[Arc<MockTool>]) -> ToolExecutor {
        ToolExecutor::new(Arc::new(registry_with(tools)), "codebase")
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let exec = executor(&[]);
        let sink = MemorySink::new();
        let env = exec
            .execute("s", &step("ghost", "x"), None, &Context::default(), &sink)
            .await
            .unwrap();
        assert_eq!(env.status(), Status::Failure);
        assert_eq!(env.error().unwrap().code, ErrorCode::ToolNotFound);
        assert!(sink.output("s").is_none());
    }

    #[tokio::test]
    async fn test_success_records_output() {
        let mock = Arc::new(MockTool::new("echo"));
        let exec = executor(&[mock.clone()]);
        let sink = MemorySink::new();
        let ctx = Context::new(inputs(&[("codebase", "/repo"), ("topic", "locks")]));

        let env = exec
            .execute("ask", &step("echo", "Explain ${inputs.topic}"), None, &ctx, &sink)
            .await
            .unwrap();

        assert!(env.is_success());
        assert_eq!(env.tool(), Some("echo"));
        assert_eq!(env.output_ref(), Some("mem://outputs/ask"));
        assert_eq!(env.output_text().as_deref(), Some("Explain locks"));
        assert_eq!(env.result_value("output_length"), Some(&serde_json::json!(13)));

        let call = &mock.calls()[0];
        assert_eq!(call.task, "Explain locks");
        assert_eq!(call.model, "mock-model");
        assert_eq!(call.working_dir, PathBuf::from("/repo"));

        let payload = sink.output("ask").unwrap();
        assert_eq!(payload["stdout"], "Explain locks");
        assert_eq!(payload["success"], true);
    }

    #[tokio::test]
    async fn test_model_override_and_default_workdir() {
        let mock = Arc::new(MockTool::new("echo"));
        let exec = executor(&[mock.clone()]);
        let spec = ToolStep {
            model: Some("${inputs.model}".into()),
            ..step("echo", "x")
        };
        let ctx = Context::new(inputs(&[("model", "opus")]));

        exec.execute("s", &spec, None, &ctx, &MemorySink::new())
            .await
            .unwrap();
        let call = &mock.calls()[0];
        assert_eq!(call.model, "opus");
        assert_eq!(call.working_dir, std::env::current_dir().unwrap());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_exec_failed() {
        let mock = Arc::new(MockTool::new("bad").failing(2, "boom\n"));
        let exec = executor(&[mock]);
        let sink = MemorySink::new();

        let env = exec
            .execute("s", &step("bad", "x"), None, &Context::default(), &sink)
            .await
            .unwrap();
        let error = env.error().unwrap();
        assert_eq!(error.code, ErrorCode::ExecFailed);
        assert_eq!(error.message, "exit code 2: boom");
        // Output is persisted even for failures.
        assert_eq!(env.output_ref(), Some("mem://outputs/s"));
        assert_eq!(sink.output("s").unwrap()["stderr"], "boom\n");
    }

    #[tokio::test]
    async fn test_spawn_error_is_exec_failed() {
        let mock = Arc::new(MockTool::new("gone").unspawnable("no such file"));
        let env = executor(&[mock])
            .execute("s", &step("gone", "x"), None, &Context::default(), &MemorySink::new())
            .await
            .unwrap();
        assert_eq!(env.error().unwrap().code, ErrorCode::ExecFailed);
        assert!(env.error().unwrap().message.contains("no such file"));
    }

    #[tokio::test]
    async fn test_save_hint() {
        let mock = Arc::new(MockTool::new("echo"));
        let sink = MemorySink::new();
        let env = executor(&[mock])
            .execute("s", &step("echo", "verdict"), Some("out.txt"), &Context::default(), &sink)
            .await
            .unwrap();
        assert_eq!(sink.saved("out.txt").as_deref(), Some("verdict"));
        assert_eq!(env.result_value("saved"), Some(&serde_json::json!("mem://out.txt")));
    }

    #[tokio::test]
    async fn test_sink_error_is_hard_error() {
        let mock = Arc::new(MockTool::new("echo"));
        let err = executor(&[mock])
            .execute("s", &step("echo", "x"), None, &Context::default(), &MemorySink::failing_writes())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::WorkspaceError);
    }
}
