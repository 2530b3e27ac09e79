use std::collections::BTreeMap;
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::Value;

use baton_core::error::{BatonError, Result};
use baton_core::traits::OutputSink;

/// In-memory output sink.
#[derive(Default)]
pub struct MemorySink {
    outputs: Mutex<BTreeMap<String, Value>>,
    saved: Mutex<BTreeMap<String, String>>,
    fail_prepare: bool,
    fail_writes: bool,
    prepared: Mutex<bool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `prepare` fails, as an unwritable workspace would.
    pub fn failing_prepare() -> Self {
        Self {
            fail_prepare: true,
            ..Self::default()
        }
    }

    /// A sink that prepares fine but rejects every write.
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn is_prepared(&self) -> bool {
        *self.prepared.lock().unwrap()
    }

    /// Payload written for `step`, if any.
    pub fn output(&self, step: &str) -> Option<Value> {
        self.outputs.lock().unwrap().get(step).cloned()
    }

    /// Names of steps with a written payload, sorted.
    pub fn output_steps(&self) -> Vec<String> {
        self.outputs.lock().unwrap().keys().cloned().collect()
    }

    /// Content saved under `file_name`, if any.
    pub fn saved(&self, file_name: &str) -> Option<String> {
        self.saved.lock().unwrap().get(file_name).cloned()
    }
}

impl OutputSink for MemorySink {
    fn prepare(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.fail_prepare {
                return Err(BatonError::Workspace("memory sink refused to prepare".into()));
            }
            *self.prepared.lock().unwrap() = true;
            Ok(())
        })
    }

    fn write_output<'a>(
        &'a self,
        step: &'a str,
        payload: &'a Value,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if self.fail_writes {
                return Err(BatonError::Workspace(format!("cannot write output for {}", step)));
            }
            self.outputs
                .lock()
                .unwrap()
                .insert(step.to_string(), payload.clone());
            Ok(format!("mem://outputs/{}", step))
        })
    }

    fn save<'a>(&'a self, file_name: &'a str, content: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if self.fail_writes {
                return Err(BatonError::Workspace(format!("cannot save {}", file_name)));
            }
            self.saved
                .lock()
                .unwrap()
                .insert(file_name.to_string(), content.to_string());
            Ok(format!("mem://{}", file_name))
        })
    }

    fn location(&self) -> String {
        "mem://".to_string()
    }
}
