use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{ToolOutput, ToolRequest};

/// External tool adapter. One blocking invocation per call.
pub trait ToolAdapter: Send + Sync + 'static {
    /// Tool identifier referenced by bundle steps (e.g., "claude").
    fn name(&self) -> &str;

    /// Model used when a step does not override it.
    fn default_model(&self) -> &str;

    /// Run the tool to completion and capture its output.
    ///
    /// Returns `Err` only when the invocation itself could not happen
    /// (spawn failure, timeout). A process that ran and exited non-zero is
    /// `Ok` with `success == false`.
    fn invoke(&self, request: ToolRequest) -> BoxFuture<'_, Result<ToolOutput>>;
}

/// Persistence for step payloads.
pub trait OutputSink: Send + Sync + 'static {
    /// Prepare storage before the first step runs.
    fn prepare(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Persist a step's payload, returning an opaque reference.
    ///
    /// Distinct step names must map to distinct storage locations.
    fn write_output<'a>(
        &'a self,
        step: &'a str,
        payload: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<String>>;

    /// Persist a named artifact requested by a step's `save` hint.
    fn save<'a>(&'a self, file_name: &'a str, content: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Human-readable location of this sink (e.g., the job directory).
    fn location(&self) -> String;
}
