//! Step result envelopes.
//!
//! Every executed (or skipped) step produces exactly one [`Envelope`]. Envelopes
//! are immutable once built; the only way to obtain one is through the
//! constructors below, which keep two invariants:
//!
//! - a `Failure` envelope always carries an error code and a non-empty message
//! - a `Skipped` envelope never carries an output reference, tool, or result

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BatonError;

/// Outcome of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Partial,
    Failure,
    Skipped,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Partial => "partial",
            Status::Failure => "failure",
            Status::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingInput,
    ToolNotFound,
    ExecFailed,
    SourcesMissing,
    NoConsensus,
    WorkspaceError,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingInput => "MISSING_INPUT",
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::ExecFailed => "EXEC_FAILED",
            ErrorCode::SourcesMissing => "SOURCES_MISSING",
            ErrorCode::NoConsensus => "NO_CONSENSUS",
            ErrorCode::WorkspaceError => "WORKSPACE_ERROR",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error code and message attached to a failed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: ErrorCode,
    pub message: String,
}

/// The result record of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_ref: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    result: Map<String, Value>,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<EnvelopeError>,
}

impl Envelope {
    pub fn success() -> EnvelopeBuilder {
        EnvelopeBuilder::new(Status::Success)
    }

    pub fn partial() -> EnvelopeBuilder {
        EnvelopeBuilder::new(Status::Partial)
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>) -> EnvelopeBuilder {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = code.as_str().to_string();
        }
        let mut builder = EnvelopeBuilder::new(Status::Failure);
        builder.error = Some(EnvelopeError { code, message });
        builder
    }

    /// Failure envelope describing a hard error.
    pub fn from_error(err: &BatonError) -> EnvelopeBuilder {
        Self::failure(err.code(), err.to_string())
    }

    pub fn skipped() -> Self {
        Self {
            status: Status::Skipped,
            tool: None,
            output_ref: None,
            result: Map::new(),
            duration_ms: 0,
            error: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn tool(&self) -> Option<&str> {
        self.tool.as_deref()
    }

    pub fn output_ref(&self) -> Option<&str> {
        self.output_ref.as_deref()
    }

    pub fn result(&self) -> &Map<String, Value> {
        &self.result
    }

    pub fn result_value(&self, key: &str) -> Option<&Value> {
        self.result.get(key)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn error(&self) -> Option<&EnvelopeError> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_failure(&self) -> bool {
        self.status == Status::Failure
    }

    /// The `output` entry of the result mapping as plain text.
    pub fn output_text(&self) -> Option<String> {
        self.result.get("output").map(value_text)
    }
}

/// Render a result value the way templates see it: strings verbatim,
/// everything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builder for non-skipped envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    status: Status,
    tool: Option<String>,
    output_ref: Option<String>,
    result: Map<String, Value>,
    duration_ms: u64,
    error: Option<EnvelopeError>,
}

impl EnvelopeBuilder {
    fn new(status: Status) -> Self {
        Self {
            status,
            tool: None,
            output_ref: None,
            result: Map::new(),
            duration_ms: 0,
            error: None,
        }
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn output_ref(mut self, output_ref: impl Into<String>) -> Self {
        self.output_ref = Some(output_ref.into());
        self
    }

    pub fn result(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.result.insert(key.into(), value.into());
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn build(self) -> Envelope {
        Envelope {
            status: self.status,
            tool: self.tool,
            output_ref: self.output_ref,
            result: self.result,
            duration_ms: self.duration_ms,
            error: self.error,
        }
    }
}
