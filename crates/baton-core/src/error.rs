use thiserror::Error;

use crate::envelope::ErrorCode;

#[derive(Debug, Error)]
pub enum BatonError {
    // Run setup errors
    #[error("Required input not supplied: {0}")]
    MissingInput(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    // Step errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ExecFailed { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("No usable sources for step {0}")]
    SourcesMissing(String),

    #[error("Step {step} failed: {code}: {message}")]
    StepFailed {
        step: String,
        code: ErrorCode,
        message: String,
    },

    // Bundle errors
    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("Bundle not found: {0}")]
    BundleNotFound(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BatonError {
    /// Envelope error code used when this error is recorded against a step.
    pub fn code(&self) -> ErrorCode {
        match self {
            BatonError::MissingInput(_) => ErrorCode::MissingInput,
            BatonError::Workspace(_) | BatonError::Io(_) => ErrorCode::WorkspaceError,
            BatonError::ToolNotFound(_) => ErrorCode::ToolNotFound,
            BatonError::ExecFailed { .. } | BatonError::ToolTimeout { .. } => ErrorCode::ExecFailed,
            BatonError::SourcesMissing(_) => ErrorCode::SourcesMissing,
            BatonError::StepFailed { code, .. } => *code,
            BatonError::InvalidBundle(_)
            | BatonError::BundleNotFound(_)
            | BatonError::Config(_)
            | BatonError::ConfigNotFound(_)
            | BatonError::Json(_) => ErrorCode::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, BatonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            BatonError::MissingInput("task".into()).code(),
            ErrorCode::MissingInput
        );
        assert_eq!(
            BatonError::ToolTimeout {
                tool: "claude".into(),
                timeout_secs: 5
            }
            .code(),
            ErrorCode::ExecFailed
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(BatonError::from(io).code(), ErrorCode::WorkspaceError);
    }

    #[test]
    fn test_step_failed_keeps_code() {
        let err = BatonError::StepFailed {
            step: "review".into(),
            code: ErrorCode::NoConsensus,
            message: "sources disagree".into(),
        };
        assert_eq!(err.code(), ErrorCode::NoConsensus);
        assert_eq!(
            err.to_string(),
            "Step review failed: NO_CONSENSUS: sources disagree"
        );
    }
}
