use crate::types::SourceSpan;
use thiserror::Error;

/// Failure raised by the reader, the compiler, the executor or a library function.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct RuntimeError {
    pub code: String,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl RuntimeError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(
        code: impl Into<String>,
        message: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: Some(span),
        }
    }
}

/// Errors surfaced by the host-facing engine API.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Script execution failed: {source}")]
    Execution {
        #[from]
        source: RuntimeError,
    },
    #[error("No callable named \"{name}\".")]
    NotFound { name: String },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Execution { .. } => "EXECUTION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn runtime_error_display_includes_code() {
        let error = RuntimeError::new("EXEC_ARITY", "Wrong number of args.");
        assert_eq!(error.to_string(), "EXEC_ARITY: Wrong number of args.");
    }

    #[test]
    fn execution_error_preserves_cause() {
        let error = EngineError::from(RuntimeError::new("READ_EOF", "eof"));
        let cause = error.source().expect("cause should be kept");
        assert_eq!(cause.to_string(), "READ_EOF: eof");
        assert_eq!(error.kind(), "EXECUTION");
    }

    #[test]
    fn not_found_carries_name() {
        let error = EngineError::not_found("undefined-name");
        assert_eq!(
            error,
            EngineError::NotFound {
                name: "undefined-name".to_string()
            }
        );
        assert!(error.to_string().contains("undefined-name"));
    }
}
