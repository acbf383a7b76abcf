use le_api::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{message}")]
    Source { code: &'static str, message: String },
    #[error("{message}")]
    Usage { code: &'static str, message: String },
}

impl CliError {
    pub(crate) fn from_source(code: &'static str, message: impl Into<String>) -> Self {
        Self::Source {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn usage(code: &'static str, message: impl Into<String>) -> Self {
        Self::Usage {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Engine(error) => error.kind(),
            Self::Source { .. } => "SOURCE",
            Self::Usage { .. } => "USAGE",
        }
    }

    pub(crate) fn code(&self) -> Option<&str> {
        match self {
            Self::Engine(EngineError::Execution { source }) => Some(&source.code),
            Self::Engine(_) => None,
            Self::Source { code, .. } | Self::Usage { code, .. } => Some(code),
        }
    }
}

pub(crate) fn map_source_read(error: std::io::Error) -> CliError {
    CliError::from_source("CLI_SOURCE_READ", error.to_string())
}

pub(crate) fn map_source_path(error: std::io::Error) -> CliError {
    CliError::from_source("CLI_SOURCE_PATH", error.to_string())
}

pub(crate) fn map_json_arg(error: serde_json::Error) -> CliError {
    CliError::usage("CLI_JSON_INVALID", error.to_string())
}

pub(crate) fn emit_error(error: CliError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_KIND:{}", error.kind());
    if let Some(code) = error.code() {
        println!("ERROR_CODE:{}", code);
    }
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.to_string()).expect("string json")
    );
    1
}

#[cfg(test)]
mod error_map_tests {
    use super::*;
    use le_api::RuntimeError;

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(CliError::from_source("CLI_SOURCE_EMPTY", "empty"));
        assert_eq!(code, 1);
    }

    #[test]
    fn engine_errors_keep_kind_and_runtime_code() {
        let error = CliError::from(EngineError::from(RuntimeError::new("EXEC_ARITY", "bad")));
        assert_eq!(error.kind(), "EXECUTION");
        assert_eq!(error.code(), Some("EXEC_ARITY"));

        let error = CliError::from(EngineError::not_found("f"));
        assert_eq!(error.kind(), "NOT_FOUND");
        assert_eq!(error.code(), None);
    }

    #[test]
    fn mapping_helpers_keep_error_codes() {
        assert_eq!(map_source_read(std::io::Error::other("read")).code(), Some("CLI_SOURCE_READ"));
        assert_eq!(map_source_path(std::io::Error::other("path")).code(), Some("CLI_SOURCE_PATH"));
        let invalid = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
        assert_eq!(map_json_arg(invalid).kind(), "USAGE");
    }
}
