pub mod config;
pub mod error;
pub mod types;

pub use config::{
    EngineConfig, IsolationMode, DEFAULT_NAMESPACE_KEY, DEFAULT_NAMESPACE_TEMPLATE,
    NAMESPACE_PLACEHOLDER,
};
pub use error::{EngineError, RuntimeError};
pub use types::*;
