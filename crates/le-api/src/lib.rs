mod bindings;
mod compiled;
mod context;
mod engine;
mod factory;
mod invocation;
mod overlay_builder;
mod proxy;

pub use bindings::{
    is_reserved_key, BindingSet, Scope, ENGINE_SCOPE, GLOBAL_SCOPE, RESERVED_KEY_PREFIX,
};
pub use compiled::CompiledScript;
pub use context::ScriptContext;
pub use engine::LispEngine;
pub use factory::{
    EngineFactory, ENGINE_NAME, ENGINE_VERSION, EXTENSIONS, LANGUAGE_NAME, LANGUAGE_VERSION,
    MIME_TYPES, NAMES, PARAM_ENGINE, PARAM_ENGINE_VERSION, PARAM_LANGUAGE,
    PARAM_LANGUAGE_VERSION, PARAM_NAME, PARAM_THREADING, THREADING,
};
pub use overlay_builder::merge;
pub use proxy::{CapabilitySet, DispatchProxy};

pub use le_core::{EngineConfig, EngineError, IsolationMode, RuntimeError};
pub use le_runtime::{CaptureBuffer, Overlay, SharedReader, SharedWriter, Value};
