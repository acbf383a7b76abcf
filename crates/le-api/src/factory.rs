use std::sync::Arc;

use le_core::{EngineConfig, IsolationMode};
use le_runtime::{Namespace, NamespaceRegistry, Value};
use tracing::info;

use crate::engine::LispEngine;

pub const ENGINE_NAME: &str = "lisp-engine";
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const LANGUAGE_NAME: &str = "Lisp";
pub const LANGUAGE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAMES: &[&str] = &["lisp-engine", "lisp", "Lisp"];
pub const EXTENSIONS: &[&str] = &["lisp", "lsp"];
pub const MIME_TYPES: &[&str] = &["application/x-lisp", "text/x-lisp"];
pub const THREADING: &str = "MULTITHREADED";

pub const PARAM_ENGINE: &str = "engine";
pub const PARAM_ENGINE_VERSION: &str = "engine-version";
pub const PARAM_NAME: &str = "name";
pub const PARAM_LANGUAGE: &str = "language";
pub const PARAM_LANGUAGE_VERSION: &str = "language-version";
pub const PARAM_THREADING: &str = "threading";

/// Owns the namespace registry shared by every engine it creates.
#[derive(Clone)]
pub struct EngineFactory {
    inner: Arc<FactoryInner>,
}

struct FactoryInner {
    config: EngineConfig,
    isolation: IsolationMode,
    template: String,
    registry: Arc<NamespaceRegistry>,
    forced: Option<Arc<Namespace>>,
}

impl EngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        let isolation = config.isolation_mode();
        let template = config.effective_template().into_owned();
        let registry = Arc::new(NamespaceRegistry::new());
        let forced =
            (isolation == IsolationMode::Forced).then(|| registry.create_unique(&template));
        info!(
            isolation = ?isolation,
            template = %template,
            "engine factory ready"
        );
        Self {
            inner: Arc::new(FactoryInner {
                config,
                isolation,
                template,
                registry,
                forced,
            }),
        }
    }

    pub fn from_env() -> Self {
        Self::new(EngineConfig::from_env())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn isolation(&self) -> IsolationMode {
        self.inner.isolation
    }

    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.inner.registry
    }

    pub fn namespace_key(&self) -> &str {
        &self.inner.config.namespace_key
    }

    pub(crate) fn forced_namespace(&self) -> Option<&Arc<Namespace>> {
        self.inner.forced.as_ref()
    }

    pub(crate) fn create_namespace(&self) -> Arc<Namespace> {
        self.inner.registry.create_unique(&self.inner.template)
    }

    pub fn script_engine(&self) -> LispEngine {
        LispEngine::new(self.clone())
    }

    pub fn engine_name(&self) -> &'static str {
        ENGINE_NAME
    }

    pub fn engine_version(&self) -> &'static str {
        ENGINE_VERSION
    }

    pub fn language_name(&self) -> &'static str {
        LANGUAGE_NAME
    }

    pub fn language_version(&self) -> &'static str {
        LANGUAGE_VERSION
    }

    pub fn names(&self) -> &'static [&'static str] {
        NAMES
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    pub fn mime_types(&self) -> &'static [&'static str] {
        MIME_TYPES
    }

    pub fn parameter(&self, key: &str) -> Option<&'static str> {
        match key {
            PARAM_ENGINE => Some(ENGINE_NAME),
            PARAM_ENGINE_VERSION => Some(ENGINE_VERSION),
            PARAM_NAME => Some(NAMES[0]),
            PARAM_LANGUAGE => Some(LANGUAGE_NAME),
            PARAM_LANGUAGE_VERSION => Some(LANGUAGE_VERSION),
            PARAM_THREADING => Some(THREADING),
            _ => None,
        }
    }

    pub fn method_call_syntax(&self, receiver: &str, method: &str, args: &[&str]) -> String {
        let mut parts = vec![method, receiver];
        parts.extend_from_slice(args);
        format!("({})", parts.join(" "))
    }

    pub fn output_statement(&self, text: &str) -> String {
        format!("(println {})", Value::string(text))
    }

    pub fn program(&self, statements: &[&str]) -> String {
        let mut parts = vec!["do"];
        parts.extend_from_slice(statements);
        format!("({})", parts.join(" "))
    }
}

impl Default for EngineFactory {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for EngineFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineFactory")
            .field("config", &self.inner.config)
            .field("isolation", &self.inner.isolation)
            .finish()
    }
}
