use std::borrow::Cow;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const DEFAULT_NAMESPACE_TEMPLATE: &str = "lisp.engine.ns-{id}";
pub const DEFAULT_NAMESPACE_KEY: &str = "script.namespace";
pub const NAMESPACE_PLACEHOLDER: &str = "{id}";

pub const ENV_NAMESPACE_TEMPLATE: &str = "LISP_ENGINE_NS_TEMPLATE";
pub const ENV_NAMESPACE_PER_CONTEXT: &str = "LISP_ENGINE_NS_PER_CONTEXT";
pub const ENV_NAMESPACE_KEY: &str = "LISP_ENGINE_NS_KEY";

/// How engines map onto namespaces. Fixed for the lifetime of a factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationMode {
    Forced,
    #[default]
    PerEngine,
    PerScriptingContext,
}

impl FromStr for IsolationMode {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "forced" => Ok(Self::Forced),
            "per-engine" => Ok(Self::PerEngine),
            "per-scripting-context" | "per-context" => Ok(Self::PerScriptingContext),
            other => Err(EngineError::invalid_argument(format!(
                "Unknown isolation mode \"{}\".",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub namespace_template: String,
    /// Only consulted when `isolation` is not set.
    pub per_context: bool,
    pub isolation: Option<IsolationMode>,
    pub namespace_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace_template: DEFAULT_NAMESPACE_TEMPLATE.to_string(),
            per_context: false,
            isolation: None,
            namespace_key: DEFAULT_NAMESPACE_KEY.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = Some(isolation);
        self
    }

    pub fn from_json_str(source: &str) -> Result<Self, EngineError> {
        serde_json::from_str(source).map_err(|error| {
            EngineError::invalid_argument(format!("Invalid engine config: {}", error))
        })
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(template) = lookup(ENV_NAMESPACE_TEMPLATE) {
            config.namespace_template = template;
        }
        if let Some(flag) = lookup(ENV_NAMESPACE_PER_CONTEXT) {
            config.per_context = flag.trim().eq_ignore_ascii_case("true");
        }
        if let Some(key) = lookup(ENV_NAMESPACE_KEY) {
            config.namespace_key = key;
        }
        config
    }

    pub fn template_has_placeholder(&self) -> bool {
        self.namespace_template.contains(NAMESPACE_PLACEHOLDER)
    }

    /// Template used to name new namespaces. Under an isolating mode a
    /// template without a placeholder gets a `-{id}` suffix, so each engine
    /// or context still receives its own namespace.
    pub fn effective_template(&self) -> Cow<'_, str> {
        if self.isolation_mode() == IsolationMode::Forced || self.template_has_placeholder() {
            Cow::Borrowed(&self.namespace_template)
        } else {
            Cow::Owned(format!("{}-{}", self.namespace_template, NAMESPACE_PLACEHOLDER))
        }
    }

    pub fn isolation_mode(&self) -> IsolationMode {
        if let Some(mode) = self.isolation {
            return mode;
        }
        if !self.template_has_placeholder() {
            IsolationMode::Forced
        } else if self.per_context {
            IsolationMode::PerScriptingContext
        } else {
            IsolationMode::PerEngine
        }
    }
}
