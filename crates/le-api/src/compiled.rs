use std::sync::Arc;

use dashmap::DashMap;
use le_compiler::compile_thunk;
use le_core::{EngineError, Form, IsolationMode, RuntimeError};
use le_runtime::{invoke, Closure, Overlay, Value};
use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::bindings::BindingSet;
use crate::context::ScriptContext;
use crate::engine::LispEngine;

/// Source read once and wrapped as `(fn [] ...)`.
///
/// The function is compiled at most once per namespace: a single cell for
/// shared namespaces, a map keyed by namespace id under per-context isolation.
pub struct CompiledScript {
    engine: LispEngine,
    forms: Vec<Form>,
    single: OnceCell<Arc<Closure>>,
    per_namespace: DashMap<u64, Arc<Closure>>,
}

impl CompiledScript {
    pub(crate) fn new(engine: LispEngine, forms: Vec<Form>) -> Self {
        let script = Self {
            engine,
            forms,
            single: OnceCell::new(),
            per_namespace: DashMap::new(),
        };
        let context = script.engine.context();
        let eager = script
            .engine
            .with_overlay(&context, None, |overlay| Ok(script.closure_for(overlay)?));
        if let Err(error) = eager {
            debug!(%error, "eager compile failed; retrying on first eval");
        }
        script
    }

    pub fn engine(&self) -> &LispEngine {
        &self.engine
    }

    /// Number of namespaces this script has been compiled for.
    pub fn compiled_count(&self) -> usize {
        self.per_namespace.len() + usize::from(self.single.get().is_some())
    }

    pub fn eval(&self) -> Result<Value, EngineError> {
        self.run(&self.engine.context(), None)
    }

    pub fn eval_with_bindings(&self, bindings: &BindingSet) -> Result<Value, EngineError> {
        self.run(&self.engine.context(), Some(bindings))
    }

    pub fn eval_in_context(&self, context: &ScriptContext) -> Result<Value, EngineError> {
        self.run(context, None)
    }

    fn run(
        &self,
        context: &ScriptContext,
        bindings: Option<&BindingSet>,
    ) -> Result<Value, EngineError> {
        self.engine.with_overlay(context, bindings, |overlay| {
            let closure = self.closure_for(overlay)?;
            Ok(invoke(&Value::Fn(closure), &[], overlay)?)
        })
    }

    fn closure_for(&self, overlay: &Overlay) -> Result<Arc<Closure>, RuntimeError> {
        if self.engine.isolation() != IsolationMode::PerScriptingContext {
            return self
                .single
                .get_or_try_init(|| compile_thunk(&self.forms, overlay))
                .cloned();
        }
        let id = overlay.namespace().id();
        if let Some(cached) = self.per_namespace.get(&id) {
            trace!(namespace = overlay.namespace().name(), "compiled script cache hit");
            return Ok(cached.value().clone());
        }
        debug!(namespace = overlay.namespace().name(), "compiling script for namespace");
        self.per_namespace
            .entry(id)
            .or_try_insert_with(|| compile_thunk(&self.forms, overlay))
            .map(|entry| entry.value().clone())
    }
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("forms", &self.forms.len())
            .field("compiled", &self.compiled_count())
            .finish()
    }
}
