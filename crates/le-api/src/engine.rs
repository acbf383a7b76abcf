use std::io::Read;
use std::sync::Arc;

use le_core::{EngineError, Form, IsolationMode, RuntimeError};
use le_parser::{read_all, read_from};
use le_runtime::{
    NativeFn, Namespace, Overlay, Value, ERR_VAR, IN_VAR, NS_VAR, OUT_VAR, UNCHECKED_MATH_VAR,
    WARN_ON_REFLECTION_VAR,
};
use parking_lot::RwLock;
use tracing::debug;

use crate::bindings::{BindingSet, Scope};
use crate::compiled::CompiledScript;
use crate::context::{ContextSnapshot, ScriptContext};
use crate::factory::EngineFactory;
use crate::invocation::{invoke_as_method, invoke_positional, resolve_callable};
use crate::overlay_builder::merge;
use crate::proxy::{CapabilitySet, DispatchProxy};

/// Execution context handed out by [`EngineFactory::script_engine`].
///
/// Cloning is cheap and clones share the same namespace and current context.
/// Every call builds one overlay from the ambient vars and the context
/// bindings, runs inside it and drops it on return.
#[derive(Clone)]
pub struct LispEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    factory: EngineFactory,
    namespace: Arc<Namespace>,
    context: RwLock<Arc<ScriptContext>>,
}

impl LispEngine {
    pub(crate) fn new(factory: EngineFactory) -> Self {
        let namespace = match factory.forced_namespace() {
            Some(forced) => forced.clone(),
            None => factory.create_namespace(),
        };
        let context = Arc::new(ScriptContext::new());
        if factory.isolation() == IsolationMode::PerScriptingContext {
            context.put(factory.namespace_key(), Value::Namespace(namespace.clone()));
        }
        debug!(namespace = namespace.name(), isolation = ?factory.isolation(), "engine created");
        Self {
            inner: Arc::new(EngineInner {
                factory,
                namespace,
                context: RwLock::new(context),
            }),
        }
    }

    pub fn factory(&self) -> &EngineFactory {
        &self.inner.factory
    }

    pub fn isolation(&self) -> IsolationMode {
        self.inner.factory.isolation()
    }

    /// Namespace that code evaluated through the current context runs in.
    pub fn namespace(&self) -> Arc<Namespace> {
        self.namespace_for(&self.context())
    }

    pub fn context(&self) -> Arc<ScriptContext> {
        self.inner.context.read().clone()
    }

    pub fn set_context(&self, context: Arc<ScriptContext>) {
        if self.isolation() == IsolationMode::PerScriptingContext {
            self.namespace_for(&context);
        }
        *self.inner.context.write() = context;
    }

    pub fn get_bindings(&self, scope: i32) -> Result<Option<BindingSet>, EngineError> {
        let scope = Scope::try_from(scope)?;
        Ok(self.context().bindings(scope))
    }

    pub fn set_bindings(&self, mut bindings: BindingSet, scope: i32) -> Result<(), EngineError> {
        let scope = Scope::try_from(scope)?;
        let context = self.context();
        if scope == Scope::Engine && self.isolation() == IsolationMode::PerScriptingContext {
            let key = self.inner.factory.namespace_key();
            if !bindings.contains_key(key) {
                let namespace = self.namespace_for(&context);
                bindings.insert(key, Value::Namespace(namespace));
            }
        }
        context.set_bindings(scope, bindings);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.context().get(key)
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.context().put(key, value);
    }

    pub fn create_bindings(&self) -> BindingSet {
        BindingSet::new()
    }

    /// Interns a host function in the current namespace.
    pub fn define_function(
        &self,
        name: &str,
        func: impl Fn(&Overlay, &[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) {
        self.namespace()
            .intern(name)
            .bind_root(Value::Native(Arc::new(NativeFn::new(name, func))));
    }

    pub fn eval(&self, source: &str) -> Result<Value, EngineError> {
        self.eval_forms(read_all(source)?, &self.context(), None)
    }

    pub fn eval_with_bindings(
        &self,
        source: &str,
        bindings: &BindingSet,
    ) -> Result<Value, EngineError> {
        self.eval_forms(read_all(source)?, &self.context(), Some(bindings))
    }

    pub fn eval_in_context(
        &self,
        source: &str,
        context: &ScriptContext,
    ) -> Result<Value, EngineError> {
        self.eval_forms(read_all(source)?, context, None)
    }

    pub fn eval_reader(&self, reader: impl Read) -> Result<Value, EngineError> {
        self.eval_forms(read_from(reader)?, &self.context(), None)
    }

    pub fn eval_reader_with_bindings(
        &self,
        reader: impl Read,
        bindings: &BindingSet,
    ) -> Result<Value, EngineError> {
        self.eval_forms(read_from(reader)?, &self.context(), Some(bindings))
    }

    pub fn eval_reader_in_context(
        &self,
        reader: impl Read,
        context: &ScriptContext,
    ) -> Result<Value, EngineError> {
        self.eval_forms(read_from(reader)?, context, None)
    }

    pub fn compile(&self, source: &str) -> Result<CompiledScript, EngineError> {
        Ok(CompiledScript::new(self.clone(), read_all(source)?))
    }

    pub fn compile_reader(&self, reader: impl Read) -> Result<CompiledScript, EngineError> {
        Ok(CompiledScript::new(self.clone(), read_from(reader)?))
    }

    pub fn invoke_function(&self, name: &str, args: &[Value]) -> Result<Value, EngineError> {
        self.with_overlay(&self.context(), None, |overlay| {
            let callable = resolve_callable(overlay, name)?;
            Ok(invoke_positional(&callable, args, overlay)?)
        })
    }

    pub fn invoke_method(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EngineError> {
        if receiver.is_nil() {
            return Err(EngineError::invalid_argument(
                "Receiver is nil or does not represent a scripting object.",
            ));
        }
        self.with_overlay(&self.context(), None, |overlay| {
            let callable = resolve_callable(overlay, name)?;
            Ok(invoke_as_method(&callable, receiver, args, overlay)?)
        })
    }

    /// Calls a function value obtained from an earlier evaluation.
    pub fn invoke_value(&self, callable: &Value, args: &[Value]) -> Result<Value, EngineError> {
        self.with_overlay(&self.context(), None, |overlay| {
            Ok(invoke_positional(callable, args, overlay)?)
        })
    }

    pub fn get_interface(
        &self,
        capability: &CapabilitySet,
    ) -> Result<Option<DispatchProxy>, EngineError> {
        DispatchProxy::build(self.clone(), capability.clone(), None)
    }

    pub fn get_interface_for(
        &self,
        receiver: &Value,
        capability: &CapabilitySet,
    ) -> Result<Option<DispatchProxy>, EngineError> {
        if receiver.is_nil() {
            return Err(EngineError::invalid_argument("Receiver is nil."));
        }
        DispatchProxy::build(self.clone(), capability.clone(), Some(receiver.clone()))
    }

    /// The overlay every call through the current context starts from.
    pub fn ambient_overlay(&self) -> Overlay {
        let context = self.context();
        self.ambient_for(self.namespace_for(&context), &context.snapshot())
    }

    pub(crate) fn namespace_for(&self, context: &ScriptContext) -> Arc<Namespace> {
        if self.isolation() != IsolationMode::PerScriptingContext {
            return self.inner.namespace.clone();
        }
        let factory = &self.inner.factory;
        context.namespace_attribute(factory.namespace_key(), || factory.create_namespace())
    }

    fn ambient_for(&self, namespace: Arc<Namespace>, snapshot: &ContextSnapshot) -> Overlay {
        let registry = self.inner.factory.registry();
        let flag = |name: &str| {
            registry
                .core_var(name)
                .and_then(|var| var.root())
                .unwrap_or(Value::Bool(false))
        };
        let ambient = [
            (NS_VAR, Value::Namespace(namespace.clone())),
            (OUT_VAR, Value::host(snapshot.writer.clone())),
            (ERR_VAR, Value::host(snapshot.error_writer.clone())),
            (IN_VAR, Value::host(snapshot.reader.clone())),
            (UNCHECKED_MATH_VAR, flag(UNCHECKED_MATH_VAR)),
            (WARN_ON_REFLECTION_VAR, flag(WARN_ON_REFLECTION_VAR)),
        ];
        Overlay::new(registry.clone(), namespace).push(
            ambient
                .into_iter()
                .filter_map(|(name, value)| registry.core_var(name).map(|var| (var, value))),
        )
    }

    /// Builds the call overlay, runs `f` inside it and drops it.
    /// `bindings` replaces the context's engine scope for this call only.
    pub(crate) fn with_overlay<T>(
        &self,
        context: &ScriptContext,
        bindings: Option<&BindingSet>,
        f: impl FnOnce(&Overlay) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let namespace = self.namespace_for(context);
        let snapshot = context.snapshot();
        let ambient = self.ambient_for(namespace, &snapshot);
        let engine_scope = bindings.unwrap_or(&snapshot.engine);
        let overlay = merge(&ambient, &[Some(engine_scope), snapshot.global.as_ref()]);
        f(&*overlay)
    }

    fn eval_forms(
        &self,
        forms: Vec<Form>,
        context: &ScriptContext,
        bindings: Option<&BindingSet>,
    ) -> Result<Value, EngineError> {
        self.with_overlay(context, bindings, |overlay| {
            debug!(namespace = overlay.namespace().name(), forms = forms.len(), "eval");
            let mut result = Value::Nil;
            for form in &forms {
                result = le_compiler::compile(form, overlay)?.run(overlay)?;
            }
            Ok(result)
        })
    }
}

impl std::fmt::Debug for LispEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LispEngine")
            .field("namespace", &self.inner.namespace.name())
            .field("isolation", &self.isolation())
            .finish()
    }
}
