use std::collections::HashMap;
use std::sync::Arc;

use le_core::EngineError;
use le_runtime::Value;

use crate::engine::LispEngine;
use crate::factory::ENGINE_NAME;
use crate::invocation::{invoke_as_method, invoke_positional, resolve_callable};

/// A named set of operations a host wants implemented by script functions.
/// Operation `op` of set `Name` is looked up as the var `Name#op`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    name: String,
    operations: Vec<String>,
}

impl CapabilitySet {
    pub fn new<I, S>(name: impl Into<String>, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            operations: operations.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    fn function_name(&self, operation: &str) -> String {
        format!("{}#{}", self.name, operation)
    }
}

/// Forwards each operation of a [`CapabilitySet`] to the function resolved
/// for it when the proxy was built.
#[derive(Clone)]
pub struct DispatchProxy {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    engine: LispEngine,
    capability: CapabilitySet,
    receiver: Option<Value>,
    table: HashMap<String, Value>,
}

impl DispatchProxy {
    /// `Ok(None)` when any operation has no callable.
    pub(crate) fn build(
        engine: LispEngine,
        capability: CapabilitySet,
        receiver: Option<Value>,
    ) -> Result<Option<Self>, EngineError> {
        if capability.name().is_empty() {
            return Err(EngineError::invalid_argument("Capability set name is empty."));
        }
        let context = engine.context();
        let table = engine.with_overlay(&context, None, |overlay| {
            let mut table = HashMap::new();
            for operation in capability.operations() {
                match resolve_callable(overlay, &capability.function_name(operation)) {
                    Ok(callable) => {
                        table.insert(operation.clone(), callable);
                    }
                    Err(EngineError::NotFound { .. }) => return Ok(None),
                    Err(other) => return Err(other),
                }
            }
            Ok(Some(table))
        })?;
        Ok(table.map(|table| Self {
            inner: Arc::new(ProxyInner {
                engine,
                capability,
                receiver,
                table,
            }),
        }))
    }

    pub fn capability(&self) -> &CapabilitySet {
        &self.inner.capability
    }

    pub fn receiver(&self) -> Option<&Value> {
        self.inner.receiver.as_ref()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The proxy as a script value, so it can be passed to `equals`.
    pub fn to_value(&self) -> Value {
        Value::host(self.clone())
    }

    pub fn call(&self, operation: &str, args: &[Value]) -> Result<Value, EngineError> {
        if let Some(callable) = self.inner.table.get(operation) {
            let engine = &self.inner.engine;
            return engine.with_overlay(&engine.context(), None, |overlay| {
                Ok(match &self.inner.receiver {
                    Some(receiver) => invoke_as_method(callable, receiver, args, overlay)?,
                    None => invoke_positional(callable, args, overlay)?,
                })
            });
        }
        match operation {
            "toString" => Ok(Value::string(format!(
                "Proxy implementation of {}/{}",
                ENGINE_NAME,
                self.inner.capability.name()
            ))),
            "hashCode" => Ok(Value::Int(match &self.inner.receiver {
                Some(receiver) => receiver.hash_code(),
                None => Arc::as_ptr(&self.inner) as usize as i64,
            })),
            "equals" => {
                let [other] = args else {
                    return Err(EngineError::invalid_argument("equals expects one argument."));
                };
                Ok(Value::Bool(match &self.inner.receiver {
                    Some(receiver) => receiver == other,
                    None => other
                        .as_host()
                        .and_then(|object| object.downcast_ref::<DispatchProxy>())
                        .is_some_and(|proxy| self.ptr_eq(proxy)),
                }))
            }
            _ => Err(EngineError::not_found(operation)),
        }
    }
}

impl std::fmt::Debug for DispatchProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchProxy")
            .field("capability", &self.inner.capability.name())
            .field("operations", &self.inner.table.len())
            .field("receiver", &self.inner.receiver)
            .finish()
    }
}
