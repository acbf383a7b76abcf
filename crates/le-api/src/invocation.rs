use le_core::{EngineError, RuntimeError, Symbol};
use le_runtime::{invoke, Overlay, Value};

use crate::bindings::is_reserved_key;

/// Looks `name` up in the overlay's namespace, or globally when qualified.
/// The var must hold a callable value under `overlay`.
pub(crate) fn resolve_callable(overlay: &Overlay, name: &str) -> Result<Value, EngineError> {
    if name.is_empty() || is_reserved_key(name) {
        return Err(EngineError::not_found(name));
    }
    let symbol = Symbol::parse(name);
    let var = if symbol.is_qualified() {
        overlay.registry().resolve_qualified(&symbol)
    } else {
        overlay.namespace().mapping(&symbol.name)
    };
    var.and_then(|var| var.deref(overlay))
        .filter(Value::is_callable)
        .ok_or_else(|| EngineError::not_found(name))
}

pub(crate) fn invoke_positional(
    callable: &Value,
    args: &[Value],
    overlay: &Overlay,
) -> Result<Value, RuntimeError> {
    invoke(callable, args, overlay)
}

pub(crate) fn invoke_as_method(
    callable: &Value,
    receiver: &Value,
    args: &[Value],
    overlay: &Overlay,
) -> Result<Value, RuntimeError> {
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(receiver.clone());
    full.extend_from_slice(args);
    invoke(callable, &full, overlay)
}
