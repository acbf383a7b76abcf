use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

use le_runtime::{Namespace, Overlay, Value, Var};
use tracing::{debug, trace};

use crate::bindings::{is_reserved_key, BindingSet};

/// Merges caller bindings into `ambient`, highest precedence layer first.
///
/// A var already bound by `ambient` or by an earlier layer keeps its value.
/// Keys are promoted to dynamic vars of the overlay's namespace on first use;
/// reserved keys and keys naming a var referred from another namespace are
/// skipped. Returns `ambient` itself when nothing was promoted.
pub fn merge<'a>(ambient: &'a Overlay, layers: &[Option<&BindingSet>]) -> Cow<'a, Overlay> {
    let namespace = ambient.namespace();
    let mut seen = HashSet::new();
    let mut frame: Vec<(Arc<Var>, Value)> = Vec::new();

    for layer in layers.iter().flatten() {
        for (key, value) in layer.iter() {
            if is_reserved_key(key) {
                continue;
            }
            let Some(var) = promotable_var(namespace, key) else {
                trace!(key = %key, "binding names a referred var; not promoted");
                continue;
            };
            if ambient.is_bound(&var) || !seen.insert(var.id()) {
                continue;
            }
            var.set_dynamic();
            if !value.is_nil() {
                var.tag_if_unset(value.type_name());
            }
            frame.push((var, value.clone()));
        }
    }

    if frame.is_empty() {
        return Cow::Borrowed(ambient);
    }
    debug!(namespace = namespace.name(), promoted = frame.len(), "bindings merged");
    Cow::Owned(ambient.push(frame))
}

fn promotable_var(namespace: &Namespace, key: &str) -> Option<Arc<Var>> {
    if let Some(own) = namespace.own_var(key) {
        return Some(own);
    }
    if namespace.mapping(key).is_some() {
        return None;
    }
    Some(namespace.intern(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use le_runtime::NamespaceRegistry;

    fn ambient() -> Overlay {
        let registry = Arc::new(NamespaceRegistry::new());
        let namespace = registry.find_or_create("merge.test");
        Overlay::new(registry, namespace)
    }

    fn set(entries: &[(&str, Value)]) -> BindingSet {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn no_bindings_returns_ambient_unchanged() {
        let ambient = ambient();
        let merged = merge(&ambient, &[None, Some(&BindingSet::new())]);
        assert!(matches!(merged, Cow::Borrowed(_)));
        assert_eq!(merged.depth(), 0);
    }

    #[test]
    fn promotes_keys_to_tagged_dynamic_vars() {
        let ambient = ambient();
        let engine = set(&[("x", Value::Int(5)), ("missing", Value::Nil)]);
        let merged = merge(&ambient, &[Some(&engine)]);
        assert_eq!(merged.depth(), 1);

        let x = ambient.namespace().own_var("x").expect("x promoted");
        assert!(x.is_dynamic());
        assert_eq!(x.tag().as_deref(), Some("integer"));
        assert_eq!(x.deref(&merged), Some(Value::Int(5)));
        assert_eq!(x.deref(&ambient), None);

        let missing = ambient.namespace().own_var("missing").expect("nil promoted");
        assert_eq!(missing.tag(), None);
    }

    #[test]
    fn tag_comes_from_first_promoted_value() {
        let ambient = ambient();
        merge(&ambient, &[Some(&set(&[("v", Value::Int(1))]))]);
        let merged = merge(&ambient, &[Some(&set(&[("v", Value::string("text"))]))]);
        let var = ambient.namespace().own_var("v").expect("v promoted");
        assert_eq!(var.tag().as_deref(), Some("integer"));
        assert_eq!(var.deref(&merged), Some(Value::string("text")));
    }

    #[test]
    fn ambient_binding_wins_over_caller_binding() {
        let base = ambient();
        let var = base.namespace().intern("x");
        var.set_dynamic();
        let ambient = base.push([(var.clone(), Value::Int(1))]);
        let merged = merge(&ambient, &[Some(&set(&[("x", Value::Int(2))]))]);
        assert!(matches!(merged, Cow::Borrowed(_)));
        assert_eq!(var.deref(&merged), Some(Value::Int(1)));
    }

    #[test]
    fn engine_scope_wins_over_global_scope() {
        let ambient = ambient();
        let engine = set(&[("x", Value::Int(1))]);
        let global = set(&[("x", Value::Int(2)), ("y", Value::Int(3))]);
        let merged = merge(&ambient, &[Some(&engine), Some(&global)]);
        let namespace = ambient.namespace();
        let x = namespace.own_var("x").expect("x");
        let y = namespace.own_var("y").expect("y");
        assert_eq!(x.deref(&merged), Some(Value::Int(1)));
        assert_eq!(y.deref(&merged), Some(Value::Int(3)));
        assert_eq!(merged.depth(), 1);
    }

    #[test]
    fn reserved_and_referred_keys_are_skipped() {
        let ambient = ambient();
        let engine = set(&[
            ("script.namespace", Value::Int(1)),
            ("+", Value::Int(2)),
        ]);
        let merged = merge(&ambient, &[Some(&engine)]);
        assert!(matches!(merged, Cow::Borrowed(_)));
        let namespace = ambient.namespace();
        assert!(namespace.mapping("script.namespace").is_none());
        let plus = namespace.mapping("+").expect("core +");
        assert!(plus.root().expect("root").is_callable());
    }
}
