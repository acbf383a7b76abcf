use std::collections::HashMap;
use std::sync::Arc;

use crate::namespace::Namespace;
use crate::registry::NamespaceRegistry;
use crate::value::Value;
use crate::var::Var;

struct Frame {
    bindings: HashMap<u64, (Arc<Var>, Value)>,
    parent: Option<Arc<Frame>>,
}

/// Immutable dynamic-binding context for one call.
///
/// Pushing returns a new overlay that shares its parent frames; the caller's
/// overlay is untouched, so nothing needs popping when a call unwinds.
#[derive(Clone)]
pub struct Overlay {
    registry: Arc<NamespaceRegistry>,
    namespace: Arc<Namespace>,
    top: Option<Arc<Frame>>,
    depth: usize,
}

impl Overlay {
    pub fn new(registry: Arc<NamespaceRegistry>, namespace: Arc<Namespace>) -> Self {
        Self {
            registry,
            namespace,
            top: None,
            depth: 0,
        }
    }

    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Number of frames pushed on top of the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn push(&self, bindings: impl IntoIterator<Item = (Arc<Var>, Value)>) -> Self {
        let bindings = bindings
            .into_iter()
            .map(|(var, value)| (var.id(), (var, value)))
            .collect();
        Self {
            registry: self.registry.clone(),
            namespace: self.namespace.clone(),
            top: Some(Arc::new(Frame {
                bindings,
                parent: self.top.clone(),
            })),
            depth: self.depth + 1,
        }
    }

    pub fn lookup(&self, var: &Var) -> Option<&Value> {
        let mut frame = self.top.as_deref();
        while let Some(current) = frame {
            if let Some((_, value)) = current.bindings.get(&var.id()) {
                return Some(value);
            }
            frame = current.parent.as_deref();
        }
        None
    }

    pub fn is_bound(&self, var: &Var) -> bool {
        self.lookup(var).is_some()
    }

    /// Every var bound in any frame, innermost binding first.
    pub fn bound_vars(&self) -> Vec<Arc<Var>> {
        let mut seen = std::collections::HashSet::new();
        let mut vars = Vec::new();
        let mut frame = self.top.as_deref();
        while let Some(current) = frame {
            for (id, (var, _)) in &current.bindings {
                if seen.insert(*id) {
                    vars.push(var.clone());
                }
            }
            frame = current.parent.as_deref();
        }
        vars
    }
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("namespace", &self.namespace.name())
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay() -> Overlay {
        let registry = Arc::new(NamespaceRegistry::new());
        let namespace = registry.find_or_create("user");
        Overlay::new(registry, namespace)
    }

    #[test]
    fn push_shadows_without_touching_parent() {
        let base = overlay();
        let var = base.namespace().intern("x");
        var.set_dynamic();

        let outer = base.push([(var.clone(), Value::Int(1))]);
        let inner = outer.push([(var.clone(), Value::Int(2))]);

        assert_eq!(base.lookup(&var), None);
        assert_eq!(outer.lookup(&var), Some(&Value::Int(1)));
        assert_eq!(inner.lookup(&var), Some(&Value::Int(2)));
        assert_eq!((base.depth(), outer.depth(), inner.depth()), (0, 1, 2));
    }

    #[test]
    fn deref_prefers_overlay_for_dynamic_vars_only() {
        let base = overlay();
        let var = base.namespace().intern("y");
        var.bind_root(Value::Int(10));
        let bound = base.push([(var.clone(), Value::Int(20))]);
        assert_eq!(var.deref(&bound), Some(Value::Int(10)));

        var.set_dynamic();
        assert_eq!(var.deref(&bound), Some(Value::Int(20)));
        assert_eq!(var.deref(&base), Some(Value::Int(10)));
    }

    #[test]
    fn bound_vars_lists_each_var_once() {
        let base = overlay();
        let x = base.namespace().intern("x");
        let y = base.namespace().intern("y");
        let overlay = base
            .push([(x.clone(), Value::Int(1))])
            .push([(x.clone(), Value::Int(2)), (y.clone(), Value::Nil)]);
        assert_eq!(overlay.bound_vars().len(), 2);
    }
}
