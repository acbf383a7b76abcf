use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use le_core::{Symbol, NAMESPACE_PLACEHOLDER};
use tracing::{debug, trace};

use crate::builtins;
use crate::namespace::Namespace;
use crate::var::Var;

pub const CORE_NAMESPACE: &str = "core";

/// Process-wide table of namespaces. Namespaces are never removed.
pub struct NamespaceRegistry {
    namespaces: DashMap<String, Arc<Namespace>>,
    counter: AtomicU64,
    core: Arc<Namespace>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        let core = Arc::new(Namespace::new(CORE_NAMESPACE));
        builtins::install(&core);
        let namespaces = DashMap::new();
        namespaces.insert(CORE_NAMESPACE.to_string(), core.clone());
        Self {
            namespaces,
            counter: AtomicU64::new(0),
            core,
        }
    }

    pub fn core(&self) -> &Arc<Namespace> {
        &self.core
    }

    /// A var owned by the base library, such as `*out*`.
    pub fn core_var(&self, name: &str) -> Option<Arc<Var>> {
        self.core.own_var(name)
    }

    pub fn find(&self, name: &str) -> Option<Arc<Namespace>> {
        self.namespaces.get(name).map(|entry| entry.value().clone())
    }

    /// Atomic by name. A namespace created here refers the base library on a
    /// best-effort basis; refer failures are logged and otherwise ignored.
    pub fn find_or_create(&self, name: &str) -> Arc<Namespace> {
        if let Some(existing) = self.find(name) {
            return existing;
        }
        self.namespaces
            .entry(name.to_string())
            .or_insert_with(|| {
                let namespace = Arc::new(Namespace::new(name));
                match namespace.refer_all(&self.core) {
                    Ok(count) => trace!(namespace = name, referred = count, "namespace created"),
                    Err(error) => {
                        debug!(namespace = name, %error, "base library refer failed; ignoring")
                    }
                }
                namespace
            })
            .value()
            .clone()
    }

    /// Substitutes the next counter value into the `{id}` placeholder.
    /// A template without a placeholder yields itself on every call.
    pub fn next_unique_name(&self, template: &str) -> String {
        if !template.contains(NAMESPACE_PLACEHOLDER) {
            return template.to_string();
        }
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        template.replace(NAMESPACE_PLACEHOLDER, &id.to_string())
    }

    pub fn create_unique(&self, template: &str) -> Arc<Namespace> {
        let name = self.next_unique_name(template);
        self.find_or_create(&name)
    }

    pub fn resolve_qualified(&self, symbol: &Symbol) -> Option<Arc<Var>> {
        let namespace = self.find(symbol.namespace.as_deref()?)?;
        namespace.mapping(&symbol.name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = self
            .namespaces
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn find_or_create_returns_same_namespace_by_name() {
        let registry = NamespaceRegistry::new();
        let first = registry.find_or_create("user");
        let second = registry.find_or_create("user");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn new_namespace_refers_base_library() {
        let registry = NamespaceRegistry::new();
        let user = registry.find_or_create("user");
        let plus = user.mapping("+").expect("+ should be referred");
        assert_eq!(plus.namespace_name(), CORE_NAMESPACE);
    }

    #[test]
    fn next_unique_name_increments_counter() {
        let registry = NamespaceRegistry::new();
        assert_eq!(registry.next_unique_name("ns-{id}"), "ns-1");
        assert_eq!(registry.next_unique_name("ns-{id}"), "ns-2");
        assert_eq!(registry.next_unique_name("shared"), "shared");
        assert_eq!(registry.next_unique_name("shared"), "shared");
    }

    #[test]
    fn concurrent_find_or_create_yields_one_namespace() {
        let registry = Arc::new(NamespaceRegistry::new());
        let handles = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || registry.find_or_create("shared").id())
            })
            .collect::<Vec<_>>();
        let ids = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread should finish"))
            .collect::<Vec<_>>();
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn resolve_qualified_looks_up_other_namespace() {
        let registry = NamespaceRegistry::new();
        let lib = registry.find_or_create("lib");
        let var = lib.intern("helper");
        let resolved = registry
            .resolve_qualified(&Symbol::qualified("lib", "helper"))
            .expect("should resolve");
        assert!(Arc::ptr_eq(&resolved, &var));
        assert!(registry
            .resolve_qualified(&Symbol::qualified("missing", "helper"))
            .is_none());
        assert!(registry.resolve_qualified(&Symbol::simple("helper")).is_none());
    }
}
