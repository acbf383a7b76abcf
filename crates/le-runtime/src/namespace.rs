use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use le_core::RuntimeError;
use parking_lot::RwLock;

use crate::var::Var;

static NEXT_NAMESPACE_ID: AtomicU64 = AtomicU64::new(1);

/// A named, mutable symbol table. Mappings point at own vars or at vars referred from elsewhere.
pub struct Namespace {
    id: u64,
    name: String,
    mappings: RwLock<HashMap<String, Arc<Var>>>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_NAMESPACE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            mappings: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapping(&self, name: &str) -> Option<Arc<Var>> {
        self.mappings.read().get(name).cloned()
    }

    /// Returns the mapping only when it is a var owned by this namespace.
    pub fn own_var(&self, name: &str) -> Option<Arc<Var>> {
        self.mapping(name)
            .filter(|var| var.namespace_name() == self.name)
    }

    /// Finds or creates an own var. A referred mapping of the same name is shadowed.
    pub fn intern(&self, name: &str) -> Arc<Var> {
        if let Some(var) = self.own_var(name) {
            return var;
        }
        let mut mappings = self.mappings.write();
        if let Some(existing) = mappings.get(name) {
            if existing.namespace_name() == self.name {
                return existing.clone();
            }
        }
        let var = Arc::new(Var::new(self.name.clone(), name));
        mappings.insert(name.to_string(), var.clone());
        var
    }

    /// Maps every own var of `source` into this namespace. Existing mappings are kept;
    /// conflicting names are reported after the rest have been referred.
    pub fn refer_all(&self, source: &Namespace) -> Result<usize, RuntimeError> {
        if source.id == self.id {
            return Err(RuntimeError::new(
                "NAMESPACE_REFER_SELF",
                format!("Namespace {} cannot refer itself.", self.name),
            ));
        }
        let exported = source
            .mappings
            .read()
            .values()
            .filter(|var| var.namespace_name() == source.name)
            .cloned()
            .collect::<Vec<_>>();

        let mut mappings = self.mappings.write();
        let mut referred = 0;
        let mut conflicts = Vec::new();
        for var in exported {
            match mappings.get(var.name()) {
                Some(existing) if Arc::ptr_eq(existing, &var) => {}
                Some(_) => conflicts.push(var.name().to_string()),
                None => {
                    mappings.insert(var.name().to_string(), var);
                    referred += 1;
                }
            }
        }
        if conflicts.is_empty() {
            Ok(referred)
        } else {
            conflicts.sort();
            Err(RuntimeError::new(
                "NAMESPACE_REFER_CONFLICT",
                format!(
                    "{} already maps {} in namespace {}.",
                    source.name,
                    conflicts.join(", "),
                    self.name
                ),
            ))
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = self.mappings.read().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn intern_is_idempotent() {
        let ns = Namespace::new("user");
        let first = ns.intern("x");
        let second = ns.intern("x");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.namespace_name(), "user");
    }

    #[test]
    fn refer_all_maps_source_vars_without_overwriting() {
        let core = Namespace::new("core");
        core.intern("inc").bind_root(Value::Int(1));
        core.intern("dec").bind_root(Value::Int(2));
        let user = Namespace::new("user");
        let own = user.intern("dec");

        let error = user.refer_all(&core).expect_err("dec conflicts");
        assert_eq!(error.code, "NAMESPACE_REFER_CONFLICT");
        assert!(user.mapping("inc").is_some());
        assert!(Arc::ptr_eq(&user.mapping("dec").expect("dec"), &own));
        assert!(user.own_var("inc").is_none());
    }

    #[test]
    fn refer_all_is_repeatable() {
        let core = Namespace::new("core");
        core.intern("inc");
        let user = Namespace::new("user");
        assert_eq!(user.refer_all(&core).expect("refer"), 1);
        assert_eq!(user.refer_all(&core).expect("refer again"), 0);
    }

    #[test]
    fn intern_shadows_referred_var() {
        let core = Namespace::new("core");
        let inc = core.intern("inc");
        let user = Namespace::new("user");
        user.refer_all(&core).expect("refer");
        let own = user.intern("inc");
        assert!(!Arc::ptr_eq(&inc, &own));
        assert_eq!(own.namespace_name(), "user");
        assert!(Arc::ptr_eq(&core.intern("inc"), &inc));
    }

    #[test]
    fn refer_self_fails() {
        let user = Namespace::new("user");
        assert!(user.refer_all(&user).is_err());
    }
}
