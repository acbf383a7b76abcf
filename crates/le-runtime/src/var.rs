use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use le_core::Symbol;
use parking_lot::RwLock;

use crate::overlay::Overlay;
use crate::value::Value;

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(1);

/// A namespace-scoped cell. Dynamic vars may be rebound per call through an [`Overlay`].
pub struct Var {
    id: u64,
    namespace: String,
    name: String,
    root: RwLock<Option<Value>>,
    dynamic: AtomicBool,
    tag: RwLock<Option<String>>,
}

impl Var {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
            namespace: namespace.into(),
            name: name.into(),
            root: RwLock::new(None),
            dynamic: AtomicBool::new(false),
            tag: RwLock::new(None),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn namespace_name(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> Symbol {
        Symbol::qualified(self.namespace.clone(), self.name.clone())
    }

    pub fn root(&self) -> Option<Value> {
        self.root.read().clone()
    }

    pub fn bind_root(&self, value: Value) {
        *self.root.write() = Some(value);
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic.load(Ordering::Acquire)
    }

    pub fn set_dynamic(&self) {
        self.dynamic.store(true, Ordering::Release);
    }

    pub fn tag(&self) -> Option<String> {
        self.tag.read().clone()
    }

    /// Records the type name of the first non-nil value. Later calls keep it.
    pub fn tag_if_unset(&self, tag: impl Into<String>) {
        let mut slot = self.tag.write();
        if slot.is_none() {
            *slot = Some(tag.into());
        }
    }

    /// The overlay binding of a dynamic var wins over its root.
    pub fn deref(&self, overlay: &Overlay) -> Option<Value> {
        if self.is_dynamic() {
            if let Some(value) = overlay.lookup(self) {
                return Some(value.clone());
            }
        }
        self.root()
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("name", &self.qualified_name().to_string())
            .field("dynamic", &self.is_dynamic())
            .field("tag", &self.tag())
            .finish()
    }
}
