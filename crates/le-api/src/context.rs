use std::sync::Arc;

use le_runtime::{Namespace, SharedReader, SharedWriter, Value};
use parking_lot::{Mutex, RwLock};

use crate::bindings::{BindingSet, Scope};

/// A scripting session: engine-scope and global-scope bindings plus the
/// streams bound to `*out*`, `*err*` and `*in*` while code runs.
pub struct ScriptContext {
    engine_scope: RwLock<BindingSet>,
    global_scope: RwLock<Option<BindingSet>>,
    writer: RwLock<SharedWriter>,
    error_writer: RwLock<SharedWriter>,
    reader: RwLock<SharedReader>,
    namespace_lock: Mutex<()>,
}

/// Copy of a context taken when a call starts.
pub(crate) struct ContextSnapshot {
    pub engine: BindingSet,
    pub global: Option<BindingSet>,
    pub writer: SharedWriter,
    pub error_writer: SharedWriter,
    pub reader: SharedReader,
}

impl ScriptContext {
    pub fn new() -> Self {
        Self::with_bindings(BindingSet::new())
    }

    pub fn with_bindings(engine_scope: BindingSet) -> Self {
        Self {
            engine_scope: RwLock::new(engine_scope),
            global_scope: RwLock::new(Some(BindingSet::new())),
            writer: RwLock::new(SharedWriter::stdout()),
            error_writer: RwLock::new(SharedWriter::stderr()),
            reader: RwLock::new(SharedReader::stdin()),
            namespace_lock: Mutex::new(()),
        }
    }

    /// A copy of the bindings of `scope`; global scope may be absent.
    pub fn bindings(&self, scope: Scope) -> Option<BindingSet> {
        match scope {
            Scope::Engine => Some(self.engine_scope.read().clone()),
            Scope::Global => self.global_scope.read().clone(),
        }
    }

    pub fn set_bindings(&self, scope: Scope, bindings: BindingSet) {
        match scope {
            Scope::Engine => *self.engine_scope.write() = bindings,
            Scope::Global => *self.global_scope.write() = Some(bindings),
        }
    }

    pub fn clear_global_bindings(&self) {
        *self.global_scope.write() = None;
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.engine_scope.read().get(key).cloned()
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.engine_scope.write().insert(key, value)
    }

    /// Engine scope first, then global scope.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.get(key).or_else(|| {
            self.global_scope
                .read()
                .as_ref()
                .and_then(|global| global.get(key).cloned())
        })
    }

    pub fn writer(&self) -> SharedWriter {
        self.writer.read().clone()
    }

    pub fn set_writer(&self, writer: SharedWriter) {
        *self.writer.write() = writer;
    }

    pub fn error_writer(&self) -> SharedWriter {
        self.error_writer.read().clone()
    }

    pub fn set_error_writer(&self, writer: SharedWriter) {
        *self.error_writer.write() = writer;
    }

    pub fn reader(&self) -> SharedReader {
        self.reader.read().clone()
    }

    pub fn set_reader(&self, reader: SharedReader) {
        *self.reader.write() = reader;
    }

    /// The namespace stored under `key`, created by `create` on first use.
    /// Serialized per context so a session never gets two namespaces.
    pub(crate) fn namespace_attribute(
        &self,
        key: &str,
        create: impl FnOnce() -> Arc<Namespace>,
    ) -> Arc<Namespace> {
        let _guard = self.namespace_lock.lock();
        if let Some(namespace) = self.stored_namespace(key) {
            return namespace;
        }
        let namespace = create();
        self.put(key, Value::Namespace(namespace.clone()));
        namespace
    }

    pub(crate) fn stored_namespace(&self, key: &str) -> Option<Arc<Namespace>> {
        self.engine_scope
            .read()
            .get(key)
            .and_then(|value| value.as_namespace().cloned())
    }

    pub(crate) fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            engine: self.engine_scope.read().clone(),
            global: self.global_scope.read().clone(),
            writer: self.writer(),
            error_writer: self.error_writer(),
            reader: self.reader(),
        }
    }
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("engine_scope", &*self.engine_scope.read())
            .field("global_scope", &*self.global_scope.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn attribute_falls_back_to_global_scope() {
        let context = ScriptContext::new();
        let mut global = BindingSet::new();
        global.insert("shared", 1i64);
        context.set_bindings(Scope::Global, global);
        assert_eq!(context.attribute("shared"), Some(Value::Int(1)));
        context.put("shared", 2i64);
        assert_eq!(context.attribute("shared"), Some(Value::Int(2)));
    }

    #[test]
    fn namespace_attribute_is_created_once() {
        let context = ScriptContext::new();
        let created = AtomicUsize::new(0);
        let create = || {
            created.fetch_add(1, Ordering::SeqCst);
            Arc::new(Namespace::new("ctx.ns"))
        };
        let first = context.namespace_attribute("script.namespace", create);
        let second =
            context.namespace_attribute("script.namespace", || Arc::new(Namespace::new("other")));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }
}
