use std::collections::BTreeMap;

use le_core::EngineError;
use le_runtime::Value;

pub const ENGINE_SCOPE: i32 = 100;
pub const GLOBAL_SCOPE: i32 = 200;

/// Keys with this prefix carry host metadata and never become vars.
pub const RESERVED_KEY_PREFIX: &str = "script.";

pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(RESERVED_KEY_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Engine,
    Global,
}

impl TryFrom<i32> for Scope {
    type Error = EngineError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            ENGINE_SCOPE => Ok(Self::Engine),
            GLOBAL_SCOPE => Ok(Self::Global),
            other => Err(EngineError::invalid_argument(format!(
                "Invalid scope value {}.",
                other
            ))),
        }
    }
}

impl From<Scope> for i32 {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Engine => ENGINE_SCOPE,
            Scope::Global => GLOBAL_SCOPE,
        }
    }
}

/// Caller-supplied name/value pairs, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingSet {
    entries: BTreeMap<String, Value>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Builds a set from a JSON object; anything else is rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, EngineError> {
        let serde_json::Value::Object(object) = value else {
            return Err(EngineError::invalid_argument("Bindings must be a JSON object."));
        };
        Ok(object
            .iter()
            .map(|(key, value)| (key.clone(), Value::from_json(value)))
            .collect())
    }
}

impl FromIterator<(String, Value)> for BindingSet {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a BindingSet {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
