use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use le_core::{RuntimeError, Symbol};

use crate::eval::{Closure, NativeFn};
use crate::namespace::Namespace;
use crate::var::Var;

/// An opaque host object compared and hashed by identity.
#[derive(Clone)]
pub struct HostObject {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<host {}@{:x}>", self.type_name, self.address())
    }
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Keyword(Arc<str>),
    Symbol(Arc<Symbol>),
    List(Arc<Vec<Value>>),
    Vector(Arc<Vec<Value>>),
    Map(Arc<Vec<(Value, Value)>>),
    Fn(Arc<Closure>),
    Native(Arc<NativeFn>),
    Var(Arc<Var>),
    Namespace(Arc<Namespace>),
    Host(HostObject),
}

impl Value {
    pub fn string(value: impl AsRef<str>) -> Self {
        Self::Str(Arc::from(value.as_ref()))
    }

    pub fn keyword(value: impl AsRef<str>) -> Self {
        Self::Keyword(Arc::from(value.as_ref()))
    }

    pub fn list(values: Vec<Value>) -> Self {
        Self::List(Arc::new(values))
    }

    pub fn vector(values: Vec<Value>) -> Self {
        Self::Vector(Arc::new(values))
    }

    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        Self::Map(Arc::new(entries))
    }

    pub fn host<T: Any + Send + Sync>(value: T) -> Self {
        Self::Host(HostObject::new(value))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Self::Fn(_) | Self::Native(_) | Self::Keyword(_) => true,
            Self::Var(var) => var.root().is_some_and(|value| value.is_callable()),
            _ => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_namespace(&self) -> Option<&Arc<Namespace>> {
        match self {
            Self::Namespace(namespace) => Some(namespace),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<&HostObject> {
        match self {
            Self::Host(object) => Some(object),
            _ => None,
        }
    }

    /// Elements of a list, vector or map entry sequence; `nil` is empty.
    pub fn as_seq(&self) -> Option<Vec<Value>> {
        match self {
            Self::Nil => Some(Vec::new()),
            Self::List(items) | Self::Vector(items) => Some(items.as_ref().clone()),
            Self::Map(entries) => Some(
                entries
                    .iter()
                    .map(|(k, v)| Value::vector(vec![k.clone(), v.clone()]))
                    .collect(),
            ),
            Self::Str(text) => Some(text.chars().map(|ch| Value::string(ch.to_string())).collect()),
            _ => None,
        }
    }

    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Self::Nil => "nil".to_string(),
            Self::Bool(_) => "boolean".to_string(),
            Self::Int(_) => "integer".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Str(_) => "string".to_string(),
            Self::Keyword(_) => "keyword".to_string(),
            Self::Symbol(_) => "symbol".to_string(),
            Self::List(_) => "list".to_string(),
            Self::Vector(_) => "vector".to_string(),
            Self::Map(_) => "map".to_string(),
            Self::Fn(_) | Self::Native(_) => "fn".to_string(),
            Self::Var(_) => "var".to_string(),
            Self::Namespace(_) => "namespace".to_string(),
            Self::Host(object) => object.type_name().to_string(),
        }
    }

    /// Text used by `str` and `println`: strings unquoted, `nil` empty.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Nil => String::new(),
            Self::Str(text) => text.to_string(),
            other => other.to_string(),
        }
    }

    pub fn hash_code(&self) -> i64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish() as i64
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Nil,
            serde_json::Value::Bool(flag) => Self::Bool(*flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Self::Int(int),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Self::string(text),
            serde_json::Value::Array(items) => {
                Self::vector(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(entries) => Self::map(
                entries
                    .iter()
                    .map(|(k, v)| (Self::string(k), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, RuntimeError> {
        Ok(match self {
            Self::Nil => serde_json::Value::Null,
            Self::Bool(flag) => serde_json::Value::Bool(*flag),
            Self::Int(int) => serde_json::Value::from(*int),
            Self::Float(float) => serde_json::Number::from_f64(*float)
                .map(serde_json::Value::Number)
                .ok_or_else(|| {
                    RuntimeError::new(
                        "VALUE_JSON",
                        format!("{} is not representable in JSON.", float),
                    )
                })?,
            Self::Str(text) | Self::Keyword(text) => serde_json::Value::String(text.to_string()),
            Self::Symbol(symbol) => serde_json::Value::String(symbol.to_string()),
            Self::List(items) | Self::Vector(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<_, _>>()?,
            ),
            Self::Map(entries) => {
                let mut object = serde_json::Map::new();
                for (key, value) in entries.iter() {
                    object.insert(key.to_display_string(), value.to_json()?);
                }
                serde_json::Value::Object(object)
            }
            other => {
                return Err(RuntimeError::new(
                    "VALUE_JSON",
                    format!("Values of type {} cannot be converted to JSON.", other.type_name()),
                ))
            }
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Keyword(a), Self::Keyword(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::List(a) | Self::Vector(a), Self::List(b) | Self::Vector(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter().any(|(other_key, other_value)| {
                            key == other_key && value == other_value
                        })
                    })
            }
            (Self::Fn(a), Self::Fn(b)) => Arc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Arc::ptr_eq(a, b),
            (Self::Var(a), Self::Var(b)) => Arc::ptr_eq(a, b),
            (Self::Namespace(a), Self::Namespace(b)) => Arc::ptr_eq(a, b),
            (Self::Host(a), Self::Host(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Nil => 0u8.hash(state),
            Self::Bool(flag) => flag.hash(state),
            Self::Int(int) => int.hash(state),
            Self::Float(float) => float.to_bits().hash(state),
            Self::Str(text) => text.hash(state),
            Self::Keyword(text) => {
                ':'.hash(state);
                text.hash(state);
            }
            Self::Symbol(symbol) => symbol.hash(state),
            Self::List(items) | Self::Vector(items) => {
                for item in items.iter() {
                    item.hash(state);
                }
            }
            // Order-independent so that equal maps hash equally.
            Self::Map(entries) => {
                let mut combined = 0u64;
                for (key, value) in entries.iter() {
                    let mut entry_hasher = DefaultHasher::new();
                    key.hash(&mut entry_hasher);
                    value.hash(&mut entry_hasher);
                    combined ^= entry_hasher.finish();
                }
                combined.hash(state);
            }
            Self::Fn(closure) => (Arc::as_ptr(closure) as usize).hash(state),
            Self::Native(native) => (Arc::as_ptr(native) as usize).hash(state),
            Self::Var(var) => var.id().hash(state),
            Self::Namespace(namespace) => namespace.id().hash(state),
            Self::Host(object) => object.address().hash(state),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(flag) => write!(f, "{}", flag),
            Self::Int(int) => write!(f, "{}", int),
            Self::Float(float) => {
                if float.is_finite() && float.fract() == 0.0 {
                    write!(f, "{:.1}", float)
                } else {
                    write!(f, "{}", float)
                }
            }
            Self::Str(text) => write!(f, "{:?}", text),
            Self::Keyword(text) => write!(f, ":{}", text),
            Self::Symbol(symbol) => write!(f, "{}", symbol),
            Self::List(items) => write_seq(f, "(", items, ")"),
            Self::Vector(items) => write_seq(f, "[", items, "]"),
            Self::Map(entries) => {
                f.write_str("{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", key, value)?;
                }
                f.write_str("}")
            }
            Self::Fn(closure) => write!(f, "#<fn {}>", closure.name().unwrap_or("anonymous")),
            Self::Native(native) => write!(f, "#<fn {}>", native.name()),
            Self::Var(var) => write!(f, "#'{}", var.qualified_name()),
            Self::Namespace(namespace) => write!(f, "#<namespace {}>", namespace.name()),
            Self::Host(object) => write!(f, "{:?}", object),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}
