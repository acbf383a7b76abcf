use std::sync::Arc;

use le_core::{Form, FormKind};
use le_runtime::Value;

/// The literal value of a quoted form.
pub fn form_to_value(form: &Form) -> Value {
    match &form.kind {
        FormKind::Nil => Value::Nil,
        FormKind::Bool(flag) => Value::Bool(*flag),
        FormKind::Int(int) => Value::Int(*int),
        FormKind::Float(float) => Value::Float(*float),
        FormKind::Str(text) => Value::string(text),
        FormKind::Keyword(name) => Value::keyword(name),
        FormKind::Symbol(symbol) => Value::Symbol(Arc::new(symbol.clone())),
        FormKind::List(items) => Value::list(items.iter().map(form_to_value).collect()),
        FormKind::Vector(items) => Value::vector(items.iter().map(form_to_value).collect()),
        FormKind::Map(entries) => Value::map(
            entries
                .iter()
                .map(|(key, value)| (form_to_value(key), form_to_value(value)))
                .collect(),
        ),
    }
}
