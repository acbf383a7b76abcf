use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    pub fn synthetic() -> Self {
        Self {
            start: SourceLocation { line: 1, column: 1 },
            end: SourceLocation { line: 1, column: 1 },
        }
    }
}

/// A possibly namespace-qualified name such as `inc` or `core/inc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub namespace: Option<String>,
    pub name: String,
}

impl Symbol {
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Splits on the first `/`, except for the lone division symbol.
    pub fn parse(text: &str) -> Self {
        if text == "/" {
            return Self::simple(text);
        }
        match text.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Self::qualified(namespace, name)
            }
            _ => Self::simple(text),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.namespace.is_some()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(String),
    Symbol(Symbol),
    List(Vec<Form>),
    Vector(Vec<Form>),
    Map(Vec<(Form, Form)>),
}

/// A datum produced by the reader, together with its `^:flag` metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    pub meta: Vec<String>,
    pub span: SourceSpan,
}

impl Form {
    pub fn new(kind: FormKind, span: SourceSpan) -> Self {
        Self {
            kind,
            meta: Vec::new(),
            span,
        }
    }

    pub fn synthetic(kind: FormKind) -> Self {
        Self::new(kind, SourceSpan::synthetic())
    }

    pub fn symbol(name: &str) -> Self {
        Self::synthetic(FormKind::Symbol(Symbol::parse(name)))
    }

    pub fn list(items: Vec<Form>) -> Self {
        Self::synthetic(FormKind::List(items))
    }

    pub fn vector(items: Vec<Form>) -> Self {
        Self::synthetic(FormKind::Vector(items))
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match &self.kind {
            FormKind::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        matches!(
            &self.kind,
            FormKind::Symbol(symbol) if !symbol.is_qualified() && symbol.name == name
        )
    }

    pub fn has_meta(&self, flag: &str) -> bool {
        self.meta.iter().any(|entry| entry == flag)
    }

    /// Wraps `body` as `(fn [] body...)` so it can be compiled once and invoked later.
    pub fn thunk(body: Vec<Form>) -> Self {
        let mut items = Vec::with_capacity(body.len() + 2);
        items.push(Self::symbol("fn"));
        items.push(Self::vector(Vec::new()));
        items.extend(body);
        Self::list(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_parse_splits_namespace() {
        assert_eq!(Symbol::parse("core/inc"), Symbol::qualified("core", "inc"));
        assert_eq!(Symbol::parse("inc"), Symbol::simple("inc"));
        assert_eq!(Symbol::parse("/"), Symbol::simple("/"));
        assert_eq!(Symbol::parse("a/"), Symbol::simple("a/"));
    }

    #[test]
    fn symbol_display_round_trips_qualified_name() {
        assert_eq!(Symbol::qualified("user", "f").to_string(), "user/f");
    }

    #[test]
    fn thunk_wraps_body_in_zero_arg_fn() {
        let form = Form::thunk(vec![Form::symbol("x")]);
        let FormKind::List(items) = form.kind else {
            panic!("thunk should be a list");
        };
        assert!(items[0].is_symbol("fn"));
        assert_eq!(items[1].kind, FormKind::Vector(Vec::new()));
        assert!(items[2].is_symbol("x"));
    }
}
