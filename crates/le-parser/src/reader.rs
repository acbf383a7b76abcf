use std::io::Read;
use std::sync::OnceLock;

use le_core::{Form, FormKind, RuntimeError, SourceLocation, SourceSpan, Symbol};
use regex::Regex;

/// Deepest collection nesting the reader accepts.
pub const MAX_READ_DEPTH: usize = 1024;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

fn int_regex() -> &'static Regex {
    static INT: OnceLock<Regex> = OnceLock::new();
    INT.get_or_init(|| Regex::new(r"^[+-]?\d+$").expect("int regex must compile"))
}

fn float_regex() -> &'static Regex {
    static FLOAT: OnceLock<Regex> = OnceLock::new();
    FLOAT.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+\.\d*([eE][+-]?\d+)?|\d+[eE][+-]?\d+)$")
            .expect("float regex must compile")
    })
}

/// Reads every top-level form in `source`.
pub fn read_all(source: &str) -> Result<Vec<Form>, RuntimeError> {
    let mut reader = Reader::new(source);
    let mut forms = Vec::new();
    while let Some(form) = reader.next_form()? {
        forms.push(form);
    }
    Ok(forms)
}

/// Reads exactly one form; trailing input other than whitespace is an error.
pub fn read_one(source: &str) -> Result<Form, RuntimeError> {
    let mut reader = Reader::new(source);
    let Some(form) = reader.next_form()? else {
        return Err(RuntimeError::new("READ_EOF", "Expected a form, found end of input."));
    };
    if let Some(extra) = reader.next_form()? {
        return Err(RuntimeError::with_span(
            "READ_TRAILING",
            "Unexpected input after the first form.",
            extra.span,
        ));
    }
    Ok(form)
}

pub fn read_from(mut input: impl Read) -> Result<Vec<Form>, RuntimeError> {
    let mut source = String::new();
    input
        .read_to_string(&mut source)
        .map_err(|error| RuntimeError::new("READ_IO", error.to_string()))?;
    read_all(&source)
}

struct Reader<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            depth: 0,
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
        }
    }

    fn span_from(&self, start: SourceLocation) -> SourceSpan {
        SourceSpan {
            start,
            end: self.location(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || ch == ',' {
                self.bump();
            } else if ch == ';' {
                while let Some(ch) = self.bump() {
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_form(&mut self) -> Result<Option<Form>, RuntimeError> {
        self.skip_trivia();
        if self.chars.peek().is_none() {
            return Ok(None);
        }
        self.read_form().map(Some)
    }

    fn expect_form(&mut self, what: &str) -> Result<Form, RuntimeError> {
        self.skip_trivia();
        if self.chars.peek().is_none() {
            return Err(RuntimeError::with_span(
                "READ_EOF",
                format!("Expected a form after {}.", what),
                self.span_from(self.location()),
            ));
        }
        self.read_form()
    }

    fn read_form(&mut self) -> Result<Form, RuntimeError> {
        if self.depth >= MAX_READ_DEPTH {
            let here = self.location();
            return Err(RuntimeError::with_span(
                "READ_DEPTH",
                format!("Forms nested deeper than {} levels.", MAX_READ_DEPTH),
                self.span_from(here),
            ));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.read_form_inner()
        });
        self.depth -= 1;
        result
    }

    fn read_form_inner(&mut self) -> Result<Form, RuntimeError> {
        let start = self.location();
        let Some(&ch) = self.chars.peek() else {
            return Err(RuntimeError::new("READ_EOF", "Unexpected end of input."));
        };
        match ch {
            '(' => {
                self.bump();
                let items = self.read_sequence(')')?;
                Ok(Form::new(FormKind::List(items), self.span_from(start)))
            }
            '[' => {
                self.bump();
                let items = self.read_sequence(']')?;
                Ok(Form::new(FormKind::Vector(items), self.span_from(start)))
            }
            '{' => {
                self.bump();
                let items = self.read_sequence('}')?;
                let span = self.span_from(start);
                if items.len() % 2 != 0 {
                    return Err(RuntimeError::with_span(
                        "READ_MAP_ODD",
                        "Map literal must contain an even number of forms.",
                        span,
                    ));
                }
                let mut entries = Vec::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                    entries.push((key, value));
                }
                Ok(Form::new(FormKind::Map(entries), span))
            }
            ')' | ']' | '}' => {
                self.bump();
                Err(RuntimeError::with_span(
                    "READ_UNBALANCED",
                    format!("Unmatched delimiter '{}'.", ch),
                    self.span_from(start),
                ))
            }
            '\'' => {
                self.bump();
                let quoted = self.expect_form("quote")?;
                Ok(Form::new(
                    FormKind::List(vec![Form::symbol("quote"), quoted]),
                    self.span_from(start),
                ))
            }
            '^' => {
                self.bump();
                let meta = self.expect_form("metadata marker")?;
                let FormKind::Keyword(flag) = meta.kind else {
                    return Err(RuntimeError::with_span(
                        "READ_META",
                        "Only keyword metadata such as ^:dynamic is supported.",
                        meta.span,
                    ));
                };
                let mut target = self.expect_form("metadata")?;
                target.meta.push(flag);
                Ok(target)
            }
            '"' => self.read_string(start),
            _ => self.read_atom(start),
        }
    }

    fn read_sequence(&mut self, close: char) -> Result<Vec<Form>, RuntimeError> {
        let open_at = self.location();
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.chars.peek() {
                None => {
                    return Err(RuntimeError::with_span(
                        "READ_EOF",
                        format!("Unterminated collection, expected '{}'.", close),
                        self.span_from(open_at),
                    ))
                }
                Some(&ch) if ch == close => {
                    self.bump();
                    return Ok(items);
                }
                Some(_) => items.push(self.read_form()?),
            }
        }
    }

    fn read_string(&mut self, start: SourceLocation) -> Result<Form, RuntimeError> {
        self.bump();
        let mut value = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(RuntimeError::with_span(
                    "READ_EOF",
                    "Unterminated string literal.",
                    self.span_from(start),
                ));
            };
            match ch {
                '"' => break,
                '\\' => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        other => {
                            return Err(RuntimeError::with_span(
                                "READ_STRING_ESCAPE",
                                format!("Unsupported escape {:?}.", other),
                                self.span_from(start),
                            ))
                        }
                    };
                    value.push(escaped);
                }
                _ => value.push(ch),
            }
        }
        Ok(Form::new(FormKind::Str(value), self.span_from(start)))
    }

    fn read_atom(&mut self, start: SourceLocation) -> Result<Form, RuntimeError> {
        let mut token = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace()
                || matches!(ch, '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | ',')
            {
                break;
            }
            token.push(ch);
            self.bump();
        }
        let span = self.span_from(start);
        classify_atom(&token, span)
    }
}

fn classify_atom(token: &str, span: SourceSpan) -> Result<Form, RuntimeError> {
    let kind = match token {
        "nil" => FormKind::Nil,
        "true" => FormKind::Bool(true),
        "false" => FormKind::Bool(false),
        _ if int_regex().is_match(token) => {
            let value = token.parse::<i64>().map_err(|error| {
                RuntimeError::with_span(
                    "READ_NUMBER",
                    format!("Invalid integer \"{}\": {}", token, error),
                    span.clone(),
                )
            })?;
            FormKind::Int(value)
        }
        _ if float_regex().is_match(token) => {
            let value = token.parse::<f64>().map_err(|error| {
                RuntimeError::with_span(
                    "READ_NUMBER",
                    format!("Invalid float \"{}\": {}", token, error),
                    span.clone(),
                )
            })?;
            FormKind::Float(value)
        }
        _ => {
            if let Some(keyword) = token.strip_prefix(':') {
                if keyword.is_empty() {
                    return Err(RuntimeError::with_span(
                        "READ_KEYWORD",
                        "Keyword must have a name.",
                        span,
                    ));
                }
                FormKind::Keyword(keyword.to_string())
            } else {
                FormKind::Symbol(Symbol::parse(token))
            }
        }
    };
    Ok(Form::new(kind, span))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<FormKind> {
        read_all(source)
            .expect("read should pass")
            .into_iter()
            .map(|form| form.kind)
            .collect()
    }

    #[test]
    fn read_all_classifies_atoms() {
        assert_eq!(
            kinds("nil true false 42 -7 1.5 2e3 \"hi\" :k sym ns/f"),
            vec![
                FormKind::Nil,
                FormKind::Bool(true),
                FormKind::Bool(false),
                FormKind::Int(42),
                FormKind::Int(-7),
                FormKind::Float(1.5),
                FormKind::Float(2000.0),
                FormKind::Str("hi".to_string()),
                FormKind::Keyword("k".to_string()),
                FormKind::Symbol(Symbol::simple("sym")),
                FormKind::Symbol(Symbol::qualified("ns", "f")),
            ]
        );
    }

    #[test]
    fn read_all_treats_operators_as_symbols() {
        assert_eq!(
            kinds("+ - <="),
            vec![
                FormKind::Symbol(Symbol::simple("+")),
                FormKind::Symbol(Symbol::simple("-")),
                FormKind::Symbol(Symbol::simple("<=")),
            ]
        );
    }

    #[test]
    fn read_one_builds_nested_collections() {
        let form = read_one("(f [1 2] {:a 1})").expect("read should pass");
        let FormKind::List(items) = form.kind else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 3);
        assert!(items[0].is_symbol("f"));
        assert!(matches!(&items[1].kind, FormKind::Vector(v) if v.len() == 2));
        assert!(matches!(&items[2].kind, FormKind::Map(m) if m.len() == 1));
    }

    #[test]
    fn quote_expands_to_quote_form() {
        let form = read_one("'x").expect("read should pass");
        let FormKind::List(items) = form.kind else {
            panic!("expected list");
        };
        assert!(items[0].is_symbol("quote"));
        assert!(items[1].is_symbol("x"));
    }

    #[test]
    fn metadata_attaches_to_following_form() {
        let form = read_one("(def ^:dynamic *x* 1)").expect("read should pass");
        let FormKind::List(items) = form.kind else {
            panic!("expected list");
        };
        assert!(items[1].has_meta("dynamic"));
        assert!(items[1].is_symbol("*x*"));
    }

    #[test]
    fn comments_and_commas_are_skipped() {
        assert_eq!(
            kinds("; header\n1, 2 ; trailing\n"),
            vec![FormKind::Int(1), FormKind::Int(2)]
        );
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(
            kinds(r#""a\n\"b\"""#),
            vec![FormKind::Str("a\n\"b\"".to_string())]
        );
    }

    #[test]
    fn unterminated_list_reports_eof() {
        let error = read_all("(+ 1 2").expect_err("should fail");
        assert_eq!(error.code, "READ_EOF");
    }

    #[test]
    fn stray_closer_reports_unbalanced() {
        let error = read_all("1 )").expect_err("should fail");
        assert_eq!(error.code, "READ_UNBALANCED");
        let span = error.span.expect("span should be set");
        assert_eq!(span.start.column, 3);
    }

    #[test]
    fn nesting_past_the_limit_is_rejected() {
        let deep = format!("{}{}", "(".repeat(200_000), ")".repeat(200_000));
        let error = read_all(&deep).expect_err("too deep");
        assert_eq!(error.code, "READ_DEPTH");

        let ok = format!("{}{}", "[".repeat(MAX_READ_DEPTH), "]".repeat(MAX_READ_DEPTH));
        assert_eq!(read_all(&ok).expect("at the limit").len(), 1);
    }

    #[test]
    fn odd_map_literal_is_rejected() {
        let error = read_all("{:a}").expect_err("should fail");
        assert_eq!(error.code, "READ_MAP_ODD");
    }

    #[test]
    fn read_one_rejects_trailing_forms() {
        let error = read_one("1 2").expect_err("should fail");
        assert_eq!(error.code, "READ_TRAILING");
    }

    #[test]
    fn read_from_consumes_byte_stream() {
        let forms = read_from("(+ 1 2)".as_bytes()).expect("read should pass");
        assert_eq!(forms.len(), 1);
    }

    #[test]
    fn spans_track_lines() {
        let forms = read_all("1\n  foo").expect("read should pass");
        assert_eq!(forms[1].span.start.line, 2);
        assert_eq!(forms[1].span.start.column, 3);
    }
}
