use std::sync::Arc;

use le_core::{Form, FormKind, RuntimeError, Symbol};
use le_runtime::{Expr, FnTemplate, Overlay, Var};
use tracing::trace;

use crate::quote::form_to_value;
use crate::scope::Scopes;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

const SPECIAL_FORMS: &[&str] = &["def", "fn", "fn*", "let", "if", "do", "quote", "binding"];

pub(crate) fn is_special_form(name: &str) -> bool {
    SPECIAL_FORMS.contains(&name)
}

fn syntax_error(form: &Form, message: impl Into<String>) -> RuntimeError {
    RuntimeError::with_span("COMPILE_SYNTAX", message, form.span.clone())
}

pub(crate) struct Analyzer<'a> {
    overlay: &'a Overlay,
    scopes: Scopes,
}

impl<'a> Analyzer<'a> {
    pub(crate) fn new(overlay: &'a Overlay) -> Self {
        Self {
            overlay,
            scopes: Scopes::new(),
        }
    }

    pub(crate) fn top_frame_size(&self) -> usize {
        self.scopes.top_frame_size()
    }

    pub(crate) fn analyze(&mut self, form: &Form) -> Result<Expr, RuntimeError> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.analyze_form(form))
    }

    fn analyze_form(&mut self, form: &Form) -> Result<Expr, RuntimeError> {
        match &form.kind {
            FormKind::Symbol(symbol) => self.analyze_symbol(form, symbol),
            FormKind::List(items) => self.analyze_list(form, items),
            FormKind::Vector(items) => Ok(Expr::Vector(self.analyze_all(items)?)),
            FormKind::Map(entries) => {
                let mut lowered = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    lowered.push((self.analyze(key)?, self.analyze(value)?));
                }
                Ok(Expr::Map(lowered))
            }
            _ => Ok(Expr::Const(form_to_value(form))),
        }
    }

    fn analyze_all(&mut self, forms: &[Form]) -> Result<Vec<Expr>, RuntimeError> {
        forms.iter().map(|form| self.analyze(form)).collect()
    }

    fn analyze_body(&mut self, forms: &[Form]) -> Result<Expr, RuntimeError> {
        let mut exprs = self.analyze_all(forms)?;
        Ok(match exprs.len() {
            0 => Expr::Const(le_runtime::Value::Nil),
            1 => exprs.remove(0),
            _ => Expr::Do(exprs),
        })
    }

    fn resolve_var(&self, symbol: &Symbol) -> Option<Arc<Var>> {
        if symbol.is_qualified() {
            self.overlay.registry().resolve_qualified(symbol)
        } else {
            self.overlay.namespace().mapping(&symbol.name)
        }
    }

    fn analyze_symbol(&mut self, form: &Form, symbol: &Symbol) -> Result<Expr, RuntimeError> {
        if !symbol.is_qualified() {
            if let Some(local) = self.scopes.resolve(&symbol.name) {
                return Ok(local);
            }
        }
        self.resolve_var(symbol).map(Expr::Var).ok_or_else(|| {
            RuntimeError::with_span(
                "COMPILE_UNRESOLVED_SYMBOL",
                format!("Unable to resolve symbol: {} in this context.", symbol),
                form.span.clone(),
            )
        })
    }

    fn analyze_list(&mut self, form: &Form, items: &[Form]) -> Result<Expr, RuntimeError> {
        let Some((head, args)) = items.split_first() else {
            return Ok(Expr::Const(le_runtime::Value::list(Vec::new())));
        };
        if let Some(symbol) = head.as_symbol() {
            if !symbol.is_qualified() && is_special_form(&symbol.name) {
                return match symbol.name.as_str() {
                    "def" => self.analyze_def(form, args),
                    "fn" | "fn*" => self.analyze_fn(form, args),
                    "let" => self.analyze_let(form, args),
                    "if" => self.analyze_if(form, args),
                    "do" => self.analyze_body(args),
                    "quote" => match args {
                        [quoted] => Ok(Expr::Const(form_to_value(quoted))),
                        _ => Err(syntax_error(form, "quote expects exactly one form.")),
                    },
                    _ => self.analyze_binding(form, args),
                };
            }
        }
        Ok(Expr::Call {
            callee: Box::new(self.analyze(head)?),
            args: self.analyze_all(args)?,
        })
    }

    fn analyze_def(&mut self, form: &Form, args: &[Form]) -> Result<Expr, RuntimeError> {
        let (name_form, init) = match args {
            [name] => (name, None),
            [name, init] => (name, Some(init)),
            _ => return Err(syntax_error(form, "def expects a name and an optional value.")),
        };
        let name = match name_form.as_symbol() {
            Some(symbol) if !symbol.is_qualified() => &symbol.name,
            _ => return Err(syntax_error(name_form, "def name must be an unqualified symbol.")),
        };
        let var = self.overlay.namespace().intern(name);
        if name_form.has_meta("dynamic") {
            var.set_dynamic();
        }
        trace!(namespace = self.overlay.namespace().name(), name = %name, "def interned");
        let init = init.map(|init| self.analyze(init)).transpose()?.map(Box::new);
        Ok(Expr::Def { var, init })
    }

    fn analyze_fn(&mut self, form: &Form, args: &[Form]) -> Result<Expr, RuntimeError> {
        let (name, rest) = match args.split_first() {
            Some((first, rest)) if first.as_symbol().is_some() => {
                (first.as_symbol().map(|symbol| symbol.name.clone()), rest)
            }
            _ => (None, args),
        };
        let Some((params_form, body)) = rest.split_first() else {
            return Err(syntax_error(form, "fn expects a parameter vector."));
        };
        let FormKind::Vector(params) = &params_form.kind else {
            return Err(syntax_error(params_form, "fn parameters must be a vector."));
        };

        let mut fixed = Vec::new();
        let mut rest_param = None;
        let mut iter = params.iter();
        while let Some(param) = iter.next() {
            if param.is_symbol("&") {
                rest_param = match (iter.next(), iter.next()) {
                    (Some(rest), None) => Some(param_name(rest)?),
                    _ => {
                        return Err(syntax_error(
                            param,
                            "& must be followed by exactly one parameter.",
                        ))
                    }
                };
                break;
            }
            fixed.push(param_name(param)?);
        }

        self.scopes.enter_fn();
        for param in &fixed {
            self.scopes.declare(param);
        }
        if let Some(rest) = &rest_param {
            self.scopes.declare(rest);
        }
        let self_slot = name.as_deref().map(|name| self.scopes.declare(name));
        let body = self.analyze_body(body);
        let frame = self.scopes.exit_fn();
        let body = body?;

        Ok(Expr::Fn(Arc::new(FnTemplate {
            name,
            arity: fixed.len(),
            variadic: rest_param.is_some(),
            self_slot,
            frame_size: frame.frame_size,
            captures: frame.captures,
            body,
        })))
    }

    fn analyze_let(&mut self, form: &Form, args: &[Form]) -> Result<Expr, RuntimeError> {
        let Some((bindings_form, body)) = args.split_first() else {
            return Err(syntax_error(form, "let expects a binding vector."));
        };
        let FormKind::Vector(pairs) = &bindings_form.kind else {
            return Err(syntax_error(bindings_form, "let bindings must be a vector."));
        };
        if pairs.len() % 2 != 0 {
            return Err(syntax_error(bindings_form, "let bindings need an even number of forms."));
        }

        let mark = self.scopes.mark();
        let result = self.analyze_let_inner(pairs, body);
        self.scopes.truncate(mark);
        result
    }

    fn analyze_let_inner(&mut self, pairs: &[Form], body: &[Form]) -> Result<Expr, RuntimeError> {
        let mut bindings = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            let name = param_name(&pair[0])?;
            // The init sees earlier bindings only, not the one being defined.
            let init = self.analyze(&pair[1])?;
            let slot = self.scopes.declare(&name);
            bindings.push((slot, init));
        }
        Ok(Expr::Let {
            bindings,
            body: Box::new(self.analyze_body(body)?),
        })
    }

    fn analyze_if(&mut self, form: &Form, args: &[Form]) -> Result<Expr, RuntimeError> {
        let (test, then, otherwise) = match args {
            [test, then] => (test, then, None),
            [test, then, otherwise] => (test, then, Some(otherwise)),
            _ => {
                return Err(syntax_error(
                    form,
                    "if expects a test, a then branch and an optional else branch.",
                ))
            }
        };
        Ok(Expr::If {
            test: Box::new(self.analyze(test)?),
            then: Box::new(self.analyze(then)?),
            otherwise: Box::new(match otherwise {
                Some(otherwise) => self.analyze(otherwise)?,
                None => Expr::Const(le_runtime::Value::Nil),
            }),
        })
    }

    fn analyze_binding(&mut self, form: &Form, args: &[Form]) -> Result<Expr, RuntimeError> {
        let Some((bindings_form, body)) = args.split_first() else {
            return Err(syntax_error(form, "binding expects a binding vector."));
        };
        let FormKind::Vector(pairs) = &bindings_form.kind else {
            return Err(syntax_error(bindings_form, "binding bindings must be a vector."));
        };
        if pairs.len() % 2 != 0 {
            return Err(syntax_error(bindings_form, "binding needs an even number of forms."));
        }
        let mut bindings = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            let var = pair[0]
                .as_symbol()
                .and_then(|symbol| self.resolve_var(symbol))
                .ok_or_else(|| {
                    RuntimeError::with_span(
                        "COMPILE_BINDING_TARGET",
                        "binding targets must name existing vars.",
                        pair[0].span.clone(),
                    )
                })?;
            bindings.push((var, self.analyze(&pair[1])?));
        }
        Ok(Expr::Binding {
            bindings,
            body: Box::new(self.analyze_body(body)?),
        })
    }
}

fn param_name(form: &Form) -> Result<String, RuntimeError> {
    match form.as_symbol() {
        Some(symbol) if !symbol.is_qualified() && symbol.name != "&" => Ok(symbol.name.clone()),
        _ => Err(syntax_error(form, "Binding names must be unqualified symbols.")),
    }
}
