use std::sync::Arc;

use le_core::{Form, RuntimeError};
use le_runtime::{execute, Closure, Expr, Overlay, Value};

mod analyze;
mod quote;
mod scope;

pub use quote::form_to_value;

/// A lowered top-level form and the size of the frame it runs in.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub expr: Expr,
    pub frame_size: usize,
}

impl Compiled {
    pub fn run(&self, overlay: &Overlay) -> Result<Value, RuntimeError> {
        execute(&self.expr, self.frame_size, overlay)
    }
}

/// Lowers one form against the namespace of `overlay`. `def` interns its var
/// while compiling so later forms in the same source can refer to it.
pub fn compile(form: &Form, overlay: &Overlay) -> Result<Compiled, RuntimeError> {
    let mut analyzer = analyze::Analyzer::new(overlay);
    let expr = analyzer.analyze(form)?;
    Ok(Compiled {
        expr,
        frame_size: analyzer.top_frame_size(),
    })
}

/// Compiles `forms` as the body of `(fn [] forms...)` and returns the closure.
/// The body does not run.
pub fn compile_thunk(forms: &[Form], overlay: &Overlay) -> Result<Arc<Closure>, RuntimeError> {
    let compiled = compile(&Form::thunk(forms.to_vec()), overlay)?;
    match compiled.run(overlay)? {
        Value::Fn(closure) => Ok(closure),
        other => Err(RuntimeError::new(
            "COMPILE_THUNK",
            format!("Expected a function, got {}.", other.type_name()),
        )),
    }
}

pub fn is_special_form(name: &str) -> bool {
    analyze::is_special_form(name)
}
