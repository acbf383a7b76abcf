use std::sync::Arc;

use crate::value::Value;
use crate::var::Var;

/// Compiled form, with symbols already resolved to locals, captures or vars.
#[derive(Debug, Clone)]
pub enum Expr {
    Const(Value),
    Local(usize),
    Capture(usize),
    Var(Arc<Var>),
    If {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Do(Vec<Expr>),
    Let {
        bindings: Vec<(usize, Expr)>,
        body: Box<Expr>,
    },
    Fn(Arc<FnTemplate>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Def {
        var: Arc<Var>,
        init: Option<Box<Expr>>,
    },
    Binding {
        bindings: Vec<(Arc<Var>, Expr)>,
        body: Box<Expr>,
    },
    Vector(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    Local(usize),
    Capture(usize),
}

#[derive(Debug)]
pub struct FnTemplate {
    pub name: Option<String>,
    pub arity: usize,
    pub variadic: bool,
    /// Slot receiving the closure itself for named functions.
    pub self_slot: Option<usize>,
    pub frame_size: usize,
    pub captures: Vec<CaptureSource>,
    pub body: Expr,
}
