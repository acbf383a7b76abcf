use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use le_core::RuntimeError;

use crate::expr::{CaptureSource, Expr, FnTemplate};
use crate::overlay::Overlay;
use crate::value::Value;

/// Deepest chain of nested function calls a thread may run.
pub const MAX_CALL_DEPTH: usize = 10_000;

const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Counts one active call on this thread until dropped.
struct CallDepthGuard;

impl CallDepthGuard {
    fn enter(name: &str) -> Result<Self, RuntimeError> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                return Err(RuntimeError::new(
                    "EXEC_STACK_DEPTH",
                    format!("Call depth exceeded {} while calling {}.", MAX_CALL_DEPTH, name),
                ));
            }
            depth.set(depth.get() + 1);
            Ok(Self)
        })
    }
}

impl Drop for CallDepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

pub type NativeFnImpl = dyn Fn(&Overlay, &[Value]) -> Result<Value, RuntimeError> + Send + Sync;

/// A function implemented in Rust, either in the base library or supplied by a host.
pub struct NativeFn {
    name: String,
    func: Box<NativeFnImpl>,
}

impl NativeFn {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&Overlay, &[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, overlay: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.func)(overlay, args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

#[derive(Debug)]
pub struct Closure {
    template: Arc<FnTemplate>,
    captured: Vec<Value>,
}

impl Closure {
    pub fn name(&self) -> Option<&str> {
        self.template.name.as_deref()
    }

    pub fn arity(&self) -> usize {
        self.template.arity
    }

    pub fn is_variadic(&self) -> bool {
        self.template.variadic
    }
}

/// Runs a top-level expression (no enclosing function frame).
pub fn execute(expr: &Expr, frame_size: usize, overlay: &Overlay) -> Result<Value, RuntimeError> {
    let mut frame = vec![Value::Nil; frame_size];
    exec(expr, &mut frame, &[], overlay)
}

pub fn invoke(callee: &Value, args: &[Value], overlay: &Overlay) -> Result<Value, RuntimeError> {
    match callee {
        Value::Fn(closure) => call_closure(closure, args, overlay),
        Value::Native(native) => native.call(overlay, args),
        Value::Keyword(_) => match args {
            [target] => Ok(target.map_get(callee).cloned().unwrap_or(Value::Nil)),
            [target, default] => Ok(target
                .map_get(callee)
                .cloned()
                .unwrap_or_else(|| default.clone())),
            _ => Err(arity_error(&callee.to_string(), args.len())),
        },
        Value::Var(var) => {
            let target = var
                .deref(overlay)
                .ok_or_else(|| unbound_error(&var.qualified_name().to_string()))?;
            invoke(&target, args, overlay)
        }
        other => Err(RuntimeError::new(
            "EXEC_NOT_CALLABLE",
            format!("{} of type {} is not callable.", other, other.type_name()),
        )),
    }
}

fn call_closure(
    closure: &Arc<Closure>,
    args: &[Value],
    overlay: &Overlay,
) -> Result<Value, RuntimeError> {
    let template = &closure.template;
    let arity_ok = if template.variadic {
        args.len() >= template.arity
    } else {
        args.len() == template.arity
    };
    if !arity_ok {
        return Err(arity_error(closure.name().unwrap_or("anonymous fn"), args.len()));
    }

    let mut frame = vec![Value::Nil; template.frame_size];
    frame[..template.arity].clone_from_slice(&args[..template.arity]);
    if template.variadic {
        let rest = args[template.arity..].to_vec();
        frame[template.arity] = if rest.is_empty() { Value::Nil } else { Value::list(rest) };
    }
    if let Some(slot) = template.self_slot {
        frame[slot] = Value::Fn(closure.clone());
    }
    let _guard = CallDepthGuard::enter(closure.name().unwrap_or("anonymous fn"))?;
    exec(&template.body, &mut frame, &closure.captured, overlay)
}

fn arity_error(name: &str, count: usize) -> RuntimeError {
    RuntimeError::new(
        "EXEC_ARITY",
        format!("Wrong number of args ({}) passed to {}.", count, name),
    )
}

fn unbound_error(name: &str) -> RuntimeError {
    RuntimeError::new("EXEC_UNBOUND_VAR", format!("Var {} is unbound.", name))
}

fn exec(
    expr: &Expr,
    frame: &mut Vec<Value>,
    captured: &[Value],
    overlay: &Overlay,
) -> Result<Value, RuntimeError> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        exec_inner(expr, frame, captured, overlay)
    })
}

fn exec_inner(
    expr: &Expr,
    frame: &mut Vec<Value>,
    captured: &[Value],
    overlay: &Overlay,
) -> Result<Value, RuntimeError> {
    match expr {
        Expr::Const(value) => Ok(value.clone()),
        Expr::Local(slot) => Ok(frame[*slot].clone()),
        Expr::Capture(index) => Ok(captured[*index].clone()),
        Expr::Var(var) => var
            .deref(overlay)
            .ok_or_else(|| unbound_error(&var.qualified_name().to_string())),
        Expr::If {
            test,
            then,
            otherwise,
        } => {
            if exec(test, frame, captured, overlay)?.is_truthy() {
                exec(then, frame, captured, overlay)
            } else {
                exec(otherwise, frame, captured, overlay)
            }
        }
        Expr::Do(body) => {
            let mut result = Value::Nil;
            for expr in body {
                result = exec(expr, frame, captured, overlay)?;
            }
            Ok(result)
        }
        Expr::Let { bindings, body } => {
            for (slot, init) in bindings {
                let value = exec(init, frame, captured, overlay)?;
                frame[*slot] = value;
            }
            exec(body, frame, captured, overlay)
        }
        Expr::Fn(template) => {
            let captured = template
                .captures
                .iter()
                .map(|source| match source {
                    CaptureSource::Local(slot) => frame[*slot].clone(),
                    CaptureSource::Capture(index) => captured[*index].clone(),
                })
                .collect();
            Ok(Value::Fn(Arc::new(Closure {
                template: template.clone(),
                captured,
            })))
        }
        Expr::Call { callee, args } => {
            let callee = exec(callee, frame, captured, overlay)?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(exec(arg, frame, captured, overlay)?);
            }
            invoke(&callee, &values, overlay)
        }
        Expr::Def { var, init } => {
            if let Some(init) = init {
                let value = exec(init, frame, captured, overlay)?;
                var.bind_root(value);
            }
            Ok(Value::Var(var.clone()))
        }
        Expr::Binding { bindings, body } => {
            let mut values = Vec::with_capacity(bindings.len());
            for (var, init) in bindings {
                if !var.is_dynamic() {
                    return Err(RuntimeError::new(
                        "EXEC_BINDING_NOT_DYNAMIC",
                        format!(
                            "Can't dynamically bind non-dynamic var {}.",
                            var.qualified_name()
                        ),
                    ));
                }
                values.push((var.clone(), exec(init, frame, captured, overlay)?));
            }
            let inner = overlay.push(values);
            exec(body, frame, captured, &inner)
        }
        Expr::Vector(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(exec(item, frame, captured, overlay)?);
            }
            Ok(Value::vector(values))
        }
        Expr::Map(entries) => {
            let mut values: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let key = exec(key, frame, captured, overlay)?;
                let value = exec(value, frame, captured, overlay)?;
                if let Some(existing) = values.iter_mut().find(|(k, _)| *k == key) {
                    existing.1 = value;
                } else {
                    values.push((key, value));
                }
            }
            Ok(Value::map(values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NamespaceRegistry;

    fn overlay() -> Overlay {
        let registry = Arc::new(NamespaceRegistry::new());
        let namespace = registry.find_or_create("eval.test");
        Overlay::new(registry, namespace)
    }

    fn core_call(overlay: &Overlay, name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(Expr::Var(
                overlay.namespace().mapping(name).expect("core fn referred"),
            )),
            args,
        }
    }

    #[test]
    fn call_resolves_referred_core_function() {
        let overlay = overlay();
        let expr = core_call(
            &overlay,
            "+",
            vec![Expr::Const(Value::Int(1)), Expr::Const(Value::Int(2))],
        );
        assert_eq!(execute(&expr, 0, &overlay).expect("exec"), Value::Int(3));
    }

    #[test]
    fn closures_capture_locals_by_value() {
        let overlay = overlay();
        // (let [a 10] (fn [b] (+ a b)))
        let template = Arc::new(FnTemplate {
            name: None,
            arity: 1,
            variadic: false,
            self_slot: None,
            frame_size: 1,
            captures: vec![CaptureSource::Local(0)],
            body: core_call(&overlay, "+", vec![Expr::Capture(0), Expr::Local(0)]),
        });
        let expr = Expr::Let {
            bindings: vec![(0, Expr::Const(Value::Int(10)))],
            body: Box::new(Expr::Fn(template)),
        };
        let closure = execute(&expr, 1, &overlay).expect("exec");
        let result = invoke(&closure, &[Value::Int(5)], &overlay).expect("invoke");
        assert_eq!(result, Value::Int(15));
    }

    #[test]
    fn variadic_closure_collects_rest_args() {
        let overlay = overlay();
        let template = Arc::new(FnTemplate {
            name: Some("rest".to_string()),
            arity: 1,
            variadic: true,
            self_slot: None,
            frame_size: 2,
            captures: Vec::new(),
            body: Expr::Local(1),
        });
        let closure = execute(&Expr::Fn(template), 0, &overlay).expect("exec");
        assert_eq!(
            invoke(&closure, &[Value::Int(1), Value::Int(2), Value::Int(3)], &overlay)
                .expect("invoke"),
            Value::list(vec![Value::Int(2), Value::Int(3)])
        );
        assert_eq!(invoke(&closure, &[Value::Int(1)], &overlay).expect("invoke"), Value::Nil);
        let error = invoke(&closure, &[], &overlay).expect_err("too few");
        assert_eq!(error.code, "EXEC_ARITY");
    }

    #[test]
    fn binding_requires_dynamic_var_and_scopes_value() {
        let overlay = overlay();
        let var = overlay.namespace().intern("*level*");
        var.bind_root(Value::Int(0));
        let expr = Expr::Binding {
            bindings: vec![(var.clone(), Expr::Const(Value::Int(1)))],
            body: Box::new(Expr::Var(var.clone())),
        };
        let error = execute(&expr, 0, &overlay).expect_err("not dynamic");
        assert_eq!(error.code, "EXEC_BINDING_NOT_DYNAMIC");

        var.set_dynamic();
        assert_eq!(execute(&expr, 0, &overlay).expect("exec"), Value::Int(1));
        assert_eq!(execute(&Expr::Var(var), 0, &overlay).expect("exec"), Value::Int(0));
    }

    #[test]
    fn unbound_var_is_an_error() {
        let overlay = overlay();
        let var = overlay.namespace().intern("ghost");
        let error = execute(&Expr::Var(var), 0, &overlay).expect_err("unbound");
        assert_eq!(error.code, "EXEC_UNBOUND_VAR");
        assert!(error.message.contains("eval.test/ghost"));
    }

    #[test]
    fn runaway_recursion_fails_with_depth_error() {
        let overlay = overlay();
        let var = overlay.namespace().intern("loop-forever");
        // (fn loop-forever [] (loop-forever))
        let template = Arc::new(FnTemplate {
            name: Some("loop-forever".to_string()),
            arity: 0,
            variadic: false,
            self_slot: None,
            frame_size: 0,
            captures: Vec::new(),
            body: Expr::Call {
                callee: Box::new(Expr::Var(var.clone())),
                args: Vec::new(),
            },
        });
        let closure = execute(&Expr::Fn(template), 0, &overlay).expect("exec");
        var.bind_root(closure.clone());

        let error = invoke(&closure, &[], &overlay).expect_err("too deep");
        assert_eq!(error.code, "EXEC_STACK_DEPTH");
        CALL_DEPTH.with(|depth| assert_eq!(depth.get(), 0));

        let shallow = core_call(&overlay, "inc", vec![Expr::Const(Value::Int(1))]);
        assert_eq!(execute(&shallow, 0, &overlay).expect("exec"), Value::Int(2));
    }

    #[test]
    fn keyword_invocation_looks_up_maps() {
        let overlay = overlay();
        let map = Value::map(vec![(Value::keyword("a"), Value::Int(1))]);
        assert_eq!(
            invoke(&Value::keyword("a"), &[map.clone()], &overlay).expect("get"),
            Value::Int(1)
        );
        assert_eq!(
            invoke(&Value::keyword("b"), &[map, Value::Int(9)], &overlay).expect("default"),
            Value::Int(9)
        );
    }

    #[test]
    fn non_callable_values_fail() {
        let overlay = overlay();
        let error = invoke(&Value::Int(1), &[], &overlay).expect_err("not callable");
        assert_eq!(error.code, "EXEC_NOT_CALLABLE");
    }
}
