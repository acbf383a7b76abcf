use std::sync::Arc;

use le_core::RuntimeError;

use crate::eval::{invoke, NativeFn};
use crate::io::{SharedReader, SharedWriter};
use crate::namespace::Namespace;
use crate::overlay::Overlay;
use crate::value::Value;

pub const NS_VAR: &str = "*ns*";
pub const OUT_VAR: &str = "*out*";
pub const ERR_VAR: &str = "*err*";
pub const IN_VAR: &str = "*in*";
pub const UNCHECKED_MATH_VAR: &str = "*unchecked-math*";
pub const WARN_ON_REFLECTION_VAR: &str = "*warn-on-reflection*";

type Builtin = fn(&Overlay, &[Value]) -> Result<Value, RuntimeError>;

pub(crate) fn install(core: &Namespace) {
    let dynamic = [
        (NS_VAR, None),
        (OUT_VAR, Some(Value::host(SharedWriter::stdout()))),
        (ERR_VAR, Some(Value::host(SharedWriter::stderr()))),
        (IN_VAR, Some(Value::host(SharedReader::stdin()))),
        (UNCHECKED_MATH_VAR, Some(Value::Bool(false))),
        (WARN_ON_REFLECTION_VAR, Some(Value::Bool(false))),
    ];
    for (name, root) in dynamic {
        let var = core.intern(name);
        var.set_dynamic();
        if let Some(root) = root {
            var.bind_root(root);
        }
    }

    let functions: &[(&str, Builtin)] = &[
        ("+", add),
        ("-", subtract),
        ("*", multiply),
        ("/", divide),
        ("=", equals),
        ("not=", not_equals),
        ("<", less),
        (">", greater),
        ("<=", less_eq),
        (">=", greater_eq),
        ("not", not),
        ("inc", inc),
        ("dec", dec),
        ("str", str),
        ("print", print),
        ("println", println),
        ("pr-str", pr_str),
        ("read-line", read_line),
        ("list", list),
        ("vector", vector),
        ("hash-map", hash_map),
        ("count", count),
        ("first", first),
        ("rest", rest),
        ("cons", cons),
        ("conj", conj),
        ("get", get),
        ("nth", nth),
        ("apply", apply),
        ("identity", identity),
        ("nil?", is_nil),
        ("fn?", is_fn),
        ("keyword", keyword),
        ("name", name),
        ("ns-name", ns_name),
    ];
    for (name, func) in functions {
        let func = *func;
        core.intern(name)
            .bind_root(Value::Native(Arc::new(NativeFn::new(*name, func))));
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: Option<usize>) -> Result<(), RuntimeError> {
    let ok = args.len() >= min && max.map_or(true, |max| args.len() <= max);
    if ok {
        Ok(())
    } else {
        Err(RuntimeError::new(
            "EXEC_ARITY",
            format!("Wrong number of args ({}) passed to {}.", args.len(), name),
        ))
    }
}

fn type_error(name: &str, expected: &str, value: &Value) -> RuntimeError {
    RuntimeError::new(
        "EXEC_TYPE",
        format!("{} expects {}, got {}.", name, expected, value.type_name()),
    )
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(name: &str, value: &Value) -> Result<Self, RuntimeError> {
        match value {
            Value::Int(int) => Ok(Self::Int(*int)),
            Value::Float(float) => Ok(Self::Float(*float)),
            other => Err(type_error(name, "a number", other)),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(int) => int as f64,
            Self::Float(float) => float,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Int(int) => Value::Int(int),
            Self::Float(float) => Value::Float(float),
        }
    }
}

fn overflow(name: &str) -> RuntimeError {
    RuntimeError::new("EXEC_ARITHMETIC", format!("Integer overflow in {}.", name))
}

fn fold_numbers(
    name: &str,
    init: Num,
    args: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    let mut acc = init;
    for arg in args {
        acc = match (acc, Num::of(name, arg)?) {
            (Num::Int(a), Num::Int(b)) => Num::Int(int_op(a, b).ok_or_else(|| overflow(name))?),
            (a, b) => Num::Float(float_op(a.as_f64(), b.as_f64())),
        };
    }
    Ok(acc.into_value())
}

fn add(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    fold_numbers("+", Num::Int(0), args, i64::checked_add, |a, b| a + b)
}

fn multiply(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    fold_numbers("*", Num::Int(1), args, i64::checked_mul, |a, b| a * b)
}

fn subtract(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("-", args, 1, None)?;
    if args.len() == 1 {
        return fold_numbers("-", Num::Int(0), args, i64::checked_sub, |a, b| a - b);
    }
    let init = Num::of("-", &args[0])?;
    fold_numbers("-", init, &args[1..], i64::checked_sub, |a, b| a - b)
}

fn divide(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("/", args, 1, None)?;
    let (init, rest) = if args.len() == 1 {
        (Num::Int(1), args)
    } else {
        (Num::of("/", &args[0])?, &args[1..])
    };
    let mut acc = init;
    for arg in rest {
        acc = match (acc, Num::of("/", arg)?) {
            (Num::Int(_), Num::Int(0)) => {
                return Err(RuntimeError::new("EXEC_ARITHMETIC", "Divide by zero."))
            }
            (Num::Int(a), Num::Int(b)) if a.checked_rem(b) == Some(0) => {
                Num::Int(a.checked_div(b).ok_or_else(|| overflow("/"))?)
            }
            (a, b) => Num::Float(a.as_f64() / b.as_f64()),
        };
    }
    Ok(acc.into_value())
}

fn compare_chain(
    name: &str,
    args: &[Value],
    holds: fn(f64, f64) -> bool,
) -> Result<Value, RuntimeError> {
    arity(name, args, 1, None)?;
    let numbers = args
        .iter()
        .map(|arg| Num::of(name, arg))
        .collect::<Result<Vec<_>, _>>()?;
    let result = numbers.windows(2).all(|pair| match (pair[0], pair[1]) {
        (Num::Int(a), Num::Int(b)) => int_holds(name, a, b),
        (a, b) => holds(a.as_f64(), b.as_f64()),
    });
    Ok(Value::Bool(result))
}

// Integers compare exactly, without going through f64.
fn int_holds(name: &str, a: i64, b: i64) -> bool {
    match name {
        "<" => a < b,
        ">" => a > b,
        "<=" => a <= b,
        ">=" => a >= b,
        _ => true,
    }
}

fn less(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    compare_chain("<", args, |a, b| a < b)
}

fn greater(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    compare_chain(">", args, |a, b| a > b)
}

fn less_eq(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    compare_chain("<=", args, |a, b| a <= b)
}

fn greater_eq(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    compare_chain(">=", args, |a, b| a >= b)
}

fn equals(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("=", args, 1, None)?;
    Ok(Value::Bool(args.windows(2).all(|pair| pair[0] == pair[1])))
}

fn not_equals(overlay: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    let Value::Bool(equal) = equals(overlay, args)? else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(!equal))
}

fn not(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("not", args, 1, Some(1))?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn inc(overlay: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("inc", args, 1, Some(1))?;
    add(overlay, &[args[0].clone(), Value::Int(1)])
}

fn dec(overlay: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("dec", args, 1, Some(1))?;
    subtract(overlay, &[args[0].clone(), Value::Int(1)])
}

fn str(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::string(
        args.iter().map(Value::to_display_string).collect::<String>(),
    ))
}

fn pr_str(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::string(
        args.iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    ))
}

/// The writer currently bound to `*out*`, falling back to stdout.
pub fn current_writer(overlay: &Overlay, var_name: &str) -> SharedWriter {
    overlay
        .registry()
        .core_var(var_name)
        .and_then(|var| var.deref(overlay))
        .and_then(|value| {
            value
                .as_host()
                .and_then(|object| object.downcast_ref::<SharedWriter>())
                .cloned()
        })
        .unwrap_or_else(SharedWriter::stdout)
}

fn write_out(overlay: &Overlay, text: &str) -> Result<Value, RuntimeError> {
    current_writer(overlay, OUT_VAR)
        .write_str(text)
        .map_err(|error| RuntimeError::new("EXEC_IO", error.to_string()))?;
    Ok(Value::Nil)
}

fn print(overlay: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    let text = args
        .iter()
        .map(Value::to_display_string)
        .collect::<Vec<_>>()
        .join(" ");
    write_out(overlay, &text)
}

fn println(overlay: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    let mut text = args
        .iter()
        .map(Value::to_display_string)
        .collect::<Vec<_>>()
        .join(" ");
    text.push('\n');
    write_out(overlay, &text)
}

fn read_line(overlay: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("read-line", args, 0, Some(0))?;
    let reader = overlay
        .registry()
        .core_var(IN_VAR)
        .and_then(|var| var.deref(overlay))
        .and_then(|value| {
            value
                .as_host()
                .and_then(|object| object.downcast_ref::<SharedReader>())
                .cloned()
        })
        .unwrap_or_else(SharedReader::empty);
    let line = reader
        .read_line()
        .map_err(|error| RuntimeError::new("EXEC_IO", error.to_string()))?;
    Ok(line.map(Value::string).unwrap_or(Value::Nil))
}

fn list(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::list(args.to_vec()))
}

fn vector(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::vector(args.to_vec()))
}

fn hash_map(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    if args.len() % 2 != 0 {
        return Err(RuntimeError::new(
            "EXEC_ARITY",
            "hash-map expects an even number of arguments.",
        ));
    }
    let mut entries: Vec<(Value, Value)> = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        match entries.iter_mut().find(|(key, _)| *key == pair[0]) {
            Some(entry) => entry.1 = pair[1].clone(),
            None => entries.push((pair[0].clone(), pair[1].clone())),
        }
    }
    Ok(Value::map(entries))
}

fn seq_of(name: &str, value: &Value) -> Result<Vec<Value>, RuntimeError> {
    value
        .as_seq()
        .ok_or_else(|| type_error(name, "a collection", value))
}

fn count(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("count", args, 1, Some(1))?;
    let len = match &args[0] {
        Value::Map(entries) => entries.len(),
        Value::Str(text) => text.chars().count(),
        other => seq_of("count", other)?.len(),
    };
    Ok(Value::Int(len as i64))
}

fn first(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("first", args, 1, Some(1))?;
    Ok(seq_of("first", &args[0])?
        .into_iter()
        .next()
        .unwrap_or(Value::Nil))
}

fn rest(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("rest", args, 1, Some(1))?;
    Ok(Value::list(
        seq_of("rest", &args[0])?.into_iter().skip(1).collect(),
    ))
}

fn cons(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("cons", args, 2, Some(2))?;
    let mut items = vec![args[0].clone()];
    items.extend(seq_of("cons", &args[1])?);
    Ok(Value::list(items))
}

fn conj(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("conj", args, 1, None)?;
    let additions = &args[1..];
    match &args[0] {
        Value::Nil => Ok(Value::list(additions.iter().rev().cloned().collect())),
        Value::List(items) => {
            let mut result: Vec<Value> = additions.iter().rev().cloned().collect();
            result.extend(items.iter().cloned());
            Ok(Value::list(result))
        }
        Value::Vector(items) => {
            let mut result = items.as_ref().clone();
            result.extend(additions.iter().cloned());
            Ok(Value::vector(result))
        }
        Value::Map(entries) => {
            let mut result = entries.as_ref().clone();
            for addition in additions {
                let pair = match addition {
                    Value::Vector(pair) if pair.len() == 2 => pair,
                    other => return Err(type_error("conj", "a [key value] vector", other)),
                };
                match result.iter_mut().find(|(key, _)| *key == pair[0]) {
                    Some(entry) => entry.1 = pair[1].clone(),
                    None => result.push((pair[0].clone(), pair[1].clone())),
                }
            }
            Ok(Value::map(result))
        }
        other => Err(type_error("conj", "a collection", other)),
    }
}

fn index_of(name: &str, value: &Value) -> Result<usize, RuntimeError> {
    match value {
        Value::Int(index) if *index >= 0 => Ok(*index as usize),
        other => Err(type_error(name, "a non-negative integer index", other)),
    }
}

fn get(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("get", args, 2, Some(3))?;
    let default = args.get(2).cloned().unwrap_or(Value::Nil);
    let found = match &args[0] {
        Value::Map(_) => args[0].map_get(&args[1]).cloned(),
        Value::Vector(items) => match &args[1] {
            Value::Int(index) if *index >= 0 => items.get(*index as usize).cloned(),
            _ => None,
        },
        _ => None,
    };
    Ok(found.unwrap_or(default))
}

fn nth(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("nth", args, 2, Some(3))?;
    let index = index_of("nth", &args[1])?;
    let items = seq_of("nth", &args[0])?;
    match (items.get(index), args.get(2)) {
        (Some(value), _) => Ok(value.clone()),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(RuntimeError::new(
            "EXEC_INDEX",
            format!("Index {} out of bounds for length {}.", index, items.len()),
        )),
    }
}

fn apply(overlay: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("apply", args, 2, None)?;
    let (callee, rest) = (&args[0], &args[1..]);
    let (spread, fixed) = rest.split_last().unwrap_or((&Value::Nil, &[]));
    let mut call_args = fixed.to_vec();
    call_args.extend(seq_of("apply", spread)?);
    invoke(callee, &call_args, overlay)
}

fn identity(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("identity", args, 1, Some(1))?;
    Ok(args[0].clone())
}

fn is_nil(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("nil?", args, 1, Some(1))?;
    Ok(Value::Bool(args[0].is_nil()))
}

fn is_fn(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("fn?", args, 1, Some(1))?;
    Ok(Value::Bool(matches!(args[0], Value::Fn(_) | Value::Native(_))))
}

fn keyword(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("keyword", args, 1, Some(1))?;
    match &args[0] {
        Value::Keyword(_) => Ok(args[0].clone()),
        Value::Str(text) => Ok(Value::keyword(text.as_ref())),
        Value::Symbol(symbol) => Ok(Value::keyword(symbol.to_string())),
        other => Err(type_error("keyword", "a string", other)),
    }
}

fn name(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("name", args, 1, Some(1))?;
    match &args[0] {
        Value::Str(_) => Ok(args[0].clone()),
        Value::Keyword(text) => Ok(Value::string(text.as_ref())),
        Value::Symbol(symbol) => Ok(Value::string(&symbol.name)),
        Value::Var(var) => Ok(Value::string(var.name())),
        other => Err(type_error("name", "a named value", other)),
    }
}

fn ns_name(_: &Overlay, args: &[Value]) -> Result<Value, RuntimeError> {
    arity("ns-name", args, 1, Some(1))?;
    match &args[0] {
        Value::Namespace(namespace) => Ok(Value::string(namespace.name())),
        other => Err(type_error("ns-name", "a namespace", other)),
    }
}
