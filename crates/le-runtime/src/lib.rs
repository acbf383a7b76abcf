mod builtins;
mod eval;
mod expr;
mod io;
mod namespace;
mod overlay;
mod registry;
mod value;
mod var;

pub use builtins::{
    current_writer, ERR_VAR, IN_VAR, NS_VAR, OUT_VAR, UNCHECKED_MATH_VAR, WARN_ON_REFLECTION_VAR,
};
pub use eval::{execute, invoke, Closure, NativeFn, NativeFnImpl};
pub use expr::{CaptureSource, Expr, FnTemplate};
pub use io::{CaptureBuffer, SharedReader, SharedWriter};
pub use namespace::Namespace;
pub use overlay::Overlay;
pub use registry::{NamespaceRegistry, CORE_NAMESPACE};
pub use value::{HostObject, Value};
pub use var::Var;
