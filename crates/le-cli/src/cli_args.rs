use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "le-cli")]
#[command(about = "Run Lisp sources through the embeddable lisp-engine")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    Eval(EvalArgs),
    Run(RunArgs),
    Call(CallArgs),
    Info(EngineArgs),
}

#[derive(Debug, Args)]
pub(crate) struct EngineArgs {
    /// One of forced, per-engine, per-scripting-context.
    #[arg(long = "isolation")]
    pub(crate) isolation: Option<String>,
    /// JSON file with engine configuration.
    #[arg(long = "config")]
    pub(crate) config: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct EvalArgs {
    #[arg(long = "expr")]
    pub(crate) expr: String,
    /// Engine-scope binding as key=json; repeatable.
    #[arg(long = "bind")]
    pub(crate) bind: Vec<String>,
    #[command(flatten)]
    pub(crate) engine: EngineArgs,
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    #[arg(long = "file", conflicts_with = "scripts_dir", required_unless_present = "scripts_dir")]
    pub(crate) file: Vec<String>,
    #[arg(long = "scripts-dir")]
    pub(crate) scripts_dir: Option<String>,
    #[arg(long = "bind")]
    pub(crate) bind: Vec<String>,
    #[command(flatten)]
    pub(crate) engine: EngineArgs,
}

#[derive(Debug, Args)]
pub(crate) struct CallArgs {
    #[arg(long = "file")]
    pub(crate) file: String,
    #[arg(long = "function")]
    pub(crate) function: String,
    /// Positional argument as JSON; repeatable.
    #[arg(long = "arg")]
    pub(crate) arg: Vec<String>,
    #[command(flatten)]
    pub(crate) engine: EngineArgs,
}
