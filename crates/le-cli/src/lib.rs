use std::ffi::OsString;

use clap::Parser;
use le_api::{BindingSet, EngineConfig, EngineFactory, IsolationMode, LispEngine, Value};
use tracing::debug;

mod cli_args;
mod error_map;
pub mod logging;
mod source_loader;

pub(crate) use cli_args::{CallArgs, Cli, EngineArgs, EvalArgs, Mode, RunArgs};
pub(crate) use error_map::{emit_error, map_json_arg, CliError};
pub(crate) use source_loader::{load_file, load_files, load_scripts_dir};

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        Mode::Eval(args) => run_eval(args),
        Mode::Run(args) => run_files(args),
        Mode::Call(args) => run_call(args),
        Mode::Info(args) => run_info(args),
    }
}

fn build_factory(args: &EngineArgs) -> Result<EngineFactory, CliError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_str(&load_file(path)?.text)?,
        None => EngineConfig::from_env(),
    };
    if let Some(mode) = &args.isolation {
        config = config.with_isolation(mode.parse::<IsolationMode>()?);
    }
    Ok(EngineFactory::new(config))
}

fn parse_json_value(raw: &str) -> Result<Value, CliError> {
    let json = serde_json::from_str::<serde_json::Value>(raw).map_err(map_json_arg)?;
    Ok(Value::from_json(&json))
}

pub(crate) fn parse_bindings(raw: &[String]) -> Result<BindingSet, CliError> {
    let mut bindings = BindingSet::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(CliError::usage(
                "CLI_BIND_INVALID",
                format!("Expected key=json, got \"{}\".", entry),
            ));
        };
        if key.is_empty() {
            return Err(CliError::usage("CLI_BIND_INVALID", "Binding key is empty."));
        }
        bindings.insert(key, parse_json_value(value)?);
    }
    Ok(bindings)
}

fn emit_value(value: &Value) -> i32 {
    println!("RESULT:OK");
    println!("VALUE:{}", value);
    0
}

fn run_eval(args: EvalArgs) -> Result<i32, CliError> {
    let engine = build_factory(&args.engine)?.script_engine();
    let bindings = parse_bindings(&args.bind)?;
    let value = engine.eval_with_bindings(&args.expr, &bindings)?;
    Ok(emit_value(&value))
}

fn run_files(args: RunArgs) -> Result<i32, CliError> {
    let sources = match &args.scripts_dir {
        Some(dir) => load_scripts_dir(dir)?,
        None => load_files(&args.file)?,
    };
    let engine = build_factory(&args.engine)?.script_engine();
    for (key, value) in &parse_bindings(&args.bind)? {
        engine.put(key.clone(), value.clone());
    }
    let mut last = Value::Nil;
    for source in &sources {
        debug!(path = %source.path.display(), "running source");
        last = engine.eval(&source.text)?;
    }
    println!("FILES:{}", sources.len());
    Ok(emit_value(&last))
}

fn run_call(args: CallArgs) -> Result<i32, CliError> {
    let source = load_file(&args.file)?;
    let engine: LispEngine = build_factory(&args.engine)?.script_engine();
    engine.eval(&source.text)?;
    let call_args = args
        .arg
        .iter()
        .map(|raw| parse_json_value(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let value = engine.invoke_function(&args.function, &call_args)?;
    Ok(emit_value(&value))
}

fn run_info(args: EngineArgs) -> Result<i32, CliError> {
    let factory = build_factory(&args)?;
    println!("RESULT:OK");
    println!("ENGINE:{}", factory.engine_name());
    println!("ENGINE_VERSION:{}", factory.engine_version());
    println!("LANGUAGE:{}", factory.language_name());
    println!("LANGUAGE_VERSION:{}", factory.language_version());
    println!("NAMES:{}", factory.names().join(","));
    println!("EXTENSIONS:{}", factory.extensions().join(","));
    println!("MIME_TYPES:{}", factory.mime_types().join(","));
    println!("THREADING:{}", factory.parameter(le_api::PARAM_THREADING).unwrap_or_default());
    println!("ISOLATION:{:?}", factory.isolation());
    Ok(0)
}

#[cfg(test)]
mod tests;
