use super::*;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|item| item.to_string()).collect()
}

#[test]
fn parse_bindings_reads_json_values() {
    let bindings =
        parse_bindings(&args(&["x=5", "name=\"a\"", "flags=[true,null]"])).expect("bindings");
    assert_eq!(bindings.get("x"), Some(&Value::Int(5)));
    assert_eq!(bindings.get("name"), Some(&Value::string("a")));
    assert_eq!(
        bindings.get("flags"),
        Some(&Value::vector(vec![Value::Bool(true), Value::Nil]))
    );
}

#[test]
fn parse_bindings_rejects_malformed_entries() {
    let error = parse_bindings(&args(&["novalue"])).expect_err("missing =");
    assert_eq!(error.code(), Some("CLI_BIND_INVALID"));
    let error = parse_bindings(&args(&["=1"])).expect_err("empty key");
    assert_eq!(error.code(), Some("CLI_BIND_INVALID"));
    let error = parse_bindings(&args(&["x={"])).expect_err("bad json");
    assert_eq!(error.code(), Some("CLI_JSON_INVALID"));
}

#[test]
fn build_factory_applies_isolation_flag() {
    let factory = build_factory(&EngineArgs {
        isolation: Some("per-scripting-context".to_string()),
        config: None,
    })
    .expect("factory");
    assert_eq!(factory.isolation(), IsolationMode::PerScriptingContext);

    let error = build_factory(&EngineArgs {
        isolation: Some("sideways".to_string()),
        config: None,
    })
    .expect_err("unknown mode");
    assert_eq!(error.kind(), "INVALID_ARGUMENT");
}

#[test]
fn cli_returns_exit_codes() {
    assert_eq!(run_cli_from_args(["le-cli", "eval", "--expr", "(+ 1 2)"]), 0);
    assert_eq!(run_cli_from_args(["le-cli", "eval", "--expr", "(missing)"]), 1);
    assert_eq!(run_cli_from_args(["le-cli", "info"]), 0);
    assert_ne!(run_cli_from_args(["le-cli", "bogus"]), 0);
}
