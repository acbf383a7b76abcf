use std::path::PathBuf;
use std::process::{Command, Output};

fn demos_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_le-cli"))
        .args(args)
        .output()
        .expect("cli should execute")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn eval_prints_value() {
    let output = run(&["eval", "--expr", "(+ 1 2)"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("RESULT:OK"), "{}", text);
    assert!(text.contains("VALUE:3"), "{}", text);
}

#[test]
fn eval_uses_bindings() {
    let output = run(&[
        "eval",
        "--expr",
        "(str greeting \" \" n)",
        "--bind",
        "greeting=\"hi\"",
        "--bind",
        "n=2",
    ]);
    let text = stdout(&output);
    assert!(text.contains("VALUE:\"hi 2\""), "{}", text);
}

#[test]
fn eval_failure_reports_error_lines() {
    let output = run(&["eval", "--expr", "(undefined-fn 1)"]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("RESULT:ERROR"), "{}", text);
    assert!(text.contains("ERROR_KIND:EXECUTION"), "{}", text);
    assert!(text.contains("ERROR_CODE:COMPILE_UNRESOLVED_SYMBOL"), "{}", text);
    assert!(text.contains("ERROR_MSG_JSON:\""), "{}", text);
}

#[test]
fn runaway_recursion_reports_error_instead_of_aborting() {
    let output = run(&["eval", "--expr", "(def f (fn [n] (f n))) (f 1)"]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("RESULT:ERROR"), "{}", text);
    assert!(text.contains("ERROR_CODE:EXEC_STACK_DEPTH"), "{}", text);
}

#[test]
fn run_scripts_dir_evaluates_files_in_order() {
    let dir = demos_root().join("basics");
    let output = run(&["run", "--scripts-dir", dir.to_str().expect("utf8 path")]);
    let text = stdout(&output);
    assert!(output.status.success(), "{}", text);
    assert!(text.contains("square of 12 is 144"), "{}", text);
    assert!(text.contains("hello, world"), "{}", text);
    assert!(text.contains("hi, again"), "{}", text);
    assert!(text.contains("FILES:2"), "{}", text);
    assert!(text.contains("VALUE:19"), "{}", text);
}

#[test]
fn call_invokes_named_function() {
    let file = demos_root().join("greeter.lisp");
    let output = run(&[
        "call",
        "--file",
        file.to_str().expect("utf8 path"),
        "--function",
        "greet",
        "--arg",
        "\"bob\"",
    ]);
    let text = stdout(&output);
    assert!(output.status.success(), "{}", text);
    assert!(text.contains("VALUE:\"hello, bob\""), "{}", text);

    let output = run(&[
        "call",
        "--file",
        file.to_str().expect("utf8 path"),
        "--function",
        "missing",
    ]);
    assert!(stdout(&output).contains("ERROR_KIND:NOT_FOUND"));
}

#[test]
fn info_lists_metadata() {
    let output = run(&["info", "--isolation", "forced"]);
    let text = stdout(&output);
    assert!(text.contains("ENGINE:lisp-engine"), "{}", text);
    assert!(text.contains("EXTENSIONS:lisp,lsp"), "{}", text);
    assert!(text.contains("THREADING:MULTITHREADED"), "{}", text);
    assert!(text.contains("ISOLATION:Forced"), "{}", text);
}
