//! Stage commands over files in a temporary directory.

use bsc_cli::commands::{check, exec, gen, graph, parse, resolve, run, tokenize, StageFailure};
use bsc_cli::output::render_json;
use bsc_engine::pipeline::PipelineError;
use bsc_engine::{AstStore, CodegenOptions, LayoutOptions, NodeType, PipelineOptions, VmOptions};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn program(dir: &TempDir, source: &str) -> PathBuf {
    let path = dir.path().join("prog.src");
    std::fs::write(&path, source).unwrap();
    path
}

fn stages_through_gen(input: &Path) {
    tokenize::execute(input).unwrap();
    parse::execute(input).unwrap();
    resolve::execute(input, &LayoutOptions::default()).unwrap();
    check::execute(input).unwrap();
    gen::execute(input, &CodegenOptions::default()).unwrap();
}

#[test]
fn test_stages_write_sibling_files() {
    let dir = TempDir::new().unwrap();
    let input = program(&dir, "class P { byte x = 3; } P p; byte b = p.x * 2;");

    stages_through_gen(&input);
    for ext in ["tok", "ast", "bin"] {
        assert!(input.with_extension(ext).exists(), "missing .{}", ext);
    }

    let outcome = exec::run(&input, &VmOptions::default()).unwrap();
    assert_eq!(outcome.signed_stack(), vec![3, 6]);
}

#[test]
fn test_token_table_layout_on_disk() {
    let dir = TempDir::new().unwrap();
    let input = program(&dir, "byte x;");
    tokenize::execute(&input).unwrap();

    let bytes = std::fs::read(input.with_extension("tok")).unwrap();
    assert_eq!(bytes, vec![3, 0, 0, 0, 4, 5, 0, 1, 6, 0, 1]);
}

#[test]
fn test_check_rewrites_ast_in_place() {
    let dir = TempDir::new().unwrap();
    let input = program(&dir, "byte b = 1; short s = b;");
    tokenize::execute(&input).unwrap();
    parse::execute(&input).unwrap();
    resolve::execute(&input, &LayoutOptions::default()).unwrap();
    check::execute(&input).unwrap();

    let store = AstStore::from_bytes(std::fs::read(input.with_extension("ast")).unwrap()).unwrap();
    let casts = store
        .nodes()
        .unwrap()
        .into_iter()
        .filter(|n| n.node_type == NodeType::Cast)
        .count();
    assert_eq!(casts, 1);
}

#[test]
fn test_run_checks_expectations() {
    let dir = TempDir::new().unwrap();
    let input = program(&dir, "short s = -2; $TEST -2 -1;");
    let outcome = run::run(&input, &PipelineOptions::default()).unwrap();
    assert_eq!(outcome.tests_passed, 1);

    let input = program(&dir, "short s = 2; $TEST 2 1;");
    let err = run::run(&input, &PipelineOptions::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Expectation { .. })
    ));
}

#[test]
fn test_compile_errors_become_stage_failures() {
    let dir = TempDir::new().unwrap();
    let input = program(&dir, "byte b = 1;\nbyte c = undefined;");
    tokenize::execute(&input).unwrap();
    parse::execute(&input).unwrap();
    resolve::execute(&input, &LayoutOptions::default()).unwrap();

    let err = check::execute(&input).unwrap_err();
    let failure = err.downcast_ref::<StageFailure>().unwrap();
    assert!(failure.message.contains("undefined"));
    assert_eq!(failure.diagnostic.code().map(|c| c.as_str()), Some("E3003"));
}

#[test]
fn test_stage_failure_as_json() {
    let dir = TempDir::new().unwrap();
    let input = program(&dir, "byte b = 1;\nbyte c = undefined;");
    tokenize::execute(&input).unwrap();
    parse::execute(&input).unwrap();
    resolve::execute(&input, &LayoutOptions::default()).unwrap();

    let err = check::execute(&input).unwrap_err();
    let json = render_json(err.downcast_ref::<StageFailure>().unwrap()).unwrap();
    assert!(json.contains("\"code\": \"E3003\""));
    assert!(json.contains("\"severity\": \"error\""));
    assert!(json.contains("\"start_line\": 2"));
}

#[test]
fn test_lex_errors_become_stage_failures() {
    let dir = TempDir::new().unwrap();
    let input = program(&dir, "byte b = 1 @ 2;");
    let err = tokenize::execute(&input).unwrap_err();
    assert!(err.downcast_ref::<StageFailure>().is_some());
    assert!(!input.with_extension("tok").exists());
}

#[test]
fn test_layout_attempts_flag() {
    let dir = TempDir::new().unwrap();
    let input = program(
        &dir,
        "class A { B b; } class B { C c; } class C { D d; } class D { short s; }",
    );
    tokenize::execute(&input).unwrap();
    parse::execute(&input).unwrap();

    let tight = LayoutOptions {
        max_attempts: Some(3),
    };
    assert!(resolve::execute(&input, &tight).is_err());
    resolve::execute(&input, &LayoutOptions::default()).unwrap();
}

#[test]
fn test_graph_output() {
    let dir = TempDir::new().unwrap();
    let input = program(&dir, "byte x = 1;");
    tokenize::execute(&input).unwrap();
    parse::execute(&input).unwrap();
    graph::execute(&input).unwrap();

    let dot = std::fs::read_to_string(input.with_extension("dot")).unwrap();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("Declaration"));
}

#[test]
fn test_missing_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("absent.src");
    assert!(tokenize::execute(&input).is_err());
    assert!(exec::run(&input, &VmOptions::default()).is_err());
}
