//! Whole programs through the pipeline, checked with `$TEST` statements.

use bsc_engine::pipeline::{run_source, PipelineError, PipelineOptions};
use bsc_engine::vm::VmOptions;
use bsc_engine::{ErrorKind, VmError};

fn run(source: &str) -> Result<Vec<u8>, PipelineError> {
    let outcome = run_source(source, &PipelineOptions::default())?;
    assert!(outcome.tests_passed > 0, "program has no $TEST statement");
    Ok(outcome.stack)
}

#[test]
fn test_arithmetic_program() {
    run("
        byte a = 6;
        byte b = 7;
        byte product = a * b;
        short wide = a * 1000;
        $TEST 6 7 42 112 23;
    ")
    .unwrap();
}

#[test]
fn test_precedence_and_associativity() {
    run("
        byte x = 2;
        byte r = 20 - x - 3 * x;
        byte q = (20 - x) / (3 + x);
        $TEST 2 12 3;
    ")
    .unwrap();
}

#[test]
fn test_negative_values_and_casts() {
    run("
        short s = -300;
        byte low = <byte> s;
        short back = low;
        $TEST -44 -2 -44 -44 -1;
    ")
    .unwrap();
}

#[test]
fn test_assignments_overwrite() {
    run("
        short counter = 1;
        counter = counter + 41;
        counter = counter * 2;
        $TEST 84 0;
    ")
    .unwrap();
}

#[test]
fn test_classes_and_members() {
    run("
        class Point {
            byte x = 1;
            byte y = 2;
        }
        class Line {
            Point from;
            Point to;
            byte width = 3;
        }
        Line l;
        l.to.y = l.from.x + 10;
        $TEST 1 2 1 11 3;
    ")
    .unwrap();
}

#[test]
fn test_forward_referenced_class_runs() {
    run("
        Pair p;
        class Pair { Cell a; Cell b; }
        class Cell { short v = -2; }
        $TEST -2 -1 -2 -1;
    ")
    .unwrap();
}

#[test]
fn test_aggregate_copy_program() {
    run("
        class P { byte a = 4; short b = 5; }
        P p;
        p.b = 9;
        P q = p;
        $TEST 4 9 0 4 9 0;
    ")
    .unwrap();
}

#[test]
fn test_multiple_tests_must_all_hold() {
    let outcome = run_source("byte a = 1; $TEST 1; $TEST 1;", &PipelineOptions::default()).unwrap();
    assert_eq!(outcome.tests_passed, 2);

    let err = run_source("byte a = 1; $TEST 1; $TEST 2;", &PipelineOptions::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Expectation { .. }));
}

#[test]
fn test_runtime_division_by_zero_traps() {
    let err = run("byte zero = 0; byte x = 5 / zero; $TEST 0 0;").unwrap_err();
    assert!(matches!(err, PipelineError::Vm(VmError::DivisionByZero(_))));
    assert_eq!(err.kind(), Some(ErrorKind::VmTrap));
}

#[test]
fn test_stack_size_is_configurable() {
    let options = PipelineOptions {
        vm: VmOptions {
            stack_size: 2,
            ..VmOptions::default()
        },
        ..PipelineOptions::default()
    };
    let err = run_source("short a = 1; short b = 2;", &options).unwrap_err();
    assert_eq!(err, PipelineError::Vm(VmError::StackOverflow));
}

#[test]
fn test_compile_errors_surface_with_kind() {
    let cases = [
        ("byte x = ;", ErrorKind::Syntax),
        ("class A { A a; }", ErrorKind::Layout),
        ("byte x = 100 + 100;", ErrorKind::Type),
        ("short x = 30000 + 30000;", ErrorKind::Range),
        ("$TEST 300;", ErrorKind::Range),
    ];
    for (source, kind) in cases {
        let err = run_source(source, &PipelineOptions::default()).unwrap_err();
        assert_eq!(err.kind(), Some(kind), "{}", source);
    }
}
