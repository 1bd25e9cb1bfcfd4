use bsc_engine::compiler::checker::fold::MAX_FOLD_SLOTS;
use bsc_engine::compiler::codegen::{generate, CodegenOptions};
use bsc_engine::pipeline::{compile_source, run_source, PipelineOptions};
use bsc_engine::{ErrorKind, Instruction};
use Instruction::*;

fn instructions(source: &str) -> Vec<Instruction> {
    let compilation = compile_source(source, &PipelineOptions::default()).unwrap();
    Instruction::decode_stream(&compilation.bytecode)
        .unwrap()
        .into_iter()
        .map(|(_, instruction)| instruction)
        .collect()
}

fn has_arithmetic(code: &[Instruction]) -> bool {
    code.iter().any(|i| i.opcode().is_arithmetic())
}

// ============================================================================
// Declarations and constants
// ============================================================================

#[test]
fn test_folded_initializer_is_single_push() {
    let code = instructions("short x = 1 + 2 * 3;");
    assert_eq!(code, vec![PushZeros(2), Push16(0), Push16(7), Set16, Eof]);
    assert!(!has_arithmetic(&code));
}

#[test]
fn test_more_parked_operands_than_fold_slots() {
    let groups = MAX_FOLD_SLOTS + 16;
    let sum = vec!["(v + 1)"; groups].join(" + ");
    let source = format!("short v = 1; short s = {};", sum);

    let code = instructions(&source);
    assert!(code.contains(&Add16));

    let outcome = run_source(&source, &PipelineOptions::default()).unwrap();
    let total = (2 * groups) as u16;
    assert_eq!(outcome.stack, vec![1, 0, total as u8, (total >> 8) as u8]);
}

#[test]
fn test_byte_declarations() {
    let code = instructions("byte a = -5; byte b;");
    assert_eq!(
        code,
        vec![PushZeros(1), Push16(0), Push8(0xFB), Set8, PushZeros(1), Eof]
    );
}

#[test]
fn test_operand_order_is_left_to_right() {
    let code = instructions("short a = 9; short b = 2; short c = a - b;");
    assert_eq!(
        &code[8..],
        &[PushZeros(2), Push16(4), Iget16(0), Iget16(2), Sub16, Set16, Eof]
    );
}

#[test]
fn test_runtime_negation() {
    let code = instructions("byte a = 3; byte b = -a;");
    assert!(code.windows(2).any(|w| w == [Iget8(0), Neg8]));
}

// ============================================================================
// Casts
// ============================================================================

#[test]
fn test_implicit_widening_emits_extend() {
    let code = instructions("byte b = 5; short s = b;");
    assert_eq!(
        &code[4..],
        &[PushZeros(2), Push16(1), Iget8(0), Extend, Set16, Eof]
    );
    assert_eq!(code.iter().filter(|i| **i == Extend).count(), 1);
}

#[test]
fn test_explicit_narrowing_emits_pop8() {
    let code = instructions("short s = 300; byte b = <byte> s;");
    assert!(code.windows(2).any(|w| w == [Iget16(0), Pop8]));
}

// ============================================================================
// Assignments and classes
// ============================================================================

#[test]
fn test_assignment_to_member() {
    let code = instructions("class P { byte x; short y; } P p; p.y = 7;");
    let tail: Vec<_> = code.iter().rev().take(4).rev().copied().collect();
    assert_eq!(tail, vec![Push16(1), Push16(7), Set16, Eof]);
}

#[test]
fn test_class_body_is_skipped_and_called() {
    let code = instructions("class P { byte x = 1; } P p;");
    // ijump exit; label 0; <body>; ret; label 1; pushZeros 1; call 0, entry; eof
    assert_eq!(
        code,
        vec![
            Ijump(13),
            Label(0),
            Push16(0),
            Push8(1),
            Set8,
            Ret,
            Label(1),
            PushZeros(1),
            Call {
                frame_delta: 0,
                target: 3
            },
            Eof,
        ]
    );
}

#[test]
fn test_forward_referenced_class_call_target() {
    let compilation = compile_source("byte pad; P p; class P { short s = 2; }", &PipelineOptions::default())
        .unwrap();
    let listing = Instruction::decode_stream(&compilation.bytecode).unwrap();

    let call = listing
        .iter()
        .find_map(|(_, i)| match i {
            Call { frame_delta, target } => Some((*frame_delta, *target)),
            _ => None,
        })
        .unwrap();
    let label = listing
        .iter()
        .find(|(_, i)| *i == Label(0))
        .map(|(offset, _)| *offset)
        .unwrap();

    assert_eq!(call.0, 1);
    assert_eq!(call.1 as usize, label);
}

#[test]
fn test_aggregate_copy() {
    let code = instructions("class P { byte a; byte b; } P p; P q = p;");
    let copy: Vec<_> = code
        .iter()
        .rev()
        .skip(1)
        .take(12)
        .rev()
        .copied()
        .collect();
    assert_eq!(
        copy,
        vec![
            Push16(2),
            Push16(0),
            Push16(0),
            Add16,
            Get8,
            Set8,
            Push16(3),
            Push16(0),
            Push16(1),
            Add16,
            Get8,
            Set8,
        ]
    );
}

#[test]
fn test_test_statements_emit_nothing() {
    assert_eq!(instructions("$TEST 1 2;"), vec![Eof]);
}

#[test]
fn test_step_budget() {
    let compilation = compile_source("short x = 1; short y = x + x;", &PipelineOptions::default())
        .unwrap();
    let err = generate(&compilation.store, &CodegenOptions { max_steps: 3 }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalConsistency);
}
