//! In-process driver chaining every stage
//!
//! The CLI runs the stages one per process over files; tests, benches and
//! `bsc run` use these helpers to go from source text to a halted VM without
//! touching the file system.

use crate::compiler::ast::{AstStore, NodeType};
use crate::compiler::checker::{self, CheckSummary};
use crate::compiler::codegen::{self, CodegenOptions};
use crate::compiler::error::{CompileError, CompileResult, ErrorKind};
use crate::compiler::layout::{self, LayoutOptions, LayoutSummary};
use crate::parser::{Lexer, Parser};
use crate::vm::{Vm, VmError, VmOptions};
use thiserror::Error;

/// Options for every stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub layout: LayoutOptions,
    pub codegen: CodegenOptions,
    pub vm: VmOptions,
}

/// Errors from a full run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Vm(#[from] VmError),

    /// A `$TEST` statement disagrees with the final stack
    #[error("test failed: expected stack {expected:?}, found {actual:?}")]
    Expectation { expected: Vec<i8>, actual: Vec<i8> },
}

impl PipelineError {
    /// Error class, or `None` for a failed expectation.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Compile(error) => Some(error.kind()),
            Self::Vm(error) => Some(error.kind()),
            Self::Expectation { .. } => None,
        }
    }
}

/// A compiled program.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// The resolved and checked AST, spans included
    pub store: AstStore,
    pub bytecode: Vec<u8>,
    pub layout: LayoutSummary,
    pub check: CheckSummary,
    /// One entry per `$TEST` statement, in source order
    pub expectations: Vec<Vec<i8>>,
}

/// Result of running a program to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Final evaluation stack, bottom first
    pub stack: Vec<u8>,
    pub steps: usize,
    /// Number of `$TEST` statements checked
    pub tests_passed: usize,
}

impl RunOutcome {
    /// The stack as signed bytes, the way `$TEST` writes it.
    pub fn signed_stack(&self) -> Vec<i8> {
        self.stack.iter().map(|&b| b as i8).collect()
    }
}

/// Lex and parse `source`. Only the first lexical error is reported.
pub fn parse_source(source: &str) -> CompileResult<AstStore> {
    let tokens = Lexer::new(source).tokenize().map_err(|errors| {
        errors
            .into_iter()
            .next()
            .map(CompileError::from)
            .unwrap_or_else(|| CompileError::Syntax {
                message: "tokenizing failed".to_string(),
                span: None,
            })
    })?;
    Parser::new(source, tokens).parse()
}

/// Parse, resolve, check and generate code for `source`.
pub fn compile_source(source: &str, options: &PipelineOptions) -> CompileResult<Compilation> {
    let mut store = parse_source(source)?;
    let layout = layout::resolve_layout(&mut store, &options.layout)?;
    let check = checker::check(&mut store)?;
    let bytecode = codegen::generate(&store, &options.codegen)?;
    let expectations = collect_expectations(&store)?;

    Ok(Compilation {
        store,
        bytecode,
        layout,
        check,
        expectations,
    })
}

/// Expected stacks of every `$TEST` statement, in allocation order.
///
/// # Errors
///
/// A value outside the signed byte range is a `CompileError::Range` on the
/// Test node.
pub fn collect_expectations(store: &AstStore) -> CompileResult<Vec<Vec<i8>>> {
    let mut expectations = Vec::new();
    for node in store.nodes()? {
        if node.node_type != NodeType::Test {
            continue;
        }
        let values = node
            .token(0)
            .split_whitespace()
            .map(|text| {
                text.parse::<i8>().map_err(|_| {
                    CompileError::range(
                        node.id,
                        format!("test value '{}' is outside -128..=127", text),
                    )
                })
            })
            .collect::<CompileResult<Vec<_>>>()?;
        expectations.push(values);
    }
    Ok(expectations)
}

/// Run already generated bytecode.
pub fn execute(bytecode: &[u8], options: &VmOptions) -> Result<RunOutcome, VmError> {
    let mut vm = Vm::new(*options);
    vm.execute(bytecode)?;
    Ok(RunOutcome {
        stack: vm.stack().to_vec(),
        steps: vm.steps(),
        tests_passed: 0,
    })
}

/// Compile and run `source`, then check every `$TEST` statement against the
/// final stack.
pub fn run_source(source: &str, options: &PipelineOptions) -> Result<RunOutcome, PipelineError> {
    let compilation = compile_source(source, options)?;
    let mut outcome = execute(&compilation.bytecode, &options.vm)?;
    check_expectations(&compilation.expectations, &mut outcome)?;
    Ok(outcome)
}

/// Compare `outcome`'s stack against every expectation.
pub fn check_expectations(
    expectations: &[Vec<i8>],
    outcome: &mut RunOutcome,
) -> Result<(), PipelineError> {
    let actual = outcome.signed_stack();
    for expected in expectations {
        if *expected != actual {
            return Err(PipelineError::Expectation {
                expected: expected.clone(),
                actual,
            });
        }
        outcome.tests_passed += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_simple_program() {
        let outcome = run_source("short x = 1 + 2 * 3; $TEST 7 0;", &PipelineOptions::default())
            .unwrap();
        assert_eq!(outcome.stack, vec![7, 0]);
        assert_eq!(outcome.tests_passed, 1);
    }

    #[test]
    fn test_failed_expectation() {
        let err = run_source("byte b = 5; $TEST 6;", &PipelineOptions::default()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::Expectation {
                expected: vec![6],
                actual: vec![5]
            }
        );
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn test_expectation_out_of_range() {
        let store = parse_source("$TEST 1 200;").unwrap();
        let err = collect_expectations(&store).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_lex_error_is_syntax() {
        let err = parse_source("byte b = 5 @;").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }
}
