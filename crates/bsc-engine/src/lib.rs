//! bsc language engine
//!
//! A compiler and virtual machine for a tiny typed language with `byte` and
//! `short` integers and aggregate classes:
//! - **Parser**: lexer, token table and parser (`parser` module)
//! - **Compiler**: AST store, layout resolver, type checker and bytecode
//!   generation (`compiler` module)
//! - **VM**: byte-addressed stack machine (`vm` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use bsc_engine::pipeline::{run_source, PipelineOptions};
//!
//! let source = r#"
//!     class Point { byte x = 1; byte y = 2; }
//!     Point p;
//!     $TEST 1 2;
//! "#;
//!
//! let outcome = run_source(source, &PipelineOptions::default()).unwrap();
//! assert_eq!(outcome.stack, vec![1, 2]);
//! ```

#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Parser module: lexer, token table and parser
pub mod parser;

/// Compiler module: AST store, resolver, checker and code generator
pub mod compiler;

/// VM module: evaluation stack and interpreter
pub mod vm;

/// Whole-program driver
pub mod pipeline;

// ============================================================================
// Re-exports
// ============================================================================

pub use parser::{LexError, Lexer, Parser, Span, Token, TokenKind, TokenTable, TokenTableError};

pub use compiler::{
    // AST
    AstNode, AstStore, NodeId, NodeType, ValueType,
    // Stages
    check, generate, resolve_layout, CodegenOptions, LayoutOptions,
    // Bytecode
    disassemble, DecodeError, Instruction, Opcode,
    // Errors
    CompileError, CompileResult, Diagnostic, ErrorKind,
};

pub use vm::{Vm, VmError, VmOptions, VmResult};

pub use pipeline::{compile_source, parse_source, run_source, PipelineError, PipelineOptions};
