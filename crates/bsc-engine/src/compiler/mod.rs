//! Middle and back end
//!
//! Everything between the parser and the VM works on the [`AstStore`]:
//!
//! 1. [`layout`]: size every declaration and class
//! 2. [`checker`]: fold constants, type expressions, insert implicit casts
//! 3. [`codegen`]: lower the typed tree to [`bytecode`]
//!
//! Each stage reads the store and writes back into it (or, for codegen, into
//! a byte buffer), so stages can run as separate processes over `.ast` files.

pub mod ast;
pub mod bytecode;
pub mod checker;
pub mod codegen;
pub mod diagnostic;
pub mod error;
pub mod graph;
pub mod layout;
pub mod scope;

// ============================================================================
// Re-exports
// ============================================================================

pub use ast::{params, AstNode, AstStore, NewNode, NodeId, NodeType, ValueType};
pub use bytecode::{disassemble, DecodeError, Instruction, Opcode};
pub use checker::{check, CheckSummary, TypeDescriptor};
pub use codegen::{generate, CodegenOptions};
pub use diagnostic::{create_files, Diagnostic, ErrorCode};
pub use error::{CompileError, CompileResult, ErrorKind};
pub use graph::to_dot;
pub use layout::{resolve_layout, LayoutOptions, LayoutSummary};
