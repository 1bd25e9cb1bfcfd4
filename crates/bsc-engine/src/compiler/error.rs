//! Compilation errors

use crate::compiler::ast::{AstStore, NodeId};
use crate::parser::{LexError, Span};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Broad error classes shared by every stage, so callers and tests can
/// assert on the class without matching individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Token stream violates the grammar
    Syntax,
    /// A class type cannot be sized within the retry budget
    Layout,
    /// Width or kind mismatch, unknown names, invalid operations on classes
    Type,
    /// Constant expression outside the short range
    Range,
    /// A node has an unexpected type or shape (a bug in an earlier stage)
    InternalConsistency,
    /// Runtime bounds violation inside the VM
    VmTrap,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Syntax => "syntax error",
            Self::Layout => "layout error",
            Self::Type => "type error",
            Self::Range => "range error",
            Self::InternalConsistency => "internal consistency error",
            Self::VmTrap => "vm trap",
        };
        f.write_str(name)
    }
}

/// Errors raised between parsing and code generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{message}")]
    Syntax { message: String, span: Option<Span> },

    #[error("cannot lay out type '{type_name}': {reason}")]
    Layout {
        type_name: String,
        reason: String,
        node: NodeId,
    },

    #[error("mismatched types: expected '{expected}', found '{found}'")]
    TypeMismatch {
        expected: String,
        found: String,
        node: NodeId,
    },

    #[error("{message}")]
    InvalidOperation { message: String, node: NodeId },

    #[error("cannot find '{name}' in this scope")]
    UndefinedName { name: String, node: NodeId },

    #[error("type '{ty}' has no member '{member}'")]
    UnknownMember {
        ty: String,
        member: String,
        node: NodeId,
    },

    #[error("{message}")]
    Range { message: String, node: NodeId },

    #[error("internal compiler error at {node}: {message}")]
    Internal { message: String, node: NodeId },
}

impl CompileError {
    pub(crate) fn internal(node: NodeId, message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            node,
        }
    }

    pub(crate) fn range(node: NodeId, message: impl Into<String>) -> Self {
        Self::Range {
            message: message.into(),
            node,
        }
    }

    pub(crate) fn syntax(span: Span, message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax { .. } => ErrorKind::Syntax,
            Self::Layout { .. } => ErrorKind::Layout,
            Self::TypeMismatch { .. }
            | Self::InvalidOperation { .. }
            | Self::UndefinedName { .. }
            | Self::UnknownMember { .. } => ErrorKind::Type,
            Self::Range { .. } => ErrorKind::Range,
            Self::Internal { .. } => ErrorKind::InternalConsistency,
        }
    }

    /// AST node the error points at, if any.
    pub fn node(&self) -> Option<NodeId> {
        let node = match self {
            Self::Syntax { .. } => return None,
            Self::Layout { node, .. }
            | Self::TypeMismatch { node, .. }
            | Self::InvalidOperation { node, .. }
            | Self::UndefinedName { node, .. }
            | Self::UnknownMember { node, .. }
            | Self::Range { node, .. }
            | Self::Internal { node, .. } => *node,
        };
        (!node.is_none()).then_some(node)
    }

    /// Source location of the error, using the store's span table for
    /// node-based errors.
    pub fn span(&self, store: &AstStore) -> Option<Span> {
        match self {
            Self::Syntax { span, .. } => *span,
            _ => self.node().and_then(|node| store.span(node)),
        }
    }
}

impl From<LexError> for CompileError {
    fn from(error: LexError) -> Self {
        Self::Syntax {
            span: error.span(),
            message: error.to_string(),
        }
    }
}

/// Result alias used by the compiler stages.
pub type CompileResult<T> = Result<T, CompileError>;
