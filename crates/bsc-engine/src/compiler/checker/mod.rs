//! Type checker
//!
//! Three passes, always in this order:
//!
//! 1. [`fold`]: evaluate constant subexpressions and mark the folded nodes.
//! 2. [`propagate`]: type every expression node bottom-up, resolve variable
//!    and member addresses, and reject width or kind mismatches.
//! 3. [`casts`]: splice implicit widening casts where an operand is narrower
//!    than the node consuming it.

pub mod casts;
pub mod fold;
pub mod propagate;
pub mod variables;

use crate::compiler::ast::{params, AstStore, NodeId, NodeType, ValueType};
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::scope;

pub use variables::{Variable, VariableStack};

/// A fully resolved type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    None,
    Byte,
    Short,
    UserDefined { class: NodeId, size: u16 },
}

impl TypeDescriptor {
    pub fn size(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Byte => 1,
            Self::Short => 2,
            Self::UserDefined { size, .. } => size,
        }
    }

    pub fn value_type(self) -> ValueType {
        match self {
            Self::None => ValueType::None,
            Self::Byte => ValueType::Byte,
            Self::Short => ValueType::Short,
            Self::UserDefined { .. } => ValueType::UserDefined,
        }
    }

    /// Descriptor of a primitive value type.
    pub fn primitive(value_type: ValueType) -> Option<Self> {
        match value_type {
            ValueType::Byte => Some(Self::Byte),
            ValueType::Short => Some(Self::Short),
            ValueType::None | ValueType::UserDefined => None,
        }
    }

    pub fn is_primitive(self) -> bool {
        matches!(self, Self::Byte | Self::Short)
    }

    /// Narrowest primitive that holds `value`.
    pub fn narrowest_for(value: i32) -> Option<Self> {
        if Self::Byte.holds(value) {
            Some(Self::Byte)
        } else if Self::Short.holds(value) {
            Some(Self::Short)
        } else {
            None
        }
    }

    /// Whether a constant fits this primitive type.
    pub fn holds(self, value: i32) -> bool {
        match self {
            Self::Byte => (i8::MIN as i32..=i8::MAX as i32).contains(&value),
            Self::Short => (i16::MIN as i32..=i16::MAX as i32).contains(&value),
            Self::None | Self::UserDefined { .. } => false,
        }
    }

    /// Display name; classes are named by their declaration.
    pub fn describe(self, store: &AstStore) -> String {
        match self {
            Self::UserDefined { class, .. } => store
                .token(class, 0)
                .map(str::to_string)
                .unwrap_or_else(|_| "class".to_string()),
            other => other.value_type().name().to_string(),
        }
    }
}

/// Resolve the type named by a type token, as seen from `from`.
pub(crate) fn descriptor_for_name(
    store: &AstStore,
    from: NodeId,
    type_name: &str,
) -> CompileResult<TypeDescriptor> {
    if let Some(primitive) = ValueType::from_type_name(type_name).and_then(TypeDescriptor::primitive)
    {
        return Ok(primitive);
    }
    let class = scope::find_class(store, from, type_name)?.ok_or_else(|| {
        CompileError::UndefinedName {
            name: type_name.to_string(),
            node: from,
        }
    })?;
    let size = store.param(class, NodeType::Class, params::CLASS_BYTES)?;
    Ok(TypeDescriptor::UserDefined { class, size })
}

/// Counts reported by [`check`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub folded: usize,
    pub typed: usize,
    pub casts: usize,
}

/// Run all three checker passes over a resolved store.
pub fn check(store: &mut AstStore) -> CompileResult<CheckSummary> {
    let folded = fold::fold_constants(store)?;
    let typed = propagate::propagate_types(store)?;
    let casts = casts::insert_casts(store)?;
    log::debug!(
        "type check done: {} folded roots, {} typed leaves, {} casts inserted",
        folded,
        typed,
        casts
    );
    Ok(CheckSummary {
        folded,
        typed,
        casts,
    })
}
