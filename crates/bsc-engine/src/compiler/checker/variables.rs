//! Variable scope stack

use crate::compiler::ast::NodeId;
use crate::compiler::checker::TypeDescriptor;
use crate::compiler::error::{CompileError, CompileResult};

/// A declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub ty: TypeDescriptor,
    /// Scope depth the variable was declared at (0 = top level)
    pub depth: u16,
    pub size: u16,
    /// Frame-relative address
    pub address: u16,
    pub declaration: NodeId,
}

/// Ordered stack of variables.
///
/// Each depth is its own frame: a class body starts addressing at 0, and
/// lookups only see variables of the current depth.
#[derive(Debug, Default)]
pub struct VariableStack {
    variables: Vec<Variable>,
}

impl VariableStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Address the next variable at `depth` would get.
    pub fn next_address(&self, depth: u16) -> CompileResult<u16> {
        match self.variables.last() {
            Some(last) if last.depth == depth => {
                last.address.checked_add(last.size).ok_or_else(|| {
                    CompileError::internal(last.declaration, "frame is larger than 65535 bytes")
                })
            }
            _ => Ok(0),
        }
    }

    /// Declare a variable at `depth` and return its address.
    pub fn declare(
        &mut self,
        name: &str,
        ty: TypeDescriptor,
        depth: u16,
        declaration: NodeId,
    ) -> CompileResult<u16> {
        let address = self.next_address(depth)?;
        address.checked_add(ty.size()).ok_or_else(|| {
            CompileError::internal(declaration, "frame is larger than 65535 bytes")
        })?;
        self.variables.push(Variable {
            name: name.to_string(),
            ty,
            depth,
            size: ty.size(),
            address,
            declaration,
        });
        Ok(address)
    }

    /// Most recent variable called `name` in the frame at `depth`.
    pub fn lookup(&self, name: &str, depth: u16) -> Option<&Variable> {
        self.variables
            .iter()
            .rev()
            .take_while(|v| v.depth >= depth)
            .find(|v| v.depth == depth && v.name == name)
    }

    /// Drop every variable deeper than `depth`.
    pub fn leave(&mut self, depth: u16) {
        while self.variables.last().is_some_and(|v| v.depth > depth) {
            self.variables.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_accumulate() {
        let mut stack = VariableStack::new();
        assert_eq!(stack.declare("a", TypeDescriptor::Byte, 0, NodeId::NONE).unwrap(), 0);
        assert_eq!(stack.declare("b", TypeDescriptor::Short, 0, NodeId::NONE).unwrap(), 1);
        assert_eq!(stack.declare("c", TypeDescriptor::Byte, 0, NodeId::NONE).unwrap(), 3);
    }

    #[test]
    fn test_frames_restart_and_hide_outer() {
        let mut stack = VariableStack::new();
        stack.declare("a", TypeDescriptor::Short, 0, NodeId::NONE).unwrap();
        assert_eq!(stack.declare("m", TypeDescriptor::Byte, 1, NodeId::NONE).unwrap(), 0);
        assert!(stack.lookup("a", 1).is_none());
        assert!(stack.lookup("m", 1).is_some());

        stack.leave(0);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.next_address(0).unwrap(), 2);
    }

    #[test]
    fn test_shadowing_finds_latest() {
        let mut stack = VariableStack::new();
        stack.declare("a", TypeDescriptor::Byte, 0, NodeId::NONE).unwrap();
        stack.declare("a", TypeDescriptor::Short, 0, NodeId::NONE).unwrap();
        let found = stack.lookup("a", 0).unwrap();
        assert_eq!(found.ty, TypeDescriptor::Short);
        assert_eq!(found.address, 1);
    }
}
