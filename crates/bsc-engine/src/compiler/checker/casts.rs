//! Implicit widening casts
//!
//! After propagation every operator node carries the wider of its operand
//! types. Wherever an operand is narrower than its consumer, a Cast node is
//! spliced between them so code generation can emit the sign extension.
//! Folded constants are widened in place instead; they are pushed at
//! whatever width they end up with.

use crate::compiler::ast::{AstStore, NewNode, NodeId, NodeType, ValueType};
use crate::compiler::error::{CompileError, CompileResult};

/// Insert casts for every narrowing edge. Returns the number inserted.
pub fn insert_casts(store: &mut AstStore) -> CompileResult<usize> {
    let mut inserted = 0;
    let mut stack = Vec::new();
    if let Some(root) = store.root().get() {
        stack.push(root);
    }

    while let Some(node) = stack.pop() {
        let node_type = store.node_type(node)?;
        let operand_slots: &[usize] = match node_type {
            NodeType::Declaration | NodeType::Assignment => &[0],
            NodeType::Expression | NodeType::Term => &[0, 2],
            NodeType::Factor => &[1],
            _ => &[],
        };

        // folded subtrees have no operands left to convert
        if node_type != NodeType::Declaration
            && node_type != NodeType::Assignment
            && store.folded_value(node)?.is_some()
        {
            continue;
        }

        for &slot in operand_slots {
            let child = store.child(node, slot)?;
            if child.is_none() {
                continue;
            }
            if widen(store, node, child)? {
                inserted += 1;
            }
        }

        match node_type {
            NodeType::Statement
            | NodeType::Class
            | NodeType::Declaration
            | NodeType::Assignment
            | NodeType::Expression
            | NodeType::Term
            | NodeType::Factor
            | NodeType::Cast => {
                for index in 0..node_type.child_count() {
                    let child = store.child(node, index)?;
                    if !child.is_none() && !store.node_type(child)?.is_operator() {
                        stack.push(child);
                    }
                }
            }
            _ => {}
        }
    }

    log::debug!("inserted {} implicit casts", inserted);
    Ok(inserted)
}

/// Make `child` match the width `parent` consumes. Returns whether a Cast
/// node was spliced in.
fn widen(store: &mut AstStore, parent: NodeId, child: NodeId) -> CompileResult<bool> {
    let wanted = store.value_type(parent)?;
    let found = store.value_type(child)?;

    if wanted == found || wanted == ValueType::None || found == ValueType::None {
        return Ok(false);
    }
    if !wanted.is_primitive() || !found.is_primitive() {
        return Err(CompileError::TypeMismatch {
            expected: wanted.name().to_string(),
            found: found.name().to_string(),
            node: parent,
        });
    }

    let (Some(wanted_size), Some(found_size)) = (wanted.size(), found.size()) else {
        return Ok(false);
    };
    if found_size >= wanted_size {
        // narrowing is always explicit and was rejected by propagation
        return Ok(false);
    }

    if store.folded_value(child)?.is_some() || store.node_type(child)? == NodeType::Constant {
        store.set_value_type(child, wanted)?;
        return Ok(false);
    }

    let cast = store.splice_insert(
        NewNode::new(NodeType::Cast)
            .with_token(wanted.name())
            .with_child(0, child)
            .with_value_type(wanted),
        parent,
    )?;
    if let Some(span) = store.span(child) {
        store.set_span(cast, span);
    }
    log::trace!("{} widened from {} to {} via {}", child, found, wanted, cast);
    Ok(true)
}
