//! Constant folding
//!
//! Every Constant leaf climbs towards its statement, picking up enclosing
//! unary minus and casts. At a binary Term/Expression the first operand to
//! arrive parks its value in a fold slot (the node's `scratch` holds the slot
//! number); the second operand combines with it and keeps climbing. The
//! highest node reached is marked folded with the final value, so later
//! passes treat the whole subtree as one constant.

use crate::compiler::ast::{AstStore, NodeId, NodeType, ValueType};
use crate::compiler::error::{CompileError, CompileResult};

/// Live fold slots per statement
pub const MAX_FOLD_SLOTS: usize = 64;

/// Fixed pool of parked operands.
struct FoldSlots {
    slots: [Option<i32>; MAX_FOLD_SLOTS],
    /// Nodes whose scratch currently names a slot
    owners: Vec<NodeId>,
}

impl FoldSlots {
    fn new() -> Self {
        Self {
            slots: [None; MAX_FOLD_SLOTS],
            owners: Vec::new(),
        }
    }

    /// Park a value; returns the scratch encoding (slot index + 1).
    fn park(&mut self, owner: NodeId, value: i32) -> Option<u16> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(value);
        self.owners.push(owner);
        Some(index as u16 + 1)
    }

    fn take(&mut self, scratch: u16) -> Option<i32> {
        let index = (scratch as usize).checked_sub(1)?;
        self.slots.get_mut(index)?.take()
    }

    /// Free every slot and clear the scratch of nodes still holding one.
    fn release(&mut self, store: &mut AstStore) -> CompileResult<()> {
        for owner in self.owners.drain(..) {
            if store.folded_value(owner)?.is_none() {
                store.set_scratch(owner, 0)?;
            }
        }
        self.slots = [None; MAX_FOLD_SLOTS];
        Ok(())
    }
}

fn check_range(value: i32, node: NodeId) -> CompileResult<i32> {
    if (i16::MIN as i32..=i16::MAX as i32).contains(&value) {
        Ok(value)
    } else {
        Err(CompileError::range(
            node,
            format!(
                "constant expression evaluates to {}, outside the short range {}..={}",
                value,
                i16::MIN,
                i16::MAX
            ),
        ))
    }
}

/// Apply a binary operator to two folded operands.
pub fn evaluate(op: &str, left: i32, right: i32, node: NodeId) -> CompileResult<i32> {
    let value = match op {
        "+" => left + right,
        "-" => left - right,
        "*" => left * right,
        "/" => {
            if right == 0 {
                return Err(CompileError::range(node, "division by zero in constant expression"));
            }
            left / right
        }
        other => {
            return Err(CompileError::internal(
                node,
                format!("unknown operator '{}'", other),
            ))
        }
    };
    check_range(value, node)
}

/// Parse a decimal literal, allowing one more than the short maximum so
/// that `-32768` can be written.
pub fn parse_literal(text: &str, node: NodeId) -> CompileResult<i32> {
    match text.parse::<i32>() {
        Ok(value) if (0..=i16::MAX as i32 + 1).contains(&value) => Ok(value),
        _ => Err(CompileError::range(
            node,
            format!("literal {} does not fit in a short", text),
        )),
    }
}

/// Fold every constant subexpression. Returns the number of constants that
/// were climbed.
pub fn fold_constants(store: &mut AstStore) -> CompileResult<usize> {
    let mut slots = FoldSlots::new();
    let mut folded = 0;

    let mut stack = Vec::new();
    if let Some(root) = store.root().get() {
        stack.push(root);
    }

    while let Some(node) = stack.pop() {
        match store.node_type(node)? {
            NodeType::Statement => {
                stack.extend(store.child(node, 0)?.get());
                stack.extend(store.child(node, 1)?.get());
            }
            NodeType::Class => stack.extend(store.child(node, 0)?.get()),
            NodeType::Declaration | NodeType::Assignment => {
                if let Some(expression) = store.child(node, 0)?.get() {
                    folded += fold_expression(store, expression, &mut slots)?;
                    slots.release(store)?;
                }
            }
            _ => {}
        }
    }

    log::debug!("constant folding climbed {} constants", folded);
    Ok(folded)
}

fn fold_expression(store: &mut AstStore, root: NodeId, slots: &mut FoldSlots) -> CompileResult<usize> {
    let mut folded = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let node_type = store.node_type(node)?;
        if node_type == NodeType::Constant {
            fold_constant(store, node, slots)?;
            folded += 1;
            continue;
        }
        if node_type.is_operator() || node_type == NodeType::Member {
            continue;
        }
        for index in 0..node_type.child_count() {
            stack.extend(store.child(node, index)?.get());
        }
    }
    Ok(folded)
}

/// Climb from one Constant leaf as far as its value can be folded.
fn fold_constant(store: &mut AstStore, leaf: NodeId, slots: &mut FoldSlots) -> CompileResult<()> {
    let mut value = parse_literal(store.token(leaf, 0)?, leaf)?;
    let mut current = leaf;

    loop {
        let parent = store.parent(current)?;
        if parent.is_none() {
            break;
        }

        match store.node_type(parent)? {
            NodeType::Factor => {
                let unary = store.child(parent, 0)?;
                if !unary.is_none() && store.token(unary, 0)? == "-" {
                    value = -value;
                }
                value = check_range(value, parent)?;
            }
            NodeType::Cast => {
                value = match ValueType::from_type_name(store.token(parent, 0)?) {
                    Some(ValueType::Byte) => value as i8 as i32,
                    Some(ValueType::Short) => value as i16 as i32,
                    // class casts are rejected by type propagation
                    _ => break,
                };
            }
            NodeType::Term | NodeType::Expression => {
                let op = store.child(parent, 1)?;
                if !op.is_none() {
                    let from_left = store.child(parent, 2)? == current;
                    let scratch = store.scratch(parent)?;
                    match slots.take(scratch) {
                        Some(other) => {
                            let (left, right) = if from_left {
                                (value, other)
                            } else {
                                (other, value)
                            };
                            value = evaluate(store.token(op, 0)?, left, right, parent)?;
                            store.set_scratch(parent, 0)?;
                        }
                        None => {
                            store.set_folded(current, value as i16)?;
                            if let Some(encoded) = slots.park(parent, value) {
                                store.set_scratch(parent, encoded)?;
                            }
                            return Ok(());
                        }
                    }
                }
            }
            NodeType::Statement | NodeType::Declaration | NodeType::Assignment => break,
            other => {
                return Err(CompileError::internal(
                    parent,
                    format!("constant nested under a {} node", other),
                ))
            }
        }
        current = parent;
    }

    store.set_folded(current, check_range(value, current)? as i16)
}
