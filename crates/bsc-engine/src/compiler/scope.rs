//! Scope-chain queries over the AST.
//!
//! Classes are visible anywhere in the statement list that declares them
//! (before or after the point of use) and in every class body nested inside
//! that list. These helpers answer "which class does this name refer to" and
//! "where does this member live" by walking parent links and statement
//! chains, so no separate symbol table is needed for types.

use crate::compiler::ast::{params, AstStore, NodeId, NodeType};
use crate::compiler::error::{CompileError, CompileResult};

/// A member declaration found inside a class body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberInfo {
    /// The member's Declaration node
    pub declaration: NodeId,
    /// Byte offset within the class
    pub offset: u16,
    /// Byte size of the member
    pub bytes: u16,
}

/// Upper bound on chain walks; a well-formed store cannot have more nodes.
fn walk_limit(store: &AstStore) -> usize {
    store.len() / crate::compiler::ast::NODE_HEADER_SIZE + 1
}

/// First statement of the list that contains `statement`.
fn list_head(store: &AstStore, statement: NodeId) -> CompileResult<NodeId> {
    let mut current = statement;
    for _ in 0..walk_limit(store) {
        let parent = store.parent(current)?;
        if parent.is_none() || store.node_type(parent)? != NodeType::Statement {
            return Ok(current);
        }
        current = parent;
    }
    Err(CompileError::internal(statement, "statement chain does not terminate"))
}

/// Statements of the list starting at `head`, in source order.
pub fn statement_list(store: &AstStore, head: NodeId) -> CompileResult<Vec<NodeId>> {
    let mut statements = Vec::new();
    let mut current = head;
    let limit = walk_limit(store);
    while !current.is_none() {
        if statements.len() > limit {
            return Err(CompileError::internal(head, "statement chain does not terminate"));
        }
        statements.push(current);
        current = store.child(current, 0)?;
    }
    Ok(statements)
}

/// Find the class named `name` visible from `from` (a node whose parent is a
/// Statement, such as a Declaration or a Class).
pub fn find_class(store: &AstStore, from: NodeId, name: &str) -> CompileResult<Option<NodeId>> {
    let mut anchor = from;
    for _ in 0..walk_limit(store) {
        let statement = store.parent(anchor)?;
        if statement.is_none() {
            return Ok(None);
        }
        if store.node_type(statement)? != NodeType::Statement {
            return Err(CompileError::internal(
                anchor,
                "scope lookup started below a non-statement node",
            ));
        }

        let head = list_head(store, statement)?;
        for candidate in statement_list(store, head)? {
            let body = store.child(candidate, 1)?;
            if !body.is_none()
                && store.node_type(body)? == NodeType::Class
                && store.token(body, 0)? == name
            {
                return Ok(Some(body));
            }
        }

        let owner = store.parent(head)?;
        if owner.is_none() {
            return Ok(None);
        }
        anchor = owner;
    }
    Err(CompileError::internal(from, "scope chain does not terminate"))
}

/// The nearest Class enclosing `node`, walking up through Statements only.
pub fn enclosing_class(store: &AstStore, node: NodeId) -> CompileResult<Option<NodeId>> {
    let mut current = store.parent(node)?;
    for _ in 0..walk_limit(store) {
        if current.is_none() {
            return Ok(None);
        }
        match store.node_type(current)? {
            NodeType::Statement => current = store.parent(current)?,
            NodeType::Class => return Ok(Some(current)),
            other => {
                return Err(CompileError::internal(
                    current,
                    format!("unexpected {} above a declaration", other),
                ))
            }
        }
    }
    Err(CompileError::internal(node, "parent chain does not terminate"))
}

/// Whether `class` declares any member directly in its body.
pub fn has_members(store: &AstStore, class: NodeId) -> CompileResult<bool> {
    for statement in statement_list(store, store.child(class, 0)?)? {
        let body = store.child(statement, 1)?;
        if !body.is_none() && store.node_type(body)? == NodeType::Declaration {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Member declarations of `class`, in layout order.
pub fn members(store: &AstStore, class: NodeId) -> CompileResult<Vec<MemberInfo>> {
    let mut members = Vec::new();
    let mut offset: u16 = 0;
    for statement in statement_list(store, store.child(class, 0)?)? {
        let body = store.child(statement, 1)?;
        if body.is_none() || store.node_type(body)? != NodeType::Declaration {
            continue;
        }
        let bytes = store.param(body, NodeType::Declaration, params::DECLARATION_BYTES)?;
        members.push(MemberInfo {
            declaration: body,
            offset,
            bytes,
        });
        offset = offset.checked_add(bytes).ok_or_else(|| {
            CompileError::internal(class, "member offsets overflow 16 bits")
        })?;
    }
    Ok(members)
}

/// Find the member called `name` in `class`.
pub fn find_member(store: &AstStore, class: NodeId, name: &str) -> CompileResult<Option<MemberInfo>> {
    for member in members(store, class)? {
        if store.token(member.declaration, 1)? == name {
            return Ok(Some(member));
        }
    }
    Ok(None)
}
