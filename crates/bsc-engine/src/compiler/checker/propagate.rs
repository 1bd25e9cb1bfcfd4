//! Type propagation
//!
//! Walks statements in source order, declaring variables as it goes, and
//! types every expression leaf (variables, constants, folded subtrees,
//! casts). Each leaf's type then climbs towards its statement: operator
//! nodes widen to the larger operand, and the Declaration or Assignment at
//! the top rejects anything wider than its declared type.

use crate::compiler::ast::{params, AstStore, NodeId, NodeType, ValueType};
use crate::compiler::checker::{descriptor_for_name, fold, TypeDescriptor, VariableStack};
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::scope;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy)]
enum Work {
    Visit(NodeId),
    /// Register a declaration's variable once its initializer is typed
    Declare(NodeId),
    LeaveClass,
}

/// Resolved location of a variable access.
#[derive(Debug, Clone, Copy)]
struct Access {
    ty: TypeDescriptor,
    address: u16,
}

struct TypeContext<'a> {
    store: &'a mut AstStore,
    variables: VariableStack,
    depth: u16,
    /// Declared type of every Declaration and Assignment seen so far
    boundaries: FxHashMap<NodeId, TypeDescriptor>,
    /// Type of every typed expression node, including the class of
    /// user-defined values
    types: FxHashMap<NodeId, TypeDescriptor>,
    typed: usize,
}

/// Type every expression in `store`. Returns the number of typed leaves.
pub fn propagate_types(store: &mut AstStore) -> CompileResult<usize> {
    let mut context = TypeContext {
        store,
        variables: VariableStack::new(),
        depth: 0,
        boundaries: FxHashMap::default(),
        types: FxHashMap::default(),
        typed: 0,
    };
    context.run()?;
    log::debug!(
        "type propagation typed {} leaves, {} top-level variables",
        context.typed,
        context.variables.len()
    );
    Ok(context.typed)
}

impl TypeContext<'_> {
    fn run(&mut self) -> CompileResult<()> {
        let mut work = Vec::new();
        if let Some(root) = self.store.root().get() {
            work.push(Work::Visit(root));
        }

        while let Some(item) = work.pop() {
            match item {
                Work::Visit(node) => self.visit(node, &mut work)?,
                Work::Declare(decl) => self.declare(decl)?,
                Work::LeaveClass => {
                    self.depth = self.depth.saturating_sub(1);
                    self.variables.leave(self.depth);
                }
            }
        }
        Ok(())
    }

    fn visit(&mut self, node: NodeId, work: &mut Vec<Work>) -> CompileResult<()> {
        let node_type = self.store.node_type(node)?;

        if matches!(
            node_type,
            NodeType::Expression | NodeType::Term | NodeType::Factor
        ) {
            if let Some(value) = self.store.folded_value(node)? {
                return self.type_constant(node, value as i32);
            }
        }

        match node_type {
            NodeType::Statement => {
                push_child(self.store, node, 0, work)?;
                push_child(self.store, node, 1, work)?;
            }
            NodeType::Class => {
                self.depth += 1;
                work.push(Work::LeaveClass);
                push_child(self.store, node, 0, work)?;
            }
            NodeType::Declaration => {
                let type_name = self.store.token(node, 0)?.to_string();
                let ty = descriptor_for_name(self.store, node, &type_name)?;
                self.store.set_value_type(node, ty.value_type())?;
                self.boundaries.insert(node, ty);
                work.push(Work::Declare(node));
                push_child(self.store, node, 0, work)?;
            }
            NodeType::Assignment => {
                let name = self.store.token(node, 0)?.to_string();
                let access = self.resolve_access(node, &name, self.store.child(node, 1)?)?;
                self.store
                    .set_param(node, NodeType::Assignment, params::ACCESS_ADDRESS, access.address)?;
                self.store
                    .set_param(node, NodeType::Assignment, params::ACCESS_BYTES, access.ty.size())?;
                self.store.set_value_type(node, access.ty.value_type())?;
                self.boundaries.insert(node, access.ty);
                push_child(self.store, node, 0, work)?;
            }
            NodeType::Expression | NodeType::Term => {
                push_child(self.store, node, 0, work)?;
                push_child(self.store, node, 2, work)?;
            }
            NodeType::Factor => push_child(self.store, node, 1, work)?,
            NodeType::Variable => {
                let name = self.store.token(node, 0)?.to_string();
                let access = self.resolve_access(node, &name, self.store.child(node, 0)?)?;
                self.store
                    .set_param(node, NodeType::Variable, params::ACCESS_ADDRESS, access.address)?;
                self.store
                    .set_param(node, NodeType::Variable, params::ACCESS_BYTES, access.ty.size())?;
                self.typed += 1;
                self.propagate_up(node, access.ty)?;
            }
            NodeType::Constant => {
                let value = match self.store.folded_value(node)? {
                    Some(value) => value as i32,
                    None => fold::parse_literal(self.store.token(node, 0)?, node)?,
                };
                self.type_constant(node, value)?;
            }
            NodeType::Cast => {
                let target = self.store.token(node, 0)?;
                let ty = ValueType::from_type_name(target)
                    .and_then(TypeDescriptor::primitive)
                    .ok_or_else(|| CompileError::InvalidOperation {
                        message: format!("cannot cast to class type '{}'", target),
                        node,
                    })?;
                self.typed += 1;
                self.propagate_up(node, ty)?;
                push_child(self.store, node, 0, work)?;
            }
            NodeType::Test => {}
            NodeType::ExpressionOp | NodeType::TermOp | NodeType::UnaryOp | NodeType::Member => {
                return Err(CompileError::internal(
                    node,
                    format!("{} visited outside its parent", node_type),
                ))
            }
        }
        Ok(())
    }

    fn declare(&mut self, decl: NodeId) -> CompileResult<()> {
        let ty = self
            .boundaries
            .get(&decl)
            .copied()
            .ok_or_else(|| CompileError::internal(decl, "declaration was never typed"))?;
        let name = self.store.token(decl, 1)?.to_string();
        let address = self.variables.declare(&name, ty, self.depth, decl)?;
        self.store
            .set_param(decl, NodeType::Declaration, params::DECLARATION_ADDRESS, address)?;
        log::trace!(
            "{} '{}' at depth {} address {} ({} bytes)",
            decl,
            name,
            self.depth,
            address,
            ty.size()
        );
        Ok(())
    }

    /// Resolve `name` followed by the member chain starting at `member`,
    /// writing each member's resolved address and type as it goes.
    fn resolve_access(&mut self, node: NodeId, name: &str, member: NodeId) -> CompileResult<Access> {
        let variable = self.variables.lookup(name, self.depth).ok_or_else(|| {
            CompileError::UndefinedName {
                name: name.to_string(),
                node,
            }
        })?;
        let mut access = Access {
            ty: variable.ty,
            address: variable.address,
        };

        let mut current = member;
        while let Some(member) = current.get() {
            let member_name = self.store.token(member, 0)?.to_string();
            let class = match access.ty {
                TypeDescriptor::UserDefined { class, .. } => class,
                other => {
                    return Err(CompileError::UnknownMember {
                        ty: other.describe(self.store),
                        member: member_name,
                        node: member,
                    })
                }
            };
            let info = scope::find_member(self.store, class, &member_name)?.ok_or_else(|| {
                CompileError::UnknownMember {
                    ty: access.ty.describe(self.store),
                    member: member_name.clone(),
                    node: member,
                }
            })?;
            let member_type = self.store.token(info.declaration, 0)?.to_string();
            let ty = descriptor_for_name(self.store, info.declaration, &member_type)?;
            let address = access.address.checked_add(info.offset).ok_or_else(|| {
                CompileError::internal(member, "member address overflows 16 bits")
            })?;

            self.store
                .set_param(member, NodeType::Member, params::ACCESS_ADDRESS, address)?;
            self.store
                .set_param(member, NodeType::Member, params::ACCESS_BYTES, ty.size())?;
            self.store.set_value_type(member, ty.value_type())?;

            access = Access { ty, address };
            current = self.store.child(member, 0)?;
        }
        Ok(access)
    }

    /// Type a constant leaf or folded subtree: the declared type of the
    /// enclosing statement when the value fits it, otherwise the narrowest
    /// primitive. Never narrower than an explicit cast folded inside it.
    fn type_constant(&mut self, node: NodeId, value: i32) -> CompileResult<()> {
        let narrowest = TypeDescriptor::narrowest_for(value).ok_or_else(|| {
            CompileError::range(node, format!("constant {} does not fit in a short", value))
        })?;
        let ty = match self.required_type(node)? {
            Some(required) if required.is_primitive() && required.holds(value) => required,
            _ => narrowest,
        };
        let ty = match self.cast_floor(node)? {
            Some(floor) if floor.size() > ty.size() => floor,
            _ => ty,
        };
        self.typed += 1;
        self.propagate_up(node, ty)
    }

    /// Widest explicit cast target inside a folded subtree. A cast nested
    /// in another cast is hidden by the outer one.
    fn cast_floor(&self, node: NodeId) -> CompileResult<Option<TypeDescriptor>> {
        let mut floor: Option<TypeDescriptor> = None;
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match self.store.node_type(current)? {
                NodeType::Cast => {
                    let target = ValueType::from_type_name(self.store.token(current, 0)?)
                        .and_then(TypeDescriptor::primitive);
                    if let Some(target) = target {
                        if floor.map_or(true, |f| target.size() > f.size()) {
                            floor = Some(target);
                        }
                    }
                }
                NodeType::Expression | NodeType::Term => {
                    stack.extend(self.store.child(current, 0)?.get());
                    stack.extend(self.store.child(current, 2)?.get());
                }
                NodeType::Factor => stack.extend(self.store.child(current, 1)?.get()),
                _ => {}
            }
        }
        Ok(floor)
    }

    /// Declared type of the statement a constant flows into, unless a cast
    /// intervenes.
    fn required_type(&self, node: NodeId) -> CompileResult<Option<TypeDescriptor>> {
        let mut current = self.store.parent(node)?;
        while let Some(parent) = current.get() {
            match self.store.node_type(parent)? {
                NodeType::Cast | NodeType::Statement => return Ok(None),
                NodeType::Declaration | NodeType::Assignment => {
                    return Ok(self.boundaries.get(&parent).copied())
                }
                _ => current = self.store.parent(parent)?,
            }
        }
        Ok(None)
    }

    fn set_type(&mut self, node: NodeId, ty: TypeDescriptor) -> CompileResult<()> {
        self.types.insert(node, ty);
        self.store.set_value_type(node, ty.value_type())
    }

    /// Give `leaf` its type and carry it towards the enclosing statement.
    fn propagate_up(&mut self, leaf: NodeId, ty: TypeDescriptor) -> CompileResult<()> {
        self.set_type(leaf, ty)?;

        let mut current = leaf;
        let mut ty = ty;
        loop {
            let Some(parent) = self.store.parent(current)?.get() else {
                return Ok(());
            };

            let node_type = self.store.node_type(parent)?;
            match node_type {
                NodeType::Factor | NodeType::Term | NodeType::Expression => {
                    let op_slot = if node_type == NodeType::Factor { 0 } else { 1 };
                    let op = self.store.child(parent, op_slot)?;

                    if !op.is_none() && !ty.is_primitive() {
                        return Err(CompileError::InvalidOperation {
                            message: format!(
                                "operator '{}' cannot be applied to a value of type '{}'",
                                self.store.token(op, 0)?,
                                ty.describe(self.store)
                            ),
                            node: parent,
                        });
                    }

                    let existing = self.types.get(&parent).copied();
                    let merged = match existing {
                        Some(existing) if existing.size() >= ty.size() => existing,
                        _ => ty,
                    };
                    // an earlier operand already carried this type upward
                    if existing == Some(merged) {
                        return Ok(());
                    }
                    self.set_type(parent, merged)?;
                    if !op.is_none() {
                        self.store.set_value_type(op, merged.value_type())?;
                    }
                    current = parent;
                    ty = merged;
                }
                NodeType::Cast if ty.is_primitive() => return Ok(()),
                NodeType::Cast => {
                    return Err(CompileError::InvalidOperation {
                        message: format!(
                            "cannot cast a value of class type '{}'",
                            ty.describe(self.store)
                        ),
                        node: parent,
                    })
                }
                NodeType::Declaration | NodeType::Assignment => {
                    return self.check_boundary(parent, ty)
                }
                other => {
                    return Err(CompileError::internal(
                        parent,
                        format!("expression nested under a {} node", other),
                    ))
                }
            }
        }
    }

    /// The value flowing into a Declaration or Assignment must not be wider
    /// than its declared type, and classes only accept the same class.
    fn check_boundary(&self, boundary: NodeId, incoming: TypeDescriptor) -> CompileResult<()> {
        let declared = self
            .boundaries
            .get(&boundary)
            .copied()
            .ok_or_else(|| CompileError::internal(boundary, "statement was never typed"))?;

        let compatible = match (declared, incoming) {
            (d, i) if d.is_primitive() && i.is_primitive() => i.size() <= d.size(),
            (TypeDescriptor::UserDefined { class: d, .. }, TypeDescriptor::UserDefined { class: i, .. }) => {
                d == i
            }
            _ => false,
        };

        if compatible {
            Ok(())
        } else {
            Err(CompileError::TypeMismatch {
                expected: declared.describe(self.store),
                found: incoming.describe(self.store),
                node: boundary,
            })
        }
    }
}

fn push_child(store: &AstStore, node: NodeId, index: usize, work: &mut Vec<Work>) -> CompileResult<()> {
    if let Some(child) = store.child(node, index)?.get() {
        work.push(Work::Visit(child));
    }
    Ok(())
}
