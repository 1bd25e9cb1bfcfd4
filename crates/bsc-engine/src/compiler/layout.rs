//! Symbol and layout resolution
//!
//! Assigns a byte size to every Declaration and every Class. Classes may be
//! used before they are declared, so sizing is a fixed-point computation over
//! a worklist: a declaration whose class is not complete yet goes back to the
//! front of the queue and is retried once everything else has run.
//!
//! Each Class tracks, in its PENDING parameter, how many of its member
//! declarations are still waiting, plus a dirty flag set once any member has
//! been visited. A class is complete when the flag is set and nothing is
//! pending.

use crate::compiler::ast::{params, AstStore, NodeId, NodeType, ValueType};
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::scope;
use std::collections::VecDeque;

/// Attempts allowed per declaration when no explicit bound is configured and
/// the program has few classes.
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// Set in a class's PENDING parameter once any member has been visited
pub const PENDING_DIRTY: u16 = 1 << 15;

/// Resolver configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutOptions {
    /// Attempts per declaration before giving up. `None` derives the bound
    /// from the number of classes.
    pub max_attempts: Option<u8>,
}

/// What the resolver did, for logging and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutSummary {
    pub classes: usize,
    pub declarations: usize,
    pub retries: usize,
    pub max_attempts: u8,
}

#[derive(Debug, Clone, Copy)]
struct WorkItem {
    node: NodeId,
    attempts: u8,
}

/// Worklist-driven layout resolver.
pub struct LayoutResolver<'a> {
    store: &'a mut AstStore,
    queue: VecDeque<WorkItem>,
    max_attempts: u8,
    summary: LayoutSummary,
}

/// Size every declaration and class in `store`.
pub fn resolve_layout(store: &mut AstStore, options: &LayoutOptions) -> CompileResult<LayoutSummary> {
    LayoutResolver::new(store, options)?.run()
}

impl<'a> LayoutResolver<'a> {
    pub fn new(store: &'a mut AstStore, options: &LayoutOptions) -> CompileResult<Self> {
        let mut classes = 0;
        for id in store.node_ids()? {
            if store.node_type(id)? == NodeType::Class {
                classes += 1;
            }
        }

        // A chain of n classes declared in reverse order needs n attempts for
        // the outermost declaration, so the bound grows with the class count.
        let derived = u8::try_from(classes + 1)
            .unwrap_or(u8::MAX)
            .max(DEFAULT_MAX_ATTEMPTS);
        let max_attempts = options.max_attempts.unwrap_or(derived).max(1);

        Ok(Self {
            store,
            queue: VecDeque::new(),
            max_attempts,
            summary: LayoutSummary {
                classes,
                max_attempts,
                ..LayoutSummary::default()
            },
        })
    }

    pub fn run(mut self) -> CompileResult<LayoutSummary> {
        let root = self.store.root();
        if !root.is_none() {
            self.queue.push_back(WorkItem {
                node: root,
                attempts: 0,
            });
        }

        // Every node is visited once plus at most `max_attempts` retries.
        let budget = self.store.node_ids()?.len() * (self.max_attempts as usize + 1) + 1;
        let mut steps = 0;

        while let Some(item) = self.queue.pop_back() {
            steps += 1;
            if steps > budget {
                return Err(CompileError::internal(
                    item.node,
                    "layout worklist did not converge",
                ));
            }

            match self.store.node_type(item.node)? {
                NodeType::Statement => {
                    self.push(self.store.child(item.node, 0)?);
                    self.push(self.store.child(item.node, 1)?);
                }
                NodeType::Class => {
                    // no member declaration will ever mark it, so it is
                    // complete at size 0
                    if !scope::has_members(self.store, item.node)? {
                        self.store.set_param(
                            item.node,
                            NodeType::Class,
                            params::CLASS_PENDING,
                            PENDING_DIRTY,
                        )?;
                    }
                    self.push(self.store.child(item.node, 0)?);
                }
                NodeType::Declaration => self.declaration(item)?,
                _ => {}
            }
        }

        log::debug!(
            "layout resolved: {} classes, {} declarations, {} retries (bound {})",
            self.summary.classes,
            self.summary.declarations,
            self.summary.retries,
            self.max_attempts
        );
        Ok(self.summary)
    }

    fn push(&mut self, node: NodeId) {
        if !node.is_none() {
            self.queue.push_back(WorkItem { node, attempts: 0 });
        }
    }

    /// Size of the declared type, or `None` while its class is incomplete.
    fn declared_size(&self, decl: NodeId, type_name: &str) -> CompileResult<Option<u16>> {
        if let Some(size) = ValueType::from_type_name(type_name).and_then(ValueType::size) {
            return Ok(Some(size));
        }

        let class = scope::find_class(self.store, decl, type_name)?.ok_or_else(|| {
            CompileError::Layout {
                type_name: type_name.to_string(),
                reason: "no class with this name is in scope".to_string(),
                node: decl,
            }
        })?;
        let pending = self
            .store
            .param(class, NodeType::Class, params::CLASS_PENDING)?;
        if pending == PENDING_DIRTY {
            Ok(Some(
                self.store
                    .param(class, NodeType::Class, params::CLASS_BYTES)?,
            ))
        } else {
            Ok(None)
        }
    }

    fn declaration(&mut self, item: WorkItem) -> CompileResult<()> {
        let type_name = self.store.token(item.node, 0)?.to_string();

        if item.attempts >= self.max_attempts {
            return Err(CompileError::Layout {
                reason: format!(
                    "still incomplete after {} attempts; the class graph is circular",
                    item.attempts
                ),
                type_name,
                node: item.node,
            });
        }

        let size = self.declared_size(item.node, &type_name)?;

        if let Some(class) = scope::enclosing_class(self.store, item.node)? {
            let pending = self
                .store
                .param(class, NodeType::Class, params::CLASS_PENDING)?;
            let mut count = pending & !PENDING_DIRTY;

            match size {
                Some(bytes) => {
                    let total = self
                        .store
                        .param(class, NodeType::Class, params::CLASS_BYTES)?
                        .checked_add(bytes)
                        .ok_or_else(|| CompileError::Layout {
                            type_name: self.store.token(class, 0).unwrap_or("?").to_string(),
                            reason: "class is larger than 65535 bytes".to_string(),
                            node: class,
                        })?;
                    self.store
                        .set_param(class, NodeType::Class, params::CLASS_BYTES, total)?;
                    if item.attempts > 0 {
                        count = count.checked_sub(1).ok_or_else(|| {
                            CompileError::internal(class, "pending member count underflow")
                        })?;
                    }
                }
                None if item.attempts == 0 => count += 1,
                None => {}
            }

            self.store.set_param(
                class,
                NodeType::Class,
                params::CLASS_PENDING,
                count | PENDING_DIRTY,
            )?;
        }

        match size {
            Some(bytes) => {
                self.store.set_param(
                    item.node,
                    NodeType::Declaration,
                    params::DECLARATION_BYTES,
                    bytes,
                )?;
                self.summary.declarations += 1;
                log::trace!(
                    "{} '{}' resolved to {} bytes (attempt {})",
                    item.node,
                    type_name,
                    bytes,
                    item.attempts
                );
            }
            None => {
                log::trace!(
                    "{} '{}' is incomplete, retrying (attempt {})",
                    item.node,
                    type_name,
                    item.attempts
                );
                self.summary.retries += 1;
                self.queue.push_front(WorkItem {
                    node: item.node,
                    attempts: item.attempts + 1,
                });
            }
        }
        Ok(())
    }
}
