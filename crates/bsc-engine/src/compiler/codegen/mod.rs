//! Bytecode generation
//!
//! Lowers the typed AST into a flat instruction stream with an explicit work
//! stack instead of recursion. Work items are pushed in reverse evaluation
//! order, so popping them yields post-order emission: left operand, right
//! operand, operator.
//!
//! Class bodies are compiled in place, behind a skip jump, and reached only
//! through `call`. A class may be used before its body appears, so the
//! lowering runs twice: the first run records where every class body starts
//! and ends, the second emits the real targets. Both runs emit exactly the
//! same number of bytes.

use crate::compiler::ast::{params, AstStore, NodeId, NodeType, ValueType};
use crate::compiler::bytecode::{BytecodeWriter, Instruction};
use crate::compiler::checker::fold;
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::scope;
use rustc_hash::FxHashMap;

/// Default bound on processed work items
pub const DEFAULT_MAX_STEPS: usize = 1 << 20;

/// Code generator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Work items processed per lowering run before giving up
    pub max_steps: usize,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Entry and exit offsets of a compiled class body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ClassLabels {
    /// Operand of the entry label; the exit label uses `id + 1`
    id: u16,
    entry: u16,
    exit: u16,
}

#[derive(Debug, Clone, Copy)]
enum Work {
    Lower(NodeId),
    Emit(Instruction),
    /// Close a class body once all of its statements are emitted
    Epilogue(NodeId),
}

struct Lowering<'a> {
    store: &'a AstStore,
    options: &'a CodegenOptions,
    /// Labels known from the previous run
    known: &'a FxHashMap<NodeId, ClassLabels>,
    /// Labels recorded during this run
    recorded: FxHashMap<NodeId, ClassLabels>,
    writer: BytecodeWriter,
    depth: u16,
    next_label: u16,
}

/// Generate bytecode for a resolved and checked store.
///
/// # Errors
///
/// Returns `CompileError::Internal` when the tree is not fully typed, the
/// step budget runs out, or the program does not fit 16-bit addresses.
pub fn generate(store: &AstStore, options: &CodegenOptions) -> CompileResult<Vec<u8>> {
    let empty = FxHashMap::default();
    let (first, labels) = Lowering::new(store, options, &empty).run()?;
    let (code, _) = Lowering::new(store, options, &labels).run()?;

    if first.len() != code.len() {
        return Err(CompileError::internal(
            store.root(),
            format!(
                "label layout is unstable ({} bytes, then {})",
                first.len(),
                code.len()
            ),
        ));
    }

    log::debug!("generated {} bytes of bytecode, {} class bodies", code.len(), labels.len());
    Ok(code)
}

fn arithmetic(op: &str, value_type: ValueType, node: NodeId) -> CompileResult<Instruction> {
    let wide = match value_type {
        ValueType::Byte => false,
        ValueType::Short => true,
        other => {
            return Err(CompileError::internal(
                node,
                format!("arithmetic on a {} value reached code generation", other),
            ))
        }
    };
    let instruction = match (op, wide) {
        ("+", false) => Instruction::Add8,
        ("-", false) => Instruction::Sub8,
        ("*", false) => Instruction::Mul8,
        ("/", false) => Instruction::Div8,
        ("+", true) => Instruction::Add16,
        ("-", true) => Instruction::Sub16,
        ("*", true) => Instruction::Mul16,
        ("/", true) => Instruction::Div16,
        _ => {
            return Err(CompileError::internal(
                node,
                format!("unknown operator '{}'", op),
            ))
        }
    };
    Ok(instruction)
}

fn store_instruction(value_type: ValueType, node: NodeId) -> CompileResult<Instruction> {
    match value_type {
        ValueType::Byte => Ok(Instruction::Set8),
        ValueType::Short => Ok(Instruction::Set16),
        other => Err(CompileError::internal(
            node,
            format!("cannot store a {} value", other),
        )),
    }
}

impl<'a> Lowering<'a> {
    fn new(
        store: &'a AstStore,
        options: &'a CodegenOptions,
        known: &'a FxHashMap<NodeId, ClassLabels>,
    ) -> Self {
        Self {
            store,
            options,
            known,
            recorded: FxHashMap::default(),
            writer: BytecodeWriter::new(),
            depth: 0,
            next_label: 0,
        }
    }

    fn run(mut self) -> CompileResult<(Vec<u8>, FxHashMap<NodeId, ClassLabels>)> {
        let mut work = Vec::new();
        if let Some(root) = self.store.root().get() {
            work.push(Work::Lower(root));
        }

        let mut steps = 0;
        while let Some(item) = work.pop() {
            steps += 1;
            if steps > self.options.max_steps {
                return Err(CompileError::internal(
                    self.store.root(),
                    format!("code generation exceeded {} steps", self.options.max_steps),
                ));
            }
            match item {
                Work::Lower(node) => self.lower(node, &mut work)?,
                Work::Emit(instruction) => self.emit(instruction),
                Work::Epilogue(class) => self.epilogue(class)?,
            }
        }

        self.emit(Instruction::Eof);
        if self.writer.offset() > u16::MAX as usize {
            return Err(CompileError::internal(
                self.store.root(),
                "bytecode does not fit 16-bit addresses",
            ));
        }
        Ok((self.writer.into_bytes(), self.recorded))
    }

    fn emit(&mut self, instruction: Instruction) {
        instruction.encode(&mut self.writer);
    }

    fn here(&self) -> u16 {
        // clamped; run() rejects oversized programs once emission is done
        u16::try_from(self.writer.offset()).unwrap_or(u16::MAX)
    }

    fn labels_of(&self, class: NodeId) -> ClassLabels {
        self.known.get(&class).copied().unwrap_or_default()
    }

    fn lower(&mut self, node: NodeId, work: &mut Vec<Work>) -> CompileResult<()> {
        let store = self.store;
        let node_type = store.node_type(node)?;

        if let Some(value) = store.folded_value(node)? {
            if !matches!(
                node_type,
                NodeType::Statement | NodeType::Declaration | NodeType::Assignment
            ) {
                return self.push_constant(node, value);
            }
        }

        match node_type {
            NodeType::Statement => {
                push_lower(store, node, 0, work)?;
                push_lower(store, node, 1, work)?;
            }
            NodeType::Class => {
                let labels = self.labels_of(node);
                let entry_id = self.next_label;
                self.next_label = self.next_label.wrapping_add(2);

                self.emit(Instruction::Ijump(labels.exit));
                let entry = self.here();
                self.recorded.insert(
                    node,
                    ClassLabels {
                        id: entry_id,
                        entry,
                        exit: 0,
                    },
                );
                self.emit(Instruction::Label(entry_id));
                self.depth += 1;

                work.push(Work::Epilogue(node));
                push_lower(store, node, 0, work)?;
            }
            NodeType::Declaration => self.declaration(node, work)?,
            NodeType::Assignment => {
                let address = store.param(node, NodeType::Assignment, params::ACCESS_ADDRESS)?;
                let bytes = store.param(node, NodeType::Assignment, params::ACCESS_BYTES)?;
                let value_type = store.value_type(node)?;
                let expression = store.child(node, 0)?;

                if value_type == ValueType::UserDefined {
                    schedule_copy(address, bytes, expression, work);
                } else {
                    self.emit(Instruction::Push16(address));
                    work.push(Work::Emit(store_instruction(value_type, node)?));
                    work.push(Work::Lower(expression));
                }
            }
            NodeType::Expression | NodeType::Term => {
                let op = store.child(node, 1)?;
                if !op.is_none() {
                    let instruction = arithmetic(store.token(op, 0)?, store.value_type(node)?, node)?;
                    work.push(Work::Emit(instruction));
                }
                push_lower(store, node, 0, work)?;
                push_lower(store, node, 2, work)?;
            }
            NodeType::Factor => {
                let unary = store.child(node, 0)?;
                if !unary.is_none() && store.token(unary, 0)? == "-" {
                    let negate = match store.value_type(node)? {
                        ValueType::Byte => Instruction::Neg8,
                        ValueType::Short => Instruction::Neg16,
                        other => {
                            return Err(CompileError::internal(
                                node,
                                format!("negation of a {} value", other),
                            ))
                        }
                    };
                    work.push(Work::Emit(negate));
                }
                push_lower(store, node, 1, work)?;
            }
            NodeType::Cast => {
                let operand = store.child(node, 0)?;
                let from = store.value_type(operand)?;
                let to = store.value_type(node)?;
                match (from, to) {
                    (ValueType::Byte, ValueType::Short) => work.push(Work::Emit(Instruction::Extend)),
                    (ValueType::Short, ValueType::Byte) => work.push(Work::Emit(Instruction::Pop8)),
                    (a, b) if a == b => {}
                    (a, b) => {
                        return Err(CompileError::internal(
                            node,
                            format!("no conversion from {} to {}", a, b),
                        ))
                    }
                }
                work.push(Work::Lower(operand));
            }
            NodeType::Variable => {
                let address = store.param(node, NodeType::Variable, params::ACCESS_ADDRESS)?;
                let instruction = match store.value_type(node)? {
                    ValueType::Byte => Instruction::Iget8(address),
                    ValueType::Short => Instruction::Iget16(address),
                    ValueType::UserDefined => Instruction::Push16(address),
                    ValueType::None => {
                        return Err(CompileError::internal(node, "variable was never typed"))
                    }
                };
                self.emit(instruction);
            }
            NodeType::Constant => {
                let value = fold::parse_literal(store.token(node, 0)?, node)?;
                self.push_constant(node, value as i16)?;
            }
            NodeType::Test => {}
            NodeType::ExpressionOp | NodeType::TermOp | NodeType::UnaryOp | NodeType::Member => {
                return Err(CompileError::internal(
                    node,
                    format!("{} lowered outside its parent", node_type),
                ))
            }
        }
        Ok(())
    }

    fn declaration(&mut self, node: NodeId, work: &mut Vec<Work>) -> CompileResult<()> {
        let store = self.store;
        let bytes = store.param(node, NodeType::Declaration, params::DECLARATION_BYTES)?;
        let address = store.param(node, NodeType::Declaration, params::DECLARATION_ADDRESS)?;
        let value_type = store.value_type(node)?;
        let initializer = store.child(node, 0)?;

        // class members live in space the caller already reserved
        if self.depth == 0 && bytes > 0 {
            self.emit(Instruction::PushZeros(bytes));
        }

        if value_type == ValueType::UserDefined {
            let type_name = store.token(node, 0)?;
            let class = scope::find_class(store, node, type_name)?.ok_or_else(|| {
                CompileError::internal(node, format!("class '{}' vanished after layout", type_name))
            })?;
            self.emit(Instruction::Call {
                frame_delta: address,
                target: self.labels_of(class).entry,
            });
            if !initializer.is_none() {
                schedule_copy(address, bytes, initializer, work);
            }
        } else if !initializer.is_none() {
            self.emit(Instruction::Push16(address));
            work.push(Work::Emit(store_instruction(value_type, node)?));
            work.push(Work::Lower(initializer));
        }
        Ok(())
    }

    fn epilogue(&mut self, class: NodeId) -> CompileResult<()> {
        self.emit(Instruction::Ret);
        let exit = self.here();
        let labels = self
            .recorded
            .get_mut(&class)
            .ok_or_else(|| CompileError::internal(class, "class epilogue without entry"))?;
        labels.exit = exit;
        let exit_id = labels.id.wrapping_add(1);
        self.emit(Instruction::Label(exit_id));
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    fn push_constant(&mut self, node: NodeId, value: i16) -> CompileResult<()> {
        let instruction = match self.store.value_type(node)? {
            ValueType::Byte => Instruction::Push8(value as i8 as u8),
            ValueType::Short => Instruction::Push16(value as u16),
            other => {
                return Err(CompileError::internal(
                    node,
                    format!("constant typed as {}", other),
                ))
            }
        };
        self.emit(instruction);
        Ok(())
    }
}

fn push_lower(store: &AstStore, node: NodeId, index: usize, work: &mut Vec<Work>) -> CompileResult<()> {
    if let Some(child) = store.child(node, index)?.get() {
        work.push(Work::Lower(child));
    }
    Ok(())
}

/// Byte-wise aggregate copy from the class value `source` into `destination`.
fn schedule_copy(destination: u16, bytes: u16, source: NodeId, work: &mut Vec<Work>) {
    for offset in (0..bytes).rev() {
        work.push(Work::Emit(Instruction::Set8));
        work.push(Work::Emit(Instruction::Get8));
        work.push(Work::Emit(Instruction::Add16));
        work.push(Work::Emit(Instruction::Push16(offset)));
        work.push(Work::Lower(source));
        work.push(Work::Emit(Instruction::Push16(destination.wrapping_add(offset))));
    }
}
