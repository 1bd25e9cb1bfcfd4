//! Offset-addressed AST store
//!
//! The AST lives in a single append-only byte buffer. A node's identity is
//! its byte offset, which never changes once the node is written; nodes refer
//! to each other (children, parent) by offset. The buffer is also the `.ast`
//! file format, so every stage can hand the tree to the next through a file.
//!
//! # Layout
//!
//! ```text
//! [root: u16]
//! node := [node_type: u8][value_type: u8][scratch: u16][parent: u16]
//!         [children: child_count * u16]
//!         [params: param_count * u16]
//!         [tokens: token_count * NUL-terminated string]
//! ```
//!
//! All integers are little-endian. Offset 0 is the "no node" marker (the
//! root pointer occupies it). Child, param and token counts are static per
//! [`NodeType`], so they are never stored.
//!
//! Structure is append-only: after a node is written only its `value_type`,
//! `scratch` and params change, except for the two pointer fields rewritten by
//! [`AstStore::splice_insert`] and the slot filled by [`AstStore::append_child`].

use crate::compiler::error::{CompileError, CompileResult};
use crate::parser::Span;
use rustc_hash::FxHashMap;
use std::fmt;

/// Size of the root pointer at the start of the store
pub const ROOT_POINTER_SIZE: usize = 2;

/// Fixed header size of every node
pub const NODE_HEADER_SIZE: usize = 6;

/// Offsets are 16-bit, which bounds the store
pub const MAX_STORE_SIZE: usize = u16::MAX as usize;

/// Bit 7 of the value-type byte: the node's subtree folded to the constant
/// held in `scratch`
const FOLDED_FLAG: u8 = 0x80;

const OFFSET_VALUE_TYPE: usize = 1;
const OFFSET_SCRATCH: usize = 2;
const OFFSET_PARENT: usize = 4;

/// Stable identity of a node: its byte offset in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(u16);

impl NodeId {
    /// The "no node" marker
    pub const NONE: NodeId = NodeId(0);

    pub const fn new(offset: u16) -> Self {
        Self(offset)
    }

    pub const fn offset(self) -> u16 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// `None` for the marker, `Some(self)` otherwise.
    pub fn get(self) -> Option<NodeId> {
        (!self.is_none()).then_some(self)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node @{}", self.0)
    }
}

/// Node types, with their static schema.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// children: [next, body]
    Statement = 1,
    /// children: [initializer]; params: [BYTES, ADDRESS]; tokens: [type, name]
    Declaration = 2,
    /// children: [expression, member]; params: [ADDRESS, BYTES]; tokens: [name]
    Assignment = 3,
    /// children: [right term, operator, left term]
    Expression = 4,
    /// tokens: [operator]
    ExpressionOp = 5,
    /// children: [right factor, operator, left factor]
    Term = 6,
    /// tokens: [operator]
    TermOp = 7,
    /// children: [unary operator, value]
    Factor = 8,
    /// tokens: [operator]
    UnaryOp = 9,
    /// children: [member]; params: [ADDRESS, BYTES]; tokens: [name]
    Variable = 10,
    /// children: [next member]; params: [ADDRESS, BYTES]; tokens: [name]
    Member = 11,
    /// tokens: [literal]
    Constant = 12,
    /// children: [operand]; tokens: [target type]
    Cast = 13,
    /// children: [body]; params: [BYTES, PENDING]; tokens: [name]
    Class = 14,
    /// tokens: [expected stack values]
    Test = 15,
}

impl NodeType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        let node_type = match byte {
            1 => Self::Statement,
            2 => Self::Declaration,
            3 => Self::Assignment,
            4 => Self::Expression,
            5 => Self::ExpressionOp,
            6 => Self::Term,
            7 => Self::TermOp,
            8 => Self::Factor,
            9 => Self::UnaryOp,
            10 => Self::Variable,
            11 => Self::Member,
            12 => Self::Constant,
            13 => Self::Cast,
            14 => Self::Class,
            15 => Self::Test,
            _ => return None,
        };
        Some(node_type)
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Statement => "Statement",
            Self::Declaration => "Declaration",
            Self::Assignment => "Assignment",
            Self::Expression => "Expression",
            Self::ExpressionOp => "ExpressionOp",
            Self::Term => "Term",
            Self::TermOp => "TermOp",
            Self::Factor => "Factor",
            Self::UnaryOp => "UnaryOp",
            Self::Variable => "Variable",
            Self::Member => "Member",
            Self::Constant => "Constant",
            Self::Cast => "Cast",
            Self::Class => "Class",
            Self::Test => "Test",
        }
    }

    pub const fn child_count(self) -> usize {
        match self {
            Self::Expression | Self::Term => 3,
            Self::Statement | Self::Assignment | Self::Factor => 2,
            Self::Declaration | Self::Variable | Self::Member | Self::Cast | Self::Class => 1,
            Self::ExpressionOp | Self::TermOp | Self::UnaryOp | Self::Constant | Self::Test => 0,
        }
    }

    pub const fn param_count(self) -> usize {
        match self {
            Self::Declaration | Self::Assignment | Self::Variable | Self::Member | Self::Class => 2,
            _ => 0,
        }
    }

    pub const fn token_count(self) -> usize {
        match self {
            Self::Declaration => 2,
            Self::Statement | Self::Expression | Self::Term | Self::Factor => 0,
            _ => 1,
        }
    }

    /// Operator leaves hanging off Expression, Term and Factor nodes.
    pub fn is_operator(self) -> bool {
        matches!(self, Self::ExpressionOp | Self::TermOp | Self::UnaryOp)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameter slot indices, per node type.
pub mod params {
    /// Declaration: resolved byte size
    pub const DECLARATION_BYTES: usize = 0;
    /// Declaration: frame-relative address
    pub const DECLARATION_ADDRESS: usize = 1;
    /// Class: running aggregate size
    pub const CLASS_BYTES: usize = 0;
    /// Class: pending member count plus the dirty flag
    pub const CLASS_PENDING: usize = 1;
    /// Assignment/Variable/Member: resolved frame-relative address
    pub const ACCESS_ADDRESS: usize = 0;
    /// Assignment/Variable/Member: byte size of the resolved leaf
    pub const ACCESS_BYTES: usize = 1;
}

/// Resolved type recorded on a node.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    #[default]
    None = 0,
    Byte = 1,
    Short = 2,
    UserDefined = 3,
}

impl ValueType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Byte),
            2 => Some(Self::Short),
            3 => Some(Self::UserDefined),
            _ => None,
        }
    }

    /// Primitive type named by a type token, if any.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "byte" => Some(Self::Byte),
            "short" => Some(Self::Short),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::UserDefined => "class",
        }
    }

    /// Byte width of a primitive type.
    pub fn size(self) -> Option<u16> {
        match self {
            Self::Byte => Some(1),
            Self::Short => Some(2),
            Self::None | Self::UserDefined => None,
        }
    }

    pub fn is_primitive(self) -> bool {
        matches!(self, Self::Byte | Self::Short)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node to be written into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub node_type: NodeType,
    pub value_type: ValueType,
    pub children: Vec<NodeId>,
    pub params: Vec<u16>,
    pub tokens: Vec<String>,
}

impl NewNode {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            value_type: ValueType::None,
            children: Vec::new(),
            params: Vec::new(),
            tokens: Vec::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    pub fn with_child(mut self, index: usize, child: NodeId) -> Self {
        if self.children.len() <= index {
            self.children.resize(index + 1, NodeId::NONE);
        }
        self.children[index] = child;
        self
    }

    pub fn with_param(mut self, index: usize, value: u16) -> Self {
        if self.params.len() <= index {
            self.params.resize(index + 1, 0);
        }
        self.params[index] = value;
        self
    }

    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }
}

/// A fully decoded node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstNode {
    pub id: NodeId,
    pub node_type: NodeType,
    pub value_type: ValueType,
    pub folded: bool,
    pub scratch: u16,
    pub parent: NodeId,
    pub children: Vec<NodeId>,
    pub params: Vec<u16>,
    pub tokens: Vec<String>,
}

impl AstNode {
    /// Child at `index`, or the none marker.
    pub fn child(&self, index: usize) -> NodeId {
        self.children.get(index).copied().unwrap_or(NodeId::NONE)
    }

    pub fn token(&self, index: usize) -> &str {
        self.tokens.get(index).map(String::as_str).unwrap_or("")
    }

    /// The folded constant, when the subtree was evaluated at compile time.
    pub fn folded_value(&self) -> Option<i16> {
        self.folded.then_some(self.scratch as i16)
    }
}

/// The append-only AST store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstStore {
    bytes: Vec<u8>,
    /// Source spans of parser-created nodes; not part of the file format
    spans: FxHashMap<NodeId, Span>,
}

impl Default for AstStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AstStore {
    /// Create an empty store (root pointer only).
    pub fn new() -> Self {
        Self {
            bytes: vec![0; ROOT_POINTER_SIZE],
            spans: FxHashMap::default(),
        }
    }

    /// Load a store from its file form, validating that every node decodes.
    pub fn from_bytes(bytes: Vec<u8>) -> CompileResult<Self> {
        if bytes.len() < ROOT_POINTER_SIZE {
            return Err(CompileError::internal(
                NodeId::NONE,
                "AST file is shorter than its root pointer",
            ));
        }
        if bytes.len() > MAX_STORE_SIZE {
            return Err(CompileError::internal(
                NodeId::NONE,
                format!("AST file is {} bytes, above the {} byte limit", bytes.len(), MAX_STORE_SIZE),
            ));
        }

        let store = Self {
            bytes,
            spans: FxHashMap::default(),
        };
        let ids = store.node_ids()?;
        let root = store.root();
        if !root.is_none() && ids.binary_search(&root).is_err() {
            return Err(CompileError::internal(
                root,
                "root pointer does not point at the start of a node",
            ));
        }
        Ok(store)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The `.ast` file form.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Size of the store in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when no node has been written.
    pub fn is_empty(&self) -> bool {
        self.bytes.len() == ROOT_POINTER_SIZE
    }

    pub fn root(&self) -> NodeId {
        NodeId(u16::from_le_bytes([self.bytes[0], self.bytes[1]]))
    }

    // ========================================================================
    // Spans
    // ========================================================================

    pub fn set_span(&mut self, id: NodeId, span: Span) {
        self.spans.insert(id, span);
    }

    pub fn span(&self, id: NodeId) -> Option<Span> {
        self.spans.get(&id).copied()
    }

    /// Adopt the spans of another store built from the same source. Used when
    /// a stage reloads a `.ast` file, which does not carry spans.
    pub fn copy_spans_from(&mut self, other: &AstStore) {
        for (id, span) in &other.spans {
            self.spans.entry(*id).or_insert(*span);
        }
    }

    // ========================================================================
    // Raw access
    // ========================================================================

    fn u16_at(&self, at: usize, node: NodeId) -> CompileResult<u16> {
        match self.bytes.get(at..at + 2) {
            Some(raw) => Ok(u16::from_le_bytes([raw[0], raw[1]])),
            None => Err(CompileError::internal(node, "node is truncated")),
        }
    }

    fn set_u16_at(&mut self, at: usize, value: u16, node: NodeId) -> CompileResult<()> {
        match self.bytes.get_mut(at..at + 2) {
            Some(raw) => {
                raw.copy_from_slice(&value.to_le_bytes());
                Ok(())
            }
            None => Err(CompileError::internal(node, "node is truncated")),
        }
    }

    fn check_header(&self, id: NodeId) -> CompileResult<usize> {
        let base = id.index();
        if id.is_none() || base < ROOT_POINTER_SIZE || base + NODE_HEADER_SIZE > self.bytes.len() {
            return Err(CompileError::internal(id, "offset does not address a node"));
        }
        Ok(base)
    }

    /// Decoded node type at `id`.
    pub fn node_type(&self, id: NodeId) -> CompileResult<NodeType> {
        let base = self.check_header(id)?;
        NodeType::from_u8(self.bytes[base])
            .ok_or_else(|| CompileError::internal(id, format!("unknown node type {}", self.bytes[base])))
    }

    fn expect_type(&self, id: NodeId, expected: NodeType) -> CompileResult<usize> {
        let actual = self.node_type(id)?;
        if actual != expected {
            return Err(CompileError::internal(
                id,
                format!("expected a {} node, found {}", expected, actual),
            ));
        }
        Ok(id.index())
    }

    fn child_slot(&self, id: NodeId, index: usize) -> CompileResult<usize> {
        let node_type = self.node_type(id)?;
        if index >= node_type.child_count() {
            return Err(CompileError::internal(
                id,
                format!("{} has no child slot {}", node_type, index),
            ));
        }
        Ok(id.index() + NODE_HEADER_SIZE + index * 2)
    }

    fn param_slot(&self, id: NodeId, expected: NodeType, index: usize) -> CompileResult<usize> {
        let base = self.expect_type(id, expected)?;
        if index >= expected.param_count() {
            return Err(CompileError::internal(
                id,
                format!("{} has no parameter slot {}", expected, index),
            ));
        }
        Ok(base + NODE_HEADER_SIZE + (expected.child_count() + index) * 2)
    }

    fn tokens_start(&self, id: NodeId) -> CompileResult<(NodeType, usize)> {
        let node_type = self.node_type(id)?;
        let start = id.index()
            + NODE_HEADER_SIZE
            + (node_type.child_count() + node_type.param_count()) * 2;
        Ok((node_type, start))
    }

    /// NUL-terminated string at `at`; returns the string and the offset after
    /// its terminator.
    fn string_at(&self, at: usize, node: NodeId) -> CompileResult<(&str, usize)> {
        let tail = self
            .bytes
            .get(at..)
            .ok_or_else(|| CompileError::internal(node, "token payload is truncated"))?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| CompileError::internal(node, "token is not NUL-terminated"))?;
        let text = std::str::from_utf8(&tail[..len])
            .map_err(|_| CompileError::internal(node, "token is not valid UTF-8"))?;
        Ok((text, at + len + 1))
    }

    /// Total encoded size of the node at `id`.
    fn node_len(&self, id: NodeId) -> CompileResult<usize> {
        let (node_type, mut at) = self.tokens_start(id)?;
        for _ in 0..node_type.token_count() {
            let (_, next) = self.string_at(at, id)?;
            at = next;
        }
        if at > self.bytes.len() {
            return Err(CompileError::internal(id, "node is truncated"));
        }
        Ok(at - id.index())
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Decode the node at `id`.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::Internal` if `id` does not address a well-formed
    /// node.
    pub fn read(&self, id: NodeId) -> CompileResult<AstNode> {
        let node_type = self.node_type(id)?;
        let base = id.index();
        let raw_value_type = self.bytes[base + OFFSET_VALUE_TYPE];
        let value_type = ValueType::from_u8(raw_value_type & !FOLDED_FLAG).ok_or_else(|| {
            CompileError::internal(id, format!("unknown value type {}", raw_value_type))
        })?;

        let mut at = base + NODE_HEADER_SIZE;
        let mut children = Vec::with_capacity(node_type.child_count());
        for _ in 0..node_type.child_count() {
            children.push(NodeId(self.u16_at(at, id)?));
            at += 2;
        }
        let mut params = Vec::with_capacity(node_type.param_count());
        for _ in 0..node_type.param_count() {
            params.push(self.u16_at(at, id)?);
            at += 2;
        }
        let mut tokens = Vec::with_capacity(node_type.token_count());
        for _ in 0..node_type.token_count() {
            let (text, next) = self.string_at(at, id)?;
            tokens.push(text.to_string());
            at = next;
        }

        Ok(AstNode {
            id,
            node_type,
            value_type,
            folded: raw_value_type & FOLDED_FLAG != 0,
            scratch: self.u16_at(base + OFFSET_SCRATCH, id)?,
            parent: NodeId(self.u16_at(base + OFFSET_PARENT, id)?),
            children,
            params,
            tokens,
        })
    }

    pub fn parent(&self, id: NodeId) -> CompileResult<NodeId> {
        let base = self.check_header(id)?;
        Ok(NodeId(self.u16_at(base + OFFSET_PARENT, id)?))
    }

    pub fn child(&self, id: NodeId, index: usize) -> CompileResult<NodeId> {
        let slot = self.child_slot(id, index)?;
        Ok(NodeId(self.u16_at(slot, id)?))
    }

    /// Token string `index` of the node at `id`.
    pub fn token(&self, id: NodeId, index: usize) -> CompileResult<&str> {
        let (node_type, mut at) = self.tokens_start(id)?;
        if index >= node_type.token_count() {
            return Err(CompileError::internal(
                id,
                format!("{} has no token {}", node_type, index),
            ));
        }
        for _ in 0..index {
            let (_, next) = self.string_at(at, id)?;
            at = next;
        }
        Ok(self.string_at(at, id)?.0)
    }

    pub fn param(&self, id: NodeId, expected: NodeType, index: usize) -> CompileResult<u16> {
        let slot = self.param_slot(id, expected, index)?;
        self.u16_at(slot, id)
    }

    pub fn value_type(&self, id: NodeId) -> CompileResult<ValueType> {
        let base = self.check_header(id)?;
        let raw = self.bytes[base + OFFSET_VALUE_TYPE];
        ValueType::from_u8(raw & !FOLDED_FLAG)
            .ok_or_else(|| CompileError::internal(id, format!("unknown value type {}", raw)))
    }

    pub fn scratch(&self, id: NodeId) -> CompileResult<u16> {
        let base = self.check_header(id)?;
        self.u16_at(base + OFFSET_SCRATCH, id)
    }

    /// The folded constant of a node, if its subtree was folded.
    pub fn folded_value(&self, id: NodeId) -> CompileResult<Option<i16>> {
        let base = self.check_header(id)?;
        if self.bytes[base + OFFSET_VALUE_TYPE] & FOLDED_FLAG == 0 {
            return Ok(None);
        }
        Ok(Some(self.u16_at(base + OFFSET_SCRATCH, id)? as i16))
    }

    /// Every node offset, in allocation order.
    pub fn node_ids(&self) -> CompileResult<Vec<NodeId>> {
        let mut ids = Vec::new();
        let mut at = ROOT_POINTER_SIZE;
        while at < self.bytes.len() {
            let id = NodeId(at as u16);
            ids.push(id);
            at += self.node_len(id)?;
        }
        Ok(ids)
    }

    /// Every node, decoded, in allocation order.
    pub fn nodes(&self) -> CompileResult<Vec<AstNode>> {
        self.node_ids()?.into_iter().map(|id| self.read(id)).collect()
    }

    // ========================================================================
    // Field updates
    // ========================================================================

    /// Overwrite the value type; the folded flag is preserved.
    pub fn set_value_type(&mut self, id: NodeId, value_type: ValueType) -> CompileResult<()> {
        let base = self.check_header(id)?;
        let flag = self.bytes[base + OFFSET_VALUE_TYPE] & FOLDED_FLAG;
        self.bytes[base + OFFSET_VALUE_TYPE] = value_type as u8 | flag;
        Ok(())
    }

    pub fn set_scratch(&mut self, id: NodeId, value: u16) -> CompileResult<()> {
        let base = self.check_header(id)?;
        self.set_u16_at(base + OFFSET_SCRATCH, value, id)
    }

    /// Mark the node's subtree as folded to `value`.
    pub fn set_folded(&mut self, id: NodeId, value: i16) -> CompileResult<()> {
        let base = self.check_header(id)?;
        self.bytes[base + OFFSET_VALUE_TYPE] |= FOLDED_FLAG;
        self.set_u16_at(base + OFFSET_SCRATCH, value as u16, id)
    }

    pub fn set_param(
        &mut self,
        id: NodeId,
        expected: NodeType,
        index: usize,
        value: u16,
    ) -> CompileResult<()> {
        let slot = self.param_slot(id, expected, index)?;
        self.set_u16_at(slot, value, id)
    }

    // ========================================================================
    // Structure
    // ========================================================================

    fn allocate(&mut self, node: &NewNode, parent: NodeId) -> CompileResult<NodeId> {
        let node_type = node.node_type;
        if node.children.len() > node_type.child_count()
            || node.params.len() > node_type.param_count()
            || node.tokens.len() != node_type.token_count()
        {
            return Err(CompileError::internal(
                parent,
                format!(
                    "{} takes {} children, {} params and {} tokens",
                    node_type,
                    node_type.child_count(),
                    node_type.param_count(),
                    node_type.token_count()
                ),
            ));
        }
        if node.tokens.iter().any(|t| t.as_bytes().contains(&0)) {
            return Err(CompileError::internal(parent, "token contains a NUL byte"));
        }

        let size = NODE_HEADER_SIZE
            + (node_type.child_count() + node_type.param_count()) * 2
            + node.tokens.iter().map(|t| t.len() + 1).sum::<usize>();
        let offset = self.bytes.len();
        if offset + size > MAX_STORE_SIZE {
            return Err(CompileError::internal(
                parent,
                format!("AST store is full ({} byte limit)", MAX_STORE_SIZE),
            ));
        }

        self.bytes.push(node_type.to_u8());
        self.bytes.push(node.value_type as u8);
        self.bytes.extend_from_slice(&0u16.to_le_bytes());
        self.bytes.extend_from_slice(&parent.0.to_le_bytes());
        for index in 0..node_type.child_count() {
            let child = node.children.get(index).copied().unwrap_or(NodeId::NONE);
            self.bytes.extend_from_slice(&child.0.to_le_bytes());
        }
        for index in 0..node_type.param_count() {
            let value = node.params.get(index).copied().unwrap_or(0);
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        for token in &node.tokens {
            self.bytes.extend_from_slice(token.as_bytes());
            self.bytes.push(0);
        }

        Ok(NodeId(offset as u16))
    }

    /// Append `node` and hook it into `parent.children[child_index]`.
    ///
    /// With a none `parent` the node becomes the root.
    pub fn append_child(
        &mut self,
        node: NewNode,
        parent: NodeId,
        child_index: usize,
    ) -> CompileResult<NodeId> {
        if parent.is_none() {
            let id = self.allocate(&node, NodeId::NONE)?;
            self.bytes[..ROOT_POINTER_SIZE].copy_from_slice(&id.0.to_le_bytes());
            return Ok(id);
        }

        let slot = self.child_slot(parent, child_index)?;
        let id = self.allocate(&node, parent)?;
        self.set_u16_at(slot, id.0, parent)?;
        Ok(id)
    }

    /// Append `node` between `parent` and one of its current children.
    ///
    /// The child is whichever of `parent`'s slots points at a node listed in
    /// `node.children`. That slot is rewritten to the new node and the
    /// child's parent pointer is rewritten to the new node; nothing else moves.
    pub fn splice_insert(&mut self, node: NewNode, parent: NodeId) -> CompileResult<NodeId> {
        let (slot, matched) = if parent.is_none() {
            let root = self.root();
            if root.is_none() || !node.children.contains(&root) {
                return Err(CompileError::internal(root, "splice target is not the root"));
            }
            (0, root)
        } else {
            let parent_type = self.node_type(parent)?;
            let mut found = None;
            for index in 0..parent_type.child_count() {
                let child = self.child(parent, index)?;
                if !child.is_none() && node.children.contains(&child) {
                    found = Some((self.child_slot(parent, index)?, child));
                    break;
                }
            }
            found.ok_or_else(|| {
                CompileError::internal(parent, "no child slot matches the spliced node")
            })?
        };

        let id = self.allocate(&node, parent)?;
        self.set_u16_at(slot, id.0, parent)?;
        let matched_base = self.check_header(matched)?;
        self.set_u16_at(matched_base + OFFSET_PARENT, id.0, matched)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store() {
        let store = AstStore::new();
        assert!(store.is_empty());
        assert!(store.root().is_none());
        assert_eq!(store.as_bytes(), &[0, 0]);
    }

    #[test]
    fn test_schema_counts() {
        assert_eq!(NodeType::Expression.child_count(), 3);
        assert_eq!(NodeType::Declaration.param_count(), 2);
        assert_eq!(NodeType::Declaration.token_count(), 2);
        assert_eq!(NodeType::Statement.token_count(), 0);
        assert_eq!(NodeType::Constant.child_count(), 0);
    }

    #[test]
    fn test_node_type_roundtrip() {
        for byte in 1..=15u8 {
            let node_type = NodeType::from_u8(byte).unwrap();
            assert_eq!(node_type.to_u8(), byte);
        }
        assert_eq!(NodeType::from_u8(0), None);
        assert_eq!(NodeType::from_u8(16), None);
    }

    #[test]
    fn test_file_layout() {
        let mut store = AstStore::new();
        let stmt = store
            .append_child(NewNode::new(NodeType::Statement), NodeId::NONE, 0)
            .unwrap();
        let decl = store
            .append_child(
                NewNode::new(NodeType::Declaration).with_token("byte").with_token("b"),
                stmt,
                1,
            )
            .unwrap();

        assert_eq!(stmt.offset(), 2);
        // statement: header (6) + two children (4)
        assert_eq!(decl.offset(), 12);
        assert_eq!(
            store.as_bytes(),
            &[
                2, 0, // root
                1, 0, 0, 0, 0, 0, 0, 0, 12, 0, // statement
                2, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, b'b', b'y', b't', b'e', 0, b'b', 0,
            ]
        );
    }

    #[test]
    fn test_param_type_mismatch_is_internal() {
        let mut store = AstStore::new();
        let stmt = store
            .append_child(NewNode::new(NodeType::Statement), NodeId::NONE, 0)
            .unwrap();
        let err = store
            .param(stmt, NodeType::Class, params::CLASS_BYTES)
            .unwrap_err();
        assert!(matches!(err, CompileError::Internal { .. }));
    }

    #[test]
    fn test_folded_flag_survives_type_update() {
        let mut store = AstStore::new();
        let constant = store
            .append_child(NewNode::new(NodeType::Constant).with_token("7"), NodeId::NONE, 0)
            .unwrap();
        store.set_folded(constant, -7).unwrap();
        store.set_value_type(constant, ValueType::Short).unwrap();

        let node = store.read(constant).unwrap();
        assert_eq!(node.value_type, ValueType::Short);
        assert_eq!(node.folded_value(), Some(-7));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(AstStore::from_bytes(vec![2]).is_err());
        assert!(AstStore::from_bytes(vec![2, 0, 99, 0, 0, 0, 0, 0]).is_err());
        // root pointing into the middle of a node
        let mut store = AstStore::new();
        store
            .append_child(NewNode::new(NodeType::Statement), NodeId::NONE, 0)
            .unwrap();
        let mut bytes = store.into_bytes();
        bytes[0] = 4;
        assert!(AstStore::from_bytes(bytes).is_err());
    }
}
