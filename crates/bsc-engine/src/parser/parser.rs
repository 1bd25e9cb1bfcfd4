//! Recursive descent parser
//!
//! Builds the AST directly in an [`AstStore`], top-down: every node is
//! appended into its parent's slot before its own children are parsed. Binary
//! operator chains grow by splicing a fresh Expression/Term above the one
//! just completed, which makes them left-associative without ever moving a
//! node.

use crate::compiler::ast::{AstStore, NewNode, NodeId, NodeType};
use crate::compiler::error::{CompileError, CompileResult};
use crate::parser::token::{Span, Token, TokenKind};

/// Deepest nesting of classes, parentheses, casts and unary minus.
pub const MAX_PARSE_DEPTH: usize = 256;

const RESERVED: [&str; 3] = ["byte", "short", "class"];

/// Parser state.
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    store: AstStore,
}

impl<'a> Parser<'a> {
    /// Create a parser over already lexed tokens.
    pub fn new(source: &'a str, mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let eof_span = match tokens.last() {
                Some(last) => Span::new(last.span.end, last.span.end, last.span.line, last.span.column),
                None => Span::new(0, 0, 1, 1),
            };
            tokens.push(Token::new(TokenKind::Eof, eof_span));
        }
        Self {
            source,
            tokens,
            pos: 0,
            depth: 0,
            store: AstStore::new(),
        }
    }

    /// Parse the whole program.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::Syntax` at the first token that does not fit
    /// the grammar.
    pub fn parse(mut self) -> CompileResult<AstStore> {
        self.parse_statements(NodeId::NONE, 0, TokenKind::Eof)?;
        log::debug!(
            "parsed {} tokens into a {} byte AST",
            self.tokens.len(),
            self.store.len()
        );
        Ok(self.store)
    }

    // ========================================================================
    // Token Management
    // ========================================================================

    #[inline]
    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    #[inline]
    fn peek_kind(&self) -> TokenKind {
        self.tokens
            .get(self.pos + 1)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    #[inline]
    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn text(&self, token: &Token) -> &'a str {
        token.text(self.source)
    }

    fn unexpected(&self, expected: &[TokenKind]) -> CompileError {
        let found = self.current();
        let found_text = if found.kind == TokenKind::Eof {
            found.kind.describe().to_string()
        } else {
            format!("'{}'", self.text(found))
        };
        let expected = expected
            .iter()
            .map(|k| k.describe())
            .collect::<Vec<_>>()
            .join(" or ");
        CompileError::syntax(found.span, format!("expected {}, found {}", expected, found_text))
    }

    fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&[kind]))
        }
    }

    fn expect_name(&mut self) -> CompileResult<Token> {
        let token = self.expect(TokenKind::Identifier)?;
        let name = self.text(&token);
        if RESERVED.contains(&name) {
            return Err(CompileError::syntax(
                token.span,
                format!("'{}' is reserved and cannot be used as a name", name),
            ));
        }
        Ok(token)
    }

    fn enter(&mut self) -> CompileResult<()> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            return Err(CompileError::syntax(
                self.current().span,
                format!("nesting deeper than {} levels", MAX_PARSE_DEPTH),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Append a node and record its span.
    fn node(&mut self, node: NewNode, parent: NodeId, slot: usize, span: Span) -> CompileResult<NodeId> {
        let id = self.store.append_child(node, parent, slot)?;
        self.store.set_span(id, span);
        Ok(id)
    }

    /// Widen a node's span to end at the last consumed token.
    fn finish(&mut self, id: NodeId) {
        let Some(start) = self.store.span(id) else {
            return;
        };
        let last = self.tokens[self.pos.saturating_sub(1)].span;
        self.store.set_span(id, start.merge(&last));
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Parse statements up to `terminator`. The first one goes into
    /// `owner`'s `slot` (the root pointer when `owner` is none), each later
    /// one into the previous statement's `next` slot.
    fn parse_statements(&mut self, owner: NodeId, slot: usize, terminator: TokenKind) -> CompileResult<()> {
        let mut previous: Option<NodeId> = None;
        while !self.check(terminator) {
            if self.check(TokenKind::Eof) {
                return Err(self.unexpected(&[terminator]));
            }
            let span = self.current().span;
            let statement = match previous {
                None => self.node(NewNode::new(NodeType::Statement), owner, slot, span)?,
                Some(prev) => self.node(NewNode::new(NodeType::Statement), prev, 0, span)?,
            };
            self.parse_statement(statement)?;
            self.finish(statement);
            previous = Some(statement);
        }
        Ok(())
    }

    fn parse_statement(&mut self, statement: NodeId) -> CompileResult<()> {
        match self.current().kind {
            TokenKind::Class => self.parse_class(statement),
            TokenKind::Dollar => self.parse_test(statement),
            TokenKind::Identifier if self.peek_kind() == TokenKind::Identifier => {
                self.parse_declaration(statement)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(())
            }
            TokenKind::Identifier => {
                self.parse_assignment(statement)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(())
            }
            _ => Err(self.unexpected(&[TokenKind::Identifier, TokenKind::Class, TokenKind::Dollar])),
        }
    }

    fn parse_class(&mut self, statement: NodeId) -> CompileResult<()> {
        let start = self.expect(TokenKind::Class)?.span;
        let name = self.expect_name()?;
        let class = self.node(
            NewNode::new(NodeType::Class).with_token(self.text(&name)),
            statement,
            1,
            start,
        )?;
        self.expect(TokenKind::LeftBrace)?;
        self.enter()?;
        self.parse_statements(class, 0, TokenKind::RightBrace)?;
        self.leave();
        self.expect(TokenKind::RightBrace)?;
        self.finish(class);
        Ok(())
    }

    fn parse_test(&mut self, statement: NodeId) -> CompileResult<()> {
        let start = self.expect(TokenKind::Dollar)?.span;
        let keyword = self.expect(TokenKind::Identifier)?;
        if self.text(&keyword) != "TEST" {
            return Err(CompileError::syntax(
                keyword.span,
                format!("expected 'TEST' after '$', found '{}'", self.text(&keyword)),
            ));
        }

        let mut values = Vec::new();
        while !self.check(TokenKind::Semicolon) {
            let negative = if self.check(TokenKind::Minus) {
                self.advance();
                true
            } else {
                false
            };
            let number = self.expect(TokenKind::Number)?;
            let text = self.text(&number);
            values.push(if negative { format!("-{}", text) } else { text.to_string() });
        }
        if values.is_empty() {
            return Err(self.unexpected(&[TokenKind::Number]));
        }
        self.expect(TokenKind::Semicolon)?;

        let test = self.node(
            NewNode::new(NodeType::Test).with_token(values.join(" ")),
            statement,
            1,
            start,
        )?;
        self.finish(test);
        Ok(())
    }

    fn parse_declaration(&mut self, statement: NodeId) -> CompileResult<()> {
        let type_token = self.expect(TokenKind::Identifier)?;
        let type_name = self.text(&type_token);
        let name = self.expect_name()?;
        let decl = self.node(
            NewNode::new(NodeType::Declaration)
                .with_token(type_name)
                .with_token(self.text(&name)),
            statement,
            1,
            type_token.span,
        )?;
        if self.check(TokenKind::Assign) {
            self.advance();
            self.parse_expression(decl, 0)?;
        }
        self.finish(decl);
        Ok(())
    }

    fn parse_assignment(&mut self, statement: NodeId) -> CompileResult<()> {
        let name = self.expect_name()?;
        let assignment = self.node(
            NewNode::new(NodeType::Assignment).with_token(self.text(&name)),
            statement,
            1,
            name.span,
        )?;
        self.parse_members(assignment, 1)?;
        if !self.check(TokenKind::Assign) {
            return Err(self.unexpected(&[TokenKind::Assign, TokenKind::Dot]));
        }
        self.advance();
        self.parse_expression(assignment, 0)?;
        self.finish(assignment);
        Ok(())
    }

    /// `('.' IDENT)*`, chained through each Member's `next` slot.
    fn parse_members(&mut self, owner: NodeId, slot: usize) -> CompileResult<()> {
        let mut parent = owner;
        let mut slot = slot;
        while self.check(TokenKind::Dot) {
            self.advance();
            let name = self.expect_name()?;
            parent = self.node(
                NewNode::new(NodeType::Member).with_token(self.text(&name)),
                parent,
                slot,
                name.span,
            )?;
            slot = 0;
        }
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self, parent: NodeId, slot: usize) -> CompileResult<()> {
        self.parse_chain(
            parent,
            slot,
            NodeType::Expression,
            NodeType::ExpressionOp,
            &[TokenKind::Plus, TokenKind::Minus],
        )
    }

    fn parse_term(&mut self, parent: NodeId, slot: usize) -> CompileResult<()> {
        self.parse_chain(
            parent,
            slot,
            NodeType::Term,
            NodeType::TermOp,
            &[TokenKind::Star, TokenKind::Slash],
        )
    }

    /// `operand (op operand)*` for one precedence level. Operands go into the
    /// left slot (2) of the first node and the right slot (0) afterwards.
    fn parse_chain(
        &mut self,
        parent: NodeId,
        slot: usize,
        node_type: NodeType,
        op_type: NodeType,
        operators: &[TokenKind],
    ) -> CompileResult<()> {
        let start = self.current().span;
        let mut chain = self.node(NewNode::new(node_type), parent, slot, start)?;
        self.parse_operand(node_type, chain, 2)?;
        let mut has_operator = false;

        while operators.contains(&self.current().kind) {
            if has_operator {
                let above = self.store.parent(chain)?;
                let spliced = self
                    .store
                    .splice_insert(NewNode::new(node_type).with_child(2, chain), above)?;
                self.store.set_span(spliced, start);
                chain = spliced;
            }
            let op = self.advance();
            self.node(
                NewNode::new(op_type).with_token(self.text(&op)),
                chain,
                1,
                op.span,
            )?;
            self.parse_operand(node_type, chain, 0)?;
            self.finish(chain);
            has_operator = true;
        }
        self.finish(chain);
        Ok(())
    }

    fn parse_operand(&mut self, node_type: NodeType, chain: NodeId, slot: usize) -> CompileResult<()> {
        if node_type == NodeType::Expression {
            self.parse_term(chain, slot)
        } else {
            self.parse_factor(chain, slot)
        }
    }

    fn parse_factor(&mut self, parent: NodeId, slot: usize) -> CompileResult<()> {
        self.enter()?;
        let start = self.current().span;
        let factor = self.node(NewNode::new(NodeType::Factor), parent, slot, start)?;

        if self.check(TokenKind::Minus) {
            let op = self.advance();
            self.node(NewNode::new(NodeType::UnaryOp).with_token("-"), factor, 0, op.span)?;
        }

        match self.current().kind {
            TokenKind::Number => {
                let number = self.advance();
                self.node(
                    NewNode::new(NodeType::Constant).with_token(self.text(&number)),
                    factor,
                    1,
                    number.span,
                )?;
            }
            TokenKind::LeftParen => {
                self.advance();
                self.parse_expression(factor, 1)?;
                self.expect(TokenKind::RightParen)?;
            }
            TokenKind::Less => {
                let open = self.advance();
                let target = self.expect(TokenKind::Identifier)?;
                self.expect(TokenKind::Greater)?;
                let cast = self.node(
                    NewNode::new(NodeType::Cast).with_token(self.text(&target)),
                    factor,
                    1,
                    open.span,
                )?;
                self.parse_factor(cast, 0)?;
                self.finish(cast);
            }
            TokenKind::Identifier => {
                let name = self.expect_name()?;
                let variable = self.node(
                    NewNode::new(NodeType::Variable).with_token(self.text(&name)),
                    factor,
                    1,
                    name.span,
                )?;
                self.parse_members(variable, 0)?;
                self.finish(variable);
            }
            _ => {
                return Err(self.unexpected(&[
                    TokenKind::Number,
                    TokenKind::Identifier,
                    TokenKind::LeftParen,
                    TokenKind::Less,
                ]))
            }
        }

        self.finish(factor);
        self.leave();
        Ok(())
    }
}
