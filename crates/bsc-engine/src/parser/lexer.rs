//! Lexer for bsc source text.
//!
//! Built on logos. Produces a flat list of tokens with spans; the token table
//! (see [`crate::parser::table`]) is a compact encoding of the same list.

use crate::parser::token::{Span, Token, TokenKind};
use logos::Logos;
use thiserror::Error;

/// Longest identifier or number accepted, in bytes.
pub const MAX_TOKEN_LEN: usize = 32;

/// Largest source the token table can address (start offsets are 16-bit).
pub const MAX_SOURCE_LEN: usize = u16::MAX as usize;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum LogosToken {
    #[regex(r"[ \t\r\n]+", logos::skip)]
    Whitespace,

    #[token("class")]
    Class,

    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    #[regex("[0-9]+")]
    Number,

    #[regex("[0-9]+[A-Za-z_][A-Za-z0-9_]*")]
    MalformedNumber,

    #[token(";")]
    Semicolon,
    #[token("=")]
    Assign,
    #[token(".")]
    Dot,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("$")]
    Dollar,

    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("==")]
    EqualEqual,
}

impl LogosToken {
    fn kind(self) -> Option<TokenKind> {
        let kind = match self {
            Self::Whitespace | Self::MalformedNumber => return None,
            Self::Class => TokenKind::Class,
            Self::Identifier => TokenKind::Identifier,
            Self::Number => TokenKind::Number,
            Self::Semicolon => TokenKind::Semicolon,
            Self::Assign => TokenKind::Assign,
            Self::Dot => TokenKind::Dot,
            Self::LeftParen => TokenKind::LeftParen,
            Self::RightParen => TokenKind::RightParen,
            Self::Less => TokenKind::Less,
            Self::Greater => TokenKind::Greater,
            Self::LeftBrace => TokenKind::LeftBrace,
            Self::RightBrace => TokenKind::RightBrace,
            Self::Plus => TokenKind::Plus,
            Self::Minus => TokenKind::Minus,
            Self::Star => TokenKind::Star,
            Self::Slash => TokenKind::Slash,
            Self::Dollar => TokenKind::Dollar,
            Self::PlusAssign => TokenKind::PlusAssign,
            Self::MinusAssign => TokenKind::MinusAssign,
            Self::StarAssign => TokenKind::StarAssign,
            Self::SlashAssign => TokenKind::SlashAssign,
            Self::EqualEqual => TokenKind::EqualEqual,
        };
        Some(kind)
    }
}

/// Lexical errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at {span}")]
    UnexpectedCharacter { ch: char, span: Span },

    #[error("malformed number '{text}' at {span}")]
    MalformedNumber { text: String, span: Span },

    #[error("token at {span} is longer than {MAX_TOKEN_LEN} bytes")]
    TokenTooLong { span: Span },

    #[error("source is {len} bytes; at most {MAX_SOURCE_LEN} bytes can be tokenized")]
    SourceTooLarge { len: usize },
}

impl LexError {
    /// Location of the error, if it points at source text.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedCharacter { span, .. }
            | Self::MalformedNumber { span, .. }
            | Self::TokenTooLong { span } => Some(*span),
            Self::SourceTooLarge { .. } => None,
        }
    }
}

/// Tracks line and column while walking forward through the source.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LineTracker {
    offset: usize,
    line: u32,
    column: u32,
}

impl LineTracker {
    pub(crate) fn new() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Advance to `target` (which must not be behind the current offset)
    /// and return the span for `target..end`.
    pub(crate) fn span_at(&mut self, source: &str, target: usize, end: usize) -> Span {
        if target > self.offset {
            for c in source.get(self.offset..target).unwrap_or("").chars() {
                if c == '\n' {
                    self.line += 1;
                    self.column = 1;
                } else {
                    self.column += 1;
                }
            }
            self.offset = target;
        }
        Span::new(target, end, self.line, self.column)
    }
}

/// Classify a single token's text, as stored in a token table.
pub(crate) fn classify(text: &str) -> Option<TokenKind> {
    let mut lexer = LogosToken::lexer(text);
    let kind = match lexer.next()? {
        Ok(token) => token.kind()?,
        Err(()) => return None,
    };
    if lexer.span() != (0..text.len()) || lexer.next().is_some() {
        return None;
    }
    Some(kind)
}

/// Lexer over a complete source text.
pub struct Lexer<'a> {
    source: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Tokenize the whole source.
    ///
    /// The returned list does not include an end-of-file token; the parser
    /// appends one. All errors are collected rather than stopping at the first.
    pub fn tokenize(self) -> Result<Vec<Token>, Vec<LexError>> {
        if self.source.len() > MAX_SOURCE_LEN {
            return Err(vec![LexError::SourceTooLarge {
                len: self.source.len(),
            }]);
        }

        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        let mut lines = LineTracker::new();
        let mut logos_lexer = LogosToken::lexer(self.source);

        while let Some(result) = logos_lexer.next() {
            let range = logos_lexer.span();
            let span = lines.span_at(self.source, range.start, range.end);

            match result {
                Ok(LogosToken::MalformedNumber) => errors.push(LexError::MalformedNumber {
                    text: logos_lexer.slice().to_string(),
                    span,
                }),
                Ok(token) => {
                    let Some(kind) = token.kind() else { continue };
                    if matches!(kind, TokenKind::Identifier | TokenKind::Number)
                        && span.len() > MAX_TOKEN_LEN
                    {
                        errors.push(LexError::TokenTooLong { span });
                        continue;
                    }
                    tokens.push(Token::new(kind, span));
                }
                Err(()) => {
                    let ch = self.source[range.start..].chars().next().unwrap_or('\0');
                    errors.push(LexError::UnexpectedCharacter { ch, span });
                }
            }
        }

        log::debug!("lexed {} tokens ({} errors)", tokens.len(), errors.len());

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }
}
