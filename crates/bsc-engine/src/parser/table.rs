//! Token table encoding.
//!
//! The token table is the on-disk hand-off between tokenizing and parsing:
//!
//! ```text
//! [count: u16 LE] ([start: u16 LE][length: u8]) * count
//! ```
//!
//! Token kinds are not stored; they are recovered from the source slices.

use crate::parser::lexer::{classify, LineTracker};
use crate::parser::token::{Token, TokenKind};
use thiserror::Error;

const ENTRY_SIZE: usize = 3;

/// Errors raised while building or decoding a token table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenTableError {
    #[error("token table is truncated at byte {0}")]
    Truncated(usize),

    #[error("token table has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("token {index} covers {start}..{end}, outside the {len}-byte source")]
    OutOfBounds {
        index: usize,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("token {index} ('{text}') is not a single valid token")]
    InvalidToken { index: usize, text: String },

    #[error("token {index} does not fit the table format")]
    Unencodable { index: usize },

    #[error("too many tokens: {0}")]
    TooManyTokens(usize),
}

/// One table entry: a slice of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEntry {
    pub start: u16,
    pub len: u8,
}

/// Ordered token table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTable {
    entries: Vec<TokenEntry>,
}

impl TokenTable {
    /// Build a table from lexed tokens. End-of-file tokens are skipped.
    pub fn from_tokens(tokens: &[Token]) -> Result<Self, TokenTableError> {
        let mut entries = Vec::with_capacity(tokens.len());
        for (index, token) in tokens.iter().enumerate() {
            if token.kind == TokenKind::Eof {
                continue;
            }
            let start =
                u16::try_from(token.span.start).map_err(|_| TokenTableError::Unencodable { index })?;
            let len =
                u8::try_from(token.span.len()).map_err(|_| TokenTableError::Unencodable { index })?;
            entries.push(TokenEntry { start, len });
        }
        if entries.len() > u16::MAX as usize {
            return Err(TokenTableError::TooManyTokens(entries.len()));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TokenEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to the table layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + self.entries.len() * ENTRY_SIZE);
        bytes.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for entry in &self.entries {
            bytes.extend_from_slice(&entry.start.to_le_bytes());
            bytes.push(entry.len);
        }
        bytes
    }

    /// Parse the table layout.
    pub fn decode(bytes: &[u8]) -> Result<Self, TokenTableError> {
        let header: [u8; 2] = bytes
            .get(0..2)
            .and_then(|b| b.try_into().ok())
            .ok_or(TokenTableError::Truncated(0))?;
        let count = u16::from_le_bytes(header) as usize;

        let mut entries = Vec::with_capacity(count);
        let mut at = 2;
        for _ in 0..count {
            let raw = bytes
                .get(at..at + ENTRY_SIZE)
                .ok_or(TokenTableError::Truncated(at))?;
            entries.push(TokenEntry {
                start: u16::from_le_bytes([raw[0], raw[1]]),
                len: raw[2],
            });
            at += ENTRY_SIZE;
        }
        if at != bytes.len() {
            return Err(TokenTableError::TrailingBytes(bytes.len() - at));
        }
        Ok(Self { entries })
    }

    /// Recover full tokens (kind and line/column) against the source.
    pub fn to_tokens(&self, source: &str) -> Result<Vec<Token>, TokenTableError> {
        let mut lines = LineTracker::new();
        let mut tokens = Vec::with_capacity(self.entries.len());
        let mut previous_end = 0;

        for (index, entry) in self.entries.iter().enumerate() {
            let start = entry.start as usize;
            let end = start + entry.len as usize;
            let text = source
                .get(start..end)
                .filter(|_| start >= previous_end)
                .ok_or(TokenTableError::OutOfBounds {
                    index,
                    start,
                    end,
                    len: source.len(),
                })?;
            let kind = classify(text).ok_or_else(|| TokenTableError::InvalidToken {
                index,
                text: text.to_string(),
            })?;
            tokens.push(Token::new(kind, lines.span_at(source, start, end)));
            previous_end = end;
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Lexer;

    #[test]
    fn test_table_layout() {
        let source = "byte x;";
        let tokens = Lexer::new(source).tokenize().unwrap();
        let table = TokenTable::from_tokens(&tokens).unwrap();
        assert_eq!(
            table.encode(),
            vec![3, 0, 0, 0, 4, 5, 0, 1, 6, 0, 1]
        );
    }

    #[test]
    fn test_decode_recovers_kinds_and_lines() {
        let source = "class A {\n  short s;\n}";
        let tokens = Lexer::new(source).tokenize().unwrap();
        let bytes = TokenTable::from_tokens(&tokens).unwrap().encode();
        let decoded = TokenTable::decode(&bytes).unwrap().to_tokens(source).unwrap();
        assert_eq!(decoded, tokens);
    }

    #[test]
    fn test_truncated_table() {
        assert_eq!(
            TokenTable::decode(&[2, 0, 0, 0, 1]),
            Err(TokenTableError::Truncated(5))
        );
        assert_eq!(TokenTable::decode(&[]), Err(TokenTableError::Truncated(0)));
    }

    #[test]
    fn test_out_of_bounds_slice() {
        let table = TokenTable::decode(&[1, 0, 10, 0, 3]).unwrap();
        assert!(matches!(
            table.to_tokens("byte"),
            Err(TokenTableError::OutOfBounds { index: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_slice() {
        // "e x" is not a single token
        let table = TokenTable::decode(&[1, 0, 3, 0, 3]).unwrap();
        assert!(matches!(
            table.to_tokens("byte x;"),
            Err(TokenTableError::InvalidToken { .. })
        ));
    }
}
