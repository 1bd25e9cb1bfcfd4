//! Front end: lexer, token table and parser
//!
//! The lexer turns source text into [`Token`]s, the [`TokenTable`] is their
//! on-disk form, and the [`Parser`] builds the AST store from them.

pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod table;
pub mod token;

pub use lexer::{LexError, Lexer, MAX_SOURCE_LEN, MAX_TOKEN_LEN};
pub use parser::{Parser, MAX_PARSE_DEPTH};
pub use table::{TokenEntry, TokenTable, TokenTableError};
pub use token::{Span, Token, TokenKind};
