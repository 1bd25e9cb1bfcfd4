//! `bsc tokenize`: source text to token table.

use super::StageFailure;
use crate::paths::{write_bytes, Artifacts};
use bsc_engine::{Lexer, TokenTable};
use std::path::Path;

pub fn execute(input: &Path) -> anyhow::Result<()> {
    let artifacts = Artifacts::new(input);
    let source = artifacts.read_source()?;

    let tokens = Lexer::new(&source)
        .tokenize()
        .map_err(|errors| StageFailure::lex(&artifacts, &errors, &source))?;
    let table = TokenTable::from_tokens(&tokens)?;
    log::debug!("{} tokens", table.len());

    write_bytes(&artifacts.tokens, &table.encode())
}
