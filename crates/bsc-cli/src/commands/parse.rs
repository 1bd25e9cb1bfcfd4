//! `bsc parse`: token table and source to AST store.

use super::StageFailure;
use crate::paths::{read_bytes, write_bytes, Artifacts};
use anyhow::Context;
use bsc_engine::{AstStore, Parser, TokenTable};
use std::path::Path;

pub fn execute(input: &Path) -> anyhow::Result<()> {
    let artifacts = Artifacts::new(input);
    let source = artifacts.read_source()?;

    let table = TokenTable::decode(&read_bytes(&artifacts.tokens)?)
        .with_context(|| format!("invalid token table {}", artifacts.tokens.display()))?;
    let tokens = table.to_tokens(&source)?;

    let store = Parser::new(&source, tokens).parse().map_err(|error| {
        StageFailure::compile(&artifacts, &error, &AstStore::new(), Some(&source))
    })?;

    write_bytes(&artifacts.ast, store.as_bytes())
}
