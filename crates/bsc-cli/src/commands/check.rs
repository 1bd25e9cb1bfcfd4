//! `bsc check`: fold, type and cast the resolved AST, in place.

use super::LoadedAst;
use crate::paths::{write_bytes, Artifacts};
use bsc_engine::check;
use std::path::Path;

pub fn execute(input: &Path) -> anyhow::Result<()> {
    let artifacts = Artifacts::new(input);
    let mut ast = LoadedAst::load(&artifacts)?;

    let summary = check(&mut ast.store).map_err(|error| ast.failure(&artifacts, &error))?;
    log::debug!(
        "folded {} nodes, typed {}, inserted {} casts",
        summary.folded,
        summary.typed,
        summary.casts
    );

    write_bytes(&artifacts.ast, ast.store.as_bytes())
}
