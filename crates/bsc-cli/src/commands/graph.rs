//! `bsc graph`: Graphviz rendering of the AST.

use super::LoadedAst;
use crate::paths::{write_bytes, Artifacts};
use bsc_engine::compiler::to_dot;
use std::path::Path;

pub fn execute(input: &Path) -> anyhow::Result<()> {
    let artifacts = Artifacts::new(input);
    let ast = LoadedAst::load(&artifacts)?;

    let dot = to_dot(&ast.store).map_err(|error| ast.failure(&artifacts, &error))?;
    write_bytes(&artifacts.graph, dot.as_bytes())
}
