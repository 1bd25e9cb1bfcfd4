//! `bsc resolve`: class sizes and declaration sizes, in place.

use super::LoadedAst;
use crate::paths::{write_bytes, Artifacts};
use bsc_engine::compiler::{resolve_layout, LayoutOptions};
use std::path::Path;

pub fn execute(input: &Path, options: &LayoutOptions) -> anyhow::Result<()> {
    let artifacts = Artifacts::new(input);
    let mut ast = LoadedAst::load(&artifacts)?;

    let summary = resolve_layout(&mut ast.store, options)
        .map_err(|error| ast.failure(&artifacts, &error))?;
    log::debug!(
        "resolved {} classes and {} declarations ({} retries)",
        summary.classes,
        summary.declarations,
        summary.retries
    );

    write_bytes(&artifacts.ast, ast.store.as_bytes())
}
