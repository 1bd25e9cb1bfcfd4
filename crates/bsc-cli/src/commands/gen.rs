//! `bsc gen`: checked AST to bytecode.

use super::LoadedAst;
use crate::paths::{write_bytes, Artifacts};
use bsc_engine::{generate, CodegenOptions};
use std::path::Path;

pub fn execute(input: &Path, options: &CodegenOptions) -> anyhow::Result<()> {
    let artifacts = Artifacts::new(input);
    let ast = LoadedAst::load(&artifacts)?;

    let bytecode = generate(&ast.store, options).map_err(|error| ast.failure(&artifacts, &error))?;
    write_bytes(&artifacts.bytecode, &bytecode)
}
