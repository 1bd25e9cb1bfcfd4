//! Sibling files of a program.
//!
//! Every stage is handed the program path and finds its inputs next to it:
//! `prog.src`, `prog.tok`, `prog.ast`, `prog.bin` and `prog.dot`. Any of
//! those names (or the bare stem) identifies the same program.

use anyhow::Context;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub source: PathBuf,
    pub tokens: PathBuf,
    pub ast: PathBuf,
    pub bytecode: PathBuf,
    pub graph: PathBuf,
}

impl Artifacts {
    pub fn new(input: &Path) -> Self {
        Self {
            source: input.with_extension("src"),
            tokens: input.with_extension("tok"),
            ast: input.with_extension("ast"),
            bytecode: input.with_extension("bin"),
            graph: input.with_extension("dot"),
        }
    }

    pub fn read_source(&self) -> anyhow::Result<String> {
        std::fs::read_to_string(&self.source)
            .with_context(|| format!("cannot read source {}", self.source.display()))
    }
}

pub fn read_bytes(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))
}

pub fn write_bytes(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("cannot write {}", path.display()))?;
    log::info!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_sibling_names_the_program() {
        let from_source = Artifacts::new(Path::new("dir/prog.src"));
        let from_ast = Artifacts::new(Path::new("dir/prog.ast"));
        let from_stem = Artifacts::new(Path::new("dir/prog"));
        assert_eq!(from_source, from_ast);
        assert_eq!(from_source, from_stem);
        assert_eq!(from_source.bytecode, PathBuf::from("dir/prog.bin"));
    }
}
