//! `bsc disasm`: bytecode listing on stdout.

use crate::paths::{read_bytes, Artifacts};
use bsc_engine::disassemble;
use std::path::Path;

pub fn execute(input: &Path) -> anyhow::Result<()> {
    let artifacts = Artifacts::new(input);
    let listing = disassemble(&read_bytes(&artifacts.bytecode)?)?;
    print!("{}", listing);
    Ok(())
}
