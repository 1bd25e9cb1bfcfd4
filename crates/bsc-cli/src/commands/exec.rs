//! `bsc exec`: run bytecode and print the final stack.

use crate::output::format_stack;
use crate::paths::{read_bytes, Artifacts};
use anyhow::Context;
use bsc_engine::pipeline::{execute as run_bytecode, RunOutcome};
use bsc_engine::VmOptions;
use std::path::Path;

/// Run the program's `.bin` file.
pub fn run(input: &Path, options: &VmOptions) -> anyhow::Result<RunOutcome> {
    let artifacts = Artifacts::new(input);
    let bytecode = read_bytes(&artifacts.bytecode)?;
    run_bytecode(&bytecode, options)
        .with_context(|| format!("{} trapped", artifacts.bytecode.display()))
}

pub fn execute(input: &Path, options: &VmOptions) -> anyhow::Result<()> {
    let outcome = run(input, options)?;
    log::debug!("halted after {} steps", outcome.steps);
    println!("{}", format_stack(&outcome.signed_stack()));
    Ok(())
}
