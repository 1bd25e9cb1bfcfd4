//! `bsc run`: every stage in turn, then the `$TEST` checks.

use super::{check, exec, gen, parse, resolve, tokenize, LoadedAst};
use crate::output::format_stack;
use crate::paths::Artifacts;
use bsc_engine::pipeline::{check_expectations, collect_expectations, RunOutcome};
use bsc_engine::PipelineOptions;
use std::path::Path;

/// Run all stages over the program, leaving every intermediate file behind.
pub fn run(input: &Path, options: &PipelineOptions) -> anyhow::Result<RunOutcome> {
    let artifacts = Artifacts::new(input);

    tokenize::execute(input)?;
    parse::execute(input)?;
    resolve::execute(input, &options.layout)?;
    check::execute(input)?;
    gen::execute(input, &options.codegen)?;
    let mut outcome = exec::run(input, &options.vm)?;

    let ast = LoadedAst::load(&artifacts)?;
    let expectations =
        collect_expectations(&ast.store).map_err(|error| ast.failure(&artifacts, &error))?;
    check_expectations(&expectations, &mut outcome)?;
    Ok(outcome)
}

pub fn execute(input: &Path, options: &PipelineOptions) -> anyhow::Result<()> {
    let outcome = run(input, options)?;
    log::debug!("halted after {} steps", outcome.steps);
    println!("{}", format_stack(&outcome.signed_stack()));
    if outcome.tests_passed > 0 {
        log::info!("{} $TEST statements passed", outcome.tests_passed);
    }
    Ok(())
}
