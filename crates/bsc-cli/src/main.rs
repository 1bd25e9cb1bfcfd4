//! bsc command-line tool
//!
//! Runs the compiler one stage per invocation over files next to the
//! program (`prog.src`, `prog.tok`, `prog.ast`, `prog.bin`), or all stages
//! at once with `bsc run`.

use bsc_cli::commands::{check, disasm, exec, gen, graph, parse, resolve, run, tokenize};
use bsc_cli::output::{self, DiagnosticFormat};
use bsc_engine::vm::{DEFAULT_MAX_STEPS, DEFAULT_STACK_SIZE};
use bsc_engine::{CodegenOptions, LayoutOptions, PipelineOptions, VmOptions};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bsc")]
#[command(about = "Compiler and VM for the byte/short class language", long_about = None)]
#[command(version)]
struct Cli {
    /// More logging: -v for debug, -vv for trace (RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Colorize diagnostics: auto, always, never
    #[arg(long, global = true, value_name = "WHEN")]
    color: Option<String>,

    /// How compile errors are printed
    #[arg(long, global = true, value_enum, default_value_t = DiagnosticFormat::Text)]
    format: DiagnosticFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct LayoutArgs {
    /// Attempts per declaration before a class counts as unresolvable
    /// [default: one more than the number of classes, at least 3]
    #[arg(long)]
    max_attempts: Option<u8>,
}

#[derive(Args, Clone, Copy)]
struct VmArgs {
    /// Evaluation stack size in bytes
    #[arg(long, default_value_t = DEFAULT_STACK_SIZE)]
    stack_size: usize,

    /// Instructions to execute before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,
}

impl From<LayoutArgs> for LayoutOptions {
    fn from(args: LayoutArgs) -> Self {
        LayoutOptions {
            max_attempts: args.max_attempts,
        }
    }
}

impl From<VmArgs> for VmOptions {
    fn from(args: VmArgs) -> Self {
        VmOptions {
            stack_size: args.stack_size,
            max_steps: args.max_steps,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize prog.src into prog.tok
    Tokenize {
        /// Program file
        input: PathBuf,
    },

    /// Parse prog.src and prog.tok into prog.ast
    Parse {
        /// Program file
        input: PathBuf,
    },

    /// Resolve class and declaration sizes in prog.ast
    Resolve {
        /// Program file
        input: PathBuf,
        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Fold constants, check types and insert casts in prog.ast
    Check {
        /// Program file
        input: PathBuf,
    },

    /// Generate prog.bin from prog.ast
    Gen {
        /// Program file
        input: PathBuf,
    },

    /// Execute prog.bin and print the final stack
    Exec {
        /// Program file
        input: PathBuf,
        #[command(flatten)]
        vm: VmArgs,
    },

    /// Run every stage on prog.src and check its $TEST statements
    Run {
        /// Program file
        input: PathBuf,
        #[command(flatten)]
        layout: LayoutArgs,
        #[command(flatten)]
        vm: VmArgs,
    },

    /// Print a listing of prog.bin
    Disasm {
        /// Program file
        input: PathBuf,
    },

    /// Write prog.ast as a Graphviz graph to prog.dot
    Graph {
        /// Program file
        input: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Tokenize { input } => tokenize::execute(&input),
        Commands::Parse { input } => parse::execute(&input),
        Commands::Resolve { input, layout } => resolve::execute(&input, &layout.into()),
        Commands::Check { input } => check::execute(&input),
        Commands::Gen { input } => gen::execute(&input, &CodegenOptions::default()),
        Commands::Exec { input, vm } => exec::execute(&input, &vm.into()),
        Commands::Run { input, layout, vm } => {
            let options = PipelineOptions {
                layout: layout.into(),
                codegen: CodegenOptions::default(),
                vm: vm.into(),
            };
            run::execute(&input, &options)
        }
        Commands::Disasm { input } => disasm::execute(&input),
        Commands::Graph { input } => graph::execute(&input),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let choice = output::resolve_color_choice(cli.color.as_deref());

    if let Err(error) = dispatch(cli.command) {
        output::report_error(&error, choice, cli.format);
        std::process::exit(1);
    }
}
