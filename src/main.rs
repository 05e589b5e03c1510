//! ccx64 CLI
//!
//! Command-line front end for the compiler library: preprocesses a `.c`
//! file, runs it through the pipeline to the requested stop stage (spec.md
//! §6), and for a full compilation assembles and links a native executable.

use ccx64::{CompilerConfig, StopStage};
use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "ccx64")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compiler for a subset of C, targeting x86-64 System V assembly", long_about = None)]
struct Cli {
    /// Input .c source file
    input: PathBuf,

    /// Stop after tokenizing
    #[arg(long)]
    lex: bool,

    /// Stop after parsing
    #[arg(long)]
    parse: bool,

    /// Stop after semantic analysis
    #[arg(long)]
    validate: bool,

    /// Stop after three-address IR generation
    #[arg(long)]
    tacky: bool,

    /// Stop after target IR generation (through legalization)
    #[arg(long)]
    codegen: bool,

    /// Emit assembly only; do not assemble or link
    #[arg(short = 'S')]
    assembly_only: bool,

    /// Keep the generated .s file alongside the executable
    #[arg(long)]
    keep_assembly: bool,

    /// Assembler/linker front end to invoke (defaults to cc)
    #[arg(long, default_value = "cc")]
    assembler_linker: String,

    /// Extra arguments forwarded to the assembler/linker
    #[arg(long = "link-arg", value_name = "ARG")]
    link_args: Vec<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn stop_stage(cli: &Cli) -> StopStage {
    if cli.lex {
        StopStage::Lex
    } else if cli.parse {
        StopStage::Parse
    } else if cli.validate {
        StopStage::Validate
    } else if cli.tacky {
        StopStage::Tacky
    } else if cli.codegen {
        StopStage::Codegen
    } else if cli.assembly_only {
        StopStage::Assembly
    } else {
        StopStage::Full
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = CompilerConfig::new()
        .with_stop_stage(stop_stage(&cli))
        .with_keep_assembly(cli.keep_assembly)
        .with_assembler_linker(cli.assembler_linker.clone())
        .with_linker_args(cli.link_args.clone());

    if let Err(e) = ccx64::compile_file(&cli.input, &config) {
        eprintln!("ccx64: {e}");
        process::exit(1);
    }
}
