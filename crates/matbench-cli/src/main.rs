use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use commands::{
    benchmark::{self, BenchmarkArgs},
    results::{self, CleanArgs, ParseArgs},
};

mod commands;
mod config;
mod interrupt;

#[derive(Parser, Debug)]
#[command(name = "matbench", about = "Benchmark campaign scheduler")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Directory to switch to before resolving relative paths.
    #[arg(long, global = true, env = "MATBENCH_WORK_DIR")]
    work_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand the benchmark file and run (or preview) missing combinations.
    Benchmark(BenchmarkArgs),
    /// Load the results tree and report what it contains.
    Parse(ParseArgs),
    /// List or remove invalid and duplicated result directories.
    Clean(CleanArgs),
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(dir) = &cli.work_dir {
        std::env::set_current_dir(dir)?;
        tracing::info!(dir = %dir.display(), "changed working directory");
    }

    let failed = match cli.command {
        Command::Benchmark(args) => benchmark::run(&args)?,
        Command::Parse(args) => results::parse(&args)?,
        Command::Clean(args) => results::clean(&args)?,
    };
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn init_tracing(verbose: bool) {
    let default = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default.as_str().to_ascii_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
