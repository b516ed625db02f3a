//! wimm CLI entry point.
//!
//! Usage:
//!   wimm                                  # Interactive shell
//!   wimm mount <image> <dir> [--index N]  # Mount and exit
//!   wimm unmount <dir> [--discard]
//!   wimm mounts | indexes <image> | tools
//!
//! Exit status: 0 on success, 1 on failure, 2 when the tool needs elevation.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use wimm_kernel::ManagerConfig;
use wimm_kernel::types::{BackendMode, Operation};
use wimm_repl::{Repl, exit_status};

#[derive(Parser, Debug)]
#[command(name = "wimm", version, about = "Mount, unmount and inspect WIM images")]
struct Cli {
    /// Backend to use: auto, dism or wimlib
    #[arg(long, value_name = "MODE")]
    backend: Option<BackendMode>,

    /// Config file (default: ~/.config/wimm/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mount one image of a container into a directory
    Mount {
        image: String,
        dir: String,
        /// Image index; defaults to 1
        #[arg(short, long, default_value = "")]
        index: String,
    },
    /// Unmount a directory, saving changes unless --discard is given
    Unmount {
        dir: String,
        #[arg(long)]
        discard: bool,
    },
    /// List mounted images
    Mounts,
    /// List the images inside a container
    Indexes { image: String },
    /// Show which backends are installed
    Tools,
}

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ManagerConfig::load_from(path)?,
        None => ManagerConfig::load().context("Failed to load configuration")?,
    };
    if let Some(mode) = cli.backend {
        config.backend = mode;
    }

    let mut repl = Repl::with_config(config)?.with_json(cli.json);

    let operation = match cli.command {
        None => {
            wimm_repl::run(repl)?;
            return Ok(ExitCode::SUCCESS);
        }
        Some(Commands::Tools) => {
            println!("{}", repl.tools()?);
            return Ok(ExitCode::SUCCESS);
        }
        Some(Commands::Mount { image, dir, index }) => Operation::mount(image, index, dir),
        Some(Commands::Unmount { dir, discard }) => Operation::unmount(dir, !discard),
        Some(Commands::Mounts) => Operation::ListMounts,
        Some(Commands::Indexes { image }) => Operation::list_indexes(image),
    };

    tracing::debug!(label = %operation.label(), "running one-shot command");
    let result = repl.run_operation(&operation)?;
    println!("{}", repl.render(operation.kind(), &operation.label(), &result)?);
    Ok(ExitCode::from(exit_status(&result)))
}
