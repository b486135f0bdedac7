//! tagflow - drive a transition table from a tag stream
//!
//! Compiles a table definition, feeds an XML-like document through a
//! stream adapter and reports every transition.

mod commands;
mod config;
mod handlers;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::TagflowConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tagflow")]
#[command(about = "Drive a state machine from a stream of tag and text events")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "TAGFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Stream a document through a table and print each transition
    Run {
        /// Table definition (JSON, or YAML by .yaml/.yml extension)
        #[arg(short, long)]
        table: PathBuf,

        /// Initial state (defaults to the table's `initial`)
        #[arg(short, long)]
        initial: Option<String>,

        /// Initial state data JSON (or @file.json to read from file)
        #[arg(short, long)]
        data: Option<String>,

        /// Input document, or - for stdin
        input: String,
    },

    /// Compile a table definition and list its rows
    Check {
        /// Table definition (JSON, or YAML by .yaml/.yml extension)
        #[arg(short, long)]
        table: PathBuf,
    },

    /// Print the actions a document would dispatch
    Actions {
        /// Input document, or - for stdin
        input: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match TagflowConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .init();

    if let Some(path) = &cli.config {
        tracing::debug!("Loaded config from {}", path.display());
    }

    if cli.no_color || !config.output.color {
        colored::control::set_override(false);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = commands::execute(cli.command, &config, &mut out) {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }

    Ok(())
}
