#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that opens a shared tabletop board.

mod config;
mod play;
mod replay;
mod roster;

use std::{fs::File, io, io::BufReader, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::ClientConfig;

/// Shared tabletop board client.
#[derive(Debug, Parser)]
#[command(name = "tabletop", version)]
struct Cli {
    /// Configuration file; defaults to `tabletop.toml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Opens the board window and joins a campaign.
    Play(PlayArgs),
    /// Feeds a JSON-lines event log into a fresh board and prints the result.
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
struct PlayArgs {
    /// Address of a line-delimited JSON session service. Plays locally when omitted.
    #[arg(long, value_name = "ADDR")]
    connect: Option<String>,
    /// Campaign code to join.
    #[arg(long)]
    code: Option<String>,
}

#[derive(Debug, Args)]
struct ReplayArgs {
    /// Event log with one envelope per line.
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Campaign code attached to requests issued during the replay.
    #[arg(long)]
    code: Option<String>,
}

/// Entry point for the tabletop command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging.filter);

    match cli.command {
        Command::Play(args) => {
            if let Some(address) = args.connect {
                config.session.connect = Some(address);
            }
            if let Some(code) = args.code {
                config.session.code = code;
            }
            play::run(config)
        }
        Command::Replay(args) => {
            let code = args.code.unwrap_or(config.session.code);
            let file = File::open(&args.file)
                .with_context(|| format!("failed to open {}", args.file.display()))?;
            let report = replay::replay(BufReader::new(file), &code)?;
            report
                .print(&mut io::stdout().lock())
                .context("failed to write replay summary")
        }
    }
}

fn init_tracing(fallback: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .init();
}
