// SPDX-License-Identifier: MIT OR Apache-2.0
//! Portloom command-line tools.
//!
//! Inspects, validates and normalizes session files written by
//! [`portloom_graph::NodeGraph::save_session`].

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "portloom")]
#[command(author, version, about = "Portloom session tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize nodes, ports and connections
    Inspect {
        /// Session file (JSON)
        #[arg(value_name = "SESSION")]
        session: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify graph invariants
    Check {
        /// Session file (JSON)
        #[arg(value_name = "SESSION")]
        session: PathBuf,

        /// Graph settings (RON)
        #[arg(long, value_name = "RON")]
        settings: Option<PathBuf>,
    },

    /// Load and re-save a session in canonical form
    Format {
        /// Session file (JSON)
        #[arg(value_name = "SESSION")]
        session: PathBuf,

        /// Output file (defaults to rewriting SESSION)
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { session, json } => commands::inspect(&session, json),
        Commands::Check { session, settings } => commands::check(&session, settings.as_deref()),
        Commands::Format { session, output } => commands::format(&session, output.as_deref()),
    }
}
