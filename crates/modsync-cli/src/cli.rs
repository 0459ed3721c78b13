//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// modsync - Materialize remote modules as importable packages
#[derive(Parser, Debug)]
#[command(name = "modsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the project manifest (defaults to ./modsync.toml)
    #[arg(short, long, global = true, env = "MODSYNC_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Fetch the manifest's dependencies into the sync root
    ///
    /// Examples:
    ///   modsync sync                    # Sync ./modsync.toml
    ///   modsync sync --overwrite-all    # Replace every resident module
    ///   modsync sync --json             # Machine-readable report
    Sync {
        /// Refetch every module, replacing resident copies
        #[arg(long)]
        overwrite_all: bool,

        /// Ask the remote whether resident revisions moved
        #[arg(long)]
        check_upstream: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Report the health of every synced module
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List synced modules
    List,
}
