//! modsync CLI
//!
//! Syncs a project's remote module dependencies into an importable package
//! tree.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use commands::SyncFlags;
use context::Project;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| CliError::user(format!("Failed to set tracing subscriber: {e}")))?;
        tracing::debug!("Verbose mode enabled");
    }

    let Some(command) = cli.command else {
        println!("{} sync remote modules as packages", "modsync".green().bold());
        println!();
        println!("Run {} for available commands.", "modsync --help".cyan());
        return Ok(());
    };

    let cwd = std::env::current_dir()?;
    let project = Project::load(cli.manifest.as_deref(), &cwd)?;

    match command {
        Commands::Sync {
            overwrite_all,
            check_upstream,
            json,
        } => commands::run_sync(
            &project,
            SyncFlags {
                overwrite_all,
                check_upstream,
                json,
            },
        ),
        Commands::Status { json } => commands::run_status(&project, json),
        Commands::List => commands::run_list(&project),
    }
}
