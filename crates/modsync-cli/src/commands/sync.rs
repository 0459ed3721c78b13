//! Sync command implementation

use colored::{ColoredString, Colorize};

use modsync_core::{SyncAction, SyncReport, SyncResult};

use crate::context::Project;
use crate::error::{CliError, Result};

/// Flags accepted by `modsync sync`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncFlags {
    pub overwrite_all: bool,
    pub check_upstream: bool,
    pub json: bool,
}

/// Run the sync command
///
/// Fatal errors (malformed identifiers, cycles, a corrupt store) abort with
/// an error. Per-module failures are printed and make the command fail
/// after the whole report is shown.
pub fn run_sync(project: &Project, flags: SyncFlags) -> Result<()> {
    let mut options = project.manifest.options();
    options.overwrite_all = flags.overwrite_all;
    options.check_upstream |= flags.check_upstream;
    let engine = project.engine().with_options(options);

    if !flags.json {
        println!(
            "{} Syncing {} declared module(s) into {}",
            "=>".blue().bold(),
            project.manifest.dependencies.len(),
            engine.store().root().as_str().cyan()
        );
    }

    let report = engine.sync_dependencies(&project.manifest.dependencies)?;

    if flags.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    let failed = report.counts().failed;
    if failed > 0 {
        return Err(CliError::user(format!("{failed} module(s) failed to sync")));
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    for result in &report.results {
        print_result(result);
    }

    let counts = report.counts();
    println!();
    println!(
        "{} {} fetched, {} overwritten, {} skipped, {} conflict(s), {} failed",
        if report.has_failures() {
            "DONE".yellow().bold()
        } else {
            "OK".green().bold()
        },
        counts.fetched,
        counts.overwritten,
        counts.skipped,
        counts.conflicts,
        counts.failed
    );
    if report.has_conflicts() {
        println!(
            "Run {} to replace conflicting modules.",
            "modsync sync --overwrite-all".cyan()
        );
    }
}

fn print_result(result: &SyncResult) {
    let indent = "  ".repeat(result.depth);
    let revision = result
        .resolved_revision
        .as_deref()
        .unwrap_or(&result.requested_revision);
    println!(
        "   {indent}{} {}@{} {} {}",
        symbol(&result.action),
        result.module,
        revision,
        "->".dimmed(),
        result.local_path
    );
    if !matches!(result.action, SyncAction::Fetched | SyncAction::Skipped) {
        println!("   {indent}    {}", result.action.to_string().dimmed());
    }
    for warning in &result.warnings {
        println!("   {indent}    {} {}", "!".yellow(), warning);
    }
}

fn symbol(action: &SyncAction) -> ColoredString {
    match action {
        SyncAction::Fetched => "+".green(),
        SyncAction::Overwritten => "~".cyan(),
        SyncAction::Skipped => "=".dimmed(),
        SyncAction::Conflict { .. } => "!".yellow(),
        SyncAction::Failed { .. } => "x".red(),
    }
}
