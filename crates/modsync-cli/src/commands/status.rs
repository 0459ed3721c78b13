//! Status command implementation

use colored::Colorize;

use modsync_core::{CheckStatus, ModuleState};

use crate::context::Project;
use crate::error::Result;

/// Run the status command
///
/// Reports whether every synced module is pristine.
pub fn run_status(project: &Project, json: bool) -> Result<()> {
    let report = project.engine().check()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for module in &report.modules {
        let (tag, name) = match module.state {
            ModuleState::Pristine => ("ok".green(), module.path.normal()),
            ModuleState::Modified => ("modified".yellow(), module.path.yellow()),
            ModuleState::Broken => ("broken".red(), module.path.red()),
        };
        let revision = module.revision.as_deref().unwrap_or("?");
        println!("   {:>8} {} @ {}", tag, name, revision.dimmed());
        if let Some(detail) = &module.detail {
            println!("            {}", detail.dimmed());
        }
    }

    match report.status {
        CheckStatus::Healthy => {
            println!(
                "{} {} module(s) synced. No drift detected.",
                "OK".green().bold(),
                report.modules.len()
            );
        }
        CheckStatus::Drifted => {
            println!(
                "{} {} module(s) have local edits.",
                "DRIFTED".yellow().bold(),
                report.count(ModuleState::Modified)
            );
            println!("Run {} to discard them.", "modsync sync --overwrite-all".cyan());
        }
        CheckStatus::Broken => {
            println!(
                "{} {} module(s) are in a broken state.",
                "BROKEN".red().bold(),
                report.count(ModuleState::Broken)
            );
            println!("Manual intervention may be required.");
        }
    }

    Ok(())
}
