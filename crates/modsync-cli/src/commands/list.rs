//! List command implementation

use colored::Colorize;

use crate::context::Project;
use crate::error::Result;

/// Run the list command
///
/// One line per synced module: `namespace/name revision content_id -> path`.
pub fn run_list(project: &Project) -> Result<()> {
    let store = project.store();
    let resident = store.list_resident()?;

    if resident.is_empty() {
        println!("No modules synced.");
        return Ok(());
    }

    for (path, marker) in &resident {
        println!(
            "{}/{} {} {} {} {}",
            marker.namespace.bold(),
            marker.name.bold(),
            marker.revision,
            marker.content_id.dimmed(),
            "->".dimmed(),
            store.package_dir(path)
        );
    }
    Ok(())
}
