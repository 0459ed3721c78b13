//! End-to-end sync against git remotes
//!
//! Exercises the engine, the module store and the git provider together:
//! transitive manifests inside module repositories, revision conflicts,
//! overwrites and upstream moves.

use std::fs;

use modsync_core::{
    DependencyDeclaration, Error, ModuleId, ModuleStore, SyncAction, SyncEngine, SyncOptions,
    SyncReport, SyncWarning,
};
use modsync_fs::NormalizedPath;
use modsync_git::GitProvider;
use modsync_test_utils::{GitRemote, TestProject};
use pretty_assertions::assert_eq;

// =============================================================================
// Helpers
// =============================================================================

struct World {
    remote: GitRemote,
    project: TestProject,
}

impl World {
    fn new() -> Self {
        Self {
            remote: GitRemote::new(),
            project: TestProject::new(),
        }
    }

    /// Commit a module whose manifest declares `deps` (`url@revision`).
    fn publish(&self, url: &str, branch: &str, body: &str, deps: &[&str]) -> String {
        let (namespace, name) = url.split_once('/').unwrap();
        let mut manifest = String::new();
        for dep in deps {
            let (dep_url, dep_rev) = dep.split_once('@').unwrap_or((*dep, "main"));
            manifest.push_str(&format!(
                "[[dependencies]]\nurl = \"{dep_url}\"\nrevision = \"{dep_rev}\"\n\n"
            ));
        }
        let mut files = vec![("flow.py", body)];
        if !manifest.is_empty() {
            files.push(("modsync.toml", manifest.as_str()));
        }
        self.remote.commit(namespace, name, branch, &files)
    }

    fn engine(&self, options: SyncOptions) -> SyncEngine {
        let store = ModuleStore::new(NormalizedPath::new(self.project.sync_root()))
            .with_init_file("__init__.py");
        let provider = GitProvider::new(self.remote.url(), self.project.root().join(".cache"));
        SyncEngine::new(store, provider).with_options(options)
    }

    fn sync(&self, declarations: &[DependencyDeclaration]) -> modsync_core::Result<SyncReport> {
        self.engine(SyncOptions::default()).sync_dependencies(declarations)
    }
}

fn actions(report: &SyncReport) -> Vec<(String, &'static str)> {
    report
        .results
        .iter()
        .map(|r| (r.module.to_string(), r.action.label()))
        .collect()
}

fn id(raw: &str) -> ModuleId {
    ModuleId::parse(raw).unwrap()
}

// =============================================================================
// Transitive resolution
// =============================================================================

mod transitive {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dependencies_of_dependencies_are_synced() {
        let world = World::new();
        world.publish("saibo/App", "main", "app", &["saibo/Lib@main"]);
        world.publish("1234/Lib", "main", "unused", &[]);
        world.publish("saibo/Lib", "main", "lib", &["1234/Util@main"]);
        world.publish("1234/Util", "main", "util", &[]);

        let report = world.sync(&[DependencyDeclaration::latest("saibo/App")]).unwrap();

        assert_eq!(
            actions(&report),
            vec![
                ("saibo/App".to_string(), "fetched"),
                ("saibo/Lib".to_string(), "fetched"),
                ("1234/Util".to_string(), "fetched"),
            ]
        );
        assert_eq!(report.order, vec![id("1234/Util"), id("saibo/Lib"), id("saibo/App")]);

        world.project.assert_file_contains("synced_modules/saibo/App/flow.py", "app");
        world.project.assert_file_contains("synced_modules/user_1234/Util/flow.py", "util");
        world.project.assert_file_exists("synced_modules/user_1234/__init__.py");
        world.project.assert_file_not_exists("synced_modules/user_1234/Lib");
    }

    #[test]
    fn shared_dependency_is_fetched_once() {
        let world = World::new();
        world.publish("saibo/A", "main", "a", &["saibo/Shared@main"]);
        world.publish("saibo/B", "main", "b", &["saibo/Shared@main"]);
        world.publish("saibo/Shared", "main", "shared", &[]);

        let report = world
            .sync(&[
                DependencyDeclaration::latest("saibo/A"),
                DependencyDeclaration::latest("saibo/B"),
            ])
            .unwrap();

        let shared_id = id("saibo/Shared");
        let shared: Vec<_> = report.for_module(&shared_id).collect();
        assert_eq!(shared.len(), 2);
        assert_eq!(shared[0].action, SyncAction::Fetched);
        assert_eq!(shared[1].action, SyncAction::Skipped);
    }

    #[test]
    fn cycle_is_fatal() {
        let world = World::new();
        world.publish("saibo/A", "main", "a", &["saibo/B@main"]);
        world.publish("saibo/B", "main", "b", &["saibo/A@main"]);

        let err = world.sync(&[DependencyDeclaration::latest("saibo/A")]).unwrap_err();
        match err {
            Error::CyclicDependency { cycle } => {
                assert_eq!(cycle, vec![id("saibo/A"), id("saibo/B"), id("saibo/A")]);
            }
            other => panic!("expected a cycle, got {other}"),
        }
    }
}

// =============================================================================
// Revisions and conflicts
// =============================================================================

mod revisions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pinned_tag_wins_over_later_branch_request() {
        let world = World::new();
        let v1 = world.publish("saibo/Lib", "main", "v1", &[]);
        world.remote.tag("saibo", "Lib", "v1", &v1);
        world.publish("saibo/Lib", "main", "v2", &[]);

        let report = world
            .sync(&[
                DependencyDeclaration::new("saibo/Lib", "v1"),
                DependencyDeclaration::latest("saibo/Lib"),
            ])
            .unwrap();

        assert_eq!(report.results[0].action, SyncAction::Fetched);
        assert_eq!(report.results[0].content_id.as_deref(), Some(v1.as_str()));
        assert_eq!(
            report.results[1].action,
            SyncAction::Conflict {
                resident: "v1".to_string(),
                requested: "main".to_string(),
            }
        );
        world.project.assert_file_contains("synced_modules/saibo/Lib/flow.py", "v1");
    }

    #[test]
    fn overwrite_replaces_resident_revision() {
        let world = World::new();
        let v1 = world.publish("saibo/Lib", "main", "v1", &[]);
        world.remote.tag("saibo", "Lib", "v1", &v1);
        world.publish("saibo/Lib", "main", "v2", &[]);

        world.sync(&[DependencyDeclaration::new("saibo/Lib", "v1")]).unwrap();
        let report = world
            .sync(&[DependencyDeclaration::latest("saibo/Lib").with_overwrite()])
            .unwrap();

        assert_eq!(report.results[0].action, SyncAction::Overwritten);
        assert_eq!(report.results[0].resolved_revision.as_deref(), Some("main"));
        world.project.assert_file_contains("synced_modules/saibo/Lib/flow.py", "v2");
    }

    #[test]
    fn missing_repository_fails_only_its_declaration() {
        let world = World::new();
        world.publish("saibo/Lib", "main", "lib", &[]);

        let report = world
            .sync(&[
                DependencyDeclaration::latest("saibo/Ghost"),
                DependencyDeclaration::latest("saibo/Lib"),
            ])
            .unwrap();

        assert_eq!(
            actions(&report),
            vec![
                ("saibo/Ghost".to_string(), "failed"),
                ("saibo/Lib".to_string(), "fetched"),
            ]
        );
        world.project.assert_file_not_exists("synced_modules/saibo/Ghost");
    }
}

// =============================================================================
// Upstream changes
// =============================================================================

mod upstream {
    use super::*;
    use pretty_assertions::assert_eq;

    fn check_upstream() -> SyncOptions {
        SyncOptions {
            check_upstream: true,
            ..SyncOptions::default()
        }
    }

    #[test]
    fn moved_branch_is_skipped_without_check() {
        let world = World::new();
        let first = world.publish("saibo/Lib", "main", "v1", &[]);
        world.sync(&[DependencyDeclaration::latest("saibo/Lib")]).unwrap();
        world.publish("saibo/Lib", "main", "v2", &[]);

        let report = world.sync(&[DependencyDeclaration::latest("saibo/Lib")]).unwrap();

        assert_eq!(report.results[0].action, SyncAction::Skipped);
        assert_eq!(report.results[0].content_id.as_deref(), Some(first.as_str()));
        world.project.assert_file_contains("synced_modules/saibo/Lib/flow.py", "v1");
    }

    #[test]
    fn moved_branch_is_refreshed_with_check() {
        let world = World::new();
        let first = world.publish("saibo/Lib", "main", "v1", &[]);
        world.sync(&[DependencyDeclaration::latest("saibo/Lib")]).unwrap();
        let second = world.publish("saibo/Lib", "main", "v2", &[]);

        let report = world
            .engine(check_upstream())
            .sync_dependencies(&[DependencyDeclaration::latest("saibo/Lib")])
            .unwrap();

        let result = &report.results[0];
        assert_eq!(result.action, SyncAction::Overwritten);
        assert_eq!(
            result.warnings,
            vec![SyncWarning::UpstreamMoved {
                from: first,
                to: second,
                applied: true,
            }]
        );
        world.project.assert_file_contains("synced_modules/saibo/Lib/flow.py", "v2");
    }

    #[test]
    fn local_edits_block_upstream_refresh() {
        let world = World::new();
        world.publish("saibo/Lib", "main", "v1", &[]);
        world.sync(&[DependencyDeclaration::latest("saibo/Lib")]).unwrap();
        world.publish("saibo/Lib", "main", "v2", &[]);
        fs::write(world.project.sync_root().join("saibo/Lib/flow.py"), "mine").unwrap();

        let report = world
            .engine(check_upstream())
            .sync_dependencies(&[DependencyDeclaration::latest("saibo/Lib")])
            .unwrap();

        let result = &report.results[0];
        assert_eq!(result.action, SyncAction::Skipped);
        assert!(result.warnings.contains(&SyncWarning::LocallyModified));
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, SyncWarning::UpstreamMoved { applied: false, .. })));
        world.project.assert_file_contains("synced_modules/saibo/Lib/flow.py", "mine");
    }
}
