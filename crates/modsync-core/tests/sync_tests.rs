//! End-to-end behavior of the sync engine against an in-memory remote.

use std::fs;
use std::path::PathBuf;

use modsync_core::{
    CheckStatus, DependencyDeclaration, Error, FailureKind, MemoryProvider, ModuleId, ModuleState,
    ModuleStore, SyncAction, SyncEngine, SyncOptions, SyncReport, SyncWarning,
};
use modsync_fs::{NormalizedPath, RobustnessConfig};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Fixture {
    temp: TempDir,
    root: PathBuf,
    remote: MemoryProvider,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("synced_modules");
        Self {
            temp,
            root,
            remote: MemoryProvider::new(),
        }
    }

    fn store(&self) -> ModuleStore {
        ModuleStore::new(NormalizedPath::new(&self.root))
            .with_init_file("__init__.py")
            .with_robustness(RobustnessConfig::no_retry())
    }

    fn engine(&self) -> SyncEngine {
        SyncEngine::new(self.store(), self.remote.clone())
    }

    fn engine_with(&self, options: SyncOptions) -> SyncEngine {
        self.engine().with_options(options)
    }

    /// Publish a module whose `modsync.toml` declares `deps` (`url@revision`).
    fn publish(&self, url: &str, revision: &str, body: &str, deps: &[&str]) {
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
        self.remote.publish(url, revision, &files).unwrap();
    }

    /// Create a module directory outside the sync root and return its path.
    fn local_module(&self, name: &str, body: &str) -> String {
        let dir = self.temp.path().join("work").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("flow.py"), body).unwrap();
        dir.to_string_lossy().into_owned()
    }

    fn package(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.package(relative)).unwrap()
    }
}

fn id(raw: &str) -> ModuleId {
    ModuleId::parse(raw).unwrap()
}

fn actions(report: &SyncReport) -> Vec<(String, SyncAction)> {
    report
        .results
        .iter()
        .map(|r| (r.module.to_string(), r.action.clone()))
        .collect()
}

#[test]
fn first_sync_fetches_into_escaped_path() {
    let fx = Fixture::new();
    fx.publish("1234/MyModule", "main", "v = 1", &[]);

    let report = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::latest("1234/MyModule")])
        .unwrap();

    assert_eq!(
        actions(&report),
        vec![("1234/MyModule".to_string(), SyncAction::Fetched)]
    );
    let result = &report.results[0];
    assert_eq!(result.local_path, "user_1234/MyModule");
    assert_eq!(result.resolved_revision.as_deref(), Some("main"));
    assert_eq!(fx.read("user_1234/MyModule/flow.py"), "v = 1");
    assert!(fx.package("user_1234/MyModule/.modsync-marker.toml").is_file());
    assert!(fx.package("user_1234/__init__.py").is_file());
    assert!(fx.package("__init__.py").is_file());
    assert!(fx.package(".gitignore").is_file());
}

#[test]
fn second_sync_is_idempotent() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "main", "x", &[]);
    let decls = [DependencyDeclaration::latest("saibo/Chat")];

    fx.engine().sync_dependencies(&decls).unwrap();
    let marker_before = fx.read("saibo/Chat/.modsync-marker.toml");

    let report = fx.engine().sync_dependencies(&decls).unwrap();

    assert_eq!(report.results[0].action, SyncAction::Skipped);
    assert_eq!(fx.remote.fetch_count("saibo/Chat"), 1);
    assert_eq!(fx.read("saibo/Chat/.modsync-marker.toml"), marker_before);
}

#[test]
fn malformed_declaration_fails_before_any_write() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "main", "x", &[]);

    let err = fx
        .engine()
        .sync_dependencies(&[
            DependencyDeclaration::latest("saibo/Chat"),
            DependencyDeclaration::latest("saibo/3Represent"),
        ])
        .unwrap_err();

    assert!(matches!(err, Error::MalformedIdentifier { .. }));
    assert!(!fx.root.exists());
    assert_eq!(fx.remote.total_fetches(), 0);
}

#[test]
fn conflicting_revision_keeps_resident_copy() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "v1", "one", &[]);
    fx.publish("saibo/Chat", "v2", "two", &[]);

    fx.engine()
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", "v1")])
        .unwrap();
    let report = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", "v2")])
        .unwrap();

    assert_eq!(
        report.results[0].action,
        SyncAction::Conflict {
            resident: "v1".into(),
            requested: "v2".into()
        }
    );
    assert_eq!(report.results[0].resolved_revision.as_deref(), Some("v1"));
    assert_eq!(fx.read("saibo/Chat/flow.py"), "one");
    assert_eq!(fx.remote.fetch_count("saibo/Chat"), 1);
}

#[test]
fn overwrite_replaces_resident_revision() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "v1", "one", &[]);
    fx.publish("saibo/Chat", "v2", "two", &[]);

    fx.engine()
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", "v1")])
        .unwrap();
    let report = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", "v2").with_overwrite()])
        .unwrap();

    assert_eq!(report.results[0].action, SyncAction::Overwritten);
    assert_eq!(report.results[0].resolved_revision.as_deref(), Some("v2"));
    assert_eq!(fx.read("saibo/Chat/flow.py"), "two");
}

#[test]
fn forced_overwrite_discards_local_edits() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "main", "pristine", &[]);
    let engine = fx.engine();
    engine
        .sync_dependencies(&[DependencyDeclaration::latest("saibo/Chat")])
        .unwrap();

    fs::write(fx.package("saibo/Chat/flow.py"), "edited").unwrap();
    fs::write(fx.package("saibo/Chat/scratch.py"), "mine").unwrap();

    let report = engine
        .sync_dependencies(&[DependencyDeclaration::latest("saibo/Chat").with_overwrite()])
        .unwrap();

    assert_eq!(report.results[0].action, SyncAction::Overwritten);
    assert_eq!(
        report.results[0].warnings,
        vec![SyncWarning::DiscardedLocalEdits]
    );
    assert_eq!(fx.read("saibo/Chat/flow.py"), "pristine");
    assert!(!fx.package("saibo/Chat/scratch.py").exists());
}

#[test]
fn local_edits_survive_a_plain_sync() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "main", "pristine", &[]);
    let decls = [DependencyDeclaration::latest("saibo/Chat")];
    fx.engine().sync_dependencies(&decls).unwrap();
    fs::write(fx.package("saibo/Chat/flow.py"), "edited").unwrap();

    let report = fx.engine().sync_dependencies(&decls).unwrap();

    assert_eq!(report.results[0].action, SyncAction::Skipped);
    assert_eq!(report.results[0].warnings, vec![SyncWarning::LocallyModified]);
    assert_eq!(fx.read("saibo/Chat/flow.py"), "edited");
}

#[test]
fn overwrite_all_applies_to_every_declaration() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "v1", "one", &[]);
    fx.publish("saibo/Chat", "v2", "two", &[]);
    fx.engine()
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", "v1")])
        .unwrap();

    let options = SyncOptions {
        overwrite_all: true,
        ..SyncOptions::default()
    };
    let report = fx
        .engine_with(options)
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", "v2")])
        .unwrap();

    assert_eq!(report.results[0].action, SyncAction::Overwritten);
    assert_eq!(fx.read("saibo/Chat/flow.py"), "two");
}

#[test]
fn first_declaration_wins_within_one_call() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "v1", "one", &[]);
    fx.publish("saibo/Chat", "v2", "two", &[]);

    let report = fx
        .engine()
        .sync_dependencies(&[
            DependencyDeclaration::new("saibo/Chat", "v1"),
            DependencyDeclaration::new("saibo/Chat", "v2"),
        ])
        .unwrap();

    assert_eq!(report.results[0].action, SyncAction::Fetched);
    assert!(matches!(
        report.results[1].action,
        SyncAction::Conflict { .. }
    ));
    assert_eq!(fx.read("saibo/Chat/flow.py"), "one");
}

#[test]
fn later_overwrite_declaration_replaces_earlier() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "v1", "one", &[]);
    fx.publish("saibo/Chat", "v2", "two", &[]);

    let report = fx
        .engine()
        .sync_dependencies(&[
            DependencyDeclaration::new("saibo/Chat", "v1"),
            DependencyDeclaration::new("saibo/Chat", "v2").with_overwrite(),
        ])
        .unwrap();

    assert_eq!(report.results[1].action, SyncAction::Overwritten);
    assert_eq!(fx.read("saibo/Chat/flow.py"), "two");
}

#[test]
fn overwrite_repeat_of_conflicting_revision_is_applied() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "v1", "one", &[]);
    fx.publish("saibo/Chat", "v2", "two", &[]);

    let report = fx
        .engine()
        .sync_dependencies(&[
            DependencyDeclaration::new("saibo/Chat", "v1"),
            DependencyDeclaration::new("saibo/Chat", "v2"),
            DependencyDeclaration::new("saibo/Chat", "v2").with_overwrite(),
        ])
        .unwrap();

    let module_id_1 = id("saibo/Chat");
    let chat: Vec<&SyncAction> = report.for_module(&module_id_1).map(|r| &r.action).collect();
    assert_eq!(
        chat,
        vec![
            &SyncAction::Fetched,
            &SyncAction::Conflict {
                resident: "v1".to_string(),
                requested: "v2".to_string(),
            },
            &SyncAction::Overwritten,
        ]
    );
    assert_eq!(report.results[2].resolved_revision.as_deref(), Some("v2"));
    assert_eq!(fx.read("saibo/Chat/flow.py"), "two");
}

#[test]
fn overwrite_back_to_earlier_revision_is_applied() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "v1", "one", &[]);
    fx.publish("saibo/Chat", "v2", "two", &[]);

    let report = fx
        .engine()
        .sync_dependencies(&[
            DependencyDeclaration::new("saibo/Chat", "v1"),
            DependencyDeclaration::new("saibo/Chat", "v2").with_overwrite(),
            DependencyDeclaration::new("saibo/Chat", "v1").with_overwrite(),
        ])
        .unwrap();

    let module_id_2 = id("saibo/Chat");
    let chat: Vec<&SyncAction> = report.for_module(&module_id_2).map(|r| &r.action).collect();
    assert_eq!(
        chat,
        vec![
            &SyncAction::Fetched,
            &SyncAction::Overwritten,
            &SyncAction::Overwritten,
        ]
    );
    assert_eq!(fx.remote.fetch_count("saibo/Chat"), 3);
    assert_eq!(fx.read("saibo/Chat/flow.py"), "one");
}

#[test]
fn overwrite_repeat_of_installed_revision_is_not_refetched() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "v1", "one", &[]);

    let report = fx
        .engine()
        .sync_dependencies(&[
            DependencyDeclaration::new("saibo/Chat", "v1"),
            DependencyDeclaration::new("saibo/Chat", "v1").with_overwrite(),
        ])
        .unwrap();

    assert_eq!(
        actions(&report),
        vec![
            ("saibo/Chat".to_string(), SyncAction::Fetched),
            ("saibo/Chat".to_string(), SyncAction::Skipped),
        ]
    );
    assert_eq!(fx.remote.fetch_count("saibo/Chat"), 1);
}

#[test]
fn transitive_dependencies_are_synced() {
    let fx = Fixture::new();
    fx.publish("saibo/App", "main", "app", &["saibo/Helper@v3"]);
    fx.publish("saibo/Helper", "v3", "helper", &["42/Tools"]);
    fx.publish("42/Tools", "main", "tools", &[]);

    let report = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::latest("saibo/App")])
        .unwrap();

    let summary: Vec<(String, usize, Option<String>)> = report
        .results
        .iter()
        .map(|r| {
            (
                r.module.to_string(),
                r.depth,
                r.requested_by.as_ref().map(ToString::to_string),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("saibo/App".to_string(), 0, None),
            ("saibo/Helper".to_string(), 1, Some("saibo/App".to_string())),
            ("42/Tools".to_string(), 2, Some("saibo/Helper".to_string())),
        ]
    );
    assert_eq!(
        report.order,
        vec![id("42/Tools"), id("saibo/Helper"), id("saibo/App")]
    );
    assert_eq!(fx.read("user_42/Tools/flow.py"), "tools");
}

#[test]
fn diamond_dependency_is_fetched_once() {
    let fx = Fixture::new();
    fx.publish("ns/Top", "main", "", &["ns/Left", "ns/Right"]);
    fx.publish("ns/Left", "main", "", &["ns/Base"]);
    fx.publish("ns/Right", "main", "", &["ns/Base"]);
    fx.publish("ns/Base", "main", "", &[]);

    let report = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::latest("ns/Top")])
        .unwrap();

    assert_eq!(fx.remote.fetch_count("ns/Base"), 1);
    let module_id_3 = id("ns/Base");
    let base: Vec<&SyncAction> = report.for_module(&module_id_3).map(|r| &r.action).collect();
    assert_eq!(base, vec![&SyncAction::Fetched, &SyncAction::Skipped]);
    assert_eq!(report.order.first(), Some(&id("ns/Base")));
    assert_eq!(report.order.last(), Some(&id("ns/Top")));
}

#[test]
fn diamond_under_overwrite_all_is_fetched_once() {
    let fx = Fixture::new();
    fx.publish("ns/Top", "main", "", &["ns/Left", "ns/Right"]);
    fx.publish("ns/Left", "main", "", &["ns/Base"]);
    fx.publish("ns/Right", "main", "", &["ns/Base"]);
    fx.publish("ns/Base", "main", "", &[]);
    let decls = [DependencyDeclaration::latest("ns/Top")];
    fx.engine().sync_dependencies(&decls).unwrap();

    let report = fx
        .engine_with(SyncOptions {
            overwrite_all: true,
            ..SyncOptions::default()
        })
        .sync_dependencies(&decls)
        .unwrap();

    assert_eq!(fx.remote.fetch_count("ns/Base"), 2);
    let module_id_4 = id("ns/Base");
    let base: Vec<&SyncAction> = report.for_module(&module_id_4).map(|r| &r.action).collect();
    assert_eq!(base, vec![&SyncAction::Overwritten, &SyncAction::Skipped]);
}

#[test]
fn cycle_is_detected_without_hanging() {
    let fx = Fixture::new();
    fx.publish("ns/A", "main", "", &["ns/B"]);
    fx.publish("ns/B", "main", "", &["ns/A"]);

    let err = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::latest("ns/A")])
        .unwrap_err();

    match err {
        Error::CyclicDependency { cycle } => {
            assert_eq!(cycle, vec![id("ns/A"), id("ns/B"), id("ns/A")]);
        }
        other => panic!("expected a cycle, got {other}"),
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let fx = Fixture::new();
    fx.publish("ns/A", "main", "", &["ns/A@v2"]);

    let err = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::latest("ns/A")])
        .unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
}

#[test]
fn transitive_conflict_is_reported_not_applied() {
    let fx = Fixture::new();
    fx.publish("ns/Shared", "v1", "one", &[]);
    fx.publish("ns/Shared", "v2", "two", &[]);
    fx.publish("ns/App", "main", "", &["ns/Shared@v2"]);

    let report = fx
        .engine()
        .sync_dependencies(&[
            DependencyDeclaration::new("ns/Shared", "v1"),
            DependencyDeclaration::latest("ns/App"),
        ])
        .unwrap();

    let module_id_5 = id("ns/Shared");
    let shared: Vec<&SyncAction> = report
        .for_module(&module_id_5)
        .map(|r| &r.action)
        .collect();
    assert_eq!(
        shared,
        vec![
            &SyncAction::Fetched,
            &SyncAction::Conflict {
                resident: "v1".into(),
                requested: "v2".into()
            }
        ]
    );
    assert_eq!(fx.read("ns/Shared/flow.py"), "one");
}

#[test]
fn provider_failure_does_not_block_siblings() {
    let fx = Fixture::new();
    fx.publish("ns/Broken", "main", "", &[]);
    fx.publish("ns/Fine", "main", "ok", &[]);
    fx.remote.fail_with("ns/Broken", FailureKind::Network).unwrap();

    let report = fx
        .engine()
        .sync_dependencies(&[
            DependencyDeclaration::latest("ns/Broken"),
            DependencyDeclaration::latest("ns/Fine"),
        ])
        .unwrap();

    assert!(matches!(
        report.results[0].action,
        SyncAction::Failed {
            kind: FailureKind::Network,
            ..
        }
    ));
    assert_eq!(report.results[0].resolved_revision, None);
    assert_eq!(report.results[1].action, SyncAction::Fetched);
    assert!(!fx.package("ns/Broken").exists());
    assert!(fx.root.join(".modsync/staging").read_dir().unwrap().next().is_none());
}

#[test]
fn failed_overwrite_keeps_previous_revision() {
    let fx = Fixture::new();
    fx.publish("ns/Mod", "v1", "one", &[]);
    fx.engine()
        .sync_dependencies(&[DependencyDeclaration::new("ns/Mod", "v1")])
        .unwrap();

    let report = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::new("ns/Mod", "gone").with_overwrite()])
        .unwrap();

    assert!(matches!(
        report.results[0].action,
        SyncAction::Failed {
            kind: FailureKind::NotFound,
            ..
        }
    ));
    assert_eq!(report.results[0].resolved_revision.as_deref(), Some("v1"));
    assert_eq!(fx.read("ns/Mod/flow.py"), "one");
}

#[test]
fn repeated_failure_is_not_retried() {
    let fx = Fixture::new();
    fx.publish("ns/Left", "main", "", &["ns/Base"]);
    fx.publish("ns/Right", "main", "", &["ns/Base"]);

    let report = fx
        .engine()
        .sync_dependencies(&[
            DependencyDeclaration::latest("ns/Left"),
            DependencyDeclaration::latest("ns/Right"),
        ])
        .unwrap();

    assert_eq!(fx.remote.fetch_count("ns/Base"), 1);
    let module_id_6 = id("ns/Base");
    let base: Vec<&str> = report
        .for_module(&module_id_6)
        .map(|r| r.action.label())
        .collect();
    assert_eq!(base, vec!["failed", "failed"]);
}

#[test]
fn canonical_name_mismatch_is_rejected() {
    let fx = Fixture::new();
    fx.publish("saibo/Old", "main", "x", &[]);
    fx.remote.rename_canonical("saibo/Old", "saibo/New").unwrap();

    let report = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::latest("saibo/Old")])
        .unwrap();

    assert!(matches!(
        report.results[0].action,
        SyncAction::Failed {
            kind: FailureKind::NotFound,
            ..
        }
    ));
    assert!(!fx.package("saibo/Old").exists());
    assert!(!fx.package("saibo/New").exists());
}

#[test]
fn partial_write_aborts_the_sync() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "main", "x", &[]);
    fs::create_dir_all(fx.package("saibo/Chat")).unwrap();
    fs::write(fx.package("saibo/Chat/flow.py"), "stray").unwrap();

    let err = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::latest("saibo/Chat")])
        .unwrap_err();

    assert!(matches!(err, Error::PartialWriteDetected { .. }));
    assert_eq!(fx.read("saibo/Chat/flow.py"), "stray");
}

#[test]
fn empty_module_resyncs_cleanly() {
    let fx = Fixture::new();
    fx.remote.publish("saibo/Empty", "main", &[]).unwrap();
    let decls = [DependencyDeclaration::latest("saibo/Empty")];

    let first = fx.engine().sync_dependencies(&decls).unwrap();
    let second = fx.engine().sync_dependencies(&decls).unwrap();

    assert_eq!(first.results[0].action, SyncAction::Fetched);
    assert_eq!(second.results[0].action, SyncAction::Skipped);
    assert!(fx.package("saibo/Empty/.modsync-marker.toml").is_file());
    assert_eq!(fx.engine().check().unwrap().status, CheckStatus::Healthy);
}

#[test]
fn held_session_lock_fails_fast() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "main", "x", &[]);
    let _held = fx.store().open_session().unwrap();

    let err = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::latest("saibo/Chat")])
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Fs(modsync_fs::Error::LockHeld { .. })
    ));
}

#[test]
fn upstream_move_refreshes_pristine_copy() {
    let fx = Fixture::new();
    let first = fx.remote.publish("saibo/Chat", "main", &[("flow.py", "one")]).unwrap();
    let decls = [DependencyDeclaration::latest("saibo/Chat")];
    fx.engine().sync_dependencies(&decls).unwrap();

    let second = fx.remote.publish("saibo/Chat", "main", &[("flow.py", "two")]).unwrap();
    let options = SyncOptions {
        check_upstream: true,
        ..SyncOptions::default()
    };
    let report = fx.engine_with(options).sync_dependencies(&decls).unwrap();

    assert_eq!(report.results[0].action, SyncAction::Overwritten);
    assert_eq!(
        report.results[0].warnings,
        vec![SyncWarning::UpstreamMoved {
            from: first,
            to: second,
            applied: true
        }]
    );
    assert_eq!(fx.read("saibo/Chat/flow.py"), "two");
}

#[test]
fn upstream_move_keeps_edited_copy() {
    let fx = Fixture::new();
    fx.remote.publish("saibo/Chat", "main", &[("flow.py", "one")]).unwrap();
    let decls = [DependencyDeclaration::latest("saibo/Chat")];
    fx.engine().sync_dependencies(&decls).unwrap();
    fs::write(fx.package("saibo/Chat/flow.py"), "edited").unwrap();

    fx.remote.publish("saibo/Chat", "main", &[("flow.py", "two")]).unwrap();
    let options = SyncOptions {
        check_upstream: true,
        ..SyncOptions::default()
    };
    let report = fx.engine_with(options).sync_dependencies(&decls).unwrap();

    assert_eq!(report.results[0].action, SyncAction::Skipped);
    assert!(report.results[0].warnings.iter().any(|w| matches!(
        w,
        SyncWarning::UpstreamMoved { applied: false, .. }
    )));
    assert_eq!(fx.read("saibo/Chat/flow.py"), "edited");
}

#[test]
fn upstream_is_not_consulted_by_default() {
    let fx = Fixture::new();
    fx.remote.publish("saibo/Chat", "main", &[("flow.py", "one")]).unwrap();
    let decls = [DependencyDeclaration::latest("saibo/Chat")];
    fx.engine().sync_dependencies(&decls).unwrap();
    fx.remote.publish("saibo/Chat", "main", &[("flow.py", "two")]).unwrap();

    let report = fx.engine().sync_dependencies(&decls).unwrap();

    assert_eq!(report.results[0].action, SyncAction::Skipped);
    assert!(report.results[0].warnings.is_empty());
    assert_eq!(fx.read("saibo/Chat/flow.py"), "one");
}

#[test]
fn check_reports_each_package_state() {
    let fx = Fixture::new();
    fx.publish("ns/Clean", "main", "x", &[]);
    fx.publish("ns/Edited", "main", "x", &[]);
    fx.engine()
        .sync_dependencies(&[
            DependencyDeclaration::latest("ns/Clean"),
            DependencyDeclaration::latest("ns/Edited"),
        ])
        .unwrap();
    fs::write(fx.package("ns/Edited/flow.py"), "changed").unwrap();
    fs::create_dir_all(fx.package("ns/Stray")).unwrap();
    fs::write(fx.package("ns/Stray/flow.py"), "no marker").unwrap();

    let report = fx.engine().check().unwrap();

    let states: Vec<(&str, ModuleState)> = report
        .modules
        .iter()
        .map(|m| (m.path.as_str(), m.state))
        .collect();
    assert_eq!(
        states,
        vec![
            ("ns/Clean", ModuleState::Pristine),
            ("ns/Edited", ModuleState::Modified),
            ("ns/Stray", ModuleState::Broken),
        ]
    );
    assert_eq!(report.status, CheckStatus::Broken);
    assert_eq!(report.modules[0].revision.as_deref(), Some("main"));
}

#[test]
fn check_on_missing_root_is_healthy() {
    let fx = Fixture::new();
    let report = fx.engine().check().unwrap();
    assert_eq!(report.status, CheckStatus::Healthy);
    assert!(report.modules.is_empty());
}

#[test]
fn local_directory_revision_is_copied() {
    let fx = Fixture::new();
    let source = fx.local_module("Chat", "local");
    let decls = [DependencyDeclaration::new("saibo/Chat", source.as_str())];

    let first = fx.engine().sync_dependencies(&decls).unwrap();
    let second = fx.engine().sync_dependencies(&decls).unwrap();

    assert_eq!(first.results[0].action, SyncAction::Fetched);
    assert_eq!(first.results[0].resolved_revision.as_deref(), Some(source.as_str()));
    assert_eq!(second.results[0].action, SyncAction::Skipped);
    assert_eq!(fx.read("saibo/Chat/flow.py"), "local");
    assert_eq!(fx.remote.total_fetches(), 0);
}

#[test]
fn local_source_edits_apply_on_upstream_check() {
    let fx = Fixture::new();
    let source = fx.local_module("Chat", "before");
    let decls = [DependencyDeclaration::new("saibo/Chat", source.as_str())];
    fx.engine().sync_dependencies(&decls).unwrap();
    fs::write(PathBuf::from(&source).join("flow.py"), "after").unwrap();

    let plain = fx.engine().sync_dependencies(&decls).unwrap();
    assert_eq!(plain.results[0].action, SyncAction::Skipped);
    assert_eq!(fx.read("saibo/Chat/flow.py"), "before");

    let checked = fx
        .engine_with(SyncOptions {
            check_upstream: true,
            ..SyncOptions::default()
        })
        .sync_dependencies(&decls)
        .unwrap();
    assert_eq!(checked.results[0].action, SyncAction::Overwritten);
    assert!(matches!(
        checked.results[0].warnings.as_slice(),
        [SyncWarning::UpstreamMoved { applied: true, .. }]
    ));
    assert_eq!(fx.read("saibo/Chat/flow.py"), "after");
}

#[test]
fn local_revision_conflicts_with_resident_remote_revision() {
    let fx = Fixture::new();
    fx.publish("saibo/Chat", "main", "remote", &[]);
    fx.engine()
        .sync_dependencies(&[DependencyDeclaration::latest("saibo/Chat")])
        .unwrap();
    let source = fx.local_module("Chat", "local");

    let report = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", source.as_str())])
        .unwrap();
    assert_eq!(
        report.results[0].action,
        SyncAction::Conflict {
            resident: "main".to_string(),
            requested: source.clone(),
        }
    );
    assert_eq!(fx.read("saibo/Chat/flow.py"), "remote");

    let report = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", source.as_str()).with_overwrite()])
        .unwrap();
    assert_eq!(report.results[0].action, SyncAction::Overwritten);
    assert_eq!(fx.read("saibo/Chat/flow.py"), "local");
}

#[test]
fn missing_local_directory_fails_only_that_declaration() {
    let fx = Fixture::new();
    fx.publish("saibo/Other", "main", "x", &[]);
    let missing = fx.temp.path().join("work/Gone").to_string_lossy().into_owned();

    let report = fx
        .engine()
        .sync_dependencies(&[
            DependencyDeclaration::new("saibo/Chat", missing.as_str()),
            DependencyDeclaration::latest("saibo/Other"),
        ])
        .unwrap();

    assert!(matches!(
        report.results[0].action,
        SyncAction::Failed {
            kind: FailureKind::NotFound,
            ..
        }
    ));
    assert_eq!(report.results[1].action, SyncAction::Fetched);
}

#[test]
fn local_revision_inside_sync_root_is_rejected() {
    let fx = Fixture::new();
    fx.publish("saibo/Other", "main", "x", &[]);
    fx.engine()
        .sync_dependencies(&[DependencyDeclaration::latest("saibo/Other")])
        .unwrap();
    let inside = fx.package("saibo/Other").to_string_lossy().into_owned();

    let err = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", inside.as_str())])
        .unwrap_err();

    assert!(matches!(err, Error::InvalidLocalRevision { .. }));
    assert!(!fx.package("saibo/Chat").exists());
}

#[test]
fn local_revision_containing_sync_root_is_rejected() {
    let fx = Fixture::new();
    let outer = fx.temp.path().to_string_lossy().into_owned();

    let err = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", outer.as_str())])
        .unwrap_err();

    assert!(matches!(err, Error::InvalidLocalRevision { .. }));
    assert!(!fx.root.exists());
}

#[test]
fn local_revision_naming_a_file_is_rejected() {
    let fx = Fixture::new();
    let source = fx.local_module("Chat", "x");
    let file = PathBuf::from(&source).join("flow.py").to_string_lossy().into_owned();

    let err = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::new("saibo/Chat", file.as_str())])
        .unwrap_err();

    assert!(matches!(err, Error::InvalidLocalRevision { .. }));
}

#[test]
fn transitive_local_revision_inside_sync_root_aborts() {
    let fx = Fixture::new();
    let nested = fx.package("saibo/Helper").to_string_lossy().into_owned();
    fx.publish("saibo/App", "main", "app", &[&format!("saibo/Helper@{nested}")]);

    let err = fx
        .engine()
        .sync_dependencies(&[DependencyDeclaration::latest("saibo/App")])
        .unwrap_err();

    assert!(matches!(err, Error::InvalidLocalRevision { .. }));
}
