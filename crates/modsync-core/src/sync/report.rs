//! Structured outcome of a sync invocation

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifier::ModuleId;
use crate::provider::FailureKind;

/// Everything a sync did, one result per processed declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Results in processing order (pre-order over the dependency walk)
    pub results: Vec<SyncResult>,
    /// Modules touched by the walk, dependency-first
    pub order: Vec<ModuleId>,
}

impl SyncReport {
    /// Results for one module, in processing order.
    pub fn for_module<'a>(&'a self, id: &'a ModuleId) -> impl Iterator<Item = &'a SyncResult> {
        self.results.iter().filter(move |r| &r.module == id)
    }

    pub fn has_failures(&self) -> bool {
        self.results
            .iter()
            .any(|r| matches!(r.action, SyncAction::Failed { .. }))
    }

    pub fn has_conflicts(&self) -> bool {
        self.results
            .iter()
            .any(|r| matches!(r.action, SyncAction::Conflict { .. }))
    }

    /// Number of results per action, for summaries.
    pub fn counts(&self) -> ActionCounts {
        let mut counts = ActionCounts::default();
        for result in &self.results {
            match result.action {
                SyncAction::Fetched => counts.fetched += 1,
                SyncAction::Skipped => counts.skipped += 1,
                SyncAction::Overwritten => counts.overwritten += 1,
                SyncAction::Conflict { .. } => counts.conflicts += 1,
                SyncAction::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounts {
    pub fetched: usize,
    pub skipped: usize,
    pub overwritten: usize,
    pub conflicts: usize,
    pub failed: usize,
}

/// Outcome for one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub module: ModuleId,
    /// Revision the declaration asked for
    pub requested_revision: String,
    /// Revision resident after processing, `None` if nothing is resident
    pub resolved_revision: Option<String>,
    pub action: SyncAction,
    /// Content id of the resident revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    /// Package path relative to the sync root
    pub local_path: String,
    /// Module whose declaration list contained this one; `None` at top level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<ModuleId>,
    /// 0 for top-level declarations
    pub depth: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SyncWarning>,
}

/// What happened to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncAction {
    /// First sync of the module
    Fetched,
    /// Requested revision already resident
    Skipped,
    /// Resident content replaced with pristine remote content
    Overwritten,
    /// Another revision is resident and was left untouched
    Conflict { resident: String, requested: String },
    /// Provider could not deliver; resident content untouched
    Failed { kind: FailureKind, reason: String },
}

impl SyncAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Skipped => "skipped",
            Self::Overwritten => "overwritten",
            Self::Conflict { .. } => "conflict",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict {
                resident,
                requested,
            } => write!(f, "conflict: {resident} is resident, {requested} was requested"),
            Self::Failed { kind, reason } => write!(f, "failed ({kind}): {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Non-fatal notes attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncWarning {
    /// The resident copy has local edits that were kept
    LocallyModified,
    /// Local edits were discarded by an overwrite
    DiscardedLocalEdits,
    /// The requested revision points at new content upstream
    UpstreamMoved {
        from: String,
        to: String,
        /// Whether the new content was fetched
        applied: bool,
    },
    /// The upstream check could not reach the remote
    UpstreamUnreachable { reason: String },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocallyModified => f.write_str("local edits kept"),
            Self::DiscardedLocalEdits => f.write_str("local edits discarded"),
            Self::UpstreamMoved { from, to, applied } => {
                let verb = if *applied { "refreshed" } else { "not refreshed, local edits" };
                write!(f, "upstream moved {from} -> {to} ({verb})")
            }
            Self::UpstreamUnreachable { reason } => write!(f, "upstream check failed: {reason}"),
        }
    }
}
