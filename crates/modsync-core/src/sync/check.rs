//! Read-only health check of the sync root

use serde::{Deserialize, Serialize};

use crate::identifier::ModuleId;

/// Overall status of the sync root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Every package matches its marker
    Healthy,
    /// Some packages carry local edits
    Drifted,
    /// Some packages are partially written or unreadable
    Broken,
}

/// State of one package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Pristine,
    Modified,
    Broken,
}

/// One package found under the sync root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStatus {
    /// Package path relative to the sync root
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    pub state: ModuleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Report from [`SyncEngine::check`](super::SyncEngine::check)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub status: CheckStatus,
    pub modules: Vec<ModuleStatus>,
}

impl CheckReport {
    pub fn healthy() -> Self {
        Self {
            status: CheckStatus::Healthy,
            modules: Vec::new(),
        }
    }

    /// Add a package, degrading the overall status if needed.
    ///
    /// Status only gets worse: Broken > Drifted > Healthy.
    pub fn push(&mut self, module: ModuleStatus) {
        let implied = match module.state {
            ModuleState::Pristine => CheckStatus::Healthy,
            ModuleState::Modified => CheckStatus::Drifted,
            ModuleState::Broken => CheckStatus::Broken,
        };
        self.status = match (self.status, implied) {
            (CheckStatus::Broken, _) | (_, CheckStatus::Broken) => CheckStatus::Broken,
            (CheckStatus::Drifted, _) | (_, CheckStatus::Drifted) => CheckStatus::Drifted,
            (CheckStatus::Healthy, CheckStatus::Healthy) => CheckStatus::Healthy,
        };
        self.modules.push(module);
    }

    pub fn count(&self, state: ModuleState) -> usize {
        self.modules.iter().filter(|m| m.state == state).count()
    }
}
