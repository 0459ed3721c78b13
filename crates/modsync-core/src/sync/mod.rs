//! SyncEngine for materializing declared modules into the store
//!
//! This module provides:
//! - **engine**: the public entry point (`sync_dependencies`, `check`)
//! - **walker**: per-invocation recursion with cycle detection and memoization
//! - **report**: structured per-declaration results
//! - **check**: read-only health report of the sync root

mod check;
mod engine;
mod report;
mod walker;

pub use check::{CheckReport, CheckStatus, ModuleState, ModuleStatus};
pub use engine::{SyncEngine, SyncOptions};
pub use report::{ActionCounts, SyncAction, SyncReport, SyncResult, SyncWarning};
