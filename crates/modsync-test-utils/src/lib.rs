//! Shared test utilities for the modsync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: [`GitRemote`], a directory of real git repositories laid out
//!   like a hosting service (`{base}/{namespace}/{name}`)
//! - [`project`]: [`TestProject`], a temporary project with a manifest and
//!   assertion helpers for the sync root

pub mod git;
pub mod project;

pub use git::GitRemote;
pub use project::TestProject;
