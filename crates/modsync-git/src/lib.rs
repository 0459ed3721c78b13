//! Git content provider for modsync
//!
//! Modules live at `{base_url}/{namespace}/{name}`; revisions are branches,
//! tags or commit ids. Each repository is mirrored into a bare cache and the
//! requested commit's tree is exported into the engine's staging directory.

pub mod cache;
pub mod error;
pub mod export;
pub mod provider;

pub use cache::RepositoryCache;
pub use error::{Error, Result};
pub use provider::GitProvider;
