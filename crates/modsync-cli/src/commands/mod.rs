//! Command implementations for modsync-cli

pub mod list;
pub mod status;
pub mod sync;

pub use list::run_list;
pub use status::run_status;
pub use sync::{SyncFlags, run_sync};
