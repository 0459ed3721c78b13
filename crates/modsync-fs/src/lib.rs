//! Filesystem primitives for modsync
//!
//! Provides normalized path handling, crash-safe writes, tree checksums and
//! format-agnostic config loading used by the module store.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod lock;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use lock::DirLock;
pub use path::{NormalizedPath, validate_path_segment};
