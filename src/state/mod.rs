//! Persistent state carried between check invocations

pub mod cursor;

pub use cursor::{Cursor, CursorError, CursorStore, InvocationIdentity};

/// Default directory for cursor files
pub fn default_state_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("", "", "check-logs-insights")
        .map(|d| d.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("check-logs-insights"))
}
