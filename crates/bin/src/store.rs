//! Store locations.
//!
//! Source and target default to one SQLite file in the platform cache
//! directory; `TARGET` falls back to `SOURCE` when only the latter is set.

use hobart::LoaderSettings;
use hobart::data::{DataError, SqliteStore};
use std::path::{Path, PathBuf};

/// Get the default data directory path.
///
/// Uses platform-specific cache directories:
/// - Linux: `~/.cache/hobart/`
/// - macOS: `~/Library/Caches/hobart/`
/// - Windows: `%LOCALAPPDATA%\hobart\`
pub(crate) fn default_data_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hobart")
}

/// Get the default database path.
pub(crate) fn default_db_path() -> PathBuf {
    default_data_dir().join("hobart.db")
}

/// Resolve the source and target paths.
pub(crate) fn resolve_paths(
    source: Option<PathBuf>,
    target: Option<PathBuf>,
) -> (PathBuf, PathBuf) {
    let source = source.unwrap_or_else(default_db_path);
    let target = target.unwrap_or_else(|| source.clone());
    (source, target)
}

/// Open a store, creating its directory if needed.
pub(crate) fn open_store(path: &Path, settings: &LoaderSettings) -> Result<SqliteStore, DataError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    SqliteStore::new(path)?.with_busy_timeout(settings.busy_timeout())
}
