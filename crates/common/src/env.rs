//! Filesystem helpers for storage locations.

use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::debug;

/// Resolve `path` against the current working directory so log lines and
/// sqlite URLs always carry an absolute location.
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// Create the directory that will contain `path`, if any.
pub async fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            tokio::fs::create_dir_all(parent).await?;
            debug!(dir = %parent.display(), "storage directory ready");
            Ok(())
        }
        _ => Ok(()),
    }
}
