//! Bundled front-end.

use std::path::{Path, PathBuf};

/// Pick the directory static files are served from: `primary` when it
/// exists, `fallback` otherwise.
pub fn resolve_static_dir(primary: &Path, fallback: &Path) -> PathBuf {
    let dir = if primary.is_dir() {
        primary
    } else {
        tracing::warn!(missing = %primary.display(), fallback = %fallback.display(), "static directory not found");
        fallback
    };
    tracing::info!(dir = %dir.display(), "serving static files");
    dir.to_path_buf()
}
