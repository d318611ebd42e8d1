//! Shared helpers for the sheetpipe binaries.

use std::path::Path;

/// Create the parent directory of an output path, logging on failure.
pub fn ensure_parent_dir(path: &Path) {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(parent) {
        tracing::warn!(dir = %parent.display(), error = %e, "Failed to create output directory");
    }
}
