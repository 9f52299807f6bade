#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the snapshot data directory.
//!
//! All paths are relative to the project root's `data/` directory.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`, falling back to the
/// current directory if the crate is built outside the workspace.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the `data/snapshots/` directory.
#[must_use]
pub fn snapshots_dir() -> PathBuf {
    data_dir().join("snapshots")
}

/// Returns the snapshot directory for one study area.
#[must_use]
pub fn area_dir(area_id: &str) -> PathBuf {
    snapshots_dir().join(area_id)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
