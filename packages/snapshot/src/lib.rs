#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `GeoJSON` snapshot persistence.
//!
//! A snapshot is the pair of feature collections a run produces: target
//! features and the reference boundary. Both are written to temporary
//! siblings first and renamed into place only once both serialized and
//! hit disk. The previous pair is kept as `.bak` until both renames
//! succeed and restored otherwise, so a failed run never leaves a
//! half-updated pair behind.
//! Readers treat the files as read-only.

pub mod paths;

use std::path::{Path, PathBuf};

use geojson::{FeatureCollection, GeoJson};
use thiserror::Error;

/// File name for target features.
pub const TARGETS_FILE: &str = "targets.geojson";

/// File name for the boundary.
pub const BOUNDARY_FILE: &str = "boundary.geojson";

/// Errors that can occur while writing or reading snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// File system operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A snapshot file is not a `GeoJSON` feature collection.
    #[error("Invalid GeoJSON in {path}: {source}")]
    GeoJson {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: Box<geojson::Error>,
    },
}

/// The two collections persisted per run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Target features (post-filter when filtering is enabled).
    pub targets: FeatureCollection,
    /// Single-feature boundary collection.
    pub boundary: FeatureCollection,
}

/// A directory holding one study area's snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Uses `dir` as the snapshot directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Uses the canonical directory for `area_id` under `data/snapshots/`.
    #[must_use]
    pub fn for_area(area_id: &str) -> Self {
        Self::new(paths::area_dir(area_id))
    }

    /// Returns the snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the target features file path.
    #[must_use]
    pub fn targets_path(&self) -> PathBuf {
        self.dir.join(TARGETS_FILE)
    }

    /// Returns the boundary file path.
    #[must_use]
    pub fn boundary_path(&self) -> PathBuf {
        self.dir.join(BOUNDARY_FILE)
    }

    /// Writes both collections, replacing any previous snapshot.
    ///
    /// Both files are staged as `.tmp` siblings. Existing files are moved
    /// aside to `.bak` before the staged files are renamed into place, and
    /// moved back if any rename fails, so readers see either the previous
    /// pair or the new pair.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if serialization or any file operation
    /// fails. The previous snapshot is restored and temporary files are
    /// cleaned up on failure.
    pub fn write(
        &self,
        targets: &FeatureCollection,
        boundary: &FeatureCollection,
    ) -> Result<(), SnapshotError> {
        paths::ensure_dir(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let staged = [
            (self.targets_path(), serde_json::to_string_pretty(targets)?),
            (self.boundary_path(), serde_json::to_string_pretty(boundary)?),
        ];

        let mut tmps = Vec::with_capacity(staged.len());
        for (path, contents) in &staged {
            let tmp = sibling(path, "tmp");
            if let Err(source) = std::fs::write(&tmp, contents) {
                remove_all(&tmps);
                return Err(SnapshotError::Io { path: tmp, source });
            }
            tmps.push(tmp);
        }

        let finals: Vec<PathBuf> = staged.into_iter().map(|(path, _)| path).collect();
        let result = swap_into_place(&tmps, &finals);
        if result.is_err() {
            remove_all(&tmps);
        }
        result
    }

    /// Reads both collections back.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if a file is missing or not a `GeoJSON`
    /// feature collection.
    pub fn read(&self) -> Result<Snapshot, SnapshotError> {
        Ok(Snapshot {
            targets: read_collection(&self.targets_path())?,
            boundary: read_collection(&self.boundary_path())?,
        })
    }
}

fn read_collection(path: &Path) -> Result<FeatureCollection, SnapshotError> {
    let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let geojson_err = |source| SnapshotError::GeoJson {
        path: path.to_path_buf(),
        source: Box::new(source),
    };
    let geojson: GeoJson = text.parse().map_err(geojson_err)?;
    FeatureCollection::try_from(geojson).map_err(geojson_err)
}

/// Renames each staged file onto its target, keeping the previous targets
/// as `.bak` until every rename has succeeded.
fn swap_into_place(staged: &[PathBuf], targets: &[PathBuf]) -> Result<(), SnapshotError> {
    let mut backups = Vec::with_capacity(targets.len());
    for path in targets {
        if !path.exists() {
            continue;
        }
        let bak = sibling(path, "bak");
        if let Err(source) = std::fs::rename(path, &bak) {
            restore(&backups);
            return Err(SnapshotError::Io {
                path: path.clone(),
                source,
            });
        }
        backups.push((path.clone(), bak));
    }

    let mut installed = Vec::with_capacity(targets.len());
    for (tmp, path) in staged.iter().zip(targets) {
        if let Err(source) = std::fs::rename(tmp, path) {
            remove_all(&installed);
            restore(&backups);
            return Err(SnapshotError::Io {
                path: path.clone(),
                source,
            });
        }
        installed.push(path.clone());
    }

    for path in &installed {
        log::info!("Wrote {}", path.display());
    }
    let stale: Vec<PathBuf> = backups.into_iter().map(|(_, bak)| bak).collect();
    remove_all(&stale);
    Ok(())
}

/// Moves backed-up files back to their original names.
fn restore(backups: &[(PathBuf, PathBuf)]) {
    for (path, bak) in backups {
        if let Err(e) = std::fs::rename(bak, path) {
            log::error!(
                "Could not restore {} from {}: {e}",
                path.display(),
                bak.display()
            );
        }
    }
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(extension);
    path.with_file_name(name)
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        if let Err(e) = removed {
            log::debug!("Could not remove {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use geojson::{Feature, Geometry, feature::Id};

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "coverage_map_snapshot_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn square(id: &str) -> FeatureCollection {
        let ring = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0, 0.0],
        ];
        let mut properties = geojson::JsonObject::new();
        properties.insert("name".to_string(), "Lot".into());
        FeatureCollection {
            bbox: None,
            features: vec![Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::Polygon(vec![ring]))),
                id: Some(Id::String(id.to_string())),
                properties: Some(properties),
                foreign_members: None,
            }],
            foreign_members: None,
        }
    }

    #[test]
    fn writes_and_reads_back() {
        let dir = scratch_dir("roundtrip");
        let store = SnapshotStore::new(&dir);
        store.write(&square("way/1"), &square("relation/2")).unwrap();

        assert!(store.targets_path().exists());
        assert!(store.boundary_path().exists());
        assert!(!sibling(&store.targets_path(), "tmp").exists());
        assert!(!sibling(&store.targets_path(), "bak").exists());

        let snapshot = store.read().unwrap();
        assert_eq!(
            snapshot.targets.features[0].id,
            Some(Id::String("way/1".to_string()))
        );
        assert_eq!(
            snapshot.boundary.features[0].properties.as_ref().unwrap()["name"],
            "Lot"
        );

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn overwrites_previous_snapshot() {
        let dir = scratch_dir("overwrite");
        let store = SnapshotStore::new(&dir);
        store.write(&square("way/1"), &square("relation/2")).unwrap();
        store.write(&square("way/3"), &square("relation/2")).unwrap();

        let snapshot = store.read().unwrap();
        assert_eq!(
            snapshot.targets.features[0].id,
            Some(Id::String("way/3".to_string()))
        );

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn failed_swap_keeps_previous_pair() {
        let dir = scratch_dir("failed_swap");
        std::fs::create_dir_all(&dir).unwrap();
        let store = SnapshotStore::new(&dir);
        std::fs::write(store.targets_path(), "OLD TARGETS").unwrap();
        std::fs::write(store.boundary_path(), "OLD BOUNDARY").unwrap();
        // A directory in the way of the boundary backup makes that rename
        // fail after the targets file has already been moved aside.
        let blocker = sibling(&store.boundary_path(), "bak");
        std::fs::create_dir_all(blocker.join("occupied")).unwrap();

        let result = store.write(&square("way/1"), &square("relation/2"));

        assert!(matches!(result, Err(SnapshotError::Io { .. })));
        assert_eq!(
            std::fs::read_to_string(store.targets_path()).unwrap(),
            "OLD TARGETS"
        );
        assert_eq!(
            std::fs::read_to_string(store.boundary_path()).unwrap(),
            "OLD BOUNDARY"
        );
        assert!(!sibling(&store.targets_path(), "tmp").exists());
        assert!(!sibling(&store.boundary_path(), "tmp").exists());
        assert!(!sibling(&store.targets_path(), "bak").exists());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn directory_in_place_of_a_file_is_replaced_as_a_pair() {
        let dir = scratch_dir("dir_in_place");
        let store = SnapshotStore::new(&dir);
        std::fs::create_dir_all(store.boundary_path().join("stale")).unwrap();
        std::fs::write(store.targets_path(), "OLD").unwrap();

        store.write(&square("way/1"), &square("relation/2")).unwrap();

        let snapshot = store.read().unwrap();
        assert_eq!(
            snapshot.targets.features[0].id,
            Some(Id::String("way/1".to_string()))
        );
        assert_eq!(snapshot.boundary.features.len(), 1);
        assert!(!sibling(&store.boundary_path(), "bak").exists());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_snapshot_is_io_error() {
        let store = SnapshotStore::new(scratch_dir("missing"));
        assert!(matches!(store.read(), Err(SnapshotError::Io { .. })));
    }

    #[test]
    fn non_collection_is_rejected() {
        let dir = scratch_dir("invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let store = SnapshotStore::new(&dir);
        std::fs::write(store.targets_path(), r#"{"type":"Point","coordinates":[0,0]}"#).unwrap();
        std::fs::write(store.boundary_path(), r#"{"type":"FeatureCollection","features":[]}"#)
            .unwrap();

        assert!(matches!(store.read(), Err(SnapshotError::GeoJson { .. })));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn area_dir_is_under_snapshots() {
        let store = SnapshotStore::for_area("wilmington");
        assert!(store.dir().ends_with("data/snapshots/wilmington"));
    }
}
