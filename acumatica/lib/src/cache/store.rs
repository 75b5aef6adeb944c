use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use super::snapshot::{CacheSnapshot, EndpointIdentity, FORMAT_VERSION};
use crate::error::CacheError;

/// Snapshot files in one cache directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

/// Reads only the version so an old format is reported as such rather
/// than as a decode failure.
#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{endpoint}-{location hash}.json` inside the cache directory.
    pub fn path_for(&self, identity: &EndpointIdentity) -> PathBuf {
        let endpoint: String = identity
            .endpoint_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir
            .join(format!("{endpoint}-{:016x}.json", identity.location_hash()))
    }

    /// Reads the snapshot for `identity`; `Ok(None)` when there is none.
    ///
    /// ## Errors
    ///
    /// Returns an error when the file exists but cannot be read or decoded.
    pub fn try_load(&self, identity: &EndpointIdentity) -> Result<Option<CacheSnapshot>, CacheError> {
        let path = self.path_for(identity);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };

        let probe: VersionProbe = serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
            path: path.clone(),
            source,
        })?;
        if probe.format_version != FORMAT_VERSION {
            return Err(CacheError::FormatVersion {
                expected: FORMAT_VERSION,
                found: probe.format_version,
            });
        }

        let snapshot = serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "loaded snapshot");
        Ok(Some(snapshot))
    }

    /// Like [`try_load`](Self::try_load), treating unreadable files as absent.
    pub fn load(&self, identity: &EndpointIdentity) -> Option<CacheSnapshot> {
        match self.try_load(identity) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable snapshot");
                None
            }
        }
    }

    /// Writes a snapshot through a temp file in the same directory and
    /// renames it over the previous one.
    pub fn save(&self, snapshot: &CacheSnapshot) -> Result<PathBuf, CacheError> {
        let path = self.path_for(&snapshot.identity);
        fs::create_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;

        let json = serde_json::to_vec(snapshot).map_err(|source| CacheError::Corrupt {
            path: path.clone(),
            source,
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;
        temp.write_all(&json).map_err(|e| CacheError::io(temp.path(), e))?;
        temp.flush().map_err(|e| CacheError::io(temp.path(), e))?;
        temp.persist(&path)?;

        debug!(path = %path.display(), bytes = json.len(), "persisted snapshot");
        Ok(path)
    }

    /// Snapshot files currently in the directory.
    pub fn entries(&self) -> Result<Vec<PathBuf>, CacheError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.dir, e)),
        };
        let mut entries = Vec::new();
        for entry in read_dir {
            let path = entry.map_err(|e| CacheError::io(&self.dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                entries.push(path);
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Deletes every snapshot file; returns how many were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let entries = self.entries()?;
        for path in &entries {
            fs::remove_file(path).map_err(|e| CacheError::io(path, e))?;
        }
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn snapshot(identity: EndpointIdentity) -> CacheSnapshot {
        let mut model_hashes = BTreeMap::new();
        model_hashes.insert("Contact".to_string(), 7);
        CacheSnapshot {
            format_version: FORMAT_VERSION,
            created_at: 42,
            identity,
            schema_hash: 1,
            inquiry_document_hash: Some(2),
            model_hashes,
            service_hashes: BTreeMap::new(),
            inquiry_hashes: BTreeMap::new(),
            models: BTreeMap::new(),
            services: BTreeMap::new(),
            inquiries: BTreeMap::new(),
        }
    }

    fn identity() -> EndpointIdentity {
        EndpointIdentity::new("https://erp.example.com/", "Company", "Default", "24.200.001")
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested"));
        let saved = snapshot(identity());
        let path = store.save(&saved).unwrap();

        assert!(path.starts_with(store.dir()));
        assert_eq!(store.load(&identity()), Some(saved));
        assert_eq!(store.entries().unwrap(), vec![path]);
    }

    #[test]
    fn test_missing_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.try_load(&identity()).unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_corrupt_and_load_recovers() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::write(store.path_for(&identity()), b"\x00\x01 not json").unwrap();

        let err = store.try_load(&identity()).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
        assert_eq!(store.load(&identity()), None);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_unreadable_snapshot_is_logged() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::write(store.path_for(&identity()), b"{").unwrap();

        assert_eq!(store.load(&identity()), None);
        assert!(logs_contain("ignoring unreadable snapshot"));
    }

    #[test]
    fn test_old_format_version() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::write(store.path_for(&identity()), br#"{"format_version": 0}"#).unwrap();

        let err = store.try_load(&identity()).unwrap_err();
        assert!(matches!(err, CacheError::FormatVersion { expected: 1, found: 0 }));
    }

    #[test]
    fn test_clear_removes_snapshots_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.save(&snapshot(identity())).unwrap();
        fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.entries().unwrap().is_empty());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_clear_missing_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("absent"));
        assert_eq!(store.clear().unwrap(), 0);
    }
}
