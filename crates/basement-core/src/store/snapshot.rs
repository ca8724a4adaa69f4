//! Snapshot persistence for the memory store
//!
//! When `persist` is enabled the memory store keeps a JSON snapshot of its
//! entries on disk and rewrites it after every successful write.
//!
//! Storage location: `{data_dir}/store.json` (see [`Config::snapshot_path`])
//!
//! [`Config::snapshot_path`]: crate::config::Config::snapshot_path

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Cas;
use crate::error::{BasementError, Result};

/// One stored key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub value: String,
    pub cas: Cas,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// On-disk form of the memory store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Last CAS handed out
    pub last_cas: u64,
    pub entries: BTreeMap<String, Entry>,
}

impl Snapshot {
    /// Load a snapshot; `None` if the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)?;
        let snapshot = serde_json::from_str(&content).map_err(|e| BasementError::Snapshot {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

        Ok(Some(snapshot))
    }

    /// Write the snapshot atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| BasementError::Snapshot {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        atomic_write(path, &json)
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot {
            last_cas: 7,
            entries: BTreeMap::new(),
        };
        snapshot.entries.insert(
            "u1".to_string(),
            Entry {
                value: r#"{"name":"a"}"#.to_string(),
                cas: Cas::new(7),
                expires_at: None,
            },
        );
        snapshot
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");

        assert!(Snapshot::load(&path).unwrap().is_none());

        sample().save(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded, sample());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a").join("b").join("store.json");

        sample().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_corrupt_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        let err = Snapshot::load(&path).unwrap_err();
        assert!(matches!(err, BasementError::Snapshot { .. }));
    }

    #[test]
    fn test_entry_expiry() {
        let now = Utc::now();
        let mut entry = sample().entries.remove("u1").unwrap();
        assert!(!entry.is_expired(now));

        entry.expires_at = Some(now);
        assert!(entry.is_expired(now));

        entry.expires_at = Some(now + chrono::Duration::seconds(5));
        assert!(!entry.is_expired(now));
    }
}
