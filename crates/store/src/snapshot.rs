//! JSON snapshot persistence for [`MemoryStore`](crate::MemoryStore)
//!
//! The whole store is written as one JSON file. Writes go to a sibling temp
//! file which is then renamed over the target, so a crash mid-write leaves
//! the previous snapshot intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use labcheck_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::memory::Collection;

/// Current snapshot format version.
const SNAPSHOT_FORMAT: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    format: u32,
    collections: BTreeMap<String, Collection>,
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Load a snapshot. A missing file is an empty store.
pub(crate) fn load(path: &Path) -> Result<BTreeMap<String, Collection>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)?;
    let file: SnapshotFile = serde_json::from_str(&content).map_err(|e| {
        Error::Serialization(format!("invalid snapshot {}: {}", path.display(), e))
    })?;
    if file.format != SNAPSHOT_FORMAT {
        return Err(Error::Serialization(format!(
            "unsupported snapshot format {} in {} (expected {})",
            file.format,
            path.display(),
            SNAPSHOT_FORMAT
        )));
    }
    Ok(file.collections)
}

/// Atomically write a snapshot, creating parent directories as needed.
pub(crate) fn save(path: &Path, collections: &BTreeMap<String, Collection>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = SnapshotFile {
        format: SNAPSHOT_FORMAT,
        collections: collections.clone(),
    };
    let bytes = serde_json::to_vec_pretty(&file)?;

    let tmp = temp_path(path);
    {
        let mut out = fs::File::create(&tmp)?;
        out.write_all(&bytes)?;
        out.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labcheck_core::into_document;
    use serde_json::json;

    fn sample() -> BTreeMap<String, Collection> {
        let mut collections = BTreeMap::new();
        collections.insert(
            "stores".to_string(),
            Collection {
                documents: vec![into_document(json!({"_id": 1, "name": "Downtown"})).unwrap()],
                indexes: Vec::new(),
            },
        );
        collections
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("none.json")).unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        save(&path, &sample()).unwrap();
        assert!(!temp_path(&path).exists());
        let loaded = load(&path).unwrap();
        assert_eq!(loaded["stores"].documents[0]["name"], json!("Downtown"));
    }

    #[test]
    fn test_rejects_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"format": 99, "collections": {}}"#).unwrap();
        assert!(matches!(load(&path), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();
        assert!(load(&path).is_err());
    }
}
