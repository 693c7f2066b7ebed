//! Atomic JSON file I/O
//!
//! All durable writes go through `atomic_write_json`: serialize to a temp
//! file in the target directory, fsync, then rename over the live file. A
//! crash mid-write leaves the previous document intact.

use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .map_err(|e| Error::PersistWriteFailed(format!("create {}: {e}", path.display())))
}

pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::PersistWriteFailed(format!("no parent for {}", path.display())))?;
    ensure_dir(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| Error::PersistWriteFailed(format!("temp file in {}: {e}", parent.display())))?;

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::PersistWriteFailed(format!("serialize {}: {e}", path.display())))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::PersistWriteFailed(format!("write {}: {e}", path.display())))?;

    tmp.persist(path)
        .map_err(|e| Error::PersistWriteFailed(format!("rename into {}: {e}", path.display())))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Serialization(format!("parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        atomic_write_json(&path, &json!({"a": 1})).unwrap();
        let value: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(value["a"], 1);
        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_overwrite_replaces_whole_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        atomic_write_json(&path, &json!({"version": 1, "extra": true})).unwrap();
        atomic_write_json(&path, &json!({"version": 2})).unwrap();
        let value: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(value, json!({"version": 2}));
    }
}
