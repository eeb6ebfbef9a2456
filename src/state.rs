//! Checkpoint persistence for in-flight jobs.
//!
//! The checkpoint is a single JSON document, `{"jobs": [...]}`, holding one
//! entry per tracked job. Entries are written as raw JSON values so a
//! checkpoint produced by a newer build (with extra fields) still restores:
//! the caller deserializes each entry and decides what to keep. Writes go
//! through a temp file and rename so a crash mid-write never truncates the
//! previous checkpoint.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::warn;

use crate::error::StateError;

#[derive(Debug, Serialize, Deserialize, Default)]
struct CheckpointDocument {
    jobs: Vec<Value>,
}

/// A checkpoint file on disk.
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the checkpoint, creating an empty one if the file is absent.
    ///
    /// Entries missing an `opId` are skipped with a warning, as are
    /// duplicate `opId`s (first occurrence wins).
    pub async fn read(&self) -> Result<Vec<Value>, StateError> {
        if fs::metadata(&self.path).await.is_err() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    StateError::DirectoryCreationFailed(format!(
                        "{}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            self.write(&[]).await?;
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path).await?;
        let document: CheckpointDocument = serde_json::from_str(&raw)?;

        let mut seen = std::collections::HashSet::new();
        let mut entries = Vec::new();
        for entry in document.jobs {
            let Some(op_id) = entry.get("opId").and_then(Value::as_str) else {
                warn!(path = %self.path.display(), "Skipping checkpoint entry without opId");
                continue;
            };
            if !seen.insert(op_id.to_string()) {
                warn!(op_id = op_id, "Skipping duplicate checkpoint entry");
                continue;
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Atomically replaces the checkpoint with the given entries.
    pub async fn write(&self, entries: &[Value]) -> Result<(), StateError> {
        let document = CheckpointDocument {
            jobs: entries.to_vec(),
        };
        let serialized = serde_json::to_string_pretty(&document)?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serialized).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_created_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("agent.json");
        let checkpoint = CheckpointFile::new(&path);

        let entries = checkpoint.read().await.unwrap();
        assert!(entries.is_empty());
        assert!(path.exists());

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["jobs"], json!([]));
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_entries() {
        let dir = tempdir().unwrap();
        let checkpoint = CheckpointFile::new(dir.path().join("agent.json"));

        let entries = vec![
            json!({"opId": "op-1", "done": false}),
            json!({"opId": "op-2", "done": true, "extraField": 7}),
        ];
        checkpoint.write(&entries).await.unwrap();

        let restored = checkpoint.read().await.unwrap();
        assert_eq!(restored, entries);
    }

    #[tokio::test]
    async fn test_read_skips_malformed_and_duplicate_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(
            &path,
            serde_json::to_string(&json!({
                "jobs": [
                    {"opId": "op-1", "done": false},
                    {"done": true},
                    {"opId": "op-1", "done": true},
                    {"opId": "op-2", "done": false},
                ]
            }))
            .unwrap(),
        )
        .unwrap();

        let checkpoint = CheckpointFile::new(&path);
        let restored = checkpoint.read().await.unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0]["opId"], "op-1");
        assert_eq!(restored[0]["done"], json!(false));
        assert_eq!(restored[1]["opId"], "op-2");
    }

    #[tokio::test]
    async fn test_write_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let checkpoint = CheckpointFile::new(dir.path().join("agent.json"));

        checkpoint
            .write(&[json!({"opId": "op-1"}), json!({"opId": "op-2"})])
            .await
            .unwrap();
        checkpoint.write(&[json!({"opId": "op-3"})]).await.unwrap();

        let restored = checkpoint.read().await.unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0]["opId"], "op-3");
    }
}
