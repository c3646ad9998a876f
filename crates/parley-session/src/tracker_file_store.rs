//! One JSON document per conversation under a state directory.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use parley_core::write_text_atomic;

use crate::tracker::Tracker;
use crate::tracker_event::TrackerEvent;
use crate::tracker_store::{TrackerStore, TrackerStoreError};

const TRACKER_RECORD_SCHEMA_VERSION: u32 = 1;
const TRACKER_FILE_EXTENSION: &str = "json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrackerRecord {
    schema_version: u32,
    sender_id: String,
    events: Vec<TrackerEvent>,
}

#[derive(Debug, Clone)]
/// Public struct `FileTrackerStore` used across Parley components.
pub struct FileTrackerStore {
    root: PathBuf,
}

impl FileTrackerStore {
    /// Opens (and creates if missing) the store directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create tracker directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn record_path(&self, sender_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.{TRACKER_FILE_EXTENSION}", encode_sender_id(sender_id)))
    }

    async fn read_record(
        &self,
        path: &Path,
        sender_id: &str,
    ) -> Result<Option<Tracker>, TrackerStoreError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(TrackerStoreError::Io(format!(
                    "failed to read {}: {error}",
                    path.display()
                )))
            }
        };
        let record: TrackerRecord =
            serde_json::from_str(&raw).map_err(|error| TrackerStoreError::Corrupt {
                sender_id: sender_id.to_string(),
                message: error.to_string(),
            })?;
        if record.schema_version != TRACKER_RECORD_SCHEMA_VERSION {
            return Err(TrackerStoreError::Corrupt {
                sender_id: sender_id.to_string(),
                message: format!(
                    "unsupported schema_version {} (expected {})",
                    record.schema_version, TRACKER_RECORD_SCHEMA_VERSION
                ),
            });
        }
        Ok(Some(Tracker::from_events(record.sender_id, record.events)))
    }
}

fn encode_sender_id(sender_id: &str) -> String {
    sender_id
        .as_bytes()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn decode_sender_id(encoded: &str) -> Option<String> {
    if encoded.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..encoded.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(encoded.get(index..index + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl TrackerStore for FileTrackerStore {
    async fn keys(&self) -> Result<Vec<String>, TrackerStoreError> {
        let list_error = |error: std::io::Error| {
            TrackerStoreError::Io(format!("failed to list {}: {error}", self.root.display()))
        };
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(list_error)?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_error)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(TRACKER_FILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match decode_sender_id(stem) {
                Some(sender_id) => keys.push(sender_id),
                None => tracing::warn!(path = %path.display(), "skipping unrecognised tracker file"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn retrieve(&self, sender_id: &str) -> Result<Option<Tracker>, TrackerStoreError> {
        self.read_record(&self.record_path(sender_id), sender_id)
            .await
    }

    async fn save(&self, tracker: &Tracker) -> Result<(), TrackerStoreError> {
        let record = TrackerRecord {
            schema_version: TRACKER_RECORD_SCHEMA_VERSION,
            sender_id: tracker.sender_id().to_string(),
            events: tracker.events().to_vec(),
        };
        let encoded = serde_json::to_string_pretty(&record)
            .map_err(|error| TrackerStoreError::Io(error.to_string()))?;
        write_text_atomic(&self.record_path(tracker.sender_id()), &encoded)
            .await
            .map_err(|error| TrackerStoreError::Io(format!("{error:#}")))
    }

    async fn delete(&self, sender_id: &str) -> Result<bool, TrackerStoreError> {
        let path = self.record_path(sender_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(TrackerStoreError::Io(format!(
                "failed to remove {}: {error}",
                path.display()
            ))),
        }
    }
}
