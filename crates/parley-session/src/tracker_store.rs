//! Keyed conversation persistence consumed by the gateway.
use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::tracker::Tracker;

#[derive(Debug, Error)]
/// Enumerates supported `TrackerStoreError` values.
pub enum TrackerStoreError {
    #[error("tracker store lock poisoned")]
    Poisoned,
    #[error("tracker '{sender_id}' has a corrupt record: {message}")]
    Corrupt { sender_id: String, message: String },
    #[error("tracker store io error: {0}")]
    Io(String),
}

/// Trait contract for `TrackerStore` behavior.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Every stored conversation key, in a stable enumeration order.
    async fn keys(&self) -> Result<Vec<String>, TrackerStoreError>;

    async fn retrieve(&self, sender_id: &str) -> Result<Option<Tracker>, TrackerStoreError>;

    async fn save(&self, tracker: &Tracker) -> Result<(), TrackerStoreError>;

    async fn delete(&self, sender_id: &str) -> Result<bool, TrackerStoreError>;

    /// A fresh, unsaved tracker for `sender_id`.
    async fn init_tracker(&self, sender_id: &str) -> Result<Tracker, TrackerStoreError> {
        Ok(Tracker::new(sender_id))
    }

    /// Loads the tracker for `sender_id`, creating and saving an empty one
    /// when none exists yet.
    async fn get_or_create_tracker(&self, sender_id: &str) -> Result<Tracker, TrackerStoreError> {
        if let Some(tracker) = self.retrieve(sender_id).await? {
            return Ok(tracker);
        }
        let tracker = self.init_tracker(sender_id).await?;
        self.save(&tracker).await?;
        tracing::debug!(sender_id, "created new tracker");
        Ok(tracker)
    }
}

#[derive(Debug, Default)]
/// Public struct `InMemoryTrackerStore` used across Parley components.
pub struct InMemoryTrackerStore {
    trackers: Mutex<BTreeMap<String, Tracker>>,
}

impl InMemoryTrackerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackerStore for InMemoryTrackerStore {
    async fn keys(&self) -> Result<Vec<String>, TrackerStoreError> {
        let trackers = self
            .trackers
            .lock()
            .map_err(|_| TrackerStoreError::Poisoned)?;
        Ok(trackers.keys().cloned().collect())
    }

    async fn retrieve(&self, sender_id: &str) -> Result<Option<Tracker>, TrackerStoreError> {
        let trackers = self
            .trackers
            .lock()
            .map_err(|_| TrackerStoreError::Poisoned)?;
        Ok(trackers.get(sender_id).cloned())
    }

    async fn save(&self, tracker: &Tracker) -> Result<(), TrackerStoreError> {
        let mut trackers = self
            .trackers
            .lock()
            .map_err(|_| TrackerStoreError::Poisoned)?;
        trackers.insert(tracker.sender_id().to_string(), tracker.clone());
        Ok(())
    }

    async fn delete(&self, sender_id: &str) -> Result<bool, TrackerStoreError> {
        let mut trackers = self
            .trackers
            .lock()
            .map_err(|_| TrackerStoreError::Poisoned)?;
        Ok(trackers.remove(sender_id).is_some())
    }
}
