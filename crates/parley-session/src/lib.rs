//! Conversation trackers and the stores that persist them.
mod tracker;
mod tracker_event;
mod tracker_file_store;
mod tracker_store;

pub use tracker::{ConversationMessage, Dialogue, EventVerbosity, Tracker};
pub use tracker_event::TrackerEvent;
pub use tracker_file_store::FileTrackerStore;
pub use tracker_store::{InMemoryTrackerStore, TrackerStore, TrackerStoreError};
