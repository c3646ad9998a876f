//! Dialogue state for one conversation.
use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tracker_event::TrackerEvent;

const STORY_SKIPPED_ACTION: &str = "action_listen";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How many events a tracker state dump includes.
pub enum EventVerbosity {
    /// No events.
    None,
    /// Events that still affect the current state.
    Applied,
    /// Every event since the most recent restart.
    AfterRestart,
    All,
}

impl EventVerbosity {
    pub const NAMES: [&'static str; 4] = ["NONE", "APPLIED", "AFTER_RESTART", "ALL"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Applied => "APPLIED",
            Self::AfterRestart => "AFTER_RESTART",
            Self::All => "ALL",
        }
    }

    /// Case-insensitive parse of the `include_events` query value.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "APPLIED" => Ok(Self::Applied),
            "AFTER_RESTART" => Ok(Self::AfterRestart),
            "ALL" => Ok(Self::All),
            other => bail!(
                "invalid event verbosity '{other}': expected one of {}",
                Self::NAMES.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Portable event history used to rebuild a tracker from scratch.
pub struct Dialogue {
    pub name: String,
    pub events: Vec<TrackerEvent>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
/// A user or bot utterance as exposed by the message log endpoint.
pub struct ConversationMessage {
    pub author: &'static str,
    pub timestamp: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
/// Public struct `Tracker` used across Parley components.
pub struct Tracker {
    sender_id: String,
    events: Vec<TrackerEvent>,
}

impl Tracker {
    pub fn new(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            events: Vec::new(),
        }
    }

    pub fn from_events(sender_id: impl Into<String>, events: Vec<TrackerEvent>) -> Self {
        Self {
            sender_id: sender_id.into(),
            events,
        }
    }

    pub fn sender_id(&self) -> &str {
        self.sender_id.as_str()
    }

    pub fn events(&self) -> &[TrackerEvent] {
        self.events.as_slice()
    }

    pub fn update(&mut self, event: TrackerEvent) {
        self.events.push(event);
    }

    fn last_restart_index(&self) -> Option<usize> {
        self.events
            .iter()
            .rposition(|event| matches!(event, TrackerEvent::Restart { .. }))
    }

    /// Events recorded after the most recent restart (restart excluded).
    pub fn events_after_restart(&self) -> &[TrackerEvent] {
        match self.last_restart_index() {
            Some(index) => &self.events[index + 1..],
            None => self.events.as_slice(),
        }
    }

    /// Events that still shape the current state. Slot events overwritten by a
    /// later value for the same slot are dropped.
    pub fn applied_events(&self) -> Vec<TrackerEvent> {
        let window = self.events_after_restart();
        window
            .iter()
            .enumerate()
            .filter(|(index, event)| match event {
                TrackerEvent::Slot { name, .. } => !window[index + 1..].iter().any(
                    |later| matches!(later, TrackerEvent::Slot { name: later_name, .. } if later_name == name),
                ),
                _ => true,
            })
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn slots(&self) -> BTreeMap<String, Value> {
        let mut slots = BTreeMap::new();
        for event in self.events_after_restart() {
            if let TrackerEvent::Slot { name, value, .. } = event {
                slots.insert(name.clone(), value.clone());
            }
        }
        slots
    }

    pub fn get_slot(&self, name: &str) -> Option<Value> {
        self.slots().remove(name)
    }

    pub fn latest_message(&self) -> Option<&TrackerEvent> {
        self.events_after_restart()
            .iter()
            .rev()
            .find(|event| matches!(event, TrackerEvent::User { .. }))
    }

    /// Channel that delivered the most recent user message, if recorded.
    pub fn latest_input_channel(&self) -> Option<&str> {
        match self.latest_message()? {
            TrackerEvent::User { input_channel, .. } => input_channel.as_deref(),
            _ => None,
        }
    }

    pub fn latest_event_time(&self) -> Option<f64> {
        self.events.last().map(TrackerEvent::timestamp)
    }

    pub fn latest_action_name(&self) -> Option<&str> {
        self.events_after_restart()
            .iter()
            .rev()
            .find_map(|event| match event {
                TrackerEvent::Action { name, .. } => Some(name.as_str()),
                _ => None,
            })
    }

    /// Copy of this tracker limited to events at or before `until`.
    pub fn travel_back_in_time(&self, until: f64) -> Self {
        Self {
            sender_id: self.sender_id.clone(),
            events: self
                .events
                .iter()
                .filter(|event| event.timestamp() <= until)
                .cloned()
                .collect(),
        }
    }

    pub fn as_dialogue(&self) -> Dialogue {
        Dialogue {
            name: self.sender_id.clone(),
            events: self.events.clone(),
        }
    }

    /// Replaces this tracker's history with `dialogue`'s events.
    pub fn recreate_from_dialogue(&mut self, dialogue: Dialogue) {
        self.events = dialogue.events;
    }

    /// User and bot utterances with non-empty text, oldest first.
    pub fn conversation_messages(&self) -> Vec<ConversationMessage> {
        self.events
            .iter()
            .filter_map(|event| {
                let author = match event {
                    TrackerEvent::User { .. } => "user",
                    TrackerEvent::Bot { .. } => "bot",
                    _ => return None,
                };
                let text = event.text().filter(|text| !text.is_empty())?;
                Some(ConversationMessage {
                    author,
                    timestamp: event.timestamp(),
                    text: text.to_string(),
                })
            })
            .collect()
    }

    /// Renders the conversation since the last restart as a markdown story:
    /// `* intent: text` for user turns and indented `- action` lines for bot
    /// actions and slot changes. Listen actions and bot utterances are left
    /// out since replaying the actions reproduces them.
    pub fn export_story(&self) -> String {
        let mut story = format!("## {}\n", self.sender_id);
        for event in self.events_after_restart() {
            match event {
                TrackerEvent::User {
                    text, parse_data, ..
                } => {
                    let text = text.as_deref().unwrap_or("");
                    let intent = parse_data
                        .as_ref()
                        .and_then(|data| data.pointer("/intent/name"))
                        .and_then(Value::as_str)
                        .filter(|name| !name.is_empty());
                    match intent {
                        Some(intent) => story.push_str(&format!("* {intent}: {text}\n")),
                        None => story.push_str(&format!("* {text}\n")),
                    }
                }
                TrackerEvent::Action { name, .. } if name != STORY_SKIPPED_ACTION => {
                    story.push_str(&format!("    - {name}\n"));
                }
                TrackerEvent::Slot { name, value, .. } => {
                    let mut slot = serde_json::Map::new();
                    slot.insert(name.clone(), value.clone());
                    story.push_str(&format!("    - slot{}\n", Value::Object(slot)));
                }
                _ => {}
            }
        }
        story
    }

    pub fn current_state(&self, verbosity: EventVerbosity) -> Value {
        let events = match verbosity {
            EventVerbosity::None => Value::Null,
            EventVerbosity::Applied => json!(self.applied_events()),
            EventVerbosity::AfterRestart => json!(self.events_after_restart()),
            EventVerbosity::All => json!(self.events),
        };
        json!({
            "sender_id": self.sender_id,
            "slots": self.slots(),
            "latest_message": self.latest_message(),
            "latest_event_time": self.latest_event_time(),
            "latest_input_channel": self.latest_input_channel(),
            "latest_action_name": self.latest_action_name(),
            "events": events,
        })
    }
}
