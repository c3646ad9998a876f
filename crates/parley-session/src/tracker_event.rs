//! Conversation events recorded on a tracker.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use parley_core::current_unix_timestamp_f64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
/// Enumerates supported `TrackerEvent` values.
pub enum TrackerEvent {
    User {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        input_channel: Option<String>,
        #[serde(default)]
        parse_data: Option<Value>,
        #[serde(default = "current_unix_timestamp_f64")]
        timestamp: f64,
    },
    Bot {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        data: Option<Value>,
        #[serde(default = "current_unix_timestamp_f64")]
        timestamp: f64,
    },
    Action {
        name: String,
        #[serde(default)]
        policy: Option<String>,
        #[serde(default)]
        confidence: Option<f64>,
        #[serde(default = "current_unix_timestamp_f64")]
        timestamp: f64,
    },
    Slot {
        name: String,
        #[serde(default)]
        value: Value,
        #[serde(default = "current_unix_timestamp_f64")]
        timestamp: f64,
    },
    Restart {
        #[serde(default = "current_unix_timestamp_f64")]
        timestamp: f64,
    },
}

impl TrackerEvent {
    pub fn user(text: impl Into<String>, input_channel: Option<&str>) -> Self {
        Self::User {
            text: Some(text.into()),
            input_channel: input_channel.map(str::to_string),
            parse_data: None,
            timestamp: current_unix_timestamp_f64(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::Bot {
            text: Some(text.into()),
            data: None,
            timestamp: current_unix_timestamp_f64(),
        }
    }

    pub fn action(name: impl Into<String>) -> Self {
        Self::Action {
            name: name.into(),
            policy: None,
            confidence: None,
            timestamp: current_unix_timestamp_f64(),
        }
    }

    pub fn slot(name: impl Into<String>, value: Value) -> Self {
        Self::Slot {
            name: name.into(),
            value,
            timestamp: current_unix_timestamp_f64(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Bot { .. } => "bot",
            Self::Action { .. } => "action",
            Self::Slot { .. } => "slot",
            Self::Restart { .. } => "restart",
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            Self::User { timestamp, .. }
            | Self::Bot { timestamp, .. }
            | Self::Action { timestamp, .. }
            | Self::Slot { timestamp, .. }
            | Self::Restart { timestamp } => *timestamp,
        }
    }

    /// Returns a copy stamped with `timestamp`; used by fixtures and replays.
    pub fn at(mut self, at: f64) -> Self {
        match &mut self {
            Self::User { timestamp, .. }
            | Self::Bot { timestamp, .. }
            | Self::Action { timestamp, .. }
            | Self::Slot { timestamp, .. }
            | Self::Restart { timestamp } => *timestamp = at,
        }
        self
    }

    /// Text carried by user and bot utterances.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::User { text, .. } | Self::Bot { text, .. } => text.as_deref(),
            _ => None,
        }
    }

    /// Parses an event from a request payload; `None` when the payload is not
    /// a recognised event object.
    pub fn from_parameters(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}
