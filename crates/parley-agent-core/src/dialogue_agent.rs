//! Contract for the dialogue runtime that decides and executes bot actions.
use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use parley_multi_channel::{ChannelError, OutputChannel};
use parley_session::Tracker;

pub const ACTION_LISTEN_NAME: &str = "action_listen";
pub const ACTION_RESTART_NAME: &str = "action_restart";

/// Enumerates supported `AgentError` values.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("dialogue agent is not ready")]
    NotReady,
    #[error("dialogue agent request to {endpoint} failed with status {status}: {message}")]
    Remote {
        endpoint: String,
        status: u16,
        message: String,
    },
    #[error("dialogue agent transport error: {0}")]
    Transport(String),
    #[error("dialogue agent returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("dialogue agent predicted no actions")]
    NoPrediction,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Public struct `ActionScore` used across Parley components.
pub struct ActionScore {
    pub action: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
/// Next-action probabilities for a conversation.
pub struct Prediction {
    #[serde(default)]
    pub scores: Vec<ActionScore>,
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl Prediction {
    /// Scores ordered by descending score, ties broken by action name.
    pub fn ranked(mut self) -> Self {
        self.scores.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.action.cmp(&right.action))
        });
        self
    }

    pub fn best(&self) -> Option<&ActionScore> {
        self.scores.iter().max_by(|left, right| {
            left.score
                .partial_cmp(&right.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| right.action.cmp(&left.action))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A user utterance entering the dialogue runtime.
pub struct UserMessage {
    pub text: String,
    pub input_channel: Option<String>,
    pub parse_data: Option<Value>,
}

impl UserMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            input_channel: None,
            parse_data: None,
        }
    }

    pub fn with_input_channel(mut self, input_channel: Option<&str>) -> Self {
        self.input_channel = input_channel.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
/// Optional hints recorded alongside an executed action.
pub struct ActionHints<'a> {
    pub policy: Option<&'a str>,
    pub confidence: Option<f64>,
}

/// Trait contract for `DialogueAgent` behavior.
///
/// Implementations mutate the supplied tracker in place; persisting it is the
/// caller's responsibility.
#[async_trait]
pub trait DialogueAgent: Send + Sync {
    /// Identifier of the loaded model.
    fn fingerprint(&self) -> &str;

    fn is_ready(&self) -> bool;

    /// Records `message` and runs the bot's actions until it listens again.
    async fn handle_text(
        &self,
        tracker: &mut Tracker,
        message: UserMessage,
        output_channel: Arc<dyn OutputChannel>,
    ) -> Result<(), AgentError>;

    /// Records `message` without predicting or executing any action.
    async fn log_message(&self, tracker: &mut Tracker, message: UserMessage)
        -> Result<(), AgentError>;

    async fn execute_action(
        &self,
        tracker: &mut Tracker,
        action: &str,
        output_channel: Arc<dyn OutputChannel>,
        hints: ActionHints<'_>,
    ) -> Result<(), AgentError>;

    async fn predict_next(&self, tracker: &Tracker) -> Result<Prediction, AgentError>;

    /// Intents, actions, slots and templates of the loaded model.
    async fn domain(&self) -> Result<Value, AgentError>;
}
