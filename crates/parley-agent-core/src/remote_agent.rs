//! Dialogue agent backed by an upstream HTTP runtime.
//!
//! The upstream exposes `POST /model/parse` (text to parse data),
//! `POST /model/predict` (tracker to action scores), `POST /webhook`
//! (execute one action, returning new events and bot responses) and
//! `GET /domain` (the loaded model's domain as JSON).
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use parley_core::current_unix_timestamp_f64;
use parley_multi_channel::{BotMessage, OutputChannel};
use parley_session::{EventVerbosity, Tracker, TrackerEvent};

use crate::dialogue_agent::{
    ActionHints, AgentError, DialogueAgent, Prediction, UserMessage, ACTION_LISTEN_NAME,
    ACTION_RESTART_NAME,
};

const PARSE_ENDPOINT: &str = "/model/parse";
const PREDICT_ENDPOINT: &str = "/model/predict";
const WEBHOOK_ENDPOINT: &str = "/webhook";
const DOMAIN_ENDPOINT: &str = "/domain";
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;
const MAX_ACTIONS_PER_TURN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `RemoteDialogueAgentConfig` used across Parley components.
pub struct RemoteDialogueAgentConfig {
    pub base_url: String,
    pub fingerprint: Option<String>,
    pub http_timeout_ms: u64,
}

impl RemoteDialogueAgentConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            fingerprint: None,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ActionExecutionResponse {
    #[serde(default)]
    events: Vec<Value>,
    #[serde(default)]
    responses: Vec<BotResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct BotResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Clone)]
/// Public struct `RemoteDialogueAgent` used across Parley components.
pub struct RemoteDialogueAgent {
    base_url: String,
    fingerprint: String,
    client: reqwest::Client,
}

impl RemoteDialogueAgent {
    pub fn new(config: RemoteDialogueAgentConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            bail!("remote dialogue agent requires a non-empty base url");
        }
        if config.http_timeout_ms == 0 {
            bail!("remote dialogue agent requires http timeout > 0");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .context("failed to build dialogue agent http client")?;
        let fingerprint = config
            .fingerprint
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| base_url.clone());
        Ok(Self {
            base_url,
            fingerprint,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AgentError> {
        let response = request
            .send()
            .await
            .map_err(|error| AgentError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AgentError::Remote {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|error| AgentError::InvalidResponse(format!("{endpoint}: {error}")))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<T, AgentError> {
        let url = format!("{}{endpoint}", self.base_url);
        self.read_json(endpoint, self.client.post(&url).json(body))
            .await
    }

    async fn parse_message(&self, text: &str) -> Result<Value, AgentError> {
        self.post_json(PARSE_ENDPOINT, &json!({ "text": text })).await
    }

    async fn record_user_message(
        &self,
        tracker: &mut Tracker,
        message: UserMessage,
    ) -> Result<(), AgentError> {
        let parse_data = match message.parse_data {
            Some(parse_data) => parse_data,
            None => self.parse_message(&message.text).await?,
        };
        tracker.update(TrackerEvent::User {
            text: Some(message.text),
            input_channel: message.input_channel,
            parse_data: Some(parse_data),
            timestamp: current_unix_timestamp_f64(),
        });
        Ok(())
    }
}

#[async_trait]
impl DialogueAgent for RemoteDialogueAgent {
    fn fingerprint(&self) -> &str {
        self.fingerprint.as_str()
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn handle_text(
        &self,
        tracker: &mut Tracker,
        message: UserMessage,
        output_channel: Arc<dyn OutputChannel>,
    ) -> Result<(), AgentError> {
        self.record_user_message(tracker, message).await?;
        for _ in 0..MAX_ACTIONS_PER_TURN {
            let prediction = self.predict_next(tracker).await?;
            let best = prediction.best().ok_or(AgentError::NoPrediction)?;
            let action = best.action.clone();
            let hints = ActionHints {
                policy: prediction.policy.as_deref(),
                confidence: Some(best.score),
            };
            self.execute_action(tracker, &action, output_channel.clone(), hints)
                .await?;
            if action == ACTION_LISTEN_NAME {
                return Ok(());
            }
        }
        tracing::warn!(
            sender_id = tracker.sender_id(),
            limit = MAX_ACTIONS_PER_TURN,
            "dialogue agent reached the per-turn action limit"
        );
        Ok(())
    }

    async fn log_message(
        &self,
        tracker: &mut Tracker,
        message: UserMessage,
    ) -> Result<(), AgentError> {
        self.record_user_message(tracker, message).await
    }

    async fn execute_action(
        &self,
        tracker: &mut Tracker,
        action: &str,
        output_channel: Arc<dyn OutputChannel>,
        hints: ActionHints<'_>,
    ) -> Result<(), AgentError> {
        let action_event = TrackerEvent::Action {
            name: action.to_string(),
            policy: hints.policy.map(str::to_string),
            confidence: hints.confidence,
            timestamp: current_unix_timestamp_f64(),
        };
        if action == ACTION_LISTEN_NAME {
            tracker.update(action_event);
            return Ok(());
        }
        if action == ACTION_RESTART_NAME {
            tracker.update(action_event);
            tracker.update(TrackerEvent::Restart {
                timestamp: current_unix_timestamp_f64(),
            });
            return Ok(());
        }

        let response: ActionExecutionResponse = self
            .post_json(
                WEBHOOK_ENDPOINT,
                &json!({
                    "next_action": action,
                    "sender_id": tracker.sender_id(),
                    "tracker": tracker.current_state(EventVerbosity::AfterRestart),
                }),
            )
            .await?;
        tracker.update(action_event);
        for raw in &response.events {
            match TrackerEvent::from_parameters(raw) {
                Some(event) => tracker.update(event),
                None => tracing::warn!(action, "ignoring unrecognised event from action"),
            }
        }
        for bot_response in response.responses {
            let message = BotMessage {
                recipient_id: tracker.sender_id().to_string(),
                text: bot_response.text.clone(),
                data: bot_response.data.clone(),
            };
            output_channel.send_response(message).await?;
            tracker.update(TrackerEvent::Bot {
                text: bot_response.text,
                data: bot_response.data,
                timestamp: current_unix_timestamp_f64(),
            });
        }
        Ok(())
    }

    async fn predict_next(&self, tracker: &Tracker) -> Result<Prediction, AgentError> {
        let prediction: Prediction = self
            .post_json(
                PREDICT_ENDPOINT,
                &json!({
                    "sender_id": tracker.sender_id(),
                    "tracker": tracker.current_state(EventVerbosity::AfterRestart),
                }),
            )
            .await?;
        Ok(prediction.ranked())
    }

    async fn domain(&self) -> Result<Value, AgentError> {
        let url = format!("{}{DOMAIN_ENDPOINT}", self.base_url);
        self.read_json(DOMAIN_ENDPOINT, self.client.get(&url)).await
    }
}
