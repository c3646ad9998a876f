//! Delivery surfaces for bot replies.
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const COLLECTING_CHANNEL_NAME: &str = "collector";
const CALLBACK_HTTP_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Public struct `BotMessage` used across Parley components.
pub struct BotMessage {
    pub recipient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl BotMessage {
    pub fn text(recipient_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            text: Some(text.into()),
            data: None,
        }
    }
}

#[derive(Debug, Error)]
/// Enumerates supported `ChannelError` values.
pub enum ChannelError {
    #[error("channel '{channel}' rejected delivery with status {status}")]
    Rejected { channel: String, status: u16 },
    #[error("channel '{channel}' transport failed: {message}")]
    Transport { channel: String, message: String },
    #[error("channel '{channel}' buffer lock poisoned")]
    Poisoned { channel: String },
}

/// Trait contract for `OutputChannel` behavior.
#[async_trait]
pub trait OutputChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send_response(&self, message: BotMessage) -> Result<(), ChannelError>;

    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), ChannelError> {
        self.send_response(BotMessage::text(recipient_id, text)).await
    }
}

#[derive(Debug, Default)]
/// Buffers every reply so the caller can return them synchronously.
pub struct CollectingOutputChannel {
    messages: Mutex<Vec<BotMessage>>,
}

impl CollectingOutputChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<BotMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn latest_message(&self) -> Option<BotMessage> {
        self.messages
            .lock()
            .ok()
            .and_then(|messages| messages.last().cloned())
    }
}

#[async_trait]
impl OutputChannel for CollectingOutputChannel {
    fn name(&self) -> &str {
        COLLECTING_CHANNEL_NAME
    }

    async fn send_response(&self, message: BotMessage) -> Result<(), ChannelError> {
        let mut messages = self.messages.lock().map_err(|_| ChannelError::Poisoned {
            channel: COLLECTING_CHANNEL_NAME.to_string(),
        })?;
        messages.push(message);
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Posts each reply as JSON to a configured webhook URL.
pub struct CallbackOutputChannel {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl CallbackOutputChannel {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(CALLBACK_HTTP_TIMEOUT_MS))
            .build()
            .with_context(|| format!("failed to build http client for channel '{name}'"))?;
        Ok(Self {
            name,
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl OutputChannel for CallbackOutputChannel {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    async fn send_response(&self, message: BotMessage) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|error| ChannelError::Transport {
                channel: self.name.clone(),
                message: error.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Rejected {
                channel: self.name.clone(),
                status: status.as_u16(),
            });
        }
        tracing::debug!(
            channel = self.name.as_str(),
            recipient_id = message.recipient_id.as_str(),
            "delivered reply via callback"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use super::{BotMessage, CallbackOutputChannel, ChannelError, CollectingOutputChannel, OutputChannel};

    #[tokio::test]
    async fn unit_collecting_output_channel_buffers_in_order() {
        let channel = CollectingOutputChannel::new();
        channel.send_text("alice", "first").await.expect("first");
        channel.send_text("alice", "second").await.expect("second");
        let messages = channel.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text.as_deref(), Some("first"));
        assert_eq!(
            channel.latest_message().and_then(|message| message.text),
            Some("second".to_string())
        );
    }

    #[tokio::test]
    async fn functional_callback_output_channel_posts_json_payload() {
        let server = MockServer::start();
        let hook = server.mock(|when, then| {
            when.method(POST)
                .path("/hook")
                .json_body(json!({"recipient_id": "alice", "text": "hello"}));
            then.status(200);
        });
        let channel =
            CallbackOutputChannel::new("callback", server.url("/hook")).expect("channel");
        channel.send_text("alice", "hello").await.expect("deliver");
        hook.assert_calls(1);
    }

    #[tokio::test]
    async fn regression_callback_output_channel_surfaces_non_success_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/hook");
            then.status(502);
        });
        let channel =
            CallbackOutputChannel::new("callback", server.url("/hook")).expect("channel");
        let error = channel
            .send_response(BotMessage::text("bob", "hi"))
            .await
            .expect_err("rejected");
        assert!(matches!(error, ChannelError::Rejected { status: 502, .. }));
    }
}
