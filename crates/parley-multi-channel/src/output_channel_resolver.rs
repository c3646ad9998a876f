//! Picks the delivery surface for a conversation's replies.
use std::sync::Arc;

use parley_session::Tracker;

use crate::input_channel::InputChannel;
use crate::output_channel::{BotMessage, CollectingOutputChannel, OutputChannel};

pub const OUTPUT_CHANNEL_QUERY_KEY: &str = "output_channel";
pub const LATEST_OUTPUT_CHANNEL: &str = "latest";

#[derive(Clone)]
/// Result of output channel resolution.
pub enum ResolvedOutputChannel {
    Registered {
        name: String,
        channel: Arc<dyn OutputChannel>,
    },
    Collecting(Arc<CollectingOutputChannel>),
}

impl ResolvedOutputChannel {
    pub fn collecting() -> Self {
        Self::Collecting(Arc::new(CollectingOutputChannel::new()))
    }

    pub fn handle(&self) -> Arc<dyn OutputChannel> {
        match self {
            Self::Registered { channel, .. } => channel.clone(),
            Self::Collecting(collector) => {
                let handle: Arc<dyn OutputChannel> = collector.clone();
                handle
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Registered { name, .. } => name.as_str(),
            Self::Collecting(collector) => collector.name(),
        }
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self, Self::Collecting(_))
    }

    /// Buffered replies when resolution fell back to the collector.
    pub fn collected_messages(&self) -> Option<Vec<BotMessage>> {
        match self {
            Self::Registered { .. } => None,
            Self::Collecting(collector) => Some(collector.messages()),
        }
    }
}

impl std::fmt::Debug for ResolvedOutputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedOutputChannel")
            .field("name", &self.name())
            .field("collecting", &self.is_collecting())
            .finish()
    }
}

/// Resolves `requested` against the registered channels.
///
/// The `latest` sentinel is replaced by the input channel of the most recent
/// user message in `snapshot`. The first registered channel with a matching
/// name that provides an output channel wins; otherwise replies are collected.
pub fn resolve_output_channel(
    requested: Option<&str>,
    snapshot: Option<&Tracker>,
    channels: &[Arc<dyn InputChannel>],
) -> ResolvedOutputChannel {
    let requested = requested.map(str::trim).filter(|name| !name.is_empty());
    let target = match (requested, snapshot) {
        (Some(LATEST_OUTPUT_CHANNEL), Some(tracker)) => tracker.latest_input_channel(),
        (other, _) => other,
    };
    let Some(target) = target else {
        return ResolvedOutputChannel::collecting();
    };
    let resolved = channels
        .iter()
        .filter(|channel| channel.name() == target)
        .find_map(|channel| channel.output_channel());
    match resolved {
        Some(channel) => {
            tracing::debug!(channel = target, "resolved registered output channel");
            ResolvedOutputChannel::Registered {
                name: target.to_string(),
                channel,
            }
        }
        None => {
            tracing::debug!(
                requested = target,
                "no registered output channel matched; collecting replies"
            );
            ResolvedOutputChannel::collecting()
        }
    }
}
