//! Visits every stored conversation, triggering an action where a predicate holds.
//!
//! Each key is processed independently: a failure while loading, evaluating,
//! or acting on one conversation is recorded as that key's outcome and the
//! sweep moves on. Keys are visited once, in enumeration order.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Inactivity after which a conversation counts as stale.
pub const STALE_CONVERSATION_SECONDS: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `SweepStatus` values.
pub enum SweepStatus {
    Triggered,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Result of one conversation within a sweep.
pub struct SweepOutcome {
    pub conversation_ref: String,
    pub status: SweepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SweepOutcome {
    fn new(conversation_ref: &str, status: SweepStatus, detail: Option<String>) -> Self {
        Self {
            conversation_ref: conversation_ref.to_string(),
            status,
            detail,
        }
    }
}

/// Trait contract for `ConversationSweep` behavior.
#[async_trait]
pub trait ConversationSweep: Send + Sync {
    /// Per-conversation state read once and shared by predicate and action.
    type Snapshot: Send;

    async fn load(&self, conversation_ref: &str) -> Result<Self::Snapshot>;

    fn should_trigger(&self, snapshot: &Self::Snapshot) -> Result<bool>;

    /// Runs the action and returns a short confirmation for the caller.
    async fn trigger(&self, conversation_ref: &str, snapshot: Self::Snapshot) -> Result<String>;
}

/// Runs `sweep` over `keys`. With `force` every loaded conversation triggers.
pub async fn run_conversation_sweep<S>(sweep: &S, keys: &[String], force: bool) -> Vec<SweepOutcome>
where
    S: ConversationSweep + ?Sized,
{
    let mut outcomes = Vec::with_capacity(keys.len());
    for key in keys {
        let outcome = sweep_one(sweep, key, force).await;
        if outcome.status == SweepStatus::Failed {
            tracing::warn!(
                conversation_ref = key.as_str(),
                detail = outcome.detail.as_deref().unwrap_or(""),
                "conversation sweep item failed"
            );
        }
        outcomes.push(outcome);
    }
    outcomes
}

async fn sweep_one<S>(sweep: &S, key: &str, force: bool) -> SweepOutcome
where
    S: ConversationSweep + ?Sized,
{
    let snapshot = match sweep.load(key).await {
        Ok(snapshot) => snapshot,
        Err(error) => return SweepOutcome::new(key, SweepStatus::Failed, Some(format!("{error:#}"))),
    };
    if !force {
        match sweep.should_trigger(&snapshot) {
            Ok(true) => {}
            Ok(false) => return SweepOutcome::new(key, SweepStatus::Skipped, None),
            Err(error) => {
                return SweepOutcome::new(key, SweepStatus::Failed, Some(format!("{error:#}")))
            }
        }
    }
    match sweep.trigger(key, snapshot).await {
        Ok(confirmation) => SweepOutcome::new(key, SweepStatus::Triggered, Some(confirmation)),
        Err(error) => SweepOutcome::new(key, SweepStatus::Failed, Some(format!("{error:#}"))),
    }
}

/// Inclusive staleness check against the sweep start time.
pub fn is_stale(latest_event_time: f64, sweep_started_at: f64) -> bool {
    parley_core::elapsed_at_least(sweep_started_at, latest_event_time, STALE_CONVERSATION_SECONDS)
}
