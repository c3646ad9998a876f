//! Bulk operations that sweep every stored conversation.
use anyhow::anyhow;
use async_trait::async_trait;

use parley_access::SweepOperationSpec;
use parley_agent_core::{ActionHints, UserMessage};
use parley_core::current_unix_timestamp_f64;
use parley_multi_channel::{resolve_output_channel, InputChannel, ResolvedOutputChannel};
use parley_session::Tracker;

use super::types::{ConditionalMessageRequest, ResumeConversationsRequest};
use super::*;
use crate::conversation_sweep::{
    is_stale, run_conversation_sweep, ConversationSweep, SweepOutcome, SweepStatus,
};

/// Dispatches a message to conversations whose slot holds a given value.
struct SlotConditionSweep<'a> {
    store: Arc<dyn TrackerStore>,
    agent: Arc<dyn DialogueAgent>,
    channels: &'a [Arc<dyn InputChannel>],
    requested_channel: Option<&'a str>,
    slot_name: &'a str,
    slot_value: &'a Value,
    message: &'a str,
}

#[async_trait]
impl<'a> ConversationSweep for SlotConditionSweep<'a> {
    type Snapshot = Tracker;

    async fn load(&self, conversation_ref: &str) -> anyhow::Result<Tracker> {
        Ok(self.store.get_or_create_tracker(conversation_ref).await?)
    }

    fn should_trigger(&self, tracker: &Tracker) -> anyhow::Result<bool> {
        // An unset slot compares as null.
        let current = tracker.get_slot(self.slot_name).unwrap_or(Value::Null);
        Ok(slot_value_matches(&current, self.slot_value))
    }

    async fn trigger(&self, conversation_ref: &str, mut tracker: Tracker) -> anyhow::Result<String> {
        let output =
            resolve_output_channel(self.requested_channel, Some(&tracker), self.channels);
        let input_channel = registered_channel_name(&output);
        let message = UserMessage::new(self.message).with_input_channel(input_channel);
        self.agent
            .handle_text(&mut tracker, message, output.handle())
            .await?;
        self.store.save(&tracker).await?;
        Ok(format!(
            "Message {} handled for {conversation_ref}",
            self.message
        ))
    }
}

/// Re-engages conversations idle for at least a day by executing an action.
struct StaleConversationSweep<'a> {
    store: Arc<dyn TrackerStore>,
    agent: Arc<dyn DialogueAgent>,
    channels: &'a [Arc<dyn InputChannel>],
    requested_channel: Option<&'a str>,
    action: &'a str,
    policy: Option<&'a str>,
    confidence: Option<f64>,
    started_at: f64,
}

#[async_trait]
impl<'a> ConversationSweep for StaleConversationSweep<'a> {
    type Snapshot = Tracker;

    async fn load(&self, conversation_ref: &str) -> anyhow::Result<Tracker> {
        Ok(self.store.get_or_create_tracker(conversation_ref).await?)
    }

    fn should_trigger(&self, tracker: &Tracker) -> anyhow::Result<bool> {
        let latest = tracker
            .latest_event_time()
            .ok_or_else(|| anyhow!("conversation has no events"))?;
        Ok(is_stale(latest, self.started_at))
    }

    async fn trigger(&self, conversation_ref: &str, tracker: Tracker) -> anyhow::Result<String> {
        // Replay into a fresh tracker so stores that hand out shared state are
        // never mutated through the scanned snapshot.
        let mut fresh = self.store.init_tracker(conversation_ref).await?;
        fresh.recreate_from_dialogue(tracker.as_dialogue());
        let output = resolve_output_channel(self.requested_channel, Some(&fresh), self.channels);
        let hints = ActionHints {
            policy: self.policy,
            confidence: self.confidence,
        };
        self.agent
            .execute_action(&mut fresh, self.action, output.handle(), hints)
            .await?;
        self.store.save(&fresh).await?;
        Ok("Action trigger sent".to_string())
    }
}

/// JSON equality, except that an integer and a float holding the same number
/// match (`3` equals `3.0`).
fn slot_value_matches(current: &Value, expected: &Value) -> bool {
    match (current, expected) {
        (Value::Number(current), Value::Number(expected)) => {
            current == expected
                || ((current.is_f64() || expected.is_f64())
                    && current.as_f64() == expected.as_f64())
        }
        _ => current == expected,
    }
}

/// Parses a sweep body and reads the force flag from the field the sweep
/// declares.
fn parse_sweep_body<T: DeserializeOwned>(
    spec: &SweepOperationSpec,
    body: &Bytes,
) -> Result<(T, bool), GatewayApiError> {
    let raw = parse_json_body::<Value>(body)?;
    let Some(force) = spec.force_requested(&raw) else {
        return Err(GatewayApiError::invalid_parameter(
            StatusCode::BAD_REQUEST,
            spec.force_field,
            "body",
            format!("'{}' must be a boolean", spec.force_field),
        ));
    };
    let request = serde_json::from_value::<T>(raw).map_err(|error| {
        GatewayApiError::invalid_parameter(
            StatusCode::BAD_REQUEST,
            "",
            "body",
            format!("failed to parse request body: {error}"),
        )
    })?;
    Ok((request, force))
}

fn registered_channel_name(output: &ResolvedOutputChannel) -> Option<&str> {
    match output {
        ResolvedOutputChannel::Registered { name, .. } => Some(name.as_str()),
        ResolvedOutputChannel::Collecting(_) => None,
    }
}

fn sweep_response(outcomes: &[SweepOutcome]) -> Response {
    let triggered = outcomes
        .iter()
        .filter(|outcome| outcome.status == SweepStatus::Triggered)
        .map(|outcome| {
            (
                outcome.conversation_ref.clone(),
                Value::String(outcome.detail.clone().unwrap_or_default()),
            )
        })
        .collect::<serde_json::Map<String, Value>>();
    json_response(
        StatusCode::OK,
        json!({
            "outcomes": outcomes,
            "triggered": triggered,
        }),
    )
}

fn log_sweep_finished(spec: &SweepOperationSpec, outcomes: &[SweepOutcome]) {
    let count = |status: SweepStatus| {
        outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    };
    tracing::info!(
        operation = spec.operation.name,
        predicate = spec.predicate.as_str(),
        scanned = outcomes.len(),
        triggered = count(SweepStatus::Triggered),
        skipped = count(SweepStatus::Skipped),
        failed = count(SweepStatus::Failed),
        "conversation sweep finished"
    );
}

pub(super) async fn handle_message_with_condition(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Query(query): Query<QueryArgs>,
    body: Bytes,
) -> Response {
    message_with_condition(&state, &headers, &query, &body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn message_with_condition(
    state: &GatewayServerState,
    headers: &HeaderMap,
    query: &QueryArgs,
    body: &Bytes,
) -> Result<Response, GatewayApiError> {
    let spec = &HANDLE_MESSAGE_WITH_CONDITION_SWEEP;
    let admission = admit_gateway_operation(state, headers, query, None, &spec.operation)?;
    let (request, force) = parse_sweep_body::<ConditionalMessageRequest>(spec, body)?;
    let Some(message) = request.message_text() else {
        return Err(GatewayApiError::missing_body_field("message"));
    };
    let slot_name = request
        .slot_condition_name
        .as_deref()
        .map(str::trim)
        .unwrap_or("");
    if slot_name.is_empty() && !force {
        return Err(GatewayApiError::missing_body_field("slot_condition_name"));
    }

    let store = admission.tracker_store()?;
    let sweep = SlotConditionSweep {
        store: store.clone(),
        agent: admission.agent()?,
        channels: state.config.channels.channels(),
        requested_channel: requested_output_channel(query),
        slot_name,
        slot_value: &request.slot_value,
        message,
    };
    let keys = store.keys().await.map_err(GatewayApiError::tracker_store)?;
    tracing::info!(
        operation = spec.operation.name,
        keys = keys.len(),
        force,
        "conversation sweep started"
    );
    let outcomes = run_conversation_sweep(&sweep, &keys, force).await;
    log_sweep_finished(spec, &outcomes);
    Ok(sweep_response(&outcomes))
}

pub(super) async fn handle_resume_dead_conversations(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Query(query): Query<QueryArgs>,
    body: Bytes,
) -> Response {
    resume_dead_conversations(&state, &headers, &query, &body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn resume_dead_conversations(
    state: &GatewayServerState,
    headers: &HeaderMap,
    query: &QueryArgs,
    body: &Bytes,
) -> Result<Response, GatewayApiError> {
    let spec = &RESUME_DEAD_CONVERSATIONS_SWEEP;
    let admission = admit_gateway_operation(state, headers, query, None, &spec.operation)?;
    let (request, force) = parse_sweep_body::<ResumeConversationsRequest>(spec, body)?;
    let Some(action) = request.action_name() else {
        return Err(GatewayApiError::missing_body_field("name"));
    };
    let default_verbosity = if force {
        EventVerbosity::Applied
    } else {
        EventVerbosity::AfterRestart
    };
    let verbosity = event_verbosity_parameter(query, default_verbosity)?;

    let store = admission.tracker_store()?;
    let sweep = StaleConversationSweep {
        store: store.clone(),
        agent: admission.agent()?,
        channels: state.config.channels.channels(),
        requested_channel: requested_output_channel(query),
        action,
        policy: request.policy.as_deref(),
        confidence: request.confidence,
        started_at: current_unix_timestamp_f64(),
    };
    let keys = store.keys().await.map_err(GatewayApiError::tracker_store)?;
    tracing::info!(
        operation = spec.operation.name,
        keys = keys.len(),
        force,
        include_events = ?verbosity,
        "conversation sweep started"
    );
    let outcomes = run_conversation_sweep(&sweep, &keys, force).await;
    log_sweep_finished(spec, &outcomes);
    Ok(sweep_response(&outcomes))
}
