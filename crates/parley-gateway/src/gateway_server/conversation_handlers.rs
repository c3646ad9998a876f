//! Single-conversation handlers: tracker access, messages, actions, and prediction.
use parley_agent_core::{ActionHints, Prediction, UserMessage};
use parley_multi_channel::{resolve_output_channel, CollectingOutputChannel};
use parley_session::{Tracker, TrackerEvent};

use super::types::{ExecuteActionRequest, LogMessageRequest};
use super::*;

const USER_SENDER: &str = "user";
/// Conversation id given to trackers built from a request body.
const DEFAULT_SENDER_ID: &str = "default";

async fn load_tracker(
    store: &Arc<dyn TrackerStore>,
    sender_id: &str,
) -> Result<Tracker, GatewayApiError> {
    store
        .get_or_create_tracker(sender_id)
        .await
        .map_err(GatewayApiError::tracker_store)
}

async fn save_tracker(
    store: &Arc<dyn TrackerStore>,
    tracker: &Tracker,
) -> Result<(), GatewayApiError> {
    store
        .save(tracker)
        .await
        .map_err(GatewayApiError::tracker_store)
}

fn invalid_event_body() -> GatewayApiError {
    GatewayApiError::invalid_parameter(
        StatusCode::BAD_REQUEST,
        "",
        "body",
        "Couldn't extract a proper event from the request body.",
    )
}

/// Accepts either a bare event list or `{"events": [...]}`.
fn events_from_body(payload: &Value) -> Result<Vec<TrackerEvent>, GatewayApiError> {
    let raw_events = match payload {
        Value::Array(events) => events.as_slice(),
        Value::Object(object) => match object.get("events") {
            Some(Value::Array(events)) => events.as_slice(),
            _ => return Err(invalid_event_body()),
        },
        _ => return Err(invalid_event_body()),
    };
    raw_events
        .iter()
        .map(TrackerEvent::from_parameters)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(invalid_event_body)
}

pub(super) async fn handle_list_conversations(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Query(query): Query<QueryArgs>,
) -> Response {
    list_conversations(&state, &headers, &query)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn list_conversations(
    state: &GatewayServerState,
    headers: &HeaderMap,
    query: &QueryArgs,
) -> Result<Response, GatewayApiError> {
    let admission =
        admit_gateway_operation(state, headers, query, None, &LIST_CONVERSATIONS_OPERATION)?;
    let keys = admission
        .tracker_store()?
        .keys()
        .await
        .map_err(GatewayApiError::tracker_store)?;
    Ok(json_response(StatusCode::OK, json!(keys)))
}

pub(super) async fn handle_retrieve_tracker(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Path(sender_id): Path<String>,
    Query(query): Query<QueryArgs>,
) -> Response {
    retrieve_tracker(&state, &headers, &sender_id, &query)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn retrieve_tracker(
    state: &GatewayServerState,
    headers: &HeaderMap,
    sender_id: &str,
    query: &QueryArgs,
) -> Result<Response, GatewayApiError> {
    let admission = admit_gateway_operation(
        state,
        headers,
        query,
        Some(sender_id),
        &RETRIEVE_TRACKER_OPERATION,
    )?;

    // Legacy flags only change the default; `include_events` still wins.
    let mut default_verbosity = EventVerbosity::AfterRestart;
    if bool_query_arg(query, "ignore_restarts") == Some(true) {
        default_verbosity = EventVerbosity::All;
    }
    if bool_query_arg(query, "events") == Some(false) {
        default_verbosity = EventVerbosity::None;
    }
    let verbosity = event_verbosity_parameter(query, default_verbosity)?;
    let until = float_query_arg(query, "until")?;

    let store = admission.tracker_store()?;
    let mut tracker = load_tracker(&store, sender_id).await?;
    if let Some(until) = until {
        tracker = tracker.travel_back_in_time(until);
    }
    Ok(json_response(StatusCode::OK, tracker.current_state(verbosity)))
}

pub(super) async fn handle_append_event(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Path(sender_id): Path<String>,
    Query(query): Query<QueryArgs>,
    body: Bytes,
) -> Response {
    append_event(&state, &headers, &sender_id, &query, &body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn append_event(
    state: &GatewayServerState,
    headers: &HeaderMap,
    sender_id: &str,
    query: &QueryArgs,
    body: &Bytes,
) -> Result<Response, GatewayApiError> {
    let admission =
        admit_gateway_operation(state, headers, query, Some(sender_id), &APPEND_EVENT_OPERATION)?;
    let verbosity = event_verbosity_parameter(query, EventVerbosity::AfterRestart)?;
    let payload = parse_json_body::<Value>(body)?;
    let Some(event) = TrackerEvent::from_parameters(&payload) else {
        tracing::warn!(sender_id, "append event called without a valid event");
        return Err(invalid_event_body());
    };

    let store = admission.tracker_store()?;
    let mut tracker = load_tracker(&store, sender_id).await?;
    tracker.update(event);
    save_tracker(&store, &tracker).await?;
    Ok(json_response(StatusCode::OK, tracker.current_state(verbosity)))
}

pub(super) async fn handle_replace_events(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Path(sender_id): Path<String>,
    Query(query): Query<QueryArgs>,
    body: Bytes,
) -> Response {
    replace_events(&state, &headers, &sender_id, &query, &body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn replace_events(
    state: &GatewayServerState,
    headers: &HeaderMap,
    sender_id: &str,
    query: &QueryArgs,
    body: &Bytes,
) -> Result<Response, GatewayApiError> {
    let admission = admit_gateway_operation(
        state,
        headers,
        query,
        Some(sender_id),
        &REPLACE_EVENTS_OPERATION,
    )?;
    let verbosity = event_verbosity_parameter(query, EventVerbosity::AfterRestart)?;
    let events = events_from_body(&parse_json_body::<Value>(body)?)?;

    let store = admission.tracker_store()?;
    let tracker = Tracker::from_events(sender_id, events);
    save_tracker(&store, &tracker).await?;
    Ok(json_response(StatusCode::OK, tracker.current_state(verbosity)))
}

pub(super) async fn handle_retrieve_story(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Path(sender_id): Path<String>,
    Query(query): Query<QueryArgs>,
) -> Response {
    retrieve_story(&state, &headers, &sender_id, &query)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn retrieve_story(
    state: &GatewayServerState,
    headers: &HeaderMap,
    sender_id: &str,
    query: &QueryArgs,
) -> Result<Response, GatewayApiError> {
    let admission = admit_gateway_operation(
        state,
        headers,
        query,
        Some(sender_id),
        &RETRIEVE_STORY_OPERATION,
    )?;
    let until = float_query_arg(query, "until")?;
    let store = admission.tracker_store()?;
    let mut tracker = load_tracker(&store, sender_id).await?;
    if let Some(until) = until {
        tracker = tracker.travel_back_in_time(until);
    }
    Ok((StatusCode::OK, tracker.export_story()).into_response())
}

pub(super) async fn handle_list_messages(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Path(sender_id): Path<String>,
    Query(query): Query<QueryArgs>,
) -> Response {
    list_messages(&state, &headers, &sender_id, &query)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn list_messages(
    state: &GatewayServerState,
    headers: &HeaderMap,
    sender_id: &str,
    query: &QueryArgs,
) -> Result<Response, GatewayApiError> {
    let admission = admit_gateway_operation(
        state,
        headers,
        query,
        Some(sender_id),
        &LIST_MESSAGES_OPERATION,
    )?;
    let tracker = admission
        .tracker_store()?
        .retrieve(sender_id)
        .await
        .map_err(GatewayApiError::tracker_store)?;
    let messages = tracker
        .map(|tracker| tracker.conversation_messages())
        .unwrap_or_default();
    Ok(json_response(StatusCode::OK, json!(messages)))
}

pub(super) async fn handle_log_message(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Path(sender_id): Path<String>,
    Query(query): Query<QueryArgs>,
    body: Bytes,
) -> Response {
    log_message(&state, &headers, &sender_id, &query, &body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn log_message(
    state: &GatewayServerState,
    headers: &HeaderMap,
    sender_id: &str,
    query: &QueryArgs,
    body: &Bytes,
) -> Result<Response, GatewayApiError> {
    let admission =
        admit_gateway_operation(state, headers, query, Some(sender_id), &LOG_MESSAGE_OPERATION)?;
    let verbosity = event_verbosity_parameter(query, EventVerbosity::AfterRestart)?;
    let request = parse_json_body::<LogMessageRequest>(body)?;
    let sender = request.sender.as_deref().unwrap_or("");
    if sender != USER_SENDER {
        return Err(GatewayApiError::new(
            StatusCode::BAD_REQUEST,
            "NotSupported",
            format!(
                "Currently, only user messages can be passed to this endpoint. Messages of sender '{sender}' cannot be handled."
            ),
        )
        .with_details(json!({ "parameter": "sender", "in": "body" })));
    }
    let Some(text) = request.message.or(request.text) else {
        return Err(GatewayApiError::missing_body_field("message"));
    };

    let agent = admission.agent()?;
    let store = admission.tracker_store()?;
    let mut tracker = load_tracker(&store, sender_id).await?;
    let message = UserMessage {
        text,
        input_channel: None,
        parse_data: request.parse_data,
    };
    agent
        .log_message(&mut tracker, message)
        .await
        .map_err(|error| GatewayApiError::agent("MessageException", error))?;
    save_tracker(&store, &tracker).await?;
    Ok(json_response(StatusCode::OK, tracker.current_state(verbosity)))
}

pub(super) async fn handle_delete_conversation(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Path(sender_id): Path<String>,
    Query(query): Query<QueryArgs>,
) -> Response {
    delete_conversation(&state, &headers, &sender_id, &query)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn delete_conversation(
    state: &GatewayServerState,
    headers: &HeaderMap,
    sender_id: &str,
    query: &QueryArgs,
) -> Result<Response, GatewayApiError> {
    let admission = admit_gateway_operation(
        state,
        headers,
        query,
        Some(sender_id),
        &DELETE_CONVERSATION_OPERATION,
    )?;
    let existed = admission
        .tracker_store()?
        .delete(sender_id)
        .await
        .map_err(GatewayApiError::tracker_store)?;
    tracing::info!(sender_id, existed, "deleted conversation tracker");
    let mut confirmation = serde_json::Map::new();
    confirmation.insert(
        sender_id.to_string(),
        json!("User was successfully deleted from tracker."),
    );
    Ok(json_response(StatusCode::OK, Value::Object(confirmation)))
}

pub(super) async fn handle_execute_action(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Path(sender_id): Path<String>,
    Query(query): Query<QueryArgs>,
    body: Bytes,
) -> Response {
    execute_action(&state, &headers, &sender_id, &query, &body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn execute_action(
    state: &GatewayServerState,
    headers: &HeaderMap,
    sender_id: &str,
    query: &QueryArgs,
    body: &Bytes,
) -> Result<Response, GatewayApiError> {
    let admission = admit_gateway_operation(
        state,
        headers,
        query,
        Some(sender_id),
        &EXECUTE_ACTION_OPERATION,
    )?;
    let verbosity = event_verbosity_parameter(query, EventVerbosity::AfterRestart)?;
    let request = parse_json_body::<ExecuteActionRequest>(body)?;
    let Some(action) = request.action_name() else {
        return Err(GatewayApiError::missing_body_field("name"));
    };

    let agent = admission.agent()?;
    let store = admission.tracker_store()?;
    let mut tracker = load_tracker(&store, sender_id).await?;
    let output = resolve_output_channel(
        requested_output_channel(query),
        Some(&tracker),
        state.config.channels.channels(),
    );
    tracing::debug!(sender_id, action, output_channel = output.name(), "executing action");
    let hints = ActionHints {
        policy: request.policy.as_deref(),
        confidence: request.confidence,
    };
    let result = agent
        .execute_action(&mut tracker, action, output.handle(), hints)
        .await;
    if let Err(error) = result {
        tracing::error!(
            sender_id,
            action,
            error = %error,
            "action failed; its events are not persisted"
        );
        return Err(GatewayApiError::agent("ActionException", error));
    }
    save_tracker(&store, &tracker).await?;
    Ok(json_response(
        StatusCode::OK,
        json!({
            "tracker": tracker.current_state(verbosity),
            "messages": output.collected_messages().unwrap_or_default(),
        }),
    ))
}

pub(super) async fn handle_respond(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Path(sender_id): Path<String>,
    Query(query): Query<QueryArgs>,
    body: Bytes,
) -> Response {
    respond(&state, &headers, &sender_id, &query, &body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

fn respond_message_text(query: &QueryArgs, body: &Bytes) -> Option<String> {
    for key in ["query", "q"] {
        if let Some(text) = query.get(key) {
            return Some(text.clone());
        }
    }
    let payload = serde_json::from_slice::<Value>(body).ok()?;
    ["query", "q", "message"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

async fn respond(
    state: &GatewayServerState,
    headers: &HeaderMap,
    sender_id: &str,
    query: &QueryArgs,
    body: &Bytes,
) -> Result<Response, GatewayApiError> {
    let admission =
        admit_gateway_operation(state, headers, query, Some(sender_id), &RESPOND_OPERATION)?;
    let Some(text) = respond_message_text(query, body) else {
        return Err(GatewayApiError::invalid_parameter(
            StatusCode::BAD_REQUEST,
            "query",
            "query",
            "Missing the message parameter.",
        ));
    };

    let agent = admission.agent()?;
    let store = admission.tracker_store()?;
    let mut tracker = load_tracker(&store, sender_id).await?;
    let collector = Arc::new(CollectingOutputChannel::new());
    agent
        .handle_text(&mut tracker, UserMessage::new(text), collector.clone())
        .await
        .map_err(|error| GatewayApiError::agent("ActionException", error))?;
    save_tracker(&store, &tracker).await?;
    Ok(json_response(StatusCode::OK, json!(collector.messages())))
}

pub(super) async fn handle_predict(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Path(sender_id): Path<String>,
    Query(query): Query<QueryArgs>,
) -> Response {
    predict(&state, &headers, &sender_id, &query)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn predict(
    state: &GatewayServerState,
    headers: &HeaderMap,
    sender_id: &str,
    query: &QueryArgs,
) -> Result<Response, GatewayApiError> {
    let admission =
        admit_gateway_operation(state, headers, query, Some(sender_id), &PREDICT_OPERATION)?;
    let agent = admission.agent()?;
    let store = admission.tracker_store()?;
    let tracker = load_tracker(&store, sender_id).await?;
    let prediction = agent
        .predict_next(&tracker)
        .await
        .map_err(|error| GatewayApiError::agent("PredictionException", error))?
        .ranked();
    Ok(prediction_response(prediction, &tracker, EventVerbosity::AfterRestart))
}

fn prediction_response(
    prediction: Prediction,
    tracker: &Tracker,
    verbosity: EventVerbosity,
) -> Response {
    json_response(
        StatusCode::OK,
        json!({
            "scores": prediction.scores,
            "policy": prediction.policy,
            "confidence": prediction.confidence,
            "tracker": tracker.current_state(verbosity),
        }),
    )
}

pub(super) async fn handle_tracker_predict(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Query(query): Query<QueryArgs>,
    body: Bytes,
) -> Response {
    tracker_predict(&state, &headers, &query, &body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

/// Predicts the next action for a tracker supplied in the request body. The
/// tracker is never stored.
async fn tracker_predict(
    state: &GatewayServerState,
    headers: &HeaderMap,
    query: &QueryArgs,
    body: &Bytes,
) -> Result<Response, GatewayApiError> {
    let admission =
        admit_gateway_operation(state, headers, query, None, &TRACKER_PREDICT_OPERATION)?;
    let verbosity = event_verbosity_parameter(query, EventVerbosity::AfterRestart)?;
    let events = events_from_body(&parse_json_body::<Value>(body)?)?;
    let tracker = Tracker::from_events(DEFAULT_SENDER_ID, events);
    let prediction = admission
        .agent()?
        .predict_next(&tracker)
        .await
        .map_err(|error| GatewayApiError::agent("PredictionException", error))?
        .ranked();
    Ok(prediction_response(prediction, &tracker, verbosity))
}
