//! Liveness, version, status, and model reload handlers.
use axum::http::header::ACCEPT;

use super::*;

pub(super) async fn handle_root() -> Response {
    format!("Hello from Parley: {PARLEY_VERSION}").into_response()
}

pub(super) async fn handle_version() -> Response {
    json_response(
        StatusCode::OK,
        json!({
            "version": PARLEY_VERSION,
            "minimum_compatible_version": MINIMUM_COMPATIBLE_VERSION,
        }),
    )
}

pub(super) async fn handle_status(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Query(query): Query<QueryArgs>,
) -> Response {
    let admission =
        match admit_gateway_operation(&state, &headers, &query, None, &STATUS_OPERATION) {
            Ok(admission) => admission,
            Err(error) => return error.into_response(),
        };
    let snapshot = &admission.snapshot;
    json_response(
        StatusCode::OK,
        json!({
            "fingerprint": snapshot.fingerprint(),
            "is_ready": snapshot.ready_agent().is_some(),
            "has_tracker_store": snapshot.tracker_store.is_some(),
            "runtime_version": snapshot.version,
            "auth_mode": state.gate.mode().as_str(),
            "channels": state.config.channels.candidates(),
        }),
    )
}

pub(super) async fn handle_load_model(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Query(query): Query<QueryArgs>,
    body: Bytes,
) -> Response {
    if let Err(error) =
        admit_gateway_operation(&state, &headers, &query, None, &MODEL_LOAD_OPERATION)
    {
        return error.into_response();
    }
    let request = match parse_json_body::<Value>(&body).and_then(|payload| {
        serde_json::from_value::<ModelLoadRequest>(payload)
            .map_err(|_| GatewayApiError::missing_body_field("agent_url"))
    }) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };
    if request.agent_url.trim().is_empty() {
        return GatewayApiError::missing_body_field("agent_url").into_response();
    }

    tracing::info!(agent_url = request.agent_url.as_str(), "received model reload request");
    let agent = match state.config.agent_loader.load(&request) {
        Ok(agent) => agent,
        Err(error) => {
            return GatewayApiError::new(
                StatusCode::BAD_REQUEST,
                "ModelLoadError",
                format!("{error:#}"),
            )
            .with_details(json!({ "parameter": "agent_url", "in": "body" }))
            .into_response();
        }
    };
    let version = state.config.runtime.replace_agent(agent);
    json_response(
        StatusCode::OK,
        json!({
            "fingerprint": state.snapshot().fingerprint(),
            "runtime_version": version,
        }),
    )
}

/// True when an `Accept` header admits a JSON body.
fn accepts_json(accept: &str) -> bool {
    accept
        .split(',')
        .filter_map(|media_range| media_range.split(';').next())
        .map(str::trim)
        .any(|media_type| media_type.ends_with("json") || media_type == "*/*")
}

pub(super) async fn handle_domain(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    Query(query): Query<QueryArgs>,
) -> Response {
    domain(&state, &headers, &query)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn domain(
    state: &GatewayServerState,
    headers: &HeaderMap,
    query: &QueryArgs,
) -> Result<Response, GatewayApiError> {
    let admission = admit_gateway_operation(state, headers, query, None, &DOMAIN_OPERATION)?;
    let accept = headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/json");
    if !accepts_json(accept) {
        return Err(GatewayApiError::new(
            StatusCode::NOT_ACCEPTABLE,
            "InvalidHeader",
            "Invalid Accept header. Domain can be provided as json (\"Accept: application/json\").",
        ));
    }
    let domain = admission
        .agent()?
        .domain()
        .await
        .map_err(|error| GatewayApiError::agent("DomainException", error))?;
    Ok(json_response(StatusCode::OK, domain))
}

#[cfg(test)]
mod tests {
    use super::accepts_json;

    #[test]
    fn unit_accepts_json_matches_json_media_types_and_wildcard() {
        assert!(accepts_json("application/json"));
        assert!(accepts_json("text/html, application/json;q=0.9"));
        assert!(accepts_json("*/*"));
        assert!(!accepts_json("application/x-yml"));
        assert!(!accepts_json("text/plain"));
    }
}
