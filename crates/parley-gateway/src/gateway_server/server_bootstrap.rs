//! Gateway server bootstrap and router wiring.

use super::*;

pub async fn run_gateway_server(config: GatewayServerConfig) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", config.bind))?;
    if config.auth_mode.is_disabled() {
        tracing::warn!(
            target: "parley::audit",
            "authentication disabled: every request is served with admin rights"
        );
    }
    let snapshot = config.runtime.snapshot();
    if snapshot.ready_agent().is_none() {
        tracing::warn!(
            "no ready dialogue agent is loaded; agent-backed endpoints answer 503 until PUT {MODEL_ENDPOINT}"
        );
    }

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind parley gateway on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound gateway address")?;
    tracing::info!(
        addr = %local_addr,
        auth_mode = config.auth_mode.as_str(),
        channels = config.channels.channels().len(),
        "parley gateway listening"
    );

    let state = Arc::new(GatewayServerState::new(config));
    let app = build_gateway_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("parley gateway exited unexpectedly")?;
    tracing::info!("parley gateway stopped");
    Ok(())
}

pub fn build_gateway_router(state: Arc<GatewayServerState>) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    Router::new()
        .route(ROOT_ENDPOINT, get(handle_root))
        .route(VERSION_ENDPOINT, get(handle_version))
        .route(STATUS_ENDPOINT, get(handle_status))
        .route(MODEL_ENDPOINT, put(handle_load_model))
        .route(DOMAIN_ENDPOINT, get(handle_domain))
        .route(TRACKER_PREDICT_ENDPOINT, post(handle_tracker_predict))
        .route(CONVERSATIONS_ENDPOINT, get(handle_list_conversations))
        .route(
            HANDLE_MESSAGE_WITH_CONDITION_ENDPOINT,
            post(handle_message_with_condition),
        )
        .route(
            RESUME_DEAD_CONVERSATIONS_ENDPOINT,
            post(handle_resume_dead_conversations),
        )
        .route(
            CONVERSATION_ENDPOINT,
            axum::routing::delete(handle_delete_conversation),
        )
        .route(CONVERSATION_TRACKER_ENDPOINT, get(handle_retrieve_tracker))
        .route(CONVERSATION_STORY_ENDPOINT, get(handle_retrieve_story))
        .route(
            CONVERSATION_TRACKER_EVENTS_ENDPOINT,
            post(handle_append_event).put(handle_replace_events),
        )
        .route(
            CONVERSATION_MESSAGES_ENDPOINT,
            get(handle_list_messages).post(handle_log_message),
        )
        .route(CONVERSATION_EXECUTE_ENDPOINT, post(handle_execute_action))
        .route(
            CONVERSATION_RESPOND_ENDPOINT,
            get(handle_respond).post(handle_respond),
        )
        .route(CONVERSATION_PREDICT_ENDPOINT, post(handle_predict))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            enforce_request_deadline,
        ))
        .layer(cors)
        .with_state(state)
}

async fn enforce_request_deadline(
    State(state): State<Arc<GatewayServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let timeout_ms = state.config.request_timeout_ms;
    if timeout_ms == 0 {
        return next.run(request).await;
    }
    match tokio::time::timeout(Duration::from_millis(timeout_ms), next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(timeout_ms, "request deadline exceeded; dropping in-flight work");
            GatewayApiError::timeout(timeout_ms).into_response()
        }
    }
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    let explicit = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .collect::<Vec<_>>();
    if explicit.contains(&"*") {
        return layer.allow_origin(Any);
    }
    let values = explicit
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();
    layer.allow_origin(AllowOrigin::list(values))
}
