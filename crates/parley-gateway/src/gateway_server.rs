//! HTTP gateway: authorization, channel resolution, and conversation sweeps over axum.
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use parley_access::{
    bearer_token_from_header, AgentRequirement, AuthContext, AuthMode, AuthRequest,
    AuthorizationGate, OperationSpec, RequestFields, SHARED_SECRET_QUERY_KEY,
};
use parley_agent_core::{
    AgentRuntime, AgentRuntimeSnapshot, DialogueAgent, RemoteDialogueAgent,
    RemoteDialogueAgentConfig,
};
use parley_multi_channel::{ChannelRegistry, OUTPUT_CHANNEL_QUERY_KEY};
use parley_session::{EventVerbosity, TrackerStore};

mod auth_runtime;
mod conversation_handlers;
mod endpoints;
mod root_handlers;
mod server_bootstrap;
mod sweep_handlers;
mod types;

use auth_runtime::admit_gateway_operation;
use conversation_handlers::{
    handle_append_event, handle_delete_conversation, handle_execute_action,
    handle_list_conversations, handle_list_messages, handle_log_message, handle_predict,
    handle_replace_events, handle_respond, handle_retrieve_story, handle_retrieve_tracker,
    handle_tracker_predict,
};
use endpoints::*;
use root_handlers::{
    handle_domain, handle_load_model, handle_root, handle_status, handle_version,
};
use sweep_handlers::{handle_message_with_condition, handle_resume_dead_conversations};
pub use server_bootstrap::{build_gateway_router, run_gateway_server};
pub use types::{GatewayApiError, ModelLoadRequest};

pub(crate) const PARLEY_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Oldest client/model format this gateway still accepts.
pub const MINIMUM_COMPATIBLE_VERSION: &str = "0.1.0";
/// Default request deadline: one hour.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3_600_000;

/// Trait contract for `DialogueAgentLoader` behavior.
pub trait DialogueAgentLoader: Send + Sync {
    fn load(&self, request: &ModelLoadRequest) -> Result<Arc<dyn DialogueAgent>>;
}

#[derive(Debug, Clone)]
/// Loads agents that live behind an upstream HTTP runtime.
pub struct RemoteDialogueAgentLoader {
    pub http_timeout_ms: u64,
}

impl DialogueAgentLoader for RemoteDialogueAgentLoader {
    fn load(&self, request: &ModelLoadRequest) -> Result<Arc<dyn DialogueAgent>> {
        let mut config = RemoteDialogueAgentConfig::new(request.agent_url.as_str());
        config.fingerprint = request.fingerprint.clone();
        config.http_timeout_ms = self.http_timeout_ms;
        let agent = RemoteDialogueAgent::new(config)
            .with_context(|| format!("failed to load agent from '{}'", request.agent_url))?;
        Ok(Arc::new(agent))
    }
}

#[derive(Clone)]
/// Public struct `GatewayServerConfig` used across Parley components.
pub struct GatewayServerConfig {
    pub bind: String,
    pub auth_mode: AuthMode,
    pub cors_origins: Vec<String>,
    pub request_timeout_ms: u64,
    pub runtime: AgentRuntime,
    pub channels: ChannelRegistry,
    pub agent_loader: Arc<dyn DialogueAgentLoader>,
}

impl std::fmt::Debug for GatewayServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServerConfig")
            .field("bind", &self.bind)
            .field("auth_mode", &self.auth_mode.as_str())
            .field("cors_origins", &self.cors_origins)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("channels", &self.channels)
            .finish()
    }
}

/// Shared state handed to every handler.
pub struct GatewayServerState {
    pub(crate) config: GatewayServerConfig,
    pub(crate) gate: AuthorizationGate,
}

impl GatewayServerState {
    pub fn new(config: GatewayServerConfig) -> Self {
        let gate = AuthorizationGate::new(config.auth_mode.clone());
        Self { config, gate }
    }

    pub(crate) fn snapshot(&self) -> Arc<AgentRuntimeSnapshot> {
        self.config.runtime.snapshot()
    }
}

type QueryArgs = BTreeMap<String, String>;

fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, GatewayApiError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body.as_ref()
    };
    serde_json::from_slice::<T>(raw).map_err(|error| {
        GatewayApiError::invalid_parameter(
            StatusCode::BAD_REQUEST,
            "",
            "body",
            format!("failed to parse request body: {error}"),
        )
    })
}

/// Reads `include_events`, falling back to `default` when absent.
fn event_verbosity_parameter(
    query: &QueryArgs,
    default: EventVerbosity,
) -> Result<EventVerbosity, GatewayApiError> {
    let Some(raw) = query.get(INCLUDE_EVENTS_QUERY_KEY) else {
        return Ok(default);
    };
    EventVerbosity::parse(raw).map_err(|_| {
        GatewayApiError::invalid_parameter(
            StatusCode::NOT_FOUND,
            INCLUDE_EVENTS_QUERY_KEY,
            "query",
            format!(
                "Invalid parameter value for '{INCLUDE_EVENTS_QUERY_KEY}'. Should be one of {}",
                EventVerbosity::NAMES.join(", ")
            ),
        )
    })
}

fn bool_query_arg(query: &QueryArgs, key: &str) -> Option<bool> {
    query
        .get(key)
        .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

fn float_query_arg(query: &QueryArgs, key: &str) -> Result<Option<f64>, GatewayApiError> {
    let Some(raw) = query.get(key) else {
        return Ok(None);
    };
    raw.trim().parse::<f64>().map(Some).map_err(|_| {
        GatewayApiError::invalid_parameter(
            StatusCode::BAD_REQUEST,
            key,
            "query",
            format!("Invalid parameter value for '{key}'. Expected a number."),
        )
    })
}

fn requested_output_channel(query: &QueryArgs) -> Option<&str> {
    query.get(OUTPUT_CHANNEL_QUERY_KEY).map(String::as_str)
}

fn json_response(status: StatusCode, payload: Value) -> Response {
    (status, Json(payload)).into_response()
}
