//! Error envelope and request payloads shared by gateway handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use parley_access::AccessError;
use parley_agent_core::AgentError;
use parley_session::TrackerStoreError;

use super::PARLEY_VERSION;

const SECURITY_HELP: &str = "Provide `?token=<secret>` or an `Authorization: Bearer <jwt>` header.";

/// Structured failure returned by every gateway endpoint.
#[derive(Debug)]
pub struct GatewayApiError {
    pub(super) status: StatusCode,
    pub(super) reason: &'static str,
    pub(super) message: String,
    pub(super) details: Option<Value>,
    pub(super) help: Option<&'static str>,
}

impl GatewayApiError {
    pub(super) fn new(status: StatusCode, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            message: message.into(),
            details: None,
            help: None,
        }
    }

    pub(super) fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub(super) fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    /// Missing or malformed field, reported with its location.
    pub(super) fn invalid_parameter(
        status: StatusCode,
        parameter: &str,
        location: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::new(status, "InvalidParameter", message)
            .with_details(json!({ "parameter": parameter, "in": location }))
    }

    pub(super) fn missing_body_field(parameter: &str) -> Self {
        Self::invalid_parameter(
            StatusCode::BAD_REQUEST,
            parameter,
            "body",
            format!("Missing the '{parameter}' parameter."),
        )
    }

    pub(super) fn no_agent() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "NoAgent",
            "No agent loaded. To continue processing, a model of a trained agent needs to be loaded.",
        )
    }

    pub(super) fn no_tracker_store() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "NoTrackerStore",
            "No tracker store available. Make sure to configure a tracker store when starting the server.",
        )
    }

    pub(super) fn tracker_store(error: TrackerStoreError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "TrackerStoreError",
            format!("Server failure. Error: {error}"),
        )
    }

    pub(super) fn agent(reason: &'static str, error: AgentError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            reason,
            format!("Server failure. Error: {error}"),
        )
    }

    pub(super) fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            StatusCode::REQUEST_TIMEOUT,
            "RequestTimeout",
            format!("request did not complete within {timeout_ms}ms"),
        )
    }
}

impl From<AccessError> for GatewayApiError {
    fn from(error: AccessError) -> Self {
        let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::FORBIDDEN);
        let message = match &error {
            AccessError::Unauthenticated => "User is not authenticated.",
            AccessError::Forbidden { .. } => "User has insufficient permissions.",
        };
        Self::new(status, error.reason_code(), message).with_help(SECURITY_HELP)
    }
}

impl IntoResponse for GatewayApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "version": PARLEY_VERSION,
                "status": "failure",
                "message": self.message,
                "reason": self.reason,
                "details": self.details.unwrap_or_else(|| json!({})),
                "help": self.help,
                "code": self.status.as_u16(),
            })),
        )
            .into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
/// Body of `POST /conversations/{sender_id}/execute`.
pub(super) struct ExecuteActionRequest {
    #[serde(default)]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) action: Option<String>,
    #[serde(default)]
    pub(super) policy: Option<String>,
    #[serde(default)]
    pub(super) confidence: Option<f64>,
}

impl ExecuteActionRequest {
    pub(super) fn action_name(&self) -> Option<&str> {
        first_non_empty(self.name.as_deref(), self.action.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
/// Body of `POST /conversations/{sender_id}/messages`.
pub(super) struct LogMessageRequest {
    #[serde(default)]
    pub(super) message: Option<String>,
    #[serde(default)]
    pub(super) text: Option<String>,
    #[serde(default)]
    pub(super) sender: Option<String>,
    #[serde(default)]
    pub(super) parse_data: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
/// Body of `POST /conversations/handle-message-w-condition`.
pub(super) struct ConditionalMessageRequest {
    #[serde(default)]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) message: Option<String>,
    #[serde(default)]
    pub(super) slot_condition_name: Option<String>,
    #[serde(default)]
    pub(super) slot_value: Value,
}

impl ConditionalMessageRequest {
    pub(super) fn message_text(&self) -> Option<&str> {
        first_non_empty(self.name.as_deref(), self.message.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
/// Body of `POST /conversations/resume-dead-conversations`.
pub(super) struct ResumeConversationsRequest {
    #[serde(default)]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) action: Option<String>,
    #[serde(default)]
    pub(super) policy: Option<String>,
    #[serde(default)]
    pub(super) confidence: Option<f64>,
}

impl ResumeConversationsRequest {
    pub(super) fn action_name(&self) -> Option<&str> {
        first_non_empty(self.name.as_deref(), self.action.as_deref())
    }
}

#[derive(Debug, Deserialize)]
/// Body of `PUT /model`.
pub struct ModelLoadRequest {
    pub agent_url: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

fn first_non_empty<'a>(primary: Option<&'a str>, fallback: Option<&'a str>) -> Option<&'a str> {
    primary
        .filter(|value| !value.trim().is_empty())
        .or_else(|| fallback.filter(|value| !value.trim().is_empty()))
}
