//! Gate admission: authenticate, scope to the target conversation, then check
//! that the runtime can serve the operation.

use super::*;

/// A request that passed the gate, with the runtime snapshot it will use.
pub(super) struct GatewayAdmission {
    pub(super) context: AuthContext,
    pub(super) snapshot: Arc<AgentRuntimeSnapshot>,
}

impl GatewayAdmission {
    pub(super) fn tracker_store(&self) -> Result<Arc<dyn TrackerStore>, GatewayApiError> {
        self.snapshot
            .tracker_store
            .clone()
            .ok_or_else(GatewayApiError::no_tracker_store)
    }

    pub(super) fn agent(&self) -> Result<Arc<dyn DialogueAgent>, GatewayApiError> {
        self.snapshot
            .ready_agent()
            .ok_or_else(GatewayApiError::no_agent)
    }
}

pub(super) fn admit_gateway_operation(
    state: &GatewayServerState,
    headers: &HeaderMap,
    query: &QueryArgs,
    sender_id: Option<&str>,
    operation: &OperationSpec,
) -> Result<GatewayAdmission, GatewayApiError> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let request = AuthRequest {
        query_token: query.get(SHARED_SECRET_QUERY_KEY).map(String::as_str),
        bearer_token: bearer_token_from_header(authorization),
    };
    let mut fields = RequestFields::default().with_query(query.clone());
    if let Some(sender_id) = sender_id {
        fields = fields.with_path_param(SENDER_ID_PARAM, sender_id);
    }
    let context = state
        .gate
        .authorize_operation(&request, operation, &fields)?;

    let admission = GatewayAdmission {
        context,
        snapshot: state.snapshot(),
    };
    match operation.agent {
        AgentRequirement::None => {}
        AgentRequirement::TrackerStore => {
            admission.tracker_store()?;
        }
        AgentRequirement::ReadyAgent => {
            admission.agent()?;
            admission.tracker_store()?;
        }
    }
    tracing::debug!(
        operation = operation.name,
        auth_mode = admission.context.mode.as_str(),
        username = admission.context.username().unwrap_or(""),
        "gateway request admitted"
    );
    Ok(admission)
}
