//! Request authentication and ownership scoping.

use crate::access_error::{AccessError, ForbiddenReason};
use crate::auth_mode::AuthMode;
use crate::operation::{OperationSpec, RequestFields};
use crate::principal::{AuthContext, Role};

/// Query parameter carrying the shared secret.
pub const SHARED_SECRET_QUERY_KEY: &str = "token";

#[derive(Debug, Clone, Copy, Default)]
/// Credentials extracted from one inbound request.
pub struct AuthRequest<'a> {
    pub query_token: Option<&'a str>,
    pub bearer_token: Option<&'a str>,
}

#[derive(Debug, Clone)]
/// Public struct `AuthorizationGate` used across Parley components.
pub struct AuthorizationGate {
    mode: AuthMode,
}

impl AuthorizationGate {
    pub fn new(mode: AuthMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &AuthMode {
        &self.mode
    }

    /// Authorizes `request` against the conversation owned by `target_sender_id`.
    pub fn authorize(
        &self,
        request: &AuthRequest<'_>,
        target_sender_id: Option<&str>,
    ) -> Result<AuthContext, AccessError> {
        if let (Some(secret), Some(provided)) = (self.mode.shared_secret(), request.query_token) {
            if secret.matches(provided) {
                return Ok(AuthContext::shared_secret());
            }
        }

        if let (Some(verifier), Some(token)) = (self.mode.bearer(), request.bearer_token) {
            if let Ok(claims) = verifier.verify(token) {
                let Some(principal) = claims.principal() else {
                    return Err(AccessError::Forbidden {
                        reason: ForbiddenReason::InsufficientRole,
                    });
                };
                if principal.may_act_on(target_sender_id) {
                    return Ok(AuthContext::bearer(principal));
                }
                let reason = match (principal.role, target_sender_id) {
                    (Role::User, None) => ForbiddenReason::OwnershipUnresolvable,
                    (Role::User, Some(_)) => ForbiddenReason::NotOwner,
                    _ => ForbiddenReason::InsufficientRole,
                };
                return Err(AccessError::Forbidden { reason });
            }
        }

        if self.mode.is_disabled() {
            return Ok(AuthContext::disabled());
        }

        Err(AccessError::Unauthenticated)
    }

    /// Same as [`Self::authorize`] but resolves the target from operation metadata
    /// and records an audit entry on denial.
    pub fn authorize_operation(
        &self,
        request: &AuthRequest<'_>,
        operation: &OperationSpec,
        fields: &RequestFields,
    ) -> Result<AuthContext, AccessError> {
        let target_sender_id = operation.target_sender_id(fields);
        let result = self.authorize(request, target_sender_id);
        if let Err(error) = &result {
            let forbidden_reason = match error {
                AccessError::Forbidden { reason } => reason.as_str(),
                AccessError::Unauthenticated => "",
            };
            tracing::warn!(
                target: "parley::audit",
                operation = operation.name,
                reason = error.reason_code(),
                forbidden_reason,
                target_sender_id = target_sender_id.unwrap_or(""),
                auth_mode = self.mode.as_str(),
                "gateway request denied"
            );
        }
        result
    }
}

/// Extracts a bearer token from an `Authorization` header value.
pub fn bearer_token_from_header(raw: Option<&str>) -> Option<&str> {
    let token = raw?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
