use thiserror::Error;

pub const REASON_NOT_AUTHENTICATED: &str = "NotAuthenticated";
pub const REASON_NOT_AUTHORIZED: &str = "NotAuthorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Why an authenticated bearer principal was refused.
pub enum ForbiddenReason {
    /// A `user` principal targeted a conversation it does not own.
    NotOwner,
    /// A `user` principal called a collection-level operation.
    OwnershipUnresolvable,
    /// The token carried no usable role or username.
    InsufficientRole,
}

impl ForbiddenReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotOwner => "not_owner",
            Self::OwnershipUnresolvable => "ownership_unresolvable",
            Self::InsufficientRole => "insufficient_role",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
/// Failures produced by [`crate::AuthorizationGate`].
pub enum AccessError {
    #[error("User is not authenticated.")]
    Unauthenticated,
    #[error("User has insufficient permissions.")]
    Forbidden { reason: ForbiddenReason },
}

impl AccessError {
    /// HTTP-equivalent status class.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::Forbidden { .. } => 403,
        }
    }

    /// Stable machine-readable reason code exposed in error envelopes.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => REASON_NOT_AUTHENTICATED,
            Self::Forbidden { .. } => REASON_NOT_AUTHORIZED,
        }
    }
}
