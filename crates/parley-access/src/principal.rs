use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `Role` values carried in bearer-token claims.
pub enum Role {
    Admin,
    User,
    None,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::None => "none",
        }
    }

    /// Maps a raw claim value onto a role; anything other than an exact
    /// `admin` or `user` collapses to `None`.
    pub fn from_claim(raw: Option<&str>) -> Self {
        match raw {
            Some("admin") => Self::Admin,
            Some("user") => Self::User,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Caller identity reconstructed from verified token claims on every request.
pub struct Principal {
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    /// Returns true when this principal may act on the conversation keyed by
    /// `target_sender_id`.
    ///
    /// Admins may act on anything. Users only on the conversation whose key
    /// equals their username, so collection-level operations (no target) are
    /// never owned by a user.
    pub fn may_act_on(&self, target_sender_id: Option<&str>) -> bool {
        match self.role {
            Role::Admin => true,
            Role::User => target_sender_id.is_some_and(|target| target == self.username),
            Role::None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Mode under which a single request was admitted.
pub enum AuthContextMode {
    SharedSecret,
    BearerToken,
    Disabled,
}

impl AuthContextMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SharedSecret => "shared_secret",
            Self::BearerToken => "bearer_token",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Per-request authorization result. Built by the gate and dropped with the request.
pub struct AuthContext {
    pub mode: AuthContextMode,
    pub principal: Option<Principal>,
}

impl AuthContext {
    pub fn shared_secret() -> Self {
        Self {
            mode: AuthContextMode::SharedSecret,
            principal: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            mode: AuthContextMode::Disabled,
            principal: None,
        }
    }

    pub fn bearer(principal: Principal) -> Self {
        Self {
            mode: AuthContextMode::BearerToken,
            principal: Some(principal),
        }
    }

    /// Effective role for downstream checks. Shared-secret and disabled
    /// modes are unrestricted and therefore report `Admin`.
    pub fn effective_role(&self) -> Role {
        match (&self.mode, &self.principal) {
            (AuthContextMode::BearerToken, Some(principal)) => principal.role,
            (AuthContextMode::BearerToken, None) => Role::None,
            _ => Role::Admin,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.principal
            .as_ref()
            .map(|principal| principal.username.as_str())
    }
}
