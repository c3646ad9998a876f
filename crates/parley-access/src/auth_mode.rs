//! Startup-selected authentication posture.

use anyhow::Result;
use subtle::ConstantTimeEq;

use crate::jwt::JwtVerifier;

#[derive(Clone)]
/// Pre-shared token for trusted server-to-server callers.
pub struct SharedSecret(String);

impl SharedSecret {
    /// Returns `None` for blank secrets so an empty flag never enables the mode.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Constant-time comparison against a caller-supplied token.
    pub fn matches(&self, provided: &str) -> bool {
        let expected = self.0.as_bytes();
        let provided = provided.as_bytes();
        expected.len() == provided.len() && bool::from(expected.ct_eq(provided))
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

#[derive(Debug, Clone)]
/// Enumerates supported `AuthMode` values.
///
/// Selected once from configuration; the gate never re-derives it per request.
pub enum AuthMode {
    /// No credential is configured: every request is admitted as admin.
    Disabled,
    SharedSecret(SharedSecret),
    Bearer(JwtVerifier),
    SharedSecretOrBearer {
        secret: SharedSecret,
        bearer: JwtVerifier,
    },
}

/// Raw auth settings as read from flags or environment.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub auth_token: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwt_method: String,
}

impl AuthMode {
    pub fn from_settings(settings: &AuthSettings) -> Result<Self> {
        let secret = settings.auth_token.as_deref().and_then(SharedSecret::new);
        let bearer = match settings
            .jwt_secret
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            Some(jwt_secret) => Some(JwtVerifier::new(&settings.jwt_method, jwt_secret)?),
            None => None,
        };
        let mode = match (secret, bearer) {
            (None, None) => Self::Disabled,
            (Some(secret), None) => Self::SharedSecret(secret),
            (None, Some(bearer)) => Self::Bearer(bearer),
            (Some(secret), Some(bearer)) => Self::SharedSecretOrBearer { secret, bearer },
        };
        if mode.is_disabled() {
            tracing::warn!(
                target: "parley::audit",
                auth_mode = mode.as_str(),
                "authentication is disabled: every request is granted unrestricted access"
            );
        } else {
            tracing::info!(auth_mode = mode.as_str(), "gateway authentication configured");
        }
        Ok(mode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::SharedSecret(_) => "shared-secret",
            Self::Bearer(_) => "bearer",
            Self::SharedSecretOrBearer { .. } => "shared-secret+bearer",
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    pub fn shared_secret(&self) -> Option<&SharedSecret> {
        match self {
            Self::SharedSecret(secret) | Self::SharedSecretOrBearer { secret, .. } => Some(secret),
            _ => None,
        }
    }

    pub fn bearer(&self) -> Option<&JwtVerifier> {
        match self {
            Self::Bearer(bearer) | Self::SharedSecretOrBearer { bearer, .. } => Some(bearer),
            _ => None,
        }
    }
}
