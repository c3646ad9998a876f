//! Signed bearer-token (JWT) verification.
//!
//! Only verification is supported: tokens are issued by an external identity
//! provider and the gateway merely checks signature, algorithm, and validity
//! window before reading the `user` claim.

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::principal::{Principal, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `JwtAlgorithm` values.
pub enum JwtAlgorithm {
    Hs256,
    Hs384,
    Hs512,
    EdDsa,
}

impl JwtAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hs256 => "HS256",
            Self::Hs384 => "HS384",
            Self::Hs512 => "HS512",
            Self::EdDsa => "EdDSA",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "HS256" => Ok(Self::Hs256),
            "HS384" => Ok(Self::Hs384),
            "HS512" => Ok(Self::Hs512),
            "EdDSA" => Ok(Self::EdDsa),
            other => bail!("unsupported jwt method '{other}': expected HS256, HS384, HS512, or EdDSA"),
        }
    }

    fn library_algorithm(self) -> Algorithm {
        match self {
            Self::Hs256 => Algorithm::HS256,
            Self::Hs384 => Algorithm::HS384,
            Self::Hs512 => Algorithm::HS512,
            Self::EdDsa => Algorithm::EdDSA,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
/// Reasons a presented bearer token could not be verified.
pub enum JwtError {
    #[error("token is not a well-formed compact JWT")]
    Malformed,
    #[error("token claims could not be decoded: {0}")]
    InvalidClaims(String),
    #[error("token algorithm '{found}' does not match configured '{expected}'")]
    AlgorithmMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("token signature verification failed")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::Json(inner) => Self::InvalidClaims(inner.to_string()),
            _ => Self::Malformed,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
/// Nested `user` claim block.
pub struct JwtUserClaims {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
/// Claims the gateway reads from a verified token. Unknown claims are ignored.
pub struct JwtClaims {
    #[serde(default)]
    pub user: Option<JwtUserClaims>,
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(default)]
    pub nbf: Option<u64>,
}

impl JwtClaims {
    /// Builds the request principal; `None` when the username claim is absent
    /// or empty. The username is taken verbatim so it compares byte-for-byte
    /// against the addressed conversation id.
    pub fn principal(&self) -> Option<Principal> {
        let user = self.user.as_ref()?;
        let username = user.username.as_deref().filter(|value| !value.is_empty())?;
        Some(Principal::new(username, Role::from_claim(user.role.as_deref())))
    }
}

#[derive(Clone)]
/// Verifier bound to one algorithm and key, selected at startup.
pub struct JwtVerifier {
    algorithm: JwtAlgorithm,
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithm", &self.algorithm.as_str())
            .field("key", &"<redacted>")
            .finish()
    }
}

impl JwtVerifier {
    /// Builds a verifier. For HMAC methods `secret` is the shared key; for
    /// `EdDSA` it is the base64-encoded 32-byte Ed25519 public key.
    pub fn new(method: &str, secret: &str) -> Result<Self> {
        let algorithm = JwtAlgorithm::parse(method)?;
        let secret = secret.trim();
        if secret.is_empty() {
            bail!("jwt secret cannot be empty");
        }
        let key = match algorithm {
            JwtAlgorithm::Hs256 | JwtAlgorithm::Hs384 | JwtAlgorithm::Hs512 => {
                DecodingKey::from_secret(secret.as_bytes())
            }
            JwtAlgorithm::EdDsa => {
                let decoded = BASE64
                    .decode(secret)
                    .context("failed to decode base64 EdDSA public key")?;
                if decoded.len() != 32 {
                    return Err(anyhow!(
                        "EdDSA public key decoded to {} bytes (expected 32)",
                        decoded.len()
                    ));
                }
                DecodingKey::from_ed_der(&decoded)
            }
        };

        // exp and nbf are honoured when present but neither is mandatory.
        let mut validation = Validation::new(algorithm.library_algorithm());
        validation.required_spec_claims.clear();
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.validate_aud = false;

        Ok(Self {
            algorithm,
            key,
            validation,
        })
    }

    pub fn algorithm(&self) -> JwtAlgorithm {
        self.algorithm
    }

    /// Verifies `token` against the configured key and the current time.
    pub fn verify(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let token = token.trim();
        let header = jsonwebtoken::decode_header(token)?;
        let expected = self.algorithm.library_algorithm();
        if header.alg != expected {
            return Err(JwtError::AlgorithmMismatch {
                expected: self.algorithm.as_str(),
                found: format!("{:?}", header.alg),
            });
        }
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

/// Decodes claims without checking the signature or validity window.
///
/// Intended for diagnostics and fuzzing only; never use the result for access
/// decisions.
pub fn decode_jwt_claims_unverified(token: &str) -> Result<JwtClaims, JwtError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    let data = jsonwebtoken::decode::<JwtClaims>(
        token.trim(),
        &DecodingKey::from_secret(&[]),
        &validation,
    )?;
    Ok(data.claims)
}
