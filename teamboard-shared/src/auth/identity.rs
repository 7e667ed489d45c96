//! Identity resolution
//!
//! Turns a request credential into an [`Identity`]. The core only ever sees
//! the resolved identity, never the raw credential, so authentication stays
//! out of the authorization and lifecycle logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};
use crate::models::User;

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

impl Identity {
    /// Name shown on events, falling back to the email address
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    /// Profile record mirrored into the store
    pub fn to_user(&self) -> User {
        User::new(self.user_id, self.email.clone(), self.name.clone())
    }
}

/// Identity resolution errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential was presented
    #[error("Missing credentials")]
    MissingCredentials,

    /// Credential present but not in the expected shape
    #[error("Invalid credential format: {0}")]
    InvalidFormat(String),

    /// Credential rejected
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Result<&str, AuthError> {
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Resolves a credential into a verified identity
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Resolver for HS256 tokens issued by the identity service
#[derive(Clone)]
pub struct JwtIdentityResolver {
    secret: String,
    issuer: String,
}

impl JwtIdentityResolver {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
        }
    }
}

impl std::fmt::Debug for JwtIdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityResolver")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = validate_token(token, &self.secret, &self.issuer)?;

        Ok(Identity {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
        })
    }
}
