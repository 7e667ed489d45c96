//! JWT validation for tokens issued by the identity service
//!
//! Tokens are HS256-signed and carry the user's id, email and display name.
//! The board never issues tokens for end users; [`create_token`] exists for
//! development tooling and tests that need to act as the identity service.
//!
//! # Claims
//!
//! - `sub`: user ID (UUID)
//! - `email`: contact address
//! - `name`: optional display name
//! - `iss`: issuer, checked against the configured value
//! - `iat` / `nbf` / `exp`: issued-at, not-before and expiry (Unix seconds)
//!
//! # Example
//!
//! ```
//! use teamboard_shared::auth::jwt::{create_token, validate_token, Claims};
//! use uuid::Uuid;
//!
//! let secret = "development-secret-at-least-32-bytes";
//! let claims = Claims::new(Uuid::new_v4(), "dev@example.com", None, "teamboard");
//! let token = create_token(&claims, secret).unwrap();
//!
//! let validated = validate_token(&token, secret, "teamboard").unwrap();
//! assert_eq!(validated.sub, claims.sub);
//! ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default lifetime of a token minted by [`Claims::new`]
pub const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 24;

/// JWT error types
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Token encoding failed
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, format or claim validation failed
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token is past its `exp`
    #[error("Token has expired")]
    Expired,

    /// Token was not issued by the expected issuer
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,

    /// User's contact address
    pub email: String,

    /// User's display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl Claims {
    /// Creates claims valid from now for the default lifetime
    pub fn new(
        user_id: Uuid,
        email: impl Into<String>,
        name: Option<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self::with_expiration(
            user_id,
            email,
            name,
            issuer,
            Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS),
        )
    }

    /// Creates claims valid from now for `expires_in`
    pub fn with_expiration(
        user_id: Uuid,
        email: impl Into<String>,
        name: Option<String>,
        issuer: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            email: email.into(),
            name,
            iss: issuer.into(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates signature, issuer, expiry and not-before
///
/// # Errors
///
/// - [`JwtError::Expired`] if the token is past `exp`
/// - [`JwtError::InvalidIssuer`] if `iss` doesn't match `issuer`
/// - [`JwtError::ValidationError`] for anything else (bad signature,
///   malformed token, missing claims)
pub fn validate_token(token: &str, secret: &str, issuer: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
            expected: issuer.to_string(),
        },
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}
