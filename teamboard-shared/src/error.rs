//! Error taxonomy for the core services
//!
//! Every operation in [`crate::services`] fails with a [`CoreError`]. The
//! layer-specific errors (store, identity, authorization, enum parsing)
//! convert into it, and the API crate maps each kind to an HTTP response.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::authorization::AuthzError;
use crate::auth::identity::AuthError;
use crate::models::ParseEnumError;
use crate::store::StoreError;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Which authorization gate rejected a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    /// Caller is not a member of the team
    Membership,

    /// Caller is a member but lacks the required role
    Role,

    /// Caller is neither the author/assignee nor a manager
    Ownership,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::Membership => "membership",
            Gate::Role => "role",
            Gate::Ownership => "ownership",
        }
    }
}

/// Failure of a core operation
#[derive(Debug, Error)]
pub enum CoreError {
    /// No valid identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid identity, but a gate rejected the action
    #[error("Forbidden: {message}")]
    Forbidden { gate: Gate, message: String },

    /// Referenced team/task/comment/user does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input or a violated business rule
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate membership
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The change would leave a team without a manager
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Unexpected failure; the detail is for logs only
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn forbidden(gate: Gate, message: impl Into<String>) -> Self {
        CoreError::Forbidden {
            gate,
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        CoreError::NotFound(format!("{} not found", what))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    /// Machine-readable kind, as sent to clients
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Unauthorized(_) => "unauthorized",
            CoreError::Forbidden { .. } => "forbidden",
            CoreError::NotFound(_) => "not_found",
            CoreError::Validation(_) => "validation_error",
            CoreError::Conflict(_) => "conflict",
            CoreError::InvariantViolation(_) => "invariant_violation",
            CoreError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Store operation failed");
        CoreError::Internal(err.to_string())
    }
}

impl From<AuthzError> for CoreError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(_) => CoreError::forbidden(Gate::Membership, err.to_string()),
            AuthzError::InsufficientRole { .. } => CoreError::forbidden(Gate::Role, err.to_string()),
            AuthzError::NotAuthorized(_) => CoreError::forbidden(Gate::Ownership, err.to_string()),
            AuthzError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        CoreError::Unauthorized(err.to_string())
    }
}

impl From<ParseEnumError> for CoreError {
    fn from(err: ParseEnumError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamRole;
    use uuid::Uuid;

    #[test]
    fn test_authz_errors_carry_gate() {
        let err: CoreError = AuthzError::NotMember(Uuid::new_v4()).into();
        assert!(matches!(
            err,
            CoreError::Forbidden {
                gate: Gate::Membership,
                ..
            }
        ));

        let err: CoreError = AuthzError::InsufficientRole {
            required: TeamRole::Manager,
            actual: TeamRole::Member,
        }
        .into();
        assert!(matches!(err, CoreError::Forbidden { gate: Gate::Role, .. }));
    }

    #[test]
    fn test_parse_error_is_validation() {
        let err: CoreError = "paused"
            .parse::<crate::models::TaskStatus>()
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_gate_as_str() {
        assert_eq!(Gate::Membership.as_str(), "membership");
        assert_eq!(Gate::Ownership.as_str(), "ownership");
    }
}
