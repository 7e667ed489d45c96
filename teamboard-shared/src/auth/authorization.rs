//! Authorization checks against team membership
//!
//! Every check re-reads the membership from the store; roles can change
//! between requests, so nothing here is cached.
//!
//! # Permission Model
//!
//! 1. **Team membership**: the caller must belong to the team
//! 2. **Role**: managers can do everything members can, plus roster and task
//!    administration
//! 3. **Resource ownership**: comment authors and task assignees get extra
//!    rights on their own resources

use uuid::Uuid;

use crate::models::TeamRole;
use crate::store::{Store, StoreError};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// User is not a member of the team
    #[error("Not a member of team {0}")]
    NotMember(Uuid),

    /// User doesn't have required role
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole { required: TeamRole, actual: TeamRole },

    /// User is neither the owner of the resource nor a manager
    #[error("{0}")]
    NotAuthorized(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Returns the caller's role, optionally requiring a minimum role
///
/// # Errors
///
/// - [`AuthzError::NotMember`] if the user has no membership in the team
/// - [`AuthzError::InsufficientRole`] if `required` is set and not satisfied
pub async fn authorize(
    store: &dyn Store,
    team_id: Uuid,
    user_id: Uuid,
    required: Option<TeamRole>,
) -> Result<TeamRole, AuthzError> {
    let role = store
        .find_membership(team_id, user_id)
        .await?
        .map(|m| m.role)
        .ok_or(AuthzError::NotMember(team_id))?;

    if let Some(required) = required {
        if !role.satisfies(required) {
            return Err(AuthzError::InsufficientRole {
                required,
                actual: role,
            });
        }
    }

    Ok(role)
}

/// Allows the resource owner, or a manager when `managers_allowed` is set
pub fn require_owner_or_manager(
    caller_id: Uuid,
    caller_role: TeamRole,
    owner_id: Option<Uuid>,
    managers_allowed: bool,
    message: &str,
) -> Result<(), AuthzError> {
    if owner_id == Some(caller_id) || (managers_allowed && caller_role.is_manager()) {
        return Ok(());
    }

    Err(AuthzError::NotAuthorized(message.to_string()))
}
