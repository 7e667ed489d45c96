/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `teams`: Team CRUD
/// - `members`: Roster management, role changes and leaving
/// - `tasks`: Task CRUD, listing filters and status transitions
/// - `comments`: Per-task comment thread
/// - `realtime`: WebSocket channel for team events

pub mod comments;
pub mod health;
pub mod members;
pub mod realtime;
pub mod tasks;
pub mod teams;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ApiError, ValidationErrorDetail};

/// Response body of the DELETE endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Length check for a nullable PATCH field
pub(crate) fn check_max_chars(
    field: &str,
    value: &Option<Option<String>>,
    max: usize,
    message: &str,
) -> Result<(), ApiError> {
    match value {
        Some(Some(text)) if text.chars().count() > max => Err(ApiError::ValidationError {
            message: "Request validation failed".to_string(),
            details: vec![ValidationErrorDetail {
                field: field.to_string(),
                message: message.to_string(),
            }],
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        description: Option<Option<String>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.description, None);

        let cleared: Patch = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let set: Patch = serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        assert_eq!(set.description, Some(Some("x".to_string())));
    }

    #[test]
    fn test_check_max_chars() {
        assert!(check_max_chars("d", &Some(Some("abc".into())), 3, "too long").is_ok());
        assert!(check_max_chars("d", &Some(Some("abcd".into())), 3, "too long").is_err());
        assert!(check_max_chars("d", &Some(None), 3, "too long").is_ok());
    }
}
