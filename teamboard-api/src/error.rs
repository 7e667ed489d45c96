/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; core failures convert through
/// `From<CoreError>`, so `?` is enough in a handler.
///
/// Every error body has the same shape:
///
/// ```json
/// {
///   "error": "forbidden",
///   "message": "Insufficient permissions: requires manager, has member",
///   "gate": "role"
/// }
/// ```
///
/// # Example
///
/// ```
/// use teamboard_api::error::{ApiError, ApiResult};
///
/// fn parse_limit(raw: &str) -> ApiResult<u32> {
///     raw.parse()
///         .map_err(|_| ApiError::BadRequest("limit must be a number".to_string()))
/// }
///
/// assert!(parse_limit("ten").is_err());
/// ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use teamboard_shared::auth::identity::AuthError;
use teamboard_shared::{CoreError, Gate};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400) - malformed body
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403), with the gate that rejected the caller
    Forbidden { gate: Option<Gate>, message: String },

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate membership
    Conflict(String),

    /// Conflict (409) - the change would leave a team without a manager
    InvariantViolation(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError {
        message: String,
        details: Vec<ValidationErrorDetail>,
    },

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Gate that rejected a forbidden request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<Gate>,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InvariantViolation(msg) => write!(f, "Invariant violation: {}", msg),
            ApiError::ValidationError { message, details } if details.is_empty() => {
                write!(f, "Validation failed: {}", message)
            }
            ApiError::ValidationError { details, .. } => {
                write!(f, "Validation failed: {} errors", details.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, gate, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None, None),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg, None, None)
            }
            ApiError::Forbidden { gate, message } => {
                (StatusCode::FORBIDDEN, "forbidden", message, gate, None)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None, None),
            ApiError::InvariantViolation(msg) => {
                (StatusCode::CONFLICT, "invariant_violation", msg, None, None)
            }
            ApiError::ValidationError { message, details } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                message,
                None,
                (!details.is_empty()).then_some(details),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            gate,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert core errors to API errors
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            CoreError::Forbidden { gate, message } => ApiError::Forbidden {
                gate: Some(gate),
                message,
            },
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::Validation(msg) => ApiError::validation(msg),
            CoreError::Conflict(msg) => ApiError::Conflict(msg),
            CoreError::InvariantViolation(msg) => ApiError::InvariantViolation(msg),
            CoreError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Convert identity errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Missing authorization header".to_string())
            }
            AuthError::InvalidFormat(msg) | AuthError::InvalidToken(msg) => {
                ApiError::Unauthorized(msg)
            }
        }
    }
}

/// Convert request DTO validation failures to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError {
            message: "Request validation failed".to_string(),
            details,
        }
    }
}

/// Convert JSON body rejections to API errors
///
/// A body that parses as JSON but has the wrong shape is a validation error;
/// anything else is a bad request.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => ApiError::validation(e.body_text()),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}
