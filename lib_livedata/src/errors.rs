//! # Error Taxonomy
//!
//! The single error type surfaced by every accessor. Remote failures are
//! folded into six categories; only `Unavailable` is considered transient
//! and eligible for local retry, everything else propagates to the caller
//! for user-visible handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A field-level validation message attached to `ValidationFailed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every way a remote data-access operation can fail.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid credential was attached to the request.
    #[error("not authenticated")]
    Unauthenticated,

    /// The credential lacks capability for the target collection.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request referenced unknown fields or violated the schema.
    #[error("validation failed: {message}")]
    ValidationFailed {
        message: String,
        fields: Vec<FieldError>,
    },

    /// Concurrent modification detected (optimistic-lock mismatch).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transient remote failure; safe to retry with backoff.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Anything the taxonomy does not recognize.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Whether a bounded local retry is appropriate for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Unavailable(_))
    }

    /// Maps a machine-readable error code from the response envelope.
    pub fn from_code(code: &str, message: &str, fields: Vec<FieldError>) -> Self {
        match code {
            "UNAUTHENTICATED" => ApiError::Unauthenticated,
            "FORBIDDEN" => ApiError::Forbidden(message.to_string()),
            "VALIDATION_ERROR" => ApiError::ValidationFailed {
                message: message.to_string(),
                fields,
            },
            "CONFLICT" => ApiError::Conflict(message.to_string()),
            "UNAVAILABLE" => ApiError::Unavailable(message.to_string()),
            other => ApiError::Unknown(format!("{}: {}", other, message)),
        }
    }

    /// Maps a non-2xx HTTP status to the taxonomy.
    pub fn from_status(status: u16, body: Option<String>) -> Self {
        let detail = body.unwrap_or_else(|| format!("HTTP {}", status));
        match status {
            401 => ApiError::Unauthenticated,
            403 => ApiError::Forbidden(detail),
            400 | 422 => ApiError::ValidationFailed {
                message: detail,
                fields: Vec::new(),
            },
            409 => ApiError::Conflict(detail),
            408 | 429 | 500..=599 => ApiError::Unavailable(detail),
            _ => ApiError::Unknown(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_their_variants() {
        assert!(matches!(
            ApiError::from_code("UNAUTHENTICATED", "x", vec![]),
            ApiError::Unauthenticated
        ));
        assert!(matches!(
            ApiError::from_code("FORBIDDEN", "no access", vec![]),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from_code("CONFLICT", "revision mismatch", vec![]),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from_code("UNAVAILABLE", "try later", vec![]),
            ApiError::Unavailable(_)
        ));
    }

    #[test]
    fn validation_errors_keep_field_messages() {
        let fields = vec![FieldError {
            field: "email".to_string(),
            message: "must not be empty".to_string(),
        }];
        match ApiError::from_code("VALIDATION_ERROR", "bad input", fields) {
            ApiError::ValidationFailed { fields, .. } => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "email");
            }
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn unrecognized_code_becomes_unknown() {
        assert!(matches!(
            ApiError::from_code("TEAPOT", "short and stout", vec![]),
            ApiError::Unknown(_)
        ));
    }

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(ApiError::Unavailable("503".to_string()).is_retryable());
        assert!(!ApiError::Unauthenticated.is_retryable());
        assert!(!ApiError::Conflict("rev".to_string()).is_retryable());
        assert!(!ApiError::Unknown("?".to_string()).is_retryable());
    }

    #[test]
    fn http_statuses_map_to_taxonomy() {
        assert!(matches!(ApiError::from_status(401, None), ApiError::Unauthenticated));
        assert!(matches!(ApiError::from_status(403, None), ApiError::Forbidden(_)));
        assert!(matches!(ApiError::from_status(409, None), ApiError::Conflict(_)));
        assert!(matches!(ApiError::from_status(503, None), ApiError::Unavailable(_)));
        assert!(matches!(ApiError::from_status(418, None), ApiError::Unknown(_)));
    }
}
