//! Error types for the object cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the object cache and its HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Operation requires a present key and none exists
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Unpin requested on an object that holds no pin
    #[error("Object not pinned: {0}")]
    NotPinned(String),

    /// Removal attempted on an object still pinned by someone else
    #[error("Object {key} is still pinned (pin count {pin_count})")]
    PinConflict { key: String, pin_count: i32 },

    /// Unique-key cache already holds an object for the key
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Fault strategy failed to materialize a value
    #[error("Fault failed for key {key}: {source}")]
    Fault {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Discard strategy failed after an explicit removal
    #[error("Discard failed for key {key}: {source}")]
    Discard {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::NotPinned(_)
            | CacheError::PinConflict { .. }
            | CacheError::DuplicateKey(_) => StatusCode::CONFLICT,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Fault { .. } => StatusCode::BAD_GATEWAY,
            CacheError::Discard { .. } | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the object cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (CacheError::NotPinned("k".into()), StatusCode::CONFLICT),
            (
                CacheError::PinConflict {
                    key: "k".into(),
                    pin_count: 2,
                },
                StatusCode::CONFLICT,
            ),
            (CacheError::DuplicateKey("k".into()), StatusCode::CONFLICT),
            (
                CacheError::InvalidRequest("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CacheError::Fault {
                    key: "k".into(),
                    source: anyhow::anyhow!("backend down"),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_fault_keeps_source() {
        let err = CacheError::Fault {
            key: "k".into(),
            source: anyhow::anyhow!("backend down"),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("backend down"));
        assert!(err.to_string().contains("backend down"));
    }
}
