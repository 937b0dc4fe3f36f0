//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

/// Longest key the server accepts.
pub const MAX_KEY_LEN: usize = 256;

/// Request body for `PUT /objects`
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: The value to store
/// - `pinned`: Keep one pin on behalf of the caller (default false)
#[derive(Debug, Clone, Deserialize)]
pub struct PutObjectRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: String,
    /// Insert pinned instead of idle
    #[serde(default)]
    pub pinned: bool,
}

impl PutObjectRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LEN {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LEN
            ));
        }
        None
    }
}

/// Query string of `DELETE /objects/:key`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteParams {
    /// The caller gives up its own pin as part of the removal
    #[serde(default)]
    pub drop_ref: bool,
}
