//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::eviction::SweepStats;

/// Response body for `GET /objects/:key`
#[derive(Debug, Clone, Serialize)]
pub struct ObjectResponse {
    /// The requested key
    pub key: String,
    /// The cached value
    pub value: String,
}

impl ObjectResponse {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for `PUT /objects`
#[derive(Debug, Clone, Serialize)]
pub struct PutObjectResponse {
    /// Success message
    pub message: String,
    /// The key that was stored
    pub key: String,
    /// Pin count right after insertion
    pub pin_count: i32,
}

impl PutObjectResponse {
    pub fn new(key: impl Into<String>, pin_count: i32) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' cached", key),
            key,
            pin_count,
        }
    }
}

/// Response body for the pin and unpin endpoints
#[derive(Debug, Clone, Serialize)]
pub struct PinResponse {
    pub key: String,
    /// Pin count after the operation
    pub pin_count: i32,
}

impl PinResponse {
    pub fn new(key: impl Into<String>, pin_count: i32) -> Self {
        Self {
            key: key.into(),
            pin_count,
        }
    }
}

/// Response body for `DELETE /objects/:key`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was removed
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' removed", key),
            key,
        }
    }
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Diagnostic cache name
    pub name: String,
    /// Number of hash buckets
    pub bucket_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub faults: u64,
    pub evictions: u64,
    pub discard_failures: u64,
    /// Current number of objects in the cache
    pub total_objects: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Sweep counters, when a sweep strategy is installed
    pub sweep: Option<SweepStats>,
}

impl StatsResponse {
    pub fn new(
        name: impl Into<String>,
        bucket_count: usize,
        stats: &CacheStats,
        sweep: Option<SweepStats>,
    ) -> Self {
        Self {
            name: name.into(),
            bucket_count,
            hits: stats.hits,
            misses: stats.misses,
            faults: stats.faults,
            evictions: stats.evictions,
            discard_failures: stats.discard_failures,
            total_objects: stats.total_objects,
            hit_rate: stats.hit_rate(),
            sweep,
        }
    }
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_response_serialize() {
        let resp = ObjectResponse::new("test_key", "test_value");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("test_key"));
        assert!(json.contains("test_value"));
    }

    #[test]
    fn test_put_response_serialize() {
        let resp = PutObjectResponse::new("my_key", 1);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("my_key"));
        assert!(json.contains("\"pin_count\":1"));
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            total_objects: 100,
            ..CacheStats::default()
        };
        let resp = StatsResponse::new("test", 251, &stats, None);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.total_objects, 100);
    }

    #[test]
    fn test_stats_response_includes_sweep() {
        let sweep = SweepStats {
            firings: 3,
            discard_threshold: 20,
            ..SweepStats::default()
        };
        let resp = StatsResponse::new("test", 17, &CacheStats::new(), Some(sweep));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["sweep"]["firings"], 3);
        assert_eq!(json["sweep"]["discard_threshold"], 20);
        assert_eq!(json["hit_rate"], 0.0);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
