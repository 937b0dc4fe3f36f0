//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::debug;

use crate::cache::ObjectCache;
use crate::config::{Config, EvictionMode};
use crate::error::{CacheError, Result};
use crate::eviction::SweepEvictionStrategy;
use crate::models::{
    DeleteParams, DeleteResponse, HealthResponse, ObjectResponse, PinResponse, PutObjectRequest,
    PutObjectResponse, StatsResponse,
};
use crate::tasks::SweepSchedulers;

/// Cache type served over HTTP.
pub type ServerCache = ObjectCache<String, String>;

/// Sweep strategy type installed on [`ServerCache`].
pub type ServerSweep = SweepEvictionStrategy<String, String>;

/// Application state shared across all handlers.
///
/// The cache synchronizes internally, so handlers share it through a plain
/// `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ServerCache>,
    /// Installed sweep, if any
    pub sweep: Option<Arc<ServerSweep>>,
}

impl AppState {
    /// Creates a new AppState around `cache` with no eviction.
    pub fn new(cache: ServerCache) -> Self {
        Self {
            cache: Arc::new(cache),
            sweep: None,
        }
    }

    /// Builds the cache from configuration and installs a logging discard
    /// strategy plus the configured sweep on `schedulers`.
    pub fn from_config(config: &Config, schedulers: SweepSchedulers) -> Self {
        let cache = Arc::new(ObjectCache::new(config.cache_config()));
        cache.set_discard_strategy(Arc::new(log_discard));

        let sweep = match config.eviction_mode {
            EvictionMode::Background => {
                SweepEvictionStrategy::background(&cache, config.sweep_config(), schedulers)
            }
            EvictionMode::Foreground => {
                SweepEvictionStrategy::foreground(&cache, config.sweep_config(), schedulers)
            }
        };

        Self {
            cache,
            sweep: Some(sweep),
        }
    }
}

fn log_discard(key: &String, value: &String) -> anyhow::Result<()> {
    debug!(key = %key, bytes = value.len(), "Object discarded");
    Ok(())
}

/// Handler for `PUT /objects`
///
/// Caches a value, pinned once when the request asks for it.
pub async fn put_handler(
    State(state): State<AppState>,
    Json(req): Json<PutObjectRequest>,
) -> Result<Json<PutObjectResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let element = if req.pinned {
        state.cache.insert(req.key.clone(), req.value)?
    } else {
        state.cache.insert_unpinned(req.key.clone(), req.value)?
    };

    Ok(Json(PutObjectResponse::new(req.key, element.pin_count())))
}

/// Handler for `GET /objects/:key`
///
/// Looks the key up without pinning, faulting it in if a fault strategy is
/// installed.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ObjectResponse>> {
    let value = state
        .cache
        .find_or_fault(&key)?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(ObjectResponse::new(key, value)))
}

/// Handler for `POST /objects/:key/pin`
pub async fn pin_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PinResponse>> {
    let pin_count = state.cache.pin(&key)?;
    Ok(Json(PinResponse::new(key, pin_count)))
}

/// Handler for `POST /objects/:key/unpin`
///
/// Returns the pins still held on the object.
pub async fn unpin_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PinResponse>> {
    let pin_count = state.cache.unpin(&key)?;
    Ok(Json(PinResponse::new(key, pin_count)))
}

/// Handler for `DELETE /objects/:key?drop_ref=<bool>`
///
/// Removes the object and notifies the discard strategy.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteResponse>> {
    state
        .cache
        .remove_and_discard(&key, params.drop_ref)?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for `GET /stats`
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats();
    let sweep = state.sweep.as_ref().map(|sweep| sweep.stats());

    Json(StatsResponse::new(
        state.cache.name(),
        state.cache.bucket_count(),
        &stats,
        sweep,
    ))
}

/// Handler for `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
