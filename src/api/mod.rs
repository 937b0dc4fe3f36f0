//! API Module
//!
//! HTTP handlers and routing for inspecting and driving the cache.
//!
//! # Endpoints
//! - `PUT /objects` - Cache a value, optionally pinned
//! - `GET /objects/:key` - Look up (or fault in) a value
//! - `POST /objects/:key/pin` - Add a pin
//! - `POST /objects/:key/unpin` - Release a pin
//! - `DELETE /objects/:key` - Remove and discard
//! - `GET /stats` - Cache and sweep statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
