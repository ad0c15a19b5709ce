//! API Module
//!
//! HTTP handlers and routing for the listing cache service.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /debug/cache-metrics` - Cache metrics snapshot
//! - `POST /sync/property` - Read-model sync (shared secret, rate limited)
//! - `POST /admin/cache/invalidate` - Pattern invalidation (shared secret)
//! - `GET /properties` - Listing search
//! - `GET /properties/:id` - Single listing

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
