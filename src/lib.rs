//! Listing Cache - caching core for a property listing service
//!
//! Read-through cache with versioned keys and wildcard invalidation over
//! Redis (or an in-memory fallback), a denormalized read-model synchronizer,
//! and a fixed-window rate limiter sharing the same backend.

pub mod api;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod property;
pub mod ratelimit;
pub mod readmodel;
pub mod tasks;

pub use api::AppState;
pub use bootstrap::Backends;
pub use config::Config;
pub use tasks::spawn_cleanup_task;
