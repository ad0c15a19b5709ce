//! Request and Response models for the listing cache API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{InvalidateRequest, SearchQuery, SyncRequest};
pub use responses::{HealthResponse, InvalidateResponse};
