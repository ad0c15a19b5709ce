//! API Routes
//!
//! Configures the Axum router with all listing cache endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    get_property_handler, health_handler, invalidate_handler, metrics_handler, search_handler,
    sync_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /debug/cache-metrics` - Cache metrics snapshot (when enabled)
/// - `POST /sync/property` - Rebuild one read-model document (secret + rate limit)
/// - `POST /admin/cache/invalidate` - Invalidate a pattern or a property's set (secret)
/// - `GET /properties` - Filtered, paginated listing search (read-through)
/// - `GET /properties/:id` - Single listing document (read-through)
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/debug/cache-metrics", get(metrics_handler))
        .route("/sync/property", post(sync_handler))
        .route("/admin/cache/invalidate", post(invalidate_handler))
        .route("/properties", get(search_handler))
        .route("/properties/:id", get(get_property_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
