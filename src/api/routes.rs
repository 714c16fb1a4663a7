//! API route definitions
//!
//! - /api/v1/health - backend and arbitration counters
//! - /api/v1/wells - well registry
//! - /api/v1/wells/:well_id/diagnose - screen one well
//! - /api/v1/wells/:well_id/override - human supervisor edit
//! - /api/v1/memory/stats - decision memory statistics

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, ApiState};

/// Create all v1 API routes
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/wells", get(handlers::list_wells))
        .route("/wells/:well_id", get(handlers::get_well))
        .route("/wells/:well_id/diagnose", post(handlers::diagnose_well))
        .route("/wells/:well_id/override", post(handlers::override_well))
        .route("/memory/stats", get(handlers::get_memory_stats))
        .with_state(state)
}
