//! API request handlers
//!
//! All handlers return `Response` via [`ApiResponse::ok`] or [`ApiErrorResponse`].

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::acquisition::WellRegistry;
use crate::agents::{DecisionOrigin, DriverError, Orchestrator};
use crate::storage::MemoryStats;
use crate::types::{AgentDiagnosis, OverrideRequest, Verdict, WellAttributes, WorkoverCandidate};

/// Shared state for all handlers
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub wells: Arc<WellRegistry>,
    /// Cancelled on server shutdown; in-flight screenings abort without saving
    pub shutdown: CancellationToken,
}

impl ApiState {
    pub fn new(orchestrator: Arc<Orchestrator>, wells: Arc<WellRegistry>) -> Self {
        Self {
            orchestrator,
            wells,
            shutdown: CancellationToken::new(),
        }
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub well_count: usize,
    pub decisions_arbitrated: u64,
    pub integrity_vetoes: u64,
}

#[derive(Debug, Serialize)]
pub struct WellSummary {
    pub well_id: String,
    pub attribute_count: usize,
}

#[derive(Debug, Serialize)]
pub struct WellDetail {
    pub well_id: String,
    pub attributes: WellAttributes,
    /// Live cached decision, if any
    pub decision: Option<WorkoverCandidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiagnoseRequest {
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct DiagnoseResponse {
    pub verdict: Verdict,
    pub origin: DecisionOrigin,
    pub decision: WorkoverCandidate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production: Option<AgentDiagnosis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<AgentDiagnosis>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/health
pub async fn get_health(State(state): State<ApiState>) -> Response {
    let (decisions, vetoes) = state.orchestrator.arbitration_stats();
    ApiResponse::ok(HealthResponse {
        status: "ok",
        backend: state.orchestrator.backend_name(),
        well_count: state.wells.len(),
        decisions_arbitrated: decisions,
        integrity_vetoes: vetoes,
    })
}

/// GET /api/v1/wells
pub async fn list_wells(State(state): State<ApiState>) -> Response {
    let wells: Vec<WellSummary> = state
        .wells
        .well_ids()
        .filter_map(|id| {
            state.wells.get(id).map(|attrs| WellSummary {
                well_id: id.to_string(),
                attribute_count: attrs.len(),
            })
        })
        .collect();
    ApiResponse::ok(wells)
}

/// GET /api/v1/wells/:well_id
pub async fn get_well(State(state): State<ApiState>, Path(well_id): Path<String>) -> Response {
    let Some(attributes) = state.wells.get(&well_id) else {
        return ApiErrorResponse::not_found(format!("unknown well '{well_id}'"));
    };
    ApiResponse::ok(WellDetail {
        decision: state.orchestrator.memory().recall(&well_id),
        attributes: attributes.clone(),
        well_id,
    })
}

/// POST /api/v1/wells/:well_id/diagnose
pub async fn diagnose_well(
    State(state): State<ApiState>,
    Path(well_id): Path<String>,
    body: Option<Json<DiagnoseRequest>>,
) -> Response {
    let Some(attributes) = state.wells.get(&well_id) else {
        return ApiErrorResponse::not_found(format!("unknown well '{well_id}'"));
    };
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let cancel = state.shutdown.child_token();

    match state
        .orchestrator
        .process(&well_id, attributes, request.force_refresh, &cancel)
        .await
    {
        Ok(outcome) => ApiResponse::ok(DiagnoseResponse {
            verdict: outcome.decision.verdict(),
            origin: outcome.origin,
            decision: outcome.decision,
            production: outcome.production,
            integrity: outcome.integrity,
        }),
        Err(e) => driver_error_response(&well_id, &e),
    }
}

/// POST /api/v1/wells/:well_id/override
pub async fn override_well(
    State(state): State<ApiState>,
    Path(well_id): Path<String>,
    body: Result<Json<OverrideRequest>, JsonRejection>,
) -> Response {
    if state.wells.get(&well_id).is_none() {
        return ApiErrorResponse::not_found(format!("unknown well '{well_id}'"));
    }
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return ApiErrorResponse::malformed_override(rejection.body_text()),
    };

    match state.orchestrator.apply_override(&well_id, &request).await {
        Ok(decision) => ApiResponse::ok(decision),
        Err(e) => driver_error_response(&well_id, &e),
    }
}

/// GET /api/v1/memory/stats
pub async fn get_memory_stats(State(state): State<ApiState>) -> Response {
    let stats: MemoryStats = state.orchestrator.memory().stats();
    ApiResponse::ok(stats)
}

fn driver_error_response(well_id: &str, err: &DriverError) -> Response {
    match err {
        DriverError::Capability { .. } => ApiErrorResponse::capability_failure(err.to_string()),
        DriverError::Override(_) => ApiErrorResponse::malformed_override(err.to_string()),
        DriverError::Cancelled => ApiErrorResponse::service_unavailable(err.to_string()),
        DriverError::Storage(_) => {
            warn!(well_id, error = %err, "Decision store write failed");
            ApiErrorResponse::internal(err.to_string())
        }
    }
}
