use axum::{extract::State, Json};
use docfollow_engine::SchedulerStatus;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{error::ApiResult, state::AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` when the database answers, `degraded` otherwise
    pub status: String,
    pub version: String,
    pub services: BTreeMap<String, String>,
    #[schema(value_type = Object)]
    pub scheduler: SchedulerStatus,
}

/// Health check endpoint
///
/// Reports database reachability, drafting-agent availability, gateway and
/// calendar configuration, and the scheduler's pending jobs.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let mut services = BTreeMap::new();

    let database_up = match state.persist.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            false
        }
    };
    services.insert(
        "database".to_string(),
        if database_up { "connected" } else { "disconnected" }.to_string(),
    );
    services.insert(
        "agents".to_string(),
        if state.engine.agent_available() { "available" } else { "unavailable" }.to_string(),
    );
    services.insert(
        "gateway".to_string(),
        if state.engine.gateway_configured() { "configured" } else { "unconfigured" }.to_string(),
    );
    services.insert(
        "calendar".to_string(),
        if state.engine.booking_configured() { "configured" } else { "unconfigured" }.to_string(),
    );

    let scheduler = state.scheduler.status().await?;

    Ok(Json(HealthResponse {
        status: if database_up { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services,
        scheduler,
    }))
}
