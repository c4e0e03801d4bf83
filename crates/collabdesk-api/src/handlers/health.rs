//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use utoipa::ToSchema;

use crate::auth::AppState;

const HEALTHY: &str = "healthy";
const UNHEALTHY: &str = "unhealthy";

/// Basic health response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health of one dependency
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detailed health response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub version: String,
    pub database: ComponentHealth,
}

/// Basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HEALTHY.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses((status = 200, description = "Process is running"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness check, pings the database
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to serve"),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.db_pool.health_check().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Detailed health check with database latency
#[utoipa::path(
    get,
    path = "/health/detailed",
    tag = "health",
    responses(
        (status = 200, description = "Detailed health status", body = DetailedHealthResponse)
    )
)]
pub async fn health_detailed(State(state): State<Arc<AppState>>) -> Json<DetailedHealthResponse> {
    let start = Instant::now();
    let database = match state.db_pool.health_check().await {
        Ok(()) => ComponentHealth {
            status: HEALTHY.to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => ComponentHealth {
            status: UNHEALTHY.to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    Json(DetailedHealthResponse {
        status: database.status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
}
