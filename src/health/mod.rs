/*!
 * # Health Check Module
 *
 * - Liveness (`/health`): the process is up and serving
 * - Readiness (`/health/ready`): the database answers a ping and the cache backend responds
 */

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::AppState;

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Degraded,
}

/// Health check detail
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthDetail {
    pub status: HealthStatus,
    pub message: Option<String>,
}

/// Overall health information
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub details: BTreeMap<String, HealthDetail>,
}

static STARTED: OnceLock<Instant> = OnceLock::new();

fn uptime_seconds() -> u64 {
    STARTED.get_or_init(Instant::now).elapsed().as_secs()
}

fn overall(details: &BTreeMap<String, HealthDetail>) -> HealthStatus {
    // The database is required; anything else only degrades the service.
    match details.get("database").map(|d| d.status) {
        Some(HealthStatus::Down) => HealthStatus::Down,
        _ if details.values().any(|d| d.status != HealthStatus::Up) => HealthStatus::Degraded,
        _ => HealthStatus::Up,
    }
}

fn status_code(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Up | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Liveness check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is alive", body = HealthInfo))
)]
pub async fn health_check() -> Json<HealthInfo> {
    Json(HealthInfo {
        status: HealthStatus::Up,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        uptime_seconds: uptime_seconds(),
        details: BTreeMap::new(),
    })
}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to accept traffic", body = HealthInfo),
        (status = 503, description = "Database unreachable", body = HealthInfo),
    )
)]
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthInfo>) {
    let mut details = BTreeMap::new();

    let database = match crate::db::check_connection(&state.db).await {
        Ok(()) => HealthDetail {
            status: HealthStatus::Up,
            message: None,
        },
        Err(e) => {
            error!("Database health check failed: {}", e);
            HealthDetail {
                status: HealthStatus::Down,
                message: Some(e.to_string()),
            }
        }
    };
    details.insert("database".to_string(), database);

    let cache = match state.services.cache.backend().exists("health:probe").await {
        Ok(_) => HealthDetail {
            status: HealthStatus::Up,
            message: None,
        },
        Err(e) => {
            warn!("Cache health check failed: {}", e);
            HealthDetail {
                status: HealthStatus::Degraded,
                message: Some(e.to_string()),
            }
        }
    };
    details.insert("cache".to_string(), cache);

    let status = overall(&details);
    (
        status_code(status),
        Json(HealthInfo {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            uptime_seconds: uptime_seconds(),
            details,
        }),
    )
}

/// Creates router with health check endpoints
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(status: HealthStatus) -> HealthDetail {
        HealthDetail {
            status,
            message: None,
        }
    }

    #[test]
    fn database_down_means_down_and_cache_down_means_degraded() {
        let mut details = BTreeMap::new();
        details.insert("database".to_string(), detail(HealthStatus::Up));
        details.insert("cache".to_string(), detail(HealthStatus::Up));
        assert_eq!(overall(&details), HealthStatus::Up);

        details.insert("cache".to_string(), detail(HealthStatus::Degraded));
        assert_eq!(overall(&details), HealthStatus::Degraded);
        assert_eq!(status_code(HealthStatus::Degraded), StatusCode::OK);

        details.insert("database".to_string(), detail(HealthStatus::Down));
        assert_eq!(overall(&details), HealthStatus::Down);
        assert_eq!(status_code(HealthStatus::Down), StatusCode::SERVICE_UNAVAILABLE);
    }
}
