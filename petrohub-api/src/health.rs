//! Health check handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::localization::keys;
use crate::responses::ResponseMapper;
use crate::state::AppState;

const HEALTHY: &str = "Healthy";
const UNHEALTHY: &str = "Unhealthy";

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always "Healthy" when the handler runs
    pub status: String,

    pub timestamp: DateTime<Utc>,

    /// Deployment environment name
    pub environment: String,

    /// Application version
    pub version: String,
}

/// Request culture as seen by the handler
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CultureResponse {
    pub current_culture: String,
    #[serde(rename = "currentUICulture")]
    pub current_ui_culture: String,
    /// The `Success` message in the request culture
    pub localized_message: String,
}

/// Dependency check report
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    /// "Healthy" when every check passes, "Unhealthy" otherwise
    pub status: String,

    /// Per-dependency results keyed by dependency name
    pub checks: BTreeMap<String, CheckStatus>,
}

/// Individual dependency status
///
/// Failure detail is logged, never returned.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckStatus {
    pub status: String,
}

/// Versioned health routes: `/health` and `/health/culture`
pub fn routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/health", get(health))
        .route("/health/culture", get(culture))
}

/// Liveness: always 200 while the service is running
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let service = &state.config().service;
    Json(HealthResponse {
        status: HEALTHY.to_string(),
        timestamp: Utc::now(),
        environment: service.environment.clone(),
        version: service.version.clone(),
    })
}

/// Report the culture resolved for this request
pub async fn culture(mapper: ResponseMapper) -> Json<CultureResponse> {
    let tag = mapper.locale().to_string();
    Json(CultureResponse {
        current_culture: tag.clone(),
        current_ui_culture: tag,
        localized_message: mapper.localize(keys::SUCCESS),
    })
}

/// Dependency check
///
/// Returns 200 when the store answers a ping, 503 Service Unavailable otherwise.
pub async fn dependencies(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store();
    let mut checks = BTreeMap::new();

    let store_status = match store.ping().await {
        Ok(()) => HEALTHY,
        Err(e) => {
            tracing::warn!(store = store.name(), error = %e, "Store health check failed");
            UNHEALTHY
        }
    };
    checks.insert(
        store.name().to_string(),
        CheckStatus {
            status: store_status.to_string(),
        },
    );

    let healthy = checks.values().all(|check| check.status == HEALTHY);
    let (status_code, status) = if healthy {
        (StatusCode::OK, HEALTHY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, UNHEALTHY)
    };

    (
        status_code,
        Json(HealthReport {
            status: status.to_string(),
            checks,
        }),
    )
}
