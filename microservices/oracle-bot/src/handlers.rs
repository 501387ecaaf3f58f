//! HTTP handlers: probes, metrics and navigation diagnostics

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use oracle_core::{DependencyStatus, HealthStatus, OracleError, ReadinessStatus, UserId};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::error::ApiResult;
use crate::metrics::MetricsSnapshot;
use crate::router::Router;

pub const SERVICE_ID: &str = "oracle-bot";

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub telegram_connected: Arc<AtomicBool>,
    pub start_time: Instant,
}

impl AppState {
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            service_id: SERVICE_ID.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn readiness(&self) -> ReadinessStatus {
        let telegram = self.telegram_connected.load(Ordering::Relaxed);
        let screens = self.router.menus().registry().len();

        ReadinessStatus {
            ready: telegram && screens > 0,
            dependencies: vec![
                DependencyStatus {
                    name: "telegram".to_string(),
                    available: telegram,
                    latency_ms: None,
                },
                DependencyStatus {
                    name: "menu_registry".to_string(),
                    available: screens > 0,
                    latency_ms: None,
                },
            ],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NavigationView {
    pub user_id: UserId,
    pub path: Vec<String>,
    pub current: String,
    pub depth: usize,
    pub locale: String,
    pub first_seen: Option<DateTime<Utc>>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.health())
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessStatus>) {
    let readiness = state.readiness();
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.router.metrics().snapshot())
}

pub async fn get_navigation(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<NavigationView>> {
    let user = parse_user(&user_id)?;
    let navigation = state.router.menus().navigation();

    Ok(Json(NavigationView {
        user_id: user,
        path: navigation
            .path(user)
            .iter()
            .map(|screen| screen.to_string())
            .collect(),
        current: navigation.current(user).to_string(),
        depth: navigation.depth(user),
        locale: state.router.users().locale(user).to_string(),
        first_seen: state.router.users().profile(user).map(|profile| profile.first_seen),
    }))
}

pub async fn reset_navigation(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<StatusCode> {
    let user = parse_user(&user_id)?;
    state.router.menus().navigation().reset(user);
    info!(user_id = %user, "Navigation reset over HTTP");
    Ok(StatusCode::NO_CONTENT)
}

fn parse_user(raw: &str) -> Result<UserId, OracleError> {
    raw.parse()
        .map_err(|_| OracleError::Validation(format!("Invalid user id: {}", raw)))
}

pub fn routes(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(health))
        .route("/ready", axum::routing::get(ready))
        .route("/metrics", axum::routing::get(metrics))
        .route(
            "/navigation/{user_id}",
            axum::routing::get(get_navigation).delete(reset_navigation),
        )
        .with_state(state)
}
