//! Health API Handler

use axum::{Json, extract::State};
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::time;

#[derive(Debug, Serialize)]
pub struct HealthInfo {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: i64,
}

/// GET /health - 存活检查，无需身份
pub async fn health(State(state): State<ServerState>) -> Json<HealthInfo> {
    Json(HealthInfo {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (time::now_millis() - state.started_at) / 1000,
    })
}
