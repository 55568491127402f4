//! Crowd API 模块 - 实时状态、历史、CSV 导出与需求预测

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/crowd", crowd_routes())
}

fn crowd_routes() -> Router<ServerState> {
    Router::new()
        .route("/status", get(handler::status))
        .route("/history/{template_id}", get(handler::history))
        .route("/export", get(handler::export))
        .route("/forecast", get(handler::forecast))
}
