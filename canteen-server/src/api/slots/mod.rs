//! Slot API 模块 - 当日档位与模板管理

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/slots", slot_routes())
}

fn slot_routes() -> Router<ServerState> {
    Router::new()
        .route("/today", get(handler::today))
        .route(
            "/templates",
            get(handler::list_templates).post(handler::create_template),
        )
}
