//! Staff API 模块 - 叫号与供餐操作

mod handler;

use axum::{
    Router,
    routing::{post, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/staff", staff_routes())
}

fn staff_routes() -> Router<ServerState> {
    Router::new()
        .route("/call-next/{slot_id}", post(handler::call_next))
        .route("/mark-serving/{booking_id}", put(handler::mark_serving))
        .route("/mark-served/{booking_id}", put(handler::mark_served))
}
