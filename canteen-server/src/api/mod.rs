//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`bookings`] - 学生预约接口
//! - [`staff`] - 员工叫号/供餐接口
//! - [`slots`] - 当日档位与模板管理
//! - [`crowd`] - 人流状态、历史、导出与预测
//! - [`alerts`] - 告警查询与解决

pub mod alerts;
pub mod bookings;
pub mod crowd;
pub mod health;
pub mod slots;
pub mod staff;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// 组装全部业务路由
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(bookings::router())
        .merge(staff::router())
        .merge(slots::router())
        .merge(crowd::router())
        .merge(alerts::router())
}

/// 业务路由 + 中间件层
pub fn build_app(state: ServerState) -> Router {
    build_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
