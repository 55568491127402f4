//! Booking API Handlers
//!
//! 所有接口只操作 `x-user-id` 本人的预约，越权一律 403。

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::queue::lifecycle::{BookingCreate, BookingModify, BookingView};
use crate::utils::{AppResponse, AppResult, ok};

/// POST /bookings - 创建预约
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<BookingCreate>,
) -> AppResult<(StatusCode, Json<AppResponse<BookingView>>)> {
    let view = state.lifecycle.create(&user.id, payload).await?;
    Ok((StatusCode::CREATED, ok(view)))
}

/// GET /bookings - 本人的预约列表
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<AppResponse<Vec<BookingView>>>> {
    let views = state.lifecycle.list_for_student(&user.id).await?;
    Ok(ok(views))
}

/// GET /bookings/{id} - 单个预约
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<BookingView>>> {
    let view = state.lifecycle.get_owned(&user.id, &id).await?;
    Ok(ok(view))
}

/// PUT /bookings/{id} - 替换餐品 (仅 pending)
pub async fn update_items(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<BookingModify>,
) -> AppResult<Json<AppResponse<BookingView>>> {
    let view = state.lifecycle.modify_items(&user.id, &id, payload).await?;
    Ok(ok(view))
}

/// DELETE /bookings/{id} - 取消预约 (仅 pending)
pub async fn cancel(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<BookingView>>> {
    let view = state.lifecycle.cancel(&user.id, &id).await?;
    Ok(ok(view))
}
