//! Staff API Handlers
//!
//! 全部需要 staff/admin 角色。

use axum::{
    Json,
    extract::{Path, State},
};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::queue::lifecycle::BookingView;
use crate::utils::{AppResponse, AppResult, ok};

/// POST /staff/call-next/{slotId} - 叫号：队首 pending → serving
pub async fn call_next(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(slot_id): Path<String>,
) -> AppResult<Json<AppResponse<BookingView>>> {
    user.require_staff()?;
    let view = state.lifecycle.call_next(&slot_id).await?;
    Ok(ok(view))
}

/// PUT /staff/mark-serving/{bookingId} - 指定预约 → serving (override)
pub async fn mark_serving(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(booking_id): Path<String>,
) -> AppResult<Json<AppResponse<BookingView>>> {
    user.require_staff()?;
    let view = state.lifecycle.mark_serving(&booking_id).await?;
    Ok(ok(view))
}

/// PUT /staff/mark-served/{bookingId} - 供餐完成
pub async fn mark_served(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(booking_id): Path<String>,
) -> AppResult<Json<AppResponse<BookingView>>> {
    user.require_staff()?;
    let view = state.lifecycle.mark_served(&booking_id).await?;
    Ok(ok(view))
}
