//! Alert API Handlers
//!
//! 员工/管理员专用。

use axum::{
    Json,
    extract::{Path, State},
};

use crate::alerts::AlertResolve;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::AlertRecord;
use crate::utils::{AppResponse, AppResult, ok};

/// GET /alerts - 未解决告警 (过滤孤儿记录)
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<AppResponse<Vec<AlertRecord>>>> {
    user.require_staff()?;
    let alerts = state.detector.list_active().await?;
    Ok(ok(alerts))
}

/// PUT /alerts/{id}/resolve - 标记告警已解决
///
/// 重复解决返回 409，响应消息带当前状态。
pub async fn resolve(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Option<Json<AlertResolve>>,
) -> AppResult<Json<AppResponse<AlertRecord>>> {
    user.require_staff()?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let alert = state.detector.resolve(&id, &user.id, payload).await?;
    Ok(ok(alert))
}
