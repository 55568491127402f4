//! Slot API Handlers

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Serialize;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::crowd::classify;
use crate::db::models::{CrowdLevel, SlotTemplate, SlotTemplateCreate, slot::occupancy_pct};
use crate::db::repository::{BookingRepository, SlotRepository};
use crate::utils::{AppError, AppResponse, AppResult, ok};

/// 当日档位 (附实时占用)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub id: String,
    pub name: String,
    pub date: String,
    pub window: String,
    pub capacity: i64,
    pub active_bookings: i64,
    pub available: i64,
    pub occupancy_pct: u32,
    pub level: CrowdLevel,
    pub open: bool,
}

/// GET /slots/today - 当日档位，必要时从模板懒展开
///
/// 占用数从 booking 表实时统计，档位上的冗余计数器只用于准入。
pub async fn today(
    State(state): State<ServerState>,
    _user: CurrentUser,
) -> AppResult<Json<AppResponse<Vec<SlotView>>>> {
    let slots = state.allocator.ensure_today_slots().await?;
    let bookings = BookingRepository::new(state.db.clone());
    let now_time = crate::utils::time::civil_time_now(state.config.civil_offset_minutes);

    let mut views = Vec::with_capacity(slots.len());
    for slot in slots {
        let Some(id) = slot.id.clone() else { continue };
        let active = bookings.count_active(&id).await?;
        let pct = occupancy_pct(active, slot.capacity);
        views.push(SlotView {
            id: id.to_string(),
            name: slot.name.clone(),
            date: slot.date.to_string(),
            window: slot.window(),
            capacity: slot.capacity,
            active_bookings: active,
            available: (slot.capacity - active).max(0),
            occupancy_pct: pct,
            level: classify(pct),
            open: now_time >= slot.start && now_time < slot.end,
        });
    }
    Ok(ok(views))
}

/// GET /slots/templates - 模板列表 (员工)
pub async fn list_templates(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<AppResponse<Vec<SlotTemplate>>>> {
    user.require_staff()?;
    let repo = SlotRepository::new(state.db.clone());
    let templates = repo.find_templates().await?;
    Ok(ok(templates))
}

/// POST /slots/templates - 创建模板 (员工)
///
/// 只影响之后新展开的当日档位，已播种的日期不变。
pub async fn create_template(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<SlotTemplateCreate>,
) -> AppResult<(StatusCode, Json<AppResponse<SlotTemplate>>)> {
    user.require_staff()?;
    payload.validate()?;
    if payload.end <= payload.start {
        return Err(AppError::validation("end must be after start"));
    }

    let repo = SlotRepository::new(state.db.clone());
    let template = repo.create_template(payload).await?;
    tracing::info!(name = %template.name, capacity = template.capacity, "Slot template created");
    Ok((StatusCode::CREATED, ok(template)))
}
