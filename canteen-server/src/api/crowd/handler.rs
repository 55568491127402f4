//! Crowd API Handlers
//!
//! `/status` 绕过快照缓存直接从 booking 表统计；`/export` 和
//! `/history` 读采样/汇总数据；`/forecast` 优先外部服务，
//! 失败时用本地汇总做启发式兜底，错误不外传。

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use chrono::{DateTime, Datelike, Duration as ChronoDuration};
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::crowd::classify;
use crate::crowd::forecast::{ForecastDay, ForecastInterval, ForecastResponse};
use crate::db::models::{CrowdLevel, DailyCrowdRollup, slot::occupancy_pct};
use crate::db::repository::{BookingRepository, RollupRepository, SnapshotRepository, SlotRepository};
use crate::utils::{AppError, AppResponse, AppResult, ok, time};

/// CSV 导出表头 (列顺序与客户端报表模板绑定，不可改)
const EXPORT_HEADER: &str = "Timestamp,Slot Name,Slot Time,Active Bookings,Total Capacity,Occupancy Rate (%),Active Tokens,Avg Wait Time (min),Crowd Level";

/// 本地兜底预测的回看窗口 (天)
const HEURISTIC_LOOKBACK_DAYS: i64 = 28;

/// 预测天数
const FORECAST_HORIZON_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

/// 单档位实时状态
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotStatus {
    pub slot_id: String,
    pub name: String,
    pub window: String,
    pub active_bookings: i64,
    pub capacity: i64,
    pub occupancy_pct: u32,
    pub level: CrowdLevel,
    /// 近一小时平均等待 (分钟)
    pub avg_wait_minutes: f64,
    pub active_tokens: Vec<String>,
}

/// GET /crowd/status - 当日各档位实时占用
pub async fn status(
    State(state): State<ServerState>,
    _user: CurrentUser,
) -> AppResult<Json<AppResponse<Vec<SlotStatus>>>> {
    let today = time::civil_today(state.config.civil_offset_minutes);
    let slots = SlotRepository::new(state.db.clone())
        .find_slots_by_date(today)
        .await?;
    let bookings = BookingRepository::new(state.db.clone());

    let mut statuses = Vec::with_capacity(slots.len());
    for slot in slots {
        let Some(id) = slot.id.clone() else { continue };
        let active = bookings.count_active(&id).await?;
        let pct = occupancy_pct(active, slot.capacity);
        let avg_wait = bookings
            .recent_avg_wait_minutes(&id, time::now_millis() - 3_600_000)
            .await?
            .unwrap_or(5.0);
        let tokens = bookings.active_tokens(&id).await?;
        statuses.push(SlotStatus {
            slot_id: id.to_string(),
            name: slot.name.clone(),
            window: slot.window(),
            active_bookings: active,
            capacity: slot.capacity,
            occupancy_pct: pct,
            level: classify(pct),
            avg_wait_minutes: avg_wait,
            active_tokens: tokens,
        });
    }
    Ok(ok(statuses))
}

/// GET /crowd/history/{templateId}?days=N - 按模板的汇总历史
pub async fn history(
    State(state): State<ServerState>,
    _user: CurrentUser,
    Path(template_id): Path<String>,
    Query(query): Query<DaysQuery>,
) -> AppResult<Json<AppResponse<Vec<DailyCrowdRollup>>>> {
    let template: RecordId = template_id
        .parse()
        .or_else(|_| format!("slot_template:{template_id}").parse())
        .map_err(|_| AppError::validation(format!("Invalid template id: {template_id}")))?;

    let days = query.days.unwrap_or(7).clamp(1, 90);
    let from = time::civil_today(state.config.civil_offset_minutes) - ChronoDuration::days(days);
    let rollups = RollupRepository::new(state.db.clone())
        .find_since(&template, from)
        .await?;
    Ok(ok(rollups))
}

/// GET /crowd/export?days=N - 快照 CSV 导出 (员工)
pub async fn export(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<DaysQuery>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;

    let days = query.days.unwrap_or(1).clamp(1, 30);
    let end = time::now_millis();
    let start = end - days * 86_400_000;
    let snapshots = SnapshotRepository::new(state.db.clone())
        .find_range(start, end)
        .await?;

    let offset = time::civil_offset(state.config.civil_offset_minutes);
    let mut body = String::with_capacity(snapshots.len() * 96 + EXPORT_HEADER.len() + 1);
    body.push_str(EXPORT_HEADER);
    body.push('\n');
    for snap in &snapshots {
        let timestamp = DateTime::from_timestamp_millis(snap.taken_at)
            .map(|dt| dt.with_timezone(&offset).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        body.push_str(&format!(
            "{},{},{},{},{},{},{},{:.1},{}\n",
            timestamp,
            csv_field(&snap.slot_name),
            snap.slot_window,
            snap.active_bookings,
            snap.capacity,
            snap.occupancy_pct,
            csv_field(&snap.active_tokens.join("|")),
            snap.avg_wait_minutes,
            snap.level,
        ));
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"crowd_snapshots.csv\"",
            ),
        ],
        body,
    ))
}

/// GET /crowd/forecast - 未来需求预测
///
/// 外部服务失败时降级到本地汇总的启发式预测，502 不会到达客户端。
pub async fn forecast(
    State(state): State<ServerState>,
    _user: CurrentUser,
) -> AppResult<Json<AppResponse<ForecastResponse>>> {
    match state.forecast.daily().await {
        Ok(response) => Ok(ok(response)),
        Err(AppError::ExternalService(reason)) => {
            tracing::warn!(error = %reason, "Forecast service unavailable, using local heuristic");
            let today = time::civil_today(state.config.civil_offset_minutes);
            let rollups = RollupRepository::new(state.db.clone())
                .find_all_since(today - ChronoDuration::days(HEURISTIC_LOOKBACK_DAYS))
                .await?;
            Ok(ok(heuristic_forecast(&rollups, today, state.config.civil_offset_minutes)))
        }
        Err(e) => Err(e),
    }
}

/// 本地启发式预测：同星期几的历史日均占用率平均
fn heuristic_forecast(
    rollups: &[DailyCrowdRollup],
    today: chrono::NaiveDate,
    civil_offset_minutes: i32,
) -> ForecastResponse {
    let overall: Option<f64> = if rollups.is_empty() {
        None
    } else {
        Some(rollups.iter().map(|r| r.day_avg_occupancy).sum::<f64>() / rollups.len() as f64)
    };

    let mut data = Vec::with_capacity(FORECAST_HORIZON_DAYS as usize);
    for offset in 1..=FORECAST_HORIZON_DAYS {
        let date = today + ChronoDuration::days(offset);
        let same_weekday: Vec<f64> = rollups
            .iter()
            .filter(|r| r.date.weekday() == date.weekday())
            .map(|r| r.day_avg_occupancy)
            .collect();
        let predicted = if same_weekday.is_empty() {
            overall.unwrap_or(50.0)
        } else {
            same_weekday.iter().sum::<f64>() / same_weekday.len() as f64
        };
        data.push(ForecastDay {
            date: date.to_string(),
            day_name: date.format("%A").to_string(),
            predicted_demand: predicted,
            confidence: ForecastInterval {
                lower: predicted * 0.85,
                upper: predicted * 1.15,
            },
        });
    }

    ForecastResponse {
        forecast_type: "daily".to_string(),
        model_used: "rollup_heuristic".to_string(),
        generated_at: time::civil_now(civil_offset_minutes).to_rfc3339(),
        forecast_horizon: FORECAST_HORIZON_DAYS as u32,
        data,
    }
}

/// 含逗号/引号的字段加引号转义
fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rollup(date: NaiveDate, avg: f64) -> DailyCrowdRollup {
        DailyCrowdRollup {
            id: None,
            template: "slot_template:lunch".parse().unwrap(),
            date,
            hours: Vec::new(),
            peak_hours: Vec::new(),
            day_avg_occupancy: avg,
            day_max_occupancy: avg,
            total_samples: 10,
        }
    }

    #[test]
    fn csv_field_escapes_commas_and_quotes() {
        assert_eq!(csv_field("Lunch"), "Lunch");
        assert_eq!(csv_field("Lunch, Main"), "\"Lunch, Main\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn heuristic_prefers_same_weekday_history() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(); // Thursday
        // 上周五 80，上周四 40
        let rollups = vec![
            rollup(NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(), 80.0),
            rollup(NaiveDate::from_ymd_opt(2026, 8, 13).unwrap(), 40.0),
        ];
        let forecast = heuristic_forecast(&rollups, today, 0);
        assert_eq!(forecast.data.len(), FORECAST_HORIZON_DAYS as usize);
        // 明天是周五，应取周五历史
        assert_eq!(forecast.data[0].day_name, "Friday");
        assert_eq!(forecast.data[0].predicted_demand, 80.0);
        // 无同星期历史的日期回落到全局平均
        assert_eq!(forecast.data[1].predicted_demand, 60.0);
    }

    #[test]
    fn heuristic_without_history_uses_default() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();
        let forecast = heuristic_forecast(&[], today, 0);
        assert!(forecast.data.iter().all(|d| d.predicted_demand == 50.0));
    }
}
