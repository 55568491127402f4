//! Alert Model - 告警记录

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;

/// 告警类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Overcrowding,
    CapacityWarning,
    SpikeDetected,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Overcrowding => "overcrowding",
            AlertKind::CapacityWarning => "capacity_warning",
            AlertKind::SpikeDetected => "spike_detected",
        }
    }
}

/// 告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// 告警记录
///
/// 由告警巡检创建，只能被显式 resolve 修改；
/// 已解决的记录按保留期裁剪。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// 当日档位引用 (档位可能已不存在，查询时过滤孤儿)
    #[serde(with = "serde_helpers::record_id")]
    pub slot: RecordId,
    /// 餐别名称 (冗余快照)
    pub slot_name: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    /// 触发时占用率 (0-100)
    pub occupancy_pct: u32,
    /// 触发时活跃预约数
    pub active_bookings: i64,
    pub capacity: i64,
    /// 已通知的员工/管理员名单
    #[serde(default)]
    pub notified: Vec<String>,
    #[serde(default, deserialize_with = "serde_helpers::bool_false")]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    /// 创建时间 (Unix millis)
    pub created_at: i64,
}
