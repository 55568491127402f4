//! Crowd Snapshot Model - 人流快照

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;

/// 人流等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrowdLevel {
    Low,
    Medium,
    High,
}

impl CrowdLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrowdLevel::Low => "low",
            CrowdLevel::Medium => "medium",
            CrowdLevel::High => "high",
        }
    }
}

impl std::fmt::Display for CrowdLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 人流快照 (不可变，定时采样产生)
///
/// 按保留期裁剪，老快照由采样任务顺带删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrowdSnapshot {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// 当日档位引用
    #[serde(with = "serde_helpers::record_id")]
    pub slot: RecordId,
    /// 档位模板引用 (汇总按模板分组)
    #[serde(with = "serde_helpers::record_id")]
    pub template: RecordId,
    /// 餐别名称 (冗余，CSV 导出用)
    pub slot_name: String,
    /// 供餐时间窗文本 (如 "12:00-14:00")
    pub slot_window: String,
    /// 采样时间 (Unix millis)
    pub taken_at: i64,
    pub active_bookings: i64,
    pub capacity: i64,
    /// 占用率 (0-100)
    pub occupancy_pct: u32,
    pub level: CrowdLevel,
    /// 近一小时平均等待 (分钟)
    pub avg_wait_minutes: f64,
    /// 采样时活跃的取号标签
    #[serde(default)]
    pub active_tokens: Vec<String>,
}
