//! Daily Crowd Rollup Model - 按日/小时的历史汇总

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;
use super::snapshot::CrowdLevel;

/// 单小时汇总桶
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyBucket {
    /// 小时 (0-23)
    pub hour: u32,
    /// 平均占用率 (0-100)
    pub avg_occupancy: f64,
    /// 平均等待 (分钟)
    pub avg_wait: f64,
    pub level: CrowdLevel,
    /// 该小时内的快照样本数
    pub samples: u32,
}

/// 每日人流汇总 — 每 (档位模板, 日期) 一行
///
/// 由每日汇总任务以确定性 ID upsert，重跑覆盖而不重复。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCrowdRollup {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// 档位模板引用
    #[serde(with = "serde_helpers::record_id")]
    pub template: RecordId,
    pub date: NaiveDate,
    /// 有样本的小时桶 (最多 24 个)
    pub hours: Vec<HourlyBucket>,
    /// 高峰小时 (平均占用率 > 60)
    pub peak_hours: Vec<u32>,
    /// 日平均占用率
    pub day_avg_occupancy: f64,
    /// 日最大占用率
    pub day_max_occupancy: f64,
    /// 全天样本总数
    pub total_samples: u32,
}

impl DailyCrowdRollup {
    /// 确定性记录 key: "<template_key>_<yyyymmdd>"
    ///
    /// 同一 (模板, 日期) 重算时 upsert 到同一行。
    pub fn record_key(template: &RecordId, date: NaiveDate) -> String {
        format!(
            "{}_{}",
            template.key(),
            date.format("%Y%m%d")
        )
    }

    /// 取指定小时的桶
    pub fn bucket_for_hour(&self, hour: u32) -> Option<&HourlyBucket> {
        self.hours.iter().find(|b| b.hour == hour)
    }
}
