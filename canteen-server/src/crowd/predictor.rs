//! 等待时间预测
//!
//! 队列位置 × 近 7 天同小时的历史单号平均等待。
//! 全函数：任何查找失败都降级到固定兜底，从不向调用方抛错。

use chrono::Duration;
use serde::Serialize;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::models::DailySlot;
use crate::db::repository::RollupRepository;
use crate::utils::time;

/// 历史缺失时的单号兜底等待 (分钟)
pub const FALLBACK_PER_TOKEN_MINUTES: f64 = 5.0;

/// 回看的历史天数
const LOOKBACK_DAYS: i64 = 7;

/// 预测置信度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

/// 预测结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitPrediction {
    pub predicted_wait_minutes: i64,
    pub per_token_minutes: f64,
    pub confidence: Confidence,
}

#[derive(Clone)]
pub struct WaitTimePredictor {
    rollups: RollupRepository,
    civil_offset_minutes: i32,
}

impl WaitTimePredictor {
    pub fn new(db: Surreal<Db>, civil_offset_minutes: i32) -> Self {
        Self {
            rollups: RollupRepository::new(db),
            civil_offset_minutes,
        }
    }

    /// 预测某档位、某队列位置的等待时间
    pub async fn predict(&self, slot: &DailySlot, queue_position: i64) -> WaitPrediction {
        let hour = time::civil_hour_now(self.civil_offset_minutes);
        let from =
            time::civil_today(self.civil_offset_minutes) - Duration::days(LOOKBACK_DAYS);

        let waits = match self.rollups.find_since(&slot.template, from).await {
            Ok(rollups) => rollups
                .iter()
                .filter_map(|r| r.bucket_for_hour(hour))
                .map(|b| b.avg_wait)
                .collect::<Vec<_>>(),
            Err(e) => {
                tracing::warn!(
                    slot = %slot.name,
                    error = %e,
                    "Rollup lookup failed, using fallback wait estimate"
                );
                Vec::new()
            }
        };

        estimate(&waits, queue_position)
    }
}

/// 纯预测算式
///
/// `per_token` = 历史同小时平均等待的均值，缺历史时 5 分钟；
/// `predicted` = max(1, position × per_token)。
pub fn estimate(same_hour_waits: &[f64], queue_position: i64) -> WaitPrediction {
    let (per_token, confidence) = if same_hour_waits.is_empty() {
        (FALLBACK_PER_TOKEN_MINUTES, Confidence::Low)
    } else {
        let avg = same_hour_waits.iter().sum::<f64>() / same_hour_waits.len() as f64;
        (avg, Confidence::High)
    };

    let predicted = ((queue_position as f64) * per_token).round() as i64;
    WaitPrediction {
        predicted_wait_minutes: predicted.max(1),
        per_token_minutes: per_token,
        confidence,
    }
}
