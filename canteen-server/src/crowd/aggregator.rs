//! 每日按小时的人流汇总
//!
//! 午夜后把前一天的快照压成每 (档位模板, 日期) 一行的汇总：
//! 24 个小时桶、高峰小时、日均/日峰占用率。确定性 ID upsert，
//! 同一天重跑覆盖而不重复。

use chrono::{Duration as ChronoDuration, NaiveDate};
use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;
use tokio_util::sync::CancellationToken;

use crate::crowd::classifier::classify;
use crate::db::models::{CrowdSnapshot, DailyCrowdRollup, HourlyBucket};
use crate::db::repository::{RollupRepository, SnapshotRepository};
use crate::utils::{AppResult, time};

/// 高峰判定阈值：小时平均占用率 > 60
const PEAK_OCCUPANCY_THRESHOLD: f64 = 60.0;

/// 午夜后延迟几分钟再汇总，避开日界附近的迟到快照
const MIDNIGHT_DELAY_MINUTES: i64 = 5;

#[derive(Clone)]
pub struct HistoricalAggregator {
    snapshots: SnapshotRepository,
    rollups: RollupRepository,
    civil_offset_minutes: i32,
    retention_days: i64,
}

impl HistoricalAggregator {
    pub fn new(db: Surreal<Db>, civil_offset_minutes: i32, retention_days: i64) -> Self {
        Self {
            snapshots: SnapshotRepository::new(db.clone()),
            rollups: RollupRepository::new(db),
            civil_offset_minutes,
            retention_days,
        }
    }

    /// 每日任务入口：睡到 (民用) 午夜过后，汇总昨天并裁剪
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            let sleep =
                time::duration_until_next_midnight(self.civil_offset_minutes, MIDNIGHT_DELAY_MINUTES);
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Daily aggregator stopped");
                    return;
                }
                _ = tokio::time::sleep(sleep) => {}
            }

            let yesterday =
                time::civil_today(self.civil_offset_minutes) - ChronoDuration::days(1);
            match self.aggregate_day(yesterday).await {
                Ok(n) => tracing::info!(date = %yesterday, rollups = n, "Daily rollup complete"),
                Err(e) => tracing::error!(date = %yesterday, error = %e, "Daily rollup failed"),
            }

            let cutoff = time::civil_today(self.civil_offset_minutes)
                - ChronoDuration::days(self.retention_days);
            match self.rollups.prune_before(cutoff).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(pruned = n, "Old rollups pruned"),
                Err(e) => tracing::warn!(error = %e, "Rollup pruning failed"),
            }
        }
    }

    /// 汇总某一天：该日快照按模板分组，每组压成一行
    pub async fn aggregate_day(&self, date: NaiveDate) -> AppResult<usize> {
        let start = time::day_start_millis(date, self.civil_offset_minutes);
        let end = time::day_end_millis(date, self.civil_offset_minutes);
        let snapshots = self.snapshots.find_range(start, end).await?;
        if snapshots.is_empty() {
            return Ok(0);
        }

        let mut groups: Vec<(RecordId, Vec<CrowdSnapshot>)> = Vec::new();
        for snap in snapshots {
            match groups.iter_mut().find(|(t, _)| *t == snap.template) {
                Some((_, bucket)) => bucket.push(snap),
                None => groups.push((snap.template.clone(), vec![snap])),
            }
        }

        let mut written = 0usize;
        for (template, snaps) in groups {
            let rollup = build_rollup(template, date, &snaps, self.civil_offset_minutes);
            self.rollups.upsert(rollup).await?;
            written += 1;
        }
        Ok(written)
    }
}

/// 把一个模板某天的快照压成汇总行 (纯函数)
pub fn build_rollup(
    template: RecordId,
    date: NaiveDate,
    snapshots: &[CrowdSnapshot],
    civil_offset_minutes: i32,
) -> DailyCrowdRollup {
    let mut by_hour: [Vec<&CrowdSnapshot>; 24] = std::array::from_fn(|_| Vec::new());
    for snap in snapshots {
        let Some(hour) = time::hour_of_millis(snap.taken_at, civil_offset_minutes) else {
            continue;
        };
        by_hour[hour as usize % 24].push(snap);
    }

    let mut hours = Vec::new();
    let mut peak_hours = Vec::new();
    for (hour, bucket) in by_hour.iter().enumerate() {
        if bucket.is_empty() {
            continue;
        }
        let n = bucket.len() as f64;
        let avg_occupancy =
            bucket.iter().map(|s| s.occupancy_pct as f64).sum::<f64>() / n;
        let avg_wait = bucket.iter().map(|s| s.avg_wait_minutes).sum::<f64>() / n;
        if avg_occupancy > PEAK_OCCUPANCY_THRESHOLD {
            peak_hours.push(hour as u32);
        }
        hours.push(HourlyBucket {
            hour: hour as u32,
            avg_occupancy,
            avg_wait,
            level: classify(avg_occupancy.round() as u32),
            samples: bucket.len() as u32,
        });
    }

    let total = snapshots.len() as f64;
    let day_avg_occupancy =
        snapshots.iter().map(|s| s.occupancy_pct as f64).sum::<f64>() / total;
    let day_max_occupancy = snapshots
        .iter()
        .map(|s| s.occupancy_pct as f64)
        .fold(0.0, f64::max);

    DailyCrowdRollup {
        id: None,
        template,
        date,
        hours,
        peak_hours,
        day_avg_occupancy,
        day_max_occupancy,
        total_samples: snapshots.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::CrowdLevel;

    fn snap(template: &RecordId, taken_at: i64, pct: u32, wait: f64) -> CrowdSnapshot {
        CrowdSnapshot {
            id: None,
            slot: "daily_slot:s".parse().unwrap(),
            template: template.clone(),
            slot_name: "Lunch".into(),
            slot_window: "12:00-14:00".into(),
            taken_at,
            active_bookings: 0,
            capacity: 100,
            occupancy_pct: pct,
            level: classify(pct),
            avg_wait_minutes: wait,
            active_tokens: Vec::new(),
        }
    }

    #[test]
    fn buckets_by_hour_and_flags_peaks() {
        let template: RecordId = "slot_template:lunch".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();
        // 偏移 0，12 点两张高占用快照，9 点一张低占用
        let noon = time::day_start_millis(date, 0) + 12 * 3_600_000;
        let nine = time::day_start_millis(date, 0) + 9 * 3_600_000;
        let snaps = vec![
            snap(&template, noon, 80, 10.0),
            snap(&template, noon + 60_000, 90, 12.0),
            snap(&template, nine, 10, 2.0),
        ];

        let rollup = build_rollup(template, date, &snaps, 0);
        assert_eq!(rollup.total_samples, 3);
        assert_eq!(rollup.peak_hours, vec![12]);
        assert_eq!(rollup.day_max_occupancy, 90.0);
        assert_eq!(rollup.hours.len(), 2);

        let noon_bucket = rollup.bucket_for_hour(12).unwrap();
        assert_eq!(noon_bucket.samples, 2);
        assert_eq!(noon_bucket.avg_occupancy, 85.0);
        assert_eq!(noon_bucket.avg_wait, 11.0);
        assert_eq!(noon_bucket.level, CrowdLevel::High);

        let nine_bucket = rollup.bucket_for_hour(9).unwrap();
        assert_eq!(nine_bucket.level, CrowdLevel::Low);
    }
}
