//! 人流快照采样
//!
//! 周期对每个正在供餐的档位拍一张快照：活跃预约数从 booking 表
//! 实时统计，不信任档位上的冗余计数器。顺带裁剪过保留期的老快照。

use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tokio_util::sync::CancellationToken;

use crate::core::tasks::run_periodic;
use crate::crowd::classifier::classify;
use crate::db::models::{CrowdSnapshot, slot::occupancy_pct};
use crate::db::repository::{BookingRepository, SlotRepository, SnapshotRepository};
use crate::utils::{AppError, AppResult, time};

/// 近期等待样本缺失时的快照兜底 (分钟)
const DEFAULT_AVG_WAIT_MINUTES: f64 = 5.0;

#[derive(Clone)]
pub struct SnapshotRecorder {
    slots: SlotRepository,
    bookings: BookingRepository,
    snapshots: SnapshotRepository,
    civil_offset_minutes: i32,
    retention_days: i64,
}

impl SnapshotRecorder {
    pub fn new(db: Surreal<Db>, civil_offset_minutes: i32, retention_days: i64) -> Self {
        Self {
            slots: SlotRepository::new(db.clone()),
            bookings: BookingRepository::new(db.clone()),
            snapshots: SnapshotRepository::new(db),
            civil_offset_minutes,
            retention_days,
        }
    }

    /// 周期任务入口
    pub async fn run(self, interval_secs: u64, shutdown: CancellationToken) {
        let interval = Duration::from_secs(interval_secs);
        run_periodic("crowd-snapshot", interval, shutdown, move || {
            let recorder = self.clone();
            async move {
                let taken = recorder
                    .record_once()
                    .await
                    .map_err(|e| format!("snapshot pass failed: {e}"))?;
                if taken > 0 {
                    tracing::debug!(snapshots = taken, "Crowd snapshots recorded");
                }
                recorder.prune().await;
                Ok(())
            }
        })
        .await;
    }

    /// 单轮采样：对当日每个正处供餐窗口内的档位各拍一张
    ///
    /// 单个档位失败只记日志并继续，不拖垮整轮。
    pub async fn record_once(&self) -> AppResult<usize> {
        let today = time::civil_today(self.civil_offset_minutes);
        let now_time = time::civil_time_now(self.civil_offset_minutes);
        let slots = self.slots.find_slots_by_date(today).await?;

        let mut taken = 0usize;
        for slot in slots {
            if now_time < slot.start || now_time > slot.end {
                continue;
            }
            match self.snapshot_slot(&slot).await {
                Ok(()) => taken += 1,
                Err(e) => {
                    tracing::warn!(slot = %slot.name, error = %e, "Snapshot failed for slot");
                }
            }
        }
        Ok(taken)
    }

    async fn snapshot_slot(&self, slot: &crate::db::models::DailySlot) -> AppResult<()> {
        let slot_id = slot
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Slot record without id"))?;

        let active = self.bookings.count_active(&slot_id).await?;
        let pct = occupancy_pct(active, slot.capacity);
        let now = time::now_millis();
        let avg_wait = self
            .bookings
            .recent_avg_wait_minutes(&slot_id, now - 3_600_000)
            .await?
            .unwrap_or(DEFAULT_AVG_WAIT_MINUTES);
        let tokens = self.bookings.active_tokens(&slot_id).await?;

        self.snapshots
            .insert(CrowdSnapshot {
                id: None,
                slot: slot_id,
                template: slot.template.clone(),
                slot_name: slot.name.clone(),
                slot_window: slot.window(),
                taken_at: now,
                active_bookings: active,
                capacity: slot.capacity,
                occupancy_pct: pct,
                level: classify(pct),
                avg_wait_minutes: avg_wait,
                active_tokens: tokens,
            })
            .await?;
        Ok(())
    }

    async fn prune(&self) {
        let cutoff = time::now_millis() - self.retention_days * 86_400_000;
        match self.snapshots.prune_before(cutoff).await {
            Ok(0) => {}
            Ok(n) => tracing::debug!(pruned = n, "Old crowd snapshots pruned"),
            Err(e) => tracing::warn!(error = %e, "Snapshot pruning failed"),
        }
    }
}
