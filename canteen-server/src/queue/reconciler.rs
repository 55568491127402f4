//! 过期预约巡检
//!
//! 周期扫描全部 pending 预约，档位供餐窗口已结束的标记为 expired，
//! 释放名额并整队重排。被遗忘的预约靠这里回收，不占明天的容量。

use std::time::Duration;

use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;
use tokio_util::sync::CancellationToken;

use crate::core::tasks::run_periodic;
use crate::db::models::Booking;
use crate::db::repository::{BookingRepository, SlotRepository};
use crate::queue::locks::SlotLocks;
use crate::queue::position::QueuePositionManager;
use crate::utils::time;

/// 单次巡检结果
#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub expired: usize,
    pub slots_touched: usize,
}

#[derive(Clone)]
pub struct ExpiredBookingReconciler {
    slots: SlotRepository,
    bookings: BookingRepository,
    positions: QueuePositionManager,
    locks: SlotLocks,
    civil_offset_minutes: i32,
}

impl ExpiredBookingReconciler {
    pub fn new(db: Surreal<Db>, locks: SlotLocks, civil_offset_minutes: i32) -> Self {
        Self {
            slots: SlotRepository::new(db.clone()),
            bookings: BookingRepository::new(db.clone()),
            positions: QueuePositionManager::new(db),
            locks,
            civil_offset_minutes,
        }
    }

    /// 周期任务入口
    pub async fn run(self, interval_secs: u64, shutdown: CancellationToken) {
        let interval = Duration::from_secs(interval_secs);
        run_periodic("expiry-sweep", interval, shutdown, move || {
            let reconciler = self.clone();
            async move {
                match reconciler.sweep().await {
                    Ok(outcome) => {
                        if outcome.expired > 0 {
                            tracing::info!(
                                expired = outcome.expired,
                                slots = outcome.slots_touched,
                                "Expired bookings reconciled"
                            );
                        }
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .await;
    }

    /// 单次巡检：过期的 pending 全部转 expired
    ///
    /// 单个档位失败只记日志并继续，下一轮会重试。
    pub async fn sweep(&self) -> Result<SweepOutcome, String> {
        let pending = self
            .bookings
            .find_all_pending()
            .await
            .map_err(|e| format!("pending lookup failed: {e}"))?;

        let mut outcome = SweepOutcome::default();
        for (slot_id, group) in group_by_slot(pending) {
            match self.sweep_slot(&slot_id, &group).await {
                Ok(0) => {}
                Ok(n) => {
                    outcome.expired += n;
                    outcome.slots_touched += 1;
                }
                Err(e) => {
                    tracing::warn!(slot = %slot_id, error = %e, "Expiry sweep failed for slot");
                }
            }
        }
        Ok(outcome)
    }

    /// 处理单个档位的 pending 组；窗口未结束返回 0
    async fn sweep_slot(
        &self,
        slot_id: &RecordId,
        group: &[Booking],
    ) -> Result<usize, crate::utils::AppError> {
        let Some(slot) = self.slots.find_slot_by_id(slot_id).await? else {
            // 孤儿预约：档位记录已不可解析，留给人工处理
            tracing::warn!(slot = %slot_id, "Pending bookings reference a missing slot, skipping");
            return Ok(0);
        };

        let today = time::civil_today(self.civil_offset_minutes);
        let now_time = time::civil_time_now(self.civil_offset_minutes);
        let window_over =
            slot.date < today || (slot.date == today && now_time > slot.end);
        if !window_over {
            return Ok(0);
        }

        let _guard = self.locks.acquire(slot_id).await;

        // 按位置升序逐个守卫转移；并发取消/叫号会让 guard 落空，直接跳过
        let now = time::now_millis();
        let mut expired = 0usize;
        for booking in group {
            let Some(id) = &booking.id else { continue };
            if self.bookings.transition_to_expired(id, now).await?.is_some() {
                expired += 1;
            }
        }

        if expired > 0 {
            self.slots.release_many(slot_id, expired as i64).await?;
            self.positions.renumber_active(slot_id).await?;
        }
        Ok(expired)
    }
}

/// 按档位分组，组内保持查询给出的位置升序
fn group_by_slot(pending: Vec<Booking>) -> Vec<(RecordId, Vec<Booking>)> {
    let mut groups: Vec<(RecordId, Vec<Booking>)> = Vec::new();
    for booking in pending {
        match groups.last_mut() {
            Some((slot, bucket)) if *slot == booking.slot => bucket.push(booking),
            _ => groups.push((booking.slot.clone(), vec![booking])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::BookingStatus;

    fn booking(slot: &str, pos: i64) -> Booking {
        Booking {
            id: None,
            student: "s1".into(),
            slot: format!("daily_slot:{slot}").parse().unwrap(),
            token_number: format!("T{pos:03}"),
            items: Vec::new(),
            queue_position: pos,
            status: BookingStatus::Pending,
            booked_at: 0,
            served_at: None,
            cancelled_at: None,
            expired_at: None,
            estimated_wait_minutes: 5,
            modifications: Vec::new(),
        }
    }

    #[test]
    fn groups_preserve_slot_order() {
        let groups = group_by_slot(vec![
            booking("a", 1),
            booking("a", 2),
            booking("b", 1),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].1.len(), 1);
    }
}
