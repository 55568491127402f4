//! 队列位置管理
//!
//! 档位内的活跃预约 (pending/serving) 必须构成连续的 1..N 序列，
//! 无空洞、无重复。队列顺序是严格的按位置 FIFO。
//!
//! 调用方负责持有档位锁；本模块只做位置运算和写入。

use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;

use crate::db::repository::BookingRepository;
use crate::utils::AppResult;

#[derive(Clone)]
pub struct QueuePositionManager {
    bookings: BookingRepository,
}

impl QueuePositionManager {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            bookings: BookingRepository::new(db),
        }
    }

    /// 下一个可用位置：max(活跃位置) + 1，空队列时 1
    pub async fn next_position(&self, slot: &RecordId) -> AppResult<i64> {
        let max = self.bookings.max_active_position(slot).await?;
        Ok(max + 1)
    }

    /// 移除后压缩：位置大于 `removed` 的活跃预约整体 -1，恢复连续性
    ///
    /// 取消和过期都走这里。
    pub async fn compact_after_removal(&self, slot: &RecordId, removed: i64) -> AppResult<()> {
        self.bookings.shift_positions_after(slot, removed).await?;
        Ok(())
    }

    /// 供餐完成后重排：按位置顺序重走全部 pending 预约，重新赋 1..N
    ///
    /// serving 预约离开活跃集后，队头需要同时压缩和晋升。
    pub async fn renumber_after_serve(&self, slot: &RecordId) -> AppResult<()> {
        let pending = self.bookings.find_pending_by_slot(slot).await?;
        self.renumber(&pending).await
    }

    /// 巡检后的整队重排：全部活跃预约重新赋 1..N
    pub async fn renumber_active(&self, slot: &RecordId) -> AppResult<()> {
        let active = self.bookings.find_active_by_slot(slot).await?;
        self.renumber(&active).await
    }

    async fn renumber(&self, ordered: &[crate::db::models::Booking]) -> AppResult<()> {
        for (idx, booking) in ordered.iter().enumerate() {
            let expected = idx as i64 + 1;
            if booking.queue_position != expected
                && let Some(id) = &booking.id
            {
                self.bookings.set_position(id, expected).await?;
            }
        }
        Ok(())
    }
}
