//! Booking Repository
//!
//! 状态迁移全部用 `UPDATE ... WHERE status = <from>` 的条件更新表达：
//! guard 和写入是同一条语句，并发竞争者只有一个能赢。

use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, CountRow, RepoError, RepoResult};
use crate::db::models::{Booking, BookingItem, ModificationEntry};

const TABLE: &str = "booking";

#[derive(Clone)]
pub struct BookingRepository {
    base: BaseRepository,
}

impl BookingRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub async fn create(&self, booking: Booking) -> RepoResult<Booking> {
        let created: Option<Booking> = self.base.db().create(TABLE).content(booking).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create booking".to_string()))
    }

    pub async fn find_by_id(&self, id: &RecordId) -> RepoResult<Option<Booking>> {
        let booking: Option<Booking> = self.base.db().select(id.clone()).await?;
        Ok(booking)
    }

    /// 某学生的全部预约，最近的在前
    pub async fn find_by_student(&self, student: &str) -> RepoResult<Vec<Booking>> {
        let bookings: Vec<Booking> = self
            .base
            .db()
            .query("SELECT * FROM booking WHERE student = $student ORDER BY booked_at DESC")
            .bind(("student", student.to_string()))
            .await?
            .take(0)?;
        Ok(bookings)
    }

    /// 档位的活跃预约 (pending/serving)，按队列位置升序
    pub async fn find_active_by_slot(&self, slot: &RecordId) -> RepoResult<Vec<Booking>> {
        let bookings: Vec<Booking> = self
            .base
            .db()
            .query(
                "SELECT * FROM booking
                 WHERE slot = $slot AND status IN ['pending', 'serving']
                 ORDER BY queue_position",
            )
            .bind(("slot", slot.clone()))
            .await?
            .take(0)?;
        Ok(bookings)
    }

    /// 档位的 pending 预约，按队列位置升序
    pub async fn find_pending_by_slot(&self, slot: &RecordId) -> RepoResult<Vec<Booking>> {
        let bookings: Vec<Booking> = self
            .base
            .db()
            .query(
                "SELECT * FROM booking
                 WHERE slot = $slot AND status = 'pending'
                 ORDER BY queue_position",
            )
            .bind(("slot", slot.clone()))
            .await?
            .take(0)?;
        Ok(bookings)
    }

    /// 队首 pending 预约
    ///
    /// 不用 `LIMIT 1`：嵌入式 SDK 在 WHERE + LIMIT 组合下会丢首行，
    /// 这里取完整有序结果再在内存里取第一个。
    pub async fn first_pending(&self, slot: &RecordId) -> RepoResult<Option<Booking>> {
        let bookings = self.find_pending_by_slot(slot).await?;
        Ok(bookings.into_iter().next())
    }

    /// 全部 pending 预约 (过期巡检用)，按档位、位置排序
    pub async fn find_all_pending(&self) -> RepoResult<Vec<Booking>> {
        let bookings: Vec<Booking> = self
            .base
            .db()
            .query(
                "SELECT * FROM booking WHERE status = 'pending'
                 ORDER BY slot, queue_position",
            )
            .await?
            .take(0)?;
        Ok(bookings)
    }

    // ========================================================================
    // Counters
    // ========================================================================

    /// 自某时刻起为该档位创建的预约数 (取号序号用)
    pub async fn count_for_slot_since(&self, slot: &RecordId, since: i64) -> RepoResult<i64> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT count() AS count FROM booking
                 WHERE slot = $slot AND booked_at >= $since GROUP ALL",
            )
            .bind(("slot", slot.clone()))
            .bind(("since", since))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(|r| r.count).unwrap_or(0))
    }

    /// 档位活跃预约数 (快照采样和一致性校验用)
    pub async fn count_active(&self, slot: &RecordId) -> RepoResult<i64> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT count() AS count FROM booking
                 WHERE slot = $slot AND status IN ['pending', 'serving'] GROUP ALL",
            )
            .bind(("slot", slot.clone()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(|r| r.count).unwrap_or(0))
    }

    /// 档位当前最大活跃队列位置，无活跃预约时 0
    pub async fn max_active_position(&self, slot: &RecordId) -> RepoResult<i64> {
        #[derive(Debug, serde::Deserialize)]
        struct MaxRow {
            max_pos: Option<i64>,
        }

        let mut result = self
            .base
            .db()
            .query(
                "SELECT math::max(queue_position) AS max_pos FROM booking
                 WHERE slot = $slot AND status IN ['pending', 'serving'] GROUP ALL",
            )
            .bind(("slot", slot.clone()))
            .await?;
        let rows: Vec<MaxRow> = result.take(0)?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.max_pos)
            .unwrap_or(0))
    }

    /// 档位活跃取号标签，按位置升序
    pub async fn active_tokens(&self, slot: &RecordId) -> RepoResult<Vec<String>> {
        let bookings = self.find_active_by_slot(slot).await?;
        Ok(bookings.into_iter().map(|b| b.token_number).collect())
    }

    /// 近一小时内完成供餐的预约的平均等待 (分钟)
    ///
    /// 等待 = served_at - booked_at。没有样本时返回 None。
    pub async fn recent_avg_wait_minutes(
        &self,
        slot: &RecordId,
        since: i64,
    ) -> RepoResult<Option<f64>> {
        #[derive(Debug, serde::Deserialize)]
        struct WaitRow {
            booked_at: i64,
            served_at: i64,
        }

        let mut result = self
            .base
            .db()
            .query(
                "SELECT booked_at, served_at FROM booking
                 WHERE slot = $slot AND status = 'served' AND served_at >= $since",
            )
            .bind(("slot", slot.clone()))
            .bind(("since", since))
            .await?;
        let rows: Vec<WaitRow> = result.take(0)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let total: i64 = rows
            .iter()
            .map(|r| (r.served_at - r.booked_at).max(0))
            .sum();
        Ok(Some(total as f64 / rows.len() as f64 / 60_000.0))
    }

    // ========================================================================
    // Position mutations (single-statement, atomic)
    // ========================================================================

    /// 移除位置后压缩：所有位置大于 `removed` 的活跃预约原子 -1
    pub async fn shift_positions_after(&self, slot: &RecordId, removed: i64) -> RepoResult<()> {
        self.base
            .db()
            .query(
                "UPDATE booking SET queue_position -= 1
                 WHERE slot = $slot AND status IN ['pending', 'serving']
                   AND queue_position > $removed",
            )
            .bind(("slot", slot.clone()))
            .bind(("removed", removed))
            .await?;
        Ok(())
    }

    /// 直接写入某预约的队列位置 (renumber 用)
    pub async fn set_position(&self, id: &RecordId, position: i64) -> RepoResult<()> {
        self.base
            .db()
            .query("UPDATE $id SET queue_position = $position")
            .bind(("id", id.clone()))
            .bind(("position", position))
            .await?;
        Ok(())
    }

    // ========================================================================
    // Guarded status transitions
    // ========================================================================

    /// pending → serving (正常叫号和员工 override 共用)
    ///
    /// 返回更新后的预约；guard 不满足 (已不是 pending) 时 None。
    pub async fn transition_to_serving(&self, id: &RecordId) -> RepoResult<Option<Booking>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $id SET status = 'serving'
                 WHERE status = 'pending' RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .await?;
        let updated: Vec<Booking> = result.take(0)?;
        Ok(updated.into_iter().next())
    }

    /// serving → served
    pub async fn transition_to_served(&self, id: &RecordId, now: i64) -> RepoResult<Option<Booking>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $id SET status = 'served', served_at = $now
                 WHERE status = 'serving' RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .bind(("now", now))
            .await?;
        let updated: Vec<Booking> = result.take(0)?;
        Ok(updated.into_iter().next())
    }

    /// pending → cancelled
    pub async fn transition_to_cancelled(
        &self,
        id: &RecordId,
        now: i64,
    ) -> RepoResult<Option<Booking>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $id SET status = 'cancelled', cancelled_at = $now
                 WHERE status = 'pending' RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .bind(("now", now))
            .await?;
        let updated: Vec<Booking> = result.take(0)?;
        Ok(updated.into_iter().next())
    }

    /// pending → expired (后台巡检)
    pub async fn transition_to_expired(
        &self,
        id: &RecordId,
        now: i64,
    ) -> RepoResult<Option<Booking>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $id SET status = 'expired', expired_at = $now
                 WHERE status = 'pending' RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .bind(("now", now))
            .await?;
        let updated: Vec<Booking> = result.take(0)?;
        Ok(updated.into_iter().next())
    }

    /// 替换餐品并追加修改日志 (仅 pending)
    pub async fn replace_items(
        &self,
        id: &RecordId,
        items: Vec<BookingItem>,
        now: i64,
    ) -> RepoResult<Option<Booking>> {
        let entry = ModificationEntry {
            at: now,
            items: items.clone(),
        };
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $id SET items = $items, modifications += $entry
                 WHERE status = 'pending' RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .bind(("items", items))
            .bind(("entry", entry))
            .await?;
        let updated: Vec<Booking> = result.take(0)?;
        Ok(updated.into_iter().next())
    }

    /// 当前是否已有 serving 预约 (叫号 guard)
    pub async fn serving_exists(&self, slot: &RecordId) -> RepoResult<bool> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT count() AS count FROM booking
                 WHERE slot = $slot AND status = 'serving' GROUP ALL",
            )
            .bind(("slot", slot.clone()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(|r| r.count).unwrap_or(0) > 0)
    }
}
