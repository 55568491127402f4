//! Slot Repository - 档位模板与当日档位

use chrono::NaiveDate;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{DailySlot, SlotTemplate, SlotTemplateCreate};

const TEMPLATE_TABLE: &str = "slot_template";
const SLOT_TABLE: &str = "daily_slot";

#[derive(Clone)]
pub struct SlotRepository {
    base: BaseRepository,
}

impl SlotRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    // ========================================================================
    // Templates
    // ========================================================================

    /// Find all slot templates ordered by start time
    pub async fn find_templates(&self) -> RepoResult<Vec<SlotTemplate>> {
        let templates: Vec<SlotTemplate> = self
            .base
            .db()
            .query("SELECT * FROM slot_template ORDER BY start")
            .await?
            .take(0)?;
        Ok(templates)
    }

    /// Create a new slot template
    pub async fn create_template(&self, data: SlotTemplateCreate) -> RepoResult<SlotTemplate> {
        if data.end <= data.start {
            return Err(RepoError::Validation(format!(
                "Slot end {} must be after start {}",
                data.end, data.start
            )));
        }

        let template = SlotTemplate {
            id: None,
            name: data.name,
            start: data.start,
            end: data.end,
            capacity: data.capacity,
        };

        let created: Option<SlotTemplate> = self
            .base
            .db()
            .create(TEMPLATE_TABLE)
            .content(template)
            .await?;
        created.ok_or_else(|| RepoError::Database("Failed to create slot template".to_string()))
    }

    // ========================================================================
    // Daily slots
    // ========================================================================

    /// 某日期的全部档位，按开始时刻排序
    pub async fn find_slots_by_date(&self, date: NaiveDate) -> RepoResult<Vec<DailySlot>> {
        let slots: Vec<DailySlot> = self
            .base
            .db()
            .query("SELECT * FROM daily_slot WHERE date = $date ORDER BY start")
            .bind(("date", date))
            .await?
            .take(0)?;
        Ok(slots)
    }

    /// Find daily slot by id
    pub async fn find_slot_by_id(&self, id: &RecordId) -> RepoResult<Option<DailySlot>> {
        let slot: Option<DailySlot> = self.base.db().select(id.clone()).await?;
        Ok(slot)
    }

    /// 创建当日档位
    ///
    /// `(template, date)` 唯一索引兜底并发播种：冲突映射为 Duplicate，
    /// 分配器将其视为"别人已经创建"而忽略。
    pub async fn create_daily_slot(&self, slot: DailySlot) -> RepoResult<DailySlot> {
        let created: Result<Option<DailySlot>, surrealdb::Error> =
            self.base.db().create(SLOT_TABLE).content(slot).await;
        match created {
            Ok(Some(slot)) => Ok(slot),
            Ok(None) => Err(RepoError::Database(
                "Failed to create daily slot".to_string(),
            )),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("daily_slot_template_date") || msg.contains("already contains") {
                    Err(RepoError::Duplicate(msg))
                } else {
                    Err(RepoError::Database(msg))
                }
            }
        }
    }

    // ========================================================================
    // Atomic capacity counter
    // ========================================================================

    /// 容量准入：`current_bookings < capacity` 时原子 +1
    ///
    /// 条件与自增是同一条语句，并发下不会超卖。
    /// 返回更新后的档位；容量已满时返回 None。
    pub async fn try_reserve(&self, slot_id: &RecordId) -> RepoResult<Option<DailySlot>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $slot SET current_bookings += 1
                 WHERE current_bookings < capacity RETURN AFTER",
            )
            .bind(("slot", slot_id.clone()))
            .await?;
        let updated: Vec<DailySlot> = result.take(0)?;
        Ok(updated.into_iter().next())
    }

    /// 释放一个名额：原子 -1，下限 0
    pub async fn release(&self, slot_id: &RecordId) -> RepoResult<Option<DailySlot>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $slot SET current_bookings = math::max(current_bookings - 1, 0)
                 RETURN AFTER",
            )
            .bind(("slot", slot_id.clone()))
            .await?;
        let updated: Vec<DailySlot> = result.take(0)?;
        Ok(updated.into_iter().next())
    }

    /// 释放 n 个名额 (过期巡检按档位批量释放)
    pub async fn release_many(&self, slot_id: &RecordId, n: i64) -> RepoResult<Option<DailySlot>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $slot SET current_bookings = math::max(current_bookings - $n, 0)
                 RETURN AFTER",
            )
            .bind(("slot", slot_id.clone()))
            .bind(("n", n))
            .await?;
        let updated: Vec<DailySlot> = result.take(0)?;
        Ok(updated.into_iter().next())
    }
}
