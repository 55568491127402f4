//! 档位分配器
//!
//! 把档位模板懒展开为当日档位实例。幂等，可从多个请求路径并发调用：
//! 并发播种靠 `(template, date)` 唯一索引兜底，Duplicate 视为别人已创建。

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::models::DailySlot;
use crate::db::repository::{RepoError, SlotRepository};
use crate::utils::{AppError, AppResult, time};

#[derive(Clone)]
pub struct SlotAllocator {
    slots: SlotRepository,
    civil_offset_minutes: i32,
}

impl SlotAllocator {
    pub fn new(db: Surreal<Db>, civil_offset_minutes: i32) -> Self {
        Self {
            slots: SlotRepository::new(db),
            civil_offset_minutes,
        }
    }

    /// 返回"今天"的全部档位，没有则从每个模板创建
    ///
    /// 零模板时失败：没有任何可展开的供餐窗口。
    pub async fn ensure_today_slots(&self) -> AppResult<Vec<DailySlot>> {
        let today = time::civil_today(self.civil_offset_minutes);

        let existing = self.slots.find_slots_by_date(today).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        let templates = self.slots.find_templates().await?;
        if templates.is_empty() {
            return Err(AppError::validation("No slot templates configured"));
        }

        for template in &templates {
            let Some(template_id) = template.id.clone() else {
                tracing::warn!(name = %template.name, "Slot template without id, skipping");
                continue;
            };
            let slot = DailySlot::from_template(template, template_id, today);
            match self.slots.create_daily_slot(slot).await {
                Ok(created) => {
                    tracing::info!(
                        slot = %created.name,
                        date = %today,
                        capacity = created.capacity,
                        "Created daily slot"
                    );
                }
                // 并发播种：另一条请求路径赢了这个 (template, date)
                Err(RepoError::Duplicate(_)) => {
                    tracing::debug!(template = %template.name, date = %today, "Daily slot already seeded");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(self.slots.find_slots_by_date(today).await?)
    }
}
