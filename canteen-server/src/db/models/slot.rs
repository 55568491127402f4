//! Slot Models - 档位模板与当日档位实例

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;
use validator::Validate;

use crate::utils::TimeOfDay;

use super::serde_helpers;

/// 档位模板 (管理员配置的固定供餐窗口)
///
/// 按日不可变：修改模板只影响之后新创建的当日档位。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotTemplate {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// 餐别名称 (如 "Lunch")
    pub name: String,
    /// 开始时刻
    pub start: TimeOfDay,
    /// 结束时刻
    pub end: TimeOfDay,
    /// 总容量
    pub capacity: i64,
}

/// Create slot template payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SlotTemplateCreate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    #[validate(range(min = 1, message = "capacity must be at least 1"))]
    pub capacity: i64,
}

/// 当日档位实例
///
/// 懒创建：任何需要"今日档位"的操作首次触发时从模板展开。
/// `current_bookings` 只能通过原子条件更新修改，必须始终等于
/// 该档位活跃 (pending/serving) 预约数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySlot {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// 模板引用
    #[serde(with = "serde_helpers::record_id")]
    pub template: RecordId,
    /// 餐别名称 (创建时从模板拷贝)
    pub name: String,
    /// 所属民用日期
    pub date: NaiveDate,
    /// 开始时刻 (创建时从模板拷贝)
    pub start: TimeOfDay,
    /// 结束时刻 (创建时从模板拷贝)
    pub end: TimeOfDay,
    /// 总容量
    pub capacity: i64,
    /// 当前活跃预约数
    #[serde(default)]
    pub current_bookings: i64,
}

impl DailySlot {
    /// 从模板展开一个日期实例
    pub fn from_template(template: &SlotTemplate, template_id: RecordId, date: NaiveDate) -> Self {
        Self {
            id: None,
            template: template_id,
            name: template.name.clone(),
            date,
            start: template.start,
            end: template.end,
            capacity: template.capacity,
            current_bookings: 0,
        }
    }

    /// 占用率 (0-100)，容量为 0 时视为 100
    pub fn occupancy_pct(&self) -> u32 {
        occupancy_pct(self.current_bookings, self.capacity)
    }

    /// 供餐时间窗文本 (如 "12:00-14:00")
    pub fn window(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// 占用率 = round(active / capacity × 100)
pub fn occupancy_pct(active: i64, capacity: i64) -> u32 {
    if capacity <= 0 {
        return 100;
    }
    ((active as f64 / capacity as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_rounds_to_nearest() {
        assert_eq!(occupancy_pct(0, 10), 0);
        assert_eq!(occupancy_pct(1, 3), 33);
        assert_eq!(occupancy_pct(2, 3), 67);
        assert_eq!(occupancy_pct(10, 10), 100);
    }

    #[test]
    fn zero_capacity_is_full() {
        assert_eq!(occupancy_pct(0, 0), 100);
    }
}
