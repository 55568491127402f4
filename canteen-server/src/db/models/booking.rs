//! Booking Model - 预约与状态机

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use super::serde_helpers;

/// 预约状态
///
/// 迁移单调：`pending → {serving → served | cancelled} | expired`，
/// 任何状态都不会回到 `pending`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Serving,
    Served,
    Cancelled,
    Expired,
}

impl BookingStatus {
    /// 是否活跃 (占用队列位置和容量)
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Serving)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Serving => "serving",
            BookingStatus::Served => "served",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个餐品项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingItem {
    /// 菜单项 ID (菜单目录是外部协作方，这里只存不解析)
    pub menu_item_id: String,
    pub quantity: u32,
}

/// 修改日志条目 (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationEntry {
    /// 修改时间 (Unix millis)
    pub at: i64,
    /// 修改后的餐品列表
    pub items: Vec<BookingItem>,
}

/// 预约
///
/// 从不物理删除，终止状态即软删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// 学生 ID (上游身份网关提供)
    pub student: String,
    /// 档位引用
    #[serde(with = "serde_helpers::record_id")]
    pub slot: RecordId,
    /// 人类可读取号标签 (档位首字母 + 3 位序号)
    pub token_number: String,
    pub items: Vec<BookingItem>,
    /// 队列位置 (活跃预约构成 1..N 连续序列)
    pub queue_position: i64,
    pub status: BookingStatus,
    /// 预约时间 (Unix millis)
    pub booked_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<i64>,
    /// 创建时的预计等待 (分钟)
    pub estimated_wait_minutes: i64,
    /// 修改日志 (append-only)
    #[serde(default)]
    pub modifications: Vec<ModificationEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_statuses() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Serving.is_active());
        assert!(!BookingStatus::Served.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
        assert!(!BookingStatus::Expired.is_active());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }
}
