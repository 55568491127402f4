//! 数据模型
//!
//! 所有 ID 使用 `surrealdb::RecordId`，对外序列化为 "table:id" 字符串。
//! 跨表引用是显式的类型化 ID，查找时必须处理"引用已不存在"的情况。

pub mod alert;
pub mod booking;
pub mod rollup;
pub mod serde_helpers;
pub mod slot;
pub mod snapshot;

pub use alert::{AlertKind, AlertRecord, AlertSeverity};
pub use booking::{Booking, BookingItem, BookingStatus, ModificationEntry};
pub use rollup::{DailyCrowdRollup, HourlyBucket};
pub use slot::{DailySlot, SlotTemplate, SlotTemplateCreate};
pub use snapshot::{CrowdLevel, CrowdSnapshot};
