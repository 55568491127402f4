//! 预约生命周期控制器
//!
//! 状态机：`pending → {serving → served | cancelled} | expired`。
//! 编排档位分配器、取号生成器、位置管理和等待预测。
//!
//! # 一致性
//!
//! 容量准入 (`current_bookings < capacity` 时 +1) 是单条原子语句；
//! 位置分配、预约写入和计数器更新跨多次存储往返，整段持有档位锁。
//! 所有状态迁移是 `UPDATE ... WHERE status = <from>` 的条件更新，
//! guard 失败即并发竞争者已赢，映射为 InvalidTransition。

use serde::{Deserialize, Serialize};
use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;
use tokio::sync::mpsc;
use validator::Validate;

use crate::crowd::WaitTimePredictor;
use crate::db::models::{Booking, BookingItem, BookingStatus, DailySlot};
use crate::db::repository::{BookingRepository, SlotRepository};
use crate::queue::locks::SlotLocks;
use crate::queue::position::QueuePositionManager;
use crate::queue::token::TokenGenerator;
use crate::utils::{AppError, AppResult, time};

// ============================================================================
// Wire payloads / views
// ============================================================================

/// 餐品项 (wire)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingItemPayload {
    #[validate(length(min = 1, message = "menuItemId must not be empty"))]
    pub menu_item_id: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

impl From<BookingItemPayload> for BookingItem {
    fn from(p: BookingItemPayload) -> Self {
        BookingItem {
            menu_item_id: p.menu_item_id,
            quantity: p.quantity,
        }
    }
}

/// Create booking payload: `{slotId, items:[{menuItemId, quantity}]}`
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreate {
    pub slot_id: String,
    #[validate(length(min = 1, message = "items must not be empty"))]
    #[validate(nested)]
    pub items: Vec<BookingItemPayload>,
}

/// Replace items payload
#[derive(Debug, Deserialize, Validate)]
pub struct BookingModify {
    #[validate(length(min = 1, message = "items must not be empty"))]
    #[validate(nested)]
    pub items: Vec<BookingItemPayload>,
}

/// 餐品项 (响应)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingItemView {
    pub menu_item_id: String,
    pub quantity: u32,
}

/// 预约响应 (camelCase wire 格式)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: String,
    pub slot_id: String,
    pub student: String,
    pub token_number: String,
    pub items: Vec<BookingItemView>,
    pub queue_position: i64,
    pub status: BookingStatus,
    pub booked_at: i64,
    /// 创建时的预计等待 (分钟)
    pub estimated_wait_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<i64>,
}

impl From<Booking> for BookingView {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id.map(|id| id.to_string()).unwrap_or_default(),
            slot_id: b.slot.to_string(),
            student: b.student,
            token_number: b.token_number,
            items: b
                .items
                .into_iter()
                .map(|i| BookingItemView {
                    menu_item_id: i.menu_item_id,
                    quantity: i.quantity,
                })
                .collect(),
            queue_position: b.queue_position,
            status: b.status,
            booked_at: b.booked_at,
            estimated_wait_time: b.estimated_wait_minutes,
            served_at: b.served_at,
            cancelled_at: b.cancelled_at,
            expired_at: b.expired_at,
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Clone)]
pub struct BookingLifecycle {
    slots: SlotRepository,
    bookings: BookingRepository,
    tokens: TokenGenerator,
    positions: QueuePositionManager,
    predictor: WaitTimePredictor,
    locks: SlotLocks,
    civil_offset_minutes: i32,
    /// 告警检查队列：create/cancel 后 fire-and-forget 入队，失败只记日志
    check_queue: Option<mpsc::Sender<RecordId>>,
}

impl BookingLifecycle {
    pub fn new(
        db: Surreal<Db>,
        locks: SlotLocks,
        civil_offset_minutes: i32,
        check_queue: Option<mpsc::Sender<RecordId>>,
    ) -> Self {
        Self {
            slots: SlotRepository::new(db.clone()),
            bookings: BookingRepository::new(db.clone()),
            tokens: TokenGenerator::new(db.clone(), civil_offset_minutes),
            positions: QueuePositionManager::new(db.clone()),
            predictor: WaitTimePredictor::new(db, civil_offset_minutes),
            locks,
            civil_offset_minutes,
            check_queue,
        }
    }

    // ========================================================================
    // Student operations
    // ========================================================================

    /// 创建预约
    ///
    /// Guards: 档位存在、日期是今天、未过结束时刻、容量未满。
    pub async fn create(&self, student: &str, payload: BookingCreate) -> AppResult<BookingView> {
        payload.validate()?;

        let slot_id = parse_id(&payload.slot_id, "slot")?;
        let slot = self.require_slot(&slot_id).await?;

        let today = time::civil_today(self.civil_offset_minutes);
        if slot.date != today {
            return Err(AppError::SlotClosed(format!(
                "Slot {} is for {}, not today",
                slot.name, slot.date
            )));
        }
        let now_time = time::civil_time_now(self.civil_offset_minutes);
        if now_time >= slot.end {
            return Err(AppError::SlotClosed(format!(
                "Slot {} closed at {}",
                slot.name, slot.end
            )));
        }

        let _guard = self.locks.acquire(&slot_id).await;

        // 容量准入：条件自增，满了返回 None
        let Some(reserved) = self.slots.try_reserve(&slot_id).await? else {
            return Err(AppError::SlotFull(format!(
                "Slot {} is at capacity ({})",
                slot.name, slot.capacity
            )));
        };

        let token_number = self.tokens.next_token(&slot_id, &slot.name).await?;
        let queue_position = self.positions.next_position(&slot_id).await?;
        let prediction = self.predictor.predict(&reserved, queue_position).await;

        let booking = Booking {
            id: None,
            student: student.to_string(),
            slot: slot_id.clone(),
            token_number,
            items: payload.items.into_iter().map(Into::into).collect(),
            queue_position,
            status: BookingStatus::Pending,
            booked_at: time::now_millis(),
            served_at: None,
            cancelled_at: None,
            expired_at: None,
            estimated_wait_minutes: prediction.predicted_wait_minutes,
            modifications: Vec::new(),
        };

        let created = match self.bookings.create(booking).await {
            Ok(b) => b,
            Err(e) => {
                // 预约写入失败：归还已占用的名额，保持计数器不变量
                if let Err(release_err) = self.slots.release(&slot_id).await {
                    tracing::error!(
                        slot = %slot_id,
                        error = %release_err,
                        "Failed to release seat after booking create failure"
                    );
                }
                return Err(e.into());
            }
        };
        drop(_guard);

        tracing::info!(
            slot = %slot.name,
            token = %created.token_number,
            position = created.queue_position,
            "Booking created"
        );
        self.enqueue_check(slot_id);

        Ok(created.into())
    }

    /// 取消预约 (仅 pending，仅本人)
    pub async fn cancel(&self, student: &str, booking_id: &str) -> AppResult<BookingView> {
        let id = parse_id(booking_id, "booking")?;
        let booking = self.require_booking(&id).await?;
        if booking.student != student {
            return Err(AppError::forbidden("You do not own this booking"));
        }

        let slot_id = booking.slot.clone();
        let _guard = self.locks.acquire(&slot_id).await;

        let Some(cancelled) = self
            .bookings
            .transition_to_cancelled(&id, time::now_millis())
            .await?
        else {
            return Err(self.transition_conflict(&id, "cancel").await);
        };

        self.slots.release(&slot_id).await?;
        self.positions
            .compact_after_removal(&slot_id, cancelled.queue_position)
            .await?;
        drop(_guard);

        tracing::info!(token = %cancelled.token_number, "Booking cancelled");
        self.enqueue_check(slot_id);

        Ok(cancelled.into())
    }

    /// 替换餐品 (仅 pending，仅本人)；修改追加到 append-only 日志
    pub async fn modify_items(
        &self,
        student: &str,
        booking_id: &str,
        payload: BookingModify,
    ) -> AppResult<BookingView> {
        payload.validate()?;

        let id = parse_id(booking_id, "booking")?;
        let booking = self.require_booking(&id).await?;
        if booking.student != student {
            return Err(AppError::forbidden("You do not own this booking"));
        }

        let items: Vec<BookingItem> = payload.items.into_iter().map(Into::into).collect();
        let Some(updated) = self
            .bookings
            .replace_items(&id, items, time::now_millis())
            .await?
        else {
            return Err(self.transition_conflict(&id, "modify").await);
        };

        Ok(updated.into())
    }

    /// 学生本人的预约列表，最近的在前
    pub async fn list_for_student(&self, student: &str) -> AppResult<Vec<BookingView>> {
        let bookings = self.bookings.find_by_student(student).await?;
        Ok(bookings.into_iter().map(Into::into).collect())
    }

    /// 单个预约 (仅本人)
    pub async fn get_owned(&self, student: &str, booking_id: &str) -> AppResult<BookingView> {
        let id = parse_id(booking_id, "booking")?;
        let booking = self.require_booking(&id).await?;
        if booking.student != student {
            return Err(AppError::forbidden("You do not own this booking"));
        }
        Ok(booking.into())
    }

    // ========================================================================
    // Staff operations
    // ========================================================================

    /// 叫号：队首 pending → serving
    ///
    /// 同档位已有 serving 预约时拒绝，保持"至多一个 serving"。
    pub async fn call_next(&self, slot_id: &str) -> AppResult<BookingView> {
        let slot_id = parse_id(slot_id, "slot")?;
        self.require_slot(&slot_id).await?;

        let _guard = self.locks.acquire(&slot_id).await;

        if self.bookings.serving_exists(&slot_id).await? {
            return Err(AppError::conflict(
                "A booking is already being served for this slot",
            ));
        }

        let Some(head) = self.bookings.first_pending(&slot_id).await? else {
            return Err(AppError::not_found("No pending booking for this slot"));
        };
        let head_id = head
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Booking record without id"))?;

        let Some(serving) = self.bookings.transition_to_serving(&head_id).await? else {
            return Err(self.transition_conflict(&head_id, "call next").await);
        };

        tracing::info!(token = %serving.token_number, "Called next booking");
        Ok(serving.into())
    }

    /// 员工 override：任意 pending → serving，不重排他人位置 (位置留作审计)
    pub async fn mark_serving(&self, booking_id: &str) -> AppResult<BookingView> {
        let id = parse_id(booking_id, "booking")?;
        let booking = self.require_booking(&id).await?;

        let _guard = self.locks.acquire(&booking.slot).await;

        if self.bookings.serving_exists(&booking.slot).await? {
            return Err(AppError::conflict(
                "A booking is already being served for this slot",
            ));
        }

        let Some(serving) = self.bookings.transition_to_serving(&id).await? else {
            return Err(self.transition_conflict(&id, "mark serving").await);
        };

        tracing::info!(token = %serving.token_number, "Booking marked serving (override)");
        Ok(serving.into())
    }

    /// 供餐完成：serving → served，释放名额并重排 pending 为 1..N
    pub async fn mark_served(&self, booking_id: &str) -> AppResult<BookingView> {
        let id = parse_id(booking_id, "booking")?;
        let booking = self.require_booking(&id).await?;
        let slot_id = booking.slot.clone();

        let _guard = self.locks.acquire(&slot_id).await;

        let Some(served) = self
            .bookings
            .transition_to_served(&id, time::now_millis())
            .await?
        else {
            return Err(self.transition_conflict(&id, "mark served").await);
        };

        // served 离开活跃集：计数器跟踪活跃预约数，必须同步释放
        self.slots.release(&slot_id).await?;
        self.positions.renumber_after_serve(&slot_id).await?;

        tracing::info!(token = %served.token_number, "Booking served");
        Ok(served.into())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn require_slot(&self, id: &RecordId) -> AppResult<DailySlot> {
        self.slots
            .find_slot_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Slot {} not found", id)))
    }

    async fn require_booking(&self, id: &RecordId) -> AppResult<Booking> {
        self.bookings
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Booking {} not found", id)))
    }

    /// guard 失败后取当前状态，构造带状态的迁移错误
    async fn transition_conflict(&self, id: &RecordId, action: &str) -> AppError {
        let current = match self.bookings.find_by_id(id).await {
            Ok(Some(b)) => b.status.to_string(),
            _ => "unknown".to_string(),
        };
        AppError::invalid_transition(current, action)
    }

    fn enqueue_check(&self, slot: RecordId) {
        if let Some(tx) = &self.check_queue {
            if let Err(e) = tx.try_send(slot) {
                tracing::warn!(error = %e, "Alert check queue full or closed, dropping check");
            }
        }
    }
}

/// 解析 "table:id" 形式的 ID；裸 key 自动补全表前缀
fn parse_id(raw: &str, table: &str) -> AppResult<RecordId> {
    if let Ok(id) = raw.parse::<RecordId>() {
        return Ok(id);
    }
    let prefixed = format!("{}:{}", daily_table(table), raw);
    prefixed
        .parse::<RecordId>()
        .map_err(|_| AppError::validation(format!("Invalid {} id: {}", table, raw)))
}

fn daily_table(table: &str) -> &str {
    match table {
        "slot" => "daily_slot",
        other => other,
    }
}
