//! 排队引擎集成测试：真实嵌入式数据库上的完整生命周期

mod common;

use chrono::Duration;

use canteen_server::AppError;
use canteen_server::db::models::BookingStatus;
use canteen_server::db::repository::{BookingRepository, SlotRepository};
use canteen_server::queue::lifecycle::{BookingCreate, BookingItemPayload, BookingModify};
use canteen_server::queue::{BookingLifecycle, ExpiredBookingReconciler, SlotAllocator, SlotLocks};
use canteen_server::utils::{TimeOfDay, time};

fn lifecycle(db: &surrealdb::Surreal<surrealdb::engine::local::Db>) -> BookingLifecycle {
    BookingLifecycle::new(db.clone(), SlotLocks::new(), 0, None)
}

fn payload(slot_id: &str) -> BookingCreate {
    BookingCreate {
        slot_id: slot_id.to_string(),
        items: vec![BookingItemPayload {
            menu_item_id: "menu:rice".to_string(),
            quantity: 1,
        }],
    }
}

#[tokio::test]
async fn create_assigns_token_position_and_counter() {
    let (_tmp, db) = common::open_db().await;
    let slot = common::seed_open_slot(&db, "Lunch", 10).await;
    let slot_id = slot.id.clone().unwrap();
    let engine = lifecycle(&db);

    let first = engine.create("alice", payload(&slot_id.to_string())).await.unwrap();
    assert_eq!(first.token_number, "L001");
    assert_eq!(first.queue_position, 1);
    assert_eq!(first.status, BookingStatus::Pending);
    assert!(first.estimated_wait_time >= 1);

    let second = engine.create("bob", payload(&slot_id.to_string())).await.unwrap();
    assert_eq!(second.token_number, "L002");
    assert_eq!(second.queue_position, 2);

    // 冗余计数器必须等于活跃预约数
    let slots = SlotRepository::new(db.clone());
    let fresh = slots.find_slot_by_id(&slot_id).await.unwrap().unwrap();
    assert_eq!(fresh.current_bookings, 2);
    let bookings = BookingRepository::new(db.clone());
    assert_eq!(bookings.count_active(&slot_id).await.unwrap(), 2);
}

#[tokio::test]
async fn create_rejects_full_slot() {
    let (_tmp, db) = common::open_db().await;
    let slot = common::seed_open_slot(&db, "Lunch", 1).await;
    let slot_id = slot.id.unwrap().to_string();
    let engine = lifecycle(&db);

    engine.create("alice", payload(&slot_id)).await.unwrap();
    let err = engine.create("bob", payload(&slot_id)).await.unwrap_err();
    assert!(matches!(err, AppError::SlotFull(_)), "got {err:?}");
}

#[tokio::test]
async fn create_rejects_past_date_slot() {
    let (_tmp, db) = common::open_db().await;
    let yesterday = time::civil_today(0) - Duration::days(1);
    let slot = common::seed_slot(
        &db,
        "Lunch",
        10,
        yesterday,
        TimeOfDay::new(0, 0).unwrap(),
        TimeOfDay::new(23, 59).unwrap(),
    )
    .await;
    let engine = lifecycle(&db);

    let err = engine
        .create("alice", payload(&slot.id.unwrap().to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SlotClosed(_)), "got {err:?}");
}

#[tokio::test]
async fn cancel_releases_seat_and_compacts_positions() {
    let (_tmp, db) = common::open_db().await;
    let slot = common::seed_open_slot(&db, "Lunch", 10).await;
    let slot_id = slot.id.clone().unwrap();
    let engine = lifecycle(&db);

    let _a = engine.create("alice", payload(&slot_id.to_string())).await.unwrap();
    let b = engine.create("bob", payload(&slot_id.to_string())).await.unwrap();
    let _c = engine.create("carol", payload(&slot_id.to_string())).await.unwrap();

    // 非本人取消 → 403
    let err = engine.cancel("mallory", &b.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "got {err:?}");

    let cancelled = engine.cancel("bob", &b.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    // 重复取消 → 非法迁移
    let err = engine.cancel("bob", &b.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }), "got {err:?}");

    // 位置压缩回连续的 1..N
    let bookings = BookingRepository::new(db.clone());
    let active = bookings.find_active_by_slot(&slot_id).await.unwrap();
    let positions: Vec<i64> = active.iter().map(|b| b.queue_position).collect();
    assert_eq!(positions, vec![1, 2]);

    let slots = SlotRepository::new(db.clone());
    let fresh = slots.find_slot_by_id(&slot_id).await.unwrap().unwrap();
    assert_eq!(fresh.current_bookings, 2);
}

#[tokio::test]
async fn token_sequence_continues_after_cancel() {
    let (_tmp, db) = common::open_db().await;
    let slot = common::seed_open_slot(&db, "Lunch", 10).await;
    let slot_id = slot.id.unwrap().to_string();
    let engine = lifecycle(&db);

    let a = engine.create("alice", payload(&slot_id)).await.unwrap();
    engine.cancel("alice", &a.id).await.unwrap();

    // 取号序号按当日创建总数走，不回收
    let b = engine.create("bob", payload(&slot_id)).await.unwrap();
    assert_eq!(b.token_number, "L002");
    // 但队列位置被压缩复用
    assert_eq!(b.queue_position, 1);
}

#[tokio::test]
async fn call_next_serves_queue_head_once() {
    let (_tmp, db) = common::open_db().await;
    let slot = common::seed_open_slot(&db, "Dinner", 10).await;
    let slot_id = slot.id.clone().unwrap();
    let engine = lifecycle(&db);

    let a = engine.create("alice", payload(&slot_id.to_string())).await.unwrap();
    let _b = engine.create("bob", payload(&slot_id.to_string())).await.unwrap();

    let serving = engine.call_next(&slot_id.to_string()).await.unwrap();
    assert_eq!(serving.id, a.id);
    assert_eq!(serving.status, BookingStatus::Serving);

    // 已有 serving → 再叫号冲突
    let err = engine.call_next(&slot_id.to_string()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");

    // 空队列叫号 → 404
    let served = engine.mark_served(&serving.id).await.unwrap();
    assert_eq!(served.status, BookingStatus::Served);
    engine.call_next(&slot_id.to_string()).await.unwrap();
    let head = engine.mark_served(
        &engine.list_for_student("bob").await.unwrap()[0].id,
    )
    .await
    .unwrap();
    assert_eq!(head.status, BookingStatus::Served);
    let err = engine.call_next(&slot_id.to_string()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn mark_served_releases_and_renumbers() {
    let (_tmp, db) = common::open_db().await;
    let slot = common::seed_open_slot(&db, "Lunch", 10).await;
    let slot_id = slot.id.clone().unwrap();
    let engine = lifecycle(&db);

    let a = engine.create("alice", payload(&slot_id.to_string())).await.unwrap();
    let _b = engine.create("bob", payload(&slot_id.to_string())).await.unwrap();
    let _c = engine.create("carol", payload(&slot_id.to_string())).await.unwrap();

    engine.call_next(&slot_id.to_string()).await.unwrap();
    let served = engine.mark_served(&a.id).await.unwrap();
    assert!(served.served_at.is_some());

    let bookings = BookingRepository::new(db.clone());
    let pending = bookings.find_pending_by_slot(&slot_id).await.unwrap();
    let positions: Vec<i64> = pending.iter().map(|b| b.queue_position).collect();
    assert_eq!(positions, vec![1, 2]);

    // 计数器跟踪活跃集：served 离开后 -1
    let slots = SlotRepository::new(db.clone());
    let fresh = slots.find_slot_by_id(&slot_id).await.unwrap().unwrap();
    assert_eq!(fresh.current_bookings, 2);

    // 对 served 预约再 mark-served → 非法迁移
    let err = engine.mark_served(&a.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }), "got {err:?}");
}

#[tokio::test]
async fn mark_serving_override_keeps_position() {
    let (_tmp, db) = common::open_db().await;
    let slot = common::seed_open_slot(&db, "Lunch", 10).await;
    let slot_id = slot.id.clone().unwrap();
    let engine = lifecycle(&db);

    let _a = engine.create("alice", payload(&slot_id.to_string())).await.unwrap();
    let b = engine.create("bob", payload(&slot_id.to_string())).await.unwrap();

    // 越过队首直接供第 2 位
    let serving = engine.mark_serving(&b.id).await.unwrap();
    assert_eq!(serving.status, BookingStatus::Serving);
    assert_eq!(serving.queue_position, 2);

    // 至多一个 serving
    let bookings = BookingRepository::new(db.clone());
    let active = bookings.find_active_by_slot(&slot_id).await.unwrap();
    let serving_count = active
        .iter()
        .filter(|x| x.status == BookingStatus::Serving)
        .count();
    assert_eq!(serving_count, 1);

    let err = engine.call_next(&slot_id.to_string()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");
}

#[tokio::test]
async fn modify_items_only_while_pending() {
    let (_tmp, db) = common::open_db().await;
    let slot = common::seed_open_slot(&db, "Lunch", 10).await;
    let slot_id = slot.id.unwrap().to_string();
    let engine = lifecycle(&db);

    let a = engine.create("alice", payload(&slot_id)).await.unwrap();

    let modified = engine
        .modify_items(
            "alice",
            &a.id,
            BookingModify {
                items: vec![BookingItemPayload {
                    menu_item_id: "menu:noodles".to_string(),
                    quantity: 2,
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(modified.items.len(), 1);
    assert_eq!(modified.items[0].menu_item_id, "menu:noodles");

    engine.call_next(&slot_id).await.unwrap();
    let err = engine
        .modify_items(
            "alice",
            &a.id,
            BookingModify {
                items: vec![BookingItemPayload {
                    menu_item_id: "menu:rice".to_string(),
                    quantity: 1,
                }],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }), "got {err:?}");
}

#[tokio::test]
async fn allocator_is_idempotent_and_needs_templates() {
    let (_tmp, db) = common::open_db().await;
    let allocator = SlotAllocator::new(db.clone(), 0);

    // 零模板 → 失败
    let err = allocator.ensure_today_slots().await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {err:?}");

    let repo = SlotRepository::new(db.clone());
    for name in ["Breakfast", "Lunch"] {
        repo.create_template(canteen_server::db::models::SlotTemplateCreate {
            name: name.to_string(),
            start: TimeOfDay::new(8, 0).unwrap(),
            end: TimeOfDay::new(20, 0).unwrap(),
            capacity: 50,
        })
        .await
        .unwrap();
    }

    let first = allocator.ensure_today_slots().await.unwrap();
    assert_eq!(first.len(), 2);
    // 再跑不重复播种
    let second = allocator.ensure_today_slots().await.unwrap();
    assert_eq!(second.len(), 2);
}

#[tokio::test]
async fn reconciler_expires_past_slots_and_renumbers() {
    let (_tmp, db) = common::open_db().await;
    let yesterday = time::civil_today(0) - Duration::days(1);
    let stale = common::seed_slot(
        &db,
        "Lunch",
        10,
        yesterday,
        TimeOfDay::new(12, 0).unwrap(),
        TimeOfDay::new(14, 0).unwrap(),
    )
    .await;
    let stale_id = stale.id.clone().unwrap();

    // 直接造两条过期日期的 pending 预约并占用名额
    let slots = SlotRepository::new(db.clone());
    let bookings = BookingRepository::new(db.clone());
    for (student, pos) in [("alice", 1), ("bob", 2)] {
        slots.try_reserve(&stale_id).await.unwrap().unwrap();
        bookings
            .create(canteen_server::db::models::Booking {
                id: None,
                student: student.to_string(),
                slot: stale_id.clone(),
                token_number: format!("L{pos:03}"),
                items: Vec::new(),
                queue_position: pos,
                status: BookingStatus::Pending,
                booked_at: time::now_millis(),
                served_at: None,
                cancelled_at: None,
                expired_at: None,
                estimated_wait_minutes: 5,
                modifications: Vec::new(),
            })
            .await
            .unwrap();
    }

    // 当日开放档位不受影响
    let open = common::seed_open_slot(&db, "Dinner", 10).await;
    let open_id = open.id.clone().unwrap();
    let engine = lifecycle(&db);
    engine
        .create("carol", payload(&open_id.to_string()))
        .await
        .unwrap();

    let reconciler = ExpiredBookingReconciler::new(db.clone(), SlotLocks::new(), 0);
    let outcome = reconciler.sweep().await.unwrap();
    assert_eq!(outcome.expired, 2);
    assert_eq!(outcome.slots_touched, 1);

    // 过期档位：名额全部归还，预约状态 expired
    let fresh = slots.find_slot_by_id(&stale_id).await.unwrap().unwrap();
    assert_eq!(fresh.current_bookings, 0);
    let remaining = bookings.find_pending_by_slot(&stale_id).await.unwrap();
    assert!(remaining.is_empty());

    // 开放档位原样
    let open_pending = bookings.find_pending_by_slot(&open_id).await.unwrap();
    assert_eq!(open_pending.len(), 1);

    // 幂等：再跑一遍没有新过期
    let again = reconciler.sweep().await.unwrap();
    assert_eq!(again.expired, 0);
}

#[tokio::test]
async fn reconciler_skips_orphan_bookings() {
    let (_tmp, db) = common::open_db().await;
    let bookings = BookingRepository::new(db.clone());
    bookings
        .create(canteen_server::db::models::Booking {
            id: None,
            student: "alice".to_string(),
            slot: "daily_slot:ghost".parse().unwrap(),
            token_number: "L001".to_string(),
            items: Vec::new(),
            queue_position: 1,
            status: BookingStatus::Pending,
            booked_at: time::now_millis(),
            served_at: None,
            cancelled_at: None,
            expired_at: None,
            estimated_wait_minutes: 5,
            modifications: Vec::new(),
        })
        .await
        .unwrap();

    let reconciler = ExpiredBookingReconciler::new(db.clone(), SlotLocks::new(), 0);
    let outcome = reconciler.sweep().await.unwrap();
    assert_eq!(outcome.expired, 0);

    // 孤儿预约保持 pending，留给人工处理
    let all = bookings.find_all_pending().await.unwrap();
    assert_eq!(all.len(), 1);
}
