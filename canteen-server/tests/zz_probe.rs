//! TEMPORARY build-validation probe — delete before commit.
mod common;

use canteen_server::db::models::{Booking, BookingStatus};
use canteen_server::db::repository::BookingRepository;
use canteen_server::utils::time;

#[tokio::test]
async fn probe_slot_storage_representation() {
    let (_tmp, db) = common::open_db().await;
    let slot = common::seed_open_slot(&db, "Lunch", 10).await;
    let slot_id = slot.id.clone().unwrap();

    let bookings = BookingRepository::new(db.clone());
    bookings
        .create(Booking {
            id: None,
            student: "alice".to_string(),
            slot: slot_id.clone(),
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

    // Raw inspection of the stored record
    let mut res = db
        .query("SELECT slot, type::is::record(slot) AS is_rec, type::is::string(slot) AS is_str FROM booking")
        .await
        .unwrap();
    let raw: surrealdb::Value = res.take(0).unwrap();
    eprintln!("RAW slot field: {raw:?}");

    // Does record-id binding match?
    let mut res = db
        .query("SELECT count() AS count FROM booking WHERE slot = $slot GROUP ALL")
        .bind(("slot", slot_id.clone()))
        .await
        .unwrap();
    let v: surrealdb::Value = res.take(0).unwrap();
    eprintln!("MATCH with RecordId bind: {v:?}");

    // Does string binding match?
    let mut res = db
        .query("SELECT count() AS count FROM booking WHERE slot = $slot GROUP ALL")
        .bind(("slot", slot_id.to_string()))
        .await
        .unwrap();
    let v: surrealdb::Value = res.take(0).unwrap();
    eprintln!("MATCH with String bind: {v:?}");

    // math::max aggregate behavior
    let r = db
        .query("SELECT math::max(queue_position) AS max_pos FROM booking GROUP ALL")
        .await
        .unwrap()
        .check()
        .map(|_| ());
    eprintln!("math::max GROUP ALL result: {r:?}");

    // math::max over an empty matching set
    let r = db
        .query("SELECT math::max(queue_position) AS max_pos FROM booking WHERE slot = $slot GROUP ALL")
        .bind(("slot", slot_id.clone()))
        .await
        .unwrap()
        .check()
        .map(|_| ());
    eprintln!("math::max empty-set result: {r:?}");

    panic!("probe done — see stderr above");
}
