//! 集成测试共用工具：临时 RocksDB + 组件装配
#![allow(dead_code)]

use chrono::NaiveDate;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, RocksDb};

use canteen_server::Config;
use canteen_server::db::define_schema;
use canteen_server::db::models::{DailySlot, SlotTemplateCreate};
use canteen_server::db::repository::SlotRepository;
use canteen_server::utils::TimeOfDay;

/// 打开独立的临时数据库 (TempDir 必须活到测试结束)
pub async fn open_db() -> (tempfile::TempDir, Surreal<Db>) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let db: Surreal<Db> = Surreal::new::<RocksDb>(tmp.path()).await.expect("open db");
    db.use_ns("canteen").use_db("canteen").await.expect("ns/db");
    define_schema(&db).await.expect("schema");
    (tmp, db)
}

/// 测试配置：民用偏移 0，其余默认
pub fn test_config() -> Config {
    let mut config = Config::from_env();
    config.civil_offset_minutes = 0;
    config
}

/// 播种一个模板 + 指定日期的档位
pub async fn seed_slot(
    db: &Surreal<Db>,
    name: &str,
    capacity: i64,
    date: NaiveDate,
    start: TimeOfDay,
    end: TimeOfDay,
) -> DailySlot {
    let repo = SlotRepository::new(db.clone());
    let template = repo
        .create_template(SlotTemplateCreate {
            name: name.to_string(),
            start,
            end,
            capacity,
        })
        .await
        .expect("create template");
    let slot = DailySlot::from_template(&template, template.id.clone().expect("template id"), date);
    repo.create_daily_slot(slot).await.expect("create slot")
}

/// 全天开放的当日档位 (预约路径的 guard 总能通过)
pub async fn seed_open_slot(db: &Surreal<Db>, name: &str, capacity: i64) -> DailySlot {
    let today = canteen_server::utils::time::civil_today(0);
    seed_slot(
        db,
        name,
        capacity,
        today,
        TimeOfDay::new(0, 0).unwrap(),
        TimeOfDay::new(23, 59).unwrap(),
    )
    .await
}
