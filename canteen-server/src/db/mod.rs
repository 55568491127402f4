//! Database Module
//!
//! 嵌入式 SurrealDB 存储：连接、schema 定义

pub mod models;
pub mod repository;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, RocksDb};

use crate::utils::AppError;

/// Database service — owns the embedded SurrealDB handle
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Open (or create) the embedded database at the given path
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        let db: Surreal<Db> = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        db.use_ns("canteen")
            .use_db("canteen")
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {e}")))?;

        define_schema(&db).await?;

        tracing::info!("Database opened at {} (SurrealDB embedded)", db_path);
        Ok(Self { db })
    }
}

/// 定义索引
///
/// `(template, date)` 唯一索引是档位分配器幂等性的最终防线：
/// 两个并发请求同时为未播种日期创建档位时，后写入者失败。
pub async fn define_schema(db: &Surreal<Db>) -> Result<(), AppError> {
    db.query(
        r#"
        DEFINE INDEX IF NOT EXISTS daily_slot_template_date
            ON TABLE daily_slot COLUMNS template, date UNIQUE;
        DEFINE INDEX IF NOT EXISTS booking_slot_status
            ON TABLE booking COLUMNS slot, status;
        DEFINE INDEX IF NOT EXISTS crowd_snapshot_taken_at
            ON TABLE crowd_snapshot COLUMNS taken_at;
        "#,
    )
    .await
    .map_err(|e| AppError::database(format!("Failed to define schema: {e}")))?;
    Ok(())
}
