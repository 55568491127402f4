//! Repository Module
//!
//! Provides persistence operations over the embedded SurrealDB store.
//! 计数器和队列位置的所有"读-改-写"都收敛为单条带条件的
//! UPDATE 语句，保证原子性。

pub mod alert;
pub mod booking;
pub mod rollup;
pub mod slot;
pub mod snapshot;

pub use alert::AlertRepository;
pub use booking::BookingRepository;
pub use rollup::RollupRepository;
pub use slot::SlotRepository;
pub use snapshot::SnapshotRepository;

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

impl From<RepoError> for crate::utils::AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => crate::utils::AppError::NotFound(msg),
            RepoError::Duplicate(msg) => crate::utils::AppError::Conflict(msg),
            RepoError::Validation(msg) => crate::utils::AppError::Validation(msg),
            RepoError::Database(msg) => crate::utils::AppError::Database(msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

// =============================================================================
// ID Convention: 全栈统一使用 "table:id" 格式
// =============================================================================
//
// 使用 surrealdb::RecordId 处理所有 ID：
//   - 解析: let id: RecordId = "booking:abc".parse()?;
//   - 创建: let id = RecordId::from_table_key("booking", "abc");
//   - CRUD: db.select(id) / db.delete(id) 直接使用 RecordId

/// Base repository with database reference
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }
}

/// `SELECT count() ... GROUP ALL` 的结果行
#[derive(Debug, Deserialize)]
pub(crate) struct CountRow {
    pub count: i64,
}
