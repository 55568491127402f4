//! Crowd Snapshot Repository

use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::CrowdSnapshot;

const TABLE: &str = "crowd_snapshot";

#[derive(Clone)]
pub struct SnapshotRepository {
    base: BaseRepository,
}

impl SnapshotRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn insert(&self, snapshot: CrowdSnapshot) -> RepoResult<CrowdSnapshot> {
        let created: Option<CrowdSnapshot> =
            self.base.db().create(TABLE).content(snapshot).await?;
        created.ok_or_else(|| RepoError::Database("Failed to insert crowd snapshot".to_string()))
    }

    /// 某档位最近两条快照，新的在前 (突增检测用)
    pub async fn latest_two(&self, slot: &RecordId) -> RepoResult<Vec<CrowdSnapshot>> {
        // 嵌入式 SDK 的 WHERE + LIMIT 组合会丢首行，取全量后在内存截断
        let snapshots: Vec<CrowdSnapshot> = self
            .base
            .db()
            .query(
                "SELECT * FROM crowd_snapshot WHERE slot = $slot
                 ORDER BY taken_at DESC",
            )
            .bind(("slot", slot.clone()))
            .await?
            .take(0)?;
        Ok(snapshots.into_iter().take(2).collect())
    }

    /// 时间区间内的全部快照，按采样时间升序 (汇总和 CSV 导出用)
    pub async fn find_range(&self, start: i64, end: i64) -> RepoResult<Vec<CrowdSnapshot>> {
        let snapshots: Vec<CrowdSnapshot> = self
            .base
            .db()
            .query(
                "SELECT * FROM crowd_snapshot
                 WHERE taken_at >= $start AND taken_at < $end
                 ORDER BY taken_at",
            )
            .bind(("start", start))
            .bind(("end", end))
            .await?
            .take(0)?;
        Ok(snapshots)
    }

    /// 删除保留期之前的快照，返回删除数量
    pub async fn prune_before(&self, cutoff: i64) -> RepoResult<usize> {
        let mut result = self
            .base
            .db()
            .query("DELETE crowd_snapshot WHERE taken_at < $cutoff RETURN BEFORE")
            .bind(("cutoff", cutoff))
            .await?;
        let deleted: Vec<CrowdSnapshot> = result.take(0)?;
        Ok(deleted.len())
    }
}
