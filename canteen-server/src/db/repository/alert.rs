//! Alert Repository

use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, CountRow, RepoError, RepoResult};
use crate::db::models::{AlertKind, AlertRecord};

const TABLE: &str = "alert";

#[derive(Clone)]
pub struct AlertRepository {
    base: BaseRepository,
}

impl AlertRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, alert: AlertRecord) -> RepoResult<AlertRecord> {
        let created: Option<AlertRecord> = self.base.db().create(TABLE).content(alert).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create alert".to_string()))
    }

    pub async fn find_by_id(&self, id: &RecordId) -> RepoResult<Option<AlertRecord>> {
        let alert: Option<AlertRecord> = self.base.db().select(id.clone()).await?;
        Ok(alert)
    }

    /// 全部未解决告警，新的在前
    pub async fn find_unresolved(&self) -> RepoResult<Vec<AlertRecord>> {
        let alerts: Vec<AlertRecord> = self
            .base
            .db()
            .query("SELECT * FROM alert WHERE resolved = false ORDER BY created_at DESC")
            .await?
            .take(0)?;
        Ok(alerts)
    }

    /// 去重检查：该档位自 `since` 起是否已有未解决告警
    pub async fn has_unresolved_since(&self, slot: &RecordId, since: i64) -> RepoResult<bool> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT count() AS count FROM alert
                 WHERE slot = $slot AND resolved = false AND created_at >= $since
                 GROUP ALL",
            )
            .bind(("slot", slot.clone()))
            .bind(("since", since))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(|r| r.count).unwrap_or(0) > 0)
    }

    /// 去重检查 (按类型)：突增告警独立于阈值告警去重
    pub async fn has_unresolved_kind_since(
        &self,
        slot: &RecordId,
        kind: AlertKind,
        since: i64,
    ) -> RepoResult<bool> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT count() AS count FROM alert
                 WHERE slot = $slot AND kind = $kind AND resolved = false
                   AND created_at >= $since
                 GROUP ALL",
            )
            .bind(("slot", slot.clone()))
            .bind(("kind", kind.as_str()))
            .bind(("since", since))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(|r| r.count).unwrap_or(0) > 0)
    }

    /// Resolve an alert
    ///
    /// guard 和写入同一条语句：重复 resolve 时 guard 失败返回 None，
    /// 调用方映射为 AlreadyResolved 冲突。
    pub async fn resolve(
        &self,
        id: &RecordId,
        resolver: &str,
        notes: Option<String>,
        now: i64,
    ) -> RepoResult<Option<AlertRecord>> {
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $id SET resolved = true, resolved_by = $resolver,
                     resolved_at = $now, resolution_notes = $notes
                 WHERE resolved = false RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .bind(("resolver", resolver.to_string()))
            .bind(("now", now))
            .bind(("notes", notes))
            .await?;
        let updated: Vec<AlertRecord> = result.take(0)?;
        Ok(updated.into_iter().next())
    }

    /// 删除保留期之前已解决的告警，返回删除数量
    pub async fn prune_resolved_before(&self, cutoff: i64) -> RepoResult<usize> {
        let mut result = self
            .base
            .db()
            .query(
                "DELETE alert WHERE resolved = true AND resolved_at < $cutoff
                 RETURN BEFORE",
            )
            .bind(("cutoff", cutoff))
            .await?;
        let deleted: Vec<AlertRecord> = result.take(0)?;
        Ok(deleted.len())
    }
}
