//! Daily Crowd Rollup Repository
//!
//! 确定性 ID upsert：同一 (模板, 日期) 重算覆盖而不重复。

use chrono::NaiveDate;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, RepoResult};
use crate::db::models::DailyCrowdRollup;

const TABLE: &str = "crowd_rollup";

#[derive(Clone)]
pub struct RollupRepository {
    base: BaseRepository,
}

impl RollupRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Upsert one rollup keyed by (template, date)
    pub async fn upsert(&self, rollup: DailyCrowdRollup) -> RepoResult<Option<DailyCrowdRollup>> {
        let key = DailyCrowdRollup::record_key(&rollup.template, rollup.date);
        let saved: Option<DailyCrowdRollup> = self
            .base
            .db()
            .upsert((TABLE, key.as_str()))
            .content(rollup)
            .await?;
        Ok(saved)
    }

    pub async fn find_by_key(
        &self,
        template: &RecordId,
        date: NaiveDate,
    ) -> RepoResult<Option<DailyCrowdRollup>> {
        let key = DailyCrowdRollup::record_key(template, date);
        let rollup: Option<DailyCrowdRollup> = self.base.db().select((TABLE, key.as_str())).await?;
        Ok(rollup)
    }

    /// 某模板自 `from` (含) 起的全部汇总，按日期升序
    ///
    /// 预测器取最近 7 天时 `from = today - 7d`。
    pub async fn find_since(
        &self,
        template: &RecordId,
        from: NaiveDate,
    ) -> RepoResult<Vec<DailyCrowdRollup>> {
        let rollups: Vec<DailyCrowdRollup> = self
            .base
            .db()
            .query(
                "SELECT * FROM crowd_rollup
                 WHERE template = $template AND date >= $from
                 ORDER BY date",
            )
            .bind(("template", template.clone()))
            .bind(("from", from))
            .await?
            .take(0)?;
        Ok(rollups)
    }

    /// 全部模板自 `from` (含) 起的汇总 (本地兜底预测用)
    pub async fn find_all_since(&self, from: NaiveDate) -> RepoResult<Vec<DailyCrowdRollup>> {
        let rollups: Vec<DailyCrowdRollup> = self
            .base
            .db()
            .query("SELECT * FROM crowd_rollup WHERE date >= $from ORDER BY date")
            .bind(("from", from))
            .await?
            .take(0)?;
        Ok(rollups)
    }

    /// 删除保留期之前的汇总，返回删除数量
    pub async fn prune_before(&self, cutoff: NaiveDate) -> RepoResult<usize> {
        let mut result = self
            .base
            .db()
            .query("DELETE crowd_rollup WHERE date < $cutoff RETURN BEFORE")
            .bind(("cutoff", cutoff))
            .await?;
        let deleted: Vec<DailyCrowdRollup> = result.take(0)?;
        Ok(deleted.len())
    }
}
