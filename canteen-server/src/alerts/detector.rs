//! 告警检测器
//!
//! 阈值告警 (过载/容量预警) 从 booking 表实时统计占用率，不读快照缓存；
//! 突增告警比较最近两张快照的占用率差。两类告警独立去重：
//! 阈值告警按档位 30 分钟，突增告警按 (档位, 类型) 15 分钟。

use std::time::Duration;

use serde::Deserialize;
use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::core::config::Config;
use crate::core::tasks::run_periodic;
use crate::db::models::{AlertKind, AlertRecord, AlertSeverity, DailySlot, slot::occupancy_pct};
use crate::db::repository::{
    AlertRepository, BookingRepository, SlotRepository, SnapshotRepository,
};
use crate::utils::{AppError, AppResult, time};

/// Resolve 请求体
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AlertResolve {
    #[validate(length(max = 500, message = "notes too long"))]
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct AlertDetector {
    slots: SlotRepository,
    bookings: BookingRepository,
    snapshots: SnapshotRepository,
    alerts: AlertRepository,
    overcrowd_threshold: u32,
    warning_threshold: u32,
    spike_threshold: u32,
    dedup_millis: i64,
    spike_dedup_millis: i64,
    retention_days: i64,
    civil_offset_minutes: i32,
    recipients: Vec<String>,
}

impl AlertDetector {
    pub fn new(db: Surreal<Db>, config: &Config) -> Self {
        Self {
            slots: SlotRepository::new(db.clone()),
            bookings: BookingRepository::new(db.clone()),
            snapshots: SnapshotRepository::new(db.clone()),
            alerts: AlertRepository::new(db),
            overcrowd_threshold: config.overcrowd_threshold,
            warning_threshold: config.warning_threshold,
            spike_threshold: config.spike_threshold,
            dedup_millis: config.alert_dedup_minutes * 60_000,
            spike_dedup_millis: config.spike_dedup_minutes * 60_000,
            retention_days: config.alert_retention_days,
            civil_offset_minutes: config.civil_offset_minutes,
            recipients: config.alert_recipients.clone(),
        }
    }

    // ========================================================================
    // Background entrypoints
    // ========================================================================

    /// 周期巡检入口
    pub async fn run_sweep(self, interval_secs: u64, shutdown: CancellationToken) {
        let interval = Duration::from_secs(interval_secs);
        run_periodic("alert-sweep", interval, shutdown, move || {
            let detector = self.clone();
            async move {
                detector
                    .sweep()
                    .await
                    .map_err(|e| format!("alert sweep failed: {e}"))?;
                detector.prune().await;
                Ok(())
            }
        })
        .await;
    }

    /// 即时检查 worker：消费预约创建/取消后入队的档位 ID
    pub async fn run_check_worker(
        self,
        mut rx: mpsc::Receiver<RecordId>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Alert check worker stopped");
                    return;
                }
                slot = rx.recv() => {
                    let Some(slot) = slot else {
                        tracing::info!("Alert check queue closed, worker stopping");
                        return;
                    };
                    if let Err(e) = self.check_slot(&slot).await {
                        tracing::warn!(slot = %slot, error = %e, "Alert check failed");
                    }
                }
            }
        }
    }

    // ========================================================================
    // Detection
    // ========================================================================

    /// 巡检当日全部档位，返回新建告警数
    pub async fn sweep(&self) -> AppResult<usize> {
        let today = time::civil_today(self.civil_offset_minutes);
        let slots = self.slots.find_slots_by_date(today).await?;

        let mut created = 0usize;
        for slot in slots {
            let Some(id) = slot.id.clone() else { continue };
            match self.check_slot(&id).await {
                Ok(n) => created += n,
                Err(e) => {
                    tracing::warn!(slot = %slot.name, error = %e, "Alert check failed for slot");
                }
            }
        }
        Ok(created)
    }

    /// 检查单个档位：阈值告警 + 突增告警，返回新建数量
    pub async fn check_slot(&self, slot_id: &RecordId) -> AppResult<usize> {
        let Some(slot) = self.slots.find_slot_by_id(slot_id).await? else {
            tracing::warn!(slot = %slot_id, "Alert check for missing slot, skipping");
            return Ok(0);
        };

        let mut created = 0usize;
        if self.check_thresholds(slot_id, &slot).await? {
            created += 1;
        }
        if self.check_spike(slot_id, &slot).await? {
            created += 1;
        }
        Ok(created)
    }

    /// 阈值告警：占用率从 booking 表实时算，快照可能已过时
    async fn check_thresholds(&self, slot_id: &RecordId, slot: &DailySlot) -> AppResult<bool> {
        let active = self.bookings.count_active(slot_id).await?;
        let pct = occupancy_pct(active, slot.capacity);

        let (kind, severity, message) = if pct >= self.overcrowd_threshold {
            (
                AlertKind::Overcrowding,
                AlertSeverity::Critical,
                format!(
                    "Slot {} is overcrowded: {}% of capacity ({}/{})",
                    slot.name, pct, active, slot.capacity
                ),
            )
        } else if pct >= self.warning_threshold {
            (
                AlertKind::CapacityWarning,
                AlertSeverity::High,
                format!(
                    "Slot {} approaching capacity: {}% ({}/{})",
                    slot.name, pct, active, slot.capacity
                ),
            )
        } else {
            return Ok(false);
        };

        let now = time::now_millis();
        if self
            .alerts
            .has_unresolved_since(slot_id, now - self.dedup_millis)
            .await?
        {
            return Ok(false);
        }

        self.raise(slot_id, slot, kind, severity, message, pct, active, now)
            .await?;
        Ok(true)
    }

    /// 突增告警：最近两张快照的占用率差 >= 阈值
    async fn check_spike(&self, slot_id: &RecordId, slot: &DailySlot) -> AppResult<bool> {
        let recent = self.snapshots.latest_two(slot_id).await?;
        let [latest, previous] = recent.as_slice() else {
            return Ok(false);
        };

        let rise = latest.occupancy_pct as i64 - previous.occupancy_pct as i64;
        if rise < self.spike_threshold as i64 {
            return Ok(false);
        }

        let now = time::now_millis();
        if self
            .alerts
            .has_unresolved_kind_since(
                slot_id,
                AlertKind::SpikeDetected,
                now - self.spike_dedup_millis,
            )
            .await?
        {
            return Ok(false);
        }

        let message = format!(
            "Booking spike for slot {}: occupancy rose {} points ({}% -> {}%)",
            slot.name, rise, previous.occupancy_pct, latest.occupancy_pct
        );
        self.raise(
            slot_id,
            slot,
            AlertKind::SpikeDetected,
            AlertSeverity::High,
            message,
            latest.occupancy_pct,
            latest.active_bookings,
            now,
        )
        .await?;
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn raise(
        &self,
        slot_id: &RecordId,
        slot: &DailySlot,
        kind: AlertKind,
        severity: AlertSeverity,
        message: String,
        pct: u32,
        active: i64,
        now: i64,
    ) -> AppResult<()> {
        let alert = self
            .alerts
            .create(AlertRecord {
                id: None,
                slot: slot_id.clone(),
                slot_name: slot.name.clone(),
                kind,
                severity,
                message,
                occupancy_pct: pct,
                active_bookings: active,
                capacity: slot.capacity,
                notified: self.recipients.clone(),
                resolved: false,
                resolved_by: None,
                resolved_at: None,
                resolution_notes: None,
                created_at: now,
            })
            .await?;

        tracing::warn!(
            slot = %slot.name,
            kind = kind.as_str(),
            occupancy = pct,
            recipients = self.recipients.len(),
            "Alert raised: {}",
            alert.message
        );
        Ok(())
    }

    // ========================================================================
    // Queries & resolution
    // ========================================================================

    /// 未解决告警，过滤掉档位已不存在的孤儿记录
    pub async fn list_active(&self) -> AppResult<Vec<AlertRecord>> {
        let alerts = self.alerts.find_unresolved().await?;
        let mut visible = Vec::with_capacity(alerts.len());
        for alert in alerts {
            if self.slots.find_slot_by_id(&alert.slot).await?.is_some() {
                visible.push(alert);
            }
        }
        Ok(visible)
    }

    /// 标记告警已解决；重复解决返回 409
    pub async fn resolve(
        &self,
        alert_id: &str,
        resolver: &str,
        payload: AlertResolve,
    ) -> AppResult<AlertRecord> {
        payload.validate()?;

        let id: RecordId = alert_id
            .parse()
            .or_else(|_| format!("alert:{alert_id}").parse())
            .map_err(|_| AppError::validation(format!("Invalid alert id: {alert_id}")))?;

        if self.alerts.find_by_id(&id).await?.is_none() {
            return Err(AppError::not_found(format!("Alert {} not found", alert_id)));
        }

        let Some(resolved) = self
            .alerts
            .resolve(&id, resolver, payload.notes, time::now_millis())
            .await?
        else {
            return Err(AppError::conflict("Alert already resolved"));
        };

        tracing::info!(alert = %id, resolver, "Alert resolved");
        Ok(resolved)
    }

    async fn prune(&self) {
        let cutoff = time::now_millis() - self.retention_days * 86_400_000;
        match self.alerts.prune_resolved_before(cutoff).await {
            Ok(0) => {}
            Ok(n) => tracing::debug!(pruned = n, "Old resolved alerts pruned"),
            Err(e) => tracing::warn!(error = %e, "Alert pruning failed"),
        }
    }
}
