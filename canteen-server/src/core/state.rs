//! 服务器状态

use surrealdb::RecordId;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tokio::sync::mpsc;

use crate::alerts::AlertDetector;
use crate::core::config::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::crowd::{ForecastClient, HistoricalAggregator, SnapshotRecorder};
use crate::db::DbService;
use crate::queue::{BookingLifecycle, ExpiredBookingReconciler, SlotAllocator, SlotLocks};
use crate::utils::{AppResult, time};

/// 告警检查队列容量；满了直接丢弃，巡检任务会兜底
const CHECK_QUEUE_CAPACITY: usize = 64;

/// 服务器状态 - 持有所有组件的共享引用
///
/// 所有字段都是浅拷贝 (Arc / channel / Surreal 句柄)，
/// handler 间 clone 成本极低。
///
/// # 组件
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | db | 嵌入式数据库 |
/// | lifecycle | 预约状态机编排 |
/// | allocator | 当日档位懒展开 |
/// | detector | 告警检测与解决 |
/// | forecast | 外部需求预测客户端 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: Surreal<Db>,
    pub lifecycle: BookingLifecycle,
    pub allocator: SlotAllocator,
    pub detector: AlertDetector,
    pub forecast: ForecastClient,
    /// 档位建议锁注册表；预约操作和过期巡检共用同一份
    pub locks: SlotLocks,
    /// 服务启动时间 (Unix millis，/health 用)
    pub started_at: i64,
    check_rx: CheckReceiver,
}

/// 告警检查队列的接收端；只被 worker 任务取走一次
type CheckReceiver = std::sync::Arc<tokio::sync::Mutex<Option<mpsc::Receiver<RecordId>>>>;

impl ServerState {
    /// 初始化所有组件
    ///
    /// 打开数据库、建索引、组装排队引擎和告警管线。
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        let db_path = format!("{}/canteen.db", config.work_dir);
        let db_service = DbService::new(&db_path).await?;
        let db = db_service.db;

        let locks = SlotLocks::new();
        let (check_tx, check_rx) = mpsc::channel::<RecordId>(CHECK_QUEUE_CAPACITY);

        let lifecycle = BookingLifecycle::new(
            db.clone(),
            locks.clone(),
            config.civil_offset_minutes,
            Some(check_tx),
        );
        let allocator = SlotAllocator::new(db.clone(), config.civil_offset_minutes);
        let detector = AlertDetector::new(db.clone(), config);
        let forecast = ForecastClient::new(&config.forecast_service_url, config.forecast_timeout_secs);

        Ok(Self {
            config: config.clone(),
            db,
            lifecycle,
            allocator,
            detector,
            forecast,
            locks,
            started_at: time::now_millis(),
            check_rx: std::sync::Arc::new(tokio::sync::Mutex::new(Some(check_rx))),
        })
    }

    /// 注册全部后台任务
    ///
    /// 四个定时任务 + 一个告警检查 worker。重复调用时 worker
    /// 的接收端已被取走，跳过注册。
    pub async fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let config = &self.config;

        let recorder = SnapshotRecorder::new(
            self.db.clone(),
            config.civil_offset_minutes,
            config.snapshot_retention_days,
        );
        let interval = config.snapshot_interval_secs;
        let token = tasks.shutdown_token();
        tasks.spawn("crowd-snapshot", TaskKind::Periodic, async move {
            recorder.run(interval, token).await;
        });

        let detector = self.detector.clone();
        let interval = config.alert_sweep_interval_secs;
        let token = tasks.shutdown_token();
        tasks.spawn("alert-sweep", TaskKind::Periodic, async move {
            detector.run_sweep(interval, token).await;
        });

        let reconciler = ExpiredBookingReconciler::new(
            self.db.clone(),
            self.locks.clone(),
            config.civil_offset_minutes,
        );
        let interval = config.expiry_sweep_interval_secs;
        let token = tasks.shutdown_token();
        tasks.spawn("expiry-sweep", TaskKind::Periodic, async move {
            reconciler.run(interval, token).await;
        });

        let aggregator = HistoricalAggregator::new(
            self.db.clone(),
            config.civil_offset_minutes,
            config.rollup_retention_days,
        );
        let token = tasks.shutdown_token();
        tasks.spawn("daily-aggregator", TaskKind::Periodic, async move {
            aggregator.run(token).await;
        });

        if let Some(rx) = self.check_rx.lock().await.take() {
            let detector = self.detector.clone();
            let token = tasks.shutdown_token();
            tasks.spawn("alert-check-worker", TaskKind::Worker, async move {
                detector.run_check_worker(rx, token).await;
            });
        }

        tasks.log_summary();
    }
}
