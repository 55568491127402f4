//! 人流遥测与预测管线
//!
//! - [`classifier`] - 占用率 → 人流等级的纯函数
//! - [`recorder`] - 定时快照采样
//! - [`aggregator`] - 每日按小时汇总
//! - [`predictor`] - 等待时间启发式预测
//! - [`forecast`] - 外部需求预测服务客户端

pub mod aggregator;
pub mod classifier;
pub mod forecast;
pub mod predictor;
pub mod recorder;

pub use aggregator::HistoricalAggregator;
pub use classifier::classify;
pub use forecast::{ForecastClient, ForecastDay};
pub use predictor::{Confidence, WaitPrediction, WaitTimePredictor};
pub use recorder::SnapshotRecorder;
