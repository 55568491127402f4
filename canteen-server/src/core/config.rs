//! 服务器配置
//!
//! 所有阈值/周期都可通过环境变量覆盖，默认值与原系统一致。

/// 服务器配置 - 食堂排队引擎的所有配置项
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (数据库、日志) |
/// | HTTP_PORT | 8080 | HTTP 服务端口 |
/// | CIVIL_OFFSET_MINUTES | 330 | "今天"使用的固定民用时区偏移 (UTC+5:30) |
/// | OVERCROWD_THRESHOLD | 90 | 过载告警阈值 (占用率 %) |
/// | WARNING_THRESHOLD | 80 | 容量预警阈值 (占用率 %) |
/// | SPIKE_THRESHOLD | 30 | 突增告警阈值 (占用率百分点) |
/// | ALERT_DEDUP_MINUTES | 30 | 阈值告警去重窗口 (分钟) |
/// | SPIKE_DEDUP_MINUTES | 15 | 突增告警去重窗口 (分钟) |
/// | SNAPSHOT_INTERVAL_SECS | 120 | 人流快照采样周期 (秒) |
/// | ALERT_SWEEP_INTERVAL_SECS | 120 | 告警巡检周期 (秒) |
/// | EXPIRY_SWEEP_INTERVAL_SECS | 300 | 过期预约巡检周期 (秒) |
/// | SNAPSHOT_RETENTION_DAYS | 7 | 快照保留天数 |
/// | ROLLUP_RETENTION_DAYS | 90 | 历史汇总保留天数 |
/// | ALERT_RETENTION_DAYS | 30 | 已解决告警保留天数 |
/// | FORECAST_SERVICE_URL | http://localhost:5001 | 外部需求预测服务地址 |
/// | FORECAST_TIMEOUT_SECS | 60 | 预测服务超时 (秒) |
/// | ALERT_RECIPIENTS | (空) | 告警接收人名单 (逗号分隔) |
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库和日志
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,

    // === 时间 ===
    /// "今天"使用的固定民用时区偏移 (分钟)
    pub civil_offset_minutes: i32,

    // === 告警阈值 ===
    /// 过载告警阈值 (占用率 %)
    pub overcrowd_threshold: u32,
    /// 容量预警阈值 (占用率 %)
    pub warning_threshold: u32,
    /// 突增告警阈值 (占用率上升百分点)
    pub spike_threshold: u32,
    /// 阈值告警去重窗口 (分钟)
    pub alert_dedup_minutes: i64,
    /// 突增告警去重窗口 (分钟)
    pub spike_dedup_minutes: i64,

    // === 后台任务周期 ===
    /// 人流快照采样周期 (秒)
    pub snapshot_interval_secs: u64,
    /// 告警巡检周期 (秒)
    pub alert_sweep_interval_secs: u64,
    /// 过期预约巡检周期 (秒)
    pub expiry_sweep_interval_secs: u64,

    // === 数据保留 ===
    /// 快照保留天数
    pub snapshot_retention_days: i64,
    /// 历史汇总保留天数
    pub rollup_retention_days: i64,
    /// 已解决告警保留天数
    pub alert_retention_days: i64,

    // === 外部预测服务 ===
    /// 预测服务地址
    pub forecast_service_url: String,
    /// 预测服务超时 (秒)
    pub forecast_timeout_secs: u64,

    /// 告警接收人名单 (员工/管理员 ID)
    pub alert_recipients: Vec<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_or("HTTP_PORT", 8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            civil_offset_minutes: env_or("CIVIL_OFFSET_MINUTES", 330),

            overcrowd_threshold: env_or("OVERCROWD_THRESHOLD", 90),
            warning_threshold: env_or("WARNING_THRESHOLD", 80),
            spike_threshold: env_or("SPIKE_THRESHOLD", 30),
            alert_dedup_minutes: env_or("ALERT_DEDUP_MINUTES", 30),
            spike_dedup_minutes: env_or("SPIKE_DEDUP_MINUTES", 15),

            snapshot_interval_secs: env_or("SNAPSHOT_INTERVAL_SECS", 120),
            alert_sweep_interval_secs: env_or("ALERT_SWEEP_INTERVAL_SECS", 120),
            expiry_sweep_interval_secs: env_or("EXPIRY_SWEEP_INTERVAL_SECS", 300),

            snapshot_retention_days: env_or("SNAPSHOT_RETENTION_DAYS", 7),
            rollup_retention_days: env_or("ROLLUP_RETENTION_DAYS", 90),
            alert_retention_days: env_or("ALERT_RETENTION_DAYS", 30),

            forecast_service_url: std::env::var("FORECAST_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:5001".into()),
            forecast_timeout_secs: env_or("FORECAST_TIMEOUT_SECS", 60),

            alert_recipients: std::env::var("ALERT_RECIPIENTS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::from_env();
        assert_eq!(config.civil_offset_minutes, 330);
        assert_eq!(config.overcrowd_threshold, 90);
        assert_eq!(config.warning_threshold, 80);
        assert_eq!(config.spike_threshold, 30);
        assert_eq!(config.alert_dedup_minutes, 30);
        assert_eq!(config.spike_dedup_minutes, 15);
        assert_eq!(config.snapshot_interval_secs, 120);
        assert_eq!(config.expiry_sweep_interval_secs, 300);
    }
}
