//! 外部需求预测服务客户端
//!
//! 旁挂的 ML 预测服务，HTTP JSON 接口。服务不可达时调用方
//! 降级到本地汇总数据的启发式预测，这里只负责如实上抛。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::{AppError, AppResult};

/// 单日需求预测
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub day_name: String,
    pub predicted_demand: f64,
    pub confidence: ForecastInterval,
}

/// 预测置信区间
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastInterval {
    pub lower: f64,
    pub upper: f64,
}

/// 预测服务响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub forecast_type: String,
    pub model_used: String,
    pub generated_at: String,
    pub forecast_horizon: u32,
    pub data: Vec<ForecastDay>,
}

#[derive(Clone)]
pub struct ForecastClient {
    client: reqwest::Client,
    base_url: String,
}

impl ForecastClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 未来若干天的每日需求预测
    pub async fn daily(&self) -> AppResult<ForecastResponse> {
        let url = format!("{}/api/forecast/daily", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Forecast service unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Forecast service returned {}",
                response.status()
            )));
        }

        response
            .json::<ForecastResponse>()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid forecast payload: {e}")))
    }
}
