//! 统一错误处理
//!
//! 提供应用级错误类型和响应结构：
//! - [`AppError`] - 应用错误枚举
//! - [`AppResponse`] - API 响应结构
//!
//! # 错误码规范
//!
//! | 前缀 | 分类 | 示例 |
//! |------|------|------|
//! | E01xx | 预约业务错误 | E0102 档口已关闭 |
//! | E3xxx | 身份错误 | E3001 缺少身份头 |
//! | E9xxx | 系统错误 | E9002 数据库错误 |
//!
//! # 使用示例
//!
//! ```ignore
//! // 返回错误
//! Err(AppError::not_found("Booking not found"))
//!
//! // 返回成功响应
//! Ok(ok(data))
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// API 统一响应结构
///
/// ```json
/// {
///   "code": "E0000",
///   "message": "Success",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    /// 错误码 (E0000 表示成功)
    pub code: String,
    /// 消息
    pub message: String,
    /// 响应数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 应用错误枚举
///
/// # 错误分类
///
/// | 分类 | 说明 |
/// |------|------|
/// | 身份错误 | 网关未注入身份、角色不符、非本人预约 |
/// | 预约业务错误 | 档口关闭、容量已满、非法状态迁移 |
/// | 系统错误 | 数据库错误、外部服务错误、内部错误 |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== 身份错误 (4xx) ==========
    #[error("Authentication required")]
    /// 上游网关未注入身份头 (401)
    Unauthorized,

    #[error("Permission denied: {0}")]
    /// 角色不符或非本人预约 (403)
    Forbidden(String),

    // ========== 业务逻辑错误 (4xx) ==========
    #[error("Resource not found: {0}")]
    /// 资源不存在 (404)
    NotFound(String),

    #[error("Validation failed: {0}")]
    /// 验证失败 (400)
    Validation(String),

    #[error("Slot closed: {0}")]
    /// 档口已关闭：非当日或已过结束时间 (400)
    SlotClosed(String),

    #[error("Slot full: {0}")]
    /// 档口容量已满 (400)
    SlotFull(String),

    #[error("Invalid transition: booking is {current}, cannot {action}")]
    /// 非法状态迁移，消息中带当前状态 (400)
    InvalidTransition { current: String, action: String },

    #[error("Conflict: {0}")]
    /// 资源冲突，如重复 resolve 告警 (409)
    Conflict(String),

    // ========== 系统错误 (5xx) ==========
    #[error("External service error: {0}")]
    /// 外部预测服务不可达/超时 (502)
    ///
    /// 调用方应在本地降级处理，正常情况下不会到达客户端。
    ExternalService(String),

    #[error("Database error: {0}")]
    /// 数据库错误 (500)
    Database(String),

    #[error("Internal server error: {0}")]
    /// 内部错误 (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "E3001",
                "Authentication required".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "E3002", msg.clone()),

            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg.clone()),

            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg.clone()),
            AppError::SlotClosed(msg) => (StatusCode::BAD_REQUEST, "E0102", msg.clone()),
            AppError::SlotFull(msg) => (StatusCode::BAD_REQUEST, "E0103", msg.clone()),
            AppError::InvalidTransition { .. } => {
                (StatusCode::BAD_REQUEST, "E0104", self.to_string())
            }

            AppError::Conflict(msg) => (StatusCode::CONFLICT, "E0004", msg.clone()),

            AppError::ExternalService(msg) => {
                error!(target: "forecast", error = %msg, "External service error reached response layer");
                (
                    StatusCode::BAD_GATEWAY,
                    "E9003",
                    "External service unavailable".to_string(),
                )
            }
            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9002",
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9001",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message,
            data: None,
        });

        (status, body).into_response()
    }
}

// ========== Helper Constructors ==========

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 非法状态迁移，附带当前状态供客户端展示
    pub fn invalid_transition(current: impl Into<String>, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            current: current.into(),
            action: action.into(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Application-level Result type
///
/// Used in HTTP handlers and application logic
pub type AppResult<T> = Result<T, AppError>;

// ========== Helper functions ==========

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: "Success".to_string(),
        data: Some(data),
    })
}
