//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`AppError`] / [`AppResult`] - 应用错误类型和响应封装
//! - [`time`] - 食堂业务时间 (固定时区偏移)
//! - 日志初始化

pub mod error;
pub mod logger;
pub mod time;

pub use error::{AppError, AppResponse, AppResult, ok};
pub use time::TimeOfDay;
