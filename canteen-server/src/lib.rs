//! Canteen Server - 食堂取号排队与人流遥测服务
//!
//! # 架构概述
//!
//! - **排队引擎** (`queue`): 预约生命周期、取号、队列位置一致性
//! - **人流管线** (`crowd`): 快照采样、每日汇总、等待预测、需求预测
//! - **告警** (`alerts`): 阈值/突增告警的检测、去重与解决
//! - **数据库** (`db`): 嵌入式 SurrealDB 存储
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! canteen-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── auth/          # 网关身份提取、角色检查
//! ├── queue/         # 排队引擎
//! ├── crowd/         # 人流遥测与预测
//! ├── alerts/        # 拥挤告警
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # 数据库层
//! └── utils/         # 错误、时间、日志
//! ```

pub mod alerts;
pub mod api;
pub mod auth;
pub mod core;
pub mod crowd;
pub mod db;
pub mod queue;
pub mod utils;

// Re-export 公共类型
pub use auth::CurrentUser;
pub use core::{Config, Server, ServerState};
pub use queue::{BookingLifecycle, ExpiredBookingReconciler, SlotAllocator};
pub use utils::{AppError, AppResponse, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
