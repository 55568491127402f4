//! 排队引擎 - 预约生命周期与队列一致性
//!
//! # 组成
//!
//! - [`allocator`] - 档位分配器：模板 → 当日档位的懒展开
//! - [`token`] - 取号生成器
//! - [`position`] - 队列位置管理：连续 1..N 不变量的执行者
//! - [`lifecycle`] - 预约状态机编排
//! - [`locks`] - 档位级别的建议锁
//! - [`reconciler`] - 过期预约巡检

pub mod allocator;
pub mod lifecycle;
pub mod locks;
pub mod position;
pub mod reconciler;
pub mod token;

pub use allocator::SlotAllocator;
pub use lifecycle::{BookingCreate, BookingLifecycle, BookingView};
pub use locks::SlotLocks;
pub use position::QueuePositionManager;
pub use reconciler::ExpiredBookingReconciler;
pub use token::TokenGenerator;
