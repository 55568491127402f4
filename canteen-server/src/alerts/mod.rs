//! 拥挤告警 - 检测、去重与解决
//!
//! 两条触发路径共用一个检测器：
//! - 周期巡检当日全部档位 (阈值告警 + 突增告警)
//! - 预约创建/取消后经 mpsc 队列的单档位即时检查

pub mod detector;

pub use detector::{AlertDetector, AlertResolve};
