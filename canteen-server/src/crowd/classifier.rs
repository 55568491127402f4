//! 人流等级分类
//!
//! 纯函数，采样任务、实时状态查询和汇总任务共用同一套阈值。

use crate::db::models::CrowdLevel;

/// 占用率 (0-100) → 人流等级
///
/// `< 40` → low，`40..=69` → medium，`>= 70` → high
pub fn classify(occupancy_pct: u32) -> CrowdLevel {
    match occupancy_pct {
        0..=39 => CrowdLevel::Low,
        40..=69 => CrowdLevel::Medium,
        _ => CrowdLevel::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries() {
        assert_eq!(classify(0), CrowdLevel::Low);
        assert_eq!(classify(39), CrowdLevel::Low);
        assert_eq!(classify(40), CrowdLevel::Medium);
        assert_eq!(classify(69), CrowdLevel::Medium);
        assert_eq!(classify(70), CrowdLevel::High);
        assert_eq!(classify(100), CrowdLevel::High);
        assert_eq!(classify(150), CrowdLevel::High);
    }
}
