//! 时间工具函数 — 食堂业务时间
//!
//! "今天" 由固定的民用时区偏移定义 (默认 UTC+5:30)，
//! 而不是宿主机的本地时钟。所有持久化时间戳统一为 `i64` Unix millis。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::AppError;

/// 当前 Unix 毫秒时间戳
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 固定偏移时区 (分钟 → FixedOffset)
///
/// 偏移非法时回退到 UTC。
pub fn civil_offset(offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| {
        tracing::warn!(
            "Invalid civil offset {} minutes, falling back to UTC",
            offset_minutes
        );
        FixedOffset::east_opt(0).expect("UTC offset is always valid")
    })
}

/// 当前民用时间 (固定偏移)
pub fn civil_now(offset_minutes: i32) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&civil_offset(offset_minutes))
}

/// 民用"今天"的日期
pub fn civil_today(offset_minutes: i32) -> NaiveDate {
    civil_now(offset_minutes).date_naive()
}

/// 当前民用时刻 (时分)
pub fn civil_time_now(offset_minutes: i32) -> TimeOfDay {
    let now = civil_now(offset_minutes);
    TimeOfDay {
        hour: now.hour() as u8,
        minute: now.minute() as u8,
    }
}

/// 当前民用小时 (0-23)，用于逐小时汇总查询
pub fn civil_hour_now(offset_minutes: i32) -> u32 {
    civil_now(offset_minutes).hour()
}

/// 民用日期 0 点 → Unix millis
pub fn day_start_millis(date: NaiveDate, offset_minutes: i32) -> i64 {
    let naive = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    naive
        .and_local_timezone(civil_offset(offset_minutes))
        .single()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// 民用日期结束 → 次日 0 点的 Unix millis
///
/// 调用方使用 `< end` (不含) 语义。
pub fn day_end_millis(date: NaiveDate, offset_minutes: i32) -> i64 {
    let next = date.succ_opt().unwrap_or(date);
    day_start_millis(next, offset_minutes)
}

/// 毫秒时间戳 → 民用小时 (0-23)
pub fn hour_of_millis(millis: i64, offset_minutes: i32) -> Option<u32> {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&civil_offset(offset_minutes)).hour())
}

/// 计算距离下一个民用午夜后 `delay_minutes` 分钟的时长
///
/// 每日汇总任务用它睡到 "午夜过后不久"。
pub fn duration_until_next_midnight(
    offset_minutes: i32,
    delay_minutes: i64,
) -> std::time::Duration {
    let now = civil_now(offset_minutes);
    let next_midnight = (now.date_naive() + Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid");
    let target = next_midnight
        .and_local_timezone(civil_offset(offset_minutes))
        .single()
        .map(|dt| dt + Duration::minutes(delay_minutes))
        .unwrap_or_else(|| now + Duration::hours(24));

    let duration = target.signed_duration_since(now);
    if duration.num_seconds() <= 0 {
        // Safety: 不应该发生，兜底 1 分钟
        std::time::Duration::from_secs(60)
    } else {
        duration
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60))
    }
}

/// 结构化时刻 (时:分)
///
/// 取代字符串 "HH:MM" 字典序比较，提供定义良好的 [`Ord`]。
/// 序列化为 "HH:MM" 字符串，与存量数据和客户端兼容。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    /// 构造，时分越界时返回 None
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| AppError::validation(format!("Invalid time of day: {}", s)))?;
        let hour: u8 = h
            .parse()
            .map_err(|_| AppError::validation(format!("Invalid hour in: {}", s)))?;
        let minute: u8 = m
            .parse()
            .map_err(|_| AppError::validation(format!("Invalid minute in: {}", s)))?;
        Self::new(hour, minute)
            .ok_or_else(|| AppError::validation(format!("Time of day out of range: {}", s)))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_parses_and_formats() {
        let t: TimeOfDay = "09:05".parse().unwrap();
        assert_eq!(t, TimeOfDay::new(9, 5).unwrap());
        assert_eq!(t.to_string(), "09:05");
    }

    #[test]
    fn time_of_day_rejects_garbage() {
        assert!("25:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn time_of_day_orders_structurally() {
        let breakfast: TimeOfDay = "07:30".parse().unwrap();
        let lunch: TimeOfDay = "12:00".parse().unwrap();
        let late: TimeOfDay = "12:05".parse().unwrap();
        assert!(breakfast < lunch);
        assert!(lunch < late);
    }

    #[test]
    fn civil_today_respects_offset() {
        // +14h 与 -12h 的"今天"在大多数时刻不同
        let east = civil_today(14 * 60);
        let west = civil_today(-12 * 60);
        assert!(east >= west);
    }

    #[test]
    fn day_bounds_are_24h_apart() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let start = day_start_millis(date, 330);
        let end = day_end_millis(date, 330);
        assert_eq!(end - start, 24 * 3600 * 1000);
    }

    #[test]
    fn next_midnight_duration_positive() {
        let d = duration_until_next_midnight(330, 10);
        assert!(d.as_secs() > 0);
        assert!(d.as_secs() <= 25 * 3600);
    }
}
