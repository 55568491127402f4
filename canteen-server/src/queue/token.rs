//! 取号生成器
//!
//! 标签 = 档位名首字母 + 3 位零填充序号，
//! 序号 = 1 + 当日 (民用时区) 已为该档位创建的预约数。
//! 并发创建下不保证无碰撞，唯一性是提示性的，不承载正确性。

use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;

use crate::db::repository::BookingRepository;
use crate::utils::{AppResult, time};

#[derive(Clone)]
pub struct TokenGenerator {
    bookings: BookingRepository,
    civil_offset_minutes: i32,
}

impl TokenGenerator {
    pub fn new(db: Surreal<Db>, civil_offset_minutes: i32) -> Self {
        Self {
            bookings: BookingRepository::new(db),
            civil_offset_minutes,
        }
    }

    /// 为新预约生成取号标签，如 "L007"
    pub async fn next_token(&self, slot_id: &RecordId, slot_name: &str) -> AppResult<String> {
        let today = time::civil_today(self.civil_offset_minutes);
        let day_start = time::day_start_millis(today, self.civil_offset_minutes);
        let count = self.bookings.count_for_slot_since(slot_id, day_start).await?;
        Ok(format_token(slot_name, count + 1))
    }
}

/// 标签格式化：首字母大写 + 3 位序号
pub fn format_token(slot_name: &str, sequence: i64) -> String {
    let initial = slot_name
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('S');
    format!("{}{:03}", initial, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_format_pads_to_three_digits() {
        assert_eq!(format_token("Lunch", 1), "L001");
        assert_eq!(format_token("Lunch", 42), "L042");
        assert_eq!(format_token("breakfast", 7), "B007");
    }

    #[test]
    fn token_sequence_beyond_padding_width() {
        assert_eq!(format_token("Dinner", 1234), "D1234");
    }

    #[test]
    fn empty_slot_name_falls_back() {
        assert_eq!(format_token("", 3), "S003");
    }
}
