//! 档位建议锁
//!
//! create/cancel/expire 的临界区 (取位置 + 改计数器 + 写预约) 按档位串行化。
//! 单条语句的原子更新之外仍需要它：位置分配和预约写入是两次存储往返。

use std::sync::Arc;

use dashmap::DashMap;
use surrealdb::RecordId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 每档位一把异步互斥锁，按需创建
#[derive(Clone, Default)]
pub struct SlotLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// 获取某档位的锁，guard 被 drop 时释放
    pub async fn acquire(&self, slot: &RecordId) -> OwnedMutexGuard<()> {
        let key = slot.to_string();
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[tokio::test]
    async fn serializes_same_slot() {
        let locks = SlotLocks::new();
        let slot = RecordId::from_table_key("daily_slot", "x");
        let counter = Arc::new(AtomicI64::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            let slot = slot.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&slot).await;
                // 非原子的读-改-写，靠锁保护
                let v = counter.load(Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.store(v + 1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn different_slots_do_not_block() {
        let locks = SlotLocks::new();
        let a = RecordId::from_table_key("daily_slot", "a");
        let b = RecordId::from_table_key("daily_slot", "b");
        let _ga = locks.acquire(&a).await;
        // 持有 a 的锁时 b 立即可得
        let _gb = locks.acquire(&b).await;
    }
}
