//! 容量有限的结果记录
//!
//! 按最近一次写入的先后淘汰，超过容量时丢弃最早写入的键。

use std::collections::{HashMap, VecDeque};

/// 默认保留的记录数
pub const DEFAULT_HISTORY_LIMIT: usize = 10_000;

#[derive(Debug, Clone)]
pub struct BoundedHistory<V> {
    capacity: usize,
    entries: HashMap<String, (u64, V)>,
    /// 写入顺序，序号与 `entries` 不一致的项已过期
    order: VecDeque<(u64, String)>,
    next_seq: u64,
}

impl<V> BoundedHistory<V> {
    /// 容量至少为 1
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key).map(|(_, value)| value)
    }

    /// 原地修改，不改变淘汰顺序
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key).map(|(_, value)| value)
    }

    /// 写入并把该键移到最新位置
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        let seq = self.next_seq;
        self.next_seq += 1;

        self.entries.insert(key.clone(), (seq, value));
        self.order.push_back((seq, key));
        self.evict();
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let Some((seq, key)) = self.order.pop_front() else {
                break;
            };
            if self.is_current(seq, &key) {
                self.entries.remove(&key);
            }
        }

        // 同一个键反复写入会留下过期的顺序项
        if self.order.len() > self.capacity.saturating_mul(2) {
            let entries = &self.entries;
            self.order
                .retain(|(seq, key)| entries.get(key).map_or(false, |(s, _)| s == seq));
        }
    }

    fn is_current(&self, seq: u64, key: &str) -> bool {
        self.entries.get(key).map_or(false, |(s, _)| *s == seq)
    }
}

impl<V> Default for BoundedHistory<V> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
