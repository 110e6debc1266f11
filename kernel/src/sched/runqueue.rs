//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 就绪队列与睡眠队列
//!
//! [`PriorityQueue`] 同时用于就绪队列和各同步原语的等待队列：
//! 出队时选择有效优先级最高的线程，同优先级先进先出。
//! 优先级在排队期间可能因捐赠而改变，所以不在入队时排序，
//! 而是在出队时按当前优先级扫描。
//!
//! [`SleepQueue`] 按唤醒时刻排序，同一时刻先进先出。

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::process::task::Tid;

#[derive(Debug, Clone, Copy)]
struct Entry {
    tid: Tid,
    seq: u64,
}

/// 按有效优先级出队的队列
#[derive(Debug, Default)]
pub struct PriorityQueue {
    entries: Vec<Entry>,
    next_seq: u64,
}

impl PriorityQueue {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// 入队到同优先级线程之后
    pub fn push(&mut self, tid: Tid) {
        debug_assert!(!self.contains(tid), "tid {} queued twice", tid);
        self.entries.push(Entry {
            tid,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    /// 最高优先级线程的下标
    fn position_max(&self, priority_of: impl Fn(Tid) -> i32) -> Option<usize> {
        let mut best: Option<(usize, i32, u64)> = None;
        for (i, e) in self.entries.iter().enumerate() {
            let p = priority_of(e.tid);
            match best {
                Some((_, bp, bs)) if p < bp || (p == bp && e.seq > bs) => {}
                _ => best = Some((i, p, e.seq)),
            }
        }
        best.map(|(i, _, _)| i)
    }

    /// 取出最高优先级线程
    pub fn pop_max(&mut self, priority_of: impl Fn(Tid) -> i32) -> Option<Tid> {
        let idx = self.position_max(priority_of)?;
        Some(self.entries.remove(idx).tid)
    }

    /// 查看最高优先级线程
    pub fn peek_max(&self, priority_of: impl Fn(Tid) -> i32) -> Option<Tid> {
        self.position_max(priority_of).map(|i| self.entries[i].tid)
    }

    /// 从队列中移除指定线程
    pub fn remove(&mut self, tid: Tid) -> bool {
        match self.entries.iter().position(|e| e.tid == tid) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.entries.iter().any(|e| e.tid == tid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按入队顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = Tid> + '_ {
        self.entries.iter().map(|e| e.tid)
    }
}

/// 按唤醒时刻排序的睡眠队列
#[derive(Debug, Default)]
pub struct SleepQueue {
    sleepers: BTreeMap<(u64, u64), Tid>,
    next_seq: u64,
}

impl SleepQueue {
    pub const fn new() -> Self {
        Self {
            sleepers: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, tid: Tid, wake_tick: u64) {
        self.sleepers.insert((wake_tick, self.next_seq), tid);
        self.next_seq += 1;
    }

    /// 取出一个唤醒时刻不晚于 `now` 的线程
    pub fn pop_expired(&mut self, now: u64) -> Option<Tid> {
        let (&key, _) = self.sleepers.iter().next()?;
        if key.0 <= now {
            self.sleepers.remove(&key)
        } else {
            None
        }
    }

    /// 最早的唤醒时刻
    pub fn next_wakeup(&self) -> Option<u64> {
        self.sleepers.keys().next().map(|k| k.0)
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.sleepers.values().any(|&t| t == tid)
    }

    pub fn len(&self) -> usize {
        self.sleepers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sleepers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tid> + '_ {
        self.sleepers.values().copied()
    }
}
