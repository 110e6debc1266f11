//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 线程号分配
//!
//! 和 Linux 的 alloc_pid() (kernel/pid.c) 一样单调递增，不复用：
//! - tid 1: 引导线程 main
//! - tid 2: idle 线程
//! - tid 3+: 普通线程

use core::sync::atomic::{AtomicI32, Ordering};

use super::task::Tid;

/// 引导线程号
pub const TID_MAIN: Tid = 1;

/// 线程号上限
pub const TID_MAX: Tid = i32::MAX;

/// 每个调度器实例一个分配器
#[derive(Debug)]
pub struct TidAllocator {
    next: AtomicI32,
}

impl TidAllocator {
    pub const fn new() -> Self {
        Self {
            next: AtomicI32::new(TID_MAIN),
        }
    }

    /// 分配一个新的线程号，耗尽时返回 None
    pub fn alloc(&self) -> Option<Tid> {
        let tid = self.next.fetch_add(1, Ordering::Relaxed);
        if (TID_MAIN..TID_MAX).contains(&tid) {
            Some(tid)
        } else {
            None
        }
    }
}

impl Default for TidAllocator {
    fn default() -> Self {
        Self::new()
    }
}
