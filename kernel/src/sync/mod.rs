//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 同步原语 (Synchronization Primitives)
//!
//! 建立在调度器的 `block()`/`unblock()` 之上：
//! - [`Semaphore`] 计数信号量，等待者按优先级唤醒
//! - [`Lock`] 互斥锁，支持优先级捐赠，释放时直接移交给最高优先级的等待者
//! - [`Condvar`] 条件变量，`signal` 唤醒最高优先级的等待者
//!
//! 原语本身只是一个句柄，状态保存在调度器的 [`SyncTable`] 中：
//! 捐赠需要沿着“等待的锁 -> 持有者 -> 持有者等待的锁”一路查找，
//! 这些信息必须和线程控制块放在一起，在关中断时统一修改。
//!
//! 单 CPU 模型下 `block()` 会立即切换到下一个线程，所以阻塞型操作返回
//! [`Acquire::Blocked`]：调用线程已经让出 CPU，等它再次被调度时，
//! 资源已经移交给它，不需要重试。

pub mod condvar;
pub mod lock;
pub mod semaphore;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::process::task::Tid;
use crate::sched::runqueue::PriorityQueue;

pub use condvar::Condvar;
pub use lock::Lock;
pub use semaphore::Semaphore;

/// 锁编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LockId(pub(crate) usize);

/// 信号量编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemaId(pub(crate) usize);

/// 条件变量编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CondvarId(pub(crate) usize);

/// 阻塞型获取操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// 立即获得
    Immediate,
    /// 当前线程已阻塞，唤醒时资源已经归它所有
    Blocked,
}

#[derive(Debug, Default)]
pub(crate) struct LockState {
    pub(crate) holder: Option<Tid>,
    pub(crate) waiters: PriorityQueue,
}

#[derive(Debug, Default)]
pub(crate) struct SemaState {
    pub(crate) value: u32,
    pub(crate) waiters: PriorityQueue,
}

#[derive(Debug, Default)]
pub(crate) struct CondvarState {
    pub(crate) waiters: PriorityQueue,
    /// 每个等待者被唤醒后要重新获取的锁
    pub(crate) relock: BTreeMap<Tid, LockId>,
}

/// 所有同步原语的状态
#[derive(Debug, Default)]
pub struct SyncTable {
    pub(crate) locks: Vec<LockState>,
    pub(crate) semas: Vec<SemaState>,
    pub(crate) condvars: Vec<CondvarState>,
}

impl SyncTable {
    pub const fn new() -> Self {
        Self {
            locks: Vec::new(),
            semas: Vec::new(),
            condvars: Vec::new(),
        }
    }

    pub(crate) fn lock(&self, id: LockId) -> &LockState {
        &self.locks[id.0]
    }

    pub(crate) fn lock_mut(&mut self, id: LockId) -> &mut LockState {
        &mut self.locks[id.0]
    }

    pub(crate) fn sema_mut(&mut self, id: SemaId) -> &mut SemaState {
        &mut self.semas[id.0]
    }

    pub(crate) fn condvar_mut(&mut self, id: CondvarId) -> &mut CondvarState {
        &mut self.condvars[id.0]
    }

    /// 线程出现在哪些等待队列中（校验不变量用）
    pub(crate) fn queues_containing(&self, tid: Tid) -> Vec<crate::process::task::Membership> {
        use crate::process::task::Membership;

        let mut found = Vec::new();
        for (i, l) in self.locks.iter().enumerate() {
            if l.waiters.contains(tid) {
                found.push(Membership::Lock(LockId(i)));
            }
        }
        for (i, s) in self.semas.iter().enumerate() {
            if s.waiters.contains(tid) {
                found.push(Membership::Sema(SemaId(i)));
            }
        }
        for (i, c) in self.condvars.iter().enumerate() {
            if c.waiters.contains(tid) {
                found.push(Membership::Condvar(CondvarId(i)));
            }
        }
        found
    }
}
