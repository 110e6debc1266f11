//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 互斥锁与优先级捐赠
//!
//! 线程等待一把被低优先级线程持有的锁时，把自己的优先级捐给持有者；
//! 持有者若也在等另一把锁，捐赠沿链继续传递（最多 8 层）。
//!
//! 释放锁时直接把锁交给等待者中优先级最高的线程，然后持有者的
//! 有效优先级回落到 max(基础优先级, 其他所持锁上仍在生效的捐赠)。

use crate::process::task::{Membership, Tid};
use crate::sched::Scheduler;

use super::{Acquire, LockId, LockState};

/// 互斥锁句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lock {
    id: LockId,
}

impl Lock {
    /// 创建一把未被持有的锁
    pub fn new(sched: &mut Scheduler) -> Self {
        let id = LockId(sched.sync.locks.len());
        sched.sync.locks.push(LockState::default());
        Self { id }
    }

    pub fn id(&self) -> LockId {
        self.id
    }

    /// 获取锁
    ///
    /// 锁空闲时立即获得；否则当前线程进入等待队列、向持有者捐赠优先级
    /// 并阻塞，被唤醒时锁已经归它所有。不能在中断上下文中调用，
    /// 不能重复获取自己持有的锁。
    pub fn acquire(&self, sched: &mut Scheduler) -> Acquire {
        assert!(!sched.in_interrupt(), "lock: acquire in interrupt context");
        let cur = sched.current();
        assert_ne!(self.holder(sched), Some(cur), "lock: recursive acquire by {}", cur);

        let old = sched.intr_disable();
        let result = if self.holder(sched).is_none() {
            self.take(sched, cur);
            Acquire::Immediate
        } else {
            let task = sched.task_mut(cur);
            task.waiting_lock = Some(self.id);
            task.membership = Membership::Lock(self.id);
            sched.sync.lock_mut(self.id).waiters.push(cur);
            sched.propagate_priority(cur);
            sched.block();
            Acquire::Blocked
        };
        sched.intr_set_level(old);
        result
    }

    /// 尝试获取锁，不阻塞
    pub fn try_acquire(&self, sched: &mut Scheduler) -> bool {
        let cur = sched.current();
        let old = sched.intr_disable();
        let ok = self.holder(sched).is_none();
        if ok {
            self.take(sched, cur);
        }
        sched.intr_set_level(old);
        ok
    }

    /// 释放锁
    ///
    /// 只有持有者可以释放。锁移交给最高优先级的等待者后，
    /// 若它的优先级高于当前线程则立即让出 CPU。
    pub fn release(&self, sched: &mut Scheduler) {
        let cur = sched.current();
        assert_eq!(self.holder(sched), Some(cur), "lock: release by non-holder {}", cur);

        let old = sched.intr_disable();
        release_locked(sched, self.id, cur);
        sched.intr_set_level(old);
        sched.preempt_check();
    }

    /// 当前持有者
    pub fn holder(&self, sched: &Scheduler) -> Option<Tid> {
        sched.sync.lock(self.id).holder
    }

    pub fn held_by_current(&self, sched: &Scheduler) -> bool {
        self.holder(sched) == Some(sched.current())
    }

    /// 等待者数量
    pub fn waiter_count(&self, sched: &Scheduler) -> usize {
        sched.sync.lock(self.id).waiters.len()
    }

    fn take(&self, sched: &mut Scheduler, tid: Tid) {
        sched.sync.lock_mut(self.id).holder = Some(tid);
        sched.task_mut(tid).held_locks.push(self.id);
    }
}

/// 释放 `holder` 持有的锁 `id`，移交给下一个等待者（中断已关闭，不抢占）
pub(crate) fn release_locked(sched: &mut Scheduler, id: LockId, holder: Tid) {
    sched.task_mut(holder).held_locks.retain(|&l| l != id);

    let next = sched.pop_waiter(|sync| &mut sync.lock_mut(id).waiters);
    sched.sync.lock_mut(id).holder = next;
    if let Some(tid) = next {
        let task = sched.task_mut(tid);
        task.waiting_lock = None;
        task.membership = Membership::None;
        task.held_locks.push(id);
        // 剩下的等待者现在向新持有者捐赠
        sched.refresh_priority(tid);
        sched.unblock(tid);
        log::trace!("lock: {:?} handed from {} to {}", id, holder, tid);
    }
    sched.refresh_priority(holder);
}

/// 线程退出时释放它持有的所有锁
pub(crate) fn release_all(sched: &mut Scheduler, tid: Tid) {
    while let Some(&id) = sched.task(tid).and_then(|t| t.held_locks().last()) {
        release_locked(sched, id, tid);
    }
}
