//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 条件变量 (Condition Variable)
//!
//! 必须与 [`Lock`] 配合使用：
//! - `wait()` 释放锁并等待
//! - `signal()` 唤醒优先级最高的等待者
//! - `broadcast()` 唤醒所有等待者
//!
//! 被唤醒的线程需要重新获得锁。发信号的线程此时一定持有这把锁，
//! 所以等待者直接从条件变量的队列转到锁的等待队列上（仍然阻塞，
//! 并向发信号者捐赠优先级），等发信号者释放锁时随锁一起被唤醒。

use crate::process::task::Membership;
use crate::sched::Scheduler;

use super::lock::release_locked;
use super::{CondvarId, CondvarState, Lock};

/// 条件变量句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condvar {
    id: CondvarId,
}

impl Condvar {
    pub fn new(sched: &mut Scheduler) -> Self {
        let id = CondvarId(sched.sync.condvars.len());
        sched.sync.condvars.push(CondvarState::default());
        Self { id }
    }

    pub fn id(&self) -> CondvarId {
        self.id
    }

    /// 释放 `lock` 并阻塞，直到被唤醒且重新获得 `lock`
    ///
    /// 当前线程必须持有 `lock`。
    pub fn wait(&self, sched: &mut Scheduler, lock: &Lock) {
        assert!(!sched.in_interrupt(), "condvar: wait in interrupt context");
        let cur = sched.current();
        assert!(lock.held_by_current(sched), "condvar: wait without holding lock");

        let old = sched.intr_disable();
        release_locked(sched, lock.id(), cur);

        let state = sched.sync.condvar_mut(self.id);
        state.waiters.push(cur);
        state.relock.insert(cur, lock.id());
        sched.task_mut(cur).membership = Membership::Condvar(self.id);
        sched.block();
        sched.intr_set_level(old);
    }

    /// 唤醒一个等待者
    ///
    /// 当前线程必须持有 `lock`。
    pub fn signal(&self, sched: &mut Scheduler, lock: &Lock) {
        assert!(lock.held_by_current(sched), "condvar: signal without holding lock");

        let old = sched.intr_disable();
        if let Some(tid) = sched.pop_waiter(|sync| &mut sync.condvar_mut(self.id).waiters) {
            let relock = sched.sync.condvar_mut(self.id).relock.remove(&tid);
            assert_eq!(relock, Some(lock.id()), "condvar: waiter {} used another lock", tid);

            let task = sched.task_mut(tid);
            task.membership = Membership::Lock(lock.id());
            task.waiting_lock = Some(lock.id());
            sched.sync.lock_mut(lock.id()).waiters.push(tid);
            sched.propagate_priority(tid);
        }
        sched.intr_set_level(old);
    }

    /// 唤醒所有等待者
    pub fn broadcast(&self, sched: &mut Scheduler, lock: &Lock) {
        while self.waiter_count(sched) > 0 {
            self.signal(sched, lock);
        }
    }

    pub fn waiter_count(&self, sched: &Scheduler) -> usize {
        sched.sync.condvars[self.id.0].waiters.len()
    }
}
