//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 信号量 (Semaphore)
//!
//! 对应 Linux 的 `kernel/locking/semaphore.c`：
//! - P 操作 (down): 值大于 0 时减 1，否则阻塞
//! - V 操作 (up): 有等待者时唤醒优先级最高的一个，否则值加 1
//!
//! 唤醒时不把值加回去：被唤醒的线程直接获得这一次 V 操作。

use crate::process::task::Membership;
use crate::sched::Scheduler;

use super::{Acquire, SemaId, SemaState};

/// 计数信号量句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Semaphore {
    id: SemaId,
}

impl Semaphore {
    /// 创建新信号量
    ///
    /// # 参数
    /// * `value` - 初始值
    pub fn new(sched: &mut Scheduler, value: u32) -> Self {
        let id = SemaId(sched.sync.semas.len());
        sched.sync.semas.push(SemaState {
            value,
            ..SemaState::default()
        });
        Self { id }
    }

    pub fn id(&self) -> SemaId {
        self.id
    }

    /// P 操作
    ///
    /// 不能在中断上下文中调用。
    ///
    /// # 返回
    /// - `Acquire::Immediate`: 值大于 0，已减 1
    /// - `Acquire::Blocked`: 当前线程已阻塞，被 `up` 唤醒时即完成 P 操作
    pub fn down(&self, sched: &mut Scheduler) -> Acquire {
        assert!(!sched.in_interrupt(), "sema: down in interrupt context");
        let cur = sched.current();
        let old = sched.intr_disable();
        let state = sched.sync.sema_mut(self.id);
        let result = if state.value > 0 {
            state.value -= 1;
            Acquire::Immediate
        } else {
            state.waiters.push(cur);
            sched.task_mut(cur).membership = Membership::Sema(self.id);
            sched.block();
            Acquire::Blocked
        };
        sched.intr_set_level(old);
        result
    }

    /// 非阻塞 P 操作，可在中断上下文中调用
    pub fn try_down(&self, sched: &mut Scheduler) -> bool {
        let old = sched.intr_disable();
        let state = sched.sync.sema_mut(self.id);
        let ok = state.value > 0;
        if ok {
            state.value -= 1;
        }
        sched.intr_set_level(old);
        ok
    }

    /// V 操作
    ///
    /// 可在中断上下文中调用；被唤醒线程优先级更高时，
    /// 普通上下文立即让出 CPU，中断上下文推迟到中断返回。
    pub fn up(&self, sched: &mut Scheduler) {
        let old = sched.intr_disable();
        match sched.pop_waiter(|sync| &mut sync.sema_mut(self.id).waiters) {
            Some(tid) => {
                sched.task_mut(tid).membership = Membership::None;
                sched.unblock(tid);
            }
            None => sched.sync.sema_mut(self.id).value += 1,
        }
        sched.intr_set_level(old);
        sched.preempt_check();
    }

    /// 当前值
    pub fn value(&self, sched: &Scheduler) -> u32 {
        sched.sync.semas[self.id.0].value
    }

    /// 等待者数量
    pub fn waiter_count(&self, sched: &Scheduler) -> usize {
        sched.sync.semas[self.id.0].waiters.len()
    }
}
