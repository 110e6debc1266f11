//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 线程控制块
//!
//! 对应 Linux 的 `struct task_struct` (include/linux/sched.h)，只保留执行核心
//! 需要的字段：状态、优先级与捐赠记录、MLFQS 统计、睡眠唤醒时刻、
//! 所在队列以及地址空间。
//!
//! 线程在任意时刻至多属于一个队列（就绪队列、睡眠队列、某个同步原语的
//! 等待队列），用 [`Membership`] 显式记录，由调度器在每次迁移时校验。

use alloc::string::String;
use alloc::vec::Vec;

use crate::config::{NICE_MAX, NICE_MIN, PRI_MAX, PRI_MIN};
use crate::mm::SpaceId;
use crate::sched::fixed_point::Fixed;
use crate::sync::{CondvarId, LockId, SemaId};

/// 线程号
pub type Tid = i32;

/// 分配失败时返回给用户态的线程号
pub const TID_ERROR: Tid = -1;

/// 控制块完整性标记，被内核栈溢出覆盖时校验失败
pub const TASK_MAGIC: u32 = 0xcd6a_bf4b;

/// 线程入口：由体系结构层在新栈上以 `aux` 为参数调用
pub type ThreadEntry = fn(usize);

/// 线程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// 正在 CPU 上运行，任意时刻只有一个
    Running,
    /// 在就绪队列中等待
    Ready,
    /// 等待某个事件（睡眠、锁、信号量、条件变量）
    Blocked,
    /// 已退出，等待下一次调度时回收
    Dying,
}

/// 线程当前所在的队列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    None,
    Ready,
    Sleep,
    Lock(LockId),
    Sema(SemaId),
    Condvar(CondvarId),
}

/// 线程控制块
#[derive(Debug)]
pub struct Task {
    tid: Tid,
    name: String,
    pub(crate) state: TaskState,

    /// 基础优先级（set_priority 设置的值）
    pub(crate) base_priority: i32,
    /// 有效优先级（可能被捐赠抬高）
    pub(crate) priority: i32,
    /// 持有的锁，按获得顺序
    pub(crate) held_locks: Vec<LockId>,
    /// 正在等待的锁
    pub(crate) waiting_lock: Option<LockId>,

    pub(crate) nice: i32,
    pub(crate) recent_cpu: Fixed,

    /// 唤醒时刻，仅在睡眠时有效
    pub(crate) wake_tick: u64,
    pub(crate) membership: Membership,

    entry: Option<ThreadEntry>,
    aux: usize,

    /// 用户地址空间，内核线程为 None
    pub(crate) space: Option<SpaceId>,
    /// 进入系统调用时保存的用户栈指针，内核态缺页时用来判断栈增长
    pub(crate) user_rsp: Option<usize>,

    pub(crate) exit_status: i32,
    pub(crate) magic: u32,
}

impl Task {
    /// 创建新线程控制块，初始状态为 Blocked
    pub fn new(tid: Tid, name: &str, priority: i32, entry: Option<ThreadEntry>, aux: usize) -> Self {
        let priority = priority.clamp(PRI_MIN, PRI_MAX);
        Self {
            tid,
            name: String::from(name),
            state: TaskState::Blocked,
            base_priority: priority,
            priority,
            held_locks: Vec::new(),
            waiting_lock: None,
            nice: 0,
            recent_cpu: Fixed::ZERO,
            wake_tick: 0,
            membership: Membership::None,
            entry,
            aux,
            space: None,
            user_rsp: None,
            exit_status: 0,
            magic: TASK_MAGIC,
        }
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// 有效优先级
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn base_priority(&self) -> i32 {
        self.base_priority
    }

    pub fn nice(&self) -> i32 {
        self.nice
    }

    pub fn recent_cpu(&self) -> Fixed {
        self.recent_cpu
    }

    pub fn membership(&self) -> Membership {
        self.membership
    }

    pub fn held_locks(&self) -> &[LockId] {
        &self.held_locks
    }

    pub fn waiting_lock(&self) -> Option<LockId> {
        self.waiting_lock
    }

    pub fn entry(&self) -> Option<(ThreadEntry, usize)> {
        self.entry.map(|f| (f, self.aux))
    }

    pub fn space(&self) -> Option<SpaceId> {
        self.space
    }

    pub fn user_rsp(&self) -> Option<usize> {
        self.user_rsp
    }

    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    /// 控制块是否完好
    pub fn is_intact(&self) -> bool {
        self.magic == TASK_MAGIC
    }

    pub(crate) fn set_nice(&mut self, nice: i32) {
        self.nice = nice.clamp(NICE_MIN, NICE_MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PRI_DEFAULT;

    #[test]
    fn test_task_creation() {
        let task = Task::new(3, "worker", PRI_DEFAULT, None, 0);
        assert_eq!(task.tid(), 3);
        assert_eq!(task.name(), "worker");
        assert_eq!(task.state(), TaskState::Blocked);
        assert_eq!(task.priority(), PRI_DEFAULT);
        assert_eq!(task.membership(), Membership::None);
        assert!(task.is_intact());
    }

    #[test]
    fn test_priority_and_nice_clamped() {
        let mut task = Task::new(4, "hi", PRI_MAX + 10, None, 0);
        assert_eq!(task.priority(), PRI_MAX);
        task.set_nice(100);
        assert_eq!(task.nice(), NICE_MAX);
        task.set_nice(-100);
        assert_eq!(task.nice(), NICE_MIN);
    }
}
