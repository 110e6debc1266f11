//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器模块
//!
//! - `fixed_point`: MLFQS 使用的 17.14 定点数
//! - `runqueue`: 就绪队列（优先级 + FIFO）和睡眠队列（唤醒时刻）
//! - `sched`: [`Scheduler`]，线程生命周期、定时器、优先级捐赠、MLFQS
//!
//! 调度器是一个普通对象，可以在测试中直接构造；嵌入内核在启动时通过
//! [`init`] 创建唯一实例，之后用 [`with_scheduler`] 访问。

pub mod fixed_point;
pub mod runqueue;
#[allow(clippy::module_inception)]
pub mod sched;

use core::fmt;

use lazy_static::lazy_static;
use spin::Mutex;

use crate::errno::Errno;

pub use fixed_point::Fixed;
pub use sched::{IntrLevel, Scheduler, TickStats};

/// 调度器错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// 线程控制块耗尽
    OutOfThreads,
    /// 线程不存在
    NoSuchThread,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::OutOfThreads => write!(f, "out of thread control blocks"),
            SchedError::NoSuchThread => write!(f, "no such thread"),
        }
    }
}

impl From<SchedError> for Errno {
    fn from(err: SchedError) -> Self {
        match err {
            SchedError::OutOfThreads => Errno::TryAgain,
            SchedError::NoSuchThread => Errno::NoSuchProcess,
        }
    }
}

lazy_static! {
    /// 全局调度器实例
    static ref SCHEDULER: Mutex<Option<Scheduler>> = Mutex::new(None);
}

/// 创建全局调度器
///
/// 只能调用一次，重复调用会 panic。
pub fn init(mlfqs: bool) {
    let mut slot = SCHEDULER.lock();
    assert!(slot.is_none(), "sched: already initialized");
    *slot = Some(Scheduler::new(mlfqs));
}

/// 访问全局调度器，未初始化时返回 None
pub fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> Option<R> {
    SCHEDULER.lock().as_mut().map(f)
}
