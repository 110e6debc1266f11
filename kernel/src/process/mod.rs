//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 进程管理模块
//!
//! - `task`: 线程控制块
//! - `pid`: 线程号分配
//! - `fork`: 复制地址空间并创建子线程
//!
//! 本模块还是陷阱处理与虚拟内存之间的胶水：缺页异常在这里分派给
//! [`Vm::handle_page_fault`]，非法访问终止出错的进程，资源耗尽使内核 panic。

pub mod fork;
pub mod pid;
pub mod task;

use crate::mm::{FaultFlags, VirtAddr, Vm};
use crate::sched::Scheduler;

pub use task::{Task, TaskState, Tid, TID_ERROR};

/// 缺页处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// 页已装入，重新执行出错指令
    Resumed,
    /// 非法访问，出错的进程已被终止
    Killed,
}

/// 缺页异常入口
///
/// `trap_rsp` 是陷阱帧中的栈指针。内核态访问用户内存出错时，陷阱帧里是
/// 内核栈指针，改用系统调用入口保存的用户栈指针判断栈增长。
pub fn page_fault(
    sched: &mut Scheduler,
    vm: &mut Vm,
    addr: usize,
    flags: FaultFlags,
    trap_rsp: usize,
) -> FaultOutcome {
    let task = sched.current_task();
    let space = match task.space() {
        Some(space) => space,
        None => panic!(
            "page fault at {:#x} in kernel thread {} '{}' ({:?})",
            addr,
            task.tid(),
            task.name(),
            flags
        ),
    };
    let rsp = if flags.is_user() {
        trap_rsp
    } else {
        task.user_rsp().unwrap_or(trap_rsp)
    };

    match vm.handle_page_fault(space, VirtAddr::new(addr), flags, rsp) {
        Ok(()) => FaultOutcome::Resumed,
        Err(e) if e.is_fatal() => {
            log::error!("vm: fault at {:#x} cannot be served: {}", addr, e);
            panic!("vm: {}", e);
        }
        Err(e) => {
            log::debug!(
                "vm: thread {} killed: {} at {:#x} ({:?})",
                sched.current(),
                e,
                addr,
                flags
            );
            exit_process(sched, vm, -1);
            FaultOutcome::Killed
        }
    }
}

/// 系统调用入口：记录用户栈指针，供内核态缺页使用
pub fn syscall_enter(sched: &mut Scheduler, user_rsp: usize) {
    sched.set_user_rsp(user_rsp);
}

/// 当前进程退出
///
/// 先销毁地址空间（写回脏的映射页、释放帧和交换槽），再退出线程。
pub fn exit_process(sched: &mut Scheduler, vm: &mut Vm, status: i32) {
    let cur = sched.current();
    if let Some(space) = sched.current_space() {
        if let Err(e) = vm.destroy_address_space(space) {
            log::warn!("vm: destroy of space {} for thread {} failed: {}", space.0, cur, e);
        }
        // 线程仍存在，不会失败
        let _ = sched.set_space(cur, None);
    }
    sched.exit(status);
}
