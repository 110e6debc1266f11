//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 进程创建 (fork)
//!
//! 流程:
//! 1. 为子进程创建空地址空间
//! 2. 复制父进程的页（惰性页保持惰性，在内存或交换区中的页立即复制）
//! 3. 创建子线程并绑定地址空间，继承父线程的基础优先级和用户栈指针
//!
//! 任何一步失败都会销毁已经复制了一部分的子地址空间。
//! 子线程从 `entry` 开始运行；嵌入内核在这里恢复父进程的陷阱帧并让 fork 返回 0。

use crate::errno::Errno;
use crate::mm::{SpaceId, Vm};
use crate::process::task::{ThreadEntry, Tid, TID_ERROR};
use crate::sched::Scheduler;

/// 创建子进程
///
/// # 返回
/// - `Ok(tid)`: 子线程号（在父进程中返回）
/// - `Err(Errno::InvalidArgument)`: 当前线程没有用户地址空间
/// - 其他错误：复制地址空间或创建线程失败
pub fn do_fork(
    sched: &mut Scheduler,
    vm: &mut Vm,
    name: &str,
    entry: ThreadEntry,
    aux: usize,
) -> Result<Tid, Errno> {
    let parent = sched.current_space().ok_or(Errno::InvalidArgument)?;
    let child = vm.create_space();

    if let Err(e) = vm.duplicate_address_space(parent, child) {
        log::warn!("fork: copying space {} failed: {}", parent.0, e);
        discard_child(vm, child);
        return Err(e.into());
    }

    let (priority, user_rsp) = {
        let task = sched.current_task();
        (task.base_priority(), task.user_rsp())
    };
    match sched.spawn_in(name, priority, entry, aux, Some(child)) {
        Ok(tid) => {
            sched.task_mut(tid).user_rsp = user_rsp;
            log::debug!("fork: {} -> {} (space {})", sched.current(), tid, child.0);
            Ok(tid)
        }
        Err(e) => {
            log::warn!("fork: spawning child of space {} failed: {}", parent.0, e);
            discard_child(vm, child);
            Err(e.into())
        }
    }
}

/// 销毁 fork 失败时留下的子地址空间
fn discard_child(vm: &mut Vm, child: SpaceId) {
    if let Err(e) = vm.destroy_address_space(child) {
        log::warn!("fork: destroy of child space {} failed: {}", child.0, e);
    }
}

/// fork 系统调用，失败时返回 `TID_ERROR`
pub fn sys_fork(sched: &mut Scheduler, vm: &mut Vm, name: &str, entry: ThreadEntry, aux: usize) -> Tid {
    do_fork(sched, vm, name, entry, aux).unwrap_or(TID_ERROR)
}
