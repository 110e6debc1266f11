//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! Rux 执行核心
//!
//! 教学内核中与硬件无关的两块核心逻辑：
//! - 调度器：优先级抢占、优先级捐赠、MLFQS、定时器睡眠队列、同步原语
//! - 虚拟内存：补充页表、惰性加载、帧回收（时钟算法）、交换区、mmap、fork
//!
//! 上下文切换、陷阱帧、文件系统和块设备驱动由嵌入本库的内核提供，
//! 通过 `mm::pagemap` 中的 trait 接入。
//!
//! 内核构建为 `no_std`；测试时链接 std，整个核心可以在宿主机上运行。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod cmdline;
pub mod config;
pub mod errno;
pub mod mm;
pub mod process;
pub mod sched;
pub mod sync;

#[cfg(test)]
mod tests;

pub use cmdline::BootOptions;
pub use errno::Errno;

/// 按命令行初始化调度器
///
/// 嵌入内核在堆分配器就绪后调用一次；虚拟内存部分需要页池、MMU 和
/// 交换设备，由调用者另行通过 [`mm::init`] 安装。
pub fn boot(cmdline: &str) -> BootOptions {
    let opts = BootOptions::parse(cmdline);
    log::info!(
        "{} v{}: booting, scheduler={}",
        config::KERNEL_NAME,
        config::KERNEL_VERSION,
        if opts.mlfqs { "mlfqs" } else { "priority" }
    );
    sched::init(opts.mlfqs);
    opts
}
