//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 虚拟内存管理
//!
//! 按需分页的用户地址空间：
//! - `spt`: 每个地址空间的补充页表
//! - `page_desc`: 页描述符与惰性加载器
//! - `frame`: 帧表与时钟置换
//! - `swap`: 交换槽位图
//! - `anon` / `file`: 匿名页、文件页的换入换出，mmap/munmap
//! - `fault`: 缺页处理与栈增长
//! - `vm`: [`Vm`]，把以上部分与页池、MMU、交换设备连起来
//!
//! 物理页池、页表、块设备和文件由嵌入内核通过 `pagemap` 中的 trait 提供。

pub mod anon;
pub mod fault;
pub mod file;
pub mod frame;
pub mod page;
pub mod page_desc;
pub mod pagemap;
pub mod spt;
pub mod swap;
pub mod vm;

use core::fmt;

use lazy_static::lazy_static;
use spin::Mutex;

use crate::errno::Errno;

pub use page::{PhysAddr, VirtAddr, PAGE_SIZE};
pub use page_desc::{LazyLoader, Page, PageKind, SegmentLoader, VmType, ZeroFill};
pub use pagemap::{BlockDevice, FaultFlags, FileHandle, MapError, Mmu, PagePool, VmFile};
pub use vm::{Vm, VmStats};

/// 地址空间编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpaceId(pub u32);

/// 虚拟内存错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// 没有空闲帧，也找不到可换出的帧
    OutOfMemory,
    /// 交换槽耗尽
    OutOfSwap,
    /// 访问不属于任何合法区域的地址
    InvalidAccess,
    /// 写只读页，或页存在但权限不足
    WriteProtected,
    /// 用户访问内核地址
    KernelAddress,
    /// 目标地址已有页
    AlreadyMapped,
    /// 目标地址没有页
    NotMapped,
    /// 参数不合法（未对齐、长度为 0 等）
    InvalidArgument,
    /// 地址空间不存在
    NoSuchSpace,
    /// 文件读写失败
    Io,
}

impl VmError {
    /// 是否无法继续运行
    ///
    /// 换出时资源耗尽意味着内核无法再前进；其余错误只影响出错的进程。
    pub fn is_fatal(&self) -> bool {
        matches!(self, VmError::OutOfMemory | VmError::OutOfSwap)
    }

    /// 是否是非法访问（终止出错进程）
    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            VmError::InvalidAccess | VmError::WriteProtected | VmError::KernelAddress
        )
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            VmError::OutOfMemory => "out of memory",
            VmError::OutOfSwap => "out of swap slots",
            VmError::InvalidAccess => "invalid access",
            VmError::WriteProtected => "write to read-only page",
            VmError::KernelAddress => "kernel address",
            VmError::AlreadyMapped => "already mapped",
            VmError::NotMapped => "not mapped",
            VmError::InvalidArgument => "invalid argument",
            VmError::NoSuchSpace => "no such address space",
            VmError::Io => "I/O error",
        };
        f.write_str(msg)
    }
}

impl From<MapError> for VmError {
    fn from(err: MapError) -> Self {
        match err {
            MapError::AlreadyMapped => VmError::AlreadyMapped,
            MapError::NotMapped => VmError::NotMapped,
            MapError::OutOfMemory => VmError::OutOfMemory,
            MapError::Invalid => VmError::InvalidArgument,
        }
    }
}

impl From<VmError> for Errno {
    fn from(err: VmError) -> Self {
        match err {
            VmError::OutOfMemory => Errno::OutOfMemory,
            VmError::OutOfSwap => Errno::NoSpaceLeftOnDevice,
            VmError::InvalidAccess | VmError::WriteProtected | VmError::KernelAddress => {
                Errno::BadAddress
            }
            VmError::AlreadyMapped => Errno::FileExists,
            VmError::NotMapped | VmError::InvalidArgument => Errno::InvalidArgument,
            VmError::NoSuchSpace => Errno::NoSuchProcess,
            VmError::Io => Errno::IOError,
        }
    }
}

lazy_static! {
    /// 全局虚拟内存实例
    static ref VM: Mutex<Option<Vm>> = Mutex::new(None);
}

/// 安装全局虚拟内存实例
pub fn init(vm: Vm) {
    let mut slot = VM.lock();
    assert!(slot.is_none(), "vm: already initialized");
    *slot = Some(vm);
}

/// 访问全局虚拟内存实例，未初始化时返回 None
pub fn with_vm<R>(f: impl FnOnce(&mut Vm) -> R) -> Option<R> {
    VM.lock().as_mut().map(f)
}
