//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 与外部协作者的接口
//!
//! 虚拟内存核心不直接接触硬件，依赖四个由嵌入内核实现的接口：
//! - [`PagePool`]: 物理页分配器（对应 palloc_get_page/palloc_free_page）
//! - [`Mmu`]: 硬件页表，包括 accessed/dirty 位
//! - [`BlockDevice`]: 交换分区所在的块设备
//! - [`VmFile`]: 文件系统中打开的文件
//!
//! 测试中使用 `tests` 模块里的内存实现。

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use bitflags::bitflags;
use spin::Mutex;

use super::page::{PhysAddr, VirtAddr};
use super::SpaceId;

bitflags! {
    /// 缺页错误码，与 x86-64 的 #PF error code 低三位一致
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaultFlags: u32 {
        /// 置位：页存在但访问权限不足；清零：页不存在
        const PRESENT = 1 << 0;
        /// 写访问
        const WRITE = 1 << 1;
        /// 用户态访问
        const USER = 1 << 2;
    }
}

impl FaultFlags {
    /// 由陷阱处理函数解码出的三个布尔值构造
    pub fn from_parts(user: bool, write: bool, not_present: bool) -> Self {
        let mut flags = FaultFlags::empty();
        flags.set(FaultFlags::USER, user);
        flags.set(FaultFlags::WRITE, write);
        flags.set(FaultFlags::PRESENT, !not_present);
        flags
    }

    pub fn is_not_present(&self) -> bool {
        !self.contains(FaultFlags::PRESENT)
    }

    pub fn is_write(&self) -> bool {
        self.contains(FaultFlags::WRITE)
    }

    pub fn is_user(&self) -> bool {
        self.contains(FaultFlags::USER)
    }
}

/// 页表映射错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// 已经映射
    AlreadyMapped,
    /// 未映射
    NotMapped,
    /// 页表页分配失败
    OutOfMemory,
    /// 无效参数
    Invalid,
}

/// 物理页池
pub trait PagePool: Send {
    /// 分配一页，`zero` 为真时清零；没有空闲页时返回 None
    fn acquire_page(&mut self, zero: bool) -> Option<PhysAddr>;

    fn release_page(&mut self, pa: PhysAddr);

    /// 页内容（内核直接映射）
    fn page(&self, pa: PhysAddr) -> &[u8];

    fn page_mut(&mut self, pa: PhysAddr) -> &mut [u8];

    /// 整页复制
    fn copy_page(&mut self, dst: PhysAddr, src: PhysAddr) {
        let data = self.page(src).to_vec();
        self.page_mut(dst).copy_from_slice(&data);
    }
}

/// 硬件地址转换
pub trait Mmu: Send {
    fn map(&mut self, space: SpaceId, va: VirtAddr, pa: PhysAddr, writable: bool) -> Result<(), MapError>;

    fn unmap(&mut self, space: SpaceId, va: VirtAddr);

    fn is_dirty(&self, space: SpaceId, va: VirtAddr) -> bool;

    fn set_dirty(&mut self, space: SpaceId, va: VirtAddr, dirty: bool);

    fn is_accessed(&self, space: SpaceId, va: VirtAddr) -> bool;

    fn clear_accessed(&mut self, space: SpaceId, va: VirtAddr);

    /// 地址空间销毁时释放整张页表
    fn destroy(&mut self, _space: SpaceId) {}
}

/// 块设备（交换分区）
pub trait BlockDevice: Send {
    /// 扇区数
    fn sector_count(&self) -> usize;

    fn read_sector(&mut self, sector: usize, buf: &mut [u8]);

    fn write_sector(&mut self, sector: usize, buf: &[u8]);
}

/// 打开的文件
pub trait VmFile: Send {
    /// 从 `offset` 读入 `buf`，返回实际读取的字节数
    fn read_at(&mut self, buf: &mut [u8], offset: usize) -> usize;

    /// 把 `buf` 写到 `offset`，返回实际写入的字节数
    fn write_at(&mut self, buf: &[u8], offset: usize) -> usize;

    fn length(&self) -> usize;

    /// 打开同一个文件的独立描述
    fn reopen(&self) -> Option<Box<dyn VmFile>>;

    fn close(self: Box<Self>);
}

struct OpenFile(Option<Box<dyn VmFile>>);

impl Drop for OpenFile {
    fn drop(&mut self) {
        if let Some(file) = self.0.take() {
            file.close();
        }
    }
}

/// 多个页共享的文件描述
///
/// 一次 mmap 的所有页共用一个重新打开的描述，最后一个引用释放时关闭。
#[derive(Clone)]
pub struct FileHandle(Arc<Mutex<OpenFile>>);

impl FileHandle {
    pub fn new(file: Box<dyn VmFile>) -> Self {
        Self(Arc::new(Mutex::new(OpenFile(Some(file)))))
    }

    pub fn read_at(&self, buf: &mut [u8], offset: usize) -> usize {
        self.0.lock().0.as_mut().map_or(0, |f| f.read_at(buf, offset))
    }

    pub fn write_at(&self, buf: &[u8], offset: usize) -> usize {
        self.0.lock().0.as_mut().map_or(0, |f| f.write_at(buf, offset))
    }

    pub fn length(&self) -> usize {
        self.0.lock().0.as_ref().map_or(0, |f| f.length())
    }

    /// 重新打开，得到与调用者句柄无关的描述
    pub fn reopen(&self) -> Option<FileHandle> {
        let file = self.0.lock().0.as_ref()?.reopen()?;
        Some(FileHandle::new(file))
    }

    /// 是否与 `other` 是同一个描述
    pub fn same_description(&self, other: &FileHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHandle(refs={})", Arc::strong_count(&self.0))
    }
}
