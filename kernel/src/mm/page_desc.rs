//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 页描述符
//!
//! 每个用户虚拟页在补充页表中有一个 [`Page`]，记录它的类型、后备存储
//! 和当前占用的帧。页有三种形态：
//!
//! - `Uninit`: 还没有被访问过，带一个 [`LazyLoader`]，第一次缺页时加载，
//!   之后变成目标类型
//! - `Anon`: 匿名页，换出时写入交换槽
//! - `File`: 文件页，换出时脏页写回文件，干净页直接丢弃

use alloc::boxed::Box;
use core::fmt;

use super::frame::FrameId;
use super::page::{VirtAddr, PAGE_SIZE};
use super::pagemap::FileHandle;
use super::swap::SwapSlot;
use super::VmError;

/// 页加载后的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmType {
    Anon,
    File,
}

/// 文件页的后备位置：从 `offset` 读 `read_bytes` 字节，其余 `zero_bytes` 清零
#[derive(Debug, Clone)]
pub struct FileBacking {
    pub file: FileHandle,
    pub offset: usize,
    pub read_bytes: usize,
    pub zero_bytes: usize,
}

/// 惰性加载器
///
/// 对应 Linux 的 `vm_operations_struct::fault`：页第一次被访问时调用，
/// 把内容填入新分配的帧。
pub trait LazyLoader: Send {
    /// 填充 `kpage`（长度为一页）
    fn load(&mut self, kpage: &mut [u8]) -> Result<(), VmError>;

    /// fork 时为子进程复制一份
    fn duplicate(&self) -> Box<dyn LazyLoader>;

    /// 加载后成为文件页时的后备位置
    fn file_backing(&self) -> Option<FileBacking> {
        None
    }
}

/// 全零页（栈和 bss）
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroFill;

impl LazyLoader for ZeroFill {
    fn load(&mut self, kpage: &mut [u8]) -> Result<(), VmError> {
        kpage.fill(0);
        Ok(())
    }

    fn duplicate(&self) -> Box<dyn LazyLoader> {
        Box::new(ZeroFill)
    }
}

/// 从文件加载一页：可执行文件的段，或 mmap 的一页
#[derive(Debug, Clone)]
pub struct SegmentLoader {
    backing: FileBacking,
}

impl SegmentLoader {
    pub fn new(file: FileHandle, offset: usize, read_bytes: usize, zero_bytes: usize) -> Self {
        assert_eq!(read_bytes + zero_bytes, PAGE_SIZE, "segment page must cover one page");
        Self {
            backing: FileBacking {
                file,
                offset,
                read_bytes,
                zero_bytes,
            },
        }
    }

    pub fn backing(&self) -> &FileBacking {
        &self.backing
    }
}

impl LazyLoader for SegmentLoader {
    fn load(&mut self, kpage: &mut [u8]) -> Result<(), VmError> {
        let b = &self.backing;
        let n = b.file.read_at(&mut kpage[..b.read_bytes], b.offset);
        if n != b.read_bytes {
            log::warn!("vm: short read {} of {} bytes at offset {}", n, b.read_bytes, b.offset);
            return Err(VmError::Io);
        }
        kpage[b.read_bytes..].fill(0);
        Ok(())
    }

    fn duplicate(&self) -> Box<dyn LazyLoader> {
        Box::new(self.clone())
    }

    fn file_backing(&self) -> Option<FileBacking> {
        Some(self.backing.clone())
    }
}

/// 页的当前形态
pub enum PageKind {
    Uninit {
        target: VmType,
        loader: Box<dyn LazyLoader>,
    },
    Anon {
        /// 换出时所在的交换槽
        slot: Option<SwapSlot>,
    },
    File(FileBacking),
}

impl fmt::Debug for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKind::Uninit { target, .. } => write!(f, "Uninit({:?})", target),
            PageKind::Anon { slot } => write!(f, "Anon({:?})", slot),
            PageKind::File(b) => write!(f, "File(offset={}, read={})", b.offset, b.read_bytes),
        }
    }
}

/// 页描述符
#[derive(Debug)]
pub struct Page {
    /// 页对齐的用户虚拟地址
    pub va: VirtAddr,
    pub writable: bool,
    /// 占用的帧，不在内存中时为 None
    pub frame: Option<FrameId>,
    pub kind: PageKind,
}

impl Page {
    /// 惰性页
    pub fn lazy(va: VirtAddr, writable: bool, target: VmType, loader: Box<dyn LazyLoader>) -> Self {
        Self {
            va,
            writable,
            frame: None,
            kind: PageKind::Uninit { target, loader },
        }
    }

    /// 页的类型；惰性页报告加载后的类型
    pub fn vm_type(&self) -> VmType {
        match &self.kind {
            PageKind::Uninit { target, .. } => *target,
            PageKind::Anon { .. } => VmType::Anon,
            PageKind::File(_) => VmType::File,
        }
    }

    pub fn is_resident(&self) -> bool {
        self.frame.is_some()
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.kind, PageKind::Uninit { .. })
    }

    /// 匿名页所在的交换槽
    pub fn swap_slot(&self) -> Option<SwapSlot> {
        match self.kind {
            PageKind::Anon { slot } => slot,
            _ => None,
        }
    }
}
