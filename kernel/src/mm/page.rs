//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 地址类型与页对齐工具

use core::fmt;

pub use crate::config::{PAGE_SHIFT, PAGE_SIZE};
use crate::config::KERNEL_BASE;

pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// 物理地址（内核可直接访问的页地址）
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(pub usize);

/// 用户虚拟地址
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtAddr(pub usize);

impl PhysAddr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn as_usize(&self) -> usize {
        self.0
    }

    pub const fn is_aligned(&self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    pub const fn floor(&self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }
}

impl VirtAddr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn as_usize(&self) -> usize {
        self.0
    }

    pub const fn is_aligned(&self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    /// 向下对齐到页边界
    pub const fn floor(&self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// 向上对齐到页边界
    pub const fn ceil(&self) -> Self {
        Self((self.0 + PAGE_MASK) & !PAGE_MASK)
    }

    /// 页内偏移
    pub const fn page_offset(&self) -> usize {
        self.0 & PAGE_MASK
    }

    pub const fn page_number(&self) -> usize {
        self.0 >> PAGE_SHIFT
    }

    /// 是否位于用户空间
    pub const fn is_user(&self) -> bool {
        self.0 < KERNEL_BASE
    }

    /// 是否位于内核空间
    pub const fn is_kernel(&self) -> bool {
        !self.is_user()
    }

    /// 加上偏移；溢出时返回 None
    pub fn checked_add(&self, offset: usize) -> Option<Self> {
        self.0.checked_add(offset).map(Self)
    }

    /// 后面第 `n` 个页
    pub const fn add_pages(&self, n: usize) -> Self {
        Self(self.0 + n * PAGE_SIZE)
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA({:#x})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA({:#x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// 覆盖 `len` 字节需要的页数
pub const fn pages_for(len: usize) -> usize {
    (len + PAGE_MASK) >> PAGE_SHIFT
}
