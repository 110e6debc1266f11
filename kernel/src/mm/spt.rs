//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 补充页表
//!
//! 每个地址空间一张，虚拟页地址 -> [`Page`]。硬件页表只记录在内存中的页，
//! 这里记录所有合法的页，包括还没加载的和被换出的。
//! 同时保存该地址空间的 mmap 区域，munmap 按区域起始地址查找。

use alloc::collections::BTreeMap;

use super::page::VirtAddr;
use super::page_desc::Page;
use super::pagemap::FileHandle;
use super::VmError;

/// 一次 mmap 建立的区域
#[derive(Debug, Clone)]
pub struct MmapRegion {
    pub start: VirtAddr,
    pub page_count: usize,
    pub file: FileHandle,
}

/// 补充页表
#[derive(Debug, Default)]
pub struct SupplementalPageTable {
    pages: BTreeMap<VirtAddr, Page>,
    mmaps: BTreeMap<VirtAddr, MmapRegion>,
}

impl SupplementalPageTable {
    pub const fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            mmaps: BTreeMap::new(),
        }
    }

    /// 查找 `va` 所在的页
    pub fn find(&self, va: VirtAddr) -> Option<&Page> {
        self.pages.get(&va.floor())
    }

    pub fn find_mut(&mut self, va: VirtAddr) -> Option<&mut Page> {
        self.pages.get_mut(&va.floor())
    }

    pub fn contains(&self, va: VirtAddr) -> bool {
        self.pages.contains_key(&va.floor())
    }

    /// 插入页，地址已存在时失败
    pub fn insert(&mut self, page: Page) -> Result<(), VmError> {
        debug_assert!(page.va.is_aligned());
        if self.pages.contains_key(&page.va) {
            return Err(VmError::AlreadyMapped);
        }
        self.pages.insert(page.va, page);
        Ok(())
    }

    pub fn remove(&mut self, va: VirtAddr) -> Option<Page> {
        self.pages.remove(&va.floor())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// 所有页地址（升序）
    pub fn addresses(&self) -> impl Iterator<Item = VirtAddr> + '_ {
        self.pages.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    /// 取出所有页，表变为空
    pub fn drain(&mut self) -> impl Iterator<Item = Page> {
        core::mem::take(&mut self.pages).into_values()
    }

    pub fn insert_mmap(&mut self, region: MmapRegion) {
        self.mmaps.insert(region.start, region);
    }

    pub fn remove_mmap(&mut self, start: VirtAddr) -> Option<MmapRegion> {
        self.mmaps.remove(&start)
    }

    pub fn mmaps(&self) -> impl Iterator<Item = &MmapRegion> {
        self.mmaps.values()
    }

    pub fn clear_mmaps(&mut self) {
        self.mmaps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::page_desc::{VmType, ZeroFill};
    use alloc::boxed::Box;

    fn lazy(va: usize) -> Page {
        Page::lazy(VirtAddr::new(va), true, VmType::Anon, Box::new(ZeroFill))
    }

    #[test]
    fn test_insert_and_find() {
        let mut spt = SupplementalPageTable::new();
        assert!(spt.insert(lazy(0x1000)).is_ok());
        assert!(spt.find(VirtAddr::new(0x1fff)).is_some());
        assert!(spt.find(VirtAddr::new(0x2000)).is_none());
        assert_eq!(spt.insert(lazy(0x1000)).err(), Some(VmError::AlreadyMapped));
        assert_eq!(spt.len(), 1);
    }

    #[test]
    fn test_remove_and_drain() {
        let mut spt = SupplementalPageTable::new();
        for va in [0x3000, 0x1000, 0x2000] {
            assert!(spt.insert(lazy(va)).is_ok());
        }
        assert!(spt.remove(VirtAddr::new(0x2000)).is_some());
        let drained: alloc::vec::Vec<_> = spt.drain().map(|p| p.va.as_usize()).collect();
        assert_eq!(drained, [0x1000, 0x3000]);
        assert!(spt.is_empty());
    }
}
