//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 虚拟内存管理器
//!
//! [`Vm`] 持有全局的帧表和交换表，以及所有地址空间的补充页表。
//! 页的生命周期：
//!
//! ```text
//! allocate_lazy_page -> Uninit --claim--> Anon/File (resident)
//!                                  ^            |
//!                                  +--claim-----+ evict (swap out / write back / drop)
//! ```
//!
//! 帧表和交换位图是全局共享的，换出必须相对定时器中断和其他缺页原子完成；
//! 嵌入内核通过 [`crate::mm::with_vm`] 的自旋锁在关中断状态下访问。

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::config::{PAGE_SIZE, USER_STACK_TOP};

use super::anon;
use super::file;
use super::frame::{FrameId, FrameTable, PageRef};
use super::page::{PhysAddr, VirtAddr};
use super::page_desc::{FileBacking, LazyLoader, Page, PageKind, SegmentLoader, VmType, ZeroFill};
use super::pagemap::{BlockDevice, FileHandle, Mmu, PagePool};
use super::spt::{MmapRegion, SupplementalPageTable};
use super::swap::SwapTable;
use super::{SpaceId, VmError};

/// 统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VmStats {
    pub faults: u64,
    pub evictions: u64,
    pub swap_outs: u64,
    pub swap_ins: u64,
    pub write_backs: u64,
}

/// 虚拟内存管理器
pub struct Vm {
    pub(super) pool: Box<dyn PagePool>,
    pub(super) mmu: Box<dyn Mmu>,
    pub(super) frames: FrameTable,
    pub(super) swap: SwapTable,
    pub(super) spaces: BTreeMap<SpaceId, SupplementalPageTable>,
    next_space: u32,
    pub(super) stats: VmStats,
}

/// fork 时一页的复制方式
enum CopyPlan {
    /// 子进程中仍然惰性加载
    Lazy(VmType, Box<dyn LazyLoader>),
    /// 立即分配帧并复制匿名页内容
    Anon,
    /// 立即分配帧并复制文件页内容
    File(FileBacking),
}

impl Vm {
    pub fn new(pool: Box<dyn PagePool>, mmu: Box<dyn Mmu>, swap_disk: Box<dyn BlockDevice>) -> Self {
        Self {
            pool,
            mmu,
            frames: FrameTable::new(),
            swap: SwapTable::new(swap_disk),
            spaces: BTreeMap::new(),
            next_space: 1,
            stats: VmStats::default(),
        }
    }

    /// 创建空地址空间
    pub fn create_space(&mut self) -> SpaceId {
        let id = SpaceId(self.next_space);
        self.next_space += 1;
        self.spaces.insert(id, SupplementalPageTable::new());
        log::debug!("vm: created space {}", id.0);
        id
    }

    pub fn spt(&self, space: SpaceId) -> Option<&SupplementalPageTable> {
        self.spaces.get(&space)
    }

    /// 查找页
    pub fn page(&self, space: SpaceId, va: VirtAddr) -> Option<&Page> {
        self.spaces.get(&space)?.find(va)
    }

    pub fn stats(&self) -> VmStats {
        self.stats
    }

    /// 被用户页占用的帧数
    pub fn frames_in_use(&self) -> usize {
        self.frames.len()
    }

    pub fn swap(&self) -> &SwapTable {
        &self.swap
    }

    /// 页当前所在的物理页
    pub fn resident_kva(&self, space: SpaceId, va: VirtAddr) -> Option<PhysAddr> {
        let id = self.page(space, va)?.frame?;
        Some(self.frames.get(id).kva)
    }

    /// 通过内核映射读取常驻页的内容
    pub fn page_bytes(&self, space: SpaceId, va: VirtAddr) -> Option<&[u8]> {
        let kva = self.resident_kva(space, va.floor())?;
        Some(self.pool.page(kva))
    }

    pub fn page_bytes_mut(&mut self, space: SpaceId, va: VirtAddr) -> Option<&mut [u8]> {
        let kva = self.resident_kva(space, va.floor())?;
        Some(self.pool.page_mut(kva))
    }

    // ============================================================
    // 页分配
    // ============================================================

    /// 登记一个惰性页
    ///
    /// 第一次访问时由 `loader` 填充内容，之后成为 `target` 类型的页。
    pub fn allocate_lazy_page(
        &mut self,
        space: SpaceId,
        va: VirtAddr,
        writable: bool,
        target: VmType,
        loader: Box<dyn LazyLoader>,
    ) -> Result<(), VmError> {
        if !va.is_aligned() || va.as_usize() == 0 {
            return Err(VmError::InvalidArgument);
        }
        if !va.is_user() {
            return Err(VmError::KernelAddress);
        }
        let spt = self.spaces.get_mut(&space).ok_or(VmError::NoSuchSpace)?;
        spt.insert(Page::lazy(va, writable, target, loader))
    }

    /// 登记一个全零的匿名页
    pub fn alloc_anon_page(&mut self, space: SpaceId, va: VirtAddr, writable: bool) -> Result<(), VmError> {
        self.allocate_lazy_page(space, va, writable, VmType::Anon, Box::new(ZeroFill))
    }

    /// 建立初始用户栈：栈顶下方的第一页立即分配
    ///
    /// 返回初始栈指针。
    pub fn setup_stack(&mut self, space: SpaceId) -> Result<VirtAddr, VmError> {
        let top = VirtAddr::new(USER_STACK_TOP);
        let page = VirtAddr::new(USER_STACK_TOP - PAGE_SIZE);
        self.alloc_anon_page(space, page, true)?;
        self.claim_page(space, page)?;
        Ok(top)
    }

    /// 惰性加载可执行文件的一个段
    ///
    /// `upage` 起的 `read_bytes + zero_bytes` 字节（页对齐）中，前 `read_bytes`
    /// 从文件 `offset` 处读取，其余清零。加载后成为匿名页。
    pub fn load_segment(
        &mut self,
        space: SpaceId,
        file: &FileHandle,
        offset: usize,
        upage: VirtAddr,
        read_bytes: usize,
        zero_bytes: usize,
        writable: bool,
    ) -> Result<(), VmError> {
        if (read_bytes + zero_bytes) % PAGE_SIZE != 0 || !upage.is_aligned() || offset % PAGE_SIZE != 0 {
            return Err(VmError::InvalidArgument);
        }
        let mut read_left = read_bytes;
        let pages = (read_bytes + zero_bytes) / PAGE_SIZE;
        for i in 0..pages {
            let page_read = read_left.min(PAGE_SIZE);
            let loader = SegmentLoader::new(file.clone(), offset + i * PAGE_SIZE, page_read, PAGE_SIZE - page_read);
            self.allocate_lazy_page(space, upage.add_pages(i), writable, VmType::Anon, Box::new(loader))?;
            read_left -= page_read;
        }
        Ok(())
    }

    // ============================================================
    // 帧分配与置换
    // ============================================================

    /// 为 `va` 所在的页分配帧并加载内容
    ///
    /// 页已在内存中时什么也不做。
    pub fn claim_page(&mut self, space: SpaceId, va: VirtAddr) -> Result<(), VmError> {
        let va = va.floor();
        let page = self.page(space, va).ok_or(VmError::NotMapped)?;
        if page.is_resident() {
            return Ok(());
        }
        let id = self.get_frame()?;
        self.do_claim(space, va, id)
    }

    /// 取得一个清零的帧，必要时换出
    pub(super) fn get_frame(&mut self) -> Result<FrameId, VmError> {
        match self.pool.acquire_page(true) {
            Some(kva) => Ok(self.frames.insert(kva)),
            None => self.evict_frame(),
        }
    }

    /// 选择牺牲帧、换出它的页并清零
    fn evict_frame(&mut self) -> Result<FrameId, VmError> {
        let id = match self.frames.select_victim(self.mmu.as_mut()) {
            Some(id) => id,
            None => {
                log::error!("vm: no frame to evict");
                return Err(VmError::OutOfMemory);
            }
        };
        let owner = match self.frames.get(id).owner {
            Some(owner) => owner,
            None => panic!("vm: victim frame {:?} has no owner", id),
        };

        self.frames.get_mut(id).pinned = true;
        let result = self.swap_out(owner, id);
        self.frames.get_mut(id).pinned = false;
        result?;

        self.mmu.unmap(owner.space, owner.va);
        let frame = self.frames.get_mut(id);
        frame.owner = None;
        let kva = frame.kva;
        self.pool.page_mut(kva).fill(0);
        self.stats.evictions += 1;
        log::debug!("vm: evicted {} of space {}", owner.va, owner.space.0);
        Ok(id)
    }

    /// 把帧中的页写到后备存储
    fn swap_out(&mut self, owner: PageRef, id: FrameId) -> Result<(), VmError> {
        let kva = self.frames.get(id).kva;
        let spt = self.spaces.get_mut(&owner.space).ok_or(VmError::NoSuchSpace)?;
        let page = spt.find_mut(owner.va).ok_or(VmError::NotMapped)?;
        match &mut page.kind {
            PageKind::Anon { slot } => {
                anon::swap_out(&mut self.swap, slot, self.pool.page(kva))?;
                self.stats.swap_outs += 1;
            }
            PageKind::File(backing) => {
                if file::swap_out(backing, self.mmu.as_mut(), owner, self.pool.page(kva))? {
                    self.stats.write_backs += 1;
                }
            }
            PageKind::Uninit { .. } => panic!("vm: lazy page {} occupies frame {:?}", owner.va, id),
        }
        page.frame = None;
        Ok(())
    }

    /// 把页装入帧 `id` 并建立映射；失败时释放帧
    fn do_claim(&mut self, space: SpaceId, va: VirtAddr, id: FrameId) -> Result<(), VmError> {
        let kva = {
            let frame = self.frames.get_mut(id);
            frame.owner = Some(PageRef { space, va });
            frame.pinned = true;
            frame.kva
        };

        let result = self.swap_in(space, va, id, kva);
        self.frames.get_mut(id).pinned = false;
        if let Err(e) = result {
            if let Some(page) = self.spaces.get_mut(&space).and_then(|spt| spt.find_mut(va)) {
                page.frame = None;
            }
            self.frames.remove(id);
            self.pool.release_page(kva);
            log::debug!("vm: claim of {} failed: {}", va, e);
            return Err(e);
        }
        Ok(())
    }

    /// 按页的类型填充帧内容并映射
    ///
    /// 页的类型和交换槽在映射成功之后才更新，映射失败时页保持原状，
    /// 下次缺页可以重试。
    fn swap_in(&mut self, space: SpaceId, va: VirtAddr, id: FrameId, kva: PhysAddr) -> Result<(), VmError> {
        let spt = self.spaces.get_mut(&space).ok_or(VmError::NoSuchSpace)?;
        let page = spt.find_mut(va).ok_or(VmError::NotMapped)?;
        let kpage = self.pool.page_mut(kva);

        let loaded = match &mut page.kind {
            PageKind::Uninit { target, loader } => {
                loader.load(kpage)?;
                Some(match target {
                    VmType::Anon => PageKind::Anon { slot: None },
                    VmType::File => PageKind::File(loader.file_backing().ok_or(VmError::InvalidArgument)?),
                })
            }
            PageKind::Anon { slot } => {
                anon::swap_in(&mut self.swap, *slot, kpage);
                None
            }
            PageKind::File(backing) => {
                file::swap_in(backing, kpage)?;
                None
            }
        };

        self.mmu.map(space, va, kva, page.writable)?;
        match loaded {
            Some(kind) => page.kind = kind,
            None => {
                if let PageKind::Anon { slot } = &mut page.kind {
                    if slot.is_some() {
                        self.stats.swap_ins += 1;
                    }
                    anon::release_slot(&mut self.swap, slot);
                }
            }
        }
        page.frame = Some(id);
        Ok(())
    }

    /// 释放帧，物理页还给页池
    fn free_frame(&mut self, id: FrameId) {
        let kva = self.frames.remove(id);
        self.pool.release_page(kva);
    }

    // ============================================================
    // fork
    // ============================================================

    /// 把 `parent` 的所有页复制到 `child`
    ///
    /// - 惰性页：复制加载器，子进程仍然惰性加载
    /// - 匿名页：先为子进程取帧，再从父进程的帧（或它已被换出时的交换槽）复制
    /// - 在内存中的文件页：立即复制，dirty 位一并带过去
    /// - 不在内存中的文件页：子进程惰性地从文件加载
    ///
    /// 复制期间 `parent` 不运行，`child` 还没有线程。失败时 `child` 可能只复制了
    /// 一部分，调用者应销毁它。
    pub fn duplicate_address_space(&mut self, parent: SpaceId, child: SpaceId) -> Result<(), VmError> {
        if !self.spaces.contains_key(&child) {
            return Err(VmError::NoSuchSpace);
        }
        let (addrs, regions): (Vec<VirtAddr>, Vec<MmapRegion>) = {
            let spt = self.spaces.get(&parent).ok_or(VmError::NoSuchSpace)?;
            (spt.addresses().collect(), spt.mmaps().cloned().collect())
        };

        for va in addrs {
            self.duplicate_page(parent, child, va)?;
        }
        if let Some(spt) = self.spaces.get_mut(&child) {
            for region in regions {
                spt.insert_mmap(region);
            }
        }
        log::debug!("vm: duplicated space {} into {}", parent.0, child.0);
        Ok(())
    }

    fn duplicate_page(&mut self, parent: SpaceId, child: SpaceId, va: VirtAddr) -> Result<(), VmError> {
        let (writable, plan) = {
            let page = self.page(parent, va).ok_or(VmError::NotMapped)?;
            let plan = match &page.kind {
                PageKind::Uninit { target, loader } => CopyPlan::Lazy(*target, loader.duplicate()),
                PageKind::Anon { slot } => {
                    if page.is_resident() || slot.is_some() {
                        CopyPlan::Anon
                    } else {
                        CopyPlan::Lazy(VmType::Anon, Box::new(ZeroFill))
                    }
                }
                PageKind::File(backing) => {
                    if page.is_resident() {
                        CopyPlan::File(backing.clone())
                    } else {
                        let loader = SegmentLoader::new(
                            backing.file.clone(),
                            backing.offset,
                            backing.read_bytes,
                            backing.zero_bytes,
                        );
                        CopyPlan::Lazy(VmType::File, Box::new(loader))
                    }
                }
            };
            (page.writable, plan)
        };

        let kind = match plan {
            CopyPlan::Lazy(target, loader) => {
                return self.allocate_lazy_page(child, va, writable, target, loader);
            }
            CopyPlan::Anon => PageKind::Anon { slot: None },
            CopyPlan::File(backing) => PageKind::File(backing),
        };
        let spt = self.spaces.get_mut(&child).ok_or(VmError::NoSuchSpace)?;
        spt.insert(Page {
            va,
            writable,
            frame: None,
            kind,
        })?;

        // 取帧可能换出父进程的这一页，所以之后再看父页在哪里
        let id = self.get_frame()?;
        let dst = {
            let frame = self.frames.get_mut(id);
            frame.owner = Some(PageRef { space: child, va });
            frame.kva
        };
        let dirty = match self.copy_parent_page(parent, va, dst) {
            Ok(dirty) => dirty,
            Err(e) => {
                self.free_frame(id);
                return Err(e);
            }
        };

        if let Err(e) = self.mmu.map(child, va, dst, writable) {
            self.free_frame(id);
            return Err(e.into());
        }
        if dirty {
            self.mmu.set_dirty(child, va, true);
        }
        if let Some(page) = self.spaces.get_mut(&child).and_then(|spt| spt.find_mut(va)) {
            page.frame = Some(id);
        }
        Ok(())
    }

    /// 把父进程一页的当前内容复制到 `dst`，返回父页是否为脏
    fn copy_parent_page(&mut self, parent: SpaceId, va: VirtAddr, dst: PhysAddr) -> Result<bool, VmError> {
        let spt = self.spaces.get(&parent).ok_or(VmError::NoSuchSpace)?;
        let page = spt.find(va).ok_or(VmError::NotMapped)?;
        if let Some(src_id) = page.frame {
            let src = self.frames.get(src_id).kva;
            self.pool.copy_page(dst, src);
            return Ok(self.mmu.is_dirty(parent, va));
        }
        match &page.kind {
            PageKind::Anon { slot: Some(slot) } => {
                self.swap.read(*slot, self.pool.page_mut(dst));
                Ok(false)
            }
            PageKind::File(backing) => {
                file::swap_in(backing, self.pool.page_mut(dst))?;
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    // ============================================================
    // 销毁
    // ============================================================

    /// 销毁地址空间
    ///
    /// 脏文件页写回，换出的匿名页释放交换槽，所有帧解除映射并还给页池，
    /// mmap 记录随之删除。
    pub fn destroy_address_space(&mut self, space: SpaceId) -> Result<(), VmError> {
        let mut spt = self.spaces.remove(&space).ok_or(VmError::NoSuchSpace)?;
        let mut freed = 0;
        for page in spt.drain() {
            match (&page.kind, page.frame) {
                (PageKind::File(backing), Some(id)) => {
                    if self.mmu.is_dirty(space, page.va) {
                        let kva = self.frames.get(id).kva;
                        match file::write_back(backing, self.pool.page(kva)) {
                            Ok(()) => self.stats.write_backs += 1,
                            Err(e) => log::error!("vm: write back of {} failed: {}", page.va, e),
                        }
                    }
                }
                (PageKind::Anon { slot }, None) => anon::destroy(&mut self.swap, *slot),
                _ => {}
            }
            if let Some(id) = page.frame {
                self.mmu.unmap(space, page.va);
                self.free_frame(id);
                freed += 1;
            }
        }
        spt.clear_mmaps();
        self.mmu.destroy(space);
        log::debug!("vm: destroyed space {}, {} frames freed", space.0, freed);
        Ok(())
    }
}
