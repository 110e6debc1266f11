//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 文件页与内存映射文件
//!
//! 文件页的内容来自文件的一段：换入时读取，换出时只有脏页写回，
//! 干净页直接丢弃。
//!
//! mmap 把文件的一段按页切分为惰性文件页，各页共享一个重新打开的文件
//! 描述，调用者关闭自己的描述不影响映射。munmap 写回脏页后删除这些页，
//! 最后一页释放时关闭描述。

use alloc::boxed::Box;

use crate::config::PAGE_SIZE;

use super::frame::PageRef;
use super::page::{pages_for, VirtAddr};
use super::page_desc::{FileBacking, Page, PageKind, SegmentLoader, VmType};
use super::pagemap::{FileHandle, Mmu};
use super::spt::MmapRegion;
use super::vm::Vm;
use super::{SpaceId, VmError};

/// 从文件读入页内容，其余部分清零
pub fn swap_in(backing: &FileBacking, kpage: &mut [u8]) -> Result<(), VmError> {
    let n = backing.file.read_at(&mut kpage[..backing.read_bytes], backing.offset);
    if n != backing.read_bytes {
        return Err(VmError::Io);
    }
    kpage[backing.read_bytes..].fill(0);
    Ok(())
}

/// 把页中属于文件的部分写回
pub fn write_back(backing: &FileBacking, kpage: &[u8]) -> Result<(), VmError> {
    let n = backing.file.write_at(&kpage[..backing.read_bytes], backing.offset);
    if n != backing.read_bytes {
        log::warn!("mmap: short write {} of {} at offset {}", n, backing.read_bytes, backing.offset);
        return Err(VmError::Io);
    }
    Ok(())
}

/// 换出：脏页写回并清除 dirty 位，返回是否写了文件
pub fn swap_out(
    backing: &FileBacking,
    mmu: &mut dyn Mmu,
    owner: PageRef,
    kpage: &[u8],
) -> Result<bool, VmError> {
    if !mmu.is_dirty(owner.space, owner.va) {
        return Ok(false);
    }
    write_back(backing, kpage)?;
    mmu.set_dirty(owner.space, owner.va, false);
    Ok(true)
}

impl Vm {
    /// 把 `file` 从 `offset` 开始的 `length` 字节映射到 `addr`
    ///
    /// # 参数
    /// - `addr`: 非零且页对齐的用户地址
    /// - `length`: 大于 0，映射 `ceil(length / PAGE_SIZE)` 页
    /// - `offset`: 页对齐
    ///
    /// 文件长度为 0、区域越过用户空间或与已有页重叠时失败，且不留下任何映射。
    /// 超出文件末尾的部分读作 0。
    pub fn mmap(
        &mut self,
        space: SpaceId,
        addr: VirtAddr,
        length: usize,
        writable: bool,
        file: &FileHandle,
        offset: usize,
    ) -> Result<VirtAddr, VmError> {
        if addr.as_usize() == 0 || !addr.is_aligned() || length == 0 || offset % PAGE_SIZE != 0 {
            log::warn!("mmap: bad arguments addr={} length={} offset={}", addr, length, offset);
            return Err(VmError::InvalidArgument);
        }
        let last = addr
            .checked_add(length - 1)
            .ok_or(VmError::InvalidArgument)?;
        if !last.is_user() {
            log::warn!("mmap: {}..{} reaches kernel space", addr, last);
            return Err(VmError::InvalidArgument);
        }
        let file_len = file.length();
        if file_len == 0 {
            log::warn!("mmap: empty file");
            return Err(VmError::InvalidArgument);
        }

        let page_count = pages_for(length);
        let spt = self.spaces.get_mut(&space).ok_or(VmError::NoSuchSpace)?;
        if (0..page_count).any(|i| spt.contains(addr.add_pages(i))) {
            log::warn!("mmap: {} overlaps an existing mapping", addr);
            return Err(VmError::AlreadyMapped);
        }

        let file = file.reopen().ok_or(VmError::Io)?;
        let mut read_left = length.min(file_len.saturating_sub(offset));
        for i in 0..page_count {
            let read_bytes = read_left.min(PAGE_SIZE);
            let loader = SegmentLoader::new(
                file.clone(),
                offset + i * PAGE_SIZE,
                read_bytes,
                PAGE_SIZE - read_bytes,
            );
            spt.insert(Page::lazy(addr.add_pages(i), writable, VmType::File, Box::new(loader)))?;
            read_left -= read_bytes;
        }
        spt.insert_mmap(MmapRegion {
            start: addr,
            page_count,
            file,
        });

        log::debug!(
            "mmap: space {} {} pages at {} (offset {}, {})",
            space.0,
            page_count,
            addr,
            offset,
            if writable { "rw" } else { "ro" }
        );
        Ok(addr)
    }

    /// 撤销从 `addr` 开始的映射
    ///
    /// 在内存中的脏页写回文件，其余页直接丢弃，不产生文件 I/O。
    pub fn munmap(&mut self, space: SpaceId, addr: VirtAddr) -> Result<(), VmError> {
        let spt = self.spaces.get_mut(&space).ok_or(VmError::NoSuchSpace)?;
        let region = spt.remove_mmap(addr).ok_or(VmError::NotMapped)?;

        let mut written = 0;
        for i in 0..region.page_count {
            let va = addr.add_pages(i);
            let page = match spt.remove(va) {
                Some(p) => p,
                None => continue,
            };
            let id = match page.frame {
                Some(id) => id,
                None => continue,
            };
            let kva = self.frames.get(id).kva;
            if let PageKind::File(backing) = &page.kind {
                if self.mmu.is_dirty(space, va) {
                    match write_back(backing, self.pool.page(kva)) {
                        Ok(()) => written += 1,
                        Err(e) => log::error!("mmap: write back of {} failed: {}", va, e),
                    }
                }
            }
            self.mmu.unmap(space, va);
            self.frames.remove(id);
            self.pool.release_page(kva);
        }
        self.stats.write_backs += written;

        log::debug!(
            "mmap: space {} unmapped {} pages at {}, {} written back",
            space.0,
            region.page_count,
            addr,
            written
        );
        Ok(())
    }
}
