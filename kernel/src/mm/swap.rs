//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 交换区
//!
//! 交换设备按页大小划分为槽，每槽 `PAGE_SIZE / SECTOR_SIZE` 个连续扇区。
//! 位图记录占用情况，分配时从低地址开始找第一个空闲槽。
//! 匿名页换入后立即释放它的槽。

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::config::{SECTORS_PER_SLOT, SECTOR_SIZE};

use super::page::PAGE_SIZE;
use super::pagemap::BlockDevice;
use super::VmError;

/// 交换槽编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SwapSlot(pub(crate) usize);

impl SwapSlot {
    pub fn index(&self) -> usize {
        self.0
    }

    /// 槽的第一个扇区
    fn first_sector(&self) -> usize {
        self.0 * SECTORS_PER_SLOT
    }
}

/// 定长位图
#[derive(Debug, Clone)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
}

impl Bitmap {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn test(&self, idx: usize) -> bool {
        assert!(idx < self.len, "bitmap index {} out of range", idx);
        self.words[idx / 64] & (1 << (idx % 64)) != 0
    }

    pub fn set(&mut self, idx: usize, value: bool) {
        assert!(idx < self.len, "bitmap index {} out of range", idx);
        let mask = 1u64 << (idx % 64);
        if value {
            self.words[idx / 64] |= mask;
        } else {
            self.words[idx / 64] &= !mask;
        }
    }

    /// 找到第一个清零位并置位
    pub fn scan_and_flip(&mut self) -> Option<usize> {
        for (w, word) in self.words.iter_mut().enumerate() {
            if *word != u64::MAX {
                let bit = (!*word).trailing_zeros() as usize;
                let idx = w * 64 + bit;
                if idx >= self.len {
                    return None;
                }
                *word |= 1 << bit;
                return Some(idx);
            }
        }
        None
    }

    /// 置位的个数
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// 交换槽表
pub struct SwapTable {
    disk: Box<dyn BlockDevice>,
    used: Bitmap,
}

impl SwapTable {
    /// 按设备容量建立槽位图，不足一个槽的尾部扇区不用
    pub fn new(disk: Box<dyn BlockDevice>) -> Self {
        let slots = disk.sector_count() / SECTORS_PER_SLOT;
        log::info!("swap: {} slots ({} sectors each)", slots, SECTORS_PER_SLOT);
        Self {
            disk,
            used: Bitmap::new(slots),
        }
    }

    /// 总槽数
    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    /// 已用槽数
    pub fn used(&self) -> usize {
        self.used.count_ones()
    }

    pub fn is_used(&self, slot: SwapSlot) -> bool {
        self.used.test(slot.0)
    }

    /// 分配第一个空闲槽
    pub fn alloc(&mut self) -> Result<SwapSlot, VmError> {
        match self.used.scan_and_flip() {
            Some(idx) => Ok(SwapSlot(idx)),
            None => {
                log::error!("swap: out of slots ({} in use)", self.capacity());
                Err(VmError::OutOfSwap)
            }
        }
    }

    /// 释放槽
    pub fn free(&mut self, slot: SwapSlot) {
        assert!(self.used.test(slot.0), "swap: double free of slot {}", slot.0);
        self.used.set(slot.0, false);
    }

    /// 把一页写入槽
    pub fn write(&mut self, slot: SwapSlot, page: &[u8]) {
        assert_eq!(page.len(), PAGE_SIZE);
        for (i, chunk) in page.chunks(SECTOR_SIZE).enumerate() {
            self.disk.write_sector(slot.first_sector() + i, chunk);
        }
    }

    /// 从槽读出一页
    pub fn read(&mut self, slot: SwapSlot, page: &mut [u8]) {
        assert_eq!(page.len(), PAGE_SIZE);
        for (i, chunk) in page.chunks_mut(SECTOR_SIZE).enumerate() {
            self.disk.read_sector(slot.first_sector() + i, chunk);
        }
    }
}
