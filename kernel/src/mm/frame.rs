//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 帧表与时钟置换
//!
//! 用户页占用的物理帧放在一个以 [`FrameId`] 为下标的数组中。
//! 帧记录占用它的页（地址空间 + 虚拟地址），页只记录帧下标，
//! 两者之间没有指针环；换出时清掉双方的记录即可。
//!
//! 置换使用时钟（second chance）算法：指针绕帧表转动，
//! accessed 位为 1 的帧清零后跳过，遇到 accessed 位为 0 的帧即为牺牲者。
//! 正在做 I/O 的帧被钉住，不参与选择。

use alloc::vec::Vec;

use super::page::{PhysAddr, VirtAddr};
use super::pagemap::Mmu;
use super::SpaceId;

/// 帧下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameId(pub(crate) usize);

/// 占用帧的页
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef {
    pub space: SpaceId,
    pub va: VirtAddr,
}

/// 物理帧
#[derive(Debug)]
pub struct Frame {
    pub kva: PhysAddr,
    pub owner: Option<PageRef>,
    pub pinned: bool,
}

/// 帧表
#[derive(Debug, Default)]
pub struct FrameTable {
    frames: Vec<Option<Frame>>,
    /// 时钟指针
    hand: usize,
}

impl FrameTable {
    pub const fn new() -> Self {
        Self {
            frames: Vec::new(),
            hand: 0,
        }
    }

    /// 登记一个新取得的物理页
    pub fn insert(&mut self, kva: PhysAddr) -> FrameId {
        let frame = Some(Frame {
            kva,
            owner: None,
            pinned: false,
        });
        match self.frames.iter().position(|f| f.is_none()) {
            Some(idx) => {
                self.frames[idx] = frame;
                FrameId(idx)
            }
            None => {
                self.frames.push(frame);
                FrameId(self.frames.len() - 1)
            }
        }
    }

    /// 注销帧，返回它的物理页
    pub fn remove(&mut self, id: FrameId) -> PhysAddr {
        match self.frames.get_mut(id.0).and_then(|f| f.take()) {
            Some(frame) => frame.kva,
            None => panic!("vm: frame {:?} not allocated", id),
        }
    }

    pub fn get(&self, id: FrameId) -> &Frame {
        match self.frames.get(id.0).and_then(|f| f.as_ref()) {
            Some(frame) => frame,
            None => panic!("vm: frame {:?} not allocated", id),
        }
    }

    pub fn get_mut(&mut self, id: FrameId) -> &mut Frame {
        match self.frames.get_mut(id.0).and_then(|f| f.as_mut()) {
            Some(frame) => frame,
            None => panic!("vm: frame {:?} not allocated", id),
        }
    }

    /// 在用的帧数
    pub fn len(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 选择牺牲帧
    ///
    /// 最多转两圈：第一圈清掉所有 accessed 位，第二圈必然找到未访问的帧，
    /// 除非所有帧都被钉住或空闲，此时返回 None。
    pub fn select_victim(&mut self, mmu: &mut dyn Mmu) -> Option<FrameId> {
        let n = self.frames.len();
        if n == 0 {
            return None;
        }
        for _ in 0..2 * n {
            let idx = self.hand;
            self.hand = (self.hand + 1) % n;

            let owner = match &self.frames[idx] {
                Some(Frame {
                    owner: Some(owner),
                    pinned: false,
                    ..
                }) => *owner,
                _ => continue,
            };
            if mmu.is_accessed(owner.space, owner.va) {
                mmu.clear_accessed(owner.space, owner.va);
            } else {
                return Some(FrameId(idx));
            }
        }
        None
    }
}
