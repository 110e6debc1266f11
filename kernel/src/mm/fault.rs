//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 缺页处理
//!
//! 缺页异常处理流程：
//! 1. 页存在但权限不足（写只读页）：直接失败
//! 2. 在补充页表中查找地址所在的页
//! 3. 找不到时检查是否是栈增长；是则补齐栈与现有栈页之间的空洞
//! 4. 写不可写的页：失败
//! 5. 分配帧并加载页内容
//!
//! 失败只意味着出错的进程要被终止，由 `process::page_fault` 处理。

use alloc::boxed::Box;

use crate::config::{PAGE_SIZE, STACK_LIMIT, USER_STACK_TOP};

use super::page::VirtAddr;
use super::page_desc::{VmType, ZeroFill};
use super::pagemap::FaultFlags;
use super::vm::Vm;
use super::{SpaceId, VmError};

/// push 指令在移动栈指针之前写入 rsp - 8
const PUSH_SLACK: usize = 8;

/// 栈最低可以增长到的地址
const STACK_BOTTOM: usize = USER_STACK_TOP - STACK_LIMIT;

/// `addr` 是否是对用户栈的合法访问
pub fn is_stack_access(addr: VirtAddr, rsp: usize) -> bool {
    let a = addr.as_usize();
    (STACK_BOTTOM..USER_STACK_TOP).contains(&a) && a.saturating_add(PUSH_SLACK) >= rsp
}

impl Vm {
    /// 处理缺页异常
    ///
    /// `rsp` 是出错时的用户栈指针：用户态缺页取自陷阱帧，内核态访问用户内存
    /// 时取自系统调用入口保存的值。
    pub fn handle_page_fault(
        &mut self,
        space: SpaceId,
        addr: VirtAddr,
        flags: FaultFlags,
        rsp: usize,
    ) -> Result<(), VmError> {
        self.stats.faults += 1;

        if addr.floor().as_usize() == 0 {
            return Err(VmError::InvalidAccess);
        }
        if !addr.is_user() {
            return Err(VmError::KernelAddress);
        }
        if !flags.is_not_present() {
            return Err(VmError::WriteProtected);
        }

        let found = self
            .spaces
            .get(&space)
            .ok_or(VmError::NoSuchSpace)?
            .find(addr)
            .map(|page| (page.writable, page.is_resident()));
        let (writable, resident) = match found {
            Some(found) => found,
            None if is_stack_access(addr, rsp) => return self.grow_stack(space, addr),
            None => return Err(VmError::InvalidAccess),
        };
        if flags.is_write() && !writable {
            return Err(VmError::WriteProtected);
        }
        if resident {
            // 别的路径已经装入了这一页
            return Ok(());
        }
        self.claim_page(space, addr)
    }

    /// 从 `addr` 所在页向上补齐到已有的栈页（或栈顶）
    fn grow_stack(&mut self, space: SpaceId, addr: VirtAddr) -> Result<(), VmError> {
        let bottom = addr.floor();
        let mut va = bottom;
        let mut grown = 0;
        while va.as_usize() < USER_STACK_TOP {
            let exists = self.spt(space).map_or(false, |spt| spt.contains(va));
            if exists {
                break;
            }
            self.allocate_lazy_page(space, va, true, VmType::Anon, Box::new(ZeroFill))?;
            self.claim_page(space, va)?;
            va = VirtAddr::new(va.as_usize() + PAGE_SIZE);
            grown += 1;
        }
        log::debug!("vm: space {} stack grown by {} pages down to {}", space.0, grown, bottom);
        Ok(())
    }
}
