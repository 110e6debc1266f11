//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 匿名页
//!
//! 没有文件后备的页（栈、堆、可写数据段加载后）。换出时写入交换区，
//! 换入时读回并立即释放交换槽。

use super::swap::{SwapSlot, SwapTable};
use super::VmError;

/// 换出到新分配的交换槽
///
/// 交换区耗尽时返回 `VmError::OutOfSwap`，调用者视为致命错误。
pub fn swap_out(
    swap: &mut SwapTable,
    slot: &mut Option<SwapSlot>,
    kpage: &[u8],
) -> Result<SwapSlot, VmError> {
    debug_assert!(slot.is_none(), "resident anonymous page still owns a swap slot");
    let s = swap.alloc()?;
    swap.write(s, kpage);
    *slot = Some(s);
    log::debug!("swap: out to slot {}", s.index());
    Ok(s)
}

/// 换入：页在交换区中时读回内容，从未换出过的页清零
///
/// 槽此时仍归页所有，映射建立后再由 [`release_slot`] 释放。
pub fn swap_in(swap: &mut SwapTable, slot: Option<SwapSlot>, kpage: &mut [u8]) {
    match slot {
        Some(s) => {
            swap.read(s, kpage);
            log::debug!("swap: in from slot {}", s.index());
        }
        None => kpage.fill(0),
    }
}

/// 换入完成后释放槽
pub fn release_slot(swap: &mut SwapTable, slot: &mut Option<SwapSlot>) {
    if let Some(s) = slot.take() {
        swap.free(s);
    }
}

/// 销毁页时释放它占用的槽
pub fn destroy(swap: &mut SwapTable, slot: Option<SwapSlot>) {
    if let Some(s) = slot {
        swap.free(s);
    }
}
