//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 内核配置
//!
//! 大部分常量由 build.rs 根据 Kernel.toml 生成；
//! 优先级和 nice 的取值范围属于调度算法本身，不可配置。

include!(concat!(env!("OUT_DIR"), "/config.rs"));

/// 最低优先级（idle 线程）
pub const PRI_MIN: i32 = 0;

/// 默认优先级
pub const PRI_DEFAULT: i32 = 31;

/// 最高优先级
pub const PRI_MAX: i32 = 63;

/// nice 下限
pub const NICE_MIN: i32 = -20;

/// nice 上限
pub const NICE_MAX: i32 = 20;

/// 优先级捐赠链的最大深度
pub const DONATION_DEPTH: usize = 8;

/// 每个交换槽占用的扇区数
pub const SECTORS_PER_SLOT: usize = PAGE_SIZE / SECTOR_SIZE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_constants() {
        assert_eq!(1 << PAGE_SHIFT, PAGE_SIZE);
        assert!(SECTORS_PER_SLOT >= 1);
        assert_eq!(USER_STACK_TOP % PAGE_SIZE, 0);
        assert!(USER_STACK_TOP < KERNEL_BASE);
        assert!(TIME_SLICE > 0);
    }

    #[test]
    fn test_kernel_identity() {
        // 名称和版本取自 Kernel.toml 的 [general] 节
        assert_eq!(KERNEL_NAME, "Rux");
        assert_eq!(KERNEL_VERSION, "0.1.0");
    }
}
