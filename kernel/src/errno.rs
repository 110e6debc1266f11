//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 系统调用错误码
//!
//! 数值与 include/uapi/asm-generic/errno-base.h 一致。执行核心只用到
//! 其中与调度、内存映射相关的一小部分；领域错误（`SchedError`、
//! `VmError`）通过 `From` 转换到这里，再由系统调用层取负数返回。

/// 标准错误代码
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Errno {
    /// No such process (ESRCH, 3)
    NoSuchProcess = 3,

    /// I/O error (EIO, 5)
    IOError = 5,

    /// Try again (EAGAIN, 11)
    TryAgain = 11,

    /// Out of memory (ENOMEM, 12)
    OutOfMemory = 12,

    /// Bad address (EFAULT, 14)
    BadAddress = 14,

    /// File exists (EEXIST, 17)
    FileExists = 17,

    /// Invalid argument (EINVAL, 22)
    InvalidArgument = 22,

    /// No space left on device (ENOSPC, 28)
    NoSpaceLeftOnDevice = 28,
}

impl Errno {
    /// 获取错误代码的正数值
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// 获取错误代码的负数值（用于系统调用返回）
    #[inline]
    pub const fn as_neg_i32(self) -> i32 {
        -(self as i32)
    }

    /// 错误名称，日志用
    pub const fn name(self) -> &'static str {
        match self {
            Errno::NoSuchProcess => "ESRCH",
            Errno::IOError => "EIO",
            Errno::TryAgain => "EAGAIN",
            Errno::OutOfMemory => "ENOMEM",
            Errno::BadAddress => "EFAULT",
            Errno::FileExists => "EEXIST",
            Errno::InvalidArgument => "EINVAL",
            Errno::NoSpaceLeftOnDevice => "ENOSPC",
        }
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_i32())
    }
}
