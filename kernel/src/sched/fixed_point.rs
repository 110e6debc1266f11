//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 17.14 定点数
//!
//! MLFQS 的 `load_avg` 和 `recent_cpu` 是实数，内核不使用浮点，
//! 这里用 32 位有符号整数表示：低 14 位是小数部分。
//! 乘除法的中间结果放在 i64 中，先乘后除，避免溢出和精度损失。

use core::fmt;
use core::ops::{Add, Div, Mul, Sub};

/// 小数位数
const FRACTION_BITS: u32 = 14;

/// 缩放因子 f = 2^14
const F: i64 = 1 << FRACTION_BITS;

/// 17.14 定点数
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(F as i32);

    /// 整数 n 转换为定点数
    pub const fn from_int(n: i32) -> Self {
        Fixed(n * F as i32)
    }

    /// 直接使用原始表示
    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// 向零取整
    pub const fn trunc(self) -> i32 {
        self.0 / F as i32
    }

    /// 四舍五入（远离零）
    pub const fn round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + F as i32 / 2) / F as i32
        } else {
            (self.0 - F as i32 / 2) / F as i32
        }
    }

    /// `self * n` 四舍五入到整数，乘法在 i64 中完成
    ///
    /// 结果可以超出 17.14 的表示范围，用于 ×100 的统计输出。
    pub fn round_scaled(self, n: i32) -> i64 {
        let x = self.0 as i64 * n as i64;
        if x >= 0 {
            (x + F / 2) / F
        } else {
            (x - F / 2) / F
        }
    }
}

/// 把 i64 中间结果收窄回 17.14，调试构建下检查越界
fn narrow(x: i64) -> Fixed {
    debug_assert!(
        x >= i32::MIN as i64 && x <= i32::MAX as i64,
        "fixed point overflow: raw {}",
        x
    );
    Fixed(x as i32)
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 + rhs.0)
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 - rhs.0)
    }
}

impl Add<i32> for Fixed {
    type Output = Fixed;

    fn add(self, n: i32) -> Fixed {
        self + Fixed::from_int(n)
    }
}

impl Sub<i32> for Fixed {
    type Output = Fixed;

    fn sub(self, n: i32) -> Fixed {
        self - Fixed::from_int(n)
    }
}

impl Mul for Fixed {
    type Output = Fixed;

    fn mul(self, rhs: Fixed) -> Fixed {
        narrow(self.0 as i64 * rhs.0 as i64 / F)
    }
}

impl Mul<i32> for Fixed {
    type Output = Fixed;

    fn mul(self, n: i32) -> Fixed {
        Fixed(self.0 * n)
    }
}

impl Div for Fixed {
    type Output = Fixed;

    fn div(self, rhs: Fixed) -> Fixed {
        narrow(self.0 as i64 * F / rhs.0 as i64)
    }
}

impl Div<i32> for Fixed {
    type Output = Fixed;

    fn div(self, n: i32) -> Fixed {
        Fixed(self.0 / n)
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 两位小数足够看清 load_avg/recent_cpu 的变化
        let hundredths = self.round_scaled(100);
        let sign = if hundredths < 0 { "-" } else { "" };
        let h = hundredths.abs();
        write!(f, "Fixed({}{}.{:02})", sign, h / 100, h % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_conversion() {
        assert_eq!(Fixed::from_int(5).raw(), 5 << 14);
        assert_eq!(Fixed::from_int(-3).trunc(), -3);
        assert_eq!(Fixed::ONE, Fixed::from_int(1));
    }

    #[test]
    fn test_round_half_away_from_zero() {
        let half = Fixed::from_int(5) / 2;
        assert_eq!(half.round(), 3);
        assert_eq!(half.trunc(), 2);

        let neg_half = Fixed::from_int(-5) / 2;
        assert_eq!(neg_half.round(), -3);
        assert_eq!(neg_half.trunc(), -2);

        let just_below = Fixed::from_raw((5 << 13) - 1);
        assert_eq!(just_below.round(), 2);
    }

    #[test]
    fn test_mul_div_precision() {
        // 59/60 * 1.0 不应被截断成 0
        let coef = Fixed::from_int(59) / 60;
        assert_eq!(coef.raw(), (59 << 14) / 60);
        assert!(coef * Fixed::ONE > Fixed::ZERO);

        // 300 * 300 在范围内，但原始值相乘需要 i64 中间值
        let big = Fixed::from_int(300);
        assert_eq!((big * big).trunc(), 90_000);
        assert_eq!((Fixed::from_int(90_000) / big).trunc(), 300);
        assert_eq!((Fixed::from_int(7) / Fixed::from_int(2)).raw(), 7 << 13);
    }

    #[test]
    fn test_mixed_ops() {
        let x = Fixed::from_int(3) + 2 - 1;
        assert_eq!(x, Fixed::from_int(4));
        assert_eq!((x * 3).trunc(), 12);
        assert_eq!((x / 8).raw(), 1 << 13);
    }

    #[test]
    fn test_round_scaled_exceeds_range() {
        // 2000 * 100 超出 17.14，但统计输出仍然正确
        let cpu = Fixed::from_int(2000) + Fixed::from_int(1) / 4;
        assert_eq!(cpu.round_scaled(100), 200_025);
        assert_eq!((Fixed::from_int(-1) / 8).round_scaled(100), -13);
        assert_eq!(Fixed::from_int(59).round_scaled(100), 5900);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "fixed point overflow")]
    fn test_mul_overflow_is_caught() {
        let big = Fixed::from_int(1000);
        let _ = big * big;
    }
}
