//! # Conservative Arithmetic
//!
//! Relations compute privacy bounds in floating point. A bound that rounds
//! down even by one ulp under-reports privacy loss, so every operation used
//! inside a relation rounds toward +∞ (`inf_*`) or, for quantities that are
//! subtracted or inverted later, toward −∞ (`neg_inf_*`).
//!
//! ## Security Invariant
//!
//! `inf_op(a, b) >= a op b` over the reals for every finite input.
//! Exact results are NOT bumped: `inf_div(100.0, 10.0) == 10.0`.
//!
//! Addition, multiplication, division and square root are exact-aware via
//! error-free transformations (TwoSum, fused multiply-add residuals).
//! Transcendentals are bumped by one ulp unconditionally, except at the
//! points where the result is exact (`ln 1`, `exp 0`).

use crate::error::{DpgError, Fallible};
use crate::value::Primitive;

/// The smallest float strictly greater than `x`.
pub fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// The largest float strictly less than `x`.
pub fn next_down(x: f64) -> f64 {
    -next_up(-x)
}

/// The smallest `f32` strictly greater than `x`.
pub fn next_up_f32(x: f32) -> f32 {
    if x.is_nan() || x == f32::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f32::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f32::from_bits(bits + 1)
    } else {
        f32::from_bits(bits - 1)
    }
}

/// Narrow to `f32`, rounding toward +∞.
pub fn f32_up(x: f64) -> f32 {
    let y = x as f32;
    if f64::from(y) < x {
        next_up_f32(y)
    } else {
        y
    }
}

/// `a + b`, rounded up.
pub fn inf_add(a: f64, b: f64) -> f64 {
    let s = a + b;
    if !s.is_finite() {
        return s;
    }
    // TwoSum: err is the exact rounding error of s.
    let bb = s - a;
    let err = (a - (s - bb)) + (b - bb);
    if err > 0.0 {
        next_up(s)
    } else {
        s
    }
}

/// `a + b`, rounded down.
pub fn neg_inf_add(a: f64, b: f64) -> f64 {
    -inf_add(-a, -b)
}

/// `a - b`, rounded up.
pub fn inf_sub(a: f64, b: f64) -> f64 {
    inf_add(a, -b)
}

/// `a * b`, rounded up.
pub fn inf_mul(a: f64, b: f64) -> f64 {
    let p = a * b;
    if !p.is_finite() {
        return p;
    }
    if a.mul_add(b, -p) > 0.0 {
        next_up(p)
    } else {
        p
    }
}

/// `a * b`, rounded down.
pub fn neg_inf_mul(a: f64, b: f64) -> f64 {
    -inf_mul(-a, b)
}

/// `a / b`, rounded up.
pub fn inf_div(a: f64, b: f64) -> f64 {
    let q = a / b;
    if !q.is_finite() {
        return q;
    }
    // r = a - q*b exactly; the true quotient exceeds q when r/b > 0.
    let r = (-q).mul_add(b, a);
    if (r > 0.0 && b > 0.0) || (r < 0.0 && b < 0.0) {
        next_up(q)
    } else {
        q
    }
}

/// `a / b`, rounded down.
pub fn neg_inf_div(a: f64, b: f64) -> f64 {
    -inf_div(-a, b)
}

/// `sqrt(x)`, rounded up.
pub fn inf_sqrt(x: f64) -> f64 {
    let s = x.sqrt();
    if !s.is_finite() || s == 0.0 {
        return s;
    }
    if s.mul_add(s, -x) < 0.0 {
        next_up(s)
    } else {
        s
    }
}

/// `ln(x)`, rounded up.
pub fn inf_ln(x: f64) -> f64 {
    if x == 1.0 {
        return 0.0;
    }
    next_up(x.ln())
}

/// `ln(x)`, rounded down.
pub fn neg_inf_ln(x: f64) -> f64 {
    if x == 1.0 {
        return 0.0;
    }
    next_down(x.ln())
}

/// `ln(1 + x)`, rounded up.
pub fn inf_ln_1p(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    next_up(x.ln_1p())
}

/// `exp(x)`, rounded up.
pub fn inf_exp(x: f64) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    next_up(x.exp())
}

/// `exp(x) - 1`, rounded up.
pub fn inf_exp_m1(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    next_up(x.exp_m1())
}

/// Reject NaN and negative budgets before they enter a relation.
pub fn check_nonnegative(name: &str, x: f64) -> Fallible<f64> {
    if x.is_nan() || x < 0.0 {
        return Err(DpgError::InvalidArgument(format!(
            "{name} must be non-negative, found {x}"
        )));
    }
    Ok(x)
}

/// Numeric primitives usable as distances and data.
///
/// Every bound-computing operation rounds toward +∞ for floats and fails
/// with `Overflow` for integers instead of wrapping.
pub trait Number: Primitive + Copy {
    /// Additive identity.
    fn zero() -> Self;

    /// Convert a dataset distance, rounding up when inexact.
    fn from_u32_up(v: u32) -> Fallible<Self>;

    /// Widen to `f64`, rounding up when inexact.
    fn to_f64_up(self) -> f64;

    /// Convert from `f64`, rounding to nearest. `None` when out of range.
    fn from_f64_nearest(v: f64) -> Option<Self>;

    /// `self + other`, rounded up.
    fn inf_add(self, other: Self) -> Fallible<Self>;

    /// `self - other`, rounded up.
    fn inf_sub(self, other: Self) -> Fallible<Self>;

    /// `self * other`, rounded up.
    fn inf_mul(self, other: Self) -> Fallible<Self>;

    /// `self / other`, rounded up.
    fn inf_div(self, other: Self) -> Fallible<Self>;

    /// Absolute value.
    fn inf_abs(self) -> Fallible<Self>;

    /// Addition that saturates at the type's bounds (plain addition for floats).
    fn saturating_add(self, other: Self) -> Self;

    /// Whether this is a floating-point NaN.
    fn is_nan(self) -> bool;
}

fn overflow<T: std::fmt::Display>(op: &str, a: T, b: T) -> DpgError {
    DpgError::Overflow(format!("{a} {op} {b}"))
}

macro_rules! impl_int_number {
    ($($ty:ty),*) => {$(
        impl Number for $ty {
            fn zero() -> Self {
                0
            }

            fn from_u32_up(v: u32) -> Fallible<Self> {
                <$ty>::try_from(v).map_err(|_| {
                    DpgError::Overflow(format!("{v} does not fit in {}", stringify!($ty)))
                })
            }

            #[allow(clippy::cast_precision_loss, clippy::unnecessary_cast)]
            fn to_f64_up(self) -> f64 {
                let f = self as f64;
                if (f as i128) < (self as i128) {
                    next_up(f)
                } else {
                    f
                }
            }

            #[allow(clippy::cast_possible_truncation, clippy::unnecessary_cast)]
            fn from_f64_nearest(v: f64) -> Option<Self> {
                let r = v.round();
                if r.is_nan() || r < <$ty>::MIN as f64 || r > <$ty>::MAX as f64 {
                    return None;
                }
                Some(r as $ty)
            }

            fn inf_add(self, other: Self) -> Fallible<Self> {
                self.checked_add(other).ok_or_else(|| overflow("+", self, other))
            }

            fn inf_sub(self, other: Self) -> Fallible<Self> {
                self.checked_sub(other).ok_or_else(|| overflow("-", self, other))
            }

            fn inf_mul(self, other: Self) -> Fallible<Self> {
                self.checked_mul(other).ok_or_else(|| overflow("*", self, other))
            }

            #[allow(unused_comparisons)]
            fn inf_div(self, other: Self) -> Fallible<Self> {
                let q = self.checked_div(other).ok_or_else(|| overflow("/", self, other))?;
                let r = self.checked_rem(other).ok_or_else(|| overflow("%", self, other))?;
                // round the quotient up when the exact result is positive
                if r != 0 && ((self < 0) == (other < 0)) {
                    q.checked_add(1).ok_or_else(|| overflow("/", self, other))
                } else {
                    Ok(q)
                }
            }

            #[allow(unused_comparisons)]
            fn inf_abs(self) -> Fallible<Self> {
                if self >= 0 {
                    Ok(self)
                } else {
                    (0 as $ty).checked_sub(self).ok_or_else(|| {
                        DpgError::Overflow(format!("|{self}|"))
                    })
                }
            }

            fn saturating_add(self, other: Self) -> Self {
                <$ty>::saturating_add(self, other)
            }

            fn is_nan(self) -> bool {
                false
            }
        }
    )*};
}

impl_int_number!(i32, i64, u32, u64, usize);

impl Number for f64 {
    fn zero() -> Self {
        0.0
    }

    fn from_u32_up(v: u32) -> Fallible<Self> {
        Ok(f64::from(v))
    }

    fn to_f64_up(self) -> f64 {
        self
    }

    fn from_f64_nearest(v: f64) -> Option<Self> {
        Some(v)
    }

    fn inf_add(self, other: Self) -> Fallible<Self> {
        Ok(inf_add(self, other))
    }

    fn inf_sub(self, other: Self) -> Fallible<Self> {
        Ok(inf_sub(self, other))
    }

    fn inf_mul(self, other: Self) -> Fallible<Self> {
        Ok(inf_mul(self, other))
    }

    fn inf_div(self, other: Self) -> Fallible<Self> {
        Ok(inf_div(self, other))
    }

    fn inf_abs(self) -> Fallible<Self> {
        Ok(self.abs())
    }

    fn saturating_add(self, other: Self) -> Self {
        self + other
    }

    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
}

impl Number for f32 {
    fn zero() -> Self {
        0.0
    }

    fn from_u32_up(v: u32) -> Fallible<Self> {
        Ok(f32_up(f64::from(v)))
    }

    fn to_f64_up(self) -> f64 {
        f64::from(self)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64_nearest(v: f64) -> Option<Self> {
        Some(v as f32)
    }

    // f32 operands are exact in f64; round the f64 upper bound up once more
    // when narrowing.
    fn inf_add(self, other: Self) -> Fallible<Self> {
        Ok(f32_up(inf_add(f64::from(self), f64::from(other))))
    }

    fn inf_sub(self, other: Self) -> Fallible<Self> {
        Ok(f32_up(inf_sub(f64::from(self), f64::from(other))))
    }

    fn inf_mul(self, other: Self) -> Fallible<Self> {
        Ok(f32_up(inf_mul(f64::from(self), f64::from(other))))
    }

    fn inf_div(self, other: Self) -> Fallible<Self> {
        Ok(f32_up(inf_div(f64::from(self), f64::from(other))))
    }

    fn inf_abs(self) -> Fallible<Self> {
        Ok(self.abs())
    }

    fn saturating_add(self, other: Self) -> Self {
        self + other
    }

    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_up_down() {
        assert!(next_up(1.0) > 1.0);
        assert!(next_down(1.0) < 1.0);
        assert_eq!(next_up(0.0), f64::from_bits(1));
        assert_eq!(next_up(-f64::from_bits(1)), -0.0);
        assert_eq!(next_up(f64::INFINITY), f64::INFINITY);
        assert_eq!(next_up(f64::MAX), f64::INFINITY);
        assert!(next_up(f64::NAN).is_nan());
    }

    #[test]
    fn test_exact_results_not_bumped() {
        assert_eq!(inf_div(100.0, 10.0), 10.0);
        assert_eq!(inf_mul(3.0, 0.5), 1.5);
        assert_eq!(inf_add(1.0, 2.0), 3.0);
        assert_eq!(inf_sqrt(4.0), 2.0);
        assert_eq!(inf_ln(1.0), 0.0);
        assert_eq!(inf_exp(0.0), 1.0);
    }

    #[test]
    fn test_inexact_results_rounded_up() {
        let s = inf_add(0.1, 0.2);
        assert!(s >= 0.1 + 0.2);
        let q = inf_div(1.0, 3.0);
        assert!(q > 1.0 / 3.0);
        assert!(q * 3.0 >= 1.0);
        let d = neg_inf_div(1.0, 3.0);
        assert!(d <= 1.0 / 3.0);
        assert!(inf_sqrt(2.0) * inf_sqrt(2.0) >= 2.0);
    }

    #[test]
    fn test_int_number_ops() {
        assert_eq!(7i32.inf_div(2).unwrap(), 4);
        assert_eq!(6i32.inf_div(2).unwrap(), 3);
        assert_eq!((-7i32).inf_div(2).unwrap(), -3);
        assert!(i32::MAX.inf_add(1).is_err());
        assert!(i32::MIN.inf_abs().is_err());
        assert_eq!((-5i64).inf_abs().unwrap(), 5);
        assert_eq!(u32::MAX.saturating_add(1), u32::MAX);
        assert_eq!(<i32 as Number>::from_f64_nearest(2.6), Some(3));
        assert_eq!(<i32 as Number>::from_f64_nearest(1e12), None);
        assert!(<u32 as Number>::from_u32_up(7).is_ok());
        assert!(<i32 as Number>::from_u32_up(u32::MAX).is_err());
    }

    #[test]
    fn test_int_to_f64_up() {
        let big = (1i64 << 53) + 1;
        assert!(big.to_f64_up() >= big as f64);
        assert!(big.to_f64_up() as i128 >= i128::from(big));
    }

    #[test]
    fn test_f32_narrowing_up() {
        let x = 0.1f64;
        assert!(f64::from(f32_up(x)) >= x);
        assert_eq!(f32_up(0.5), 0.5);
        assert!(f64::from(1.0f32.inf_div(3.0).unwrap()) >= 1.0 / 3.0);
    }

    #[test]
    fn test_check_nonnegative() {
        assert!(check_nonnegative("scale", 1.0).is_ok());
        assert!(check_nonnegative("scale", -1.0).is_err());
        assert!(check_nonnegative("scale", f64::NAN).is_err());
    }
}
