/// Tolerance comparisons for floating point values.
pub trait FloatExt: Sized {
    /// `|self - other| < crate::EPSILON`.
    fn approximately_eq(self, other: Self) -> bool;

    /// `|self - other| <= tolerance`. NaN never compares equal.
    fn within(self, other: Self, tolerance: Self) -> bool;
}

impl FloatExt for f32 {
    fn approximately_eq(self, other: Self) -> bool {
        (self - other).abs() < crate::EPSILON as f32
    }

    fn within(self, other: Self, tolerance: Self) -> bool {
        (self - other).abs() <= tolerance
    }
}

impl FloatExt for f64 {
    fn approximately_eq(self, other: Self) -> bool {
        (self - other).abs() < crate::EPSILON
    }

    fn within(self, other: Self, tolerance: Self) -> bool {
        (self - other).abs() <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_approximately_eq() {
        assert!(1.0_f64.approximately_eq(1.0));
        assert!((0.1_f64 + 0.2_f64).approximately_eq(0.3));
        assert!(!1.0_f64.approximately_eq(1.0001));
    }

    #[test]
    fn nan_is_never_equal() {
        assert!(!f64::NAN.approximately_eq(f64::NAN));
        assert!(!f64::NAN.within(0.0, 1.0));
        assert!(!f32::NAN.approximately_eq(0.0));
    }

    #[test]
    fn within_is_inclusive() {
        assert!(1.0_f64.within(1.5, 0.5));
        assert!(!1.0_f64.within(1.5001, 0.5));
        assert!((-2.0_f32).within(-2.25, 0.25));
    }
}
