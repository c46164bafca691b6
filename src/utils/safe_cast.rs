//! Checked numeric conversions for pixel sizes and coordinates

use crate::{Error, Result};

/// Round a non-negative float to the nearest `u32`
///
/// # Errors
///
/// Returns an error if the value is not finite, negative, or exceeds `u32::MAX`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Bounds checked first
pub fn round_to_u32(value: f64) -> Result<u32> {
    let rounded = value.round();
    if rounded.is_finite() && rounded >= 0.0 && rounded <= f64::from(u32::MAX) {
        Ok(rounded as u32)
    } else {
        Err(Error::InvalidInput(format!("Value {value} cannot be rounded into a pixel size")))
    }
}

/// Safely convert u32 to i32 with overflow checking
///
/// # Errors
///
/// Returns an error if the value exceeds `i32::MAX`
pub fn u32_to_i32(value: u32) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} too large to fit in i32")))
}

/// Clamp and convert f64 to i32 for pixel coordinates
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f64_to_i32_clamp(value: f64, min: i32, max: i32) -> i32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    let clamped = value.clamp(f64::from(min), f64::from(max));
    (clamped as i32).clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_to_u32() {
        assert_eq!(round_to_u32(8.4).unwrap(), 8);
        assert_eq!(round_to_u32(8.5).unwrap(), 9);
        assert_eq!(round_to_u32(0.0).unwrap(), 0);

        assert!(round_to_u32(-1.0).is_err());
        assert!(round_to_u32(f64::NAN).is_err());
        assert!(round_to_u32(f64::INFINITY).is_err());
        assert!(round_to_u32(f64::from(u32::MAX) * 2.0).is_err());
    }

    #[test]
    fn test_u32_to_i32() {
        assert_eq!(u32_to_i32(42).unwrap(), 42);
        assert_eq!(u32_to_i32(i32::MAX as u32).unwrap(), i32::MAX);
        assert!(u32_to_i32(i32::MAX as u32 + 1).is_err());
    }

    #[test]
    fn test_f64_to_i32_clamp() {
        assert_eq!(f64_to_i32_clamp(50.7, 0, 100), 50);
        assert_eq!(f64_to_i32_clamp(-10.0, 0, 100), 0);
        assert_eq!(f64_to_i32_clamp(150.0, 0, 100), 100);
        assert_eq!(f64_to_i32_clamp(f64::NAN, 0, 100), 0);
        assert_eq!(f64_to_i32_clamp(5.0, 100, 0), 5);
    }

    proptest! {
        #[test]
        fn prop_round_to_u32_close(value in 0.0f64..1.0e9) {
            let rounded = round_to_u32(value).unwrap();
            prop_assert!((f64::from(rounded) - value).abs() <= 0.5);
        }

        #[test]
        fn prop_clamp_within_bounds(value in any::<f64>(), min in any::<i32>(), max in any::<i32>()) {
            let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
            let result = f64_to_i32_clamp(value, min, max);
            prop_assert!(result >= lo && result <= hi);
        }
    }
}
