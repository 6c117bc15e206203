//! Ray-domain (10^27) fixed-point helpers.
//!
//! ## Rounding
//!
//! `rmul` rounds half up, `rpow` is exponentiation by squaring built on
//! `rmul`. The sequence of multiplications is fixed, so results are
//! bit-for-bit reproducible:
//!
//! ```text
//! z = n odd ? x : RAY
//! for n /= 2; n != 0; n /= 2:
//!     x = rmul(x, x)
//!     if n odd: z = rmul(z, x)
//! ```
//!
//! Every multiply and add is checked; overflow is an error, never a wrap.

use primitive_types::U256;

use super::ScoreError;

/// 10^27
#[inline]
pub fn ray() -> U256 {
    U256::exp10(27)
}

/// 10^18
#[inline]
pub fn wad() -> U256 {
    U256::exp10(18)
}

/// Ray / wad ratio (10^9)
#[inline]
fn ray_to_wad() -> U256 {
    U256::exp10(9)
}

/// 1.0001 in ray precision: the per-day reward for longer commitments.
pub const DURATION_BASE_RAY: u128 = 1_000_100_000_000_000_000_000_000_000;

/// `x * y / RAY`, rounded half up.
pub fn rmul(x: U256, y: U256) -> Result<U256, ScoreError> {
    let half = ray() / 2;
    let product = x.checked_mul(y).ok_or(ScoreError::Overflow("rmul"))?;
    let rounded = product
        .checked_add(half)
        .ok_or(ScoreError::Overflow("rmul"))?;
    Ok(rounded / ray())
}

/// `x^n` where `x` is ray-scaled; result is ray-scaled.
pub fn rpow(mut x: U256, mut n: u32) -> Result<U256, ScoreError> {
    let mut z = if n % 2 != 0 { x } else { ray() };

    n /= 2;
    while n != 0 {
        x = rmul(x, x)?;
        if n % 2 != 0 {
            z = rmul(z, x)?;
        }
        n /= 2;
    }

    Ok(z)
}

/// `1.0001^days`, wad-scaled (truncated from ray precision).
pub fn duration_weight(days: u32) -> Result<U256, ScoreError> {
    let weight = rpow(U256::from(DURATION_BASE_RAY), days)?;
    Ok(weight / ray_to_wad())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmul_identity() {
        let x = U256::from(DURATION_BASE_RAY);
        assert_eq!(rmul(x, ray()).unwrap(), x);
        assert_eq!(rmul(ray(), ray()).unwrap(), ray());
    }

    #[test]
    fn test_rmul_rounds_half_up() {
        // 0.5e-27 * 1 rounds to 1e-27
        let half_unit = U256::from(1u8);
        let half = ray() / 2;
        assert_eq!(rmul(half_unit, half).unwrap(), U256::from(1u8));
        assert_eq!(rmul(half_unit, half - 1).unwrap(), U256::zero());
    }

    #[test]
    fn test_rpow_small_exponents() {
        let x = U256::from(DURATION_BASE_RAY);
        assert_eq!(rpow(x, 0).unwrap(), ray());
        assert_eq!(rpow(x, 1).unwrap(), x);
        assert_eq!(
            rpow(x, 2).unwrap(),
            U256::from(1_000_200_010_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_rpow_of_one_is_one() {
        for n in [0u32, 1, 7, 365, 10_000] {
            assert_eq!(rpow(ray(), n).unwrap(), ray());
        }
    }

    #[test]
    fn test_duration_weight_values() {
        assert_eq!(duration_weight(0).unwrap(), wad());
        assert_eq!(
            duration_weight(1).unwrap(),
            U256::from(1_000_100_000_000_000_000u128)
        );
        assert_eq!(
            duration_weight(2).unwrap(),
            U256::from(1_000_200_010_000_000_000u128)
        );
    }

    #[test]
    fn test_duration_weight_monotonic() {
        let mut prev = duration_weight(0).unwrap();
        for days in 1..=400 {
            let w = duration_weight(days).unwrap();
            assert!(w > prev, "weight must grow at day {}", days);
            prev = w;
        }
    }

    #[test]
    fn test_rpow_overflow_is_error() {
        let huge = U256::MAX / 2;
        assert_eq!(rpow(huge, 2), Err(ScoreError::Overflow("rmul")));
    }
}
