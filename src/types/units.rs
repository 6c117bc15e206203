//! Wei/ether amount utilities.
//!
//! ## Overview
//!
//! Every amount inside the engine is an integer number of wei (`u128`).
//! Ether strings only appear at the edges (configuration, demo output),
//! and the conversion goes through `rust_decimal` so that no floating
//! point is ever involved.
//!
//! ## Examples
//!
//! ```
//! use dv_auction::types::units::{ether_to_wei, wei_to_ether};
//!
//! let wei = ether_to_wei("0.001").unwrap();
//! assert_eq!(wei, 1_000_000_000_000_000);
//! assert_eq!(wei_to_ether(wei).unwrap(), "0.001");
//! ```

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Amount in wei.
pub type Wei = u128;

/// 10^18 wei per ether.
pub const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

/// Decimal places of an ether amount.
const ETHER_DECIMALS: u32 = 18;

/// Parse a decimal ether string into wei.
///
/// Returns `None` for negative, malformed or out-of-range input.
/// Sub-wei fractions are rounded to the nearest wei.
pub fn ether_to_wei(s: &str) -> Option<Wei> {
    let decimal = Decimal::from_str(s).ok()?;
    decimal_to_wei(decimal)
}

/// Convert an ether `Decimal` into wei.
pub fn decimal_to_wei(d: Decimal) -> Option<Wei> {
    if d.is_sign_negative() {
        return None;
    }

    let scaled = d.checked_mul(Decimal::from(WEI_PER_ETHER))?;
    scaled.round_dp(0).to_u128()
}

/// Convert wei into an ether `Decimal`.
///
/// `None` if the amount exceeds the 96-bit mantissa of `Decimal`.
pub fn wei_to_decimal(wei: Wei) -> Option<Decimal> {
    let signed = i128::try_from(wei).ok()?;
    Decimal::try_from_i128_with_scale(signed, ETHER_DECIMALS).ok()
}

/// Human-readable ether amount with trailing zeros trimmed.
///
/// ```
/// use dv_auction::types::units::wei_to_ether;
///
/// assert_eq!(wei_to_ether(1_500_000_000_000_000_000).unwrap(), "1.5");
/// assert_eq!(wei_to_ether(0).unwrap(), "0");
/// ```
pub fn wei_to_ether(wei: Wei) -> Option<String> {
    wei_to_decimal(wei).map(|d| d.normalize().to_string())
}

// ============================================================================
// Unit Tests
// ============================================================================
