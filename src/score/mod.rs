//! Score calculator: prices and ranking scores for bids.
//!
//! ## Overview
//!
//! Pure, deterministic integer math. No function here touches engine
//! state; the engine calls them on every bid placement and update.
//!
//! | Quantity | Formula |
//! |----------|---------|
//! | daily credit price | `daily_return * (10000 - discount) / (cluster_size * 10000)` |
//! | bid price | `days * daily_credit_price` |
//! | auction score | `daily_credit_price * 1.0001^days * reputation / 1e18` |
//! | average score | floor mean |
//!
//! All divisions floor. Multiplications and additions are checked.
//!
//! ## Example
//!
//! ```
//! use dv_auction::score::{bid_price, daily_credit_price};
//!
//! let daily = daily_credit_price(1_000_000_000_000_000, 0, 4).unwrap();
//! assert_eq!(daily, 250_000_000_000_000);
//! assert_eq!(bid_price(30, daily).unwrap(), 7_500_000_000_000_000);
//! ```

pub mod fixed;

use primitive_types::U256;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::{Address, ClusterId, Wei};

/// Ranking key used by every auction tree.
pub type Score = u128;

/// Denominator of discount rates (basis points).
pub const BASIS_POINTS: u16 = 10_000;

/// Domain tag mixed into every cluster id.
pub const CLUSTER_ID_DOMAIN: &[u8] = b"DV_AUCTION_CLUSTER_ID_V1";

/// Arithmetic failures of the score calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("discount rate {0} exceeds 10000 basis points")]
    DiscountOutOfRange(u16),

    #[error("cannot average an empty score set")]
    EmptyScores,
}

/// Price of one validation credit for one operator of a cluster.
pub fn daily_credit_price(
    daily_return: Wei,
    discount_rate: u16,
    cluster_size: usize,
) -> Result<Wei, ScoreError> {
    if discount_rate > BASIS_POINTS {
        return Err(ScoreError::DiscountOutOfRange(discount_rate));
    }

    let kept = Wei::from(BASIS_POINTS - discount_rate);
    let numerator = daily_return
        .checked_mul(kept)
        .ok_or(ScoreError::Overflow("daily_credit_price"))?;
    let denominator = (cluster_size as Wei)
        .checked_mul(Wei::from(BASIS_POINTS))
        .ok_or(ScoreError::Overflow("daily_credit_price"))?;

    if denominator == 0 {
        return Err(ScoreError::DivisionByZero("daily_credit_price"));
    }

    Ok(numerator / denominator)
}

/// Total price of a bid: one credit per day.
pub fn bid_price(duration_days: u32, daily_price: Wei) -> Result<Wei, ScoreError> {
    daily_price
        .checked_mul(Wei::from(duration_days))
        .ok_or(ScoreError::Overflow("bid_price"))
}

/// Ranking score of a bid.
///
/// Longer commitments are rewarded by `1.0001^days` (see [`fixed::rpow`]),
/// and the operator's reputation multiplies the result.
pub fn auction_score(
    daily_price: Wei,
    duration_days: u32,
    reputation: u32,
) -> Result<Score, ScoreError> {
    let weight = fixed::duration_weight(duration_days)?;

    let scaled = U256::from(daily_price)
        .checked_mul(weight)
        .and_then(|v| v.checked_mul(U256::from(reputation)))
        .ok_or(ScoreError::Overflow("auction_score"))?;
    let score = scaled / fixed::wad();

    if score > U256::from(Score::MAX) {
        return Err(ScoreError::Overflow("auction_score"));
    }
    Ok(score.low_u128())
}

/// Floor mean of a non-empty score set.
pub fn average_score(scores: &[Score]) -> Result<Score, ScoreError> {
    if scores.is_empty() {
        return Err(ScoreError::EmptyScores);
    }

    let mut sum: Score = 0;
    for score in scores {
        sum = sum
            .checked_add(*score)
            .ok_or(ScoreError::Overflow("average_score"))?;
    }

    Ok(sum / scores.len() as Score)
}

/// Cluster id: SHA-256 over a domain tag, the timestamp, the member
/// addresses in seat order, the average score and an engine nonce.
///
/// The nonce is strictly increasing per engine, so two clusters formed
/// from the same members at the same score and time still get distinct ids.
pub fn derive_cluster_id(
    timestamp: u64,
    members: &[Address],
    average_score: Score,
    nonce: u64,
) -> ClusterId {
    let mut hasher = Sha256::new();
    hasher.update(CLUSTER_ID_DOMAIN);
    hasher.update(timestamp.to_be_bytes());
    for member in members {
        hasher.update(member.as_bytes());
    }
    hasher.update(average_score.to_be_bytes());
    hasher.update(nonce.to_be_bytes());

    let mut id = [0u8; 32];
    id.copy_from_slice(&hasher.finalize());
    ClusterId(id)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY_RETURN: Wei = 1_000_000_000_000_000;

    #[test]
    fn test_daily_credit_price_scenario() {
        let daily = daily_credit_price(DAILY_RETURN, 0, 4).unwrap();
        assert_eq!(daily, 250_000_000_000_000);
        assert_eq!(bid_price(30, daily).unwrap(), 7_500_000_000_000_000);
    }

    #[test]
    fn test_daily_credit_price_zero_discount_is_floor_division() {
        for size in [4usize, 7] {
            for ret in [0u128, 1, 6, 999, DAILY_RETURN, 1_234_567_891_011] {
                assert_eq!(
                    daily_credit_price(ret, 0, size).unwrap(),
                    ret / size as u128
                );
            }
        }
    }

    #[test]
    fn test_daily_credit_price_with_discount() {
        // 10% discount on a size-7 cluster
        let daily = daily_credit_price(DAILY_RETURN, 1_000, 7).unwrap();
        assert_eq!(daily, DAILY_RETURN * 9_000 / 70_000);

        // Full discount prices to zero
        assert_eq!(daily_credit_price(DAILY_RETURN, 10_000, 4).unwrap(), 0);
    }

    #[test]
    fn test_daily_credit_price_errors() {
        assert_eq!(
            daily_credit_price(DAILY_RETURN, 10_001, 4),
            Err(ScoreError::DiscountOutOfRange(10_001))
        );
        assert_eq!(
            daily_credit_price(DAILY_RETURN, 0, 0),
            Err(ScoreError::DivisionByZero("daily_credit_price"))
        );
        assert_eq!(
            daily_credit_price(u128::MAX, 0, 4),
            Err(ScoreError::Overflow("daily_credit_price"))
        );
    }

    #[test]
    fn test_bid_price_overflow() {
        assert_eq!(
            bid_price(2, u128::MAX),
            Err(ScoreError::Overflow("bid_price"))
        );
    }

    #[test]
    fn test_auction_score_zero_days() {
        // 1.0001^0 == 1, reputation 1: the score is the daily price
        assert_eq!(auction_score(250_000_000_000_000, 0, 1).unwrap(), 250_000_000_000_000);
    }

    #[test]
    fn test_auction_score_one_day() {
        // 2.5e14 * 1.0001 = 250_025_000_000_000
        assert_eq!(auction_score(250_000_000_000_000, 1, 1).unwrap(), 250_025_000_000_000);
    }

    #[test]
    fn test_auction_score_increases_with_duration() {
        let daily = daily_credit_price(DAILY_RETURN, 0, 4).unwrap();
        let mut prev = auction_score(daily, 30, 1).unwrap();
        for days in 31..=720 {
            let score = auction_score(daily, days, 1).unwrap();
            assert!(score > prev, "score must grow at {} days", days);
            prev = score;
        }
    }

    #[test]
    fn test_auction_score_increases_with_reputation() {
        let daily = daily_credit_price(DAILY_RETURN, 500, 7).unwrap();
        let mut prev = auction_score(daily, 60, 1).unwrap();
        for reputation in 2..=50 {
            let score = auction_score(daily, 60, reputation).unwrap();
            assert!(score > prev);
            prev = score;
        }
    }

    #[test]
    fn test_auction_score_overflow() {
        assert_eq!(
            auction_score(u128::MAX, 365, u32::MAX),
            Err(ScoreError::Overflow("auction_score"))
        );
    }

    #[test]
    fn test_average_score() {
        assert_eq!(average_score(&[42]).unwrap(), 42);
        assert_eq!(average_score(&[10, 20, 30, 40]).unwrap(), 25);
        // Floor, not rounded: 7 / 2 = 3
        assert_eq!(average_score(&[3, 4]).unwrap(), 3);
        assert_eq!(average_score(&[]), Err(ScoreError::EmptyScores));
        assert_eq!(
            average_score(&[u128::MAX, 1]),
            Err(ScoreError::Overflow("average_score"))
        );
    }

    #[test]
    fn test_derive_cluster_id_deterministic() {
        let members = [Address::from_low_u64(1), Address::from_low_u64(2)];
        let a = derive_cluster_id(1_700_000_000, &members, 25, 0);
        let b = derive_cluster_id(1_700_000_000, &members, 25, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_cluster_id_nonce_separates_identical_triples() {
        let members = [Address::from_low_u64(1), Address::from_low_u64(2)];
        let a = derive_cluster_id(1_700_000_000, &members, 25, 0);
        let b = derive_cluster_id(1_700_000_000, &members, 25, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_cluster_id_depends_on_member_order() {
        let ab = [Address::from_low_u64(1), Address::from_low_u64(2)];
        let ba = [Address::from_low_u64(2), Address::from_low_u64(1)];
        assert_ne!(
            derive_cluster_id(0, &ab, 25, 0),
            derive_cluster_id(0, &ba, 25, 0)
        );
    }
}
