//! SSZ snapshots of registry records.
//!
//! ## SSZ Serialization
//!
//! Snapshots derive `SimpleSerialize` from ssz_rs so that every replica
//! encodes the same record to the same bytes. Enums are flattened to
//! `u8`, addresses to left-padded 32-byte words and absent optionals to
//! all-zero words.
//!
//! The engine hashes these encodings into its state root.

use ssz_rs::prelude::*;

use crate::types::{Bid, Cluster};

/// Fixed-size encoding of a [`Bid`].
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct BidSnapshot {
    pub id: u64,
    pub node_op: [u8; 32],
    pub discount_rate: u16,
    pub duration_days: u32,
    /// 4 or 7
    pub auction_type_raw: u8,
    pub daily_price: u128,
    pub score: u128,
    pub bond: u128,
    pub consumed_credits: u32,
    pub cluster_id: [u8; 32],
    /// 0=Pending, 1=Won, 2=Withdrawn
    pub status_raw: u8,
}

impl From<&Bid> for BidSnapshot {
    fn from(bid: &Bid) -> Self {
        Self {
            id: bid.id.0,
            node_op: bid.node_op.to_word(),
            discount_rate: bid.discount_rate,
            duration_days: bid.duration_days,
            auction_type_raw: bid.auction_type.to_u8(),
            daily_price: bid.daily_price,
            score: bid.score,
            bond: bid.bond,
            consumed_credits: bid.consumed_credits,
            cluster_id: bid.cluster_id.map(|c| c.0).unwrap_or_default(),
            status_raw: bid.status.to_u8(),
        }
    }
}

/// Fixed-size encoding of a [`Cluster`] header.
///
/// Membership is covered by the member bids' `cluster_id` field.
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct ClusterSnapshot {
    pub id: [u8; 32],
    pub size: u8,
    pub average_score: u128,
    pub pubkey_hash: [u8; 32],
    pub split_address: [u8; 32],
    pub vault: [u8; 32],
    /// 0=Inactive, 1=InCreation, 2=Deposited, 3=Exited
    pub status_raw: u8,
}

impl From<&Cluster> for ClusterSnapshot {
    fn from(cluster: &Cluster) -> Self {
        Self {
            id: cluster.id.0,
            size: cluster.size() as u8,
            average_score: cluster.average_score,
            pubkey_hash: cluster.pubkey_hash.unwrap_or_default(),
            split_address: cluster.split_address.map(|a| a.to_word()).unwrap_or_default(),
            vault: cluster.vault.to_word(),
            status_raw: cluster.status.to_u8(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, AuctionType, BidId, BidStatus};

    fn sample_bid() -> Bid {
        Bid {
            id: BidId(5),
            node_op: Address::from_low_u64(42),
            discount_rate: 100,
            duration_days: 45,
            auction_type: AuctionType::Dv7,
            daily_price: 141_428_571_428_571,
            score: 142_000_000_000_000,
            bond: 0,
            consumed_credits: 0,
            cluster_id: None,
            status: BidStatus::Pending,
        }
    }

    #[test]
    fn test_bid_snapshot_fields() {
        let snap = BidSnapshot::from(&sample_bid());
        assert_eq!(snap.id, 5);
        assert_eq!(snap.auction_type_raw, 7);
        assert_eq!(snap.status_raw, 0);
        assert_eq!(snap.cluster_id, [0u8; 32]);
        assert_eq!(&snap.node_op[12..], Address::from_low_u64(42).as_bytes());
    }

    #[test]
    fn test_bid_snapshot_deterministic_serialization() {
        let snap = BidSnapshot::from(&sample_bid());

        let bytes1 = ssz_rs::serialize(&snap).expect("Failed to serialize");
        let bytes2 = ssz_rs::serialize(&snap).expect("Failed to serialize");

        assert_eq!(bytes1, bytes2, "SSZ serialization must be deterministic");
    }

    #[test]
    fn test_bid_snapshot_ssz_size() {
        let snap = BidSnapshot::from(&sample_bid());
        let bytes = ssz_rs::serialize(&snap).expect("Failed to serialize");

        // 8 + 32 + 2 + 4 + 1 + 16 + 16 + 16 + 4 + 32 + 1
        assert_eq!(bytes.len(), 132);
    }

    #[test]
    fn test_bid_snapshot_changes_with_status() {
        let mut bid = sample_bid();
        let pending = ssz_rs::serialize(&BidSnapshot::from(&bid)).expect("Failed to serialize");
        bid.status = BidStatus::Won;
        let won = ssz_rs::serialize(&BidSnapshot::from(&bid)).expect("Failed to serialize");
        assert_ne!(pending, won);
    }
}
