//! Bid records and the enums describing them.
//!
//! ## Ownership
//!
//! A `Bid` lives only in the registry. Trees hold its `BidId` and the
//! score it was inserted with, never a copy of the record.

use crate::score::Score;
use crate::types::{Address, BidId, ClusterId, Wei};

// ============================================================================
// AuctionType enum
// ============================================================================

/// Which sub-auction a bid competes in.
///
/// Represented as u8 on the wire:
/// - Dv4 = 4
/// - Dv7 = 7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuctionType {
    /// Clusters of four node operators
    Dv4,
    /// Clusters of seven node operators
    Dv7,
}

impl AuctionType {
    /// Both sub-auction types, in draw-preview order.
    pub const ALL: [AuctionType; 2] = [AuctionType::Dv4, AuctionType::Dv7];

    /// Number of bids forming a cluster of this type.
    #[inline]
    pub fn cluster_size(self) -> usize {
        match self {
            AuctionType::Dv4 => 4,
            AuctionType::Dv7 => 7,
        }
    }

    /// Convert to u8 for serialization
    pub fn to_u8(self) -> u8 {
        match self {
            AuctionType::Dv4 => 4,
            AuctionType::Dv7 => 7,
        }
    }

    /// Convert from u8 for deserialization
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            4 => Some(AuctionType::Dv4),
            7 => Some(AuctionType::Dv7),
            _ => None,
        }
    }
}

// ============================================================================
// BidStatus enum
// ============================================================================

/// Lifecycle of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BidStatus {
    /// Competing in its sub-auction
    #[default]
    Pending,
    /// Part of a drawn cluster
    Won,
    /// Withdrawn by its owner and refunded; the record stays with its
    /// price, bond and score zeroed
    Withdrawn,
}

impl BidStatus {
    pub fn to_u8(self) -> u8 {
        match self {
            BidStatus::Pending => 0,
            BidStatus::Won => 1,
            BidStatus::Withdrawn => 2,
        }
    }
}

// ============================================================================
// Bid struct
// ============================================================================

/// A node operator's offer to run validation credits for a cluster.
///
/// `daily_price` and `score` are derived by the score calculator at
/// placement and recomputed on every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    pub id: BidId,

    /// Node operator that placed (and pays for) the bid
    pub node_op: Address,

    /// Offered margin reduction, basis points (0..=10000)
    pub discount_rate: u16,

    /// Commitment length in days (= validation credits bought)
    pub duration_days: u32,

    pub auction_type: AuctionType,

    /// Price of one validation credit, in wei
    pub daily_price: Wei,

    /// Ranking key inside the sub-auction tree
    pub score: Score,

    /// Bond held in escrow next to the price (zero for whitelisted operators)
    pub bond: Wei,

    /// Validation credits used so far by the cluster this bid won into
    pub consumed_credits: u32,

    /// Cluster the bid was drawn into, once won
    pub cluster_id: Option<ClusterId>,

    pub status: BidStatus,
}

impl Bid {
    /// Total price escrowed for this bid (`duration_days * daily_price`).
    ///
    /// Placement already checked this product, so saturation never kicks in
    /// for a bid the engine created.
    #[inline]
    pub fn price(&self) -> Wei {
        self.daily_price.saturating_mul(Wei::from(self.duration_days))
    }

    /// Everything the escrow holds on this bid's behalf.
    #[inline]
    pub fn escrowed(&self) -> Wei {
        self.price().saturating_add(self.bond)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == BidStatus::Pending
    }

    /// Credits still available before the bid's duration is exhausted.
    pub fn remaining_credits(&self) -> u32 {
        self.duration_days.saturating_sub(self.consumed_credits)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
