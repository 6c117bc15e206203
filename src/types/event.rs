//! Audit log entries.
//!
//! The engine appends exactly one event per state transition and rolls
//! them back together with the state when an operation fails. Field
//! values always mirror the record as it stands after the mutation.

use crate::score::Score;
use crate::types::{Address, AuctionType, BidId, ClusterId, Wei};

/// An externally observable state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuctionEvent {
    BidPlaced {
        node_op: Address,
        bid_id: BidId,
        auction_type: AuctionType,
        discount_rate: u16,
        duration_days: u32,
        bid_price: Wei,
        score: Score,
    },
    BidUpdated {
        node_op: Address,
        bid_id: BidId,
        discount_rate: u16,
        duration_days: u32,
        bid_price: Wei,
        score: Score,
    },
    BidWithdrawn {
        node_op: Address,
        bid_id: BidId,
        refunded: Wei,
    },
    NodeOpJoinedCluster {
        node_op: Address,
        bid_id: BidId,
        cluster_id: ClusterId,
    },
    ClusterCreated {
        cluster_id: ClusterId,
        auction_type: AuctionType,
        average_score: Score,
        vault: Address,
    },
}

impl AuctionEvent {
    /// Short name, used as a log field.
    pub fn name(&self) -> &'static str {
        match self {
            AuctionEvent::BidPlaced { .. } => "BidPlaced",
            AuctionEvent::BidUpdated { .. } => "BidUpdated",
            AuctionEvent::BidWithdrawn { .. } => "BidWithdrawn",
            AuctionEvent::NodeOpJoinedCluster { .. } => "NodeOpJoinedCluster",
            AuctionEvent::ClusterCreated { .. } => "ClusterCreated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name() {
        let ev = AuctionEvent::BidWithdrawn {
            node_op: Address::ZERO,
            bid_id: BidId(1),
            refunded: 10,
        };
        assert_eq!(ev.name(), "BidWithdrawn");
    }
}
