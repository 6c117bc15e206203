//! Cluster records produced by a main-auction draw.

use crate::score::Score;
use crate::types::{Address, AuctionType, BidId, ClusterId};

/// Activation state of a drawn cluster.
///
/// ```text
/// InCreation --> Deposited --> Exited
///     |  ^
///     v  | (draw)
///   Inactive
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClusterStatus {
    /// Waiting in the main auction to be drawn (again)
    #[default]
    Inactive,
    /// Drawn by a vault, validator not yet funded
    InCreation,
    /// Validator deposit made
    Deposited,
    /// Validator exited; terminal
    Exited,
}

impl ClusterStatus {
    pub fn to_u8(self) -> u8 {
        match self {
            ClusterStatus::Inactive => 0,
            ClusterStatus::InCreation => 1,
            ClusterStatus::Deposited => 2,
            ClusterStatus::Exited => 3,
        }
    }

    /// Whether a collaborator may move a cluster from `self` to `next`.
    ///
    /// `Inactive -> InCreation` only happens through a draw, so it is not
    /// accepted here.
    pub fn can_transition_to(self, next: ClusterStatus) -> bool {
        matches!(
            (self, next),
            (ClusterStatus::InCreation, ClusterStatus::Deposited)
                | (ClusterStatus::InCreation, ClusterStatus::Inactive)
                | (ClusterStatus::Deposited, ClusterStatus::Exited)
        )
    }
}

/// One seat in a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterMember {
    pub bid_id: BidId,
    pub node_op: Address,
}

/// A distributed validator cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: ClusterId,

    /// Exactly N members, best score first
    pub members: Vec<ClusterMember>,

    /// Floor mean of the member scores; the main-auction key
    pub average_score: Score,

    /// `sha256(pubkey || 0u128)` once the vault has registered a validator key
    pub pubkey_hash: Option<[u8; 32]>,

    /// Revenue split contract, set by the owning vault
    pub split_address: Option<Address>,

    /// Vault that drew the cluster last
    pub vault: Address,

    pub status: ClusterStatus,
}

impl Cluster {
    #[inline]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Sub-auction the cluster was formed in, from its size.
    pub fn auction_type(&self) -> Option<AuctionType> {
        u8::try_from(self.size()).ok().and_then(AuctionType::from_u8)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use ClusterStatus::*;

        assert!(InCreation.can_transition_to(Deposited));
        assert!(InCreation.can_transition_to(Inactive));
        assert!(Deposited.can_transition_to(Exited));

        assert!(!Inactive.can_transition_to(InCreation));
        assert!(!Inactive.can_transition_to(Deposited));
        assert!(!Deposited.can_transition_to(InCreation));
        assert!(!Exited.can_transition_to(Inactive));
        assert!(!Exited.can_transition_to(Exited));
    }

    #[test]
    fn test_cluster_size_without_known_type() {
        let cluster = Cluster {
            id: ClusterId([1; 32]),
            members: vec![ClusterMember {
                bid_id: BidId(1),
                node_op: Address::from_low_u64(9),
            }],
            average_score: 10,
            pubkey_hash: None,
            split_address: None,
            vault: Address::from_low_u64(100),
            status: ClusterStatus::InCreation,
        };

        assert_eq!(cluster.size(), 1);
        assert_eq!(cluster.auction_type(), None);
    }
}
