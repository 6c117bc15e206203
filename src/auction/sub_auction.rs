//! Per-size sub-auction.
//!
//! A sub-auction ranks individual bids of one cluster size and remembers
//! the virtual cluster it currently has queued in the main auction. Keeping
//! that virtual cluster in sync is the job of
//! [`AuctionBook::refresh`](crate::auction::AuctionBook::refresh).

use std::collections::HashMap;

use crate::auction::{AuctionError, MainEntry};
use crate::score::Score;
use crate::tree::OrderStatisticTree;
use crate::types::{Address, AuctionType, ClusterId, ClusterMember};

/// The best combination a sub-auction currently has in the main auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualCluster {
    pub id: ClusterId,
    pub average_score: Score,
    /// Seats with the score each bid was ranked at, best first
    pub seats: Vec<(Score, ClusterMember)>,
}

impl VirtualCluster {
    /// Member seats without scores, in seat order.
    pub fn members(&self) -> Vec<ClusterMember> {
        self.seats.iter().map(|(_, m)| *m).collect()
    }
}

/// Ranked pool of individual bids for one cluster size.
#[derive(Debug, Clone)]
pub struct SubAuction {
    auction_type: AuctionType,
    tree: OrderStatisticTree<ClusterMember>,
    /// Pending bids per operator
    operators: HashMap<Address, u32>,
    latest: Option<VirtualCluster>,
}

impl SubAuction {
    pub fn new(auction_type: AuctionType) -> Self {
        Self {
            auction_type,
            tree: OrderStatisticTree::new(),
            operators: HashMap::new(),
            latest: None,
        }
    }

    #[inline]
    pub fn auction_type(&self) -> AuctionType {
        self.auction_type
    }

    /// Bids needed to form a cluster.
    #[inline]
    pub fn cluster_size(&self) -> usize {
        self.auction_type.cluster_size()
    }

    /// Pending bids in this sub-auction.
    #[inline]
    pub fn bid_count(&self) -> usize {
        self.tree.count()
    }

    /// Distinct operators with at least one pending bid here.
    #[inline]
    pub fn num_operators(&self) -> usize {
        self.operators.len()
    }

    /// The virtual cluster currently queued in the main auction.
    #[inline]
    pub fn latest(&self) -> Option<&VirtualCluster> {
        self.latest.as_ref()
    }

    #[inline]
    pub fn tree(&self) -> &OrderStatisticTree<ClusterMember> {
        &self.tree
    }

    /// The best `cluster_size()` bids, or `None` while there are fewer.
    pub fn best_seats(&self) -> Option<Vec<(Score, ClusterMember)>> {
        let size = self.cluster_size();
        (self.tree.count() >= size).then(|| self.tree.top(size))
    }

    /// Queue a bid behind every bid already holding `score`.
    pub fn insert_bid(&mut self, score: Score, member: ClusterMember) -> Result<(), AuctionError> {
        self.tree.insert(score, member)?;
        self.join(member.node_op);
        Ok(())
    }

    /// Put a bid back at the queue position it held under `score`.
    pub fn restore_bid(
        &mut self,
        score: Score,
        member: ClusterMember,
        position: usize,
    ) -> Result<(), AuctionError> {
        self.tree.insert_at(score, member, position)?;
        self.join(member.node_op);
        Ok(())
    }

    /// Drop a bid; returns the queue position it held under `score`.
    pub fn remove_bid(&mut self, score: Score, member: ClusterMember) -> Result<usize, AuctionError> {
        let position = self.tree.remove(score, member)?;
        self.leave(member.node_op);
        Ok(position)
    }

    /// Swap the tracked virtual cluster, returning the previous one.
    pub(crate) fn replace_latest(&mut self, latest: Option<VirtualCluster>) -> Option<VirtualCluster> {
        std::mem::replace(&mut self.latest, latest)
    }

    /// Main-auction entry of a virtual cluster of this size.
    #[inline]
    pub(crate) fn entry_for(&self, id: ClusterId) -> MainEntry {
        MainEntry::virtual_cluster(id, self.auction_type)
    }

    fn join(&mut self, node_op: Address) {
        *self.operators.entry(node_op).or_insert(0) += 1;
    }

    fn leave(&mut self, node_op: Address) {
        if let Some(count) = self.operators.get_mut(&node_op) {
            *count -= 1;
            if *count == 0 {
                self.operators.remove(&node_op);
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BidId;

    fn member(n: u64) -> ClusterMember {
        ClusterMember {
            bid_id: BidId(n),
            node_op: Address::from_low_u64(n),
        }
    }

    #[test]
    fn test_sub_auction_best_seats_needs_cluster_size() {
        let mut sub = SubAuction::new(AuctionType::Dv4);
        for n in 1..=3 {
            sub.insert_bid(n as Score * 10, member(n)).unwrap();
        }
        assert!(sub.best_seats().is_none());

        sub.insert_bid(5, member(4)).unwrap();
        let seats = sub.best_seats().unwrap();
        assert_eq!(seats.len(), 4);
        assert_eq!(seats[0], (30, member(3)));
        assert_eq!(seats[3], (5, member(4)));
    }

    #[test]
    fn test_sub_auction_operator_count() {
        let mut sub = SubAuction::new(AuctionType::Dv7);
        let op = Address::from_low_u64(1);
        let a = ClusterMember { bid_id: BidId(1), node_op: op };
        let b = ClusterMember { bid_id: BidId(2), node_op: op };

        sub.insert_bid(10, a).unwrap();
        sub.insert_bid(20, b).unwrap();
        sub.insert_bid(30, member(3)).unwrap();
        assert_eq!(sub.num_operators(), 2);

        sub.remove_bid(10, a).unwrap();
        assert_eq!(sub.num_operators(), 2);
        sub.remove_bid(20, b).unwrap();
        assert_eq!(sub.num_operators(), 1);
    }

    #[test]
    fn test_sub_auction_restore_bid_keeps_queue_position() {
        let mut sub = SubAuction::new(AuctionType::Dv4);
        for n in 1..=3 {
            sub.insert_bid(10, member(n)).unwrap();
        }

        let position = sub.remove_bid(10, member(2)).unwrap();
        assert_eq!(position, 1);
        assert_eq!(sub.num_operators(), 2);

        sub.restore_bid(10, member(2), position).unwrap();
        assert_eq!(sub.tree().top(3), vec![(10, member(1)), (10, member(2)), (10, member(3))]);
        assert_eq!(sub.num_operators(), 3);
    }
}
