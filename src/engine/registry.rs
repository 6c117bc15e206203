//! Authoritative records: bids, clusters, operator profiles, vaults.
//!
//! ## Storage
//!
//! - **Slab**: bid records, O(1) insert/remove
//! - **HashMap**: `BidId` to slab key
//! - **HashMap**: clusters by id (never removed)
//! - **HashMap**: operator profiles, created on first use and dropped again
//!   once they carry nothing but defaults
//!
//! Bid ids are assigned sequentially from 1. Withdrawn bids keep their
//! record, so an id is never handed out twice except when the call that
//! took it is rolled back.
//!
//! ## Journal
//!
//! Every mutable access records a before image:
//!
//! ```text
//! insert_bid                      -> BidInserted(id)
//! bid_mut                         -> Bid(record before)
//! insert_cluster / cluster_mut    -> Cluster(id, record before)
//! profile_mut / prune_profile     -> Profile(address, record before)
//! register_vault (new vault only) -> Vault(address)
//! ```
//!
//! [`commit`](Registry::commit) forgets the journal and
//! [`rollback`](Registry::rollback) restores the images newest first, so
//! undoing a call touches only what the call touched.

use std::collections::{HashMap, HashSet};

use slab::Slab;

use crate::types::{Address, Bid, BidId, Cluster, ClusterId, NodeOperatorProfile};

/// Before image of one mutable access.
#[derive(Debug, Clone)]
enum Undo {
    BidInserted(BidId),
    Bid(Bid),
    Cluster(ClusterId, Option<Cluster>),
    Profile(Address, Option<NodeOperatorProfile>),
    Vault(Address),
}

#[derive(Debug, Clone)]
pub struct Registry {
    bids: Slab<Bid>,
    bid_index: HashMap<BidId, usize>,
    next_bid_id: u64,

    clusters: HashMap<ClusterId, Cluster>,
    profiles: HashMap<Address, NodeOperatorProfile>,
    vaults: HashSet<Address>,

    default_reputation: u32,
    journal: Vec<Undo>,
}

impl Registry {
    pub fn new(default_reputation: u32) -> Self {
        Self {
            bids: Slab::new(),
            bid_index: HashMap::new(),
            next_bid_id: 1,
            clusters: HashMap::new(),
            profiles: HashMap::new(),
            vaults: HashSet::new(),
            default_reputation,
            journal: Vec::new(),
        }
    }

    // ========================================================================
    // Bids
    // ========================================================================

    /// Store a bid under the next id; the `id` field is overwritten.
    pub fn insert_bid(&mut self, mut bid: Bid) -> BidId {
        let id = BidId(self.next_bid_id);
        self.next_bid_id += 1;

        bid.id = id;
        let key = self.bids.insert(bid);
        self.bid_index.insert(id, key);
        self.journal.push(Undo::BidInserted(id));
        id
    }

    #[inline]
    pub fn bid(&self, id: BidId) -> Option<&Bid> {
        self.bid_index.get(&id).map(|key| &self.bids[*key])
    }

    #[inline]
    pub fn bid_mut(&mut self, id: BidId) -> Option<&mut Bid> {
        let key = *self.bid_index.get(&id)?;
        let bid = self.bids.get_mut(key)?;
        self.journal.push(Undo::Bid(bid.clone()));
        Some(bid)
    }

    /// Bid records, withdrawn ones included.
    #[inline]
    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    /// All bid records, ordered by id.
    pub fn bids_by_id(&self) -> Vec<&Bid> {
        let mut bids: Vec<&Bid> = self.bids.iter().map(|(_, bid)| bid).collect();
        bids.sort_by_key(|bid| bid.id);
        bids
    }

    // ========================================================================
    // Clusters
    // ========================================================================

    pub fn insert_cluster(&mut self, cluster: Cluster) {
        let id = cluster.id;
        let previous = self.clusters.insert(id, cluster);
        self.journal.push(Undo::Cluster(id, previous));
    }

    #[inline]
    pub fn cluster(&self, id: &ClusterId) -> Option<&Cluster> {
        self.clusters.get(id)
    }

    #[inline]
    pub fn cluster_mut(&mut self, id: &ClusterId) -> Option<&mut Cluster> {
        let cluster = self.clusters.get_mut(id)?;
        self.journal.push(Undo::Cluster(*id, Some(cluster.clone())));
        Some(cluster)
    }

    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// All clusters, ordered by id.
    pub fn clusters_by_id(&self) -> Vec<&Cluster> {
        let mut clusters: Vec<&Cluster> = self.clusters.values().collect();
        clusters.sort_by_key(|cluster| cluster.id);
        clusters
    }

    // ========================================================================
    // Operator profiles
    // ========================================================================

    /// Profile of `address`, or a fresh default one.
    pub fn profile(&self, address: &Address) -> NodeOperatorProfile {
        self.profiles
            .get(address)
            .cloned()
            .unwrap_or_else(|| NodeOperatorProfile::new(*address, self.default_reputation))
    }

    /// Mutable profile, created with defaults if absent.
    pub fn profile_mut(&mut self, address: Address) -> &mut NodeOperatorProfile {
        let reputation = self.default_reputation;
        self.journal
            .push(Undo::Profile(address, self.profiles.get(&address).cloned()));
        self.profiles
            .entry(address)
            .or_insert_with(|| NodeOperatorProfile::new(address, reputation))
    }

    /// Forget a profile that holds nothing but defaults.
    pub fn prune_profile(&mut self, address: &Address) {
        let blank = NodeOperatorProfile::new(*address, self.default_reputation);
        if self.profiles.get(address) == Some(&blank) {
            let removed = self.profiles.remove(address);
            self.journal.push(Undo::Profile(*address, removed));
        }
    }

    #[inline]
    pub fn is_whitelisted(&self, address: &Address) -> bool {
        self.profiles.get(address).map_or(false, |p| p.whitelisted)
    }

    // ========================================================================
    // Vaults
    // ========================================================================

    /// Returns `false` if the vault was already registered.
    pub fn register_vault(&mut self, vault: Address) -> bool {
        let added = self.vaults.insert(vault);
        if added {
            self.journal.push(Undo::Vault(vault));
        }
        added
    }

    #[inline]
    pub fn is_vault(&self, address: &Address) -> bool {
        self.vaults.contains(address)
    }

    // ========================================================================
    // Journal
    // ========================================================================

    /// Keep every change made since the last commit.
    pub fn commit(&mut self) {
        self.journal.clear();
    }

    /// Undo every change made since the last commit, newest first.
    pub fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::BidInserted(id) => {
                    if let Some(key) = self.bid_index.remove(&id) {
                        self.bids.remove(key);
                    }
                    self.next_bid_id = id.0;
                }
                Undo::Bid(before) => {
                    if let Some(key) = self.bid_index.get(&before.id) {
                        self.bids[*key] = before;
                    }
                }
                Undo::Cluster(id, Some(before)) => {
                    self.clusters.insert(id, before);
                }
                Undo::Cluster(id, None) => {
                    self.clusters.remove(&id);
                }
                Undo::Profile(address, Some(before)) => {
                    self.profiles.insert(address, before);
                }
                Undo::Profile(address, None) => {
                    self.profiles.remove(&address);
                }
                Undo::Vault(address) => {
                    self.vaults.remove(&address);
                }
            }
        }
    }

    /// Changes recorded since the last commit or rollback.
    #[inline]
    pub fn uncommitted(&self) -> usize {
        self.journal.len()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuctionType, BidStatus, ClusterStatus};

    fn bid_for(node_op: Address) -> Bid {
        Bid {
            id: BidId(0),
            node_op,
            discount_rate: 0,
            duration_days: 30,
            auction_type: AuctionType::Dv4,
            daily_price: 1,
            score: 1,
            bond: 0,
            consumed_credits: 0,
            cluster_id: None,
            status: BidStatus::Pending,
        }
    }

    #[test]
    fn test_registry_bid_ids_sequential() {
        let mut registry = Registry::new(1);
        let a = registry.insert_bid(bid_for(Address::from_low_u64(1)));
        let b = registry.insert_bid(bid_for(Address::from_low_u64(2)));

        assert_eq!(a, BidId(1));
        assert_eq!(b, BidId(2));
        assert_eq!(registry.bid(a).unwrap().id, a);
        assert_eq!(registry.bid_count(), 2);
    }

    #[test]
    fn test_registry_rollback_reuses_uncommitted_ids() {
        let mut registry = Registry::new(1);
        let a = registry.insert_bid(bid_for(Address::from_low_u64(1)));
        registry.commit();

        let b = registry.insert_bid(bid_for(Address::from_low_u64(2)));
        assert_eq!(b, BidId(2));
        registry.rollback();

        assert!(registry.bid(b).is_none());
        assert!(registry.bid(a).is_some());
        assert_eq!(registry.insert_bid(bid_for(Address::from_low_u64(3))), BidId(2));
    }

    #[test]
    fn test_registry_bids_by_id_sorted() {
        let mut registry = Registry::new(1);
        for n in 1..=5 {
            registry.insert_bid(bid_for(Address::from_low_u64(n)));
        }
        registry.commit();
        registry.insert_bid(bid_for(Address::from_low_u64(9)));
        registry.rollback();
        registry.insert_bid(bid_for(Address::from_low_u64(8)));

        let ids: Vec<u64> = registry.bids_by_id().iter().map(|b| b.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(registry.bid(BidId(6)).unwrap().node_op, Address::from_low_u64(8));
    }

    #[test]
    fn test_registry_rollback_restores_before_images() {
        let mut registry = Registry::new(2);
        let op = Address::from_low_u64(1);
        let id = registry.insert_bid(bid_for(op));
        registry.profile_mut(op).whitelisted = true;
        registry.commit();

        registry.bid_mut(id).unwrap().status = BidStatus::Withdrawn;
        registry.bid_mut(id).unwrap().consumed_credits = 9;
        registry.profile_mut(op).whitelisted = false;
        registry.prune_profile(&op);
        registry.profile_mut(Address::from_low_u64(5)).reputation = 7;
        assert!(registry.register_vault(Address::from_low_u64(100)));
        assert!(registry.uncommitted() > 0);

        registry.rollback();
        assert_eq!(registry.uncommitted(), 0);
        assert_eq!(registry.bid(id).unwrap().status, BidStatus::Pending);
        assert_eq!(registry.bid(id).unwrap().consumed_credits, 0);
        assert!(registry.is_whitelisted(&op));
        assert_eq!(registry.profile(&Address::from_low_u64(5)).reputation, 2);
        assert_eq!(registry.profiles.len(), 1);
        assert!(!registry.is_vault(&Address::from_low_u64(100)));
    }

    #[test]
    fn test_registry_known_vault_not_journaled() {
        let mut registry = Registry::new(1);
        let vault = Address::from_low_u64(100);
        registry.register_vault(vault);
        registry.commit();

        assert!(!registry.register_vault(vault));
        registry.rollback();
        assert!(registry.is_vault(&vault));
    }

    #[test]
    fn test_registry_profile_defaults_and_prune() {
        let mut registry = Registry::new(3);
        let addr = Address::from_low_u64(7);

        assert_eq!(registry.profile(&addr).reputation, 3);
        assert!(!registry.is_whitelisted(&addr));

        registry.profile_mut(addr).whitelisted = true;
        registry.prune_profile(&addr);
        assert!(registry.is_whitelisted(&addr));

        registry.profile_mut(addr).whitelisted = false;
        registry.prune_profile(&addr);
        assert!(registry.profiles.is_empty());
    }

    #[test]
    fn test_registry_clusters_and_vaults() {
        let mut registry = Registry::new(1);
        let id = ClusterId([3; 32]);
        registry.insert_cluster(Cluster {
            id,
            members: Vec::new(),
            average_score: 0,
            pubkey_hash: None,
            split_address: None,
            vault: Address::from_low_u64(100),
            status: ClusterStatus::InCreation,
        });

        assert_eq!(registry.cluster_count(), 1);
        registry.cluster_mut(&id).unwrap().status = ClusterStatus::Deposited;
        assert_eq!(registry.cluster(&id).unwrap().status, ClusterStatus::Deposited);

        registry.rollback();
        assert_eq!(registry.cluster_count(), 0);

        let vault = Address::from_low_u64(100);
        assert!(registry.register_vault(vault));
        assert!(!registry.register_vault(vault));
        assert!(registry.is_vault(&vault));
    }
}
