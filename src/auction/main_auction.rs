//! The main auction: one ranked pool across both cluster sizes.
//!
//! ## Entries
//!
//! ```text
//! key = average score
//! member = MainEntry { cluster_id, source }
//!
//! source = Virtual(Dv4)   at most one, owned by the size-4 sub-auction
//!        | Virtual(Dv7)   at most one, owned by the size-7 sub-auction
//!        | Pending        drawn before, sent back by its vault
//! ```
//!
//! The winner is the highest average score; among equal scores the entry
//! queued first wins.

use crate::score::Score;
use crate::tree::{OrderStatisticTree, TreeError};
use crate::types::{AuctionType, ClusterId};

/// Where a main-auction entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntrySource {
    /// Current best combination of a sub-auction, not yet materialised
    Virtual(AuctionType),
    /// An existing cluster waiting to be drawn again
    Pending,
}

/// Member type of the main-auction tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MainEntry {
    pub cluster_id: ClusterId,
    pub source: EntrySource,
}

impl MainEntry {
    pub fn virtual_cluster(cluster_id: ClusterId, auction_type: AuctionType) -> Self {
        Self {
            cluster_id,
            source: EntrySource::Virtual(auction_type),
        }
    }

    pub fn pending(cluster_id: ClusterId) -> Self {
        Self {
            cluster_id,
            source: EntrySource::Pending,
        }
    }

    #[inline]
    pub fn is_virtual(&self) -> bool {
        matches!(self.source, EntrySource::Virtual(_))
    }
}

/// Ranked pool of candidate clusters.
#[derive(Debug, Clone, Default)]
pub struct MainAuction {
    tree: OrderStatisticTree<MainEntry>,
}

impl MainAuction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued clusters, virtual and pending.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Queue `entry` behind every entry already holding `score`.
    pub fn insert(&mut self, score: Score, entry: MainEntry) -> Result<(), TreeError> {
        self.tree.insert(score, entry)
    }

    /// Put `entry` back at the queue position it held under `score`.
    pub fn restore(&mut self, score: Score, entry: MainEntry, position: usize) -> Result<(), TreeError> {
        self.tree.insert_at(score, entry, position)
    }

    /// Drop `entry`; returns the queue position it held under `score`.
    pub fn remove(&mut self, score: Score, entry: MainEntry) -> Result<usize, TreeError> {
        self.tree.remove(score, entry)
    }

    pub fn contains(&self, score: Score, entry: &MainEntry) -> bool {
        self.tree.contains(score, entry)
    }

    /// The entry the next draw would take.
    pub fn peek(&self) -> Option<(Score, MainEntry)> {
        let score = self.tree.last()?;
        let entry = *self.tree.bucket(score)?.front()?;
        Some((score, entry))
    }

    /// Remove and return the winning entry.
    ///
    /// The winner is always the front of its score's queue, so
    /// `restore(score, entry, 0)` undoes a pop.
    pub fn pop(&mut self) -> Result<Option<(Score, MainEntry)>, TreeError> {
        match self.peek() {
            Some((score, entry)) => {
                self.tree.remove(score, entry)?;
                Ok(Some((score, entry)))
            }
            None => Ok(None),
        }
    }

    /// Read access for rank and percentile queries.
    #[inline]
    pub fn tree(&self) -> &OrderStatisticTree<MainEntry> {
        &self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> ClusterId {
        ClusterId([byte; 32])
    }

    #[test]
    fn test_main_auction_empty() {
        let mut main = MainAuction::new();
        assert!(main.is_empty());
        assert!(main.peek().is_none());
        assert_eq!(main.pop().unwrap(), None);
    }

    #[test]
    fn test_main_auction_winner_is_highest_score() {
        let mut main = MainAuction::new();
        main.insert(25, MainEntry::virtual_cluster(id(4), AuctionType::Dv4)).unwrap();
        main.insert(40, MainEntry::virtual_cluster(id(7), AuctionType::Dv7)).unwrap();
        main.insert(30, MainEntry::pending(id(1))).unwrap();

        assert_eq!(main.len(), 3);
        let (score, entry) = main.peek().unwrap();
        assert_eq!(score, 40);
        assert_eq!(entry.source, EntrySource::Virtual(AuctionType::Dv7));
    }

    #[test]
    fn test_main_auction_tie_goes_to_earliest() {
        let mut main = MainAuction::new();
        main.insert(30, MainEntry::pending(id(1))).unwrap();
        main.insert(30, MainEntry::virtual_cluster(id(4), AuctionType::Dv4)).unwrap();

        let (_, first) = main.pop().unwrap().unwrap();
        assert_eq!(first.cluster_id, id(1));
        assert!(!first.is_virtual());

        let (_, second) = main.pop().unwrap().unwrap();
        assert!(second.is_virtual());
        assert!(main.is_empty());
    }

    #[test]
    fn test_main_auction_remove_specific_entry() {
        let mut main = MainAuction::new();
        let entry = MainEntry::virtual_cluster(id(4), AuctionType::Dv4);
        main.insert(25, entry).unwrap();

        assert!(main.contains(25, &entry));
        assert_eq!(main.remove(25, entry), Ok(0));
        assert!(!main.contains(25, &entry));
        assert_eq!(main.remove(25, entry), Err(TreeError::KeyNotFound(25)));
    }

    #[test]
    fn test_main_auction_restore_keeps_tie_order() {
        let mut main = MainAuction::new();
        let first = MainEntry::pending(id(1));
        let second = MainEntry::virtual_cluster(id(4), AuctionType::Dv4);
        main.insert(30, first).unwrap();
        main.insert(30, second).unwrap();

        let (score, popped) = main.pop().unwrap().unwrap();
        assert_eq!(popped, first);
        main.restore(score, popped, 0).unwrap();

        assert_eq!(main.peek(), Some((30, first)));
        assert_eq!(main.len(), 2);
    }
}
