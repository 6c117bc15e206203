//! Both sub-auctions and the main auction, changed as one unit.
//!
//! ## Refresh
//!
//! After every insert or remove in a sub-auction the engine calls
//! [`AuctionBook::refresh`], which keeps the main auction in sync:
//!
//! ```text
//! count < N            -> drop our virtual entry (if any), done
//! top N unchanged      -> done
//! otherwise            -> drop old entry, derive new id, insert new entry
//! ```
//!
//! "Unchanged" means same average score AND same member seats, so a
//! drawn cluster always has exactly the members its id was derived from.
//!
//! ## Journal
//!
//! Every change to a tree, a virtual cluster or the cluster nonce is
//! recorded with what it takes to undo it:
//!
//! ```text
//! BidQueued     -> remove the member again
//! BidDropped    -> re-insert it at the bucket position it held
//! EntryQueued   -> remove the entry again
//! EntryDropped  -> re-insert it at the queue position it held
//! Latest        -> put the previous virtual cluster back
//! Nonce         -> put the previous nonce back
//! ```
//!
//! [`commit`](AuctionBook::commit) forgets the journal and
//! [`rollback`](AuctionBook::rollback) replays it newest first. Undoing an
//! operation costs what its own tree changes cost.

use tracing::debug;

use crate::auction::{AuctionError, MainAuction, MainEntry, SubAuction, VirtualCluster};
use crate::score::{self, Score, ScoreError};
use crate::types::{Address, AuctionType, ClusterId, ClusterMember};

/// What a refresh did to the main auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Nothing to do
    Unchanged,
    /// The old entry was removed and not replaced
    Cleared,
    /// A new entry was inserted (replacing the old one, if any)
    Replaced(ClusterId),
}

/// One reversible change.
#[derive(Debug, Clone)]
enum Change {
    BidQueued {
        auction_type: AuctionType,
        score: Score,
        member: ClusterMember,
    },
    BidDropped {
        auction_type: AuctionType,
        score: Score,
        member: ClusterMember,
        position: usize,
    },
    EntryQueued {
        score: Score,
        entry: MainEntry,
    },
    EntryDropped {
        score: Score,
        entry: MainEntry,
        position: usize,
    },
    Latest {
        auction_type: AuctionType,
        previous: Option<VirtualCluster>,
    },
    Nonce(u64),
}

/// The two sub-auctions, the main auction and the cluster-id nonce.
#[derive(Debug, Clone)]
pub struct AuctionBook {
    dv4: SubAuction,
    dv7: SubAuction,
    main: MainAuction,
    /// Mixed into every derived cluster id
    nonce: u64,
    journal: Vec<Change>,
}

impl Default for AuctionBook {
    fn default() -> Self {
        Self::new()
    }
}

impl AuctionBook {
    pub fn new() -> Self {
        Self {
            dv4: SubAuction::new(AuctionType::Dv4),
            dv7: SubAuction::new(AuctionType::Dv7),
            main: MainAuction::new(),
            nonce: 0,
            journal: Vec::new(),
        }
    }

    #[inline]
    pub fn sub(&self, auction_type: AuctionType) -> &SubAuction {
        match auction_type {
            AuctionType::Dv4 => &self.dv4,
            AuctionType::Dv7 => &self.dv7,
        }
    }

    #[inline]
    pub fn main(&self) -> &MainAuction {
        &self.main
    }

    /// Nonce the next derived cluster id will use.
    #[inline]
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Drawn clusters queued again by their vault.
    pub fn pending_count(&self) -> usize {
        let virtual_entries = AuctionType::ALL
            .iter()
            .filter(|t| self.sub(**t).latest().is_some())
            .count();
        self.main.len() - virtual_entries
    }

    /// Changes recorded since the last commit or rollback.
    #[inline]
    pub fn uncommitted(&self) -> usize {
        self.journal.len()
    }

    // ========================================================================
    // Bids
    // ========================================================================

    /// Queue a bid in its sub-auction. Call [`refresh`](Self::refresh) next.
    pub fn insert_bid(
        &mut self,
        auction_type: AuctionType,
        score: Score,
        member: ClusterMember,
    ) -> Result<(), AuctionError> {
        self.sub_mut(auction_type).insert_bid(score, member)?;
        self.journal.push(Change::BidQueued {
            auction_type,
            score,
            member,
        });
        Ok(())
    }

    /// Drop a bid from its sub-auction. Call [`refresh`](Self::refresh) next.
    pub fn remove_bid(
        &mut self,
        auction_type: AuctionType,
        score: Score,
        member: ClusterMember,
    ) -> Result<(), AuctionError> {
        let position = self.sub_mut(auction_type).remove_bid(score, member)?;
        self.journal.push(Change::BidDropped {
            auction_type,
            score,
            member,
            position,
        });
        Ok(())
    }

    // ========================================================================
    // Main auction
    // ========================================================================

    /// Re-derive the best N bids of one sub-auction and sync the main
    /// auction with them.
    ///
    /// # Arguments
    ///
    /// * `auction_type` - The sub-auction to sync
    /// * `timestamp` - Mixed into a newly derived cluster id
    ///
    /// # Errors
    ///
    /// `Score` if the average or the nonce overflows; nothing has changed
    /// in that case. `Tree` only if the book is already inconsistent.
    pub fn refresh(
        &mut self,
        auction_type: AuctionType,
        timestamp: u64,
    ) -> Result<RefreshOutcome, AuctionError> {
        let sub = self.sub(auction_type);
        let stale = sub
            .latest()
            .map(|v| (v.id, v.average_score, sub.entry_for(v.id)));

        let Some(seats) = sub.best_seats() else {
            return match stale {
                Some((id, average, entry)) => {
                    self.drop_entry(average, entry)?;
                    self.set_latest(auction_type, None);
                    debug!(?auction_type, cluster_id = %id, "virtual cluster cleared");
                    Ok(RefreshOutcome::Cleared)
                }
                None => Ok(RefreshOutcome::Unchanged),
            };
        };

        let scores: Vec<Score> = seats.iter().map(|(s, _)| *s).collect();
        let average = score::average_score(&scores)?;

        if let Some(current) = sub.latest() {
            if current.average_score == average && current.seats == seats {
                return Ok(RefreshOutcome::Unchanged);
            }
        }

        let addresses: Vec<Address> = seats.iter().map(|(_, m)| m.node_op).collect();
        let id = score::derive_cluster_id(timestamp, &addresses, average, self.nonce);
        let next_nonce = self
            .nonce
            .checked_add(1)
            .ok_or(ScoreError::Overflow("cluster nonce"))?;

        if let Some((_, old_average, old_entry)) = stale {
            self.drop_entry(old_average, old_entry)?;
        }
        self.queue_entry(average, MainEntry::virtual_cluster(id, auction_type))?;
        self.journal.push(Change::Nonce(self.nonce));
        self.nonce = next_nonce;
        self.set_latest(
            auction_type,
            Some(VirtualCluster {
                id,
                average_score: average,
                seats,
            }),
        );

        debug!(?auction_type, cluster_id = %id, average_score = average, "virtual cluster replaced");
        Ok(RefreshOutcome::Replaced(id))
    }

    /// Remove and return the main-auction winner.
    pub fn pop_winner(&mut self) -> Result<Option<(Score, MainEntry)>, AuctionError> {
        let Some((score, entry)) = self.main.pop()? else {
            return Ok(None);
        };
        self.journal.push(Change::EntryDropped {
            score,
            entry,
            position: 0,
        });
        Ok(Some((score, entry)))
    }

    /// Hand over the virtual cluster `id` of one sub-auction after it won.
    ///
    /// The members leave the sub-auction's tree. The caller has already
    /// popped the main-auction entry and is expected to `refresh` next.
    ///
    /// # Returns
    ///
    /// `None` if `id` is not the sub-auction's current virtual cluster.
    pub fn take_winner(
        &mut self,
        auction_type: AuctionType,
        id: ClusterId,
    ) -> Result<Option<VirtualCluster>, AuctionError> {
        let winner = match self.sub(auction_type).latest() {
            Some(latest) if latest.id == id => latest.clone(),
            _ => return Ok(None),
        };

        self.set_latest(auction_type, None);
        for (score, member) in &winner.seats {
            self.remove_bid(auction_type, *score, *member)?;
        }
        Ok(Some(winner))
    }

    /// Queue an already drawn cluster for another draw.
    pub fn queue_pending(&mut self, average_score: Score, cluster_id: ClusterId) -> Result<(), AuctionError> {
        self.queue_entry(average_score, MainEntry::pending(cluster_id))?;
        Ok(())
    }

    // ========================================================================
    // Journal
    // ========================================================================

    /// Keep every change made since the last commit.
    pub fn commit(&mut self) {
        self.journal.clear();
    }

    /// Undo every change made since the last commit, newest first.
    ///
    /// # Panics
    ///
    /// Panics if the trees were changed behind the journal's back; each
    /// undo step is the exact inverse of a step that succeeded.
    pub fn rollback(&mut self) {
        while let Some(change) = self.journal.pop() {
            self.revert(change)
                .expect("journal replays onto the state it was recorded from");
        }
    }

    fn revert(&mut self, change: Change) -> Result<(), AuctionError> {
        match change {
            Change::BidQueued {
                auction_type,
                score,
                member,
            } => {
                self.sub_mut(auction_type).remove_bid(score, member)?;
            }
            Change::BidDropped {
                auction_type,
                score,
                member,
                position,
            } => {
                self.sub_mut(auction_type).restore_bid(score, member, position)?;
            }
            Change::EntryQueued { score, entry } => {
                self.main.remove(score, entry)?;
            }
            Change::EntryDropped {
                score,
                entry,
                position,
            } => {
                self.main.restore(score, entry, position)?;
            }
            Change::Latest {
                auction_type,
                previous,
            } => {
                self.sub_mut(auction_type).replace_latest(previous);
            }
            Change::Nonce(nonce) => self.nonce = nonce,
        }
        Ok(())
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn sub_mut(&mut self, auction_type: AuctionType) -> &mut SubAuction {
        match auction_type {
            AuctionType::Dv4 => &mut self.dv4,
            AuctionType::Dv7 => &mut self.dv7,
        }
    }

    fn queue_entry(&mut self, score: Score, entry: MainEntry) -> Result<(), AuctionError> {
        self.main.insert(score, entry)?;
        self.journal.push(Change::EntryQueued { score, entry });
        Ok(())
    }

    fn drop_entry(&mut self, score: Score, entry: MainEntry) -> Result<(), AuctionError> {
        let position = self.main.remove(score, entry)?;
        self.journal.push(Change::EntryDropped {
            score,
            entry,
            position,
        });
        Ok(())
    }

    fn set_latest(&mut self, auction_type: AuctionType, latest: Option<VirtualCluster>) {
        let previous = self.sub_mut(auction_type).replace_latest(latest);
        self.journal.push(Change::Latest {
            auction_type,
            previous,
        });
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
