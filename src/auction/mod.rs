//! Two-tier auction.
//!
//! ## Architecture
//!
//! ```text
//! bids (size 4) --> SubAuction(Dv4) --\
//!                                      +--> MainAuction --> draw
//! bids (size 7) --> SubAuction(Dv7) --/
//! ```
//!
//! Each sub-auction ranks individual bids and keeps exactly one virtual
//! cluster (its best N bids) in the main auction while it has at least N
//! bids. The main auction also holds pending clusters returned by vaults.
//! [`AuctionBook`] owns all three and journals every change so a failed
//! engine call can be undone step by step.

mod book;
mod main_auction;
mod sub_auction;

use thiserror::Error;

use crate::score::ScoreError;
use crate::tree::TreeError;

pub use book::{AuctionBook, RefreshOutcome};
pub use main_auction::{EntrySource, MainAuction, MainEntry};
pub use sub_auction::{SubAuction, VirtualCluster};

/// Failures while maintaining the auction trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Score(#[from] ScoreError),
}
