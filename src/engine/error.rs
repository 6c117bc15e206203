//! Engine errors.
//!
//! Every variant maps to one of four kinds:
//!
//! | Kind | Meaning |
//! |------|---------|
//! | `Authorization` | caller may not perform the operation |
//! | `Validation` | arguments or attached value rejected |
//! | `State` | operation does not apply to the current state |
//! | `Transfer` | escrow refused the transfer |
//!
//! Any error aborts the whole operation; the engine undoes every change the
//! operation made.

use thiserror::Error;

use crate::auction::AuctionError;
use crate::config::ConfigError;
use crate::engine::TransferError;
use crate::score::ScoreError;
use crate::tree::TreeError;
use crate::types::{Address, AuctionType, BidId, ClusterId, ClusterStatus, Wei};

/// Coarse classification of [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    Validation,
    State,
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // ------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------
    #[error("{0} is not whitelisted")]
    NotWhitelisted(Address),

    #[error("caller {0} is not the owner")]
    NotOwner(Address),

    #[error("caller {0} is neither the vault manager nor a registered vault")]
    NotVaultManager(Address),

    #[error("caller {caller} is not the vault of cluster {cluster_id}")]
    NotClusterVault { caller: Address, cluster_id: ClusterId },

    #[error("caller {0} is not the rewards collaborator")]
    NotRewardsCollaborator(Address),

    #[error("caller {caller} did not place {bid_id}")]
    SenderNotBidder { caller: Address, bid_id: BidId },

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------
    #[error("discount rate {rate} above maximum {max}")]
    DiscountRateTooHigh { rate: u16, max: u16 },

    #[error("duration {days} days below minimum {min}")]
    DurationTooShort { days: u32, min: u32 },

    #[error("not enough ether sent: required {required} wei, got {sent}")]
    NotEnoughEtherSent { required: Wei, sent: Wei },

    #[error("invalid auction type {0}")]
    InvalidAuctionType(u8),

    #[error("pubkey must be 48 bytes, got {0}")]
    InvalidPubKeyLength(usize),

    #[error("{bid_id} would consume {total} credits out of {duration_days}")]
    CreditsExceedDuration {
        bid_id: BidId,
        total: u64,
        duration_days: u32,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------
    #[error("{0} not found")]
    BidNotFound(BidId),

    #[error("{0} is not pending")]
    BidNotPending(BidId),

    #[error("cluster {0} not found")]
    ClusterNotFound(ClusterId),

    #[error("main auction is empty")]
    MainAuctionEmpty,

    #[error("cluster {cluster_id} cannot move from {from:?} to {to:?}")]
    InvalidStatusTransition {
        cluster_id: ClusterId,
        from: ClusterStatus,
        to: ClusterStatus,
    },

    #[error("operation re-entered while another one is in progress")]
    Reentrancy,

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("snapshot encoding failed: {0}")]
    Snapshot(String),

    // ------------------------------------------------------------------
    // Transfer
    // ------------------------------------------------------------------
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        use EngineError::*;

        match self {
            NotWhitelisted(_)
            | NotOwner(_)
            | NotVaultManager(_)
            | NotClusterVault { .. }
            | NotRewardsCollaborator(_)
            | SenderNotBidder { .. } => ErrorKind::Authorization,

            DiscountRateTooHigh { .. }
            | DurationTooShort { .. }
            | NotEnoughEtherSent { .. }
            | InvalidAuctionType(_)
            | InvalidPubKeyLength(_)
            | CreditsExceedDuration { .. }
            | Config(_)
            | Score(_) => ErrorKind::Validation,

            BidNotFound(_)
            | BidNotPending(_)
            | ClusterNotFound(_)
            | MainAuctionEmpty
            | InvalidStatusTransition { .. }
            | Reentrancy
            | Tree(_)
            | Snapshot(_) => ErrorKind::State,

            Transfer(_) => ErrorKind::Transfer,
        }
    }
}

impl From<AuctionError> for EngineError {
    fn from(err: AuctionError) -> Self {
        match err {
            AuctionError::Tree(e) => EngineError::Tree(e),
            AuctionError::Score(e) => EngineError::Score(e),
        }
    }
}

impl TryFrom<u8> for AuctionType {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        AuctionType::from_u8(value).ok_or(EngineError::InvalidAuctionType(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            EngineError::NotOwner(Address::ZERO).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            EngineError::DurationTooShort { days: 1, min: 30 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(EngineError::MainAuctionEmpty.kind(), ErrorKind::State);
        assert_eq!(
            EngineError::Transfer(TransferError::Rejected("test".into())).kind(),
            ErrorKind::Transfer
        );
    }

    #[test]
    fn test_auction_error_conversion() {
        let err: EngineError = AuctionError::Tree(TreeError::KeyNotFound(5)).into();
        assert_eq!(err, EngineError::Tree(TreeError::KeyNotFound(5)));
        assert_eq!(err.kind(), ErrorKind::State);

        let err: EngineError = AuctionError::Score(ScoreError::EmptyScores).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_auction_type_try_from() {
        assert_eq!(AuctionType::try_from(4u8), Ok(AuctionType::Dv4));
        assert_eq!(AuctionType::try_from(7u8), Ok(AuctionType::Dv7));
        assert_eq!(
            AuctionType::try_from(5u8),
            Err(EngineError::InvalidAuctionType(5))
        );
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::NotEnoughEtherSent {
            required: 10,
            sent: 3,
        };
        assert_eq!(
            err.to_string(),
            "not enough ether sent: required 10 wei, got 3"
        );
    }
}
