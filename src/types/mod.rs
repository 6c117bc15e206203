//! Core data types for the auction engine
//!
//! ## Types
//!
//! - [`Address`], [`BidId`], [`ClusterId`]: opaque handles
//! - [`Bid`]: an operator's offer in one sub-auction
//! - [`AuctionType`]: size-4 or size-7 clusters
//! - [`Cluster`]: a drawn distributed validator cluster
//! - [`NodeOperatorProfile`]: registry view of an operator
//! - [`AuctionEvent`]: audit log entry
//!
//! ## Amounts
//!
//! All amounts are `u128` wei ([`Wei`]). Ether strings are converted at
//! the edges by [`units`].

mod ids;
mod bid;
mod cluster;
mod operator;
mod event;
pub mod snapshot;
pub mod units;

// Re-export all types at module level
pub use ids::{Address, BidId, ClusterId};
pub use bid::{AuctionType, Bid, BidStatus};
pub use cluster::{Cluster, ClusterMember, ClusterStatus};
pub use operator::NodeOperatorProfile;
pub use event::AuctionEvent;
pub use snapshot::{BidSnapshot, ClusterSnapshot};
pub use units::Wei;
