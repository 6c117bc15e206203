//! # dv-auction
//!
//! Two-tier auction that groups node operator bids into distributed
//! validator clusters.
//!
//! ## Architecture
//!
//! The engine consists of:
//! - **Types**: core records (Bid, Cluster, NodeOperatorProfile, AuctionEvent)
//! - **Score**: prices and ranking scores in fixed-point integer math
//! - **Tree**: order-statistic red-black tree with slab-based storage
//! - **Auction**: size-4 and size-7 sub-auctions feeding one main auction
//! - **Engine**: registry, escrow gateway, permissions and atomic operations
//!
//! ## Design Principles
//!
//! 1. **Determinism**: all operations produce identical results for identical inputs
//! 2. **No Floating Point**: scores use 10^18 / 10^27 fixed-point arithmetic
//! 3. **Arena storage**: tree nodes and bids live in slabs, addressed by key
//! 4. **Synchronous Execution**: every operation runs to completion, no async

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: Bid, Cluster, NodeOperatorProfile, AuctionEvent
pub mod types;

/// Score calculator: prices, scores, cluster ids
pub mod score;

/// Order-statistic tree with FIFO buckets
pub mod tree;

/// Sub-auctions and the main auction
pub mod auction;

/// Engine parameters and roles
pub mod config;

/// Auction engine: registry, escrow, entry points
pub mod engine;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use types::{Address, AuctionEvent, AuctionType, Bid, BidId, BidStatus, Cluster, ClusterId, ClusterStatus};
pub use tree::OrderStatisticTree;
pub use auction::{MainAuction, SubAuction};
pub use config::{AuctionConfig, Roles};
pub use engine::{AuctionEngine, CallContext, EngineError, EscrowGateway, InMemoryEscrow};
