//! Auction engine module.
//!
//! ## Design Principles
//!
//! 1. **Determinism**: same operations in the same order give the same
//!    state root
//! 2. **Fixed-Point Math**: no floating point anywhere in scoring
//! 3. **Atomic operations**: registry and trees journal every change;
//!    an error replays the journals in reverse
//! 4. **Transfer last**: the escrow is called once per operation, after
//!    all local state is final, under the reentrancy lock
//!
//! ## Components
//!
//! - [`AuctionEngine`]: entry points, queries and the event log
//! - [`Registry`]: bids, clusters, operator profiles and vaults
//! - [`EscrowGateway`]: custody collaborator ([`InMemoryEscrow`] for tests)
//! - [`ReentrancyGuard`]: per-entry-point lock

mod auction_engine;
mod error;
mod escrow;
mod guard;
mod registry;

pub use auction_engine::{pubkey_hash, AuctionEngine, CallContext, PriceDelta, WinnerPreview, PUBKEY_LENGTH};
pub use error::{EngineError, ErrorKind};
pub use escrow::{EscrowGateway, InMemoryEscrow, TransferError};
pub use guard::{GuardHandle, GuardToken, ReentrancyGuard};
pub use registry::Registry;
