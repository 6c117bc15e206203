//! Ranked index shared by the sub-auctions and the main auction.
//!
//! ## Design
//!
//! - **Slab arena**: nodes live in a slab, links are `Option<usize>`
//! - **Red-black balancing** with per-node subtree counts
//! - **FIFO buckets**: one node per distinct score

mod bucket;
mod node;
mod ost;

pub use bucket::Bucket;
pub use node::TreeNode;
pub use ost::{DescIter, OrderStatisticTree, TreeError};
