//! Tree node for slab-based storage.
//!
//! ## Design
//!
//! `TreeNode` holds one distinct key, the FIFO bucket of members that
//! share it, the red-black colour and the subtree element count used for
//! rank/select. Links are slab keys (`usize`), not references:
//!
//! ```text
//! TreeNode {
//!     key, bucket,
//!     parent / left / right: Option<usize>,
//!     red: bool,
//!     count: bucket.len() + count(left) + count(right)
//! }
//! ```
//!
//! Per official slab docs (https://docs.rs/slab/0.4.11) keys may be reused
//! after `slab.remove()`; the tree never keeps a key of a removed node.

use crate::score::Score;
use crate::tree::Bucket;

/// A red-black tree node stored in the slab.
#[derive(Debug, Clone)]
pub struct TreeNode<M> {
    pub key: Score,

    /// Members with this key, earliest first; never empty while linked
    pub bucket: Bucket<M>,

    pub parent: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,

    pub red: bool,

    /// Elements in this subtree, bucket members included
    pub count: usize,
}

impl<M: Copy + Eq> TreeNode<M> {
    /// A fresh red leaf holding one member.
    #[inline]
    pub fn new(key: Score, member: M, parent: Option<usize>) -> Self {
        Self {
            key,
            bucket: Bucket::with_member(member),
            parent,
            left: None,
            right: None,
            red: true,
            count: 1,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_node_new() {
        let node = TreeNode::new(42, 1u64, Some(3));

        assert_eq!(node.key, 42);
        assert_eq!(node.parent, Some(3));
        assert!(node.red);
        assert_eq!(node.count, 1);
        assert_eq!(node.bucket.front(), Some(&1));
        assert!(node.left.is_none() && node.right.is_none());
    }
}
