//! Order-statistic red-black tree with duplicate keys.
//!
//! ## Architecture
//!
//! - **Slab**: arena for nodes; links are slab keys, so cloning the tree
//!   is a plain memberwise copy
//! - **Red-black balancing**: insert/remove in O(log n)
//! - **Subtree counts**: every node stores the number of elements below it
//!   (bucket members included), giving O(log n) rank and select
//! - **Buckets**: one node per distinct key; members sharing a key queue
//!   up in insertion order
//!
//! ## Ordering
//!
//! Elements are ordered by key ascending, then by bucket position. The
//! "best N" selection ([`OrderStatisticTree::top`]) walks keys from the
//! highest down and, inside a key, takes the earliest inserted members
//! first.
//!
//! ## Empty tree
//!
//! Key queries (`first`, `last`, `at_rank`, ...) return `None` on an empty
//! tree; `rank`, `percentile` and `permil` return 0. None of them error.
//!
//! ## Example
//!
//! ```
//! use dv_auction::tree::OrderStatisticTree;
//!
//! let mut tree = OrderStatisticTree::new();
//! tree.insert(30, 'a').unwrap();
//! tree.insert(10, 'b').unwrap();
//! tree.insert(30, 'c').unwrap();
//!
//! assert_eq!(tree.count(), 3);
//! assert_eq!(tree.last(), Some(30));
//! assert_eq!(tree.rank(10), 1);
//! assert_eq!(tree.at_rank(2), Some(30));
//! assert_eq!(tree.top(2), vec![(30, 'a'), (30, 'c')]);
//! ```

use std::cmp::Ordering;

use slab::Slab;
use thiserror::Error;

use crate::score::Score;
use crate::tree::{Bucket, TreeNode};

/// Errors from tree mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("member already present under key {0}")]
    DuplicateMember(Score),

    #[error("key {0} not found")]
    KeyNotFound(Score),

    #[error("member not found under key {0}")]
    MemberNotFound(Score),
}

/// Ranked index of `(score, member)` pairs.
#[derive(Debug, Clone)]
pub struct OrderStatisticTree<M> {
    nodes: Slab<TreeNode<M>>,
    root: Option<usize>,
}

impl<M: Copy + Eq> Default for OrderStatisticTree<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Copy + Eq> OrderStatisticTree<M> {
    pub fn new() -> Self {
        Self {
            nodes: Slab::new(),
            root: None,
        }
    }

    /// Pre-allocate room for `capacity` distinct keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Slab::with_capacity(capacity),
            root: None,
        }
    }

    // ========================================================================
    // Size
    // ========================================================================

    /// Number of `(score, member)` pairs.
    #[inline]
    pub fn count(&self) -> usize {
        self.count_of(self.root)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of distinct keys.
    #[inline]
    pub fn distinct_keys(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Smallest key.
    pub fn first(&self) -> Option<Score> {
        self.root.map(|r| self.nodes[self.minimum(r)].key)
    }

    /// Largest key.
    pub fn last(&self) -> Option<Score> {
        self.root.map(|r| self.nodes[self.maximum(r)].key)
    }

    /// Smallest key strictly greater than `key` (which need not be present).
    pub fn next(&self, key: Score) -> Option<Score> {
        let mut cursor = self.root;
        let mut candidate = None;
        while let Some(idx) = cursor {
            let node = &self.nodes[idx];
            if node.key > key {
                candidate = Some(node.key);
                cursor = node.left;
            } else {
                cursor = node.right;
            }
        }
        candidate
    }

    /// Largest key strictly smaller than `key` (which need not be present).
    pub fn prev(&self, key: Score) -> Option<Score> {
        let mut cursor = self.root;
        let mut candidate = None;
        while let Some(idx) = cursor {
            let node = &self.nodes[idx];
            if node.key < key {
                candidate = Some(node.key);
                cursor = node.right;
            } else {
                cursor = node.left;
            }
        }
        candidate
    }

    #[inline]
    pub fn key_exists(&self, key: Score) -> bool {
        self.find(key).is_some()
    }

    /// Whether `member` is queued under `key`.
    pub fn contains(&self, key: Score, member: &M) -> bool {
        self.bucket(key).map_or(false, |b| b.contains(member))
    }

    /// Members sharing `key`, earliest first.
    pub fn bucket(&self, key: Score) -> Option<&Bucket<M>> {
        self.find(key).map(|idx| &self.nodes[idx].bucket)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Queue `member` under `key`, creating the key's node if needed.
    ///
    /// The member goes to the back of the key's bucket, behind every
    /// member already queued there. O(log n).
    ///
    /// # Errors
    ///
    /// `DuplicateMember` if `member` is already queued under `key`.
    pub fn insert(&mut self, key: Score, member: M) -> Result<(), TreeError> {
        self.insert_at(key, member, usize::MAX)
    }

    /// Queue `member` under `key` at bucket position `position`.
    ///
    /// Positions past the end of the bucket append. Together with the
    /// position returned by [`remove`](Self::remove) this puts a member back
    /// exactly where it was.
    ///
    /// # Arguments
    ///
    /// * `key` - Score to queue under
    /// * `member` - Handle stored in the key's bucket
    /// * `position` - Bucket index; `usize::MAX` means the back
    ///
    /// # Errors
    ///
    /// `DuplicateMember` if `member` is already queued under `key`.
    ///
    /// # Panics
    ///
    /// Only if the red-black links are already corrupt (a red node without
    /// a parent during rebalancing).
    pub fn insert_at(&mut self, key: Score, member: M, position: usize) -> Result<(), TreeError> {
        let mut parent = None;
        let mut go_left = false;
        let mut cursor = self.root;

        while let Some(idx) = cursor {
            let node = &self.nodes[idx];
            match key.cmp(&node.key) {
                Ordering::Less => {
                    parent = Some(idx);
                    go_left = true;
                    cursor = node.left;
                }
                Ordering::Greater => {
                    parent = Some(idx);
                    go_left = false;
                    cursor = node.right;
                }
                Ordering::Equal => {
                    if node.bucket.contains(&member) {
                        return Err(TreeError::DuplicateMember(key));
                    }
                    self.nodes[idx].bucket.insert(position, member);
                    self.refresh_counts_upward(Some(idx));
                    return Ok(());
                }
            }
        }

        let idx = self.nodes.insert(TreeNode::new(key, member, parent));
        match parent {
            None => self.root = Some(idx),
            Some(p) if go_left => self.nodes[p].left = Some(idx),
            Some(p) => self.nodes[p].right = Some(idx),
        }
        self.refresh_counts_upward(parent);
        self.insert_fixup(idx);

        Ok(())
    }

    /// Remove `member` from `key`; the node goes away with its last member.
    ///
    /// # Returns
    ///
    /// The bucket position the member held (0 = earliest).
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if no node holds `key`, `MemberNotFound` if the node
    /// exists but `member` is not queued in it. The tree is unchanged on
    /// error.
    ///
    /// # Panics
    ///
    /// Only if the red-black links are already corrupt (a doubly black node
    /// without a sibling during rebalancing).
    pub fn remove(&mut self, key: Score, member: M) -> Result<usize, TreeError> {
        let idx = self.find(key).ok_or(TreeError::KeyNotFound(key))?;

        let position = self.nodes[idx]
            .bucket
            .remove(&member)
            .ok_or(TreeError::MemberNotFound(key))?;

        if self.nodes[idx].bucket.is_empty() {
            self.delete_node(idx);
        } else {
            self.refresh_counts_upward(Some(idx));
        }

        Ok(position)
    }

    // ========================================================================
    // Rank / select
    // ========================================================================

    /// Number of elements with a key `<= key`.
    ///
    /// `key` need not be present. With duplicate keys every member of a
    /// bucket shares the rank of the bucket's last member. O(log n).
    pub fn rank(&self, key: Score) -> usize {
        let mut smaller_or_equal = 0;
        let mut cursor = self.root;

        while let Some(idx) = cursor {
            let node = &self.nodes[idx];
            if key < node.key {
                cursor = node.left;
            } else {
                smaller_or_equal += self.count_of(node.left) + node.bucket.len();
                cursor = node.right;
            }
        }

        smaller_or_equal
    }

    /// Key of the `rank`-th smallest element (1-indexed).
    ///
    /// # Arguments
    ///
    /// * `rank` - 1 for the smallest element, `count()` for the largest
    ///
    /// # Returns
    ///
    /// `None` for rank 0 or a rank past the element count.
    pub fn at_rank(&self, rank: usize) -> Option<Score> {
        if rank == 0 || rank > self.count() {
            return None;
        }

        let mut remaining = rank;
        let mut cursor = self.root;

        while let Some(idx) = cursor {
            let node = &self.nodes[idx];
            let left = self.count_of(node.left);
            if remaining <= left {
                cursor = node.left;
            } else if remaining <= left + node.bucket.len() {
                return Some(node.key);
            } else {
                remaining -= left + node.bucket.len();
                cursor = node.right;
            }
        }

        None
    }

    /// Share of elements `<= key`, in percent, rounded half up.
    ///
    /// # Returns
    ///
    /// `((1000 * rank(key)) / count + 5) / 10`, or 0 on an empty tree.
    pub fn percentile(&self, key: Score) -> usize {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        ((1_000 * self.rank(key)) / count + 5) / 10
    }

    /// Share of elements `<= key`, in per mille, rounded half up.
    ///
    /// # Returns
    ///
    /// `((10000 * rank(key)) / count + 5) / 10`, or 0 on an empty tree.
    pub fn permil(&self, key: Score) -> usize {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        ((10_000 * self.rank(key)) / count + 5) / 10
    }

    /// Key at the given percentile.
    ///
    /// # Arguments
    ///
    /// * `percentile` - 0 to 100; selects rank `((p * count) / 10 + 5) / 10`
    ///
    /// # Returns
    ///
    /// `None` when the computed rank is 0 or the tree is empty.
    pub fn at_percentile(&self, percentile: usize) -> Option<Score> {
        let rank = ((percentile * self.count()) / 10 + 5) / 10;
        self.at_rank(rank)
    }

    /// Key at the given per-mille position.
    ///
    /// # Arguments
    ///
    /// * `permil` - 0 to 1000; selects rank `((p * count) / 100 + 5) / 10`
    pub fn at_permil(&self, permil: usize) -> Option<Score> {
        let rank = ((permil * self.count()) / 100 + 5) / 10;
        self.at_rank(rank)
    }

    /// Key at the 50th percentile; `None` only on an empty tree.
    #[inline]
    pub fn median(&self) -> Option<Score> {
        self.at_percentile(50)
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Elements from the highest key down; FIFO inside a key.
    pub fn iter_desc(&self) -> DescIter<'_, M> {
        DescIter {
            tree: self,
            node: self.root.map(|r| self.maximum(r)),
            pos: 0,
        }
    }

    /// The best `n` elements (see [`iter_desc`](Self::iter_desc)).
    pub fn top(&self, n: usize) -> Vec<(Score, M)> {
        self.iter_desc().take(n).collect()
    }

    // ========================================================================
    // Invariant check
    // ========================================================================

    /// Verify links, key order, colours, black height, non-empty buckets and
    /// subtree counts. Meant for tests and debug assertions.
    pub fn is_valid(&self) -> bool {
        match self.root {
            None => self.nodes.is_empty(),
            Some(r) => {
                if self.nodes[r].red || self.nodes[r].parent.is_some() {
                    return false;
                }
                let mut visited = 0;
                let ok = self.check_subtree(Some(r), None, None, &mut visited).is_some();
                ok && visited == self.nodes.len()
            }
        }
    }

    /// Returns the black height of the subtree, or `None` on a violation.
    fn check_subtree(
        &self,
        idx: Option<usize>,
        lower: Option<Score>,
        upper: Option<Score>,
        visited: &mut usize,
    ) -> Option<usize> {
        let Some(i) = idx else {
            return Some(1);
        };
        *visited += 1;
        let node = &self.nodes[i];

        if node.bucket.is_empty() {
            return None;
        }
        if lower.map_or(false, |l| node.key <= l) || upper.map_or(false, |u| node.key >= u) {
            return None;
        }
        for child in [node.left, node.right].into_iter().flatten() {
            if self.nodes[child].parent != Some(i) {
                return None;
            }
            if node.red && self.nodes[child].red {
                return None;
            }
        }
        if node.count != node.bucket.len() + self.count_of(node.left) + self.count_of(node.right) {
            return None;
        }

        let left_height = self.check_subtree(node.left, lower, Some(node.key), visited)?;
        let right_height = self.check_subtree(node.right, Some(node.key), upper, visited)?;
        if left_height != right_height {
            return None;
        }

        Some(left_height + usize::from(!node.red))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn find(&self, key: Score) -> Option<usize> {
        let mut cursor = self.root;
        while let Some(idx) = cursor {
            let node = &self.nodes[idx];
            cursor = match key.cmp(&node.key) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(idx),
            };
        }
        None
    }

    #[inline]
    fn count_of(&self, idx: Option<usize>) -> usize {
        idx.map_or(0, |i| self.nodes[i].count)
    }

    #[inline]
    fn is_red(&self, idx: Option<usize>) -> bool {
        idx.map_or(false, |i| self.nodes[i].red)
    }

    #[inline]
    fn set_black(&mut self, idx: Option<usize>) {
        if let Some(i) = idx {
            self.nodes[i].red = false;
        }
    }

    fn minimum(&self, mut idx: usize) -> usize {
        while let Some(left) = self.nodes[idx].left {
            idx = left;
        }
        idx
    }

    fn maximum(&self, mut idx: usize) -> usize {
        while let Some(right) = self.nodes[idx].right {
            idx = right;
        }
        idx
    }

    /// In-order predecessor node.
    fn predecessor(&self, idx: usize) -> Option<usize> {
        if let Some(left) = self.nodes[idx].left {
            return Some(self.maximum(left));
        }
        let mut child = idx;
        let mut parent = self.nodes[idx].parent;
        while let Some(p) = parent {
            if self.nodes[p].right == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p].parent;
        }
        None
    }

    #[inline]
    fn refresh_count(&mut self, idx: usize) {
        let node = &self.nodes[idx];
        let count = node.bucket.len() + self.count_of(node.left) + self.count_of(node.right);
        self.nodes[idx].count = count;
    }

    fn refresh_counts_upward(&mut self, mut cursor: Option<usize>) {
        while let Some(idx) = cursor {
            self.refresh_count(idx);
            cursor = self.nodes[idx].parent;
        }
    }

    /// Point `parent`'s link to `old` (or the root) at `new`.
    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: Option<usize>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                if self.nodes[p].left == Some(old) {
                    self.nodes[p].left = new;
                } else {
                    self.nodes[p].right = new;
                }
            }
        }
    }

    fn rotate_left(&mut self, x: usize) {
        let y = self.nodes[x].right.expect("rotate_left needs a right child");
        let y_left = self.nodes[y].left;

        self.nodes[x].right = y_left;
        if let Some(yl) = y_left {
            self.nodes[yl].parent = Some(x);
        }

        let x_parent = self.nodes[x].parent;
        self.nodes[y].parent = x_parent;
        self.replace_child(x_parent, x, Some(y));

        self.nodes[y].left = Some(x);
        self.nodes[x].parent = Some(y);

        self.nodes[y].count = self.nodes[x].count;
        self.refresh_count(x);
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self.nodes[x].left.expect("rotate_right needs a left child");
        let y_right = self.nodes[y].right;

        self.nodes[x].left = y_right;
        if let Some(yr) = y_right {
            self.nodes[yr].parent = Some(x);
        }

        let x_parent = self.nodes[x].parent;
        self.nodes[y].parent = x_parent;
        self.replace_child(x_parent, x, Some(y));

        self.nodes[y].right = Some(x);
        self.nodes[x].parent = Some(y);

        self.nodes[y].count = self.nodes[x].count;
        self.refresh_count(x);
    }

    fn insert_fixup(&mut self, mut z: usize) {
        while let Some(p) = self.nodes[z].parent {
            if !self.nodes[p].red {
                break;
            }
            let g = self.nodes[p].parent.expect("red node is never the root");

            if self.nodes[g].left == Some(p) {
                let uncle = self.nodes[g].right;
                if self.is_red(uncle) {
                    self.nodes[p].red = false;
                    self.set_black(uncle);
                    self.nodes[g].red = true;
                    z = g;
                } else {
                    let mut parent = p;
                    if self.nodes[p].right == Some(z) {
                        z = p;
                        self.rotate_left(z);
                        parent = self.nodes[z].parent.expect("rotated node has a parent");
                    }
                    self.nodes[parent].red = false;
                    self.nodes[g].red = true;
                    self.rotate_right(g);
                }
            } else {
                let uncle = self.nodes[g].left;
                if self.is_red(uncle) {
                    self.nodes[p].red = false;
                    self.set_black(uncle);
                    self.nodes[g].red = true;
                    z = g;
                } else {
                    let mut parent = p;
                    if self.nodes[p].left == Some(z) {
                        z = p;
                        self.rotate_right(z);
                        parent = self.nodes[z].parent.expect("rotated node has a parent");
                    }
                    self.nodes[parent].red = false;
                    self.nodes[g].red = true;
                    self.rotate_left(g);
                }
            }
        }

        let root = self.root;
        self.set_black(root);
    }

    /// Replace the subtree rooted at `u` with the one rooted at `v`.
    fn transplant(&mut self, u: usize, v: Option<usize>) {
        let parent = self.nodes[u].parent;
        self.replace_child(parent, u, v);
        if let Some(v) = v {
            self.nodes[v].parent = parent;
        }
    }

    fn delete_node(&mut self, z: usize) {
        let z_left = self.nodes[z].left;
        let z_right = self.nodes[z].right;
        let mut removed_red = self.nodes[z].red;

        // `x` moves into the vacated position; `x_parent` tracks its parent
        // even when `x` is a nil leaf.
        let (x, x_parent) = match (z_left, z_right) {
            (None, _) => {
                let parent = self.nodes[z].parent;
                self.transplant(z, z_right);
                (z_right, parent)
            }
            (_, None) => {
                let parent = self.nodes[z].parent;
                self.transplant(z, z_left);
                (z_left, parent)
            }
            (Some(l), Some(r)) => {
                let y = self.minimum(r);
                removed_red = self.nodes[y].red;
                let x = self.nodes[y].right;

                let x_parent = if self.nodes[y].parent == Some(z) {
                    Some(y)
                } else {
                    let parent = self.nodes[y].parent;
                    self.transplant(y, x);
                    self.nodes[y].right = Some(r);
                    self.nodes[r].parent = Some(y);
                    parent
                };

                self.transplant(z, Some(y));
                self.nodes[y].left = Some(l);
                self.nodes[l].parent = Some(y);
                self.nodes[y].red = self.nodes[z].red;

                (x, x_parent)
            }
        };

        self.nodes.remove(z);
        self.refresh_counts_upward(x_parent);

        if !removed_red {
            self.delete_fixup(x, x_parent);
        }
    }

    fn delete_fixup(&mut self, mut x: Option<usize>, mut parent: Option<usize>) {
        while x != self.root && !self.is_red(x) {
            let Some(p) = parent else {
                break;
            };

            if self.nodes[p].left == x {
                let mut w = self.nodes[p].right.expect("sibling of a doubly black node");
                if self.nodes[w].red {
                    self.nodes[w].red = false;
                    self.nodes[p].red = true;
                    self.rotate_left(p);
                    w = self.nodes[p].right.expect("sibling of a doubly black node");
                }
                if !self.is_red(self.nodes[w].left) && !self.is_red(self.nodes[w].right) {
                    self.nodes[w].red = true;
                    x = Some(p);
                    parent = self.nodes[p].parent;
                } else {
                    if !self.is_red(self.nodes[w].right) {
                        let w_left = self.nodes[w].left;
                        self.set_black(w_left);
                        self.nodes[w].red = true;
                        self.rotate_right(w);
                        w = self.nodes[p].right.expect("sibling of a doubly black node");
                    }
                    self.nodes[w].red = self.nodes[p].red;
                    self.nodes[p].red = false;
                    let w_right = self.nodes[w].right;
                    self.set_black(w_right);
                    self.rotate_left(p);
                    x = self.root;
                    parent = None;
                }
            } else {
                let mut w = self.nodes[p].left.expect("sibling of a doubly black node");
                if self.nodes[w].red {
                    self.nodes[w].red = false;
                    self.nodes[p].red = true;
                    self.rotate_right(p);
                    w = self.nodes[p].left.expect("sibling of a doubly black node");
                }
                if !self.is_red(self.nodes[w].right) && !self.is_red(self.nodes[w].left) {
                    self.nodes[w].red = true;
                    x = Some(p);
                    parent = self.nodes[p].parent;
                } else {
                    if !self.is_red(self.nodes[w].left) {
                        let w_right = self.nodes[w].right;
                        self.set_black(w_right);
                        self.nodes[w].red = true;
                        self.rotate_left(w);
                        w = self.nodes[p].left.expect("sibling of a doubly black node");
                    }
                    self.nodes[w].red = self.nodes[p].red;
                    self.nodes[p].red = false;
                    let w_left = self.nodes[w].left;
                    self.set_black(w_left);
                    self.rotate_right(p);
                    x = self.root;
                    parent = None;
                }
            }
        }

        self.set_black(x);
    }
}

/// Descending iterator returned by [`OrderStatisticTree::iter_desc`].
pub struct DescIter<'a, M> {
    tree: &'a OrderStatisticTree<M>,
    node: Option<usize>,
    pos: usize,
}

impl<'a, M: Copy + Eq> Iterator for DescIter<'a, M> {
    type Item = (Score, M);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(idx) = self.node {
            let node = &self.tree.nodes[idx];
            if let Some(member) = node.bucket.get(self.pos) {
                self.pos += 1;
                return Some((node.key, *member));
            }
            self.node = self.tree.predecessor(idx);
            self.pos = 0;
        }
        None
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
