//! FIFO bucket of members sharing one score.
//!
//! ## Queue Structure
//!
//! ```text
//! front (earliest) -> member2 -> member3 -> back (latest)
//! ```
//!
//! - New members are appended at the back
//! - Selection reads from the front
//! - Removal anywhere keeps the relative order of the others and reports
//!   the position the member held, so it can be put back exactly there

use std::collections::VecDeque;

/// Members inserted under the same key, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket<M> {
    members: VecDeque<M>,
}

impl<M: Copy + Eq> Bucket<M> {
    /// A bucket holding a single member.
    pub fn with_member(member: M) -> Self {
        let mut members = VecDeque::with_capacity(1);
        members.push_back(member);
        Self { members }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: &M) -> bool {
        self.members.contains(member)
    }

    /// Append a member at the back of the queue.
    pub fn push_back(&mut self, member: M) {
        self.members.push_back(member);
    }

    /// Put a member at queue position `index`, clamped to the back.
    pub fn insert(&mut self, index: usize, member: M) {
        let index = index.min(self.members.len());
        self.members.insert(index, member);
    }

    /// Remove a member, keeping the order of the rest.
    ///
    /// # Returns
    ///
    /// The position the member held, or `None` if it was not in the bucket.
    pub fn remove(&mut self, member: &M) -> Option<usize> {
        let pos = self.members.iter().position(|m| m == member)?;
        self.members.remove(pos);
        Some(pos)
    }

    /// Earliest inserted member.
    #[inline]
    pub fn front(&self) -> Option<&M> {
        self.members.front()
    }

    /// Member at queue position `index` (0 = earliest).
    #[inline]
    pub fn get(&self, index: usize) -> Option<&M> {
        self.members.get(index)
    }

    /// Members, earliest first.
    pub fn iter(&self) -> impl Iterator<Item = &M> + '_ {
        self.members.iter()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
