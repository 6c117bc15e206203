//! Opaque identifiers used across the engine.
//!
//! Records are owned by the registry and addressed by id; trees and
//! virtual clusters only ever hold these small `Copy` handles.

use std::fmt;

/// A 20-byte account address (node operator, vault or collaborator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Build an address whose last 8 bytes hold `n` (big-endian).
    ///
    /// Handy for tests and demos where readable addresses matter more
    /// than realistic ones.
    ///
    /// # Example
    ///
    /// ```
    /// use dv_auction::types::Address;
    ///
    /// let a = Address::from_low_u64(1);
    /// assert_eq!(a.to_string(), "0x0000000000000000000000000000000000000001");
    /// ```
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Address(bytes)
    }

    /// Raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-padded 32-byte word, the form used in SSZ snapshots.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Handle of a bid inside the registry.
///
/// Assigned sequentially starting at 1 and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BidId(pub u64);

impl fmt::Display for BidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bid#{}", self.0)
    }
}

/// 32-byte cluster identifier (SHA-256 of the cluster preimage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ClusterId(pub [u8; 32]);

impl ClusterId {
    /// Hex string without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
