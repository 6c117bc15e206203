//! Node operator profiles.

use crate::types::{Address, AuctionType};

/// Everything the registry tracks about a node operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOperatorProfile {
    pub address: Address,

    pub whitelisted: bool,

    /// Multiplier applied to the auction score
    pub reputation: u32,

    /// Pending bids that carry a bond
    pub bonds_outstanding: u32,

    /// Pending bids in the size-4 sub-auction
    pub dv4_bids: u32,

    /// Pending bids in the size-7 sub-auction
    pub dv7_bids: u32,
}

impl NodeOperatorProfile {
    pub fn new(address: Address, reputation: u32) -> Self {
        Self {
            address,
            whitelisted: false,
            reputation,
            bonds_outstanding: 0,
            dv4_bids: 0,
            dv7_bids: 0,
        }
    }

    /// Pending bid count for one sub-auction.
    pub fn bids_in(&self, auction_type: AuctionType) -> u32 {
        match auction_type {
            AuctionType::Dv4 => self.dv4_bids,
            AuctionType::Dv7 => self.dv7_bids,
        }
    }

    pub fn bids_in_mut(&mut self, auction_type: AuctionType) -> &mut u32 {
        match auction_type {
            AuctionType::Dv4 => &mut self.dv4_bids,
            AuctionType::Dv7 => &mut self.dv7_bids,
        }
    }

    /// Pending bids across both sub-auctions.
    pub fn total_bids(&self) -> u32 {
        self.dv4_bids.saturating_add(self.dv7_bids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_counters() {
        let mut profile = NodeOperatorProfile::new(Address::from_low_u64(1), 1);
        assert!(!profile.whitelisted);
        assert_eq!(profile.total_bids(), 0);

        *profile.bids_in_mut(AuctionType::Dv4) += 2;
        *profile.bids_in_mut(AuctionType::Dv7) += 1;

        assert_eq!(profile.bids_in(AuctionType::Dv4), 2);
        assert_eq!(profile.bids_in(AuctionType::Dv7), 1);
        assert_eq!(profile.total_bids(), 3);
    }
}
