//! The auction engine: one owner for registry, trees and escrow.
//!
//! ## Operation model
//!
//! Every mutating entry point runs as one transaction:
//!
//! 1. take the reentrancy lock (or fail with `Reentrancy`)
//! 2. note the event log length and the config
//! 3. validate, mutate registry and trees, append events
//! 4. issue at most one escrow call
//! 5. on success commit the registry and auction journals; on any error
//!    replay them in reverse, truncate the events and restore the config
//!
//! The journals hold only what the call touched, so undoing a call costs
//! about as much as the call did. Because the escrow call is the last step
//! and applies atomically, a failed operation leaves neither the engine nor
//! the escrow changed.
//!
//! ## Example
//!
//! ```
//! use dv_auction::config::{AuctionConfig, Roles};
//! use dv_auction::engine::{AuctionEngine, CallContext, InMemoryEscrow};
//! use dv_auction::types::Address;
//!
//! let roles = Roles {
//!     owner: Address::from_low_u64(1),
//!     vault_manager: Address::from_low_u64(2),
//!     rewards: Address::from_low_u64(3),
//! };
//! let mut engine =
//!     AuctionEngine::new(AuctionConfig::default(), roles, InMemoryEscrow::new()).unwrap();
//!
//! let owner = CallContext::new(roles.owner);
//! let op = Address::from_low_u64(10);
//! engine.add_to_whitelist(&owner, op).unwrap();
//!
//! let price = engine.get_price_to_pay(&op, 0, 30, 4).unwrap();
//! assert_eq!(price, 7_500_000_000_000_000);
//!
//! let bid_id = engine.bid(&CallContext::new(op).with_value(price), 0, 30, 4).unwrap();
//! assert!(engine.bid_record(bid_id).unwrap().is_pending());
//! ```

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::auction::{AuctionBook, EntrySource, MainAuction, SubAuction, VirtualCluster};
use crate::config::{AuctionConfig, ConfigError, Roles};
use crate::engine::{EngineError, EscrowGateway, GuardHandle, Registry, ReentrancyGuard};
use crate::score::{self, Score, ScoreError};
use crate::types::{
    Address, AuctionEvent, AuctionType, Bid, BidId, BidSnapshot, BidStatus, Cluster, ClusterId,
    ClusterMember, ClusterSnapshot, ClusterStatus, NodeOperatorProfile, Wei,
};

/// Length of a BLS12-381 validator public key.
pub const PUBKEY_LENGTH: usize = 48;

// ============================================================================
// Call context and results
// ============================================================================

/// Who is calling, with how much value, at what time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub sender: Address,
    /// Wei attached to the call
    pub value: Wei,
    /// Seconds; mixed into derived cluster ids
    pub timestamp: u64,
}

impl CallContext {
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            value: 0,
            timestamp: 0,
        }
    }

    pub fn with_value(mut self, value: Wei) -> Self {
        self.value = value;
        self
    }

    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Escrow movement caused by a bid update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDelta {
    /// The operator owes this much more
    Pay(Wei),
    /// The operator gets this much back
    Refund(Wei),
    Unchanged,
}

impl PriceDelta {
    fn between(old_price: Wei, new_price: Wei) -> Self {
        if new_price > old_price {
            PriceDelta::Pay(new_price - old_price)
        } else if new_price < old_price {
            PriceDelta::Refund(old_price - new_price)
        } else {
            PriceDelta::Unchanged
        }
    }
}

/// What the next draw would return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinnerPreview {
    pub cluster_id: ClusterId,
    pub average_score: Score,
    pub source: EntrySource,
}

/// Derived price and score of a bid's terms.
#[derive(Debug, Clone, Copy)]
struct Quote {
    daily_price: Wei,
    price: Wei,
    score: Score,
}

// ============================================================================
// Engine state
// ============================================================================

/// Everything an operation may change.
#[derive(Debug)]
struct EngineState {
    config: AuctionConfig,
    roles: Roles,
    registry: Registry,
    book: AuctionBook,
    events: Vec<AuctionEvent>,
}

impl EngineState {
    fn emit(&mut self, event: AuctionEvent) {
        debug!(event = event.name(), "event");
        self.events.push(event);
    }

    fn require_owner(&self, sender: Address) -> Result<(), EngineError> {
        if sender != self.roles.owner {
            return Err(EngineError::NotOwner(sender));
        }
        Ok(())
    }

    fn check_terms(&self, discount_rate: u16, duration_days: u32) -> Result<(), EngineError> {
        if discount_rate > self.config.max_discount_rate {
            return Err(EngineError::DiscountRateTooHigh {
                rate: discount_rate,
                max: self.config.max_discount_rate,
            });
        }
        if duration_days < self.config.min_duration_days {
            return Err(EngineError::DurationTooShort {
                days: duration_days,
                min: self.config.min_duration_days,
            });
        }
        Ok(())
    }

    /// Bond a new bid of `profile` must carry.
    fn bond_for(&self, profile: &NodeOperatorProfile) -> Result<Wei, EngineError> {
        if profile.whitelisted {
            Ok(0)
        } else if self.config.bond_amount == 0 {
            Err(EngineError::NotWhitelisted(profile.address))
        } else {
            Ok(self.config.bond_amount)
        }
    }

    fn quote(
        &self,
        profile: &NodeOperatorProfile,
        discount_rate: u16,
        duration_days: u32,
        auction_type: AuctionType,
    ) -> Result<Quote, EngineError> {
        self.check_terms(discount_rate, duration_days)?;

        let daily_price = score::daily_credit_price(
            self.config.expected_daily_return,
            discount_rate,
            auction_type.cluster_size(),
        )?;
        let price = score::bid_price(duration_days, daily_price)?;
        let score = score::auction_score(daily_price, duration_days, profile.reputation)?;

        Ok(Quote {
            daily_price,
            price,
            score,
        })
    }

    /// A pending bid owned by `sender`.
    fn pending_bid_of(&self, sender: Address, bid_id: BidId) -> Result<Bid, EngineError> {
        let bid = self
            .registry
            .bid(bid_id)
            .ok_or(EngineError::BidNotFound(bid_id))?;
        if bid.node_op != sender {
            return Err(EngineError::SenderNotBidder {
                caller: sender,
                bid_id,
            });
        }
        if !bid.is_pending() {
            return Err(EngineError::BidNotPending(bid_id));
        }
        Ok(bid.clone())
    }

    /// A cluster whose vault is `sender`.
    fn cluster_of_vault(&self, sender: Address, cluster_id: ClusterId) -> Result<&Cluster, EngineError> {
        let cluster = self
            .registry
            .cluster(&cluster_id)
            .ok_or(EngineError::ClusterNotFound(cluster_id))?;
        if cluster.vault != sender {
            return Err(EngineError::NotClusterVault {
                caller: sender,
                cluster_id,
            });
        }
        Ok(cluster)
    }

    /// Undo the per-operator counters of a bid leaving its sub-auction.
    fn release_profile_slot(&mut self, bid: &Bid) {
        let profile = self.registry.profile_mut(bid.node_op);
        let slot = profile.bids_in_mut(bid.auction_type);
        *slot = slot.saturating_sub(1);
        if bid.bond > 0 {
            profile.bonds_outstanding = profile.bonds_outstanding.saturating_sub(1);
        }
        self.registry.prune_profile(&bid.node_op);
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Two-tier auction engine over an escrow collaborator `E`.
#[derive(Debug)]
pub struct AuctionEngine<E> {
    state: EngineState,
    escrow: E,
    guard: ReentrancyGuard,
}

impl<E: EscrowGateway> AuctionEngine<E> {
    /// Create an engine; fails if `config` is invalid.
    pub fn new(config: AuctionConfig, roles: Roles, escrow: E) -> Result<Self, EngineError> {
        config.validate()?;

        let state = EngineState {
            registry: Registry::new(config.default_reputation),
            config,
            roles,
            book: AuctionBook::new(),
            events: Vec::new(),
        };

        Ok(Self {
            state,
            escrow,
            guard: ReentrancyGuard::new(),
        })
    }

    /// Run `op` atomically under the reentrancy lock.
    ///
    /// # Errors
    ///
    /// `Reentrancy` if another entry point holds the lock, otherwise
    /// whatever `op` returns. On error every registry, tree, config and
    /// event change `op` made is undone.
    fn transact<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut EngineState, &mut E) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let _token = self.guard.enter().ok_or(EngineError::Reentrancy)?;
        let events_len = self.state.events.len();
        let config = self.state.config.clone();

        match op(&mut self.state, &mut self.escrow) {
            Ok(value) => {
                self.state.registry.commit();
                self.state.book.commit();
                Ok(value)
            }
            Err(err) => {
                warn!(op = name, error = %err, kind = ?err.kind(), "operation rolled back");
                self.state.book.rollback();
                self.state.registry.rollback();
                self.state.events.truncate(events_len);
                self.state.config = config;
                Err(err)
            }
        }
    }

    // ========================================================================
    // Bids
    // ========================================================================

    /// Place a bid in the sub-auction `auction_type` (4 or 7).
    ///
    /// The attached value must cover the bid price plus the bond of a
    /// non-whitelisted operator; any excess is returned.
    ///
    /// # Errors
    ///
    /// `InvalidAuctionType`, `NotWhitelisted`, `DiscountRateTooHigh`,
    /// `DurationTooShort`, `NotEnoughEtherSent`, or a transfer error.
    pub fn bid(
        &mut self,
        ctx: &CallContext,
        discount_rate: u16,
        duration_days: u32,
        auction_type: u8,
    ) -> Result<BidId, EngineError> {
        self.transact("bid", |state, escrow| {
            let auction_type = AuctionType::try_from(auction_type)?;
            let sender = ctx.sender;

            let profile = state.registry.profile(&sender);
            let bond = state.bond_for(&profile)?;
            let quote = state.quote(&profile, discount_rate, duration_days, auction_type)?;

            let required = quote
                .price
                .checked_add(bond)
                .ok_or(ScoreError::Overflow("bid escrow"))?;
            if ctx.value < required {
                return Err(EngineError::NotEnoughEtherSent {
                    required,
                    sent: ctx.value,
                });
            }

            let bid_id = state.registry.insert_bid(Bid {
                id: BidId::default(),
                node_op: sender,
                discount_rate,
                duration_days,
                auction_type,
                daily_price: quote.daily_price,
                score: quote.score,
                bond,
                consumed_credits: 0,
                cluster_id: None,
                status: BidStatus::Pending,
            });

            let profile = state.registry.profile_mut(sender);
            *profile.bids_in_mut(auction_type) += 1;
            if bond > 0 {
                profile.bonds_outstanding += 1;
            }

            state.book.insert_bid(
                auction_type,
                quote.score,
                ClusterMember {
                    bid_id,
                    node_op: sender,
                },
            )?;
            state.book.refresh(auction_type, ctx.timestamp)?;

            state.emit(AuctionEvent::BidPlaced {
                node_op: sender,
                bid_id,
                auction_type,
                discount_rate,
                duration_days,
                bid_price: quote.price,
                score: quote.score,
            });
            info!(
                %bid_id,
                node_op = %sender,
                ?auction_type,
                score = quote.score,
                price = quote.price,
                bond,
                "bid placed"
            );

            escrow.deposit(sender, required, ctx.value)?;
            Ok(bid_id)
        })
    }

    /// Change the terms of a pending bid.
    ///
    /// A higher price must be covered by the attached value; a lower one is
    /// refunded. The bid re-enters its sub-auction behind earlier bids of
    /// the same score.
    ///
    /// # Returns
    ///
    /// The escrow movement the update caused.
    ///
    /// # Errors
    ///
    /// `BidNotFound`, `SenderNotBidder`, `BidNotPending`, the term checks of
    /// [`bid`](Self::bid), `NotEnoughEtherSent`, or a transfer error.
    pub fn update_bid(
        &mut self,
        ctx: &CallContext,
        bid_id: BidId,
        discount_rate: u16,
        duration_days: u32,
    ) -> Result<PriceDelta, EngineError> {
        self.transact("update_bid", |state, escrow| {
            let sender = ctx.sender;
            let bid = state.pending_bid_of(sender, bid_id)?;

            let profile = state.registry.profile(&sender);
            let quote = state.quote(&profile, discount_rate, duration_days, bid.auction_type)?;
            let delta = PriceDelta::between(bid.price(), quote.price);

            if let PriceDelta::Pay(owed) = delta {
                if ctx.value < owed {
                    return Err(EngineError::NotEnoughEtherSent {
                        required: owed,
                        sent: ctx.value,
                    });
                }
            }

            let member = ClusterMember {
                bid_id,
                node_op: sender,
            };
            state.book.remove_bid(bid.auction_type, bid.score, member)?;
            state.book.insert_bid(bid.auction_type, quote.score, member)?;
            state.book.refresh(bid.auction_type, ctx.timestamp)?;

            let record = state
                .registry
                .bid_mut(bid_id)
                .ok_or(EngineError::BidNotFound(bid_id))?;
            record.discount_rate = discount_rate;
            record.duration_days = duration_days;
            record.daily_price = quote.daily_price;
            record.score = quote.score;

            state.emit(AuctionEvent::BidUpdated {
                node_op: sender,
                bid_id,
                discount_rate,
                duration_days,
                bid_price: quote.price,
                score: quote.score,
            });
            info!(%bid_id, old_score = bid.score, new_score = quote.score, ?delta, "bid updated");

            match delta {
                PriceDelta::Pay(owed) => escrow.deposit(sender, owed, ctx.value)?,
                PriceDelta::Refund(amount) => escrow.refund(sender, amount, ctx.value)?,
                PriceDelta::Unchanged if ctx.value > 0 => escrow.refund(sender, 0, ctx.value)?,
                PriceDelta::Unchanged => {}
            }
            Ok(delta)
        })
    }

    /// Withdraw a pending bid; refunds its price and bond.
    ///
    /// The record stays in the registry with status `Withdrawn` and its
    /// price, bond and score zeroed, so a second withdrawal fails.
    ///
    /// # Returns
    ///
    /// The refunded amount (price plus bond).
    ///
    /// # Errors
    ///
    /// `BidNotFound`, `SenderNotBidder`, `BidNotPending` (won or already
    /// withdrawn), or a transfer error.
    pub fn withdraw_bid(&mut self, ctx: &CallContext, bid_id: BidId) -> Result<Wei, EngineError> {
        self.transact("withdraw_bid", |state, escrow| {
            let sender = ctx.sender;
            let bid = state.pending_bid_of(sender, bid_id)?;

            state.book.remove_bid(
                bid.auction_type,
                bid.score,
                ClusterMember {
                    bid_id,
                    node_op: sender,
                },
            )?;
            state.book.refresh(bid.auction_type, ctx.timestamp)?;

            let record = state
                .registry
                .bid_mut(bid_id)
                .ok_or(EngineError::BidNotFound(bid_id))?;
            record.status = BidStatus::Withdrawn;
            record.daily_price = 0;
            record.bond = 0;
            record.score = 0;
            state.release_profile_slot(&bid);

            let refunded = bid.escrowed();
            state.emit(AuctionEvent::BidWithdrawn {
                node_op: sender,
                bid_id,
                refunded,
            });
            info!(%bid_id, node_op = %sender, refunded, "bid withdrawn");

            escrow.refund(sender, refunded, ctx.value)?;
            Ok(refunded)
        })
    }

    // ========================================================================
    // Draw
    // ========================================================================

    /// Draw the main-auction winner for the calling vault.
    ///
    /// A virtual winner becomes a new cluster: its bids are marked won,
    /// their escrowed funds go to the vault and the owning sub-auction
    /// queues its next best combination. A pending winner is simply handed
    /// to the new vault.
    ///
    /// # Returns
    ///
    /// Id of the drawn cluster.
    ///
    /// # Errors
    ///
    /// `NotVaultManager` unless the sender is the vault manager or a
    /// registered vault, `MainAuctionEmpty`, or a transfer error.
    pub fn trigger_auction(&mut self, ctx: &CallContext) -> Result<ClusterId, EngineError> {
        self.transact("trigger_auction", |state, escrow| {
            let vault = ctx.sender;
            if vault != state.roles.vault_manager && !state.registry.is_vault(&vault) {
                return Err(EngineError::NotVaultManager(vault));
            }

            let (average_score, entry) = state
                .book
                .pop_winner()?
                .ok_or(EngineError::MainAuctionEmpty)?;
            let cluster_id = entry.cluster_id;

            match entry.source {
                EntrySource::Virtual(auction_type) => {
                    let winner: VirtualCluster = state
                        .book
                        .take_winner(auction_type, cluster_id)?
                        .ok_or(EngineError::ClusterNotFound(cluster_id))?;

                    state.registry.insert_cluster(Cluster {
                        id: cluster_id,
                        members: winner.members(),
                        average_score,
                        pubkey_hash: None,
                        split_address: None,
                        vault,
                        status: ClusterStatus::InCreation,
                    });
                    state.emit(AuctionEvent::ClusterCreated {
                        cluster_id,
                        auction_type,
                        average_score,
                        vault,
                    });

                    let mut release = Vec::with_capacity(winner.seats.len());
                    for member in winner.members() {
                        let bid = state
                            .registry
                            .bid_mut(member.bid_id)
                            .ok_or(EngineError::BidNotFound(member.bid_id))?;
                        bid.status = BidStatus::Won;
                        bid.cluster_id = Some(cluster_id);
                        let bid = bid.clone();

                        release.push((bid.node_op, bid.escrowed()));
                        state.release_profile_slot(&bid);
                        state.emit(AuctionEvent::NodeOpJoinedCluster {
                            node_op: member.node_op,
                            bid_id: member.bid_id,
                            cluster_id,
                        });
                    }

                    state.book.refresh(auction_type, ctx.timestamp)?;
                    info!(
                        %cluster_id,
                        ?auction_type,
                        average_score,
                        %vault,
                        "cluster created"
                    );

                    escrow.release(&release, vault)?;
                }
                EntrySource::Pending => {
                    let cluster = state
                        .registry
                        .cluster_mut(&cluster_id)
                        .ok_or(EngineError::ClusterNotFound(cluster_id))?;
                    cluster.status = ClusterStatus::InCreation;
                    cluster.vault = vault;
                    let auction_type = cluster
                        .auction_type()
                        .ok_or(EngineError::ClusterNotFound(cluster_id))?;

                    state.emit(AuctionEvent::ClusterCreated {
                        cluster_id,
                        auction_type,
                        average_score,
                        vault,
                    });
                    info!(%cluster_id, average_score, %vault, "pending cluster drawn again");
                }
            }

            Ok(cluster_id)
        })
    }

    // ========================================================================
    // Cluster lifecycle (owning vault / rewards collaborator)
    // ========================================================================

    /// Move a cluster along its lifecycle.
    ///
    /// Setting `Inactive` queues the cluster back into the main auction as
    /// a pending entry at its average score.
    ///
    /// # Errors
    ///
    /// `ClusterNotFound`, `NotClusterVault`, or `InvalidStatusTransition`.
    pub fn update_cluster_status(
        &mut self,
        ctx: &CallContext,
        cluster_id: ClusterId,
        status: ClusterStatus,
    ) -> Result<(), EngineError> {
        self.transact("update_cluster_status", |state, _| {
            let cluster = state.cluster_of_vault(ctx.sender, cluster_id)?;
            let from = cluster.status;
            let average_score = cluster.average_score;

            if !from.can_transition_to(status) {
                return Err(EngineError::InvalidStatusTransition {
                    cluster_id,
                    from,
                    to: status,
                });
            }

            if let Some(cluster) = state.registry.cluster_mut(&cluster_id) {
                cluster.status = status;
            }
            if status == ClusterStatus::Inactive {
                state.book.queue_pending(average_score, cluster_id)?;
            }

            info!(%cluster_id, ?from, to = ?status, "cluster status updated");
            Ok(())
        })
    }

    /// Record the validator key of a cluster as
    /// `sha256(pubkey || 16 zero bytes)`.
    ///
    /// # Errors
    ///
    /// `ClusterNotFound`, `NotClusterVault`, or `InvalidPubKeyLength` unless
    /// `pubkey` is [`PUBKEY_LENGTH`] bytes.
    pub fn set_cluster_pubkey(
        &mut self,
        ctx: &CallContext,
        cluster_id: ClusterId,
        pubkey: &[u8],
    ) -> Result<[u8; 32], EngineError> {
        self.transact("set_cluster_pubkey", |state, _| {
            state.cluster_of_vault(ctx.sender, cluster_id)?;
            if pubkey.len() != PUBKEY_LENGTH {
                return Err(EngineError::InvalidPubKeyLength(pubkey.len()));
            }

            let hash = pubkey_hash(pubkey);
            if let Some(cluster) = state.registry.cluster_mut(&cluster_id) {
                cluster.pubkey_hash = Some(hash);
            }
            debug!(%cluster_id, pubkey_hash = %hex::encode(hash), "cluster pubkey set");
            Ok(hash)
        })
    }

    /// Record where a cluster's rewards are split.
    ///
    /// # Errors
    ///
    /// `ClusterNotFound` or `NotClusterVault`.
    pub fn set_cluster_split_address(
        &mut self,
        ctx: &CallContext,
        cluster_id: ClusterId,
        split: Address,
    ) -> Result<(), EngineError> {
        self.transact("set_cluster_split_address", |state, _| {
            state.cluster_of_vault(ctx.sender, cluster_id)?;
            if let Some(cluster) = state.registry.cluster_mut(&cluster_id) {
                cluster.split_address = Some(split);
            }
            Ok(())
        })
    }

    /// Charge `consumed` validation credits to every member bid of a cluster.
    ///
    /// # Errors
    ///
    /// `NotRewardsCollaborator`, `ClusterNotFound`, or
    /// `CreditsExceedDuration` if any member has fewer remaining credits
    /// than `consumed`; no member is charged in that case.
    pub fn update_node_vc_number(
        &mut self,
        ctx: &CallContext,
        cluster_id: ClusterId,
        consumed: u32,
    ) -> Result<(), EngineError> {
        self.transact("update_node_vc_number", |state, _| {
            if ctx.sender != state.roles.rewards {
                return Err(EngineError::NotRewardsCollaborator(ctx.sender));
            }
            let members = state
                .registry
                .cluster(&cluster_id)
                .ok_or(EngineError::ClusterNotFound(cluster_id))?
                .members
                .clone();

            for member in members {
                let bid = state
                    .registry
                    .bid_mut(member.bid_id)
                    .ok_or(EngineError::BidNotFound(member.bid_id))?;
                if consumed > bid.remaining_credits() {
                    return Err(EngineError::CreditsExceedDuration {
                        bid_id: member.bid_id,
                        total: u64::from(bid.consumed_credits) + u64::from(consumed),
                        duration_days: bid.duration_days,
                    });
                }
                bid.consumed_credits += consumed;
            }

            debug!(%cluster_id, consumed, "validation credits consumed");
            Ok(())
        })
    }

    /// Allow `vault` to draw clusters. Registering twice is a no-op.
    ///
    /// # Errors
    ///
    /// `NotVaultManager` if the sender is not the vault manager.
    pub fn register_vault(&mut self, ctx: &CallContext, vault: Address) -> Result<(), EngineError> {
        self.transact("register_vault", |state, _| {
            if ctx.sender != state.roles.vault_manager {
                return Err(EngineError::NotVaultManager(ctx.sender));
            }
            if state.registry.register_vault(vault) {
                info!(%vault, "vault registered");
            }
            Ok(())
        })
    }

    // ========================================================================
    // Admin (owner)
    // ========================================================================

    /// Let `node_op` bid without posting a bond.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Must come from the owner
    /// * `node_op` - Operator to whitelist; whitelisting twice is a no-op
    ///
    /// # Errors
    ///
    /// `NotOwner` if the sender is not the owner.
    pub fn add_to_whitelist(&mut self, ctx: &CallContext, node_op: Address) -> Result<(), EngineError> {
        self.transact("add_to_whitelist", |state, _| {
            state.require_owner(ctx.sender)?;
            state.registry.profile_mut(node_op).whitelisted = true;
            info!(%node_op, "whitelisted");
            Ok(())
        })
    }

    /// Make `node_op` post a bond on later bids.
    ///
    /// Existing bids keep their bond status. A profile left with nothing
    /// but defaults is dropped.
    ///
    /// # Errors
    ///
    /// `NotOwner` if the sender is not the owner.
    pub fn remove_from_whitelist(
        &mut self,
        ctx: &CallContext,
        node_op: Address,
    ) -> Result<(), EngineError> {
        self.transact("remove_from_whitelist", |state, _| {
            state.require_owner(ctx.sender)?;
            state.registry.profile_mut(node_op).whitelisted = false;
            state.registry.prune_profile(&node_op);
            info!(%node_op, "removed from whitelist");
            Ok(())
        })
    }

    /// Set the expected daily validator return that bid prices derive from.
    ///
    /// Existing bids keep the price they were placed or last updated at.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Must come from the owner
    /// * `daily_return` - Wei per validator per day
    ///
    /// # Errors
    ///
    /// `NotOwner` if the sender is not the owner.
    pub fn update_expected_daily_return(
        &mut self,
        ctx: &CallContext,
        daily_return: Wei,
    ) -> Result<(), EngineError> {
        self.transact("update_expected_daily_return", |state, _| {
            state.require_owner(ctx.sender)?;
            state.config.expected_daily_return = daily_return;
            info!(daily_return, "expected daily return updated");
            Ok(())
        })
    }

    /// Set the shortest commitment a bid may offer.
    ///
    /// # Errors
    ///
    /// `NotOwner` if the sender is not the owner.
    pub fn update_min_duration(&mut self, ctx: &CallContext, days: u32) -> Result<(), EngineError> {
        self.transact("update_min_duration", |state, _| {
            state.require_owner(ctx.sender)?;
            state.config.min_duration_days = days;
            info!(days, "minimum duration updated");
            Ok(())
        })
    }

    /// Set the highest discount rate a bid may offer.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Must come from the owner
    /// * `rate` - Basis points, at most 10 000
    ///
    /// # Errors
    ///
    /// `NotOwner`, or `Config(DiscountRateOutOfRange)` when `rate` exceeds
    /// 10 000; the previous rate stays in force.
    pub fn update_max_discount_rate(&mut self, ctx: &CallContext, rate: u16) -> Result<(), EngineError> {
        self.transact("update_max_discount_rate", |state, _| {
            state.require_owner(ctx.sender)?;
            let mut config = state.config.clone();
            config.max_discount_rate = rate;
            config.validate()?;
            state.config = config;
            info!(rate, "max discount rate updated");
            Ok(())
        })
    }

    /// Set the score multiplier of an operator. Applies to later bids and
    /// updates only.
    ///
    /// # Errors
    ///
    /// `NotOwner`, or `Config(ZeroReputation)` when `reputation` is zero.
    pub fn update_reputation(
        &mut self,
        ctx: &CallContext,
        node_op: Address,
        reputation: u32,
    ) -> Result<(), EngineError> {
        self.transact("update_reputation", |state, _| {
            state.require_owner(ctx.sender)?;
            if reputation == 0 {
                return Err(ConfigError::ZeroReputation.into());
            }
            state.registry.profile_mut(node_op).reputation = reputation;
            state.registry.prune_profile(&node_op);
            info!(%node_op, reputation, "reputation updated");
            Ok(())
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Amount `node_op` must attach to place a bid with these terms.
    ///
    /// # Returns
    ///
    /// Bid price plus the bond a non-whitelisted operator posts.
    ///
    /// # Errors
    ///
    /// Same validation errors as [`bid`](Self::bid), without the transfer.
    pub fn get_price_to_pay(
        &self,
        node_op: &Address,
        discount_rate: u16,
        duration_days: u32,
        auction_type: u8,
    ) -> Result<Wei, EngineError> {
        let auction_type = AuctionType::try_from(auction_type)?;
        let profile = self.state.registry.profile(node_op);
        let bond = self.state.bond_for(&profile)?;
        let quote = self
            .state
            .quote(&profile, discount_rate, duration_days, auction_type)?;

        Ok(quote
            .price
            .checked_add(bond)
            .ok_or(ScoreError::Overflow("bid escrow"))?)
    }

    /// Escrow movement an update of `bid_id` to these terms would cause.
    ///
    /// # Errors
    ///
    /// Same validation errors as [`update_bid`](Self::update_bid).
    pub fn get_update_bid_price(
        &self,
        node_op: &Address,
        bid_id: BidId,
        discount_rate: u16,
        duration_days: u32,
    ) -> Result<PriceDelta, EngineError> {
        let bid = self.state.pending_bid_of(*node_op, bid_id)?;
        let profile = self.state.registry.profile(node_op);
        let quote = self
            .state
            .quote(&profile, discount_rate, duration_days, bid.auction_type)?;

        Ok(PriceDelta::between(bid.price(), quote.price))
    }

    /// The registry record of a bid, withdrawn ones included.
    pub fn bid_record(&self, bid_id: BidId) -> Option<&Bid> {
        self.state.registry.bid(bid_id)
    }

    pub fn cluster(&self, cluster_id: &ClusterId) -> Option<&Cluster> {
        self.state.registry.cluster(cluster_id)
    }

    /// What `trigger_auction` would return right now.
    pub fn winning_cluster(&self) -> Option<WinnerPreview> {
        self.state.book.main().peek().map(|(average_score, entry)| WinnerPreview {
            cluster_id: entry.cluster_id,
            average_score,
            source: entry.source,
        })
    }

    /// The virtual cluster a sub-auction currently has in the main auction.
    pub fn virtual_cluster(&self, auction_type: AuctionType) -> Option<&VirtualCluster> {
        self.state.book.sub(auction_type).latest()
    }

    /// Read access to one sub-auction's bid tree and operator count.
    pub fn sub_auction(&self, auction_type: AuctionType) -> &SubAuction {
        self.state.book.sub(auction_type)
    }

    /// Read access to the main-auction tree.
    pub fn main_auction(&self) -> &MainAuction {
        self.state.book.main()
    }

    pub fn node_operator(&self, node_op: &Address) -> NodeOperatorProfile {
        self.state.registry.profile(node_op)
    }

    pub fn is_whitelisted(&self, node_op: &Address) -> bool {
        self.state.registry.is_whitelisted(node_op)
    }

    pub fn is_vault(&self, address: &Address) -> bool {
        self.state.registry.is_vault(address)
    }

    /// Entries waiting in the main auction.
    ///
    /// Counts both kinds: the virtual cluster of each sub-auction that has
    /// enough bids (at most two) plus every pending cluster sent back by its
    /// vault. See [`pending_cluster_count`](Self::pending_cluster_count) for
    /// the latter alone.
    pub fn num_clusters_in_main_auction(&self) -> usize {
        self.state.book.main().len()
    }

    /// Drawn clusters that went `Inactive` and wait to be drawn again.
    pub fn pending_cluster_count(&self) -> usize {
        self.state.book.pending_count()
    }

    /// Bid records in the registry, withdrawn ones included.
    pub fn bid_count(&self) -> usize {
        self.state.registry.bid_count()
    }

    pub fn cluster_count(&self) -> usize {
        self.state.registry.cluster_count()
    }

    pub fn config(&self) -> &AuctionConfig {
        &self.state.config
    }

    pub fn roles(&self) -> &Roles {
        &self.state.roles
    }

    /// Events not yet drained.
    pub fn events(&self) -> &[AuctionEvent] {
        &self.state.events
    }

    /// Drain the event log.
    pub fn take_events(&mut self) -> Vec<AuctionEvent> {
        std::mem::take(&mut self.state.events)
    }

    pub fn escrow(&self) -> &E {
        &self.escrow
    }

    pub fn escrow_mut(&mut self) -> &mut E {
        &mut self.escrow
    }

    /// Handle on the reentrancy lock, for collaborators.
    pub fn guard_handle(&self) -> GuardHandle {
        self.guard.handle()
    }

    /// SHA-256 over the SSZ encoding of every bid and cluster (by id) and
    /// the main auction size. Equal roots mean equal registries.
    pub fn state_root(&self) -> Result<[u8; 32], EngineError> {
        let mut hasher = Sha256::new();

        for bid in self.state.registry.bids_by_id() {
            let bytes = ssz_rs::serialize(&BidSnapshot::from(bid))
                .map_err(|e| EngineError::Snapshot(format!("{:?}", e)))?;
            hasher.update(&bytes);
        }
        for cluster in self.state.registry.clusters_by_id() {
            let bytes = ssz_rs::serialize(&ClusterSnapshot::from(cluster))
                .map_err(|e| EngineError::Snapshot(format!("{:?}", e)))?;
            hasher.update(&bytes);
        }
        hasher.update((self.state.book.main().len() as u64).to_be_bytes());

        let mut root = [0u8; 32];
        root.copy_from_slice(&hasher.finalize());
        Ok(root)
    }
}

/// `sha256(pubkey || 16 zero bytes)`
pub fn pubkey_hash(pubkey: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(pubkey);
    hasher.update([0u8; 16]);

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

// ============================================================================
// Unit Tests
// ============================================================================
