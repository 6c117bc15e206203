//! Escrow collaborator: custody of bid funds.
//!
//! ## Contract
//!
//! The engine issues at most one escrow call per operation, always as the
//! last step, after its own state is final. An implementation must apply
//! a call entirely or not at all; the engine rolls back its own state when
//! the call fails.
//!
//! `attached` is the value the caller sent with the operation. The escrow
//! keeps what the call asks for and returns the rest to the caller.

use std::collections::HashMap;

use thiserror::Error;

use crate::engine::GuardHandle;
use crate::types::{Address, Wei};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("attached value {attached} below required {required}")]
    InsufficientValue { required: Wei, attached: Wei },

    #[error("custody of {node_op} is {available} wei, cannot move {requested}")]
    InsufficientCustody {
        node_op: Address,
        available: Wei,
        requested: Wei,
    },

    #[error("balance overflow")]
    Overflow,

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Custody of bid prices and bonds.
pub trait EscrowGateway {
    /// Hold `amount` for `node_op`, returning `attached - amount` to them.
    fn deposit(&mut self, node_op: Address, amount: Wei, attached: Wei)
        -> Result<(), TransferError>;

    /// Return `amount` from custody plus the `attached` value to `node_op`.
    fn refund(&mut self, node_op: Address, amount: Wei, attached: Wei)
        -> Result<(), TransferError>;

    /// Move funds held for several operators to `vault` in one batch.
    fn release(&mut self, from: &[(Address, Wei)], vault: Address) -> Result<(), TransferError>;
}

/// Ledger-only escrow used by tests, benchmarks and the demo binary.
#[derive(Debug, Default)]
pub struct InMemoryEscrow {
    /// Funds held per operator
    custody: HashMap<Address, Wei>,
    /// Cumulative amounts sent out per recipient
    payouts: HashMap<Address, Wei>,
    transfers: usize,
    fail_next: Option<String>,
    guard: Option<GuardHandle>,
    unguarded_calls: usize,
}

impl InMemoryEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every call made while `guard` is not held.
    pub fn watch_guard(&mut self, guard: GuardHandle) {
        self.guard = Some(guard);
    }

    /// Make the next call fail with `reason`.
    pub fn fail_next(&mut self, reason: impl Into<String>) {
        self.fail_next = Some(reason.into());
    }

    pub fn custody_of(&self, node_op: &Address) -> Wei {
        self.custody.get(node_op).copied().unwrap_or(0)
    }

    pub fn total_custody(&self) -> Wei {
        self.custody.values().sum()
    }

    pub fn paid_to(&self, recipient: &Address) -> Wei {
        self.payouts.get(recipient).copied().unwrap_or(0)
    }

    /// Successful calls so far.
    pub fn transfer_count(&self) -> usize {
        self.transfers
    }

    /// Calls made without the engine's lock held.
    pub fn unguarded_calls(&self) -> usize {
        self.unguarded_calls
    }

    fn begin(&mut self) -> Result<(), TransferError> {
        if let Some(guard) = &self.guard {
            if !guard.is_locked() {
                self.unguarded_calls += 1;
            }
        }
        match self.fail_next.take() {
            Some(reason) => Err(TransferError::Rejected(reason)),
            None => Ok(()),
        }
    }

    fn pay(&mut self, recipient: Address, amount: Wei) -> Result<(), TransferError> {
        if amount == 0 {
            return Ok(());
        }
        let paid = self.payouts.entry(recipient).or_insert(0);
        *paid = paid.checked_add(amount).ok_or(TransferError::Overflow)?;
        Ok(())
    }
}

impl EscrowGateway for InMemoryEscrow {
    fn deposit(&mut self, node_op: Address, amount: Wei, attached: Wei) -> Result<(), TransferError> {
        self.begin()?;

        let change = attached
            .checked_sub(amount)
            .ok_or(TransferError::InsufficientValue {
                required: amount,
                attached,
            })?;
        let held = self
            .custody_of(&node_op)
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;

        self.pay(node_op, change)?;
        self.custody.insert(node_op, held);
        self.transfers += 1;
        Ok(())
    }

    fn refund(&mut self, node_op: Address, amount: Wei, attached: Wei) -> Result<(), TransferError> {
        self.begin()?;

        let available = self.custody_of(&node_op);
        let remaining = available
            .checked_sub(amount)
            .ok_or(TransferError::InsufficientCustody {
                node_op,
                available,
                requested: amount,
            })?;
        let total = amount.checked_add(attached).ok_or(TransferError::Overflow)?;

        self.pay(node_op, total)?;
        self.custody.insert(node_op, remaining);
        self.transfers += 1;
        Ok(())
    }

    fn release(&mut self, from: &[(Address, Wei)], vault: Address) -> Result<(), TransferError> {
        self.begin()?;

        // Validate the whole batch before touching any balance
        let mut debits: HashMap<Address, Wei> = HashMap::new();
        let mut total: Wei = 0;
        for (node_op, amount) in from {
            let debit = debits.entry(*node_op).or_insert(0);
            *debit = debit.checked_add(*amount).ok_or(TransferError::Overflow)?;
            total = total.checked_add(*amount).ok_or(TransferError::Overflow)?;
        }
        for (node_op, debit) in &debits {
            let available = self.custody_of(node_op);
            if available < *debit {
                return Err(TransferError::InsufficientCustody {
                    node_op: *node_op,
                    available,
                    requested: *debit,
                });
            }
        }

        self.pay(vault, total)?;
        for (node_op, debit) in debits {
            let held = self.custody_of(&node_op) - debit;
            self.custody.insert(node_op, held);
        }
        self.transfers += 1;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReentrancyGuard;

    fn op(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[test]
    fn test_escrow_deposit_returns_change() {
        let mut escrow = InMemoryEscrow::new();
        escrow.deposit(op(1), 70, 100).unwrap();

        assert_eq!(escrow.custody_of(&op(1)), 70);
        assert_eq!(escrow.paid_to(&op(1)), 30);
        assert_eq!(escrow.transfer_count(), 1);
    }

    #[test]
    fn test_escrow_deposit_insufficient_value() {
        let mut escrow = InMemoryEscrow::new();
        let err = escrow.deposit(op(1), 70, 69).unwrap_err();

        assert_eq!(
            err,
            TransferError::InsufficientValue {
                required: 70,
                attached: 69
            }
        );
        assert_eq!(escrow.total_custody(), 0);
        assert_eq!(escrow.transfer_count(), 0);
    }

    #[test]
    fn test_escrow_refund() {
        let mut escrow = InMemoryEscrow::new();
        escrow.deposit(op(1), 100, 100).unwrap();
        escrow.refund(op(1), 40, 5).unwrap();

        assert_eq!(escrow.custody_of(&op(1)), 60);
        assert_eq!(escrow.paid_to(&op(1)), 45);

        assert!(matches!(
            escrow.refund(op(1), 61, 0),
            Err(TransferError::InsufficientCustody { available: 60, .. })
        ));
    }

    #[test]
    fn test_escrow_release_batch_is_atomic() {
        let mut escrow = InMemoryEscrow::new();
        escrow.deposit(op(1), 50, 50).unwrap();
        escrow.deposit(op(2), 10, 10).unwrap();

        // Second leg overdraws: nothing moves
        let err = escrow.release(&[(op(1), 50), (op(2), 20)], op(100));
        assert!(err.is_err());
        assert_eq!(escrow.custody_of(&op(1)), 50);
        assert_eq!(escrow.paid_to(&op(100)), 0);

        escrow.release(&[(op(1), 50), (op(2), 10)], op(100)).unwrap();
        assert_eq!(escrow.total_custody(), 0);
        assert_eq!(escrow.paid_to(&op(100)), 60);
    }

    #[test]
    fn test_escrow_fail_next() {
        let mut escrow = InMemoryEscrow::new();
        escrow.fail_next("offline");

        assert_eq!(
            escrow.deposit(op(1), 1, 1),
            Err(TransferError::Rejected("offline".into()))
        );
        assert_eq!(escrow.total_custody(), 0);
        assert!(escrow.deposit(op(1), 1, 1).is_ok());
    }

    #[test]
    fn test_escrow_counts_unguarded_calls() {
        let guard = ReentrancyGuard::new();
        let mut escrow = InMemoryEscrow::new();
        escrow.watch_guard(guard.handle());

        escrow.deposit(op(1), 1, 1).unwrap();
        assert_eq!(escrow.unguarded_calls(), 1);

        let _token = guard.enter().unwrap();
        escrow.deposit(op(1), 1, 1).unwrap();
        assert_eq!(escrow.unguarded_calls(), 1);
    }
}
