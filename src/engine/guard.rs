//! Non-reentrant lock around engine entry points.
//!
//! The flag is shared through an `Arc` so an escrow implementation can
//! hold a [`GuardHandle`] and check that it is only ever called while an
//! operation holds the lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lock owned by the engine.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    locked: Arc<AtomicBool>,
}

/// Proof that the lock is held; releases it on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the token is dropped"]
pub struct GuardToken {
    locked: Arc<AtomicBool>,
}

/// Read-only view of a guard.
#[derive(Debug, Clone)]
pub struct GuardHandle {
    locked: Arc<AtomicBool>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, or `None` if an operation already holds it.
    pub fn enter(&self) -> Option<GuardToken> {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardToken {
                locked: Arc::clone(&self.locked),
            })
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn handle(&self) -> GuardHandle {
        GuardHandle {
            locked: Arc::clone(&self.locked),
        }
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.locked.store(false, Ordering::Release);
    }
}

impl GuardHandle {
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Take the lock from outside the engine, e.g. to model a collaborator
    /// calling back in during a transfer.
    pub fn enter(&self) -> Option<GuardToken> {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardToken {
                locked: Arc::clone(&self.locked),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_enter_and_release() {
        let guard = ReentrancyGuard::new();
        assert!(!guard.is_locked());

        let token = guard.enter().unwrap();
        assert!(guard.is_locked());
        assert!(guard.enter().is_none());

        drop(token);
        assert!(!guard.is_locked());
        assert!(guard.enter().is_some());
    }

    #[test]
    fn test_guard_handle_observes_lock() {
        let guard = ReentrancyGuard::new();
        let handle = guard.handle();

        let _token = guard.enter().unwrap();
        assert!(handle.is_locked());
        assert!(handle.enter().is_none());
    }

    #[test]
    fn test_guard_handle_blocks_engine() {
        let guard = ReentrancyGuard::new();
        let handle = guard.handle();

        let outside = handle.enter().unwrap();
        assert!(guard.enter().is_none());
        drop(outside);
        assert!(guard.enter().is_some());
    }
}
