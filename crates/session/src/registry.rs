//! Session registry — maps ledger addresses to sessions that callers can
//! wait for before they exist.
//!
//! Each address owns one slot: a `watch` channel holding `None` until the
//! connection opens.  [`reset`](SessionRegistry::reset) replaces the slot
//! wholesale instead of clearing it, so a waiter holding the previous slot
//! can never be woken by a later connection attempt.  It simply stays
//! suspended.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::transport::SessionHandle;
use crate::types::SessionError;

type Slot = watch::Sender<Option<SessionHandle>>;

/// Table of per-address session slots.
///
/// Shared behind an `Arc`; only the lifecycle manager writes to it.
#[derive(Default)]
pub struct SessionRegistry {
    slots: Mutex<HashMap<String, Slot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh, unresolved slot for `address`.
    ///
    /// The previous slot (if any) is discarded, not resolved: its waiters
    /// never complete.
    pub fn reset(&self, address: &str) {
        let (tx, _rx) = watch::channel(None);
        let replaced = self.slots.lock().insert(address.to_owned(), tx).is_some();
        tracing::debug!(address = %address, replaced, "registry slot reset");
    }

    /// Resolve the current slot for `address` with `session`.
    ///
    /// Returns `false` (and changes nothing) if no slot exists or the slot
    /// is already resolved.  Under correct lifecycle ordering neither
    /// happens.
    pub fn resolve(&self, address: &str, session: SessionHandle) -> bool {
        let slots = self.slots.lock();
        let Some(slot) = slots.get(address) else {
            tracing::warn!(address = %address, "resolve without a registry slot");
            return false;
        };
        let resolved = slot.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(session);
            true
        });
        if !resolved {
            tracing::warn!(address = %address, "registry slot already resolved");
        }
        resolved
    }

    /// Look up the current slot for `address`.
    ///
    /// Fails with [`SessionError::NotFound`] if no slot was ever created;
    /// an unresolved slot is returned as a [`PendingSession`] that waits.
    pub fn pending(&self, address: &str) -> Result<PendingSession, SessionError> {
        self.slots
            .lock()
            .get(address)
            .map(|slot| PendingSession {
                address: address.to_owned(),
                rx: slot.subscribe(),
            })
            .ok_or_else(|| SessionError::NotFound(address.to_owned()))
    }

    /// Wait for the session of `address`.
    pub async fn session(&self, address: &str) -> Result<SessionHandle, SessionError> {
        Ok(self.pending(address)?.wait().await)
    }

    /// The resolved session for `address`, without waiting.
    pub fn try_session(&self, address: &str) -> Option<SessionHandle> {
        self.slots
            .lock()
            .get(address)
            .and_then(|slot| slot.borrow().clone())
    }

    pub fn is_resolved(&self, address: &str) -> bool {
        self.try_session(address).is_some()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.slots.lock().contains_key(address)
    }

    /// All addresses with a slot (sorted).
    pub fn addresses(&self) -> Vec<String> {
        let mut addrs: Vec<String> = self.slots.lock().keys().cloned().collect();
        addrs.sort();
        addrs
    }

    /// Drop the slot for `address` entirely.  Later lookups fail with
    /// `NotFound`; existing waiters stay suspended.
    pub fn remove(&self, address: &str) -> bool {
        self.slots.lock().remove(address).is_some()
    }
}

/// A not-yet-resolved registry slot.
pub struct PendingSession {
    address: String,
    rx: watch::Receiver<Option<SessionHandle>>,
}

impl PendingSession {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Wait until the slot resolves.
    ///
    /// Every waiter on the same slot wakes together.  If the slot is
    /// replaced by a reset before it resolves, this never returns; apply
    /// `tokio::time::timeout` for a bounded wait.
    pub async fn wait(mut self) -> SessionHandle {
        let resolved = match self.rx.wait_for(Option::is_some).await {
            Ok(current) => current.clone(),
            Err(_) => None,
        };
        match resolved {
            Some(session) => session,
            None => {
                tracing::trace!(address = %self.address, "registry slot replaced while waiting");
                std::future::pending().await
            }
        }
    }
}
