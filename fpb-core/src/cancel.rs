//! Cooperative cancellation shared by every session.
//!
//! The gate holds one entry per [`Category`]: a count of running sessions and
//! the cancellation token they share. A session claims its category with
//! [`CancelGate::begin`], which hands out a fresh token unless one is already
//! live, and either polls the returned [`SessionGuard`] or awaits
//! [`SessionGuard::cancelled`] next to a pending read. Dropping the last
//! guard marks the category idle again.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::error::FpbError;

/// Operation category; each owns an independent gate entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Transfer,
    Injection,
}

impl Category {
    fn index(self) -> usize {
        match self {
            Self::Transfer => 0,
            Self::Injection => 1,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "transfer"),
            Self::Injection => write!(f, "injection"),
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    /// Sessions currently holding a guard.
    active: usize,
    /// Token of the live sessions; replaced once cancelled and reclaimed.
    token: CancellationToken,
}

// ── CancelGate ───────────────────────────────────────────────────

/// Cloneable handle to the shared entries.
#[derive(Debug, Clone, Default)]
pub struct CancelGate {
    entries: Arc<[Mutex<Entry>; 2]>,
}

impl CancelGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, category: Category) -> MutexGuard<'_, Entry> {
        self.entries[category.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a session of `category`: clear any stale cancel request and
    /// mark the category busy until the guard is dropped.
    pub fn begin(&self, category: Category) -> SessionGuard {
        let mut entry = self.entry(category);
        if entry.active == 0 || entry.token.is_cancelled() {
            entry.token = CancellationToken::new();
        }
        entry.active += 1;
        debug!("{category} session started ({} active)", entry.active);
        SessionGuard {
            gate: self.clone(),
            category,
            token: entry.token.clone(),
        }
    }

    /// Request cancellation of the running session of `category`.
    ///
    /// Returns `false` (and changes nothing) when no such session is active.
    pub fn cancel(&self, category: Category) -> bool {
        let entry = self.entry(category);
        if entry.active == 0 {
            return false;
        }
        entry.token.cancel();
        debug!("{category} cancel requested");
        true
    }

    pub fn is_cancelled(&self, category: Category) -> bool {
        self.entry(category).token.is_cancelled()
    }

    pub fn is_in_progress(&self, category: Category) -> bool {
        self.entry(category).active > 0
    }
}

// ── SessionGuard ─────────────────────────────────────────────────

/// Held by a running session; releases the category on drop.
#[derive(Debug)]
pub struct SessionGuard {
    gate: CancelGate,
    category: Category,
    token: CancellationToken,
}

impl SessionGuard {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a cancel has been requested for this session.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// `Err(FpbError::Cancelled)` once a cancel has been requested.
    pub fn check(&self) -> Result<(), FpbError> {
        if self.is_cancelled() {
            Err(FpbError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut entry = self.gate.entry(self.category);
        entry.active = entry.active.saturating_sub(1);
    }
}

// ── Tests ────────────────────────────────────────────────────────
