//! Scoped undo for local mutations.
//!
//! A [`RollbackGuard`] holds an undo action. It does nothing until armed;
//! once armed it runs the action on [`RollbackGuard::trigger`] or when
//! dropped, so a cancelled or failed run still restores local state. The
//! action runs at most once.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

type UndoFn = Box<dyn Fn() + Send + Sync>;

/// Runs an undo action once, if armed, on trigger or drop.
pub struct RollbackGuard {
    undo: UndoFn,
    armed: AtomicBool,
    ran: AtomicBool,
}

impl RollbackGuard {
    /// Creates a disarmed guard.
    ///
    /// `undo` should inspect what actually happened at the time it runs
    /// rather than assume a fixed set of mutations.
    pub fn new(undo: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            undo: Box::new(undo),
            armed: AtomicBool::new(false),
            ran: AtomicBool::new(false),
        }
    }

    /// Arms the guard when entering the mutation window.
    pub fn arm(&self) {
        debug!("rollback guard armed");
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Disarms the guard, e.g. right before a push makes changes visible.
    pub fn disarm(&self) {
        debug!("rollback guard disarmed");
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Returns whether the guard is armed.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Runs the undo action if armed and not yet run.
    ///
    /// Returns whether the action ran during this call.
    pub fn trigger(&self) -> bool {
        if !self.is_armed() || self.ran.swap(true, Ordering::SeqCst) {
            return false;
        }
        warn!("rolling back local changes");
        (self.undo)();
        true
    }
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        self.trigger();
    }
}

impl std::fmt::Debug for RollbackGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackGuard")
            .field("armed", &self.armed)
            .field("ran", &self.ran)
            .finish_non_exhaustive()
    }
}
