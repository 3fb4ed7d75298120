//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a cloneable flag observed at every suspension
//! point: before each file open and before each network dispatch. A
//! cancelled validation returns the partial result accumulated so far
//! with a `Cancelled` warning appended; the resolver cache survives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Safe to call from any thread, any number of
    /// times.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// The raw flag, for components that poll inside worker pools.
    pub(crate) fn flag(&self) -> &AtomicBool {
        &self.flag
    }
}
