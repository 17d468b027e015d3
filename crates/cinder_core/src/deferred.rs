//! # Deferred Mutation
//!
//! While any loop over a pool is open, frees and activations are queued
//! instead of applied, and flushed when the outermost loop closes.
//!
//! ## Protocol
//!
//! ```text
//! let mut guard = pool.enter_loop();     // loop_depth += 1
//! let mut cursor = guard.cursor();       // snapshots list_id
//! while let Some(handle) = guard.next_used(&mut cursor) {
//!     guard.free(handle)?;               // queued, used set untouched
//! }
//! drop(guard);                           // loop_depth -= 1, cleanup at 0
//! ```
//!
//! The guard decrements the depth on every exit path, including `?` and
//! unwinding, so a loop can never be left open by accident.

use std::ops::{Deref, DerefMut};

use crate::handle::SlotRef;
use crate::lifecycle::Lifecycle;
use crate::pool::Pool;

/// Handles whose free or activation was deferred by an open loop.
#[derive(Debug, Default)]
pub struct PendingQueue {
    pub(crate) termination: Vec<SlotRef>,
    pub(crate) activation: Vec<SlotRef>,
}

impl PendingQueue {
    /// Creates an empty queue with room for `capacity` handles per stack.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            termination: Vec::with_capacity(capacity),
            activation: Vec::with_capacity(capacity),
        }
    }

    /// Handles waiting to be freed.
    #[inline]
    #[must_use]
    pub fn termination(&self) -> &[SlotRef] {
        &self.termination
    }

    /// Handles waiting to be switched on.
    #[inline]
    #[must_use]
    pub fn activation(&self) -> &[SlotRef] {
        &self.activation
    }

    /// Returns true if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.termination.is_empty() && self.activation.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.termination.clear();
        self.activation.clear();
    }
}

/// An open loop over a pool.
///
/// Derefs to the pool, so every pool operation is available through the
/// guard. Dropping the outermost guard runs the pool's cleanup.
pub struct LoopGuard<'a, T: Lifecycle, const N: usize> {
    pool: &'a mut Pool<T, N>,
}

impl<'a, T: Lifecycle, const N: usize> LoopGuard<'a, T, N> {
    pub(crate) fn new(pool: &'a mut Pool<T, N>) -> Self {
        pool.loop_depth += 1;
        Self { pool }
    }

    /// Starts a walk over the used set in insertion order.
    #[must_use]
    pub fn cursor(&self) -> UsedCursor {
        UsedCursor {
            list_id: self.pool.list_id(),
            next: self.pool.used.first(),
            fenced: false,
        }
    }
}

impl<T: Lifecycle, const N: usize> Deref for LoopGuard<'_, T, N> {
    type Target = Pool<T, N>;

    fn deref(&self) -> &Self::Target {
        self.pool
    }
}

impl<T: Lifecycle, const N: usize> DerefMut for LoopGuard<'_, T, N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.pool
    }
}

impl<T: Lifecycle, const N: usize> Drop for LoopGuard<'_, T, N> {
    fn drop(&mut self) {
        self.pool.exit_loop();
    }
}

/// Position of a walk over the used set.
///
/// Only obtainable from a [`LoopGuard`]. Advanced with
/// [`Pool::next_used`]; stops for good once the used set changes shape.
#[derive(Clone, Copy, Debug)]
pub struct UsedCursor {
    list_id: u64,
    next: Option<u32>,
    fenced: bool,
}

impl UsedCursor {
    /// Returns true if the walk stopped because the used set changed.
    #[inline]
    #[must_use]
    pub const fn is_fenced(&self) -> bool {
        self.fenced
    }

    /// The `list_id` captured when the walk started.
    #[inline]
    #[must_use]
    pub const fn list_id(&self) -> u64 {
        self.list_id
    }

    pub(crate) fn advance(&mut self, current_id: u64, step: impl FnOnce(u32) -> Option<u32>) -> Option<u32> {
        if self.fenced {
            return None;
        }
        if current_id != self.list_id {
            self.fenced = true;
            self.next = None;
            return None;
        }
        let index = self.next?;
        self.next = step(index);
        Some(index)
    }
}
