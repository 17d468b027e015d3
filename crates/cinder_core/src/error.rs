//! # Pool Error Types
//!
//! Everything a pool or lifecycle operation can refuse with.
//!
//! Redundant calls (terminating an object that is already on its way out,
//! turning on an object that is already on) are not errors. They succeed
//! with [`Outcome::NoChange`] so callers can make them unconditionally.

use thiserror::Error;

/// Errors that can occur in pool and lifecycle operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// No free slot and no eligible eviction victim.
    #[error("no slot available: capacity {capacity}")]
    Exhausted {
        /// The logical capacity at the time of the request.
        capacity: usize,
    },

    /// The null handle was passed in.
    #[error("null handle")]
    NullHandle,

    /// The slot index lies outside the pool.
    #[error("slot {index} out of range: capacity {capacity}")]
    OutOfRange {
        /// The requested slot index.
        index: usize,
        /// The capacity the index was checked against.
        capacity: usize,
    },

    /// The handle addresses a slot that holds no live object.
    #[error("slot {index} holds no live object")]
    InvalidObject {
        /// The slot index.
        index: u32,
    },

    /// The slot was freed and reallocated since the handle was issued.
    #[error("stale handle for slot {index}: generation {held}, slot is at {current}")]
    StaleHandle {
        /// The slot index.
        index: u32,
        /// Generation carried by the handle.
        held: u32,
        /// Generation currently stored in the slot.
        current: u32,
    },

    /// An override allocation asked for a slot that is not free.
    #[error("slot {index} is already in use")]
    SlotOccupied {
        /// The requested slot index.
        index: usize,
    },

    /// A logical capacity above the storage size was requested.
    #[error("capacity {requested} exceeds pool maximum {max}")]
    CapacityTooLarge {
        /// The requested capacity.
        requested: usize,
        /// The pool's storage size.
        max: usize,
    },

    /// The operation must not run while the used set is being iterated.
    #[error("operation not allowed inside an open loop (depth {depth})")]
    LoopActive {
        /// The loop depth at the time of the call.
        depth: u32,
    },
}

impl PoolError {
    /// Returns true if this error means the caller held a bad handle.
    ///
    /// These are the "dangling handle" bugs, as opposed to exhaustion or
    /// misuse of the loop protocol.
    #[inline]
    #[must_use]
    pub const fn is_handle_error(&self) -> bool {
        matches!(
            self,
            Self::NullHandle
                | Self::OutOfRange { .. }
                | Self::InvalidObject { .. }
                | Self::StaleHandle { .. }
        )
    }
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Whether a successful operation changed anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The request took effect.
    Changed,
    /// The object was already in the requested state.
    NoChange,
}

impl Outcome {
    /// Returns true if the request took effect.
    #[inline]
    #[must_use]
    pub const fn is_changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_errors_are_distinct_from_exhaustion() {
        assert!(PoolError::InvalidObject { index: 3 }.is_handle_error());
        assert!(PoolError::StaleHandle { index: 3, held: 1, current: 2 }.is_handle_error());
        assert!(!PoolError::Exhausted { capacity: 4 }.is_handle_error());
        assert!(!PoolError::LoopActive { depth: 1 }.is_handle_error());
    }

    #[test]
    fn test_error_messages() {
        let err = PoolError::StaleHandle { index: 2, held: 1, current: 5 };
        assert_eq!(err.to_string(), "stale handle for slot 2: generation 1, slot is at 5");
        assert_eq!(PoolError::Exhausted { capacity: 4 }.to_string(), "no slot available: capacity 4");
    }
}
