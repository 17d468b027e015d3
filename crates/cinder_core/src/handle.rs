//! # Slot Handles
//!
//! Handles are weak, lookup-only references into a pool:
//! - An index into the pool's slot array
//! - The generation the slot had when the handle was issued
//!
//! A handle kept across a free + reallocate of its slot no longer matches
//! the slot's generation, so lookups through it fail instead of aliasing
//! the new occupant.

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Handle to an object stored in a [`Pool`](crate::Pool).
///
/// The ID is split into two parts:
/// - Lower 32 bits: Slot index
/// - Upper 32 bits: Generation counter for detecting stale references
///
/// The layout is `#[repr(transparent)]` over a `u64` so save-state and
/// network code can write handles out as plain bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct SlotRef(u64);

impl SlotRef {
    /// Null/invalid handle. Never issued by a pool.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates a handle from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The slot index (0 to 2^32-2)
    /// * `generation` - The generation counter (0 to 2^32-1)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation the slot had when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this handle is null.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }

    /// Returns the packed representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from its packed representation.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl Default for SlotRef {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("SlotRef(NULL)")
        } else {
            write!(f, "SlotRef({}@{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("#null")
        } else {
            write!(f, "#{}@{}", self.index(), self.generation())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_parts() {
        let handle = SlotRef::new(12345, 67890);
        assert_eq!(handle.index(), 12345);
        assert_eq!(handle.generation(), 67890);
        assert!(!handle.is_null());
    }

    #[test]
    fn test_null_is_default() {
        assert!(SlotRef::default().is_null());
        assert_ne!(SlotRef::new(0, 0), SlotRef::NULL);
    }

    #[test]
    fn test_handle_bytes() {
        let handle = SlotRef::new(7, 3);
        let bytes = bytemuck::bytes_of(&handle).to_vec();
        let restored: SlotRef = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(restored, handle);
        assert_eq!(SlotRef::from_bits(handle.to_bits()), handle);
    }

    #[test]
    fn test_display() {
        assert_eq!(SlotRef::new(4, 2).to_string(), "#4@2");
        assert_eq!(SlotRef::NULL.to_string(), "#null");
    }
}
