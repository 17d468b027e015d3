//! # Eviction Policy
//!
//! Forced allocation for pools whose objects can be cut short, such as
//! particles: when every slot is taken, an occupied low-priority slot is
//! reclaimed and handed to the new object.
//!
//! ## Victim Order
//!
//! 1. The first ill-formed object
//! 2. The dead object with the least time left
//! 3. The live, unforced object with the least time left
//!
//! "Time left" is `min(lifetime_remaining, frames_remaining)`.

use crate::error::{PoolError, PoolResult};
use crate::handle::SlotRef;
use crate::lifecycle::Lifecycle;
use crate::pool::Pool;

/// A payload that can be evicted to make room.
pub trait Evictable: Lifecycle {
    /// Returns true if this object must never be evicted while alive.
    fn is_forced(&self) -> bool {
        false
    }

    /// Ticks until the object expires on its own.
    fn lifetime_remaining(&self) -> u32;

    /// Animation frames still to be shown.
    fn frames_remaining(&self) -> u32;

    /// Time left, as used to rank victims.
    fn remaining(&self) -> u32 {
        self.lifetime_remaining().min(self.frames_remaining())
    }
}

/// The slot chosen for eviction and why.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Victim {
    /// The object references data that no longer exists.
    IllFormed(u32),
    /// The object is dead or dying but its slot was not recycled yet.
    Dead(u32),
    /// The live, unforced object closest to expiring.
    Expiring(u32),
}

impl Victim {
    /// Returns the slot index of the victim.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Self::IllFormed(index) | Self::Dead(index) | Self::Expiring(index) => index,
        }
    }
}

impl<T: Evictable, const N: usize> Pool<T, N> {
    /// Picks the slot a forced allocation would reclaim.
    ///
    /// Only slots within the logical capacity are considered. Ties go to
    /// the lowest index.
    #[must_use]
    pub fn select_victim(&self) -> Option<Victim> {
        let mut dead: Option<(u32, u32)> = None;
        let mut live: Option<(u32, u32)> = None;

        for slot in self.slots.iter().take(self.capacity()) {
            let Some(payload) = slot.payload() else {
                continue;
            };
            if !payload.is_well_formed() {
                return Some(Victim::IllFormed(slot.index()));
            }

            let best = if slot.lifecycle().is_dying() || slot.awaiting_free {
                &mut dead
            } else if !payload.is_forced() {
                &mut live
            } else {
                continue;
            };

            let remaining = payload.remaining();
            if !matches!(*best, Some((lowest, _)) if lowest <= remaining) {
                *best = Some((remaining, slot.index()));
            }
        }

        dead.map(|(_, index)| Victim::Dead(index))
            .or_else(|| live.map(|(_, index)| Victim::Expiring(index)))
    }

    /// Allocates a slot, evicting an occupant if the pool is full.
    ///
    /// Takes any free slot first, ignoring the reserve. Otherwise the
    /// victim is torn down synchronously and its slot reallocated in
    /// place: same index, new generation and allocation id.
    ///
    /// # Errors
    ///
    /// `Exhausted` if no victim qualifies, or if the pool is full while a
    /// loop is open (a victim cannot be recycled mid-pass).
    pub fn allocate_forced(&mut self) -> PoolResult<SlotRef> {
        if self.free_count() > 0 {
            return self.take_free();
        }

        if self.loop_depth > 0 {
            tracing::warn!(
                "Forced allocation refused: pool full inside loop (depth {})",
                self.loop_depth
            );
            return Err(PoolError::Exhausted {
                capacity: self.capacity(),
            });
        }

        let Some(victim) = self.select_victim() else {
            tracing::warn!("Forced allocation failed: every object is forced");
            return Err(PoolError::Exhausted {
                capacity: self.capacity(),
            });
        };

        tracing::debug!("Evicting slot {} ({:?})", victim.index(), victim);
        self.free_now(victim.index());
        self.allocate_at(victim.index() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Spark {
        forced: bool,
        lifetime: u32,
        frames: u32,
        broken: bool,
    }

    impl Lifecycle for Spark {
        fn is_well_formed(&self) -> bool {
            !self.broken
        }
    }

    impl Evictable for Spark {
        fn is_forced(&self) -> bool {
            self.forced
        }
        fn lifetime_remaining(&self) -> u32 {
            self.lifetime
        }
        fn frames_remaining(&self) -> u32 {
            self.frames
        }
    }

    fn fill(pool: &mut Pool<Spark, 4>, lifetimes: [u32; 4]) -> Vec<SlotRef> {
        lifetimes
            .into_iter()
            .map(|lifetime| {
                let handle = pool.allocate().unwrap();
                let spark = pool.get_mut(handle).unwrap();
                spark.forced = true;
                spark.lifetime = lifetime;
                spark.frames = 100;
                handle
            })
            .collect()
    }

    #[test]
    fn test_all_forced_is_exhausted() {
        let mut pool: Pool<Spark, 4> = Pool::new();
        fill(&mut pool, [10, 20, 30, 40]);

        assert_eq!(pool.select_victim(), None);
        assert_eq!(pool.allocate_forced(), Err(PoolError::Exhausted { capacity: 4 }));
    }

    #[test]
    fn test_unforced_with_least_time_is_evicted() {
        let mut pool: Pool<Spark, 4> = Pool::new();
        let handles = fill(&mut pool, [10, 20, 5, 40]);
        pool.get_mut(handles[1]).unwrap().forced = false;
        pool.get_mut(handles[2]).unwrap().forced = false;

        assert_eq!(pool.select_victim(), Some(Victim::Expiring(handles[2].index())));

        let old_id = pool.allocation_id(handles[2]).unwrap();
        let fresh = pool.allocate_forced().unwrap();
        assert_eq!(fresh.index(), handles[2].index());
        assert!(pool.allocation_id(fresh).unwrap() > old_id);
        assert!(!pool.contains(handles[2]));
    }

    #[test]
    fn test_dead_beats_live() {
        let mut pool: Pool<Spark, 4> = Pool::new();
        let handles = fill(&mut pool, [10, 20, 30, 40]);
        pool.get_mut(handles[0]).unwrap().forced = false;
        pool.request_terminate(handles[3]).unwrap();

        assert_eq!(pool.select_victim(), Some(Victim::Dead(handles[3].index())));
    }

    #[test]
    fn test_ill_formed_first() {
        let mut pool: Pool<Spark, 4> = Pool::new();
        let handles = fill(&mut pool, [10, 20, 30, 40]);
        pool.request_terminate(handles[0]).unwrap();
        pool.get_mut(handles[2]).unwrap().broken = true;

        assert_eq!(pool.select_victim(), Some(Victim::IllFormed(handles[2].index())));
    }

    #[test]
    fn test_free_slot_ignores_reserve() {
        let mut pool: Pool<Spark, 4> =
            Pool::with_policy(crate::pool::AllocationPolicy::with_reserve(2));
        pool.allocate().unwrap();
        pool.allocate().unwrap();

        assert!(pool.allocate().is_err());
        assert!(pool.allocate_forced().is_ok());
    }

    #[test]
    fn test_refused_inside_loop_when_full() {
        let mut pool: Pool<Spark, 4> = Pool::new();
        let handles = fill(&mut pool, [10, 20, 30, 40]);
        pool.get_mut(handles[0]).unwrap().forced = false;

        let mut guard = pool.enter_loop();
        assert!(matches!(guard.allocate_forced(), Err(PoolError::Exhausted { .. })));
    }
}
