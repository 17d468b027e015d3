//! # Slot Container
//!
//! One slot of a pool: the payload (present only while allocated) plus the
//! bookkeeping the pool needs to keep its free and used sets honest.

use crate::handle::SlotRef;
use crate::lifecycle::{Lifecycle, LifecycleState};

/// A single pool slot.
#[derive(Debug)]
pub struct Container<T> {
    index: u32,
    payload: Option<T>,
    pub(crate) lifecycle: LifecycleState,
    generation: u32,
    allocation_id: u64,
    /// `list_id` of the pass that last stepped this slot.
    pub(crate) update_guid: u64,
    /// Tick stamp of the last step (or of the allocation).
    pub(crate) stepped_tick: u64,
    pub(crate) in_used_list: bool,
    pub(crate) in_free_list: bool,
    /// Freed inside a loop, waiting for cleanup.
    pub(crate) awaiting_free: bool,
}

impl<T: Lifecycle> Container<T> {
    /// Creates an empty, free slot.
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            payload: None,
            lifecycle: LifecycleState::default(),
            generation: 0,
            allocation_id: 0,
            update_guid: 0,
            stepped_tick: 0,
            in_used_list: false,
            in_free_list: true,
            awaiting_free: false,
        }
    }

    /// Hands the slot to a new occupant.
    ///
    /// Bumps the generation so handles to the previous occupant go stale.
    pub(crate) fn occupy(&mut self, allocation_id: u64, tick: u64) -> SlotRef {
        self.generation = self.generation.wrapping_add(1);
        self.allocation_id = allocation_id;
        self.payload = Some(T::default());
        self.lifecycle.begin();
        self.stepped_tick = tick;
        self.in_free_list = false;
        self.awaiting_free = false;
        self.handle()
    }

    /// Drops the occupant and returns the slot to `Invalid`.
    pub(crate) fn release(&mut self) {
        self.payload = None;
        self.lifecycle.clear();
        self.in_used_list = false;
        self.awaiting_free = false;
    }

    /// Runs the remaining teardown hooks of the occupant.
    pub(crate) fn tear_down(&mut self) {
        if let Some(payload) = self.payload.as_mut() {
            self.lifecycle.tear_down(payload);
        }
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Returns the current generation.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns the handle of the current occupant.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> SlotRef {
        SlotRef::new(self.index, self.generation)
    }

    /// Returns the `list_id` the pool had when this slot was last stepped.
    ///
    /// A value below the pool's current `list_id` means the used set
    /// changed shape after the step.
    #[inline]
    #[must_use]
    pub const fn update_guid(&self) -> u64 {
        self.update_guid
    }

    /// Returns the allocation id of the current (or last) occupant.
    #[inline]
    #[must_use]
    pub const fn allocation_id(&self) -> u64 {
        self.allocation_id
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub const fn lifecycle(&self) -> &LifecycleState {
        &self.lifecycle
    }

    /// Returns true while the slot holds an object.
    #[inline]
    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.payload.is_some()
    }

    /// Returns the payload, if allocated.
    #[inline]
    #[must_use]
    pub const fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    /// Returns the payload mutably, if allocated.
    #[inline]
    pub fn payload_mut(&mut self) -> Option<&mut T> {
        self.payload.as_mut()
    }

    /// Splits the slot into its lifecycle state and payload.
    pub(crate) fn parts_mut(&mut self) -> Option<(&mut LifecycleState, &mut T)> {
        let payload = self.payload.as_mut()?;
        Some((&mut self.lifecycle, payload))
    }

    /// Returns true if the occupant references nothing that went away.
    pub(crate) fn is_well_formed(&self) -> bool {
        self.payload.as_ref().is_some_and(T::is_well_formed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Phase;

    #[derive(Default)]
    struct Blank;

    impl Lifecycle for Blank {}

    #[test]
    fn test_occupy_bumps_generation() {
        let mut slot = Container::<Blank>::new(3);
        let first = slot.occupy(1, 0);
        slot.release();
        let second = slot.occupy(2, 0);

        assert_eq!(first.index(), 3);
        assert_eq!(second.index(), 3);
        assert_ne!(first.generation(), second.generation());
        assert_eq!(slot.allocation_id(), 2);
    }

    #[test]
    fn test_release_clears_payload() {
        let mut slot = Container::<Blank>::new(0);
        let _ = slot.occupy(1, 0);
        assert!(slot.is_allocated());
        assert_eq!(slot.lifecycle().phase(), Phase::Constructing);

        slot.tear_down();
        assert!(slot.lifecycle().is_killed());

        slot.release();
        assert!(!slot.is_allocated());
        assert_eq!(slot.lifecycle().phase(), Phase::Invalid);
    }
}
