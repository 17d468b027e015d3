//! # Slot Pool
//!
//! Fixed-capacity storage for one kind of game object.
//!
//! ## Layout
//!
//! - `slots`: every container, allocated once, never resized
//! - `free_list`: stack of free indices below the logical capacity
//! - `parked`: free indices at or above the logical capacity
//! - `used`: allocated indices in insertion order
//!
//! A slot is always in exactly one of free, parked or used. While a loop
//! is open, `free` only marks the slot and queues it; the sets change when
//! the outermost loop closes.

use crate::container::Container;
use crate::deferred::{LoopGuard, PendingQueue, UsedCursor};
use crate::error::{Outcome, PoolError, PoolResult};
use crate::handle::SlotRef;
use crate::lifecycle::{Lifecycle, LifecycleState, Phase, Transition};
use crate::used::UsedList;

/// Allocation limits applied on top of the free set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocationPolicy {
    /// Free slots held back from unforced allocation.
    ///
    /// `allocate` fails while `free_count() <= reserve`; forced and
    /// override allocation ignore it.
    pub reserve: usize,
}

impl AllocationPolicy {
    /// Creates a policy that holds back `reserve` slots.
    #[inline]
    #[must_use]
    pub const fn with_reserve(reserve: usize) -> Self {
        Self { reserve }
    }
}

/// What a call to [`Pool::reconcile`] fixed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Ill-formed objects that were freed.
    pub reclaimed: usize,
    /// Bookkeeping flags that were out of sync and got repaired.
    pub repaired: usize,
}

impl ReconcileReport {
    /// Returns true if nothing needed fixing.
    #[inline]
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.reclaimed == 0 && self.repaired == 0
    }
}

/// A fixed-capacity pool of lifecycle-managed objects.
///
/// # Type Parameters
///
/// * `T` - The payload stored in each slot
/// * `N` - Storage size; the logical capacity can be lowered at runtime
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: Pool<Spark, 64> = Pool::new();
///
/// let handle = pool.allocate()?;
/// pool.activate(handle)?;
///
/// {
///     let mut guard = pool.enter_loop();
///     let mut cursor = guard.cursor();
///     while let Some(h) = guard.next_used(&mut cursor) {
///         guard.free(h)?; // deferred until the guard drops
///     }
/// }
/// ```
pub struct Pool<T: Lifecycle, const N: usize> {
    pub(crate) slots: Box<[Container<T>]>,
    free_list: Vec<u32>,
    parked: Vec<u32>,
    pub(crate) used: UsedList,
    max_len: usize,
    pub(crate) loop_depth: u32,
    pending: PendingQueue,
    next_allocation_id: u64,
    tick: u64,
    policy: AllocationPolicy,
}

impl<T: Lifecycle, const N: usize> Pool<T, N> {
    /// Creates a pool with every slot free and no reserve.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(AllocationPolicy::default())
    }

    /// Creates a pool with every slot free.
    ///
    /// All storage is allocated upfront.
    ///
    /// # Arguments
    ///
    /// * `policy` - Allocation limits for unforced requests
    #[must_use]
    pub fn with_policy(policy: AllocationPolicy) -> Self {
        assert!(N > 0 && N < u32::MAX as usize, "Pool size must be in 1..u32::MAX");

        let slots: Vec<Container<T>> = (0..N as u32).map(Container::new).collect();
        let free_list: Vec<u32> = (0..N as u32).rev().collect();

        Self {
            slots: slots.into_boxed_slice(),
            free_list,
            parked: Vec::with_capacity(N),
            used: UsedList::new(N),
            max_len: N,
            loop_depth: 0,
            pending: PendingQueue::with_capacity(N),
            next_allocation_id: 1,
            tick: 0,
            policy,
        }
    }

    /// Returns the logical capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_len
    }

    /// Returns the storage size.
    #[inline]
    #[must_use]
    pub const fn max_capacity(&self) -> usize {
        N
    }

    /// Returns the number of free slots within the logical capacity.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Returns the number of allocated slots.
    #[inline]
    #[must_use]
    pub const fn used_count(&self) -> usize {
        self.used.len()
    }

    /// Returns the structural version of the used set.
    #[inline]
    #[must_use]
    pub const fn list_id(&self) -> u64 {
        self.used.id()
    }

    /// Returns the number of open loops.
    #[inline]
    #[must_use]
    pub const fn loop_depth(&self) -> u32 {
        self.loop_depth
    }

    /// Returns the deferred frees and activations.
    #[inline]
    #[must_use]
    pub const fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    /// Returns the current tick stamp.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Returns the allocation policy.
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// Replaces the allocation policy.
    pub fn set_policy(&mut self, policy: AllocationPolicy) {
        self.policy = policy;
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocates a slot.
    ///
    /// The new object starts in `Constructing` with a default payload. It
    /// is not stepped by a tick pass already in progress.
    ///
    /// # Errors
    ///
    /// `Exhausted` when no free slot is available beyond the reserve.
    pub fn allocate(&mut self) -> PoolResult<SlotRef> {
        if self.free_list.len() <= self.policy.reserve {
            tracing::warn!(
                "Pool exhausted: {} free, {} reserved, capacity {}",
                self.free_list.len(),
                self.policy.reserve,
                self.max_len
            );
            return Err(PoolError::Exhausted {
                capacity: self.max_len,
            });
        }
        self.take_free()
    }

    /// Allocates a specific free slot.
    ///
    /// Used when restoring saved state or joining a network session, where
    /// the slot index is dictated from outside. Ignores the reserve.
    ///
    /// # Arguments
    ///
    /// * `index` - The slot to take
    ///
    /// # Errors
    ///
    /// `OutOfRange` beyond the logical capacity, `SlotOccupied` if the slot
    /// is not free.
    pub fn allocate_at(&mut self, index: usize) -> PoolResult<SlotRef> {
        if index >= self.max_len {
            tracing::warn!("Override allocation of slot {} refused: out of range", index);
            return Err(PoolError::OutOfRange {
                index,
                capacity: self.max_len,
            });
        }

        let Some(position) = self.free_list.iter().position(|&i| i as usize == index) else {
            tracing::warn!("Override allocation of slot {} refused: slot in use", index);
            return Err(PoolError::SlotOccupied { index });
        };

        // Move the requested entry to the top of the stack, then take it.
        let top = self.free_list.len() - 1;
        self.free_list.swap(position, top);
        self.take_free()
    }

    /// Pops the top of the free stack, ignoring the reserve.
    pub(crate) fn take_free(&mut self) -> PoolResult<SlotRef> {
        let index = self.free_list.pop().ok_or(PoolError::Exhausted {
            capacity: self.max_len,
        })?;
        Ok(self.claim(index))
    }

    fn claim(&mut self, index: u32) -> SlotRef {
        let allocation_id = self.next_allocation_id;
        self.next_allocation_id += 1;

        let slot = &mut self.slots[index as usize];
        let handle = slot.occupy(allocation_id, self.tick);
        slot.in_used_list = true;
        self.used.push_back(index);

        tracing::debug!("Allocated {} (allocation {})", handle, allocation_id);
        handle
    }

    // =========================================================================
    // Freeing
    // =========================================================================

    /// Frees an object.
    ///
    /// Outside a loop the object is torn down (running only the hooks its
    /// progress requires) and its slot returns to the free set immediately.
    /// Inside a loop the object is marked for termination and queued; the
    /// free and used sets are untouched until cleanup.
    ///
    /// # Errors
    ///
    /// Any handle error. Freeing an already free slot is `InvalidObject`
    /// (or `StaleHandle` once the slot was reallocated).
    pub fn free(&mut self, handle: SlotRef) -> PoolResult<Outcome> {
        let depth = self.loop_depth;
        let slot = self.slot_mut(handle)?;

        if depth == 0 {
            self.free_now(handle.index());
            return Ok(Outcome::Changed);
        }

        if slot.awaiting_free {
            return Ok(Outcome::NoChange);
        }
        slot.awaiting_free = true;
        slot.lifecycle.request_terminate();
        self.pending.termination.push(handle);

        tracing::debug!("Deferred free of {} (loop depth {})", handle, depth);
        Ok(Outcome::Changed)
    }

    /// Frees every allocated object. Returns how many frees took effect.
    pub fn free_all(&mut self) -> usize {
        let mut freed = 0;

        if self.loop_depth == 0 {
            while let Some(index) = self.used.first() {
                self.free_now(index);
                freed += 1;
            }
            return freed;
        }

        let mut next = self.used.first();
        while let Some(index) = next {
            next = self.used.next_of(index);
            let handle = self.slots[index as usize].handle();
            if matches!(self.free(handle), Ok(Outcome::Changed)) {
                freed += 1;
            }
        }
        freed
    }

    /// Tears the object in `index` down and returns the slot to the free set.
    pub(crate) fn free_now(&mut self, index: u32) {
        let i = index as usize;
        self.used.remove(index);

        let slot = &mut self.slots[i];
        if !slot.is_allocated() {
            return;
        }
        let handle = slot.handle();
        slot.tear_down();
        slot.release();
        slot.in_free_list = true;

        if i < self.max_len {
            self.free_list.push(index);
        } else {
            self.parked.push(index);
        }

        tracing::debug!("Freed {}", handle);
    }

    /// Frees every object and clears the deferred queue.
    ///
    /// Generations survive, so handles issued before the reset stay stale.
    ///
    /// # Errors
    ///
    /// `LoopActive` while a loop is open.
    pub fn reset(&mut self) -> PoolResult<()> {
        if self.loop_depth > 0 {
            return Err(PoolError::LoopActive {
                depth: self.loop_depth,
            });
        }

        for slot in self.slots.iter_mut() {
            slot.tear_down();
            slot.release();
            slot.in_free_list = true;
        }

        self.used.clear();
        self.pending.clear();
        self.free_list.clear();
        self.free_list.extend((0..self.max_len as u32).rev());
        self.parked.clear();
        self.parked.extend(self.max_len as u32..N as u32);

        tracing::info!("Pool reset: capacity {}", self.max_len);
        Ok(())
    }

    // =========================================================================
    // Capacity
    // =========================================================================

    /// Changes the logical capacity without touching storage.
    ///
    /// Free slots above the new bound are parked and come back when the
    /// bound grows again. Allocated slots above the bound keep running and
    /// are parked once freed.
    ///
    /// # Errors
    ///
    /// `CapacityTooLarge` above the storage size.
    pub fn set_capacity(&mut self, capacity: usize) -> PoolResult<()> {
        if capacity > N {
            return Err(PoolError::CapacityTooLarge {
                requested: capacity,
                max: N,
            });
        }

        let parked = &mut self.parked;
        let free_list = &mut self.free_list;
        if capacity < self.max_len {
            free_list.retain(|&index| {
                let keep = (index as usize) < capacity;
                if !keep {
                    parked.push(index);
                }
                keep
            });
        } else {
            parked.retain(|&index| {
                let keep = (index as usize) >= capacity;
                if !keep {
                    free_list.push(index);
                }
                keep
            });
        }

        tracing::info!("Pool capacity changed: {} -> {}", self.max_len, capacity);
        self.max_len = capacity;
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Runs a freshly allocated object through construction and
    /// initialization into `Processing`.
    ///
    /// Outside a loop the object is switched on immediately. Inside a loop
    /// it stays off and spawning until cleanup grants the activation.
    ///
    /// # Errors
    ///
    /// Any handle error.
    pub fn activate(&mut self, handle: SlotRef) -> PoolResult<Outcome> {
        let defer_on = self.loop_depth > 0;
        let slot = self.slot_mut(handle)?;
        let Some((state, payload)) = slot.parts_mut() else {
            return Err(PoolError::InvalidObject {
                index: handle.index(),
            });
        };

        if state.is_dying() || state.phase().is_active() {
            return Ok(Outcome::NoChange);
        }

        for _ in 0..2 {
            if !matches!(state.phase(), Phase::Constructing | Phase::Initializing) {
                break;
            }
            state.step(payload, defer_on);
        }

        let spawning = state.is_spawning();
        if spawning {
            self.pending.activation.push(handle);
        }

        tracing::debug!("Activated {} (deferred: {})", handle, spawning);
        Ok(Outcome::Changed)
    }

    /// Asks an object to tear itself down on its next step.
    ///
    /// # Errors
    ///
    /// Any handle error. Terminating an object that is already dead or
    /// dying is `Ok(NoChange)`.
    pub fn request_terminate(&mut self, handle: SlotRef) -> PoolResult<Outcome> {
        let slot = self.slot_mut(handle)?;
        slot.lifecycle
            .request_terminate()
            .ok_or(PoolError::InvalidObject {
                index: handle.index(),
            })
    }

    /// Asks an object to switch on or off on its next processing step.
    ///
    /// # Errors
    ///
    /// Any handle error, or `InvalidObject` if the object is already dead.
    pub fn request_on(&mut self, handle: SlotRef, on: bool) -> PoolResult<Outcome> {
        let slot = self.slot_mut(handle)?;
        slot.lifecycle
            .request_on(on)
            .ok_or(PoolError::InvalidObject {
                index: handle.index(),
            })
    }

    /// Asks an object to pause or resume on its next processing step.
    ///
    /// # Errors
    ///
    /// Any handle error, or `InvalidObject` if the object is already dead.
    pub fn request_pause(&mut self, handle: SlotRef, pause: bool) -> PoolResult<Outcome> {
        let slot = self.slot_mut(handle)?;
        slot.lifecycle
            .request_pause(pause)
            .ok_or(PoolError::InvalidObject {
                index: handle.index(),
            })
    }

    /// Advances one object by exactly one lifecycle transition.
    ///
    /// # Errors
    ///
    /// Any handle error.
    pub fn step(&mut self, handle: SlotRef) -> PoolResult<Transition> {
        let defer_on = self.loop_depth > 0;
        let list_id = self.used.id();
        let tick = self.tick;

        let slot = self.slot_mut(handle)?;
        slot.update_guid = list_id;
        slot.stepped_tick = tick;

        let Some((state, payload)) = slot.parts_mut() else {
            return Ok(Transition::Idle);
        };
        let was_spawning = state.is_spawning();
        let transition = state.step(payload, defer_on);
        let spawned = !was_spawning && state.is_spawning();

        if let Transition::Moved { from, to } = transition {
            tracing::trace!("{}: {} -> {}", handle, from.name(), to.name());
        }
        if spawned {
            self.pending.activation.push(handle);
        }
        Ok(transition)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    fn check(&self, handle: SlotRef) -> PoolResult<&Container<T>> {
        if handle.is_null() {
            return Err(PoolError::NullHandle);
        }

        let index = handle.index();
        let slot = self.slots.get(index as usize).ok_or(PoolError::OutOfRange {
            index: index as usize,
            capacity: N,
        })?;

        if !slot.is_allocated() {
            return Err(PoolError::InvalidObject { index });
        }
        if slot.generation() != handle.generation() {
            return Err(PoolError::StaleHandle {
                index,
                held: handle.generation(),
                current: slot.generation(),
            });
        }
        Ok(slot)
    }

    pub(crate) fn slot_mut(&mut self, handle: SlotRef) -> PoolResult<&mut Container<T>> {
        self.check(handle)?;
        Ok(&mut self.slots[handle.index() as usize])
    }

    /// Returns the container behind a handle.
    ///
    /// # Errors
    ///
    /// Any handle error.
    pub fn container(&self, handle: SlotRef) -> PoolResult<&Container<T>> {
        self.check(handle)
    }

    /// Gets the payload behind a handle.
    ///
    /// # Errors
    ///
    /// Any handle error.
    pub fn get(&self, handle: SlotRef) -> PoolResult<&T> {
        self.check(handle)?
            .payload()
            .ok_or(PoolError::InvalidObject {
                index: handle.index(),
            })
    }

    /// Gets the payload behind a handle mutably.
    ///
    /// # Errors
    ///
    /// Any handle error.
    pub fn get_mut(&mut self, handle: SlotRef) -> PoolResult<&mut T> {
        self.slot_mut(handle)?
            .payload_mut()
            .ok_or(PoolError::InvalidObject {
                index: handle.index(),
            })
    }

    /// Returns the lifecycle state of an object.
    ///
    /// # Errors
    ///
    /// Any handle error.
    pub fn lifecycle(&self, handle: SlotRef) -> PoolResult<&LifecycleState> {
        Ok(self.check(handle)?.lifecycle())
    }

    /// Returns the phase of an object.
    ///
    /// # Errors
    ///
    /// Any handle error.
    pub fn phase(&self, handle: SlotRef) -> PoolResult<Phase> {
        Ok(self.check(handle)?.lifecycle().phase())
    }

    /// Returns the allocation id of an object.
    ///
    /// # Errors
    ///
    /// Any handle error.
    pub fn allocation_id(&self, handle: SlotRef) -> PoolResult<u64> {
        Ok(self.check(handle)?.allocation_id())
    }

    /// Returns true if the handle resolves to a live slot.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: SlotRef) -> bool {
        self.check(handle).is_ok()
    }

    /// Returns true if the slot at `index` is allocated.
    #[inline]
    #[must_use]
    pub fn is_allocated(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(Container::is_allocated)
    }

    /// Returns the handle of the object in slot `index`, if any.
    #[must_use]
    pub fn handle_at(&self, index: usize) -> Option<SlotRef> {
        let slot = self.slots.get(index)?;
        slot.is_allocated().then_some(slot.handle())
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Iterates allocated objects in insertion order.
    pub fn iter_used(&self) -> impl Iterator<Item = (SlotRef, &T)> + '_ {
        self.used.iter().filter_map(move |index| {
            let slot = &self.slots[index as usize];
            slot.payload().map(|payload| (slot.handle(), payload))
        })
    }

    /// Iterates objects that are processing and switched on, in insertion
    /// order. This is the set rendering draws.
    pub fn iter_processing(&self) -> impl Iterator<Item = (SlotRef, &T)> + '_ {
        self.iter_used().filter(move |(handle, _)| {
            self.slots[handle.index() as usize]
                .lifecycle()
                .phase()
                .is_on()
        })
    }

    /// Opens a loop over the pool.
    ///
    /// Frees and activations requested through the guard are deferred
    /// until the outermost guard is dropped.
    pub fn enter_loop(&mut self) -> LoopGuard<'_, T, N> {
        LoopGuard::new(self)
    }

    /// Advances a cursor obtained from [`LoopGuard::cursor`].
    ///
    /// Returns `None` at the end of the used set, or as soon as the used
    /// set changed shape since the cursor was created.
    pub fn next_used(&self, cursor: &mut UsedCursor) -> Option<SlotRef> {
        let index = cursor.advance(self.used.id(), |index| self.used.next_of(index))?;
        Some(self.slots[index as usize].handle())
    }

    pub(crate) fn exit_loop(&mut self) {
        self.loop_depth = self.loop_depth.saturating_sub(1);
        if self.loop_depth == 0 {
            self.flush_pending();
        }
    }

    pub(crate) fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Applies deferred activations, then deferred frees.
    ///
    /// Runs automatically when the outermost loop closes.
    ///
    /// # Errors
    ///
    /// `LoopActive` while a loop is open.
    pub fn cleanup(&mut self) -> PoolResult<usize> {
        if self.loop_depth > 0 {
            return Err(PoolError::LoopActive {
                depth: self.loop_depth,
            });
        }
        Ok(self.flush_pending())
    }

    fn flush_pending(&mut self) -> usize {
        let mut activation = std::mem::take(&mut self.pending.activation);
        for handle in activation.drain(..) {
            let Ok(slot) = self.slot_mut(handle) else {
                tracing::warn!("Dropping deferred activation of {}", handle);
                continue;
            };
            if let Some((state, payload)) = slot.parts_mut() {
                if state.is_spawning() {
                    state.finish_spawn(payload);
                }
            }
        }
        self.pending.activation = activation;

        let mut freed = 0;
        let mut termination = std::mem::take(&mut self.pending.termination);
        for handle in termination.drain(..) {
            if self.check(handle).is_ok() {
                self.free_now(handle.index());
                freed += 1;
            } else {
                tracing::warn!("Dropping deferred free of {}", handle);
            }
        }
        self.pending.termination = termination;

        freed
    }

    // =========================================================================
    // Consistency
    // =========================================================================

    /// Frees ill-formed objects and repairs out-of-sync bookkeeping.
    ///
    /// Idempotent: a second call on an untouched pool reports nothing.
    ///
    /// # Errors
    ///
    /// `LoopActive` while a loop is open.
    pub fn reconcile(&mut self) -> PoolResult<ReconcileReport> {
        if self.loop_depth > 0 {
            return Err(PoolError::LoopActive {
                depth: self.loop_depth,
            });
        }

        let mut report = ReconcileReport::default();
        let mut ill_formed = Vec::new();

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let index = slot.index();
            if slot.is_allocated() {
                let mut stray = false;
                if !self.used.contains(index) {
                    self.used.push_back(index);
                    stray = true;
                }
                if !slot.in_used_list || slot.in_free_list || slot.awaiting_free {
                    slot.in_used_list = true;
                    slot.in_free_list = false;
                    slot.awaiting_free = false;
                    stray = true;
                }
                if stray {
                    tracing::warn!("Repaired bookkeeping of allocated slot {}", i);
                    report.repaired += 1;
                }
                if !slot.is_well_formed() {
                    ill_formed.push(index);
                }
            } else {
                let mut stray = self.used.remove(index);
                if slot.in_used_list || !slot.in_free_list {
                    slot.in_used_list = false;
                    slot.in_free_list = true;
                    stray = true;
                }
                if stray {
                    tracing::warn!("Repaired bookkeeping of free slot {}", i);
                    report.repaired += 1;
                }
            }
        }

        for index in ill_formed {
            tracing::warn!("Reclaiming ill-formed object in slot {}", index);
            self.free_now(index);
            report.reclaimed += 1;
        }

        Ok(report)
    }
}

impl<T: Lifecycle, const N: usize> Default for Pool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
