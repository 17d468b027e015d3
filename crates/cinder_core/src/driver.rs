//! # Tick Driver
//!
//! Advances every object in a pool by one lifecycle step per tick.
//!
//! ## Tick Pass
//!
//! 1. Bump the tick stamp and open a loop
//! 2. Walk the used set; step each object not yet stepped this tick
//! 3. Hand active objects to the caller's callback
//! 4. Free (deferred) objects that finished teardown and do not linger
//! 5. Close the loop: activations, then frees
//!
//! A spawn inside the callback changes the used set, which fences the
//! cursor. The pass then restarts from the front, skipping everything
//! that already ran this tick.

use crate::deferred::LoopGuard;
use crate::error::Outcome;
use crate::handle::SlotRef;
use crate::lifecycle::{Lifecycle, Phase};
use crate::pool::Pool;

/// Summary of one tick pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Objects advanced by one step.
    pub stepped: usize,
    /// Objects handed to the callback.
    pub processed: usize,
    /// Objects that finished teardown and were released.
    pub freed: usize,
    /// Times the walk restarted after the used set changed.
    pub restarts: usize,
}

impl<T: Lifecycle, const N: usize> Pool<T, N> {
    /// Runs one tick over the pool.
    ///
    /// # Arguments
    ///
    /// * `on_active` - Called for every object that is processing, on and
    ///   not paused after its step. Receives the open loop, so it may
    ///   spawn, free or request on any object of this pool.
    ///
    /// # Returns
    ///
    /// What the pass did.
    pub fn run_tick<F>(&mut self, mut on_active: F) -> TickReport
    where
        F: FnMut(&mut LoopGuard<'_, T, N>, SlotRef),
    {
        let tick = self.advance_tick();
        let mut report = TickReport::default();

        let mut guard = self.enter_loop();
        let mut cursor = guard.cursor();

        loop {
            let Some(handle) = guard.next_used(&mut cursor) else {
                if cursor.is_fenced() {
                    report.restarts += 1;
                    cursor = guard.cursor();
                    continue;
                }
                break;
            };

            let Ok(container) = guard.container(handle) else {
                continue;
            };
            if container.stepped_tick == tick || container.awaiting_free {
                continue;
            }

            let Ok(transition) = guard.step(handle) else {
                continue;
            };
            report.stepped += 1;

            match transition.phase() {
                Phase::Processing {
                    on: true,
                    paused: false,
                } => {
                    on_active(&mut guard, handle);
                    report.processed += 1;
                }
                Phase::Waiting => {
                    let lingers = guard.get_mut(handle).is_ok_and(T::linger);
                    if !lingers && matches!(guard.free(handle), Ok(Outcome::Changed)) {
                        report.freed += 1;
                    }
                }
                _ => {}
            }
        }

        drop(guard);

        if report.restarts > 0 {
            tracing::debug!("Tick {}: walk restarted {} time(s)", tick, report.restarts);
        }
        tracing::trace!(
            "Tick {}: {} stepped, {} processed, {} freed",
            tick,
            report.stepped,
            report.processed,
            report.freed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        processed: u32,
        fade_frames: u32,
    }

    impl Lifecycle for Counter {
        fn process(&mut self) {
            self.processed += 1;
        }

        fn linger(&mut self) -> bool {
            if self.fade_frames == 0 {
                return false;
            }
            self.fade_frames -= 1;
            self.fade_frames > 0
        }
    }

    fn tick(pool: &mut Pool<Counter, 8>) -> TickReport {
        pool.run_tick(|_, _| {})
    }

    #[test]
    fn test_one_step_per_tick() {
        let mut pool: Pool<Counter, 8> = Pool::new();
        let handle = pool.allocate().unwrap();

        tick(&mut pool);
        assert_eq!(pool.phase(handle).unwrap(), Phase::Initializing);

        // initialized inside the pass, switched on by cleanup
        tick(&mut pool);
        assert_eq!(
            pool.phase(handle).unwrap(),
            Phase::Processing {
                on: true,
                paused: false
            }
        );
        assert!(pool.pending().is_empty());

        let report = tick(&mut pool);
        assert_eq!(report.processed, 1);
        assert_eq!(pool.get(handle).unwrap().processed, 1);
    }

    #[test]
    fn test_spawn_inside_pass_restarts_walk() {
        let mut pool: Pool<Counter, 8> = Pool::new();
        let first = pool.allocate().unwrap();
        pool.activate(first).unwrap();

        let mut spawned = None;
        let report = pool.run_tick(|guard, _| {
            if spawned.is_none() {
                spawned = guard.allocate().ok();
            }
        });

        assert_eq!(report.restarts, 1);
        assert_eq!(report.stepped, 1);
        // stepped before the spawn reshaped the used set
        assert!(pool.container(first).unwrap().update_guid() < pool.list_id());
        let spawned = spawned.unwrap();
        assert_eq!(pool.phase(spawned).unwrap(), Phase::Constructing);
        assert_eq!(pool.used_count(), 2);
    }

    #[test]
    fn test_free_inside_pass_is_applied_after() {
        let mut pool: Pool<Counter, 8> = Pool::new();
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        pool.activate(a).unwrap();
        pool.activate(b).unwrap();

        let report = pool.run_tick(|guard, handle| {
            if handle == a {
                guard.free(b).unwrap();
            }
        });

        // b was marked before its turn and is skipped
        assert_eq!(report.stepped, 1);
        assert!(!pool.contains(b));
        assert!(pool.contains(a));
        assert_eq!(pool.free_count(), 7);
    }

    #[test]
    fn test_terminated_object_lingers_then_frees() {
        let mut pool: Pool<Counter, 8> = Pool::new();
        let handle = pool.allocate().unwrap();
        pool.activate(handle).unwrap();
        pool.get_mut(handle).unwrap().fade_frames = 2;
        pool.request_terminate(handle).unwrap();

        tick(&mut pool);
        assert!(matches!(pool.phase(handle).unwrap(), Phase::Deinitializing { .. }));
        tick(&mut pool);
        assert!(matches!(pool.phase(handle).unwrap(), Phase::Destructing { .. }));

        let report = tick(&mut pool);
        assert_eq!(report.freed, 0);
        assert_eq!(pool.phase(handle).unwrap(), Phase::Waiting);

        let report = tick(&mut pool);
        assert_eq!(report.freed, 1);
        assert!(!pool.contains(handle));
        assert_eq!(pool.free_count(), 8);
    }
}
