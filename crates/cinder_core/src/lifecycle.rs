//! # Lifecycle State Machine
//!
//! Every pooled object walks the same path:
//!
//! ```text
//! Invalid -> Constructing -> Initializing -> Processing
//!                                                |  (terminate accepted)
//!                                                v
//!         Invalid <- Waiting <- Destructing <- Deinitializing
//! ```
//!
//! A driver advances exactly one transition per tick per object. Requests
//! (on/off, pause, kill) are plain flags that the next step resolves, so
//! they are safe to set from anywhere, including from inside a pass over
//! the same pool.
//!
//! ## Hook Rules
//!
//! - `construct` runs only on `Constructing -> Initializing`
//! - `initialize` runs only on `Initializing -> Processing`
//! - `deinitialize` runs only on `Deinitializing -> Destructing`, and only
//!   if the object was initialized
//! - `destruct` runs only on `Destructing -> Waiting`, and only if the
//!   object was constructed

use crate::error::Outcome;

/// Callbacks a pooled payload receives as it moves through its lifecycle.
///
/// Every hook has a no-op default. The payload is reset to
/// `Default::default()` when its slot is allocated and dropped when the
/// slot returns to the free set.
pub trait Lifecycle: Default {
    /// Fills in anything the object needs before initialization.
    fn construct(&mut self) {}

    /// Prepares the object for processing.
    fn initialize(&mut self) {}

    /// Runs once per tick while the object is on and not paused.
    fn process(&mut self) {}

    /// Called whenever the object is turned on or off.
    fn switched(&mut self, _on: bool) {}

    /// Undoes `initialize`.
    fn deinitialize(&mut self) {}

    /// Undoes `construct`.
    fn destruct(&mut self) {}

    /// Returns false if the object references data that no longer exists.
    ///
    /// Ill-formed objects are reclaimed by `Pool::reconcile` and are the
    /// first eviction victims.
    fn is_well_formed(&self) -> bool {
        true
    }

    /// Called once per tick while the object waits to be recycled.
    ///
    /// Return true to keep the dead object around for another tick
    /// (e.g. a particle that is still fading out).
    fn linger(&mut self) -> bool {
        false
    }
}

/// How far an object got before its teardown started.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Progress {
    /// Killed while still constructing.
    Nothing,
    /// `construct` ran, `initialize` did not.
    Constructed,
    /// Both `construct` and `initialize` ran.
    Initialized,
}

/// The phase of an object's lifecycle.
///
/// Flags that only make sense in one phase live inside that variant, so
/// e.g. a destructing object that is still "on" cannot be represented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// The slot holds no object.
    #[default]
    Invalid,
    /// Allocated, waiting for `construct`.
    Constructing,
    /// Constructed, waiting for `initialize`.
    Initializing,
    /// Fully active.
    Processing {
        /// Whether the object is switched on.
        on: bool,
        /// Whether processing is suspended.
        paused: bool,
    },
    /// Termination accepted, waiting for `deinitialize`.
    Deinitializing {
        /// How far the object got before teardown.
        reached: Progress,
    },
    /// Deinitialized, waiting for `destruct`.
    Destructing {
        /// Whether `construct` ever ran.
        constructed: bool,
    },
    /// Fully torn down, waiting for the slot to be recycled.
    Waiting,
}

impl Phase {
    /// Returns a human-readable phase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Constructing => "CONSTRUCTING",
            Self::Initializing => "INITIALIZING",
            Self::Processing { .. } => "PROCESSING",
            Self::Deinitializing { .. } => "DEINITIALIZING",
            Self::Destructing { .. } => "DESTRUCTING",
            Self::Waiting => "WAITING",
        }
    }

    /// Returns true for every phase except `Invalid`.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// Returns true while the object is processing.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Processing { .. })
    }

    /// Returns true while the object is processing and switched on.
    #[inline]
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::Processing { on: true, .. })
    }

    /// Returns true while the object is processing but paused.
    #[inline]
    #[must_use]
    pub const fn is_paused(self) -> bool {
        matches!(self, Self::Processing { paused: true, .. })
    }

    /// Returns true while the object is being torn down.
    #[inline]
    #[must_use]
    pub const fn is_terminating(self) -> bool {
        matches!(self, Self::Deinitializing { .. } | Self::Destructing { .. })
    }

    /// Returns true once teardown has completed.
    #[inline]
    #[must_use]
    pub const fn is_killed(self) -> bool {
        matches!(self, Self::Waiting)
    }
}

/// Pending requests against an object, resolved by its next step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Requests {
    /// Switch the object on.
    pub turn_me_on: bool,
    /// Switch the object off. Wins over a simultaneous `turn_me_on`.
    pub turn_me_off: bool,
    /// Pause processing. Wins over a simultaneous `unpause_me`.
    pub pause_me: bool,
    /// Resume processing.
    pub unpause_me: bool,
    /// Tear the object down.
    pub kill_me: bool,
}

/// What a single step did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The slot holds no object.
    Idle,
    /// The object stayed in its phase.
    Stayed(Phase),
    /// The object moved to the next phase.
    Moved {
        /// Phase before the step.
        from: Phase,
        /// Phase after the step.
        to: Phase,
    },
}

impl Transition {
    /// Returns the phase after the step.
    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Self::Idle => Phase::Invalid,
            Self::Stayed(phase) | Self::Moved { to: phase, .. } => phase,
        }
    }
}

/// Per-slot lifecycle state: the phase, pending requests and the spawn flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LifecycleState {
    phase: Phase,
    requests: Requests,
    spawning: bool,
}

impl LifecycleState {
    /// Returns the current phase.
    #[inline]
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the pending requests.
    #[inline]
    #[must_use]
    pub const fn requests(&self) -> Requests {
        self.requests
    }

    /// Returns true while the object waits for a deferred activation.
    #[inline]
    #[must_use]
    pub const fn is_spawning(&self) -> bool {
        self.spawning
    }

    /// Returns true if the object is switched on.
    #[inline]
    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.phase.is_on()
    }

    /// Returns true if the object has completed teardown.
    #[inline]
    #[must_use]
    pub const fn is_killed(&self) -> bool {
        self.phase.is_killed()
    }

    /// Returns true if the object is dead or on its way out.
    #[inline]
    #[must_use]
    pub const fn is_dying(&self) -> bool {
        self.requests.kill_me || self.phase.is_terminating() || self.phase.is_killed()
    }

    /// Puts a freshly allocated slot into `Constructing`.
    pub(crate) fn begin(&mut self) {
        *self = Self {
            phase: Phase::Constructing,
            ..Self::default()
        };
    }

    /// Returns the slot to `Invalid`.
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Records a kill request. `None` means the object is invalid.
    pub(crate) fn request_terminate(&mut self) -> Option<Outcome> {
        if !self.phase.is_valid() {
            return None;
        }
        if self.is_dying() {
            return Some(Outcome::NoChange);
        }
        self.requests.kill_me = true;
        Some(Outcome::Changed)
    }

    /// Records an on/off request. `None` means the object is invalid or dead.
    pub(crate) fn request_on(&mut self, on: bool) -> Option<Outcome> {
        if !self.phase.is_valid() || self.phase.is_killed() {
            return None;
        }
        if self.is_dying() {
            return Some(Outcome::NoChange);
        }

        let (already, opposite) = if on {
            (self.requests.turn_me_on, self.requests.turn_me_off)
        } else {
            (self.requests.turn_me_off, self.requests.turn_me_on)
        };
        if already {
            return Some(Outcome::NoChange);
        }
        if let Phase::Processing { on: current, .. } = self.phase {
            if current == on && !opposite && !self.spawning {
                return Some(Outcome::NoChange);
            }
        }

        if on {
            self.requests.turn_me_on = true;
        } else {
            self.requests.turn_me_off = true;
        }
        Some(Outcome::Changed)
    }

    /// Records a pause/unpause request. `None` means the object is invalid or dead.
    pub(crate) fn request_pause(&mut self, pause: bool) -> Option<Outcome> {
        if !self.phase.is_valid() || self.phase.is_killed() {
            return None;
        }
        if self.is_dying() {
            return Some(Outcome::NoChange);
        }

        let (already, opposite) = if pause {
            (self.requests.pause_me, self.requests.unpause_me)
        } else {
            (self.requests.unpause_me, self.requests.pause_me)
        };
        if already {
            return Some(Outcome::NoChange);
        }
        if let Phase::Processing { paused, .. } = self.phase {
            if paused == pause && !opposite {
                return Some(Outcome::NoChange);
            }
        }

        if pause {
            self.requests.pause_me = true;
        } else {
            self.requests.unpause_me = true;
        }
        Some(Outcome::Changed)
    }

    /// Marks the object as waiting for a deferred activation.
    pub(crate) fn defer_activation(&mut self) {
        self.requests.turn_me_on = true;
        self.spawning = true;
    }

    /// Completes a deferred activation. Returns true if the object was switched.
    pub(crate) fn finish_spawn<T: Lifecycle>(&mut self, payload: &mut T) -> bool {
        self.spawning = false;
        self.resolve_switch(payload)
    }

    /// Advances the object by one transition.
    ///
    /// `defer_on` is set while a loop over the pool is open: the object
    /// then reaches `Processing` switched off and is marked spawning until
    /// the pool's cleanup grants the activation.
    pub(crate) fn step<T: Lifecycle>(&mut self, payload: &mut T, defer_on: bool) -> Transition {
        let from = self.phase;

        if self.requests.kill_me && self.grant_terminate(payload) {
            return Transition::Moved { from, to: self.phase };
        }

        match from {
            Phase::Invalid => Transition::Idle,
            Phase::Constructing => {
                payload.construct();
                self.phase = Phase::Initializing;
                Transition::Moved { from, to: self.phase }
            }
            Phase::Initializing => {
                payload.initialize();
                if defer_on {
                    self.phase = Phase::Processing { on: false, paused: false };
                    self.defer_activation();
                } else {
                    self.phase = Phase::Processing { on: true, paused: false };
                    self.requests.turn_me_on = false;
                    payload.switched(true);
                }
                Transition::Moved { from, to: self.phase }
            }
            Phase::Processing { .. } => {
                if !self.spawning {
                    self.resolve_switch(payload);
                }
                self.resolve_pause();
                if let Phase::Processing { on: true, paused: false } = self.phase {
                    payload.process();
                }
                Transition::Stayed(self.phase)
            }
            Phase::Deinitializing { reached } => {
                if reached == Progress::Initialized {
                    payload.deinitialize();
                }
                self.phase = Phase::Destructing {
                    constructed: reached != Progress::Nothing,
                };
                Transition::Moved { from, to: self.phase }
            }
            Phase::Destructing { constructed } => {
                if constructed {
                    payload.destruct();
                }
                self.phase = Phase::Waiting;
                Transition::Moved { from, to: self.phase }
            }
            Phase::Waiting => Transition::Stayed(Phase::Waiting),
        }
    }

    /// Runs every remaining teardown step synchronously.
    pub(crate) fn tear_down<T: Lifecycle>(&mut self, payload: &mut T) {
        if !self.phase.is_valid() {
            return;
        }
        self.requests.kill_me = true;

        // grant, deinitialize, destruct
        for _ in 0..3 {
            if self.phase.is_killed() {
                break;
            }
            self.step(payload, false);
        }
    }

    /// Moves a live object into `Deinitializing`. Returns false if it is
    /// already past that point.
    fn grant_terminate<T: Lifecycle>(&mut self, payload: &mut T) -> bool {
        let reached = match self.phase {
            Phase::Constructing => Progress::Nothing,
            Phase::Initializing => Progress::Constructed,
            Phase::Processing { on, .. } => {
                if on {
                    payload.switched(false);
                }
                Progress::Initialized
            }
            _ => return false,
        };

        tracing::trace!("Terminate granted in {}", self.phase.name());

        self.phase = Phase::Deinitializing { reached };
        self.spawning = false;
        self.requests = Requests {
            kill_me: true,
            ..Requests::default()
        };
        true
    }

    /// Resolves pending on/off requests. `off` wins over `on`.
    fn resolve_switch<T: Lifecycle>(&mut self, payload: &mut T) -> bool {
        let Phase::Processing { on, paused } = self.phase else {
            return false;
        };
        if !self.requests.turn_me_on && !self.requests.turn_me_off {
            return false;
        }

        let next = !self.requests.turn_me_off;
        self.requests.turn_me_on = false;
        self.requests.turn_me_off = false;

        if next == on {
            return false;
        }
        self.phase = Phase::Processing { on: next, paused };
        payload.switched(next);
        true
    }

    /// Resolves pending pause requests. `pause` wins over `unpause`.
    fn resolve_pause(&mut self) {
        let Phase::Processing { on, .. } = self.phase else {
            return;
        };
        if !self.requests.pause_me && !self.requests.unpause_me {
            return;
        }

        let paused = self.requests.pause_me;
        self.requests.pause_me = false;
        self.requests.unpause_me = false;
        self.phase = Phase::Processing { on, paused };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Tracker {
        log: Vec<&'static str>,
    }

    impl Lifecycle for Tracker {
        fn construct(&mut self) {
            self.log.push("construct");
        }
        fn initialize(&mut self) {
            self.log.push("initialize");
        }
        fn process(&mut self) {
            self.log.push("process");
        }
        fn switched(&mut self, on: bool) {
            self.log.push(if on { "on" } else { "off" });
        }
        fn deinitialize(&mut self) {
            self.log.push("deinitialize");
        }
        fn destruct(&mut self) {
            self.log.push("destruct");
        }
    }

    fn started() -> (LifecycleState, Tracker) {
        let mut state = LifecycleState::default();
        state.begin();
        (state, Tracker::default())
    }

    #[test]
    fn test_one_transition_per_step() {
        let (mut state, mut tracker) = started();

        assert_eq!(state.step(&mut tracker, false).phase(), Phase::Initializing);
        assert_eq!(
            state.step(&mut tracker, false).phase(),
            Phase::Processing { on: true, paused: false }
        );
        assert_eq!(state.request_terminate(), Some(Outcome::Changed));
        assert!(matches!(state.step(&mut tracker, false).phase(), Phase::Deinitializing { .. }));
        assert!(matches!(state.step(&mut tracker, false).phase(), Phase::Destructing { .. }));
        assert_eq!(state.step(&mut tracker, false).phase(), Phase::Waiting);

        assert_eq!(
            tracker.log,
            ["construct", "initialize", "on", "off", "deinitialize", "destruct"]
        );
    }

    #[test]
    fn test_kill_while_constructing_runs_no_hooks() {
        let (mut state, mut tracker) = started();

        assert_eq!(state.request_terminate(), Some(Outcome::Changed));
        assert_eq!(
            state.step(&mut tracker, false).phase(),
            Phase::Deinitializing { reached: Progress::Nothing }
        );
        state.tear_down(&mut tracker);

        assert!(state.is_killed());
        assert!(tracker.log.is_empty());
    }

    #[test]
    fn test_kill_while_initializing_only_destructs() {
        let (mut state, mut tracker) = started();
        state.step(&mut tracker, false);

        state.tear_down(&mut tracker);

        assert!(state.is_killed());
        assert_eq!(tracker.log, ["construct", "destruct"]);
    }

    #[test]
    fn test_redundant_terminate_is_no_change() {
        let (mut state, _) = started();

        assert_eq!(state.request_terminate(), Some(Outcome::Changed));
        assert_eq!(state.request_terminate(), Some(Outcome::NoChange));

        let mut invalid = LifecycleState::default();
        assert_eq!(invalid.request_terminate(), None);
    }

    #[test]
    fn test_terminate_on_killed_is_no_change() {
        let (mut state, mut tracker) = started();
        state.tear_down(&mut tracker);

        assert_eq!(state.request_terminate(), Some(Outcome::NoChange));
        assert_eq!(state.request_on(true), None);
        assert_eq!(state.request_pause(true), None);
    }

    #[test]
    fn test_off_overrides_on() {
        let (mut state, mut tracker) = started();
        state.step(&mut tracker, false);
        state.step(&mut tracker, false);

        assert_eq!(state.request_on(true), Some(Outcome::NoChange));
        assert_eq!(state.request_on(false), Some(Outcome::Changed));
        assert_eq!(state.request_on(true), Some(Outcome::Changed));

        state.step(&mut tracker, false);
        assert_eq!(state.phase(), Phase::Processing { on: false, paused: false });
        assert_eq!(state.requests(), Requests::default());
    }

    #[test]
    fn test_pause_suspends_processing() {
        let (mut state, mut tracker) = started();
        state.step(&mut tracker, false);
        state.step(&mut tracker, false);

        assert_eq!(state.request_pause(true), Some(Outcome::Changed));
        state.step(&mut tracker, false);
        assert!(state.phase().is_paused());
        assert!(!tracker.log.contains(&"process"));

        assert_eq!(state.request_pause(false), Some(Outcome::Changed));
        state.step(&mut tracker, false);
        assert_eq!(tracker.log.last(), Some(&"process"));
    }

    #[test]
    fn test_deferred_activation() {
        let (mut state, mut tracker) = started();
        state.step(&mut tracker, true);
        state.step(&mut tracker, true);

        assert_eq!(state.phase(), Phase::Processing { on: false, paused: false });
        assert!(state.is_spawning());

        // a spawning object is not switched by its own step
        state.step(&mut tracker, true);
        assert!(!state.is_on());

        assert!(state.finish_spawn(&mut tracker));
        assert!(state.is_on());
        assert!(!state.is_spawning());
    }
}
