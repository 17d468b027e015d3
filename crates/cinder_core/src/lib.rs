//! # CINDER Core
//!
//! Lifecycle engine for pooled game objects. One generic [`Pool`] is
//! instantiated per object kind (characters, enchantments, particles):
//!
//! - Fixed storage, allocated once; no heap traffic while playing
//! - Generation-checked [`SlotRef`] handles that fail closed when stale
//! - A per-object [`Phase`] state machine advanced one step per tick
//! - Deferred frees and activations while a [`LoopGuard`] is open
//!
//! ## Architecture Rules
//!
//! 1. **Scoped loops** - Iteration requires a guard; the guard's drop
//!    applies everything deferred during the pass
//! 2. **No ambient state** - Every pool owns its own queues and counters
//! 3. **Redundant is not an error** - Repeated requests return
//!    [`Outcome::NoChange`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use cinder_core::{Lifecycle, Pool};
//!
//! #[derive(Default)]
//! struct Ember { heat: u32 }
//! impl Lifecycle for Ember {}
//!
//! let mut pool: Pool<Ember, 128> = Pool::new();
//! let ember = pool.allocate()?;
//! pool.activate(ember)?;
//! pool.run_tick(|_, _| {});
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod container;
pub mod deferred;
pub mod driver;
pub mod error;
pub mod evict;
pub mod handle;
pub mod lifecycle;
pub mod pool;
mod used;

pub use container::Container;
pub use deferred::{LoopGuard, PendingQueue, UsedCursor};
pub use driver::TickReport;
pub use error::{Outcome, PoolError, PoolResult};
pub use evict::{Evictable, Victim};
pub use handle::SlotRef;
pub use lifecycle::{Lifecycle, LifecycleState, Phase, Progress, Requests, Transition};
pub use pool::{AllocationPolicy, Pool, ReconcileReport};
