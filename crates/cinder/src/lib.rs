//! # CINDER
//!
//! Characters, enchantments and particles, each in its own
//! [`cinder_core::Pool`], ticked together by a [`World`].
//!
//! ## Architecture Rules
//!
//! 1. **Handles, not references** - Enchantments and particles point at
//!    characters through [`SlotRef`]s that the world revalidates every tick
//! 2. **Fixed tick order** - Characters, then enchantments, then particles
//! 3. **External configuration** - Pool sizing comes from TOML, loaded once
//!
//! ## Example
//!
//! ```rust,ignore
//! use cinder::{CharacterSpawn, EnchantSpawn, World, WorldConfig};
//!
//! let config = WorldConfig::from_path(Path::new("data/world.toml"))?;
//! let mut world = World::with_config(config)?;
//!
//! let hero = world.spawn_character(CharacterSpawn::new("hero", 40))?;
//! world.spawn_enchant(EnchantSpawn::timed(hero, 300))?;
//!
//! loop {
//!     world.tick();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod character;
pub mod config;
pub mod enchant;
pub mod error;
pub mod particle;
pub mod world;

pub use character::{Character, CharacterPool, CharacterSpawn, TeamId, MAX_CHARACTERS};
pub use cinder_core::{Outcome, Phase, PoolError, PoolResult, SlotRef};
pub use config::{PoolConfig, PoolKind, WorldConfig};
pub use enchant::{Enchant, EnchantPool, EnchantSpawn, MAX_ENCHANTS};
pub use error::{ConfigError, ConfigResult, SpawnError, SpawnResult};
pub use particle::{Particle, ParticlePool, ParticleSpawn, ProfileId, MAX_PARTICLES};
pub use world::{World, WorldTickReport};
