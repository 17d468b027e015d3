//! # World
//!
//! Owns the character, enchantment and particle pools and ticks them in a
//! fixed order:
//!
//! 1. Characters (dead characters request termination)
//! 2. Enchantments (expired or target gone: terminate)
//! 3. Particles (expired or host gone: terminate)
//! 4. Every `reconcile_interval` ticks, a consistency pass over all pools
//!
//! Because characters run first, an enchantment sees its target's death in
//! the same tick.

use cinder_core::{
    AllocationPolicy, Lifecycle, Outcome, Pool, PoolError, PoolResult, ReconcileReport, SlotRef,
    TickReport,
};

use crate::character::{Character, CharacterPool, CharacterSpawn};
use crate::config::{PoolKind, WorldConfig};
use crate::enchant::{EnchantPool, EnchantSpawn};
use crate::error::{ConfigResult, SpawnError, SpawnResult};
use crate::particle::{ParticlePool, ParticleSpawn, ProfileId};

/// Summary of one world tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldTickReport {
    /// The tick number, starting at 1.
    pub tick: u64,
    /// Character pass.
    pub characters: TickReport,
    /// Enchantment pass.
    pub enchants: TickReport,
    /// Particle pass.
    pub particles: TickReport,
    /// Ill-formed objects reclaimed by the consistency pass, if it ran.
    pub reclaimed: usize,
}

/// All pooled game objects of one simulation.
pub struct World {
    config: WorldConfig,
    characters: CharacterPool,
    enchants: EnchantPool,
    particles: ParticlePool,
    ticks: u64,
}

impl World {
    /// Creates a world with the default config.
    #[must_use]
    pub fn new() -> Self {
        let config = WorldConfig::default();
        let policy = |kind| AllocationPolicy::with_reserve(config.reserve(kind));

        let world = Self {
            characters: Pool::with_policy(policy(PoolKind::Characters)),
            enchants: Pool::with_policy(policy(PoolKind::Enchants)),
            particles: Pool::with_policy(policy(PoolKind::Particles)),
            config,
            ticks: 0,
        };
        world.log_sizing();
        world
    }

    /// Creates a world sized by `config`.
    ///
    /// # Errors
    ///
    /// Any validation error of the config.
    pub fn with_config(config: WorldConfig) -> ConfigResult<Self> {
        let mut world = Self::new();
        world.apply_config(config)?;
        Ok(world)
    }

    /// Resizes the pools of a running world.
    ///
    /// Shrinking never evicts: objects above a lowered capacity keep
    /// running and their slots are parked once freed.
    ///
    /// # Errors
    ///
    /// Any validation error of the config.
    pub fn apply_config(&mut self, config: WorldConfig) -> ConfigResult<()> {
        config.validate()?;

        configure(&mut self.characters, &config, PoolKind::Characters)?;
        configure(&mut self.enchants, &config, PoolKind::Enchants)?;
        configure(&mut self.particles, &config, PoolKind::Particles)?;

        self.config = config;
        self.log_sizing();
        Ok(())
    }

    fn log_sizing(&self) {
        tracing::info!(
            "World sized: {} characters, {} enchants, {} particles ({} reserved)",
            self.characters.capacity(),
            self.enchants.capacity(),
            self.particles.capacity(),
            self.particles.policy().reserve
        );
    }

    /// Returns the active config.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Returns the number of ticks run so far.
    #[inline]
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Returns the character pool.
    #[inline]
    #[must_use]
    pub const fn characters(&self) -> &CharacterPool {
        &self.characters
    }

    /// Returns the character pool mutably.
    #[inline]
    pub fn characters_mut(&mut self) -> &mut CharacterPool {
        &mut self.characters
    }

    /// Returns the enchantment pool.
    #[inline]
    #[must_use]
    pub const fn enchants(&self) -> &EnchantPool {
        &self.enchants
    }

    /// Returns the enchantment pool mutably.
    #[inline]
    pub fn enchants_mut(&mut self) -> &mut EnchantPool {
        &mut self.enchants
    }

    /// Returns the particle pool.
    #[inline]
    #[must_use]
    pub const fn particles(&self) -> &ParticlePool {
        &self.particles
    }

    /// Returns the particle pool mutably.
    #[inline]
    pub fn particles_mut(&mut self) -> &mut ParticlePool {
        &mut self.particles
    }

    // =========================================================================
    // Spawning
    // =========================================================================

    /// Spawns a character and switches it on.
    ///
    /// # Errors
    ///
    /// `NonPositiveLife` if `max_life <= 0`, `Exhausted` if the character
    /// pool is full.
    pub fn spawn_character(&mut self, spawn: CharacterSpawn) -> SpawnResult<SlotRef> {
        check_character(&spawn)?;
        let handle = self.characters.allocate()?;
        self.finish_character(handle, spawn)
    }

    /// Spawns a character into a specific slot, e.g. when restoring a save.
    ///
    /// # Errors
    ///
    /// `NonPositiveLife` if `max_life <= 0`, `OutOfRange` or `SlotOccupied`
    /// if the slot cannot be taken.
    pub fn spawn_character_at(&mut self, index: usize, spawn: CharacterSpawn) -> SpawnResult<SlotRef> {
        check_character(&spawn)?;
        let handle = self.characters.allocate_at(index)?;
        self.finish_character(handle, spawn)
    }

    fn finish_character(&mut self, handle: SlotRef, spawn: CharacterSpawn) -> SpawnResult<SlotRef> {
        spawn.apply(self.characters.get_mut(handle)?);
        self.characters.activate(handle)?;
        tracing::debug!("Spawned character {}", handle);
        Ok(handle)
    }

    /// Spawns an enchantment on a live character.
    ///
    /// # Errors
    ///
    /// A handle error if the target is not a live character, `Exhausted`
    /// if the enchantment pool is full.
    pub fn spawn_enchant(&mut self, spawn: EnchantSpawn) -> PoolResult<SlotRef> {
        require_live(&self.characters, spawn.target)?;

        let handle = self.enchants.allocate()?;
        spawn.apply(self.enchants.get_mut(handle)?);
        self.enchants.activate(handle)?;

        tracing::debug!("Spawned enchant {} on {}", handle, spawn.target);
        Ok(handle)
    }

    /// Spawns a particle.
    ///
    /// Forced spawns evict another particle when the pool is full.
    ///
    /// # Errors
    ///
    /// A handle error if the particle is attached to a character that is
    /// not alive, `Exhausted` if no slot can be found.
    pub fn spawn_particle(&mut self, spawn: ParticleSpawn) -> PoolResult<SlotRef> {
        if !spawn.attached_to.is_null() {
            require_live(&self.characters, spawn.attached_to)?;
        }

        let handle = if spawn.forced {
            self.particles.allocate_forced()?
        } else {
            self.particles.allocate()?
        };
        spawn.apply(self.particles.get_mut(handle)?);
        self.particles.activate(handle)?;

        tracing::trace!("Spawned particle {} from profile {}", handle, spawn.profile.0);
        Ok(handle)
    }

    // =========================================================================
    // Gameplay hooks
    // =========================================================================

    /// Damages a character. Returns true if the blow was fatal.
    ///
    /// The character is retired on the next tick.
    ///
    /// # Errors
    ///
    /// Any handle error.
    pub fn damage_character(&mut self, handle: SlotRef, amount: i32) -> PoolResult<bool> {
        Ok(self.characters.get_mut(handle)?.damage(amount))
    }

    /// Asks a character to leave the world.
    ///
    /// # Errors
    ///
    /// Any handle error.
    pub fn kill_character(&mut self, handle: SlotRef) -> PoolResult<Outcome> {
        self.characters.request_terminate(handle)
    }

    /// Marks every particle spawned from `profile` as orphaned.
    ///
    /// Orphaned particles are ill-formed: the next consistency pass frees
    /// them, and forced spawns evict them first. Returns how many particles
    /// were affected.
    pub fn unload_particle_profile(&mut self, profile: ProfileId) -> usize {
        let affected: Vec<SlotRef> = self
            .particles
            .iter_used()
            .filter(|(_, particle)| particle.profile == Some(profile) && !particle.orphaned)
            .map(|(handle, _)| handle)
            .collect();

        for &handle in &affected {
            if let Ok(particle) = self.particles.get_mut(handle) {
                particle.orphaned = true;
            }
        }

        tracing::info!(
            "Unloaded particle profile {}: {} particle(s) orphaned",
            profile.0,
            affected.len()
        );
        affected.len()
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advances every object in the world by one step.
    pub fn tick(&mut self) -> WorldTickReport {
        self.ticks += 1;

        let characters = self.characters.run_tick(|guard, handle| {
            if guard.get(handle).is_ok_and(Character::is_dead) {
                let _ = guard.request_terminate(handle);
            }
        });

        let roster = &self.characters;

        let enchants = self.enchants.run_tick(|guard, handle| {
            let Ok(enchant) = guard.get(handle) else {
                return;
            };
            if enchant.is_expired() || !is_live(roster, enchant.target) {
                let _ = guard.request_terminate(handle);
            }
        });

        let particles = self.particles.run_tick(|guard, handle| {
            let Ok(particle) = guard.get(handle) else {
                return;
            };
            let host_gone = !particle.attached_to.is_null() && !is_live(roster, particle.attached_to);
            if particle.is_expired() || host_gone {
                let _ = guard.request_terminate(handle);
            }
        });

        let interval = self.config.reconcile_interval;
        let reclaimed = if interval > 0 && self.ticks % interval == 0 {
            match self.reconcile() {
                Ok(report) => report.reclaimed,
                Err(err) => {
                    tracing::warn!("Consistency pass skipped: {}", err);
                    0
                }
            }
        } else {
            0
        };

        WorldTickReport {
            tick: self.ticks,
            characters,
            enchants,
            particles,
            reclaimed,
        }
    }

    /// Runs the consistency pass over every pool.
    ///
    /// # Errors
    ///
    /// `LoopActive` if a pool is being iterated.
    pub fn reconcile(&mut self) -> PoolResult<ReconcileReport> {
        let reports = [
            self.characters.reconcile()?,
            self.enchants.reconcile()?,
            self.particles.reconcile()?,
        ];

        let total = reports
            .iter()
            .fold(ReconcileReport::default(), |mut total, report| {
                total.reclaimed += report.reclaimed;
                total.repaired += report.repaired;
                total
            });

        if !total.is_clean() {
            tracing::warn!(
                "Consistency pass: {} reclaimed, {} repaired",
                total.reclaimed,
                total.repaired
            );
        }
        Ok(total)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

fn configure<T: Lifecycle, const N: usize>(
    pool: &mut Pool<T, N>,
    config: &WorldConfig,
    kind: PoolKind,
) -> ConfigResult<()> {
    pool.set_capacity(config.pool(kind).capacity)?;
    pool.set_policy(AllocationPolicy::with_reserve(config.reserve(kind)));
    Ok(())
}

/// Rejects spawns that would produce an ill-formed character.
fn check_character(spawn: &CharacterSpawn) -> SpawnResult<()> {
    if spawn.max_life <= 0 {
        tracing::warn!("Refused character {:?}: max life {}", spawn.name, spawn.max_life);
        return Err(SpawnError::NonPositiveLife {
            max_life: spawn.max_life,
        });
    }
    Ok(())
}

/// Returns true if `handle` names an object that is not on its way out.
fn is_live<T: Lifecycle, const N: usize>(pool: &Pool<T, N>, handle: SlotRef) -> bool {
    pool.lifecycle(handle).is_ok_and(|state| !state.is_dying())
}

fn require_live<T: Lifecycle, const N: usize>(pool: &Pool<T, N>, handle: SlotRef) -> PoolResult<()> {
    if pool.lifecycle(handle)?.is_dying() {
        return Err(PoolError::InvalidObject {
            index: handle.index(),
        });
    }
    Ok(())
}
