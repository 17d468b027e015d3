//! # Particles
//!
//! Short-lived visual effects. Particles are the only kind that can be
//! evicted: when the pool is full, a forced spawn reclaims the particle
//! closest to disappearing anyway.
//!
//! A particle expires when `lifetime_remaining` reaches zero, then keeps
//! its slot while the rest of its animation (`frames_remaining`) fades out.

use cinder_core::{Evictable, Lifecycle, Pool, SlotRef};

/// Storage size of the particle pool.
pub const MAX_PARTICLES: usize = 512;

/// Pool of all particles in a world.
pub type ParticlePool = Pool<Particle, MAX_PARTICLES>;

/// Identifies a loaded particle profile (sprite, physics, sounds).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileId(pub u16);

/// A particle payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Particle {
    /// The profile this particle was spawned from.
    pub profile: Option<ProfileId>,
    /// Ticks until the particle expires.
    pub lifetime_remaining: u32,
    /// Animation frames left to show.
    pub frames_remaining: u32,
    /// Forced particles are never evicted while alive.
    pub forced: bool,
    /// Character the particle follows, or null.
    pub attached_to: SlotRef,
    /// Set when the profile was unloaded under the particle.
    pub orphaned: bool,
}

impl Particle {
    /// Returns true once the lifetime has run out.
    #[inline]
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        self.lifetime_remaining == 0
    }
}

impl Lifecycle for Particle {
    fn process(&mut self) {
        self.lifetime_remaining = self.lifetime_remaining.saturating_sub(1);
        self.frames_remaining = self.frames_remaining.saturating_sub(1);
    }

    fn is_well_formed(&self) -> bool {
        self.profile.is_some() && !self.orphaned
    }

    fn linger(&mut self) -> bool {
        self.frames_remaining = self.frames_remaining.saturating_sub(1);
        self.frames_remaining > 0
    }
}

impl Evictable for Particle {
    fn is_forced(&self) -> bool {
        self.forced
    }

    fn lifetime_remaining(&self) -> u32 {
        self.lifetime_remaining
    }

    fn frames_remaining(&self) -> u32 {
        self.frames_remaining
    }
}

/// Everything needed to spawn a particle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParticleSpawn {
    /// The profile to spawn from.
    pub profile: ProfileId,
    /// Lifetime in ticks.
    pub lifetime: u32,
    /// Animation length in frames.
    pub frames: u32,
    /// Spawn even if it means evicting another particle.
    pub forced: bool,
    /// Character to follow, or null.
    pub attached_to: SlotRef,
}

impl ParticleSpawn {
    /// Creates an unforced, unattached spawn request.
    #[must_use]
    pub const fn new(profile: ProfileId, lifetime: u32, frames: u32) -> Self {
        Self {
            profile,
            lifetime,
            frames,
            forced: false,
            attached_to: SlotRef::NULL,
        }
    }

    /// Marks the spawn as forced.
    #[must_use]
    pub const fn forced(mut self) -> Self {
        self.forced = true;
        self
    }

    /// Attaches the particle to a character.
    #[must_use]
    pub const fn attached_to(mut self, character: SlotRef) -> Self {
        self.attached_to = character;
        self
    }

    pub(crate) fn apply(self, particle: &mut Particle) {
        particle.profile = Some(self.profile);
        particle.lifetime_remaining = self.lifetime;
        particle.frames_remaining = self.frames;
        particle.forced = self.forced;
        particle.attached_to = self.attached_to;
        particle.orphaned = false;
    }
}
