//! # Enchantments
//!
//! Timed or permanent effects bound to a target character. An enchantment
//! only holds a handle to its target; the world checks that handle every
//! tick and retires enchantments whose target is gone.

use cinder_core::{Lifecycle, Pool, SlotRef};

/// Storage size of the enchantment pool.
pub const MAX_ENCHANTS: usize = 256;

/// Pool of all enchantments in a world.
pub type EnchantPool = Pool<Enchant, MAX_ENCHANTS>;

/// An enchantment payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Enchant {
    /// The character the enchantment is applied to.
    pub target: SlotRef,
    /// The character that cast it, if any.
    pub owner: SlotRef,
    /// Ticks left, or `None` for a permanent enchantment.
    pub remaining: Option<u32>,
    expired: bool,
}

impl Enchant {
    /// Returns true once the duration has run out.
    #[inline]
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        self.expired
    }
}

impl Lifecycle for Enchant {
    fn process(&mut self) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            self.expired = *remaining == 0;
        }
    }

    fn is_well_formed(&self) -> bool {
        !self.target.is_null()
    }
}

/// Everything needed to spawn an enchantment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnchantSpawn {
    /// The character to enchant.
    pub target: SlotRef,
    /// The caster.
    pub owner: SlotRef,
    /// Duration in ticks, or `None` for permanent.
    pub duration: Option<u32>,
}

impl EnchantSpawn {
    /// Creates a permanent enchantment on `target`.
    #[must_use]
    pub const fn permanent(target: SlotRef) -> Self {
        Self {
            target,
            owner: SlotRef::NULL,
            duration: None,
        }
    }

    /// Creates an enchantment on `target` lasting `ticks`.
    #[must_use]
    pub const fn timed(target: SlotRef, ticks: u32) -> Self {
        Self {
            target,
            owner: SlotRef::NULL,
            duration: Some(ticks),
        }
    }

    /// Sets the caster.
    #[must_use]
    pub const fn cast_by(mut self, owner: SlotRef) -> Self {
        self.owner = owner;
        self
    }

    pub(crate) fn apply(self, enchant: &mut Enchant) {
        enchant.target = self.target;
        enchant.owner = self.owner;
        enchant.remaining = self.duration;
        enchant.expired = self.duration == Some(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_enchant_expires() {
        let mut enchant = Enchant::default();
        EnchantSpawn::timed(SlotRef::new(0, 1), 2).apply(&mut enchant);

        enchant.process();
        assert!(!enchant.is_expired());
        enchant.process();
        assert!(enchant.is_expired());
    }

    #[test]
    fn test_permanent_never_expires() {
        let mut enchant = Enchant::default();
        EnchantSpawn::permanent(SlotRef::new(0, 1)).apply(&mut enchant);

        for _ in 0..100 {
            enchant.process();
        }
        assert!(!enchant.is_expired());
    }

    #[test]
    fn test_untargeted_is_ill_formed() {
        assert!(!Enchant::default().is_well_formed());
    }
}
