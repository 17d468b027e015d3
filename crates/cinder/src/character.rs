//! # Characters
//!
//! Player and AI controlled creatures. Gameplay rules (movement, combat,
//! inventory) live elsewhere; this is only what the pool needs to spawn,
//! age and retire a character.

use cinder_core::{Lifecycle, Pool};

/// Storage size of the character pool.
pub const MAX_CHARACTERS: usize = 512;

/// Pool of all characters in a world.
pub type CharacterPool = Pool<Character, MAX_CHARACTERS>;

/// Team a character fights for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TeamId(pub u8);

impl TeamId {
    /// Characters on no team.
    pub const NEUTRAL: Self = Self(0);
}

/// A character payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Character {
    /// Display name.
    pub name: String,
    /// Current life. The character dies at zero.
    pub life: i32,
    /// Life restored on initialization.
    pub max_life: i32,
    /// Team membership.
    pub team: TeamId,
    /// Ticks spent processing.
    pub age_ticks: u32,
}

impl Character {
    /// Returns true once life has run out.
    #[inline]
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.life <= 0
    }

    /// Applies damage. Returns true if this blow was fatal.
    pub fn damage(&mut self, amount: i32) -> bool {
        let was_alive = !self.is_dead();
        self.life = self.life.saturating_sub(amount);
        was_alive && self.is_dead()
    }
}

impl Lifecycle for Character {
    fn initialize(&mut self) {
        self.life = self.max_life;
    }

    fn process(&mut self) {
        self.age_ticks = self.age_ticks.saturating_add(1);
    }

    fn is_well_formed(&self) -> bool {
        self.max_life > 0
    }
}

/// Everything needed to spawn a character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterSpawn {
    /// Display name.
    pub name: String,
    /// Starting and maximum life.
    pub max_life: i32,
    /// Team membership.
    pub team: TeamId,
}

impl CharacterSpawn {
    /// Creates a neutral spawn request.
    #[must_use]
    pub fn new(name: impl Into<String>, max_life: i32) -> Self {
        Self {
            name: name.into(),
            max_life,
            team: TeamId::NEUTRAL,
        }
    }

    /// Sets the team.
    #[must_use]
    pub fn on_team(mut self, team: TeamId) -> Self {
        self.team = team;
        self
    }

    pub(crate) fn apply(self, character: &mut Character) {
        character.name = self.name;
        character.max_life = self.max_life;
        character.team = self.team;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_restores_life() {
        let mut character = Character {
            max_life: 30,
            ..Character::default()
        };
        character.initialize();
        assert_eq!(character.life, 30);
    }

    #[test]
    fn test_fatal_damage_reported_once() {
        let mut character = Character {
            life: 10,
            max_life: 10,
            ..Character::default()
        };

        assert!(!character.damage(4));
        assert!(character.damage(6));
        assert!(!character.damage(1));
        assert!(character.is_dead());
    }

    #[test]
    fn test_zero_max_life_is_ill_formed() {
        assert!(!Character::default().is_well_formed());
    }
}
