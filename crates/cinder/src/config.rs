//! # World Configuration
//!
//! Pool sizing for a world, loaded once at startup from TOML:
//!
//! ```toml
//! reconcile_interval = 60
//!
//! [characters]
//! capacity = 256
//!
//! [particles]
//! capacity = 512
//! reserve = 64
//! ```
//!
//! Missing tables fall back to the defaults. A pool without an explicit
//! `reserve` gets none, except particles, which hold back a quarter of
//! their capacity for forced effects.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::character::MAX_CHARACTERS;
use crate::enchant::MAX_ENCHANTS;
use crate::error::{ConfigError, ConfigResult};
use crate::particle::MAX_PARTICLES;

/// Default number of ticks between consistency passes.
pub const DEFAULT_RECONCILE_INTERVAL: u64 = 60;

/// The three pools of a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Characters.
    Characters,
    /// Enchantments.
    Enchants,
    /// Particles.
    Particles,
}

impl PoolKind {
    /// Returns the storage size of the pool.
    #[must_use]
    pub const fn max_capacity(self) -> usize {
        match self {
            Self::Characters => MAX_CHARACTERS,
            Self::Enchants => MAX_ENCHANTS,
            Self::Particles => MAX_PARTICLES,
        }
    }

    /// Returns the config table name of the pool.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Characters => "characters",
            Self::Enchants => "enchants",
            Self::Particles => "particles",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sizing of a single pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Logical capacity.
    pub capacity: usize,
    /// Slots held back from unforced allocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve: Option<usize>,
}

impl PoolConfig {
    /// Creates a pool config with the default reserve.
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            reserve: None,
        }
    }
}

/// Sizing and maintenance settings for a world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Ticks between consistency passes. Zero disables them.
    pub reconcile_interval: u64,
    /// Character pool sizing.
    pub characters: PoolConfig,
    /// Enchantment pool sizing.
    pub enchants: PoolConfig,
    /// Particle pool sizing.
    pub particles: PoolConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            characters: PoolConfig::with_capacity(MAX_CHARACTERS),
            enchants: PoolConfig::with_capacity(MAX_ENCHANTS),
            particles: PoolConfig::with_capacity(MAX_PARTICLES),
        }
    }
}

impl WorldConfig {
    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// `Parse` for malformed TOML, or any validation error.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config from a file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded world config from {}", path.display());
        Ok(config)
    }

    /// Writes the config out as TOML.
    ///
    /// # Errors
    ///
    /// `Serialize` if the config cannot be represented.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Returns the sizing of one pool.
    #[must_use]
    pub const fn pool(&self, kind: PoolKind) -> PoolConfig {
        match kind {
            PoolKind::Characters => self.characters,
            PoolKind::Enchants => self.enchants,
            PoolKind::Particles => self.particles,
        }
    }

    /// Returns the reserve a pool ends up with.
    #[must_use]
    pub fn reserve(&self, kind: PoolKind) -> usize {
        let pool = self.pool(kind);
        match (pool.reserve, kind) {
            (Some(reserve), _) => reserve,
            (None, PoolKind::Particles) => pool.capacity / 4,
            (None, _) => 0,
        }
    }

    /// Checks every pool against its storage size.
    ///
    /// # Errors
    ///
    /// `CapacityOutOfBounds` or `ReserveTooLarge` for the first pool that
    /// does not fit.
    pub fn validate(&self) -> ConfigResult<()> {
        for kind in [PoolKind::Characters, PoolKind::Enchants, PoolKind::Particles] {
            let capacity = self.pool(kind).capacity;
            if capacity > kind.max_capacity() {
                return Err(ConfigError::CapacityOutOfBounds {
                    pool: kind,
                    requested: capacity,
                    max: kind.max_capacity(),
                });
            }

            let reserve = self.reserve(kind);
            if reserve > 0 && reserve >= capacity {
                return Err(ConfigError::ReserveTooLarge {
                    pool: kind,
                    reserve,
                    capacity,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reserve(PoolKind::Particles), MAX_PARTICLES / 4);
        assert_eq!(config.reserve(PoolKind::Characters), 0);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = WorldConfig::from_toml_str(
            r"
            reconcile_interval = 10

            [particles]
            capacity = 128
            ",
        )
        .unwrap();

        assert_eq!(config.reconcile_interval, 10);
        assert_eq!(config.particles.capacity, 128);
        assert_eq!(config.reserve(PoolKind::Particles), 32);
        assert_eq!(config.characters, PoolConfig::with_capacity(MAX_CHARACTERS));
    }

    #[test]
    fn test_explicit_reserve_wins() {
        let config = WorldConfig::from_toml_str(
            r"
            [particles]
            capacity = 100
            reserve = 0
            ",
        )
        .unwrap();

        assert_eq!(config.reserve(PoolKind::Particles), 0);
    }

    #[test]
    fn test_capacity_out_of_bounds() {
        let err = WorldConfig::from_toml_str("[enchants]\ncapacity = 9999\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::CapacityOutOfBounds {
                pool: PoolKind::Enchants,
                requested: 9999,
                ..
            }
        ));
        assert_eq!(err.to_string(), "enchants capacity 9999 exceeds maximum 256");
    }

    #[test]
    fn test_reserve_too_large() {
        let err = WorldConfig::from_toml_str("[characters]\ncapacity = 4\nreserve = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::ReserveTooLarge { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = WorldConfig::from_toml_str("characters = 12").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_written_config_reads_back() {
        let mut config = WorldConfig::default();
        config.enchants.reserve = Some(8);

        let text = config.to_toml_string().unwrap();
        assert_eq!(WorldConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = WorldConfig::from_path(Path::new("/nonexistent/cinder/world.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
