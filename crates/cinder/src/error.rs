//! # World Error Types
//!
//! All errors that can occur while configuring or populating a world.

use std::path::PathBuf;

use cinder_core::PoolError;
use thiserror::Error;

use crate::config::PoolKind;

/// Errors that can occur while loading or applying a world config.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config text is not valid TOML for a world config.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be written out as TOML.
    #[error("failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A pool was sized beyond its compile-time storage.
    #[error("{pool} capacity {requested} exceeds maximum {max}")]
    CapacityOutOfBounds {
        /// The pool being configured.
        pool: PoolKind,
        /// The requested capacity.
        requested: usize,
        /// The storage size of the pool.
        max: usize,
    },

    /// A pool's reserve would leave nothing for unforced allocation.
    #[error("{pool} reserve {reserve} must be below capacity {capacity}")]
    ReserveTooLarge {
        /// The pool being configured.
        pool: PoolKind,
        /// The requested reserve.
        reserve: usize,
        /// The configured capacity.
        capacity: usize,
    },

    /// The pool refused the configured values.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while spawning into a world.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// A character must start with positive life.
    #[error("character max life must be positive, got {max_life}")]
    NonPositiveLife {
        /// The rejected value.
        max_life: i32,
    },

    /// The pool refused the allocation.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Result type for spawn operations.
pub type SpawnResult<T> = Result<T, SpawnError>;
