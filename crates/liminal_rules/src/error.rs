//! # Rules Error Types
//!
//! Everything that can be wrong with a level config. All of these are raised
//! at load time; the spawner itself cannot fail.

use liminal_core::LevelId;
use thiserror::Error;

/// Errors raised while loading or validating level configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The TOML document could not be parsed or did not match the schema.
    #[error("failed to parse level config: {0}")]
    Parse(String),

    /// A spawn entry's base probability is outside `[0, 1]` or not finite.
    #[error("spawn entry `{type_id}`: base probability {value} outside [0, 1]")]
    InvalidProbability {
        /// The offending entry.
        type_id: String,
        /// The configured value.
        value: f64,
    },

    /// A spawn entry's corruption multiplier is not finite.
    #[error("spawn entry `{type_id}`: corruption multiplier must be finite")]
    InvalidMultiplier {
        /// The offending entry.
        type_id: String,
    },

    /// A spawn entry's minimum corruption is negative or not finite.
    #[error("spawn entry `{type_id}`: min corruption {value} must be finite and >= 0")]
    InvalidMinCorruption {
        /// The offending entry.
        type_id: String,
        /// The configured value.
        value: f32,
    },

    /// A spawn entry has no type id.
    #[error("spawn entry in {0} has an empty type id")]
    EmptyTypeId(LevelId),

    /// Corruption increment or cap is unusable.
    #[error("{level}: invalid corruption settings: {reason}")]
    InvalidCorruption {
        /// Level being validated.
        level: LevelId,
        /// What is wrong.
        reason: String,
    },

    /// Maze parameters are out of range.
    #[error("{level}: invalid maze parameters: {reason}")]
    InvalidMaze {
        /// Level being validated.
        level: LevelId,
        /// What is wrong.
        reason: String,
    },

    /// The config was written for a different chunk size.
    #[error("{level}: chunk size {found} does not match engine chunk size {expected}")]
    ChunkSizeMismatch {
        /// Level being validated.
        level: LevelId,
        /// Size found in the file.
        found: usize,
        /// Size compiled into the engine.
        expected: usize,
    },

    /// `placement_attempts` must allow at least one try.
    #[error("{0}: placement attempts must be at least 1")]
    InvalidPlacementAttempts(LevelId),

    /// Two levels share an id.
    #[error("duplicate {0}")]
    DuplicateLevel(LevelId),

    /// A level id was requested that is not configured.
    #[error("unknown {0}")]
    UnknownLevel(LevelId),

    /// The registry contains no levels.
    #[error("no levels configured")]
    NoLevels,
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type for rules operations.
pub type RulesResult<T> = Result<T, ConfigError>;
