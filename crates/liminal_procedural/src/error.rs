//! # World Error Types

use liminal_core::{LevelId, Side};
use liminal_rules::ConfigError;
use thiserror::Error;

/// Errors from producing a single chunk's tiles.
///
/// The chunk manager recovers from all of these by re-queueing the chunk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// An opening does not sit on an odd, non-corner border offset.
    #[error("opening on {side:?} border at offset {offset} is not a valid cell offset")]
    InvalidOpening {
        /// Border the opening was requested on.
        side: Side,
        /// Requested offset along that border.
        offset: usize,
    },

    /// The background worker is gone.
    #[error("generation worker disconnected")]
    WorkerDisconnected,

    /// The generator refused the request.
    #[error("generator rejected chunk ({x}, {y}): {reason}")]
    Rejected {
        /// Chunk X.
        x: i32,
        /// Chunk Y.
        y: i32,
        /// Why.
        reason: String,
    },
}

/// Errors from configuring or driving the world.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Level tables are malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The active area alone does not fit in the chunk cache.
    #[error("active area needs {required} chunks but max_loaded_chunks is {max}")]
    CacheOverflow {
        /// Chunks inside the active radius.
        required: usize,
        /// Configured cap.
        max: usize,
    },

    /// Radii are not ordered `active <= generation < unload`.
    #[error("invalid radii: active {active}, generation {generation}, unload {unload}")]
    InvalidRadii {
        /// Active radius.
        active: u32,
        /// Generation radius.
        generation: u32,
        /// Unload radius.
        unload: u32,
    },

    /// Any other out-of-range world setting.
    #[error("invalid world config: {0}")]
    InvalidConfig(String),

    /// The level is not in the registry.
    #[error("unknown {0}")]
    UnknownLevel(LevelId),

    /// Tile generation failed outside the streaming loop.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Reading a config file failed.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
