//! # LIMINAL Rules
//!
//! The balance brain of the world: how dangerous it is, and what shows up.
//!
//! ## Core Components
//!
//! - `LevelConfig` / `LevelRegistry`: per-level tables loaded from TOML
//! - `CorruptionModel`: the per-level scalar that only goes up during a run
//! - `EntitySpawner`: corruption-adjusted spawn rolls per sub-chunk
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = LevelRegistry::from_toml_str(&std::fs::read_to_string("data/levels.toml")?)?;
//! let level = registry.require(LevelId(0))?;
//! let spawner = EntitySpawner::new(level_seed);
//! let placements = spawner.spawn_in_chunk(&chunk, level, corruption.get(LevelId(0)));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod corruption;
pub mod error;
pub mod spawner;

pub use config::{CorruptionSettings, LevelConfig, LevelRegistry, MazeParams, SpawnCategory, SpawnEntry};
pub use corruption::CorruptionModel;
pub use error::{ConfigError, RulesResult};
pub use spawner::{EntitySpawner, SpawnPlacement};
