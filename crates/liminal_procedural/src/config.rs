//! # World Configuration
//!
//! Streaming radii, cache limits and the per-tick budget, plus the combined
//! [`GameConfig`] that pairs them with the level tables.
//!
//! All radii are Euclidean distances in chunk units, measured from the
//! observer's chunk.

use std::path::Path;
use std::time::Duration;

use liminal_core::LevelId;
use liminal_rules::{LevelConfig, LevelRegistry};
use serde::{Deserialize, Serialize};

use crate::error::{WorldError, WorldResult};

/// Streaming and cache settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Run seed. Every level derives its own stream from it.
    pub seed: u64,
    /// Level the run starts on.
    pub start_level: u32,
    /// Chunks within this distance must be loaded.
    pub active_radius: u32,
    /// Chunks within this distance are queued for generation.
    pub generation_radius: u32,
    /// Chunks beyond this distance are evicted.
    pub unload_radius: u32,
    /// Hard cap on resident chunks.
    pub max_loaded_chunks: usize,
    /// Eviction target as a fraction of the cap.
    pub hysteresis_ratio: f64,
    /// Generation time allowed per tick, in microseconds.
    pub frame_budget_micros: u64,
    /// Optional hard cap on chunks generated per tick.
    pub max_generations_per_tick: Option<usize>,
    /// Run maze generation on a background worker thread.
    pub threaded_generation: bool,
    /// Node expansions allowed per A* segment.
    pub max_path_expansions: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl WorldConfig {
    /// Settings used by the game.
    #[must_use]
    pub const fn production() -> Self {
        Self {
            seed: 42,
            start_level: 0,
            active_radius: 3,
            generation_radius: 5,
            unload_radius: 8,
            max_loaded_chunks: 100,
            hysteresis_ratio: 0.85,
            frame_budget_micros: 2_000,
            max_generations_per_tick: None,
            threaded_generation: false,
            max_path_expansions: 200_000,
        }
    }

    /// Small radii and a generous budget for tests.
    #[must_use]
    pub const fn testing() -> Self {
        Self {
            seed: 42,
            start_level: 0,
            active_radius: 1,
            generation_radius: 2,
            unload_radius: 3,
            max_loaded_chunks: 40,
            hysteresis_ratio: 0.85,
            frame_budget_micros: 50_000,
            max_generations_per_tick: None,
            threaded_generation: false,
            max_path_expansions: 100_000,
        }
    }

    /// Per-tick generation budget.
    #[inline]
    #[must_use]
    pub const fn frame_budget(&self) -> Duration {
        Duration::from_micros(self.frame_budget_micros)
    }

    /// Eviction target: `hysteresis_ratio * max_loaded_chunks`.
    #[inline]
    #[must_use]
    pub fn eviction_target(&self) -> usize {
        (self.max_loaded_chunks as f64 * self.hysteresis_ratio).floor() as usize
    }

    /// Checks radii, cap and budget.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CacheOverflow`] if the active disc alone exceeds
    /// the cap; other variants for out-of-range values.
    pub fn validate(&self) -> WorldResult<()> {
        if self.active_radius > self.generation_radius || self.generation_radius >= self.unload_radius {
            return Err(WorldError::InvalidRadii {
                active: self.active_radius,
                generation: self.generation_radius,
                unload: self.unload_radius,
            });
        }
        if !(self.hysteresis_ratio > 0.0 && self.hysteresis_ratio <= 1.0) {
            return Err(WorldError::InvalidConfig(format!(
                "hysteresis_ratio {} outside (0, 1]",
                self.hysteresis_ratio
            )));
        }
        if self.frame_budget_micros == 0 {
            return Err(WorldError::InvalidConfig("frame_budget_micros must be > 0".into()));
        }
        if self.max_generations_per_tick == Some(0) {
            return Err(WorldError::InvalidConfig(
                "max_generations_per_tick must be > 0 when set".into(),
            ));
        }
        if self.max_path_expansions == 0 {
            return Err(WorldError::InvalidConfig("max_path_expansions must be > 0".into()));
        }

        let required = disc_area(self.active_radius);
        if required > self.max_loaded_chunks {
            tracing::error!(
                required,
                max = self.max_loaded_chunks,
                "active area does not fit in the chunk cache"
            );
            return Err(WorldError::CacheOverflow {
                required,
                max: self.max_loaded_chunks,
            });
        }

        let generation_area = disc_area(self.generation_radius);
        if generation_area > self.eviction_target() {
            tracing::warn!(
                generation_area,
                eviction_target = self.eviction_target(),
                "generation disc exceeds the eviction target; expect cache churn"
            );
        }
        Ok(())
    }
}

/// Number of chunks whose Euclidean distance from the centre is at most `radius`.
#[must_use]
pub fn disc_area(radius: u32) -> usize {
    let r = i64::from(radius);
    let mut count = 0;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                count += 1;
            }
        }
    }
    count
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GameFile {
    #[serde(default)]
    world: WorldConfig,
    #[serde(default)]
    levels: Vec<LevelConfig>,
}

/// Everything needed to start a run.
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Streaming settings.
    pub world: WorldConfig,
    /// Level tables.
    pub levels: LevelRegistry,
}

impl GameConfig {
    /// Pairs already-built parts and validates them together.
    ///
    /// # Errors
    ///
    /// Returns an error if the world settings are invalid or the start level
    /// is not configured.
    pub fn new(world: WorldConfig, levels: LevelRegistry) -> WorldResult<Self> {
        world.validate()?;
        let start = LevelId(world.start_level);
        if levels.get(start).is_none() {
            return Err(WorldError::UnknownLevel(start));
        }
        Ok(Self { world, levels })
    }

    /// Parses a `[world]` + `[[levels]]` document.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_toml_str(source: &str) -> WorldResult<Self> {
        let file: GameFile = toml::from_str(source).map_err(liminal_rules::ConfigError::from)?;
        let levels = LevelRegistry::from_levels(file.levels)?;
        Self::new(file.world, levels)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> WorldResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Start level as a typed id.
    #[inline]
    #[must_use]
    pub const fn start_level(&self) -> LevelId {
        LevelId(self.world.start_level)
    }
}
