//! # Level Configuration
//!
//! Balance data for every level: maze shape, corruption pacing and the spawn
//! table. Loaded from TOML once at startup and validated before anything is
//! generated, so a malformed table can never surface mid-run.
//!
//! ```toml
//! [[levels]]
//! id = 0
//! name = "The Lobby"
//!
//! [levels.corruption]
//! per_chunk = 0.05
//! max = 10.0
//!
//! [[levels.spawns]]
//! category = "exit"
//! type = "exit_hole"
//! base_probability = 0.001
//! corruption_multiplier = 2.0
//! ```

use std::collections::BTreeMap;

use liminal_core::{LevelId, CHUNK_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RulesResult};

/// What kind of thing a spawn entry places.
///
/// Declaration order is the evaluation order inside a sub-chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnCategory {
    /// Hostile entities.
    Enemy,
    /// Neutral entities.
    Npc,
    /// Static props (barrels, mannequins).
    Structure,
    /// Level exits.
    Exit,
    /// Pickups.
    Item,
}

impl SpawnCategory {
    /// All categories in evaluation order.
    pub const ALL: [Self; 5] = [Self::Enemy, Self::Npc, Self::Structure, Self::Exit, Self::Item];

    /// Lowercase name, as written in config files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enemy => "enemy",
            Self::Npc => "npc",
            Self::Structure => "structure",
            Self::Exit => "exit",
            Self::Item => "item",
        }
    }
}

/// One row of a level's spawn table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpawnEntry {
    /// Category of the spawned thing.
    pub category: SpawnCategory,
    /// Entity type id handed to the entity system.
    #[serde(rename = "type")]
    pub type_id: String,
    /// Chance per sub-chunk at zero corruption, in `[0, 1]`.
    pub base_probability: f64,
    /// How strongly corruption scales the chance. Negative dampens.
    #[serde(default)]
    pub corruption_multiplier: f64,
    /// Entry is skipped while corruption is below this.
    #[serde(default)]
    pub min_corruption: f32,
}

/// Corruption pacing for a level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorruptionSettings {
    /// Added once per newly generated chunk.
    pub per_chunk: f32,
    /// Upper bound.
    pub max: f32,
}

impl Default for CorruptionSettings {
    fn default() -> Self {
        Self {
            per_chunk: 0.05,
            max: 10.0,
        }
    }
}

/// Shape parameters for the maze generator and decor pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MazeParams {
    /// Chance of turning instead of continuing straight (0.25-0.4 reads well).
    pub branching_factor: f64,
    /// Fraction of the interior covered by rooms.
    pub room_coverage: f64,
    /// Smallest room side, in tiles.
    pub room_min: usize,
    /// Largest room side, in tiles.
    pub room_max: usize,
    /// Distance between ceiling lights, in tiles.
    pub light_spacing: usize,
    /// Fraction of lights that are broken.
    pub broken_light_chance: f64,
}

impl Default for MazeParams {
    fn default() -> Self {
        Self {
            branching_factor: 0.3,
            room_coverage: 0.2,
            room_min: 4,
            room_max: 8,
            light_spacing: 8,
            broken_light_chance: 0.1,
        }
    }
}

/// Full configuration of one level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelConfig {
    /// Numeric level id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Must match the engine's chunk size.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Maze shape.
    #[serde(default)]
    pub maze: MazeParams,
    /// Corruption pacing.
    #[serde(default)]
    pub corruption: CorruptionSettings,
    /// Random tiles tried per successful roll before giving up.
    #[serde(default = "default_placement_attempts")]
    pub placement_attempts: u32,
    /// Spawn table, evaluated in order within each category.
    #[serde(default)]
    pub spawns: Vec<SpawnEntry>,
}

const fn default_chunk_size() -> usize {
    CHUNK_SIZE
}

const fn default_placement_attempts() -> u32 {
    8
}

impl LevelConfig {
    /// Creates a level with default parameters and an empty spawn table.
    #[must_use]
    pub fn new(id: LevelId, name: impl Into<String>) -> Self {
        Self {
            id: id.0,
            name: name.into(),
            chunk_size: CHUNK_SIZE,
            maze: MazeParams::default(),
            corruption: CorruptionSettings::default(),
            placement_attempts: default_placement_attempts(),
            spawns: Vec::new(),
        }
    }

    /// Parses and validates a single `[[levels]]`-less level document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_toml_str(source: &str) -> RulesResult<Self> {
        let level: Self = toml::from_str(source)?;
        level.validate()?;
        Ok(level)
    }

    /// Typed id.
    #[inline]
    #[must_use]
    pub const fn level_id(&self) -> LevelId {
        LevelId(self.id)
    }

    /// Entries of one category, in table order.
    pub fn entries(&self, category: SpawnCategory) -> impl Iterator<Item = &SpawnEntry> {
        self.spawns.iter().filter(move |entry| entry.category == category)
    }

    /// Checks every value the generator and spawner rely on.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> RulesResult<()> {
        let level = self.level_id();

        if self.chunk_size != CHUNK_SIZE {
            return Err(ConfigError::ChunkSizeMismatch {
                level,
                found: self.chunk_size,
                expected: CHUNK_SIZE,
            });
        }

        let corruption = self.corruption;
        if !corruption.per_chunk.is_finite() || corruption.per_chunk < 0.0 {
            return Err(ConfigError::InvalidCorruption {
                level,
                reason: format!("per_chunk {} must be finite and >= 0", corruption.per_chunk),
            });
        }
        if !corruption.max.is_finite() || corruption.max < 0.0 {
            return Err(ConfigError::InvalidCorruption {
                level,
                reason: format!("max {} must be finite and >= 0", corruption.max),
            });
        }

        self.validate_maze()?;

        if self.placement_attempts == 0 {
            return Err(ConfigError::InvalidPlacementAttempts(level));
        }

        for entry in &self.spawns {
            validate_entry(level, entry)?;
        }
        Ok(())
    }

    fn validate_maze(&self) -> RulesResult<()> {
        let maze = &self.maze;
        let invalid = |reason: String| ConfigError::InvalidMaze {
            level: self.level_id(),
            reason,
        };

        if !(0.0..=1.0).contains(&maze.branching_factor) {
            return Err(invalid(format!(
                "branching_factor {} outside [0, 1]",
                maze.branching_factor
            )));
        }
        if !(0.0..=0.9).contains(&maze.room_coverage) {
            return Err(invalid(format!(
                "room_coverage {} outside [0, 0.9]",
                maze.room_coverage
            )));
        }
        if maze.room_min < 2 || maze.room_min > maze.room_max || maze.room_max > CHUNK_SIZE / 4 {
            return Err(invalid(format!(
                "room size range {}..={} must satisfy 2 <= min <= max <= {}",
                maze.room_min,
                maze.room_max,
                CHUNK_SIZE / 4
            )));
        }
        if maze.light_spacing == 0 {
            return Err(invalid("light_spacing must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&maze.broken_light_chance) {
            return Err(invalid(format!(
                "broken_light_chance {} outside [0, 1]",
                maze.broken_light_chance
            )));
        }
        Ok(())
    }
}

fn validate_entry(level: LevelId, entry: &SpawnEntry) -> RulesResult<()> {
    if entry.type_id.trim().is_empty() {
        return Err(ConfigError::EmptyTypeId(level));
    }
    if !(0.0..=1.0).contains(&entry.base_probability) {
        return Err(ConfigError::InvalidProbability {
            type_id: entry.type_id.clone(),
            value: entry.base_probability,
        });
    }
    if !entry.corruption_multiplier.is_finite() {
        return Err(ConfigError::InvalidMultiplier {
            type_id: entry.type_id.clone(),
        });
    }
    if !entry.min_corruption.is_finite() || entry.min_corruption < 0.0 {
        return Err(ConfigError::InvalidMinCorruption {
            type_id: entry.type_id.clone(),
            value: entry.min_corruption,
        });
    }
    Ok(())
}

#[derive(Deserialize)]
struct LevelFile {
    #[serde(default)]
    levels: Vec<LevelConfig>,
}

/// All configured levels, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct LevelRegistry {
    levels: BTreeMap<LevelId, LevelConfig>,
}

impl LevelRegistry {
    /// Builds a registry from already-parsed levels, validating each.
    ///
    /// # Errors
    ///
    /// Returns an error on an empty list, a duplicate id or an invalid level.
    pub fn from_levels(levels: Vec<LevelConfig>) -> RulesResult<Self> {
        if levels.is_empty() {
            return Err(ConfigError::NoLevels);
        }
        let mut map = BTreeMap::new();
        for level in levels {
            level.validate()?;
            let id = level.level_id();
            if map.insert(id, level).is_some() {
                return Err(ConfigError::DuplicateLevel(id));
            }
        }
        tracing::debug!(levels = map.len(), "level registry loaded");
        Ok(Self { levels: map })
    }

    /// Parses a document made of `[[levels]]` tables. Other top-level
    /// tables are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_toml_str(source: &str) -> RulesResult<Self> {
        let file: LevelFile = toml::from_str(source)?;
        Self::from_levels(file.levels)
    }

    /// Looks up a level.
    #[must_use]
    pub fn get(&self, id: LevelId) -> Option<&LevelConfig> {
        self.levels.get(&id)
    }

    /// Looks up a level, failing for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownLevel`] if the id is not configured.
    pub fn require(&self, id: LevelId) -> RulesResult<&LevelConfig> {
        self.get(id).ok_or(ConfigError::UnknownLevel(id))
    }

    /// Lowest configured level id.
    #[must_use]
    pub fn first(&self) -> Option<LevelId> {
        self.levels.keys().next().copied()
    }

    /// Number of levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True if no level is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Levels in id order.
    pub fn iter(&self) -> impl Iterator<Item = &LevelConfig> {
        self.levels.values()
    }
}
