//! # Corruption Model
//!
//! One scalar per level that only ever goes up while a run lasts. Every
//! spawn-table entry is evaluated through [`CorruptionModel::probability`],
//! which is the single place where the world gets worse the longer the
//! player stays.
//!
//! ## Rules
//!
//! - `increase` is called exactly once per newly generated chunk, by the
//!   chunk manager, after that chunk's spawns were rolled.
//! - The value is clamped to the level's configured cap.
//! - It is reset only when a new run starts.

use std::collections::HashMap;

use liminal_core::LevelId;

/// Per-level corruption state.
#[derive(Clone, Debug, Default)]
pub struct CorruptionModel {
    by_level: HashMap<LevelId, f32>,
}

impl CorruptionModel {
    /// Creates a model with every level at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current corruption of a level (zero if never increased).
    #[inline]
    #[must_use]
    pub fn get(&self, level: LevelId) -> f32 {
        self.by_level.get(&level).copied().unwrap_or(0.0)
    }

    /// Raises a level's corruption by `amount`, clamped to `max_value`.
    ///
    /// The value never decreases: negative or non-finite amounts are ignored
    /// and lowering the cap does not pull an existing value down.
    ///
    /// Returns the new value.
    pub fn increase(&mut self, level: LevelId, amount: f32, max_value: f32) -> f32 {
        let current = self.by_level.entry(level).or_insert(0.0);
        if amount.is_finite() && amount > 0.0 && max_value.is_finite() {
            let raised = (*current + amount).min(max_value);
            *current = current.max(raised);
        }
        *current
    }

    /// Corruption-adjusted probability: `clamp(base * (1 + corruption * multiplier), 0, 1)`.
    ///
    /// Positive multipliers make an entry more likely as corruption grows
    /// (enemies, exits); negative ones less likely (loot, neutral NPCs).
    /// Non-finite results count as zero.
    #[inline]
    #[must_use]
    pub fn probability(base: f64, multiplier: f64, corruption: f32) -> f64 {
        let p = base * (1.0 + f64::from(corruption) * multiplier);
        if p.is_nan() {
            0.0
        } else {
            p.clamp(0.0, 1.0)
        }
    }

    /// Resets one level to zero.
    pub fn reset(&mut self, level: LevelId) {
        self.by_level.remove(&level);
    }

    /// Resets every level. Called at run start.
    pub fn reset_all(&mut self) {
        self.by_level.clear();
    }
}
