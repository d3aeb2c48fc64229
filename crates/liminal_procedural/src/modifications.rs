//! # Modification Log
//!
//! Gameplay changes that must survive eviction. Unmodified chunks are
//! rebuilt from their seed; modified ones are rebuilt the same way and then
//! have their log replayed on top.
//!
//! ## Design
//!
//! When gameplay changes the world, we:
//! 1. Apply the change to the loaded chunk
//! 2. Append it to this log, keyed by (level, chunk)
//! 3. On regeneration, replay the log after the spawn pass
//!
//! The on-disk format is the caller's business; [`ModificationLog::export`]
//! and [`ModificationLog::load`] are the whole persistence contract.

use std::collections::HashMap;

use liminal_core::{Chunk, ChunkCoord, LevelId, LocalPos, SpawnId, Tile};
use liminal_rules::SpawnPlacement;

/// One recorded change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkModification {
    /// A tile was overwritten.
    Tile {
        /// Position inside the chunk.
        local: LocalPos,
        /// New tile.
        tile: Tile,
    },
    /// A spawn was picked up, killed or otherwise removed for good.
    SpawnConsumed(SpawnId),
}

/// All modifications of one chunk, in the order they happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModificationEntry {
    /// Level of the chunk.
    pub level: LevelId,
    /// Chunk coordinate.
    pub coord: ChunkCoord,
    /// Changes, oldest first.
    pub modifications: Vec<ChunkModification>,
}

/// In-memory modification store.
#[derive(Clone, Debug, Default)]
pub struct ModificationLog {
    entries: HashMap<(LevelId, ChunkCoord), Vec<ChunkModification>>,
}

impl ModificationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change.
    pub fn record(&mut self, level: LevelId, coord: ChunkCoord, modification: ChunkModification) {
        self.entries.entry((level, coord)).or_default().push(modification);
    }

    /// Changes recorded for a chunk.
    #[must_use]
    pub fn get(&self, level: LevelId, coord: ChunkCoord) -> &[ChunkModification] {
        self.entries.get(&(level, coord)).map_or(&[], Vec::as_slice)
    }

    /// True if the spawn was consumed.
    #[must_use]
    pub fn is_consumed(&self, level: LevelId, id: SpawnId) -> bool {
        self.get(level, id.chunk)
            .iter()
            .any(|m| *m == ChunkModification::SpawnConsumed(id))
    }

    /// Replays a chunk's log onto a freshly generated chunk and drops
    /// consumed spawns from `spawns`.
    ///
    /// Returns the number of changes replayed.
    pub fn apply(&self, chunk: &mut Chunk, spawns: &mut Vec<SpawnPlacement>) -> usize {
        let log = self.get(chunk.level, chunk.coord);
        for modification in log {
            match *modification {
                ChunkModification::Tile { local, tile } => chunk.set_tile(local, tile),
                ChunkModification::SpawnConsumed(id) => spawns.retain(|s| s.id != id),
            }
        }
        log.len()
    }

    /// Number of chunks with at least one change.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the whole log, sorted by level then chunk.
    #[must_use]
    pub fn export(&self) -> Vec<ModificationEntry> {
        let mut out: Vec<ModificationEntry> = self
            .entries
            .iter()
            .map(|(&(level, coord), modifications)| ModificationEntry {
                level,
                coord,
                modifications: modifications.clone(),
            })
            .collect();
        out.sort_by_key(|e| (e.level, e.coord));
        out
    }

    /// Replaces the log with previously exported entries.
    pub fn load(&mut self, entries: Vec<ModificationEntry>) {
        self.entries.clear();
        for entry in entries {
            self.entries
                .entry((entry.level, entry.coord))
                .or_default()
                .extend(entry.modifications);
        }
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liminal_core::{ChunkDecor, IslandId, TileGrid, TilePos};
    use liminal_rules::SpawnCategory;

    fn spawn(coord: ChunkCoord, serial: u16) -> SpawnPlacement {
        SpawnPlacement {
            id: SpawnId {
                chunk: coord,
                sub_index: 0,
                serial,
            },
            category: SpawnCategory::Item,
            type_id: "almond_water".into(),
            position: coord.to_world(LocalPos::new(2, 2)),
        }
    }

    #[test]
    fn test_replay_restores_edits_and_hides_consumed() {
        let level = LevelId(0);
        let coord = ChunkCoord::new(2, 3);
        let mut log = ModificationLog::new();
        log.record(level, coord, ChunkModification::Tile {
            local: LocalPos::new(5, 5),
            tile: Tile::Floor,
        });
        log.record(level, coord, ChunkModification::SpawnConsumed(spawn(coord, 1).id));

        let mut chunk = Chunk::from_grid(
            coord,
            level,
            IslandId(0),
            0,
            &TileGrid::filled(Tile::Wall),
            ChunkDecor::default(),
        );
        let mut spawns = vec![spawn(coord, 0), spawn(coord, 1)];
        assert_eq!(log.apply(&mut chunk, &mut spawns), 2);
        assert!(chunk.modified);
        assert_eq!(chunk.tile_at_world(coord.to_world(LocalPos::new(5, 5))), Some(Tile::Floor));
        assert_eq!(spawns.len(), 1);
        assert!(log.is_consumed(level, spawn(coord, 1).id));
        assert!(!log.is_consumed(level, spawn(coord, 0).id));
    }

    #[test]
    fn test_levels_do_not_share_logs() {
        let coord = ChunkCoord::new(0, 0);
        let mut log = ModificationLog::new();
        log.record(LevelId(1), coord, ChunkModification::SpawnConsumed(spawn(coord, 0).id));
        assert!(log.get(LevelId(0), coord).is_empty());
        assert_eq!(log.get(LevelId(1), coord).len(), 1);
    }

    #[test]
    fn test_export_load_round_trip() {
        let mut log = ModificationLog::new();
        for i in 0..5 {
            let coord = TilePos::new(i * 200, -i * 50).chunk();
            log.record(LevelId(0), coord, ChunkModification::Tile {
                local: LocalPos::new(1, 1),
                tile: Tile::Wall,
            });
        }
        let exported = log.export();
        assert_eq!(exported.len(), log.chunk_count());
        assert!(exported.windows(2).all(|w| (w[0].level, w[0].coord) < (w[1].level, w[1].coord)));

        let mut restored = ModificationLog::new();
        restored.load(exported.clone());
        assert_eq!(restored.export(), exported);
        restored.clear();
        assert!(restored.is_empty());
    }
}
