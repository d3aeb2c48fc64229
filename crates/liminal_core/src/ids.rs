//! Handles used instead of references between chunks, islands and spawns.

use crate::coords::ChunkCoord;

/// Identifies a level (a separate infinite maze with its own balance table).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LevelId(pub u32);

impl std::fmt::Display for LevelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "level {}", self.0)
    }
}

/// Identifies an island within one level's island graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IslandId(pub u32);

impl std::fmt::Display for IslandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "island #{}", self.0)
    }
}

/// Stable handle of one spawn placement.
///
/// Spawns are rolled per sub-chunk in a fixed order, so `(chunk, sub-chunk,
/// serial)` names the same placement every time the chunk is rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpawnId {
    /// Chunk the placement belongs to.
    pub chunk: ChunkCoord,
    /// Row-major sub-chunk index (`0..64`).
    pub sub_index: u8,
    /// Order of the placement within its sub-chunk.
    pub serial: u16,
}
