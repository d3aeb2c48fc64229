//! # Entity Spawner
//!
//! Rolls a level's spawn table against every sub-chunk of a freshly
//! generated chunk.
//!
//! ## Determinism
//!
//! Each sub-chunk gets its own `ChaCha8Rng`, seeded from the level seed's
//! spawn stream, the chunk coordinate and the sub-chunk index. Rolling the
//! same chunk with the same corruption therefore yields the same placements
//! with the same [`SpawnId`]s, which is what lets an evicted chunk come back
//! without invalidating handles held elsewhere.
//!
//! The spawner does not mutate anything. It returns [`SpawnPlacement`]
//! records; attaching them to sub-chunks is the caller's job.

use liminal_core::seed::stream;
use liminal_core::{Chunk, LocalPos, SpawnId, SubChunk, Tile, TilePos, WorldSeed, SUBCHUNK_SIZE};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{LevelConfig, SpawnCategory, SpawnEntry};
use crate::corruption::CorruptionModel;

/// A spawn decided for a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnPlacement {
    /// Stable handle.
    pub id: SpawnId,
    /// Category from the spawn table.
    pub category: SpawnCategory,
    /// Entity type from the spawn table.
    pub type_id: String,
    /// World tile the entity stands on.
    pub position: TilePos,
}

impl SpawnPlacement {
    /// Position inside the owning chunk.
    #[inline]
    #[must_use]
    pub const fn local(&self) -> LocalPos {
        self.position.local()
    }
}

/// Corruption-aware spawn roller for one level.
#[derive(Clone, Copy, Debug)]
pub struct EntitySpawner {
    seed: WorldSeed,
}

impl EntitySpawner {
    /// Creates a spawner for the level whose seed is `level_seed`.
    #[must_use]
    pub const fn new(level_seed: WorldSeed) -> Self {
        Self {
            seed: level_seed.derive(stream::SPAWN),
        }
    }

    /// Rolls every sub-chunk of `chunk` and returns the placements.
    ///
    /// `corruption` is the level's value *before* this chunk is counted.
    #[must_use]
    pub fn spawn_in_chunk(
        &self,
        chunk: &Chunk,
        level: &LevelConfig,
        corruption: f32,
    ) -> Vec<SpawnPlacement> {
        let chunk_seed = self.seed.for_chunk(chunk.coord.x, chunk.coord.y);
        let mut placements = Vec::new();
        for sub in chunk.subchunks() {
            let mut rng = ChaCha8Rng::seed_from_u64(chunk_seed.derive(sub.index() as u64).value());
            roll_subchunk(sub, chunk, level, corruption, &mut rng, &mut placements);
        }
        tracing::trace!(
            chunk_x = chunk.coord.x,
            chunk_y = chunk.coord.y,
            corruption,
            placed = placements.len(),
            "spawn pass complete"
        );
        placements
    }
}

fn roll_subchunk(
    sub: &SubChunk,
    chunk: &Chunk,
    level: &LevelConfig,
    corruption: f32,
    rng: &mut ChaCha8Rng,
    out: &mut Vec<SpawnPlacement>,
) {
    let mut used: Vec<(usize, usize)> = Vec::new();
    let mut serial: u16 = 0;

    for category in SpawnCategory::ALL {
        for entry in level.entries(category) {
            if corruption < entry.min_corruption {
                continue;
            }
            let p = CorruptionModel::probability(
                entry.base_probability,
                entry.corruption_multiplier,
                corruption,
            );
            if rng.gen::<f64>() >= p {
                continue;
            }
            let Some((x, y)) = pick_floor(sub, &used, level.placement_attempts, rng) else {
                tracing::trace!(type_id = %entry.type_id, sub = sub.index(), "no free floor, skipped");
                continue;
            };
            used.push((x, y));
            out.push(placement(sub, chunk, entry, x, y, serial));
            serial = serial.wrapping_add(1);
        }
    }
}

fn pick_floor(
    sub: &SubChunk,
    used: &[(usize, usize)],
    attempts: u32,
    rng: &mut ChaCha8Rng,
) -> Option<(usize, usize)> {
    (0..attempts).find_map(|_| {
        let x = rng.gen_range(0..SUBCHUNK_SIZE);
        let y = rng.gen_range(0..SUBCHUNK_SIZE);
        (sub.tile(x, y) == Tile::Floor && !used.contains(&(x, y))).then_some((x, y))
    })
}

fn placement(
    sub: &SubChunk,
    chunk: &Chunk,
    entry: &SpawnEntry,
    x: usize,
    y: usize,
    serial: u16,
) -> SpawnPlacement {
    SpawnPlacement {
        id: SpawnId {
            chunk: chunk.coord,
            sub_index: sub.index() as u8,
            serial,
        },
        category: entry.category,
        type_id: entry.type_id.clone(),
        position: chunk.coord.to_world(sub.chunk_local(x, y)),
    }
}
