//! # Decor Pass
//!
//! Rendering-only metadata for a generated chunk: ceiling lights on a
//! jittered grid, some of them broken, plus seeds the renderer uses to
//! scatter stains, puddles and wall variants. The simulation never reads any
//! of this, but it is deterministic like everything else so a revisited
//! chunk flickers the same way.

use liminal_core::seed::stream;
use liminal_core::{ChunkCoord, ChunkDecor, LightFixture, LocalPos, Tile, TileGrid, WorldSeed, CHUNK_SIZE};
use liminal_rules::MazeParams;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Builds decor for a chunk whose tiles are final.
#[must_use]
pub fn decorate(grid: &TileGrid, coord: ChunkCoord, level_seed: WorldSeed, params: &MazeParams) -> ChunkDecor {
    let seed = level_seed.derive(stream::DECOR).for_chunk(coord.x, coord.y);
    let mut rng = ChaCha8Rng::seed_from_u64(seed.value());

    let decor_seed = rng.gen();
    let wall_variant_seed = rng.gen();

    let spacing = params.light_spacing.max(1);
    let jitter = (spacing / 4) as i32;
    let mut lights = Vec::new();

    for gy in (spacing / 2..CHUNK_SIZE).step_by(spacing) {
        for gx in (spacing / 2..CHUNK_SIZE).step_by(spacing) {
            let dx = if jitter > 0 { rng.gen_range(-jitter..=jitter) } else { 0 };
            let dy = if jitter > 0 { rng.gen_range(-jitter..=jitter) } else { 0 };
            let broken = rng.gen_bool(params.broken_light_chance);

            let x = (gx as i32 + dx).clamp(0, CHUNK_SIZE as i32 - 1) as usize;
            let y = (gy as i32 + dy).clamp(0, CHUNK_SIZE as i32 - 1) as usize;
            if grid.get(x, y) == Tile::Floor {
                lights.push(LightFixture {
                    local: LocalPos::new(x, y),
                    broken,
                });
            }
        }
    }

    ChunkDecor {
        decor_seed,
        wall_variant_seed,
        lights,
    }
}
