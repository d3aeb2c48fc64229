//! # Chunk Store
//!
//! World data is organized into fixed-size chunks for:
//! - Memory efficiency (only chunks near the observer stay resident)
//! - Fast streaming (generate/discard on demand)
//! - Lossless eviction (unmodified chunks are rebuilt from their seed)
//!
//! ## Chunk Format
//!
//! Chunks are 128x128 tiles, split into 8x8 sub-chunks of 16x16 tiles.
//! Sub-chunks are the unit of spawn evaluation; each one keeps the handles
//! of the spawns placed inside it.

use crate::coords::{ChunkCoord, LocalPos, TilePos};
use crate::ids::{IslandId, LevelId, SpawnId};
use crate::tile::{content_hash, Tile, TileGrid, TILES_PER_CHUNK};

/// Chunk width/height in tiles.
pub const CHUNK_SIZE: usize = 128;

/// Sub-chunk width/height in tiles.
pub const SUBCHUNK_SIZE: usize = 16;

/// Sub-chunks along one chunk axis.
pub const SUBCHUNKS_PER_SIDE: usize = CHUNK_SIZE / SUBCHUNK_SIZE;

/// Sub-chunks per chunk.
pub const SUBCHUNKS_PER_CHUNK: usize = SUBCHUNKS_PER_SIDE * SUBCHUNKS_PER_SIDE;

/// A ceiling light fixture. Rendering only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightFixture {
    /// Tile under the fixture.
    pub local: LocalPos,
    /// Broken fixtures flicker or stay dark.
    pub broken: bool,
}

/// Per-chunk decorative metadata. The simulation never reads it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkDecor {
    /// Seed for renderer-side scatter (stains, puddles, ceiling holes).
    pub decor_seed: u64,
    /// Seed for choosing wall texture variants.
    pub wall_variant_seed: u64,
    /// Ceiling lights, in placement order.
    pub lights: Vec<LightFixture>,
}

/// A 16x16 slice of a chunk.
#[derive(Clone, Debug)]
pub struct SubChunk {
    /// Tile data (indexed as [y][x]).
    tiles: [[Tile; SUBCHUNK_SIZE]; SUBCHUNK_SIZE],
    /// Position inside the parent chunk, in sub-chunk units.
    local: (u8, u8),
    /// World position of the top-left tile.
    origin: TilePos,
    /// Spawns currently placed in this sub-chunk.
    placed: Vec<SpawnId>,
}

impl SubChunk {
    fn from_grid(grid: &TileGrid, chunk: ChunkCoord, sx: usize, sy: usize) -> Self {
        let mut tiles = [[Tile::Wall; SUBCHUNK_SIZE]; SUBCHUNK_SIZE];
        for (y, row) in tiles.iter_mut().enumerate() {
            for (x, tile) in row.iter_mut().enumerate() {
                *tile = grid.get(sx * SUBCHUNK_SIZE + x, sy * SUBCHUNK_SIZE + y);
            }
        }
        Self {
            tiles,
            local: (sx as u8, sy as u8),
            origin: chunk.to_world(LocalPos::new(sx * SUBCHUNK_SIZE, sy * SUBCHUNK_SIZE)),
            placed: Vec::new(),
        }
    }

    /// Gets a tile by sub-chunk-local coordinates (0-15). Out of range reads `Wall`.
    #[inline]
    #[must_use]
    pub fn tile(&self, x: usize, y: usize) -> Tile {
        if x < SUBCHUNK_SIZE && y < SUBCHUNK_SIZE {
            self.tiles[y][x]
        } else {
            Tile::Wall
        }
    }

    /// Position inside the parent chunk, in sub-chunk units.
    #[inline]
    #[must_use]
    pub const fn local_position(&self) -> (u8, u8) {
        self.local
    }

    /// Row-major index inside the parent chunk.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.local.1 as usize * SUBCHUNKS_PER_SIDE + self.local.0 as usize
    }

    /// World position of the top-left tile.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> TilePos {
        self.origin
    }

    /// Position of a tile of this sub-chunk inside the parent chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_local(&self, x: usize, y: usize) -> LocalPos {
        LocalPos::new(
            self.local.0 as usize * SUBCHUNK_SIZE + x,
            self.local.1 as usize * SUBCHUNK_SIZE + y,
        )
    }

    /// Spawns currently placed here.
    #[inline]
    #[must_use]
    pub fn placed(&self) -> &[SpawnId] {
        &self.placed
    }

    /// Number of walkable tiles.
    #[must_use]
    pub fn walkable_count(&self) -> usize {
        self.tiles.iter().flatten().filter(|t| t.is_walkable()).count()
    }
}

/// A chunk of world data.
///
/// Contains 8x8 sub-chunks plus island membership and decor.
#[derive(Clone, Debug)]
pub struct Chunk {
    /// Chunk position in the world.
    pub coord: ChunkCoord,
    /// Level the chunk belongs to.
    pub level: LevelId,
    /// Island the chunk belongs to.
    pub island: IslandId,
    /// Difficulty tier of the island.
    pub tier: u8,
    /// Sub-chunks, row-major.
    subchunks: Box<[SubChunk]>,
    /// Rendering metadata.
    pub decor: ChunkDecor,
    /// Whether gameplay has modified this chunk since generation.
    pub modified: bool,
}

impl Chunk {
    /// Builds a chunk by slicing a generated grid into sub-chunks.
    #[must_use]
    pub fn from_grid(
        coord: ChunkCoord,
        level: LevelId,
        island: IslandId,
        tier: u8,
        grid: &TileGrid,
        decor: ChunkDecor,
    ) -> Self {
        let subchunks = (0..SUBCHUNKS_PER_CHUNK)
            .map(|i| SubChunk::from_grid(grid, coord, i % SUBCHUNKS_PER_SIDE, i / SUBCHUNKS_PER_SIDE))
            .collect();
        Self {
            coord,
            level,
            island,
            tier,
            subchunks,
            decor,
            modified: false,
        }
    }

    /// Gets a tile at local coordinates.
    #[inline]
    #[must_use]
    pub fn tile(&self, pos: LocalPos) -> Tile {
        let (sub, x, y) = split(pos);
        self.subchunks[sub].tiles[y][x]
    }

    /// Gets a tile by world position, if it lies inside this chunk.
    #[inline]
    #[must_use]
    pub fn tile_at_world(&self, pos: TilePos) -> Option<Tile> {
        (pos.chunk() == self.coord).then(|| self.tile(pos.local()))
    }

    /// Sets a tile on behalf of gameplay and marks the chunk modified.
    #[inline]
    pub fn set_tile(&mut self, pos: LocalPos, tile: Tile) {
        self.stamp(pos, tile);
        self.modified = true;
    }

    /// Generation-time write: the chunk stays reproducible from its seed.
    #[inline]
    pub fn stamp(&mut self, pos: LocalPos, tile: Tile) {
        let (sub, x, y) = split(pos);
        self.subchunks[sub].tiles[y][x] = tile;
    }

    /// All sub-chunks, row-major.
    #[inline]
    #[must_use]
    pub fn subchunks(&self) -> &[SubChunk] {
        &self.subchunks
    }

    /// Gets a sub-chunk by sub-chunk coordinates (0-7).
    #[inline]
    #[must_use]
    pub fn subchunk(&self, sx: usize, sy: usize) -> Option<&SubChunk> {
        if sx < SUBCHUNKS_PER_SIDE && sy < SUBCHUNKS_PER_SIDE {
            Some(&self.subchunks[sy * SUBCHUNKS_PER_SIDE + sx])
        } else {
            None
        }
    }

    /// Records a spawn handle in the sub-chunk containing `pos`.
    pub fn attach_spawn(&mut self, pos: LocalPos, id: SpawnId) {
        let (sub, _, _) = split(pos);
        self.subchunks[sub].placed.push(id);
    }

    /// Removes a spawn handle. Returns false if it was not attached.
    pub fn detach_spawn(&mut self, id: SpawnId) -> bool {
        let Some(sub) = self.subchunks.get_mut(id.sub_index as usize) else {
            return false;
        };
        let before = sub.placed.len();
        sub.placed.retain(|&placed| placed != id);
        sub.placed.len() != before
    }

    /// Reassembles the flat tile grid.
    #[must_use]
    pub fn to_grid(&self) -> TileGrid {
        let mut grid = TileGrid::filled(Tile::Wall);
        for sub in self.subchunks.iter() {
            for (y, row) in sub.tiles.iter().enumerate() {
                for (x, &tile) in row.iter().enumerate() {
                    let local = sub.chunk_local(x, y);
                    grid.set(local.x as usize, local.y as usize, tile);
                }
            }
        }
        grid
    }

    /// Hash of the tile content, independent of sub-chunk layout.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        content_hash(self.to_grid().as_bytes())
    }

    /// Number of walkable tiles.
    #[must_use]
    pub fn walkable_count(&self) -> usize {
        self.subchunks.iter().map(SubChunk::walkable_count).sum()
    }

    /// Returns the raw tile data size in bytes.
    #[must_use]
    pub const fn data_size() -> usize {
        TILES_PER_CHUNK * std::mem::size_of::<Tile>()
    }
}

/// Splits a chunk-local position into (sub-chunk index, x, y).
#[inline]
fn split(pos: LocalPos) -> (usize, usize, usize) {
    let (x, y) = (pos.x as usize, pos.y as usize);
    let sub = (y / SUBCHUNK_SIZE) * SUBCHUNKS_PER_SIDE + x / SUBCHUNK_SIZE;
    (sub, x % SUBCHUNK_SIZE, y % SUBCHUNK_SIZE)
}
