//! # Tiles
//!
//! A tile is one cell of the world lattice. Tiles carry no identity: they are
//! stored as flat `u8` arrays and compared by value.

use bytemuck::NoUninit;

use crate::chunk::CHUNK_SIZE;
use crate::coords::LocalPos;
use crate::seed::{fnv_mix, FNV_OFFSET_BASIS};

/// Total tiles per chunk.
pub const TILES_PER_CHUNK: usize = CHUNK_SIZE * CHUNK_SIZE;

/// A single tile in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, NoUninit)]
#[repr(u8)]
pub enum Tile {
    /// Walkable corridor or room floor.
    Floor = 0,
    /// Solid wall.
    #[default]
    Wall = 1,
    /// Doorway linking two islands.
    Door = 2,
    /// Stairs leading out of the level.
    ExitStairs = 3,
}

impl Tile {
    /// Returns true if entities can stand on this tile.
    #[inline]
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        match self {
            Self::Floor | Self::Door | Self::ExitStairs => true,
            Self::Wall => false,
        }
    }
}

/// A full chunk worth of tiles, row-major (`y * CHUNK_SIZE + x`).
///
/// This is the generator's output format; `Chunk::from_grid` slices it into
/// sub-chunks.
#[derive(Clone, PartialEq, Eq)]
pub struct TileGrid {
    tiles: Box<[Tile]>,
}

impl TileGrid {
    /// Creates a grid with every tile set to `tile`.
    #[must_use]
    pub fn filled(tile: Tile) -> Self {
        Self {
            tiles: vec![tile; TILES_PER_CHUNK].into_boxed_slice(),
        }
    }

    /// Gets a tile. Out-of-range coordinates read as `Wall`.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Tile {
        if x < CHUNK_SIZE && y < CHUNK_SIZE {
            self.tiles[y * CHUNK_SIZE + x]
        } else {
            Tile::Wall
        }
    }

    /// Sets a tile. Out-of-range coordinates are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, tile: Tile) {
        if x < CHUNK_SIZE && y < CHUNK_SIZE {
            self.tiles[y * CHUNK_SIZE + x] = tile;
        }
    }

    /// Gets the tile at a local position.
    #[inline]
    #[must_use]
    pub fn at(&self, pos: LocalPos) -> Tile {
        self.tiles[pos.index()]
    }

    /// Raw tiles, row-major.
    #[inline]
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Byte view of the grid (one byte per tile).
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice::<Tile, u8>(&self.tiles)
    }

    /// Number of tiles equal to `tile`.
    #[must_use]
    pub fn count(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|&&t| t == tile).count()
    }

    /// Fraction of walkable tiles.
    #[must_use]
    pub fn walkable_ratio(&self) -> f64 {
        let walkable = self.tiles.iter().filter(|t| t.is_walkable()).count();
        walkable as f64 / TILES_PER_CHUNK as f64
    }

    /// FNV-1a hash of the tile bytes. Cheap identity for determinism checks.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        content_hash(self.as_bytes())
    }
}

impl std::fmt::Debug for TileGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileGrid")
            .field("floor", &self.count(Tile::Floor))
            .field("doors", &self.count(Tile::Door))
            .field("hash", &format_args!("{:016x}", self.content_hash()))
            .finish()
    }
}

/// FNV-1a over bytes.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET_BASIS, |hash, &b| fnv_mix(hash, u64::from(b)))
}
