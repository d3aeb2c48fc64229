//! # Coordinate Spaces
//!
//! Three integer spaces are in play:
//!
//! - **World tiles** (`TilePos`): the unbounded lattice the player walks on.
//! - **Chunks** (`ChunkCoord`): `tile.div_euclid(CHUNK_SIZE)`.
//! - **Local tiles** (`LocalPos`): `tile.rem_euclid(CHUNK_SIZE)`.
//!
//! Y grows southwards, matching the row-major tile layout.
//!
//! Tile arithmetic wraps at the `i32` edge, so the far rim of the world
//! folds over instead of overflowing.

use crate::chunk::CHUNK_SIZE;

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not tiles).
    pub x: i32,
    /// Y coordinate (in chunks, not tiles).
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts a world tile position to the chunk containing it.
    #[inline]
    #[must_use]
    pub const fn from_tile(pos: TilePos) -> Self {
        Self {
            x: pos.x.div_euclid(CHUNK_SIZE as i32),
            y: pos.y.div_euclid(CHUNK_SIZE as i32),
        }
    }

    /// Returns the world position of the chunk's top-left tile.
    #[inline]
    #[must_use]
    pub const fn origin(self) -> TilePos {
        TilePos::new(
            self.x.wrapping_mul(CHUNK_SIZE as i32),
            self.y.wrapping_mul(CHUNK_SIZE as i32),
        )
    }

    /// Returns the chunk offset by `(dx, dy)` chunks.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.wrapping_add(dx), self.y.wrapping_add(dy))
    }

    /// Returns the cardinal neighbour on `side`.
    #[inline]
    #[must_use]
    pub const fn neighbor(self, side: Side) -> Self {
        let (dx, dy) = side.delta();
        self.offset(dx, dy)
    }

    /// Squared Euclidean distance in chunk units.
    #[inline]
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.x as i64) - (other.x as i64);
        let dy = (self.y as i64) - (other.y as i64);
        dx * dx + dy * dy
    }

    /// Chebyshev (king-move) distance in chunk units.
    #[inline]
    #[must_use]
    pub fn chebyshev(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Returns the side of `self` that faces `other`, if they are cardinal neighbours.
    #[must_use]
    pub fn side_facing(self, other: Self) -> Option<Side> {
        Side::ALL.into_iter().find(|&side| self.neighbor(side) == other)
    }

    /// Converts a local position inside this chunk to a world position.
    #[inline]
    #[must_use]
    pub const fn to_world(self, local: LocalPos) -> TilePos {
        let origin = self.origin();
        origin.offset(local.x as i32, local.y as i32)
    }
}

/// Absolute tile position in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilePos {
    /// World X (tiles).
    pub x: i32,
    /// World Y (tiles).
    pub y: i32,
}

impl TilePos {
    /// Creates a new tile position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the chunk containing this tile.
    #[inline]
    #[must_use]
    pub const fn chunk(self) -> ChunkCoord {
        ChunkCoord::from_tile(self)
    }

    /// Returns the position of this tile inside its chunk.
    #[inline]
    #[must_use]
    pub const fn local(self) -> LocalPos {
        LocalPos {
            x: self.x.rem_euclid(CHUNK_SIZE as i32) as u8,
            y: self.y.rem_euclid(CHUNK_SIZE as i32) as u8,
        }
    }

    /// Returns the tile offset by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.wrapping_add(dx), self.y.wrapping_add(dy))
    }

    /// Manhattan distance between two tiles.
    #[inline]
    #[must_use]
    pub fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }

    /// The four cardinal neighbours, in `Side::ALL` order.
    #[inline]
    #[must_use]
    pub fn neighbors4(self) -> [Self; 4] {
        Side::ALL.map(|side| {
            let (dx, dy) = side.delta();
            self.offset(dx, dy)
        })
    }
}

/// Tile position inside a chunk (`0..CHUNK_SIZE` on both axes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalPos {
    /// Local X.
    pub x: u8,
    /// Local Y.
    pub y: u8,
}

impl LocalPos {
    /// Creates a local position. Components are wrapped into chunk range.
    #[inline]
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self {
            x: (x % CHUNK_SIZE) as u8,
            y: (y % CHUNK_SIZE) as u8,
        }
    }

    /// Row-major index into a `CHUNK_SIZE * CHUNK_SIZE` buffer.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.y as usize * CHUNK_SIZE + self.x as usize
    }

    /// True if the tile lies on the chunk's outer ring.
    #[inline]
    #[must_use]
    pub const fn is_border(self) -> bool {
        let max = (CHUNK_SIZE - 1) as u8;
        self.x == 0 || self.y == 0 || self.x == max || self.y == max
    }
}

/// One of the four chunk borders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    /// Towards negative Y.
    North,
    /// Towards positive X.
    East,
    /// Towards positive Y.
    South,
    /// Towards negative X.
    West,
}

impl Side {
    /// All sides in a fixed order. Iteration order matters for determinism.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Unit step pointing out of the chunk through this side.
    #[inline]
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    /// The facing side of the neighbouring chunk.
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// Border tile at `offset` along this side.
    #[inline]
    #[must_use]
    pub const fn border_tile(self, offset: usize) -> LocalPos {
        let max = CHUNK_SIZE - 1;
        match self {
            Self::North => LocalPos::new(offset, 0),
            Self::South => LocalPos::new(offset, max),
            Self::West => LocalPos::new(0, offset),
            Self::East => LocalPos::new(max, offset),
        }
    }
}
