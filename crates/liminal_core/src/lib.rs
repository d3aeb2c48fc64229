//! # LIMINAL Core
//!
//! The data model shared by every part of the world engine.
//!
//! ## Core Components
//!
//! - `WorldSeed` / `chunk_seed`: deterministic per-chunk streams
//! - `Tile` / `TileGrid`: flat tile storage
//! - `Chunk` / `SubChunk`: the streamed unit of the world
//! - `ChunkCoord`, `TilePos`, `LocalPos`, `Side`: coordinate spaces
//! - `LevelId`, `IslandId`, `SpawnId`: handles instead of references
//!
//! Nothing here generates or decides anything; see `liminal_procedural` and
//! `liminal_rules`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod coords;
pub mod ids;
pub mod seed;
pub mod tile;

pub use chunk::{
    Chunk, ChunkDecor, LightFixture, SubChunk, CHUNK_SIZE, SUBCHUNKS_PER_CHUNK, SUBCHUNKS_PER_SIDE,
    SUBCHUNK_SIZE,
};
pub use coords::{ChunkCoord, LocalPos, Side, TilePos};
pub use ids::{IslandId, LevelId, SpawnId};
pub use seed::{chunk_seed, WorldSeed};
pub use tile::{Tile, TileGrid, TILES_PER_CHUNK};
