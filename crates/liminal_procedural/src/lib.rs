//! # LIMINAL Procedural Generation
//!
//! Deterministic, endless maze levels streamed around a moving observer.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed, same islands, same mazes, same spawns
//! 2. **Chunked**: 128x128 tile chunks, generated and discarded independently
//! 3. **Lossless eviction**: An evicted chunk comes back identical, with its
//!    gameplay changes replayed on top
//! 4. **Budgeted**: Generation never takes more than its slice of a tick
//!
//! ## Core Components
//!
//! - `MazeGenerator`: backtracker maze with rooms, honouring border openings
//! - `IslandGraph`: chunk clusters and the doorways between them
//! - `ChunkManager`: radius-driven loading, LRU eviction, corruption, spawns
//! - `CrossIslandPathfinder`: A* inside islands, door to door across them
//! - `GenerationWorker`: optional background thread for maze carving
//!
//! ## Example
//!
//! ```rust,ignore
//! use liminal_procedural::{ChunkManager, GameConfig};
//! use liminal_core::TilePos;
//!
//! let mut world = ChunkManager::new(GameConfig::load("data/levels.toml")?)?;
//!
//! // Observer at tile (100, 200)
//! world.update(TilePos::new(100, 200));
//! world.flush_generation_queue();
//!
//! for event in world.drain_events() {
//!     // hand chunks to the renderer, spawns to the entity system
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk_manager;
pub mod config;
pub mod decor;
pub mod error;
pub mod island;
pub mod maze;
pub mod modifications;
pub mod pathfinding;
pub mod worker;

pub use chunk_manager::{ChunkManager, ChunkState, TickReport, WorldEvent, WorldStats};
pub use config::{disc_area, GameConfig, WorldConfig};
pub use decor::decorate;
pub use error::{GenerationError, WorldError, WorldResult};
pub use island::{Connection, ConnectionEnd, ConnectionId, Island, IslandGraph, IslandHop};
pub use maze::{BorderOpening, MazeGenerator, MazeRequest, OpeningKind, TileGenerator};
pub use modifications::{ChunkModification, ModificationEntry, ModificationLog};
pub use pathfinding::{CrossIslandPathfinder, WorldView};
pub use worker::{GenerationJob, GenerationOutput, GenerationWorker};
