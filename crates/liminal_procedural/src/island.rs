//! # Island Graph
//!
//! Chunks are grouped into islands: small clusters generated together and
//! treated as one connected region. Islands meet at doorways; the graph of
//! islands and doorways is what long-range pathing walks.
//!
//! ## Creation
//!
//! The first time an unassigned chunk is asked for, a 2x2 to 4x4 rectangle
//! containing it is drawn from the island stream. Chunks of the rectangle
//! that already belong to another island are removed, and what remains is
//! cut down to the 4-connected component containing the requested chunk.
//! Islands squeezed between older ones can therefore be smaller than 2x2.
//!
//! ## Invariants
//!
//! - A chunk's island never changes once assigned.
//! - An island's chunk set never changes.
//! - Connections are only ever added, at most one per chunk pair.

use std::collections::{HashMap, VecDeque};

use liminal_core::seed::stream;
use liminal_core::{ChunkCoord, IslandId, Side, TilePos, WorldSeed};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::maze::{BorderOpening, CELLS, DOOR_OFFSET};

/// Side length range of the island rectangle, in chunks.
const MIN_ISLAND_SIDE: i32 = 2;
const MAX_ISLAND_SIDE: i32 = 4;

/// Chunks of distance per difficulty tier.
const TIER_BAND: f64 = 4.0;

/// Highest difficulty tier.
pub const MAX_TIER: u8 = 15;

/// Handle of a doorway between two islands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

/// One side of a doorway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionEnd {
    /// Island on this side.
    pub island: IslandId,
    /// Chunk holding the door tile.
    pub chunk: ChunkCoord,
    /// World position of the door tile.
    pub door: TilePos,
}

/// A doorway: two door tiles facing each other across a chunk border.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    /// Handle.
    pub id: ConnectionId,
    /// First end.
    pub a: ConnectionEnd,
    /// Second end.
    pub b: ConnectionEnd,
}

impl Connection {
    /// The end lying on `island`.
    #[must_use]
    pub fn end_on(&self, island: IslandId) -> Option<ConnectionEnd> {
        if self.a.island == island {
            Some(self.a)
        } else if self.b.island == island {
            Some(self.b)
        } else {
            None
        }
    }

    /// The end opposite the one lying on `island`.
    #[must_use]
    pub fn far_end(&self, island: IslandId) -> Option<ConnectionEnd> {
        if self.a.island == island {
            Some(self.b)
        } else if self.b.island == island {
            Some(self.a)
        } else {
            None
        }
    }

    /// True if either door sits in `chunk`.
    #[must_use]
    pub fn touches(&self, chunk: ChunkCoord) -> bool {
        self.a.chunk == chunk || self.b.chunk == chunk
    }
}

/// A cluster of chunks generated together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Island {
    /// Handle.
    pub id: IslandId,
    /// Member chunks, sorted.
    pub chunks: Vec<ChunkCoord>,
    /// Difficulty tier (grows with distance from the origin).
    pub tier: u8,
    /// Doorways, in creation order.
    pub connections: Vec<ConnectionId>,
}

impl Island {
    /// True if `chunk` belongs to this island.
    #[must_use]
    pub fn contains(&self, chunk: ChunkCoord) -> bool {
        self.chunks.binary_search(&chunk).is_ok()
    }
}

/// One doorway crossing on an island route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IslandHop {
    /// Doorway used.
    pub connection: ConnectionId,
    /// Door on the island being left.
    pub exit: ConnectionEnd,
    /// Door on the island being entered.
    pub entry: ConnectionEnd,
}

/// Island assignment and doorways for one level.
#[derive(Clone, Debug)]
pub struct IslandGraph {
    seed: WorldSeed,
    islands: Vec<Island>,
    assignment: HashMap<ChunkCoord, IslandId>,
    connections: Vec<Connection>,
    by_pair: HashMap<(ChunkCoord, ChunkCoord), ConnectionId>,
    by_chunk: HashMap<ChunkCoord, Vec<ConnectionId>>,
}

impl IslandGraph {
    /// Creates an empty graph for the level whose seed is `level_seed`.
    #[must_use]
    pub fn new(level_seed: WorldSeed) -> Self {
        Self {
            seed: level_seed,
            islands: Vec::new(),
            assignment: HashMap::new(),
            connections: Vec::new(),
            by_pair: HashMap::new(),
            by_chunk: HashMap::new(),
        }
    }

    /// Level seed the graph draws from.
    #[inline]
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// Island of `chunk`, if assigned.
    #[inline]
    #[must_use]
    pub fn island_of(&self, chunk: ChunkCoord) -> Option<IslandId> {
        self.assignment.get(&chunk).copied()
    }

    /// Looks up an island.
    #[inline]
    #[must_use]
    pub fn island(&self, id: IslandId) -> Option<&Island> {
        self.islands.get(id.0 as usize)
    }

    /// Looks up a connection.
    #[inline]
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.0 as usize)
    }

    /// Number of islands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.islands.len()
    }

    /// True if no island exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.islands.is_empty()
    }

    /// Number of doorways.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// All islands in creation order.
    pub fn islands(&self) -> impl Iterator<Item = &Island> {
        self.islands.iter()
    }

    /// Returns the island of `chunk`, creating one around it if needed.
    pub fn get_or_create_island(&mut self, chunk: ChunkCoord) -> IslandId {
        if let Some(id) = self.island_of(chunk) {
            return id;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.derive(stream::ISLAND).for_chunk(chunk.x, chunk.y).value());
        let w = rng.gen_range(MIN_ISLAND_SIDE..=MAX_ISLAND_SIDE);
        let h = rng.gen_range(MIN_ISLAND_SIDE..=MAX_ISLAND_SIDE);
        let corner = chunk.offset(-rng.gen_range(0..w), -rng.gen_range(0..h));

        let free = |c: ChunkCoord| {
            (corner.x..corner.x + w).contains(&c.x)
                && (corner.y..corner.y + h).contains(&c.y)
                && !self.assignment.contains_key(&c)
        };

        let mut members = vec![chunk];
        let mut queue = VecDeque::from([chunk]);
        while let Some(current) = queue.pop_front() {
            for side in Side::ALL {
                let next = current.neighbor(side);
                if free(next) && !members.contains(&next) {
                    members.push(next);
                    queue.push_back(next);
                }
            }
        }

        let tier = tier_for(chunk, &mut rng);
        self.register_island(members, tier)
    }

    /// Registers a hand-built island. Chunks that already belong to an
    /// island are left out.
    pub fn register_island(&mut self, chunks: Vec<ChunkCoord>, tier: u8) -> IslandId {
        let id = IslandId(self.islands.len() as u32);
        let mut chunks: Vec<ChunkCoord> = chunks
            .into_iter()
            .filter(|c| !self.assignment.contains_key(c))
            .collect();
        chunks.sort_unstable();
        chunks.dedup();
        for &chunk in &chunks {
            self.assignment.insert(chunk, id);
        }
        tracing::debug!(
            island = id.0,
            chunks = chunks.len(),
            tier,
            "island created"
        );
        self.islands.push(Island {
            id,
            chunks,
            tier: tier.min(MAX_TIER),
            connections: Vec::new(),
        });
        id
    }

    /// Every doorway touching `chunk`, creating the missing ones towards
    /// assigned neighbours on other islands.
    pub fn border_connections_for(&mut self, chunk: ChunkCoord) -> Vec<Connection> {
        if self.island_of(chunk).is_some() {
            for side in Side::ALL {
                self.connect(chunk, side);
            }
        }
        self.by_chunk
            .get(&chunk)
            .map(|ids| ids.iter().map(|id| self.connections[id.0 as usize]).collect())
            .unwrap_or_default()
    }

    /// Openings the maze generator must honour for `chunk`: a door per
    /// neighbouring island and one to three seams per same-island neighbour.
    ///
    /// Neighbours that have no island yet contribute nothing, so callers
    /// resolve them first when the result has to be final.
    pub fn border_openings_for(&mut self, chunk: ChunkCoord) -> Vec<BorderOpening> {
        let Some(here) = self.island_of(chunk) else {
            return Vec::new();
        };
        let mut openings = Vec::new();
        for side in Side::ALL {
            let neighbor = chunk.neighbor(side);
            match self.island_of(neighbor) {
                Some(there) if there != here => {
                    self.connect(chunk, side);
                    openings.push(BorderOpening::door(side));
                }
                Some(_) => openings.extend(
                    self.seam_offsets(chunk, neighbor)
                        .into_iter()
                        .map(|offset| BorderOpening::passage(side, offset)),
                ),
                None => {}
            }
        }
        openings
    }

    /// Creates the doorway across `side` of `chunk` if both chunks are on
    /// different islands. Returns the existing one if already present.
    pub fn connect(&mut self, chunk: ChunkCoord, side: Side) -> Option<ConnectionId> {
        let neighbor = chunk.neighbor(side);
        let here = self.island_of(chunk)?;
        let there = self.island_of(neighbor)?;
        if here == there {
            return None;
        }
        let key = if chunk <= neighbor { (chunk, neighbor) } else { (neighbor, chunk) };
        if let Some(&id) = self.by_pair.get(&key) {
            return Some(id);
        }

        let id = ConnectionId(self.connections.len() as u32);
        let connection = Connection {
            id,
            a: ConnectionEnd {
                island: here,
                chunk,
                door: chunk.to_world(side.border_tile(DOOR_OFFSET)),
            },
            b: ConnectionEnd {
                island: there,
                chunk: neighbor,
                door: neighbor.to_world(side.opposite().border_tile(DOOR_OFFSET)),
            },
        };
        self.connections.push(connection);
        self.by_pair.insert(key, id);
        self.by_chunk.entry(chunk).or_default().push(id);
        self.by_chunk.entry(neighbor).or_default().push(id);
        for island in [here, there] {
            if let Some(island) = self.islands.get_mut(island.0 as usize) {
                island.connections.push(id);
            }
        }
        tracing::trace!(connection = id.0, from = here.0, to = there.0, "doorway created");
        Some(id)
    }

    /// Seam offsets shared by two adjacent chunks. Symmetric in its arguments.
    fn seam_offsets(&self, a: ChunkCoord, b: ChunkCoord) -> Vec<usize> {
        let low = a.min(b);
        let vertical = a.x == b.x;
        let seed = self
            .seed
            .derive(stream::SEAM)
            .for_chunk(low.x, low.y)
            .derive(u64::from(vertical));
        let mut rng = ChaCha8Rng::seed_from_u64(seed.value());
        let count = rng.gen_range(1..=3);
        let mut offsets: Vec<usize> = (0..count).map(|_| 2 * rng.gen_range(0..CELLS) + 1).collect();
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }

    /// Shortest chain of islands from `from` to `to`, both included.
    ///
    /// Returns `None` when no chain of known doorways links them.
    #[must_use]
    pub fn island_route(&self, from: IslandId, to: IslandId) -> Option<Vec<IslandId>> {
        if self.island(from).is_none() || self.island(to).is_none() {
            return None;
        }
        if from == to {
            return Some(vec![from]);
        }

        let mut came_from: HashMap<IslandId, IslandId> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            let Some(island) = self.island(current) else {
                continue;
            };
            for &cid in &island.connections {
                let Some(next) = self.connections[cid.0 as usize].far_end(current).map(|end| end.island) else {
                    continue;
                };
                if next == from || came_from.contains_key(&next) {
                    continue;
                }
                came_from.insert(next, current);
                if next == to {
                    return Some(unwind(&came_from, from, to));
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Every doorway leading from island `from` straight into island `to`,
    /// in creation order.
    #[must_use]
    pub fn doorways_between(&self, from: IslandId, to: IslandId) -> Vec<IslandHop> {
        let Some(island) = self.island(from) else {
            return Vec::new();
        };
        island
            .connections
            .iter()
            .filter_map(|&cid| {
                let connection = self.connections[cid.0 as usize];
                let exit = connection.end_on(from)?;
                let entry = connection.far_end(from)?;
                (entry.island == to).then_some(IslandHop {
                    connection: cid,
                    exit,
                    entry,
                })
            })
            .collect()
    }

    /// Shortest sequence of doorways from island `from` to island `to`,
    /// taking the oldest doorway between each pair of islands.
    ///
    /// Returns `Some(vec![])` when both are the same island and `None` when
    /// no chain of known doorways links them.
    #[must_use]
    pub fn route(&self, from: IslandId, to: IslandId) -> Option<Vec<IslandHop>> {
        let islands = self.island_route(from, to)?;
        islands
            .windows(2)
            .map(|pair| self.doorways_between(pair[0], pair[1]).first().copied())
            .collect()
    }
}

fn unwind(came_from: &HashMap<IslandId, IslandId>, from: IslandId, to: IslandId) -> Vec<IslandId> {
    let mut islands = vec![to];
    let mut current = to;
    while current != from {
        let Some(&previous) = came_from.get(&current) else {
            break;
        };
        islands.push(previous);
        current = previous;
    }
    islands.reverse();
    islands
}

fn tier_for(chunk: ChunkCoord, rng: &mut ChaCha8Rng) -> u8 {
    let distance = (chunk.distance_squared(ChunkCoord::default()) as f64).sqrt();
    let band = (distance / TIER_BAND) as u32;
    let jitter = rng.gen_range(0..=1);
    (band + jitter).min(u32::from(MAX_TIER)) as u8
}
