//! # Cross-Island Pathfinding
//!
//! Tile-level A* inside one island, chained across islands through the
//! doorways the island graph knows about.
//!
//! Only loaded chunks are searched. Anything the search cannot see or
//! reach yields an empty path, never a panic.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use liminal_core::{ChunkCoord, IslandId, Tile, TilePos};

use crate::island::{IslandGraph, IslandHop};

/// Read access to the streamed world.
pub trait WorldView {
    /// Tile at `pos`, or `None` if its chunk is not loaded.
    fn tile(&self, pos: TilePos) -> Option<Tile>;

    /// Island of `chunk`, if assigned.
    fn island_at(&self, chunk: ChunkCoord) -> Option<IslandId>;

    /// Island graph of the level being searched.
    fn islands(&self) -> Option<&IslandGraph>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Frontier {
    f: u32,
    g: u32,
    pos: TilePos,
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on f; deeper nodes first on ties.
        other
            .f
            .cmp(&self.f)
            .then_with(|| self.g.cmp(&other.g))
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

/// Shortest-path search over loaded chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrossIslandPathfinder {
    max_expansions: usize,
}

impl CrossIslandPathfinder {
    /// Creates a pathfinder that gives up after `max_expansions` expanded
    /// tiles per island leg.
    #[must_use]
    pub const fn new(max_expansions: usize) -> Self {
        Self { max_expansions }
    }

    /// Expansion cap per leg.
    #[must_use]
    pub const fn max_expansions(&self) -> usize {
        self.max_expansions
    }

    /// Walkable 4-connected path from `start` to `goal`, both included.
    ///
    /// Inside one island this is a plain A*. Across islands the island graph
    /// picks the island sequence; each leg then heads for the nearest loaded
    /// doorway into the next island, falling back to the others when it
    /// cannot be reached.
    ///
    /// Returns an empty vector when either end is unloaded, not walkable,
    /// unassigned, or unreachable within the expansion cap.
    #[must_use]
    pub fn find_path<W: WorldView + ?Sized>(&self, world: &W, start: TilePos, goal: TilePos) -> Vec<TilePos> {
        if !walkable(world, start) || !walkable(world, goal) {
            return Vec::new();
        }
        let (Some(from), Some(to)) = (world.island_at(start.chunk()), world.island_at(goal.chunk())) else {
            return Vec::new();
        };
        if from == to {
            return self.search(world, start, goal, from).unwrap_or_default();
        }

        let Some(graph) = world.islands() else {
            return Vec::new();
        };
        let Some(islands) = graph.island_route(from, to) else {
            tracing::trace!(from = from.0, to = to.0, "no doorway chain between islands");
            return Vec::new();
        };

        let mut path = Vec::new();
        let mut leg_start = start;
        for pair in islands.windows(2) {
            let Some((leg, hop)) = self.cross(world, graph, leg_start, pair[0], pair[1]) else {
                return Vec::new();
            };
            append_leg(&mut path, leg);
            path.push(hop.entry.door);
            leg_start = hop.entry.door;
        }
        let Some(leg) = self.search(world, leg_start, goal, to) else {
            return Vec::new();
        };
        append_leg(&mut path, leg);
        path
    }

    /// Walks from `leg_start` out of island `here` into island `next`.
    ///
    /// Doorways with both door tiles loaded come first, nearest first; the
    /// first one the leg search reaches wins.
    fn cross<W: WorldView + ?Sized>(
        &self,
        world: &W,
        graph: &IslandGraph,
        leg_start: TilePos,
        here: IslandId,
        next: IslandId,
    ) -> Option<(Vec<TilePos>, IslandHop)> {
        let mut doorways = graph.doorways_between(here, next);
        doorways.sort_by_key(|hop| {
            let open = walkable(world, hop.exit.door) && walkable(world, hop.entry.door);
            (!open, leg_start.manhattan(hop.exit.door))
        });
        doorways.into_iter().find_map(|hop| {
            if !walkable(world, hop.entry.door) {
                return None;
            }
            let leg = self.search(world, leg_start, hop.exit.door, here)?;
            Some((leg, hop))
        })
    }

    fn search<W: WorldView + ?Sized>(
        &self,
        world: &W,
        start: TilePos,
        goal: TilePos,
        island: IslandId,
    ) -> Option<Vec<TilePos>> {
        if start == goal {
            return Some(vec![start]);
        }

        let mut open = BinaryHeap::new();
        let mut best: HashMap<TilePos, u32> = HashMap::new();
        let mut came_from: HashMap<TilePos, TilePos> = HashMap::new();
        let mut inside: HashMap<ChunkCoord, bool> = HashMap::new();
        let mut expansions = 0;

        best.insert(start, 0);
        open.push(Frontier {
            f: start.manhattan(goal),
            g: 0,
            pos: start,
        });

        while let Some(Frontier { g, pos, .. }) = open.pop() {
            if pos == goal {
                return Some(rebuild(&came_from, start, goal));
            }
            if best.get(&pos).is_some_and(|&known| g > known) {
                continue;
            }
            expansions += 1;
            if expansions > self.max_expansions {
                tracing::debug!(
                    expansions,
                    start_x = start.x,
                    start_y = start.y,
                    goal_x = goal.x,
                    goal_y = goal.y,
                    "path search hit expansion cap"
                );
                return None;
            }

            for next in pos.neighbors4() {
                let chunk = next.chunk();
                let on_island = *inside
                    .entry(chunk)
                    .or_insert_with(|| world.island_at(chunk) == Some(island));
                if !on_island || !walkable(world, next) {
                    continue;
                }
                let cost = g + 1;
                if best.get(&next).map_or(true, |&known| cost < known) {
                    best.insert(next, cost);
                    came_from.insert(next, pos);
                    open.push(Frontier {
                        f: cost.saturating_add(next.manhattan(goal)),
                        g: cost,
                        pos: next,
                    });
                }
            }
        }
        None
    }
}

fn walkable<W: WorldView + ?Sized>(world: &W, pos: TilePos) -> bool {
    world.tile(pos).is_some_and(Tile::is_walkable)
}

fn rebuild(came_from: &HashMap<TilePos, TilePos>, start: TilePos, goal: TilePos) -> Vec<TilePos> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        let Some(&previous) = came_from.get(&current) else {
            break;
        };
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}

fn append_leg(path: &mut Vec<TilePos>, leg: Vec<TilePos>) {
    let skip = usize::from(path.last() == leg.first() && !path.is_empty());
    path.extend(leg.into_iter().skip(skip));
}

#[cfg(test)]
mod tests {
    use super::*;
    use liminal_core::{Side, TileGrid, WorldSeed};

    struct TestWorld {
        chunks: HashMap<ChunkCoord, TileGrid>,
        graph: IslandGraph,
    }

    impl WorldView for TestWorld {
        fn tile(&self, pos: TilePos) -> Option<Tile> {
            self.chunks.get(&pos.chunk()).map(|grid| grid.at(pos.local()))
        }

        fn island_at(&self, chunk: ChunkCoord) -> Option<IslandId> {
            self.graph.island_of(chunk)
        }

        fn islands(&self) -> Option<&IslandGraph> {
            Some(&self.graph)
        }
    }

    /// Two single-chunk islands joined by an east-west doorway on row 63,
    /// with a corridor running along that row in both chunks.
    fn corridor_world() -> TestWorld {
        let mut graph = IslandGraph::new(WorldSeed::new(5));
        let west = ChunkCoord::new(0, 0);
        let east = ChunkCoord::new(1, 0);
        graph.register_island(vec![west], 0);
        graph.register_island(vec![east], 0);
        assert!(graph.connect(west, Side::East).is_some());

        let mut chunks = HashMap::new();
        let mut grid = TileGrid::filled(Tile::Wall);
        for x in 1..127 {
            grid.set(x, 63, Tile::Floor);
        }
        grid.set(127, 63, Tile::Door);
        chunks.insert(west, grid);

        let mut grid = TileGrid::filled(Tile::Wall);
        grid.set(0, 63, Tile::Door);
        for x in 1..127 {
            grid.set(x, 63, Tile::Floor);
        }
        chunks.insert(east, grid);

        TestWorld { chunks, graph }
    }

    /// Two-chunk islands sharing two doorways; only the southern pair of
    /// chunks is loaded, and the older doorway sits in the unloaded pair.
    fn double_doorway_world() -> TestWorld {
        let mut graph = IslandGraph::new(WorldSeed::new(5));
        graph.register_island(vec![ChunkCoord::new(0, 0), ChunkCoord::new(0, 1)], 0);
        graph.register_island(vec![ChunkCoord::new(1, 0), ChunkCoord::new(1, 1)], 0);
        assert!(graph.connect(ChunkCoord::new(0, 0), Side::East).is_some());
        assert!(graph.connect(ChunkCoord::new(0, 1), Side::East).is_some());

        let mut chunks = HashMap::new();
        let mut grid = TileGrid::filled(Tile::Wall);
        for x in 1..127 {
            grid.set(x, 63, Tile::Floor);
        }
        grid.set(127, 63, Tile::Door);
        chunks.insert(ChunkCoord::new(0, 1), grid);

        let mut grid = TileGrid::filled(Tile::Wall);
        grid.set(0, 63, Tile::Door);
        for x in 1..127 {
            grid.set(x, 63, Tile::Floor);
        }
        chunks.insert(ChunkCoord::new(1, 1), grid);

        TestWorld { chunks, graph }
    }

    fn assert_contiguous(path: &[TilePos]) {
        assert!(path.windows(2).all(|w| w[0].manhattan(w[1]) == 1));
    }

    #[test]
    fn test_same_island_path_is_shortest() {
        let world = corridor_world();
        let start = TilePos::new(1, 63);
        let goal = TilePos::new(40, 63);
        let path = CrossIslandPathfinder::new(10_000).find_path(&world, start, goal);
        assert_eq!(path.len(), 40);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
        assert_contiguous(&path);
    }

    #[test]
    fn test_path_crosses_doorway() {
        let world = corridor_world();
        let start = TilePos::new(1, 63);
        let goal = TilePos::new(128 + 120, 63);
        let path = CrossIslandPathfinder::new(10_000).find_path(&world, start, goal);
        assert_eq!(path.len() as u32, start.manhattan(goal) + 1);
        assert!(path.contains(&TilePos::new(127, 63)));
        assert!(path.contains(&TilePos::new(128, 63)));
        assert_contiguous(&path);
    }

    #[test]
    fn test_path_uses_loaded_doorway_between_same_islands() {
        let world = double_doorway_world();
        let start = TilePos::new(1, 191);
        let goal = TilePos::new(248, 191);
        let path = CrossIslandPathfinder::new(10_000).find_path(&world, start, goal);
        assert_eq!(path.len() as u32, start.manhattan(goal) + 1);
        assert!(path.contains(&TilePos::new(127, 191)));
        assert!(path.contains(&TilePos::new(128, 191)));
        assert_contiguous(&path);
    }

    #[test]
    fn test_path_prefers_nearest_doorway() {
        let mut world = double_doorway_world();
        // Load the northern pair too, with its own corridor on row 63.
        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(1, 0)] {
            let mut grid = TileGrid::filled(Tile::Wall);
            for x in 0..128 {
                grid.set(x, 63, Tile::Floor);
            }
            let door_x = if coord.x == 0 { 127 } else { 0 };
            grid.set(door_x, 63, Tile::Door);
            world.chunks.insert(coord, grid);
        }

        let start = TilePos::new(1, 191);
        let goal = TilePos::new(248, 191);
        let path = CrossIslandPathfinder::new(10_000).find_path(&world, start, goal);
        assert!(path.contains(&TilePos::new(127, 191)));
        assert!(!path.contains(&TilePos::new(127, 63)));

        let start = TilePos::new(1, 63);
        let goal = TilePos::new(248, 63);
        let path = CrossIslandPathfinder::new(10_000).find_path(&world, start, goal);
        assert_eq!(path.len() as u32, start.manhattan(goal) + 1);
        assert!(path.contains(&TilePos::new(127, 63)));
        assert_contiguous(&path);
    }

    #[test]
    fn test_start_equals_goal() {
        let world = corridor_world();
        let pos = TilePos::new(10, 63);
        assert_eq!(CrossIslandPathfinder::new(10).find_path(&world, pos, pos), vec![pos]);
    }

    #[test]
    fn test_blocked_and_unloaded_give_empty_path() {
        let mut world = corridor_world();
        let finder = CrossIslandPathfinder::new(10_000);

        // Goal on a wall.
        assert!(finder.find_path(&world, TilePos::new(1, 63), TilePos::new(5, 5)).is_empty());
        // Goal in a chunk that is not loaded.
        assert!(finder.find_path(&world, TilePos::new(1, 63), TilePos::new(300, 63)).is_empty());

        // Wall off the corridor.
        if let Some(grid) = world.chunks.get_mut(&ChunkCoord::new(0, 0)) {
            grid.set(60, 63, Tile::Wall);
        }
        assert!(finder.find_path(&world, TilePos::new(1, 63), TilePos::new(200, 63)).is_empty());
    }

    #[test]
    fn test_no_doorway_gives_empty_path() {
        let mut world = corridor_world();
        let lonely = ChunkCoord::new(5, 5);
        world.graph.register_island(vec![lonely], 0);
        let mut grid = TileGrid::filled(Tile::Wall);
        grid.set(10, 10, Tile::Floor);
        world.chunks.insert(lonely, grid);

        let goal = lonely.to_world(liminal_core::LocalPos::new(10, 10));
        assert!(CrossIslandPathfinder::new(10_000)
            .find_path(&world, TilePos::new(1, 63), goal)
            .is_empty());
    }

    #[test]
    fn test_expansion_cap() {
        let world = corridor_world();
        let path = CrossIslandPathfinder::new(5).find_path(&world, TilePos::new(1, 63), TilePos::new(100, 63));
        assert!(path.is_empty());
    }
}
