//! # Maze Generation
//!
//! Produces the tiles of one chunk from its seed and its border openings.
//!
//! ## Algorithm
//!
//! 1. Start from solid wall. The outer ring stays wall except at openings.
//! 2. Carve openings first: the border tile itself plus a stub inwards to
//!    the nearest lattice cell.
//! 3. Recursive backtracking over a virtual lattice of cells at odd tile
//!    coordinates (cell `i` sits on tile `2i + 1`). `branching_factor` is the
//!    chance of picking a random direction instead of running straight,
//!    which is what gives the long fluorescent corridors.
//! 4. Drop rectangular rooms until `room_coverage` of the interior is taken.
//! 5. Flood fill from the start cell and force a corridor to any opening the
//!    fill did not reach.
//!
//! ## Determinism
//!
//! The output depends only on `(seed, coord, island, openings, params)`.
//! Two calls with the same request produce byte-identical grids.

use std::collections::VecDeque;

use liminal_core::seed::stream;
use liminal_core::{ChunkCoord, IslandId, LocalPos, Side, Tile, TileGrid, WorldSeed, CHUNK_SIZE};
use liminal_rules::MazeParams;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::GenerationError;

/// Border offset of island doorways: the lattice cell nearest the midpoint.
pub const DOOR_OFFSET: usize = CHUNK_SIZE / 2 - 1;

/// Lattice cells per axis. The last half-cell lies on the border ring.
pub(crate) const CELLS: usize = CHUNK_SIZE / 2 - 1;

/// Highest tile coordinate a lattice cell can occupy.
const LAST_CELL_TILE: usize = 2 * CELLS - 1;

/// Start of every maze, cell (0, 0).
pub const START: (usize, usize) = (1, 1);

/// Rooms tried before the room pass gives up on its coverage target.
const MAX_ROOM_ATTEMPTS: usize = 2_048;

/// What a border opening connects to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpeningKind {
    /// Doorway into a different island.
    Door,
    /// Seam towards a chunk of the same island.
    Passage,
}

impl OpeningKind {
    /// Tile written on the border.
    #[inline]
    #[must_use]
    pub const fn tile(self) -> Tile {
        match self {
            Self::Door => Tile::Door,
            Self::Passage => Tile::Floor,
        }
    }
}

/// A hole in the chunk's outer wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BorderOpening {
    /// Which border.
    pub side: Side,
    /// Position along the border. Must be odd and at most `2 * CELLS - 1`.
    pub offset: usize,
    /// Door or passage.
    pub kind: OpeningKind,
}

impl BorderOpening {
    /// Island doorway at the border midpoint.
    #[inline]
    #[must_use]
    pub const fn door(side: Side) -> Self {
        Self {
            side,
            offset: DOOR_OFFSET,
            kind: OpeningKind::Door,
        }
    }

    /// Same-island seam at `offset`.
    #[inline]
    #[must_use]
    pub const fn passage(side: Side, offset: usize) -> Self {
        Self {
            side,
            offset,
            kind: OpeningKind::Passage,
        }
    }

    /// Border tile of the opening.
    #[inline]
    #[must_use]
    pub const fn local(self) -> LocalPos {
        self.side.border_tile(self.offset)
    }

    /// True if the offset lines up with a lattice cell.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.offset % 2 == 1 && self.offset <= LAST_CELL_TILE
    }
}

/// Everything the generator needs for one chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct MazeRequest {
    /// Chunk being generated.
    pub coord: ChunkCoord,
    /// Island it belongs to.
    pub island: IslandId,
    /// Level seed.
    pub seed: WorldSeed,
    /// Border openings, in any order.
    pub openings: Vec<BorderOpening>,
    /// Shape parameters.
    pub params: MazeParams,
}

impl MazeRequest {
    /// Request with default shape parameters.
    #[must_use]
    pub fn new(coord: ChunkCoord, island: IslandId, seed: WorldSeed, openings: Vec<BorderOpening>) -> Self {
        Self {
            coord,
            island,
            seed,
            openings,
            params: MazeParams::default(),
        }
    }

    /// Replaces the shape parameters.
    #[must_use]
    pub const fn with_params(mut self, params: MazeParams) -> Self {
        self.params = params;
        self
    }

    fn stream(&self, purpose: u64) -> ChaCha8Rng {
        let seed = self
            .seed
            .derive(purpose)
            .for_chunk(self.coord.x, self.coord.y)
            .derive(u64::from(self.island.0));
        ChaCha8Rng::seed_from_u64(seed.value())
    }
}

/// Anything that can turn a request into chunk tiles.
///
/// The chunk manager only talks to this trait, so tests can swap in
/// generators that fail or count calls.
pub trait TileGenerator: Send + Sync {
    /// Generates the tiles of one chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be satisfied.
    fn generate_tiles(&self, request: &MazeRequest) -> Result<TileGrid, GenerationError>;
}

/// Recursive-backtracking maze generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct MazeGenerator;

impl MazeGenerator {
    /// Creates a generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generates a chunk with default shape parameters.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidOpening`] for misplaced openings.
    pub fn generate(
        &self,
        coord: ChunkCoord,
        island: IslandId,
        seed: WorldSeed,
        openings: &[BorderOpening],
    ) -> Result<TileGrid, GenerationError> {
        self.generate_tiles(&MazeRequest::new(coord, island, seed, openings.to_vec()))
    }
}

impl TileGenerator for MazeGenerator {
    fn generate_tiles(&self, request: &MazeRequest) -> Result<TileGrid, GenerationError> {
        if let Some(bad) = request.openings.iter().find(|o| !o.is_valid()) {
            return Err(GenerationError::InvalidOpening {
                side: bad.side,
                offset: bad.offset,
            });
        }

        let mut grid = TileGrid::filled(Tile::Wall);
        carve_openings(&mut grid, &request.openings);

        let mut rng = request.stream(stream::MAZE);
        carve_corridors(&mut grid, &mut rng, request.params.branching_factor);

        let mut rng = request.stream(stream::ROOMS);
        carve_rooms(&mut grid, &mut rng, &request.params);

        ensure_connected(&mut grid, &request.openings, request.coord);
        Ok(grid)
    }
}

fn carve_openings(grid: &mut TileGrid, openings: &[BorderOpening]) {
    for opening in openings {
        let pos = opening.local();
        grid.set(pos.x as usize, pos.y as usize, opening.kind.tile());
        // North and west border tiles already touch a cell; south and east
        // are one tile further out.
        match opening.side {
            Side::South => grid.set(opening.offset, CHUNK_SIZE - 2, Tile::Floor),
            Side::East => grid.set(CHUNK_SIZE - 2, opening.offset, Tile::Floor),
            Side::North | Side::West => {}
        }
    }
}

#[inline]
const fn cell_tile(cell: usize) -> usize {
    2 * cell + 1
}

fn carve_corridors(grid: &mut TileGrid, rng: &mut ChaCha8Rng, branching_factor: f64) {
    let mut visited = vec![false; CELLS * CELLS];
    let mut stack: Vec<(usize, usize, Option<Side>)> = Vec::with_capacity(CELLS * CELLS);

    visited[0] = true;
    grid.set(cell_tile(0), cell_tile(0), Tile::Floor);
    stack.push((0, 0, None));

    while let Some(&(cx, cy, heading)) = stack.last() {
        let mut options = [Side::North; 4];
        let mut count = 0;
        for side in Side::ALL {
            if let Some((nx, ny)) = step(cx, cy, side) {
                if !visited[ny * CELLS + nx] {
                    options[count] = side;
                    count += 1;
                }
            }
        }
        if count == 0 {
            stack.pop();
            continue;
        }

        let straight = heading.filter(|h| options[..count].contains(h));
        let side = match straight {
            Some(h) if rng.gen::<f64>() >= branching_factor => h,
            _ => options[rng.gen_range(0..count)],
        };

        let Some((nx, ny)) = step(cx, cy, side) else {
            continue;
        };
        let (dx, dy) = side.delta();
        let wall_x = (cell_tile(cx) as i32 + dx) as usize;
        let wall_y = (cell_tile(cy) as i32 + dy) as usize;
        grid.set(wall_x, wall_y, Tile::Floor);
        grid.set(cell_tile(nx), cell_tile(ny), Tile::Floor);
        visited[ny * CELLS + nx] = true;
        stack.push((nx, ny, Some(side)));
    }
}

#[inline]
fn step(cx: usize, cy: usize, side: Side) -> Option<(usize, usize)> {
    let (dx, dy) = side.delta();
    let nx = cx.checked_add_signed(dx as isize)?;
    let ny = cy.checked_add_signed(dy as isize)?;
    (nx < CELLS && ny < CELLS).then_some((nx, ny))
}

fn carve_rooms(grid: &mut TileGrid, rng: &mut ChaCha8Rng, params: &MazeParams) {
    let interior = LAST_CELL_TILE * LAST_CELL_TILE;
    let target = (params.room_coverage * interior as f64) as usize;
    let mut covered = 0;
    let mut attempts = 0;

    while covered < target && attempts < MAX_ROOM_ATTEMPTS {
        attempts += 1;
        let w = rng.gen_range(params.room_min..=params.room_max);
        let h = rng.gen_range(params.room_min..=params.room_max);
        let x0 = rng.gen_range(1..=LAST_CELL_TILE + 1 - w);
        let y0 = rng.gen_range(1..=LAST_CELL_TILE + 1 - h);

        let touches = room_touches_floor(grid, x0, y0, w, h);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                grid.set(x, y, Tile::Floor);
            }
        }
        if !touches {
            stitch(grid, x0, y0);
        }
        covered += w * h;
    }
}

fn room_touches_floor(grid: &TileGrid, x0: usize, y0: usize, w: usize, h: usize) -> bool {
    (y0 - 1..=y0 + h).any(|y| (x0 - 1..=x0 + w).any(|x| grid.get(x, y).is_walkable()))
}

/// Carves from a room corner towards the start until it meets floor.
fn stitch(grid: &mut TileGrid, mut x: usize, mut y: usize) {
    while (x, y) != START {
        if x > START.0 {
            x -= 1;
        } else {
            y -= 1;
        }
        if grid.get(x, y).is_walkable() {
            break;
        }
        grid.set(x, y, Tile::Floor);
    }
}

/// Walkable tiles reachable from `from`, as a flat mask.
pub(crate) fn flood(grid: &TileGrid, from: (usize, usize)) -> Vec<bool> {
    let mut reached = vec![false; CHUNK_SIZE * CHUNK_SIZE];
    if !grid.get(from.0, from.1).is_walkable() {
        return reached;
    }
    let mut queue = VecDeque::new();
    reached[from.1 * CHUNK_SIZE + from.0] = true;
    queue.push_back(from);
    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in neighbors(x, y) {
            let i = ny * CHUNK_SIZE + nx;
            if !reached[i] && grid.get(nx, ny).is_walkable() {
                reached[i] = true;
                queue.push_back((nx, ny));
            }
        }
    }
    reached
}

fn neighbors(x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
    Side::ALL.into_iter().filter_map(move |side| {
        let (dx, dy) = side.delta();
        let nx = x.checked_add_signed(dx as isize)?;
        let ny = y.checked_add_signed(dy as isize)?;
        (nx < CHUNK_SIZE && ny < CHUNK_SIZE).then_some((nx, ny))
    })
}

fn ensure_connected(grid: &mut TileGrid, openings: &[BorderOpening], coord: ChunkCoord) {
    let mut reached = flood(grid, START);
    for opening in openings {
        let pos = opening.local();
        if reached[pos.index()] {
            continue;
        }
        tracing::debug!(
            chunk_x = coord.x,
            chunk_y = coord.y,
            side = ?opening.side,
            offset = opening.offset,
            "opening unreachable after carving, forcing a corridor"
        );
        force_corridor(grid, (pos.x as usize, pos.y as usize), &reached);
        reached = flood(grid, START);
    }
}

/// Carves the shortest wall path from `from` to the reached region.
///
/// The search never crosses the border ring, so no new openings appear.
fn force_corridor(grid: &mut TileGrid, from: (usize, usize), reached: &[bool]) {
    const NONE: usize = usize::MAX;
    let mut parent = vec![NONE; CHUNK_SIZE * CHUNK_SIZE];
    let start = from.1 * CHUNK_SIZE + from.0;
    parent[start] = start;
    let mut queue = VecDeque::from([from]);

    while let Some((x, y)) = queue.pop_front() {
        let here = y * CHUNK_SIZE + x;
        if reached[here] {
            let mut i = parent[here];
            while i != start {
                grid.set(i % CHUNK_SIZE, i / CHUNK_SIZE, Tile::Floor);
                i = parent[i];
            }
            return;
        }
        for (nx, ny) in neighbors(x, y) {
            let inside = (1..CHUNK_SIZE - 1).contains(&nx) && (1..CHUNK_SIZE - 1).contains(&ny);
            let i = ny * CHUNK_SIZE + nx;
            if inside && parent[i] == NONE {
                parent[i] = here;
                queue.push_back((nx, ny));
            }
        }
    }
}
