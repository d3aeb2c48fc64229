//! # Chunk Manager
//!
//! Owns every loaded chunk and decides, once per tick, what to generate and
//! what to throw away based on where the observer stands.
//!
//! ## Radii
//!
//! ```text
//! active_radius      must be loaded, never evicted for space
//! generation_radius  queued for generation, nearest first
//! unload_radius      anything further away is evicted
//! ```
//!
//! ## Per-chunk pipeline
//!
//! island (and neighbour islands) -> openings -> maze -> decor ->
//! spawn pass with the corruption *before* this chunk -> corruption
//! increment -> modification replay -> `ChunkLoaded`.
//!
//! Corruption only advances the first time a coordinate is generated. An
//! evicted chunk comes back with the same tiles and re-rolls its spawns with
//! the corruption it was first generated at, so spawn handles stay valid.
//!
//! ## Budget
//!
//! Generation stops for the tick once `frame_budget` is spent, but at least
//! one chunk is generated per tick so the queue always drains.

use std::cell::Cell;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

use liminal_core::seed::stream;
use liminal_core::{Chunk, ChunkCoord, IslandId, LevelId, Side, SpawnId, Tile, TileGrid, TilePos, WorldSeed};
use liminal_rules::{CorruptionModel, EntitySpawner, LevelConfig, LevelRegistry, SpawnCategory, SpawnPlacement};

use crate::config::{GameConfig, WorldConfig};
use crate::decor::decorate;
use crate::error::{GenerationError, WorldError, WorldResult};
use crate::island::IslandGraph;
use crate::maze::{MazeGenerator, MazeRequest, TileGenerator};
use crate::modifications::{ChunkModification, ModificationEntry, ModificationLog};
use crate::pathfinding::{CrossIslandPathfinder, WorldView};
use crate::worker::{GenerationJob, GenerationWorker};

/// Jobs kept in flight on the worker thread.
pub const WORKER_PIPELINE_DEPTH: usize = 4;

/// Lifecycle of a chunk, as seen from the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Never generated, or evicted and freed.
    Ungenerated,
    /// Waiting in the generation queue.
    Queued,
    /// Being carved on the worker thread.
    Generating,
    /// Resident and readable.
    Loaded,
    /// Evicted this tick; freed at the start of the next one.
    Unloading,
}

/// Notifications for the renderer and entity system.
#[derive(Clone, Debug)]
pub enum WorldEvent {
    /// A chunk became readable.
    ChunkLoaded {
        /// The chunk.
        chunk: Arc<Chunk>,
        /// Live spawns of the chunk.
        spawns: Vec<SpawnPlacement>,
        /// False when an evicted chunk was rebuilt.
        first_visit: bool,
    },
    /// A chunk was evicted.
    ChunkUnloaded {
        /// The chunk, for renderer cleanup.
        chunk: Arc<Chunk>,
    },
}

/// Running counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldStats {
    /// Chunks currently resident.
    pub loaded_chunks: usize,
    /// Chunks waiting in the queue.
    pub queued_chunks: usize,
    /// Chunks on the worker thread.
    pub in_flight: usize,
    /// Highest resident count seen.
    pub peak_loaded: usize,
    /// Islands known on the active level.
    pub islands: usize,
    /// Corruption of the active level.
    pub corruption: f32,
    /// First-time generations this run.
    pub generated_this_session: u64,
    /// Rebuilds of evicted chunks this run.
    pub regenerated_this_session: u64,
    /// Evictions this run.
    pub unloaded_this_session: u64,
    /// Generation failures this run.
    pub failed_generations: u64,
    /// Time spent generating during the last tick.
    pub last_tick_generation: Duration,
}

/// What one `update` did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Chunks inserted.
    pub generated: usize,
    /// Chunks evicted.
    pub unloaded: usize,
    /// Generation failures (re-queued next tick).
    pub failed: usize,
    /// Queue length after the tick.
    pub queued: usize,
}

#[derive(Debug)]
struct Resident {
    chunk: Arc<Chunk>,
    spawns: Vec<SpawnPlacement>,
    last_access: Cell<u64>,
}

type ChunkKey = (LevelId, ChunkCoord);

/// The streaming world.
pub struct ChunkManager {
    config: WorldConfig,
    levels: LevelRegistry,
    run_seed: WorldSeed,
    active_level: LevelId,
    generator: Arc<dyn TileGenerator>,
    worker: Option<GenerationWorker>,
    graphs: HashMap<LevelId, IslandGraph>,
    corruption: CorruptionModel,
    first_generation: HashMap<ChunkKey, f32>,
    modifications: ModificationLog,
    loaded: HashMap<ChunkKey, Resident>,
    unloading: Vec<Arc<Chunk>>,
    queue: VecDeque<ChunkCoord>,
    in_flight: HashSet<ChunkKey>,
    events: Vec<WorldEvent>,
    observer: ChunkCoord,
    clock: u64,
    stats: WorldStats,
}

impl ChunkManager {
    /// Creates a manager using the built-in maze generator.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the worker thread cannot
    /// be started.
    pub fn new(config: GameConfig) -> WorldResult<Self> {
        Self::with_generator(config, Arc::new(MazeGenerator::new()))
    }

    /// Creates a manager with a custom tile generator.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CacheOverflow`] if the active area does not fit
    /// in the cache, other variants for invalid settings or a failed worker
    /// spawn.
    pub fn with_generator(config: GameConfig, generator: Arc<dyn TileGenerator>) -> WorldResult<Self> {
        let GameConfig { world, levels } = config;
        world.validate()?;
        let active_level = LevelId(world.start_level);
        if levels.get(active_level).is_none() {
            return Err(WorldError::UnknownLevel(active_level));
        }

        let worker = if world.threaded_generation {
            Some(GenerationWorker::spawn(Arc::clone(&generator))?)
        } else {
            None
        };

        tracing::info!(
            seed = world.seed,
            level = active_level.0,
            threaded = world.threaded_generation,
            "world ready"
        );

        Ok(Self {
            run_seed: WorldSeed::new(world.seed),
            config: world,
            levels,
            active_level,
            generator,
            worker,
            graphs: HashMap::new(),
            corruption: CorruptionModel::new(),
            first_generation: HashMap::new(),
            modifications: ModificationLog::new(),
            loaded: HashMap::new(),
            unloading: Vec::new(),
            queue: VecDeque::new(),
            in_flight: HashSet::new(),
            events: Vec::new(),
            observer: ChunkCoord::default(),
            clock: 0,
            stats: WorldStats::default(),
        })
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Advances one tick with the observer standing on `observer`.
    pub fn update(&mut self, observer: TilePos) -> TickReport {
        self.clock += 1;
        self.unloading.clear();

        let center = observer.chunk();
        self.observer = center;

        let mut report = TickReport {
            unloaded: self.evict_beyond(center, self.config.unload_radius),
            ..TickReport::default()
        };
        self.refresh_queue(center, self.config.generation_radius);
        self.touch_active(center);

        let started = Instant::now();
        if self.worker.is_some() {
            self.pump_worker(&mut report, started);
        } else {
            self.drain_queue(&mut report, started);
        }

        report.queued = self.queue.len();
        self.stats.last_tick_generation = started.elapsed();
        report
    }

    /// Generates everything queued right now, ignoring the tick budget.
    ///
    /// Returns the number of chunks inserted.
    pub fn flush_generation_queue(&mut self) -> usize {
        let mut report = TickReport::default();

        if self.worker.is_some() {
            loop {
                self.submit_jobs();
                if self.in_flight.is_empty() {
                    break;
                }
                let received = match &self.worker {
                    Some(worker) => worker.recv(),
                    None => break,
                };
                match received {
                    Ok(output) => self.complete(output.job, output.result, &mut report),
                    Err(err) => {
                        self.worker_lost(&err);
                        break;
                    }
                }
            }
        }

        while let Some(&coord) = self.queue.front() {
            if !self.make_room(1) {
                break;
            }
            self.queue.pop_front();
            let job = self.prepare(coord);
            let result = self.generator.generate_tiles(&job.request);
            self.complete(job, result, &mut report);
        }
        report.generated
    }

    /// Queues every chunk within `radius` of `center` and generates them now.
    ///
    /// Used for spawning and teleports, where the player must not wait.
    pub fn ensure_loaded_around(&mut self, center: TilePos, radius: u32) -> usize {
        let chunk = center.chunk();
        self.observer = chunk;
        self.refresh_queue(chunk, radius);
        self.flush_generation_queue()
    }

    fn refresh_queue(&mut self, center: ChunkCoord, radius: u32) {
        let r2 = i64::from(radius).pow(2);
        self.queue.retain(|c| c.distance_squared(center) <= r2);

        let level = self.active_level;
        let r = radius as i32;
        for dy in -r..=r {
            for dx in -r..=r {
                let coord = center.offset(dx, dy);
                if coord.distance_squared(center) > r2 {
                    continue;
                }
                let key = (level, coord);
                if self.loaded.contains_key(&key) || self.in_flight.contains(&key) || self.queue.contains(&coord) {
                    continue;
                }
                self.queue.push_back(coord);
            }
        }
        self.queue
            .make_contiguous()
            .sort_by_key(|c| (c.distance_squared(center), *c));
    }

    fn drain_queue(&mut self, report: &mut TickReport, started: Instant) {
        let budget = self.config.frame_budget();
        let cap = self.config.max_generations_per_tick.unwrap_or(usize::MAX);
        let mut attempts = 0;

        while let Some(&coord) = self.queue.front() {
            if attempts > 0 && (attempts >= cap || started.elapsed() >= budget) {
                break;
            }
            if !self.make_room(1) {
                break;
            }
            self.queue.pop_front();
            attempts += 1;

            let job = self.prepare(coord);
            let result = self.generator.generate_tiles(&job.request);
            self.complete(job, result, report);
        }
    }

    fn pump_worker(&mut self, report: &mut TickReport, started: Instant) {
        let budget = self.config.frame_budget();
        let cap = self.config.max_generations_per_tick.unwrap_or(usize::MAX);
        let mut handled = 0;

        self.submit_jobs();
        loop {
            if handled > 0 && (handled >= cap || started.elapsed() >= budget) {
                break;
            }
            let received = match &self.worker {
                Some(worker) => worker.try_recv(),
                None => break,
            };
            match received {
                Ok(Some(output)) => {
                    handled += 1;
                    self.complete(output.job, output.result, report);
                }
                Ok(None) => break,
                Err(err) => {
                    self.worker_lost(&err);
                    break;
                }
            }
        }
        self.submit_jobs();
    }

    fn submit_jobs(&mut self) {
        while self.worker.is_some() && self.in_flight.len() < WORKER_PIPELINE_DEPTH {
            let Some(&coord) = self.queue.front() else {
                break;
            };
            if !self.make_room(1) {
                break;
            }
            self.queue.pop_front();

            let job = self.prepare(coord);
            let key = (job.level, coord);
            let submitted = match &self.worker {
                Some(worker) => worker.submit(job),
                None => Err(GenerationError::WorkerDisconnected),
            };
            match submitted {
                Ok(()) => {
                    self.in_flight.insert(key);
                }
                Err(err) => {
                    self.worker_lost(&err);
                    break;
                }
            }
        }
    }

    fn worker_lost(&mut self, err: &GenerationError) {
        tracing::error!(error = %err, in_flight = self.in_flight.len(), "generation worker lost, falling back to inline generation");
        self.worker = None;
        self.in_flight.clear();
    }

    /// Blocks until the worker has returned every in-flight job and drops
    /// the results.
    fn discard_in_flight(&mut self) {
        while !self.in_flight.is_empty() {
            let received = match &self.worker {
                Some(worker) => worker.recv(),
                None => break,
            };
            match received {
                Ok(output) => {
                    self.in_flight.remove(&(output.job.level, output.job.coord()));
                }
                Err(_) => break,
            }
        }
        self.in_flight.clear();
    }

    // =========================================================================
    // Generation pipeline
    // =========================================================================

    /// Seed of one level's streams within the current run.
    #[must_use]
    pub fn level_seed(&self, level: LevelId) -> WorldSeed {
        self.run_seed.derive(stream::LEVEL).derive(u64::from(level.0))
    }

    fn prepare(&mut self, coord: ChunkCoord) -> GenerationJob {
        let level = self.active_level;
        let seed = self.level_seed(level);
        let params = self.levels.get(level).map(|l| l.maze).unwrap_or_default();

        let graph = self.graphs.entry(level).or_insert_with(|| IslandGraph::new(seed));
        let island = graph.get_or_create_island(coord);
        for side in Side::ALL {
            graph.get_or_create_island(coord.neighbor(side));
        }
        let openings = graph.border_openings_for(coord);

        GenerationJob {
            level,
            request: MazeRequest {
                coord,
                island,
                seed,
                openings,
                params,
            },
        }
    }

    fn complete(
        &mut self,
        job: GenerationJob,
        result: Result<TileGrid, GenerationError>,
        report: &mut TickReport,
    ) {
        let coord = job.coord();
        let key = (job.level, coord);
        self.in_flight.remove(&key);

        let grid = match result {
            Ok(grid) => grid,
            Err(err) => {
                report.failed += 1;
                self.stats.failed_generations += 1;
                tracing::warn!(
                    chunk_x = coord.x,
                    chunk_y = coord.y,
                    error = %err,
                    "chunk generation failed, re-queueing next tick"
                );
                return;
            }
        };
        if job.level != self.active_level {
            tracing::trace!(chunk_x = coord.x, chunk_y = coord.y, "dropping chunk of inactive level");
            return;
        }

        self.install(&job, &grid);
        report.generated += 1;

        let unload_r2 = i64::from(self.config.unload_radius).pow(2);
        if coord.distance_squared(self.observer) > unload_r2 {
            report.unloaded += usize::from(self.evict(key));
        }
    }

    fn install(&mut self, job: &GenerationJob, grid: &TileGrid) {
        let level = job.level;
        let coord = job.coord();
        let key = (level, coord);
        let Some(config) = self.levels.get(level) else {
            return;
        };
        let seed = job.request.seed;
        let island = job.request.island;
        let tier = self
            .graphs
            .get(&level)
            .and_then(|g| g.island(island))
            .map_or(0, |i| i.tier);

        let decor = decorate(grid, coord, seed, &config.maze);
        let mut chunk = Chunk::from_grid(coord, level, island, tier, grid, decor);

        let recorded = self.first_generation.get(&key).copied();
        let first_visit = recorded.is_none();
        let corruption = recorded.unwrap_or_else(|| self.corruption.get(level));

        let mut spawns = EntitySpawner::new(seed).spawn_in_chunk(&chunk, config, corruption);
        if first_visit {
            self.first_generation.insert(key, corruption);
            self.corruption
                .increase(level, config.corruption.per_chunk, config.corruption.max);
            self.stats.generated_this_session += 1;
        } else {
            self.stats.regenerated_this_session += 1;
        }

        for spawn in spawns.iter().filter(|s| s.category == SpawnCategory::Exit) {
            chunk.stamp(spawn.local(), Tile::ExitStairs);
        }
        let replayed = self.modifications.apply(&mut chunk, &mut spawns);
        for spawn in &spawns {
            chunk.attach_spawn(spawn.local(), spawn.id);
        }

        tracing::debug!(
            chunk_x = coord.x,
            chunk_y = coord.y,
            island = island.0,
            tier,
            corruption,
            spawns = spawns.len(),
            replayed,
            first_visit,
            "chunk loaded"
        );

        let chunk = Arc::new(chunk);
        self.loaded.insert(
            key,
            Resident {
                chunk: Arc::clone(&chunk),
                spawns: spawns.clone(),
                last_access: Cell::new(self.clock),
            },
        );
        self.stats.peak_loaded = self.stats.peak_loaded.max(self.loaded.len());
        self.events.push(WorldEvent::ChunkLoaded {
            chunk,
            spawns,
            first_visit,
        });
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    fn touch_active(&self, center: ChunkCoord) {
        let r2 = i64::from(self.config.active_radius).pow(2);
        for (key, resident) in &self.loaded {
            if key.1.distance_squared(center) <= r2 {
                resident.last_access.set(self.clock);
            }
        }
    }

    /// Evicts least-recently-used chunks outside the active radius until
    /// `incoming` more fit. Returns false if they still do not fit.
    fn make_room(&mut self, incoming: usize) -> bool {
        let max = self.config.max_loaded_chunks;
        if self.loaded.len() + self.in_flight.len() + incoming <= max {
            return true;
        }

        let target = self.config.eviction_target().min(max.saturating_sub(incoming));
        let center = self.observer;
        let active_r2 = i64::from(self.config.active_radius).pow(2);
        let mut candidates: Vec<_> = self
            .loaded
            .iter()
            .filter(|(key, _)| key.1.distance_squared(center) > active_r2)
            .map(|(&key, resident)| (resident.last_access.get(), Reverse(key.1.distance_squared(center)), key))
            .collect();
        candidates.sort_unstable();

        for (_, _, key) in candidates {
            if self.loaded.len() + self.in_flight.len() + incoming <= target {
                break;
            }
            self.evict(key);
        }
        self.loaded.len() + self.in_flight.len() + incoming <= max
    }

    fn evict_beyond(&mut self, center: ChunkCoord, radius: u32) -> usize {
        let r2 = i64::from(radius).pow(2);
        let mut far: Vec<ChunkKey> = self
            .loaded
            .keys()
            .filter(|key| key.1.distance_squared(center) > r2)
            .copied()
            .collect();
        far.sort_unstable();
        far.into_iter().filter(|&key| self.evict(key)).count()
    }

    fn evict_all(&mut self) {
        let mut keys: Vec<ChunkKey> = self.loaded.keys().copied().collect();
        keys.sort_unstable();
        for key in keys {
            self.evict(key);
        }
    }

    fn evict(&mut self, key: ChunkKey) -> bool {
        let Some(resident) = self.loaded.remove(&key) else {
            return false;
        };
        self.stats.unloaded_this_session += 1;
        tracing::debug!(chunk_x = key.1.x, chunk_y = key.1.y, modified = resident.chunk.modified, "chunk unloaded");
        self.events.push(WorldEvent::ChunkUnloaded {
            chunk: Arc::clone(&resident.chunk),
        });
        self.unloading.push(resident.chunk);
        true
    }

    // =========================================================================
    // Levels & runs
    // =========================================================================

    /// Switches the active level. Chunks of the old level are unloaded and
    /// the queue is cleared; islands, corruption and modifications of every
    /// level are kept.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownLevel`] if the level is not configured.
    pub fn enter_level(&mut self, level: LevelId) -> WorldResult<()> {
        if self.levels.get(level).is_none() {
            return Err(WorldError::UnknownLevel(level));
        }
        if level == self.active_level {
            return Ok(());
        }
        self.discard_in_flight();
        self.evict_all();
        self.queue.clear();
        tracing::info!(
            from = self.active_level.0,
            to = level.0,
            corruption = self.corruption.get(level),
            "entered level"
        );
        self.active_level = level;
        Ok(())
    }

    /// Starts a new run: new seed, zero corruption, no islands, no
    /// modifications, back on the start level.
    pub fn new_run(&mut self, seed: u64) {
        self.discard_in_flight();
        self.evict_all();
        self.queue.clear();
        self.run_seed = WorldSeed::new(seed);
        self.active_level = LevelId(self.config.start_level);
        self.corruption.reset_all();
        self.graphs.clear();
        self.first_generation.clear();
        self.modifications.clear();
        self.stats = WorldStats::default();
        tracing::info!(seed, level = self.active_level.0, "new run started");
    }

    // =========================================================================
    // Gameplay changes
    // =========================================================================

    /// Overwrites a tile of a loaded chunk and records it.
    ///
    /// Returns false if the chunk is not loaded.
    pub fn modify_tile(&mut self, pos: TilePos, tile: Tile) -> bool {
        let key = (self.active_level, pos.chunk());
        let Some(resident) = self.loaded.get_mut(&key) else {
            return false;
        };
        Arc::make_mut(&mut resident.chunk).set_tile(pos.local(), tile);
        resident.last_access.set(self.clock);
        self.modifications.record(
            key.0,
            key.1,
            ChunkModification::Tile {
                local: pos.local(),
                tile,
            },
        );
        true
    }

    /// Removes a spawn for good (picked up, killed).
    ///
    /// Returns false if the spawn is not live in a loaded chunk.
    pub fn consume_spawn(&mut self, id: SpawnId) -> bool {
        let key = (self.active_level, id.chunk);
        let Some(resident) = self.loaded.get_mut(&key) else {
            return false;
        };
        let before = resident.spawns.len();
        resident.spawns.retain(|s| s.id != id);
        if resident.spawns.len() == before {
            return false;
        }
        Arc::make_mut(&mut resident.chunk).detach_spawn(id);
        self.modifications
            .record(key.0, key.1, ChunkModification::SpawnConsumed(id));
        true
    }

    /// Snapshot of every recorded change, for saving.
    #[must_use]
    pub fn export_modifications(&self) -> Vec<ModificationEntry> {
        self.modifications.export()
    }

    /// Replaces the change log, e.g. after loading a save. Applies to chunks
    /// generated from now on.
    pub fn load_modifications(&mut self, entries: Vec<ModificationEntry>) {
        self.modifications.load(entries);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A loaded chunk of the active level. Counts as an access for eviction.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        let resident = self.loaded.get(&(self.active_level, coord))?;
        resident.last_access.set(self.clock);
        Some(Arc::clone(&resident.chunk))
    }

    /// Live spawns of a loaded chunk.
    #[must_use]
    pub fn spawns(&self, coord: ChunkCoord) -> Option<&[SpawnPlacement]> {
        self.loaded
            .get(&(self.active_level, coord))
            .map(|r| r.spawns.as_slice())
    }

    /// Lifecycle state of a chunk of the active level.
    #[must_use]
    pub fn chunk_state(&self, coord: ChunkCoord) -> ChunkState {
        let key = (self.active_level, coord);
        if self.loaded.contains_key(&key) {
            ChunkState::Loaded
        } else if self.in_flight.contains(&key) {
            ChunkState::Generating
        } else if self.queue.contains(&coord) {
            ChunkState::Queued
        } else if self
            .unloading
            .iter()
            .any(|c| c.coord == coord && c.level == self.active_level)
        {
            ChunkState::Unloading
        } else {
            ChunkState::Ungenerated
        }
    }

    /// True if the chunk is readable.
    #[must_use]
    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.loaded.contains_key(&(self.active_level, coord))
    }

    /// Tile at a world position, if its chunk is loaded.
    #[must_use]
    pub fn tile_at(&self, pos: TilePos) -> Option<Tile> {
        self.loaded
            .get(&(self.active_level, pos.chunk()))
            .map(|r| r.chunk.tile(pos.local()))
    }

    /// Island of a chunk of the active level, if assigned.
    #[must_use]
    pub fn island_of(&self, coord: ChunkCoord) -> Option<IslandId> {
        self.graphs.get(&self.active_level)?.island_of(coord)
    }

    /// Island graph of the active level.
    #[must_use]
    pub fn island_graph(&self) -> Option<&IslandGraph> {
        self.graphs.get(&self.active_level)
    }

    /// Shortest walkable path over loaded chunks; empty if none is known.
    #[must_use]
    pub fn find_path(&self, start: TilePos, goal: TilePos) -> Vec<TilePos> {
        CrossIslandPathfinder::new(self.config.max_path_expansions).find_path(self, start, goal)
    }

    /// Takes all pending events.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn loaded_chunk_count(&self) -> usize {
        self.loaded.len()
    }

    /// Coordinates of resident chunks, sorted.
    #[must_use]
    pub fn loaded_coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self.loaded.keys().map(|key| key.1).collect();
        coords.sort_unstable();
        coords
    }

    /// Level currently streamed.
    #[must_use]
    pub const fn active_level(&self) -> LevelId {
        self.active_level
    }

    /// Config of the active level.
    #[must_use]
    pub fn level_config(&self) -> Option<&LevelConfig> {
        self.levels.get(self.active_level)
    }

    /// Corruption state of every level.
    #[must_use]
    pub const fn corruption(&self) -> &CorruptionModel {
        &self.corruption
    }

    /// Streaming settings.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Counters, with the gauges filled in.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        WorldStats {
            loaded_chunks: self.loaded.len(),
            queued_chunks: self.queue.len(),
            in_flight: self.in_flight.len(),
            islands: self.island_graph().map_or(0, IslandGraph::len),
            corruption: self.corruption.get(self.active_level),
            ..self.stats.clone()
        }
    }
}

impl std::fmt::Debug for ChunkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkManager")
            .field("active_level", &self.active_level)
            .field("observer", &self.observer)
            .field("loaded", &self.loaded.len())
            .field("queued", &self.queue.len())
            .field("in_flight", &self.in_flight.len())
            .field("threaded", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

impl WorldView for ChunkManager {
    fn tile(&self, pos: TilePos) -> Option<Tile> {
        self.tile_at(pos)
    }

    fn island_at(&self, chunk: ChunkCoord) -> Option<IslandId> {
        self.island_of(chunk)
    }

    fn islands(&self) -> Option<&IslandGraph> {
        self.island_graph()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liminal_rules::SpawnEntry;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn game(world: WorldConfig) -> GameConfig {
        let mut level = LevelConfig::new(LevelId(0), "Test");
        level.spawns.push(SpawnEntry {
            category: SpawnCategory::Item,
            type_id: "almond_water".into(),
            base_probability: 0.2,
            corruption_multiplier: -0.05,
            min_corruption: 0.0,
        });
        level.spawns.push(SpawnEntry {
            category: SpawnCategory::Exit,
            type_id: "exit_hole".into(),
            base_probability: 0.05,
            corruption_multiplier: 2.0,
            min_corruption: 0.0,
        });
        let mut other = LevelConfig::new(LevelId(1), "Other");
        other.corruption.per_chunk = 0.5;
        GameConfig::new(world, LevelRegistry::from_levels(vec![level, other]).unwrap()).unwrap()
    }

    fn manager() -> ChunkManager {
        ChunkManager::new(game(WorldConfig::testing())).unwrap()
    }

    #[test]
    fn test_active_area_loads_and_counts_corruption() {
        let mut world = manager();
        world.update(TilePos::new(0, 0));
        world.flush_generation_queue();

        // Generation radius 2 covers 13 chunks.
        assert_eq!(world.loaded_chunk_count(), 13);
        assert_eq!(world.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Loaded);
        assert_eq!(world.chunk_state(ChunkCoord::new(3, 0)), ChunkState::Ungenerated);

        let stats = world.stats();
        assert_eq!(stats.generated_this_session, 13);
        assert!((stats.corruption - 13.0 * 0.05).abs() < 1e-4);
    }

    #[test]
    fn test_first_tick_generates_at_least_one() {
        let config = WorldConfig {
            frame_budget_micros: 1,
            ..WorldConfig::testing()
        };
        let mut world = ChunkManager::new(game(config)).unwrap();
        let report = world.update(TilePos::new(0, 0));
        assert!(report.generated >= 1);
        assert_eq!(report.generated + report.queued, 13);
        assert!(world.is_loaded(ChunkCoord::new(0, 0)), "nearest chunk first");
    }

    #[test]
    fn test_max_generations_per_tick() {
        let config = WorldConfig {
            max_generations_per_tick: Some(2),
            ..WorldConfig::testing()
        };
        let mut world = ChunkManager::new(game(config)).unwrap();
        assert_eq!(world.update(TilePos::new(0, 0)).generated, 2);
        assert_eq!(world.update(TilePos::new(0, 0)).generated, 2);
        assert_eq!(world.loaded_chunk_count(), 4);
    }

    #[test]
    fn test_events_and_unloading_state() {
        let mut world = manager();
        world.update(TilePos::new(0, 0));
        world.flush_generation_queue();
        let loaded = world
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, WorldEvent::ChunkLoaded { first_visit: true, .. }))
            .count();
        assert_eq!(loaded, 13);

        // Five chunks east: the western edge is beyond the unload radius.
        world.update(TilePos::new(5 * 128, 0));
        assert_eq!(world.chunk_state(ChunkCoord::new(-2, 0)), ChunkState::Unloading);
        assert!(world
            .drain_events()
            .iter()
            .any(|e| matches!(e, WorldEvent::ChunkUnloaded { chunk } if chunk.coord == ChunkCoord::new(-2, 0))));
        world.update(TilePos::new(5 * 128, 0));
        assert_eq!(world.chunk_state(ChunkCoord::new(-2, 0)), ChunkState::Ungenerated);
    }

    #[test]
    fn test_regeneration_is_lossless_and_keeps_corruption() {
        let mut world = manager();
        world.update(TilePos::new(0, 0));
        world.flush_generation_queue();
        let origin = ChunkCoord::new(0, 0);
        let hash = world.chunk(origin).unwrap().content_hash();
        let spawns = world.spawns(origin).unwrap().to_vec();

        world.update(TilePos::new(20 * 128, 0));
        world.flush_generation_queue();
        assert!(!world.is_loaded(origin));
        let corruption = world.corruption().get(LevelId(0));
        world.drain_events();

        world.update(TilePos::new(0, 0));
        world.flush_generation_queue();
        let events = world.drain_events();
        let revisit = events.iter().find_map(|e| match e {
            WorldEvent::ChunkLoaded { chunk, first_visit, .. } if chunk.coord == origin => Some(*first_visit),
            _ => None,
        });
        assert_eq!(revisit, Some(false));
        assert_eq!(world.chunk(origin).unwrap().content_hash(), hash);
        assert_eq!(world.spawns(origin).unwrap(), spawns.as_slice());
        assert!(world.corruption().get(LevelId(0)) >= corruption);
        assert!(world.stats().regenerated_this_session >= 1);
    }

    #[test]
    fn test_exit_spawns_are_stamped() {
        let mut world = manager();
        world.ensure_loaded_around(TilePos::new(0, 0), 1);
        let mut exits = 0;
        for coord in world.loaded_coords() {
            for spawn in world.spawns(coord).unwrap() {
                if spawn.category == SpawnCategory::Exit {
                    exits += 1;
                    assert_eq!(world.tile_at(spawn.position), Some(Tile::ExitStairs));
                }
            }
        }
        assert!(exits > 0);
    }

    struct FlakyGenerator {
        failures_left: AtomicUsize,
    }

    impl TileGenerator for FlakyGenerator {
        fn generate_tiles(&self, request: &MazeRequest) -> Result<TileGrid, GenerationError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if request.coord == ChunkCoord::new(0, 0) && left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(GenerationError::Rejected {
                    x: 0,
                    y: 0,
                    reason: "flaky".into(),
                });
            }
            MazeGenerator::new().generate_tiles(request)
        }
    }

    #[test]
    fn test_failed_generation_is_requeued() {
        let generator = Arc::new(FlakyGenerator {
            failures_left: AtomicUsize::new(1),
        });
        let mut world = ChunkManager::with_generator(game(WorldConfig::testing()), generator).unwrap();
        let report = world.update(TilePos::new(0, 0));
        assert_eq!(report.failed, 1);
        world.flush_generation_queue();
        assert_eq!(world.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Ungenerated);
        assert_eq!(world.stats().failed_generations, 1);

        world.update(TilePos::new(0, 0));
        world.flush_generation_queue();
        assert_eq!(world.chunk_state(ChunkCoord::new(0, 0)), ChunkState::Loaded);
    }

    /// Holds every job until opened. Gives up waiting after a few seconds so
    /// a failing test cannot hang the worker join.
    struct GatedGenerator {
        open: AtomicBool,
    }

    impl GatedGenerator {
        fn closed() -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(false),
            })
        }

        fn open(&self) {
            self.open.store(true, Ordering::SeqCst);
        }
    }

    impl TileGenerator for GatedGenerator {
        fn generate_tiles(&self, request: &MazeRequest) -> Result<TileGrid, GenerationError> {
            for _ in 0..5_000 {
                if self.open.load(Ordering::SeqCst) {
                    break;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            MazeGenerator::new().generate_tiles(request)
        }
    }

    fn gated_world(gate: &Arc<GatedGenerator>) -> ChunkManager {
        let config = WorldConfig {
            threaded_generation: true,
            ..WorldConfig::testing()
        };
        let generator = Arc::clone(gate) as Arc<dyn TileGenerator>;
        ChunkManager::with_generator(game(config), generator).unwrap()
    }

    #[test]
    fn test_generating_chunk_is_not_yet_available() {
        let gate = GatedGenerator::closed();
        let mut world = gated_world(&gate);
        let origin = ChunkCoord::new(0, 0);

        let report = world.update(TilePos::new(0, 0));
        assert_eq!(report.generated, 0);
        assert_eq!(world.stats().in_flight, WORKER_PIPELINE_DEPTH);
        assert_eq!(world.chunk_state(origin), ChunkState::Generating);
        assert_eq!(world.chunk_state(ChunkCoord::new(2, 0)), ChunkState::Queued);
        assert!(world.chunk(origin).is_none());
        assert!(world.tile_at(TilePos::new(5, 5)).is_none());
        assert!(world.spawns(origin).is_none());
        assert!(!world.is_loaded(origin));
        assert!(world.find_path(TilePos::new(1, 1), TilePos::new(3, 1)).is_empty());

        gate.open();
        world.flush_generation_queue();
        assert_eq!(world.chunk_state(origin), ChunkState::Loaded);
        assert!(world.tile_at(TilePos::new(5, 5)).is_some());
        assert_eq!(world.stats().in_flight, 0);
    }

    #[test]
    fn test_job_finishing_out_of_range_is_loaded_then_evicted() {
        let gate = GatedGenerator::closed();
        let mut world = gated_world(&gate);
        let origin = ChunkCoord::new(0, 0);

        world.update(TilePos::new(0, 0));
        assert_eq!(world.chunk_state(origin), ChunkState::Generating);

        // Walk away while the origin is still on the worker.
        world.update(TilePos::new(20 * 128, 0));
        gate.open();
        world.flush_generation_queue();

        let events = world.drain_events();
        let loaded_at = events.iter().position(
            |e| matches!(e, WorldEvent::ChunkLoaded { chunk, first_visit: true, .. } if chunk.coord == origin),
        );
        let unloaded_at = events
            .iter()
            .position(|e| matches!(e, WorldEvent::ChunkUnloaded { chunk } if chunk.coord == origin));
        assert!(loaded_at.is_some(), "in-flight job must still complete");
        assert!(loaded_at < unloaded_at, "completed out of range, evicted right after");
        assert!(!world.is_loaded(origin));

        // Counted once: the four stranded jobs plus the new active area.
        let stats = world.stats();
        assert_eq!(stats.generated_this_session, WORKER_PIPELINE_DEPTH as u64 + 13);
        assert!((stats.corruption - stats.generated_this_session as f32 * 0.05).abs() < 1e-4);

        // Coming back rebuilds without counting again.
        world.update(TilePos::new(0, 0));
        world.flush_generation_queue();
        let stats = world.stats();
        assert!(stats.regenerated_this_session >= 1);
        assert!((stats.corruption - stats.generated_this_session as f32 * 0.05).abs() < 1e-4);
        let revisit = world.drain_events().into_iter().find_map(|e| match e {
            WorldEvent::ChunkLoaded { chunk, first_visit, .. } if chunk.coord == origin => Some(first_visit),
            _ => None,
        });
        assert_eq!(revisit, Some(false));
    }

    #[test]
    fn test_cache_pressure_evicts_down_to_target_outside_active_area() {
        let config = WorldConfig {
            active_radius: 1,
            generation_radius: 2,
            unload_radius: 30,
            max_loaded_chunks: 20,
            hysteresis_ratio: 0.5,
            max_generations_per_tick: Some(1),
            ..WorldConfig::testing()
        };
        let target = config.eviction_target();
        assert_eq!(target, 10);
        let mut world = ChunkManager::new(game(config)).unwrap();
        let mut pressure_ticks = 0;

        for step in 0..12 {
            let pos = TilePos::new(step * 128, 0);
            let center = pos.chunk();
            for _ in 0..6 {
                let active: Vec<ChunkCoord> = world
                    .loaded_coords()
                    .into_iter()
                    .filter(|c| c.distance_squared(center) <= 1)
                    .collect();
                let unloaded_before = world.stats().unloaded_this_session;

                world.update(pos);

                assert!(world.loaded_chunk_count() <= 20);
                for coord in active {
                    assert!(world.is_loaded(coord), "active chunk {coord:?} evicted");
                }
                if world.stats().unloaded_this_session > unloaded_before {
                    pressure_ticks += 1;
                    // Evicted to one below the target, then the new chunk went in.
                    assert_eq!(world.loaded_chunk_count(), target);
                }
            }
        }
        assert!(pressure_ticks > 0, "walk never hit the cache cap");
    }

    #[test]
    fn test_modifications_survive_eviction() {
        let mut world = manager();
        world.ensure_loaded_around(TilePos::new(0, 0), 2);
        let wall = (1..127)
            .map(|x| TilePos::new(x, 2))
            .find(|&p| world.tile_at(p) == Some(Tile::Wall))
            .unwrap();
        assert!(world.modify_tile(wall, Tile::Floor));
        let consumed = world.spawns(ChunkCoord::new(0, 0)).unwrap().first().map(|s| s.id);
        if let Some(id) = consumed {
            assert!(world.consume_spawn(id));
            assert!(!world.consume_spawn(id));
        }
        assert!(world.chunk(ChunkCoord::new(0, 0)).unwrap().modified);

        world.update(TilePos::new(30 * 128, 0));
        world.update(TilePos::new(0, 0));
        world.flush_generation_queue();

        assert_eq!(world.tile_at(wall), Some(Tile::Floor));
        if let Some(id) = consumed {
            assert!(world.spawns(id.chunk).unwrap().iter().all(|s| s.id != id));
        }
        assert_eq!(world.export_modifications().len(), 1);
    }

    #[test]
    fn test_enter_level_and_new_run() {
        let mut world = manager();
        world.ensure_loaded_around(TilePos::new(0, 0), 1);
        let lobby_corruption = world.corruption().get(LevelId(0));
        assert!(lobby_corruption > 0.0);

        assert!(matches!(world.enter_level(LevelId(9)), Err(WorldError::UnknownLevel(LevelId(9)))));
        world.enter_level(LevelId(1)).unwrap();
        assert_eq!(world.loaded_chunk_count(), 0);
        world.ensure_loaded_around(TilePos::new(0, 0), 1);
        assert!((world.corruption().get(LevelId(1)) - 2.5).abs() < 1e-4);
        assert!((world.corruption().get(LevelId(0)) - lobby_corruption).abs() < f32::EPSILON);

        world.new_run(7);
        assert_eq!(world.active_level(), LevelId(0));
        assert_eq!(world.corruption().get(LevelId(0)), 0.0);
        assert_eq!(world.corruption().get(LevelId(1)), 0.0);
        assert!(world.island_graph().is_none());
        assert_eq!(world.loaded_chunk_count(), 0);
    }

    #[test]
    fn test_observer_at_world_edge() {
        let mut world = manager();
        let edge = TilePos::new(i32::MAX - 3, i32::MIN + 3);
        world.update(edge);
        world.flush_generation_queue();
        assert_eq!(world.loaded_chunk_count(), 13);
        assert!(world.tile_at(edge).is_some());
        assert!(world.tile_at(edge.offset(-200, 200)).is_some());
    }

    #[test]
    fn test_cache_overflow_is_refused() {
        let config = WorldConfig {
            max_loaded_chunks: 4,
            ..WorldConfig::testing()
        };
        let levels = LevelRegistry::from_levels(vec![LevelConfig::new(LevelId(0), "L")]).unwrap();
        let result = ChunkManager::new(GameConfig {
            world: config,
            levels,
        });
        assert!(matches!(result, Err(WorldError::CacheOverflow { required: 5, max: 4 })));
    }
}
