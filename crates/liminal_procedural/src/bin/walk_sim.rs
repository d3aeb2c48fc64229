//! # Walk Simulation
//!
//! Walks an observer through the level for a few thousand ticks and reports
//! streaming behaviour: tick cost, cache size, corruption, islands.
//!
//! ```text
//! cargo run --release --bin walk_sim -- [config.toml] [ticks]
//! ```

use std::process::ExitCode;
use std::time::{Duration, Instant};

use liminal_core::{Tile, TilePos};
use liminal_procedural::{ChunkManager, GameConfig, WorldEvent};

const DEFAULT_CONFIG: &str = "data/levels.toml";
const DEFAULT_TICKS: u32 = 3_000;

/// Tiles walked per tick (a sprinting player at 60 Hz, rounded up).
const SPEED: i32 = 4;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let ticks = args
        .next()
        .and_then(|t| t.parse().ok())
        .unwrap_or(DEFAULT_TICKS);

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         LIMINAL - WALK SIMULATION                                ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let config = match GameConfig::load(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let world_config = config.world.clone();
    let level_name = config
        .levels
        .get(config.start_level())
        .map_or_else(|| "?".to_string(), |l| l.name.clone());

    let mut world = match ChunkManager::new(config) {
        Ok(world) => world,
        Err(err) => {
            eprintln!("failed to start world: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Config:             {path}");
    println!("│ Seed:               {}", world_config.seed);
    println!("│ Level:              {level_name}");
    println!(
        "│ Radii:              active {} / generation {} / unload {}",
        world_config.active_radius, world_config.generation_radius, world_config.unload_radius
    );
    println!("│ Cache:              {} chunks", world_config.max_loaded_chunks);
    println!("│ Tick budget:        {} μs", world_config.frame_budget_micros);
    println!("│ Threaded:           {}", world_config.threaded_generation);
    println!("│ Ticks:              {ticks}");
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let start = Instant::now();
    world.ensure_loaded_around(TilePos::new(0, 0), world_config.active_radius);
    println!("Spawn area ready in {:.2?}", start.elapsed());

    let mut position = TilePos::new(0, 0);
    let mut slowest = Duration::ZERO;
    let mut total = Duration::ZERO;
    let mut first_visits = 0_u64;
    let mut spawns = 0_usize;

    for tick in 0..ticks {
        // Long straight legs with a turn every 400 ticks.
        let (dx, dy) = match (tick / 400) % 4 {
            0 => (SPEED, 0),
            1 => (0, SPEED),
            2 => (SPEED, 0),
            _ => (0, -SPEED),
        };
        position = position.offset(dx, dy);

        let tick_start = Instant::now();
        world.update(position);
        let elapsed = tick_start.elapsed();
        total += elapsed;
        slowest = slowest.max(elapsed);

        for event in world.drain_events() {
            if let WorldEvent::ChunkLoaded {
                first_visit: true,
                spawns: placed,
                ..
            } = event
            {
                first_visits += 1;
                spawns += placed.len();
            }
        }
    }

    let stats = world.stats();
    let walkable_here = world.tile_at(position).is_some_and(Tile::is_walkable);

    println!();
    println!("┌─ STREAMING ─────────────────────────────────────────────────────┐");
    println!("│ Final position:     ({}, {})", position.x, position.y);
    println!("│ Loaded now:         {}", stats.loaded_chunks);
    println!("│ Peak loaded:        {}", stats.peak_loaded);
    println!("│ Queued:             {}", stats.queued_chunks);
    println!("│ First visits:       {first_visits}");
    println!("│ Generated:          {}", stats.generated_this_session);
    println!("│ Regenerated:        {}", stats.regenerated_this_session);
    println!("│ Unloaded:           {}", stats.unloaded_this_session);
    println!("│ Failed:             {}", stats.failed_generations);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();
    println!("┌─ TICK PERFORMANCE ──────────────────────────────────────────────┐");
    println!("│ Avg tick:           {:.2?}", total / ticks.max(1));
    println!("│ Slowest tick:       {slowest:.2?}");
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();
    println!("┌─ WORLD ─────────────────────────────────────────────────────────┐");
    println!("│ Islands:            {}", stats.islands);
    println!("│ Corruption:         {:.2}", stats.corruption);
    println!("│ Spawns placed:      {spawns}");
    println!("│ Standing on floor:  {walkable_here}");
    println!("└──────────────────────────────────────────────────────────────────┘");

    if stats.loaded_chunks > world_config.max_loaded_chunks {
        println!("✗ cache bound violated");
        return ExitCode::FAILURE;
    }
    println!("✓ cache bound held");
    ExitCode::SUCCESS
}
