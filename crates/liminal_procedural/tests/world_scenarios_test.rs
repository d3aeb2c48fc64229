//! # World Scenario Tests
//!
//! End-to-end behaviour of the streamed world: radii, cache bound, island
//! stability, corruption bookkeeping, persistence and long-range paths.

use std::collections::HashMap;

use liminal_core::{ChunkCoord, IslandId, LevelId, LocalPos, Tile, TilePos};
use liminal_procedural::{ChunkManager, ChunkState, GameConfig, WorldConfig, WorldEvent};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const LEVELS: &str = include_str!("../../../data/levels.toml");

fn manager(world: WorldConfig) -> ChunkManager {
    let mut config = GameConfig::from_toml_str(LEVELS).unwrap();
    config.world = world;
    ChunkManager::new(config).unwrap()
}

fn first_floor(world: &ChunkManager, coord: ChunkCoord) -> Option<TilePos> {
    (1..127)
        .flat_map(|y| (1..127).map(move |x| coord.to_world(LocalPos::new(x, y))))
        .find(|&pos| world.tile_at(pos) == Some(Tile::Floor))
}

/// Observer parked in chunk (0,0): (10,0) is never loaded, (2,0) never
/// leaves once it arrives.
#[test]
fn test_radii_around_parked_observer() {
    let mut world = manager(WorldConfig::production());
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut near_seen = false;

    for _ in 0..300 {
        let pos = TilePos::new(rng.gen_range(0..128), rng.gen_range(0..128));
        world.update(pos);

        assert_ne!(world.chunk_state(ChunkCoord::new(10, 0)), ChunkState::Loaded);
        let near = world.chunk_state(ChunkCoord::new(2, 0));
        if near_seen {
            assert_eq!(near, ChunkState::Loaded);
        }
        near_seen |= near == ChunkState::Loaded;
    }
    assert!(near_seen);
}

/// The cache bound holds under walking, running and teleporting.
#[test]
fn test_cache_bound_under_random_movement() {
    let config = WorldConfig {
        active_radius: 1,
        generation_radius: 2,
        unload_radius: 6,
        max_loaded_chunks: 20,
        hysteresis_ratio: 0.75,
        ..WorldConfig::testing()
    };
    let mut world = manager(config);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut pos = TilePos::new(0, 0);

    for tick in 0..400 {
        pos = if rng.gen_bool(0.02) {
            TilePos::new(rng.gen_range(-50_000..50_000), rng.gen_range(-50_000..50_000))
        } else {
            pos.offset(rng.gen_range(-96..=96), rng.gen_range(-96..=96))
        };
        world.update(pos);
        if tick % 10 == 0 {
            world.flush_generation_queue();
        }

        assert!(world.loaded_chunk_count() <= 20, "cache overflow at tick {tick}");
        assert!(world.is_loaded(pos.chunk()), "observer chunk missing at tick {tick}");
    }
    assert!(world.stats().peak_loaded <= 20);
}

/// Once assigned, a chunk's island never changes, loaded or not.
#[test]
fn test_islands_are_stable() {
    let mut world = manager(WorldConfig::testing());
    let mut seen: HashMap<ChunkCoord, IslandId> = HashMap::new();

    for step in 0..60 {
        let pos = TilePos::new(step * 64, (step % 7) * 90);
        world.update(pos);
        world.flush_generation_queue();

        for coord in world.loaded_coords() {
            let island = world.island_of(coord).unwrap();
            assert_eq!(world.chunk(coord).unwrap().island, island);
            let first = *seen.entry(coord).or_insert(island);
            assert_eq!(first, island, "island of {coord:?} changed");
        }
    }

    let graph = world.island_graph().unwrap();
    for island in graph.islands() {
        assert!(!island.chunks.is_empty());
        assert!(island.chunks.len() <= 16);
        for &chunk in &island.chunks {
            assert_eq!(graph.island_of(chunk), Some(island.id));
        }
    }
}

/// Corruption rises exactly once per first-time generation and stops at
/// the level cap.
#[test]
fn test_corruption_counts_first_generations_only() {
    let mut world = manager(WorldConfig::testing());
    world.ensure_loaded_around(TilePos::new(0, 0), 2);
    let generated = world.stats().generated_this_session;
    let expected = (generated as f32 * 0.05).min(10.0);
    assert!((world.corruption().get(LevelId(0)) - expected).abs() < 1e-3);

    // Leave and come back: rebuilds do not count.
    world.update(TilePos::new(40 * 128, 0));
    world.flush_generation_queue();
    let away = world.corruption().get(LevelId(0));
    world.update(TilePos::new(0, 0));
    world.flush_generation_queue();
    assert!((world.corruption().get(LevelId(0)) - away).abs() < f32::EPSILON);
    assert!(world.stats().regenerated_this_session > 0);

    // Far enough to hit the cap.
    for step in 1..30 {
        world.update(TilePos::new(step * 5 * 128, 0));
        world.flush_generation_queue();
    }
    assert!((world.corruption().get(LevelId(0)) - 10.0).abs() < f32::EPSILON);
}

/// Saved changes come back after a new run with the same seed.
#[test]
fn test_modifications_round_trip_through_a_new_run() {
    let mut world = manager(WorldConfig::testing());
    world.ensure_loaded_around(TilePos::new(0, 0), 1);

    let floor = first_floor(&world, ChunkCoord::new(0, 0)).unwrap();
    assert!(world.modify_tile(floor, Tile::Wall));
    let saved = world.export_modifications();
    assert_eq!(saved.len(), 1);

    world.new_run(42);
    assert!(world.export_modifications().is_empty());
    world.ensure_loaded_around(TilePos::new(0, 0), 1);
    assert_eq!(world.tile_at(floor), Some(Tile::Floor));

    world.new_run(42);
    world.load_modifications(saved);
    world.ensure_loaded_around(TilePos::new(0, 0), 1);
    assert_eq!(world.tile_at(floor), Some(Tile::Wall));
    assert!(world.chunk(ChunkCoord::new(0, 0)).unwrap().modified);
}

/// Threaded generation builds the same world as inline generation.
#[test]
fn test_worker_matches_inline_generation() {
    let mut inline = manager(WorldConfig::testing());
    let mut threaded = manager(WorldConfig {
        threaded_generation: true,
        ..WorldConfig::testing()
    });

    for world in [&mut inline, &mut threaded] {
        world.update(TilePos::new(0, 0));
        world.flush_generation_queue();
        world.update(TilePos::new(256, 128));
        world.flush_generation_queue();
    }

    assert_eq!(inline.loaded_coords(), threaded.loaded_coords());
    for coord in inline.loaded_coords() {
        assert_eq!(
            inline.chunk(coord).unwrap().content_hash(),
            threaded.chunk(coord).unwrap().content_hash()
        );
        assert_eq!(inline.spawns(coord), threaded.spawns(coord));
    }
    assert_eq!(inline.stats().generated_this_session, threaded.stats().generated_this_session);
}

/// Threaded mode keeps streaming through plain ticks.
#[test]
fn test_worker_streams_through_updates() {
    let mut world = manager(WorldConfig {
        threaded_generation: true,
        ..WorldConfig::testing()
    });
    let mut loaded_events = 0;
    for _ in 0..2_000 {
        world.update(TilePos::new(0, 0));
        loaded_events += world
            .drain_events()
            .iter()
            .filter(|e| matches!(e, WorldEvent::ChunkLoaded { .. }))
            .count();
        if loaded_events == 13 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    assert_eq!(loaded_events, 13);
    assert_eq!(world.stats().in_flight, 0);
}

/// Islands nobody has connected yet: no path, no error.
#[test]
fn test_path_between_unconnected_islands_is_empty() {
    let mut world = manager(WorldConfig::production());
    world.ensure_loaded_around(TilePos::new(0, 0), 1);
    world.ensure_loaded_around(TilePos::new(60 * 128, 0), 1);

    let start = first_floor(&world, ChunkCoord::new(0, 0)).unwrap();
    let goal = first_floor(&world, ChunkCoord::new(60, 0)).unwrap();
    assert_ne!(world.island_of(start.chunk()), world.island_of(goal.chunk()));
    assert!(world.find_path(start, goal).is_empty());

    // Unloaded goal.
    assert!(world.find_path(start, TilePos::new(-9_000, -9_000)).is_empty());
}

/// A path inside one chunk and across a doorway between two fully loaded
/// islands.
#[test]
fn test_paths_inside_and_across_islands() {
    let mut world = manager(WorldConfig {
        max_loaded_chunks: 200,
        max_path_expansions: 2_000_000,
        ..WorldConfig::production()
    });
    world.ensure_loaded_around(TilePos::new(0, 0), 6);

    let origin = ChunkCoord::new(0, 0);
    let start = first_floor(&world, origin).unwrap();
    let path = world.find_path(start, start.offset(0, 0));
    assert_eq!(path, vec![start]);

    let graph = world.island_graph().unwrap();
    let fully_loaded = |id: IslandId| {
        graph
            .island(id)
            .is_some_and(|island| island.chunks.iter().all(|&c| world.is_loaded(c)))
    };

    let pair = world.loaded_coords().into_iter().find_map(|a| {
        let b = a.offset(1, 0);
        let (ia, ib) = (world.island_of(a)?, world.island_of(b)?);
        (ia != ib && fully_loaded(ia) && fully_loaded(ib)).then_some((a, b))
    });
    let (a, b) = pair.expect("two neighbouring islands fully loaded");

    let start = first_floor(&world, a).unwrap();
    let goal = first_floor(&world, b).unwrap();
    let path = world.find_path(start, goal);
    assert!(!path.is_empty(), "no path from {start:?} to {goal:?}");
    assert_eq!(path.first(), Some(&start));
    assert_eq!(path.last(), Some(&goal));
    assert!(path.windows(2).all(|w| w[0].manhattan(w[1]) == 1));
    assert!(path.iter().all(|&p| world.tile_at(p).is_some_and(Tile::is_walkable)));
    assert!(path.iter().any(|&p| world.tile_at(p) == Some(Tile::Door)));
}

/// Levels keep separate corruption and islands.
#[test]
fn test_levels_are_independent() {
    let mut world = manager(WorldConfig::testing());
    world.ensure_loaded_around(TilePos::new(0, 0), 1);
    let lobby_hash = world.chunk(ChunkCoord::new(0, 0)).unwrap().content_hash();

    world.enter_level(LevelId(1)).unwrap();
    assert_eq!(world.corruption().get(LevelId(1)), 0.0);
    world.ensure_loaded_around(TilePos::new(0, 0), 1);
    let zone = world.chunk(ChunkCoord::new(0, 0)).unwrap();
    assert_eq!(zone.level, LevelId(1));
    assert_ne!(zone.content_hash(), lobby_hash);
    assert!(world.corruption().get(LevelId(1)) > 0.0);

    world.enter_level(LevelId(0)).unwrap();
    world.ensure_loaded_around(TilePos::new(0, 0), 1);
    assert_eq!(world.chunk(ChunkCoord::new(0, 0)).unwrap().content_hash(), lobby_hash);
}
