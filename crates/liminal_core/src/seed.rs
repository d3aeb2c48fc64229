//! # Seeded Hashing
//!
//! Every random decision in the world derives from one `WorldSeed`.
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed` and chunk coordinate, [`chunk_seed`] returns
//! **exactly** the same value on any platform, any time. Streams derived
//! from it (maze carving, spawn rolls, decor) are therefore reproducible,
//! which is what lets the world manager free a chunk and rebuild it later.

/// FNV-1a 64-bit offset basis.
pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stream purposes passed to [`WorldSeed::derive`].
///
/// Keeping them in one place guarantees two subsystems never share a stream.
pub mod stream {
    /// Per-level world seed.
    pub const LEVEL: u64 = 0x4c45_5645_4c00_0001;
    /// Recursive-backtracking corridor carving.
    pub const MAZE: u64 = 0x4d41_5a45_0000_0002;
    /// Room placement pass.
    pub const ROOMS: u64 = 0x524f_4f4d_0000_0003;
    /// Decorative metadata (lights, wall variants).
    pub const DECOR: u64 = 0x4445_434f_0000_0004;
    /// Entity spawn rolls.
    pub const SPAWN: u64 = 0x5350_574e_0000_0005;
    /// Island shape and tier.
    pub const ISLAND: u64 = 0x4953_4c44_0000_0006;
    /// Intra-island seam openings.
    pub const SEAM: u64 = 0x5345_414d_0000_0007;
}

/// World seed for deterministic generation.
///
/// All procedural generation derives from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives a sub-seed for a specific purpose (e.g., spawn rolls).
    ///
    /// Uses a hash function to create independent streams from one seed.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        Self(avalanche(fnv_mix(fnv_mix(FNV_OFFSET_BASIS, self.0), purpose)))
    }

    /// Returns the seed of the stream for one chunk.
    #[inline]
    #[must_use]
    pub const fn for_chunk(self, chunk_x: i32, chunk_y: i32) -> Self {
        Self(chunk_seed(chunk_x, chunk_y, self.0))
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(0x0BAC_C0DE_1E7E_1000)
    }
}

/// Deterministic per-chunk seed.
///
/// FNV-1a style word mix of `world_seed`, `chunk_x`, `chunk_y` followed by
/// an avalanche finalizer, so neighbouring coordinates share no visible
/// structure.
#[inline]
#[must_use]
pub const fn chunk_seed(chunk_x: i32, chunk_y: i32, world_seed: u64) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    hash = fnv_mix(hash, world_seed);
    hash = fnv_mix(hash, chunk_x as u32 as u64);
    hash = fnv_mix(hash, chunk_y as u32 as u64);
    avalanche(hash)
}

/// One FNV-1a round over a whole word.
#[inline]
#[must_use]
pub const fn fnv_mix(hash: u64, value: u64) -> u64 {
    (hash ^ value).wrapping_mul(FNV_PRIME)
}

/// 64-bit finalizer (splitmix64 constants).
#[inline]
#[must_use]
pub const fn avalanche(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
