//! Seeded terrain that streams into a [`SectionStore`] a few sections per
//! frame, nearest to the camera first.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use eagler_chunk::{Block, SECTION_SIZE, SectionBlocks, SectionPos, SectionStore};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use rustc_hash::FxHashSet;

/// Lowest section layer of the generated world.
pub const MIN_SECTION_Y: i32 = 0;

/// Highest section layer of the generated world.
pub const MAX_SECTION_Y: i32 = 3;

const STONE: Block = Block::Solid(1);
const DIRT: Block = Block::Solid(2);

/// Deterministic block generator.
#[derive(Clone, Debug)]
pub struct TerrainGenerator {
    seed: u64,
    sea_level: i32,
}

impl TerrainGenerator {
    /// Creates a generator. Air at or below `sea_level` becomes water.
    pub fn new(seed: u64, sea_level: i32) -> Self {
        Self { seed, sea_level }
    }

    /// Ground height at block column `(x, z)`.
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        let phase = (self.seed % 1024) as f32;
        let hills = 5.0 * ((x as f32 + phase) / 19.0).sin() + 4.0 * ((z as f32 - phase) / 13.0).cos();
        let jitter = (self.column_hash(x, z) % 3) as i32;
        self.sea_level - 2 + hills as i32 + jitter
    }

    /// Generates the blocks of section `pos`.
    pub fn generate(&self, pos: SectionPos) -> SectionBlocks {
        let origin = pos.origin();
        let size = SECTION_SIZE as usize;
        let mut blocks = SectionBlocks::empty();

        for lx in 0..size {
            for lz in 0..size {
                let wx = origin.x + lx as i32;
                let wz = origin.z + lz as i32;
                let height = self.height_at(wx, wz);
                for ly in 0..size {
                    let wy = origin.y + ly as i32;
                    let block = if wy < height - 3 {
                        STONE
                    } else if wy <= height {
                        DIRT
                    } else if wy <= self.sea_level {
                        Block::Water
                    } else {
                        Block::Air
                    };
                    blocks.set(lx, ly, lz, block);
                }
            }
        }

        self.place_pillar(pos, &mut blocks);
        blocks
    }

    /// Some sections get one glass pillar standing on the ground.
    fn place_pillar(&self, pos: SectionPos, blocks: &mut SectionBlocks) {
        let mut rng = Xoshiro256StarStar::seed_from_u64(
            self.seed ^ self.column_hash(pos.x, pos.z).rotate_left(17),
        );
        if !rng.gen_bool(0.25) {
            return;
        }
        let size = SECTION_SIZE as usize;
        let lx = rng.gen_range(0..size);
        let lz = rng.gen_range(0..size);
        let pillar_height = rng.gen_range(3..7);

        let origin = pos.origin();
        let base = self.height_at(origin.x + lx as i32, origin.z + lz as i32) + 1;
        for wy in base..base + pillar_height {
            let ly = wy - origin.y;
            if (0..SECTION_SIZE).contains(&ly) {
                blocks.set(lx, ly as usize, lz, Block::Glass);
            }
        }
    }

    fn column_hash(&self, x: i32, z: i32) -> u64 {
        let mut h = self.seed ^ 0x9e37_79b9_7f4a_7c15;
        h ^= (x as u32 as u64).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        h = h.rotate_left(31);
        h ^= (z as u32 as u64).wrapping_mul(0x94d0_49bb_1331_11eb);
        h ^ (h >> 29)
    }
}

/// Streams generated sections into a shared store.
#[derive(Debug)]
pub struct StreamingWorld {
    store: Arc<SectionStore>,
    generator: TerrainGenerator,
    /// Min-heap of `(distance_squared, section)` waiting to be generated.
    pending: BinaryHeap<Reverse<(i64, SectionPos)>>,
    /// Sections already requested (pending or loaded).
    requested: FxHashSet<SectionPos>,
}

impl StreamingWorld {
    /// Creates an empty world.
    pub fn new(generator: TerrainGenerator) -> Self {
        Self {
            store: Arc::new(SectionStore::new(MIN_SECTION_Y, MAX_SECTION_Y)),
            generator,
            pending: BinaryHeap::new(),
            requested: FxHashSet::default(),
        }
    }

    /// The store sections are loaded into.
    pub fn store(&self) -> &Arc<SectionStore> {
        &self.store
    }

    /// Whether `pos` is loaded and every face neighbor is available, so a
    /// rebuild can run right away.
    pub fn is_buildable(&self, pos: SectionPos) -> bool {
        self.store.contains(pos)
            && pos
                .neighbors()
                .iter()
                .all(|&neighbor| self.store.is_available(neighbor))
    }

    /// Sections waiting to be generated.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Requests every column within `radius` sections of `center`.
    ///
    /// Returns how many sections were newly requested.
    pub fn request_around(&mut self, center: SectionPos, radius: u32) -> usize {
        let r = radius as i32;
        let mut added = 0;
        for dx in -r..=r {
            for dz in -r..=r {
                for y in MIN_SECTION_Y..=MAX_SECTION_Y {
                    let pos = SectionPos::new(center.x + dx, y, center.z + dz);
                    if !self.requested.insert(pos) {
                        continue;
                    }
                    let dy = (y - center.y) as i64;
                    let dist_sq = (dx as i64).pow(2) + dy * dy + (dz as i64).pow(2);
                    self.pending.push(Reverse((dist_sq, pos)));
                    added += 1;
                }
            }
        }
        added
    }

    /// Generates up to `budget` pending sections, nearest first, and
    /// returns their positions.
    pub fn load_next(&mut self, budget: u32) -> Vec<SectionPos> {
        let mut loaded = Vec::with_capacity(budget as usize);
        while loaded.len() < budget as usize {
            let Some(Reverse((_, pos))) = self.pending.pop() else {
                break;
            };
            if self.store.insert(pos, self.generator.generate(pos)) {
                loaded.push(pos);
            }
        }
        if !loaded.is_empty() {
            tracing::trace!(loaded = loaded.len(), pending = self.pending.len(), "Streamed sections");
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> TerrainGenerator {
        TerrainGenerator::new(7, 20)
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = generator().generate(SectionPos::new(3, 1, -2));
        let b = generator().generate(SectionPos::new(3, 1, -2));
        assert_eq!(a, b);
    }

    #[test]
    fn test_bottom_section_is_solid_at_floor() {
        let blocks = generator().generate(SectionPos::new(0, 0, 0));
        assert_eq!(blocks.get(0, 0, 0), STONE);
    }

    #[test]
    fn test_top_section_has_no_ground() {
        let blocks = generator().generate(SectionPos::new(0, MAX_SECTION_Y, 0));
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_buildable_once_horizontal_neighbors_load() {
        let mut world = StreamingWorld::new(generator());
        let center = SectionPos::new(0, 0, 0);
        world.request_around(center, 1);
        world.load_next(1);
        assert!(world.store().contains(center));
        assert!(!world.is_buildable(center));

        world.load_next(u32::MAX);
        assert!(world.is_buildable(center));
        // The ring edge is missing its outer neighbors.
        assert!(!world.is_buildable(SectionPos::new(1, 0, 0)));
    }

    #[test]
    fn test_request_deduplicates() {
        let mut world = StreamingWorld::new(generator());
        let center = SectionPos::new(0, 1, 0);
        let first = world.request_around(center, 1);
        assert_eq!(first, 9 * 4);
        assert_eq!(world.request_around(center, 1), 0);
        assert_eq!(world.request_around(SectionPos::new(1, 1, 0), 1), 3 * 4);
    }

    #[test]
    fn test_load_next_is_nearest_first_and_budgeted() {
        let mut world = StreamingWorld::new(generator());
        let center = SectionPos::new(0, 1, 0);
        world.request_around(center, 2);
        let loaded = world.load_next(1);
        assert_eq!(loaded, vec![center]);
        assert_eq!(world.load_next(5).len(), 5);
        assert!(world.store().contains(center));
        assert_eq!(world.store().len(), 6);
    }
}
