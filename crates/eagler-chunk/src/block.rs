//! Block storage: per-section block arrays and the concurrent section store
//! that mesh builds read from.

use std::sync::Arc;

use dashmap::DashMap;
use glam::IVec3;

use crate::layer::RenderLayer;
use crate::position::{SECTION_SIZE, SectionPos};

/// Number of blocks in one section.
pub const SECTION_VOLUME: usize = (SECTION_SIZE * SECTION_SIZE * SECTION_SIZE) as usize;

/// A single block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Block {
    /// Empty space.
    #[default]
    Air,
    /// An opaque block with the given material index.
    Solid(u16),
    /// A see-through block rendered in the translucent layer.
    Glass,
    /// Water, rendered in the water mask layer.
    Water,
}

impl Block {
    /// Returns `true` for [`Block::Air`].
    pub fn is_air(self) -> bool {
        matches!(self, Self::Air)
    }

    /// Returns `true` if faces behind this block can be seen through it.
    pub fn is_transparent(self) -> bool {
        !matches!(self, Self::Solid(_))
    }

    /// The layer this block's faces are emitted into, or `None` for air.
    pub fn layer(self) -> Option<RenderLayer> {
        match self {
            Self::Air => None,
            Self::Solid(_) => Some(RenderLayer::Opaque),
            Self::Glass => Some(RenderLayer::Translucent),
            Self::Water => Some(RenderLayer::WaterMask),
        }
    }

    /// Material index written into vertices.
    pub fn material(self) -> u16 {
        match self {
            Self::Air => 0,
            Self::Solid(material) => material,
            Self::Glass => u16::MAX - 1,
            Self::Water => u16::MAX,
        }
    }
}

/// Block data for one section, indexed `x + z * 16 + y * 256`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionBlocks {
    blocks: Vec<Block>,
}

impl SectionBlocks {
    /// Creates a section filled with `fill`.
    pub fn filled(fill: Block) -> Self {
        Self {
            blocks: vec![fill; SECTION_VOLUME],
        }
    }

    /// Creates an all-air section.
    pub fn empty() -> Self {
        Self::filled(Block::Air)
    }

    fn index(x: usize, y: usize, z: usize) -> usize {
        let size = SECTION_SIZE as usize;
        x + z * size + y * size * size
    }

    /// Block at section-local coordinates. Panics if out of range.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Block {
        self.blocks[Self::index(x, y, z)]
    }

    /// Sets the block at section-local coordinates. Panics if out of range.
    pub fn set(&mut self, x: usize, y: usize, z: usize, block: Block) {
        self.blocks[Self::index(x, y, z)] = block;
    }

    /// Returns `true` if every block is air.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_air())
    }

    /// Number of non-air blocks.
    pub fn non_air_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.is_air()).count()
    }
}

impl Default for SectionBlocks {
    fn default() -> Self {
        Self::empty()
    }
}

/// Loaded section data keyed by [`SectionPos`].
///
/// The world is bounded vertically: section Y coordinates outside
/// `min_y..=max_y` never hold data and read as air. Inside the bounds, a
/// section is either loaded or still unavailable.
#[derive(Debug)]
pub struct SectionStore {
    sections: DashMap<SectionPos, Arc<SectionBlocks>>,
    min_y: i32,
    max_y: i32,
}

impl SectionStore {
    /// Creates an empty store covering section Y coordinates `min_y..=max_y`.
    pub fn new(min_y: i32, max_y: i32) -> Self {
        Self {
            sections: DashMap::new(),
            min_y: min_y.min(max_y),
            max_y: max_y.max(min_y),
        }
    }

    /// Whether `pos` lies inside the vertical bounds of the world.
    pub fn in_bounds(&self, pos: SectionPos) -> bool {
        (self.min_y..=self.max_y).contains(&pos.y)
    }

    /// Lowest section Y coordinate.
    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    /// Highest section Y coordinate.
    pub fn max_y(&self) -> i32 {
        self.max_y
    }

    /// Stores section data, replacing any previous data at `pos`.
    ///
    /// Data outside the vertical bounds is discarded and `false` is returned.
    pub fn insert(&self, pos: SectionPos, blocks: SectionBlocks) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        self.sections.insert(pos, Arc::new(blocks));
        true
    }

    /// Removes and returns the section at `pos`.
    pub fn remove(&self, pos: SectionPos) -> Option<Arc<SectionBlocks>> {
        self.sections.remove(&pos).map(|(_, blocks)| blocks)
    }

    /// Shared handle to the section at `pos`, if loaded.
    pub fn get(&self, pos: SectionPos) -> Option<Arc<SectionBlocks>> {
        self.sections.get(&pos).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether the section at `pos` is loaded.
    pub fn contains(&self, pos: SectionPos) -> bool {
        self.sections.contains_key(&pos)
    }

    /// Whether data for `pos` can be read: loaded, or outside the bounds.
    pub fn is_available(&self, pos: SectionPos) -> bool {
        !self.in_bounds(pos) || self.contains(pos)
    }

    /// Block at a world block coordinate, or `None` if its section is not loaded.
    pub fn block_at(&self, block: IVec3) -> Option<Block> {
        let pos = SectionPos::from_block(block);
        if !self.in_bounds(pos) {
            return Some(Block::Air);
        }
        let local = block - pos.origin();
        self.get(pos)
            .map(|s| s.get(local.x as usize, local.y as usize, local.z as usize))
    }

    /// Number of loaded sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether no sections are loaded.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_layers() {
        assert_eq!(Block::Air.layer(), None);
        assert_eq!(Block::Solid(3).layer(), Some(RenderLayer::Opaque));
        assert_eq!(Block::Glass.layer(), Some(RenderLayer::Translucent));
        assert_eq!(Block::Water.layer(), Some(RenderLayer::WaterMask));
        assert!(!Block::Solid(1).is_transparent());
        assert!(Block::Water.is_transparent());
    }

    #[test]
    fn test_section_get_set() {
        let mut blocks = SectionBlocks::empty();
        assert!(blocks.is_empty());
        blocks.set(15, 0, 7, Block::Solid(2));
        assert_eq!(blocks.get(15, 0, 7), Block::Solid(2));
        assert_eq!(blocks.get(7, 0, 15), Block::Air);
        assert_eq!(blocks.non_air_count(), 1);
    }

    #[test]
    fn test_store_bounds() {
        let store = SectionStore::new(0, 3);
        assert!(!store.insert(SectionPos::new(0, 4, 0), SectionBlocks::empty()));
        assert!(store.insert(SectionPos::new(0, 3, 0), SectionBlocks::empty()));
        assert_eq!(store.len(), 1);
        assert!(store.is_available(SectionPos::new(0, -1, 0)));
        assert!(!store.is_available(SectionPos::new(1, 0, 0)));
    }

    #[test]
    fn test_block_at_world_coordinates() {
        let store = SectionStore::new(-1, 1);
        let mut blocks = SectionBlocks::empty();
        blocks.set(15, 15, 15, Block::Glass);
        store.insert(SectionPos::new(-1, -1, -1), blocks);

        assert_eq!(store.block_at(IVec3::new(-1, -1, -1)), Some(Block::Glass));
        assert_eq!(store.block_at(IVec3::new(0, 0, 0)), None);
        assert_eq!(store.block_at(IVec3::new(0, 100, 0)), Some(Block::Air));
    }

    #[test]
    fn test_remove_returns_data() {
        let store = SectionStore::new(0, 0);
        store.insert(SectionPos::new(0, 0, 0), SectionBlocks::filled(Block::Water));
        let removed = store.remove(SectionPos::new(0, 0, 0)).unwrap();
        assert_eq!(removed.get(0, 0, 0), Block::Water);
        assert!(store.is_empty());
    }
}
