//! Section coordinates.

use std::fmt;

use glam::{IVec3, Vec3};

use crate::face::FaceDirection;

/// Edge length of a section in blocks.
pub const SECTION_SIZE: i32 = 16;

/// `log2(SECTION_SIZE)`, used to convert block coordinates to section coordinates.
const SECTION_SHIFT: i32 = 4;

/// Identifies one 16×16×16 section of the world.
///
/// Coordinates are in section units (block coordinate `>> 4`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionPos {
    /// Section-grid X coordinate.
    pub x: i32,
    /// Section-grid Y coordinate.
    pub y: i32,
    /// Section-grid Z coordinate.
    pub z: i32,
}

impl SectionPos {
    /// Creates a new section position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The section containing the given block coordinate.
    pub fn from_block(block: IVec3) -> Self {
        Self::new(
            block.x >> SECTION_SHIFT,
            block.y >> SECTION_SHIFT,
            block.z >> SECTION_SHIFT,
        )
    }

    /// The section containing a world-space point.
    pub fn from_world(point: Vec3) -> Self {
        Self::from_block(point.floor().as_ivec3())
    }

    /// Returns the position offset by `(dx, dy, dz)` sections.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The face neighbor in the given direction.
    pub fn neighbor(self, dir: FaceDirection) -> Self {
        let (dx, dy, dz) = dir.step();
        self.offset(dx, dy, dz)
    }

    /// All six face neighbors, in [`FaceDirection::ALL`] order.
    pub fn neighbors(self) -> [Self; 6] {
        FaceDirection::ALL.map(|dir| self.neighbor(dir))
    }

    /// Block coordinate of the section's minimum corner.
    pub fn origin(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z) * SECTION_SIZE
    }

    /// World-space center of the section.
    pub fn center(self) -> Vec3 {
        self.origin().as_vec3() + Vec3::splat(SECTION_SIZE as f32 * 0.5)
    }

    /// Squared distance from the section center to `point`.
    pub fn distance_sq_to(self, point: Vec3) -> f32 {
        self.center().distance_squared(point)
    }
}

impl fmt::Display for SectionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}
