//! Section mesh data and the face-culling mesher.
//!
//! A [`SectionMesh`] holds one [`LayerGeometry`] per [`RenderLayer`]. Each
//! layer is a flat list of quads (four [`SectionVertex`] values per quad)
//! whose bytes are handed to the upload sink unchanged.

use std::sync::Arc;

use glam::{IVec3, Vec3};

use crate::block::{Block, SectionBlocks};
use crate::face::FaceDirection;
use crate::layer::RenderLayer;
use crate::position::SECTION_SIZE;

/// Vertices per quad.
const QUAD_VERTICES: usize = 4;

/// A single section vertex, 16 bytes, ready for GPU upload.
///
/// Layout:
///   - `[0..12]`  position `[f32; 3]` in section-local block units (0..=16)
///   - `[12]`     normal, a [`FaceDirection`] index
///   - `[13]`     padding
///   - `[14..16]` material index
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SectionVertex {
    /// Position relative to the section origin.
    pub position: [f32; 3],
    /// Face direction index.
    pub normal: u8,
    /// Reserved, set to 0.
    pub _pad: u8,
    /// Block material index.
    pub material: u16,
}

static_assertions::assert_eq_size!(SectionVertex, [u8; 16]);

impl SectionVertex {
    /// Construct a vertex.
    pub fn new(position: [f32; 3], direction: FaceDirection, material: u16) -> Self {
        Self {
            position,
            normal: direction as u8,
            _pad: 0,
            material,
        }
    }
}

/// Quads for one render layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerGeometry {
    vertices: Vec<SectionVertex>,
}

impl LayerGeometry {
    /// Creates empty geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one quad.
    pub fn push_quad(&mut self, quad: [SectionVertex; QUAD_VERTICES]) {
        self.vertices.extend_from_slice(&quad);
    }

    /// Whether this layer has no geometry.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of quads.
    pub fn quad_count(&self) -> usize {
        self.vertices.len() / QUAD_VERTICES
    }

    /// All vertices, four per quad.
    pub fn vertices(&self) -> &[SectionVertex] {
        &self.vertices
    }

    /// Raw bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Center of quad `index`.
    pub fn quad_center(&self, index: usize) -> Vec3 {
        let quad = &self.vertices[index * QUAD_VERTICES..(index + 1) * QUAD_VERTICES];
        quad_center(quad)
    }

    /// Reorders quads so the farthest from `viewer` comes first.
    ///
    /// `viewer` is in the same section-local space as the vertices.
    pub fn sort_back_to_front(&mut self, viewer: Vec3) {
        let mut quads: Vec<[SectionVertex; QUAD_VERTICES]> = self
            .vertices
            .chunks_exact(QUAD_VERTICES)
            .map(|q| [q[0], q[1], q[2], q[3]])
            .collect();
        quads.sort_by(|a, b| {
            let da = quad_center(a).distance_squared(viewer);
            let db = quad_center(b).distance_squared(viewer);
            db.total_cmp(&da)
        });
        self.vertices = quads.into_iter().flatten().collect();
    }
}

fn quad_center(quad: &[SectionVertex]) -> Vec3 {
    let sum = quad
        .iter()
        .fold(Vec3::ZERO, |acc, v| acc + Vec3::from_array(v.position));
    sum / quad.len() as f32
}

/// Built geometry for one section, split by render layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectionMesh {
    layers: [LayerGeometry; RenderLayer::COUNT],
}

impl SectionMesh {
    /// Creates a mesh with every layer empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Geometry of one layer.
    pub fn layer(&self, layer: RenderLayer) -> &LayerGeometry {
        &self.layers[layer.index()]
    }

    /// Mutable geometry of one layer.
    pub fn layer_mut(&mut self, layer: RenderLayer) -> &mut LayerGeometry {
        &mut self.layers[layer.index()]
    }

    /// Whether `layer` has no geometry.
    pub fn is_layer_empty(&self, layer: RenderLayer) -> bool {
        self.layer(layer).is_empty()
    }

    /// Whether any transparency-dependent layer has geometry.
    pub fn has_transparency(&self) -> bool {
        RenderLayer::ALL
            .iter()
            .any(|&l| l.is_transparency_dependent() && !self.is_layer_empty(l))
    }

    /// Whether every layer is empty.
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(LayerGeometry::is_empty)
    }

    /// Quads across all layers.
    pub fn total_quads(&self) -> usize {
        self.layers.iter().map(LayerGeometry::quad_count).sum()
    }

    /// Depth-sorts the transparency-dependent layers for a camera at world
    /// position `camera`, given the section's block origin.
    pub fn sort_transparency(&mut self, camera: Vec3, origin: IVec3) {
        let viewer = camera - origin.as_vec3();
        for layer in RenderLayer::ALL {
            if layer.is_transparency_dependent() {
                self.layer_mut(layer).sort_back_to_front(viewer);
            }
        }
    }
}

/// Builds the mesh of `center` given its six face neighbors.
///
/// `neighbors` follows [`FaceDirection::ALL`] order; `None` reads as air.
/// A face is emitted when the adjacent block is air or when an opaque block
/// touches a transparent one. A transparent block shows every face except
/// those shared with a block of its own kind.
pub fn build_section_mesh(
    center: &SectionBlocks,
    neighbors: &[Option<Arc<SectionBlocks>>; 6],
) -> SectionMesh {
    let mut mesh = SectionMesh::new();
    let size = SECTION_SIZE as usize;

    for y in 0..size {
        for z in 0..size {
            for x in 0..size {
                let block = center.get(x, y, z);
                let Some(layer) = block.layer() else {
                    continue;
                };

                for dir in FaceDirection::ALL {
                    let (nx, ny, nz) = dir.offset(x as i32, y as i32, z as i32);
                    let neighbor = sample(center, neighbors, nx, ny, nz);
                    if !face_visible(block, neighbor) {
                        continue;
                    }
                    let corners = dir.quad_corners(x as f32, y as f32, z as f32);
                    let quad = corners.map(|c| SectionVertex::new(c, dir, block.material()));
                    mesh.layer_mut(layer).push_quad(quad);
                }
            }
        }
    }

    mesh
}

fn face_visible(block: Block, neighbor: Block) -> bool {
    if neighbor.is_air() {
        true
    } else if block.is_transparent() {
        neighbor != block
    } else {
        neighbor.is_transparent()
    }
}

/// Reads a block at section-local coordinates that may step one block
/// outside the section along a single axis.
fn sample(
    center: &SectionBlocks,
    neighbors: &[Option<Arc<SectionBlocks>>; 6],
    x: i32,
    y: i32,
    z: i32,
) -> Block {
    let dir = if x < 0 {
        Some(FaceDirection::NegX)
    } else if x >= SECTION_SIZE {
        Some(FaceDirection::PosX)
    } else if y < 0 {
        Some(FaceDirection::NegY)
    } else if y >= SECTION_SIZE {
        Some(FaceDirection::PosY)
    } else if z < 0 {
        Some(FaceDirection::NegZ)
    } else if z >= SECTION_SIZE {
        Some(FaceDirection::PosZ)
    } else {
        None
    };

    let wrap = |v: i32| v.rem_euclid(SECTION_SIZE) as usize;
    match dir {
        None => center.get(x as usize, y as usize, z as usize),
        Some(dir) => neighbors[dir as usize]
            .as_ref()
            .map_or(Block::Air, |n| n.get(wrap(x), wrap(y), wrap(z))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_neighbors() -> [Option<Arc<SectionBlocks>>; 6] {
        Default::default()
    }

    #[test]
    fn test_empty_section_has_no_geometry() {
        let mesh = build_section_mesh(&SectionBlocks::empty(), &no_neighbors());
        assert!(mesh.is_empty());
        assert!(!mesh.has_transparency());
    }

    #[test]
    fn test_single_block_emits_six_faces() {
        let mut blocks = SectionBlocks::empty();
        blocks.set(4, 4, 4, Block::Solid(7));
        let mesh = build_section_mesh(&blocks, &no_neighbors());
        assert_eq!(mesh.layer(RenderLayer::Opaque).quad_count(), 6);
        assert!(mesh.is_layer_empty(RenderLayer::Translucent));
        assert!(mesh.vertices_have_material(7));
    }

    #[test]
    fn test_adjacent_opaque_blocks_hide_shared_face() {
        let mut blocks = SectionBlocks::empty();
        blocks.set(4, 4, 4, Block::Solid(1));
        blocks.set(5, 4, 4, Block::Solid(1));
        let mesh = build_section_mesh(&blocks, &no_neighbors());
        assert_eq!(mesh.layer(RenderLayer::Opaque).quad_count(), 10);
    }

    #[test]
    fn test_same_transparent_blocks_hide_shared_face() {
        let mut blocks = SectionBlocks::empty();
        blocks.set(4, 4, 4, Block::Water);
        blocks.set(4, 5, 4, Block::Water);
        let mesh = build_section_mesh(&blocks, &no_neighbors());
        assert_eq!(mesh.layer(RenderLayer::WaterMask).quad_count(), 10);
        assert!(mesh.has_transparency());
    }

    #[test]
    fn test_opaque_next_to_glass_shows_both_faces() {
        let mut blocks = SectionBlocks::empty();
        blocks.set(4, 4, 4, Block::Solid(1));
        blocks.set(5, 4, 4, Block::Glass);
        let mesh = build_section_mesh(&blocks, &no_neighbors());
        assert_eq!(mesh.layer(RenderLayer::Opaque).quad_count(), 6);
        assert_eq!(mesh.layer(RenderLayer::Translucent).quad_count(), 6);
    }

    #[test]
    fn test_full_section_against_full_neighbors_is_empty() {
        let full = SectionBlocks::filled(Block::Solid(1));
        let neighbors: [Option<Arc<SectionBlocks>>; 6] =
            std::array::from_fn(|_| Some(Arc::new(full.clone())));
        let mesh = build_section_mesh(&full, &neighbors);
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_full_section_against_air_emits_shell() {
        let full = SectionBlocks::filled(Block::Solid(1));
        let mesh = build_section_mesh(&full, &no_neighbors());
        assert_eq!(mesh.layer(RenderLayer::Opaque).quad_count(), 6 * 16 * 16);
    }

    #[test]
    fn test_sort_back_to_front() {
        let mut geometry = LayerGeometry::new();
        for x in [1.0_f32, 10.0, 5.0] {
            let corners = FaceDirection::PosY.quad_corners(x, 0.0, 0.0);
            geometry.push_quad(corners.map(|c| SectionVertex::new(c, FaceDirection::PosY, 0)));
        }
        geometry.sort_back_to_front(Vec3::new(0.0, 1.0, 0.5));
        let xs: Vec<f32> = (0..3).map(|i| geometry.quad_center(i).x).collect();
        assert_eq!(xs, vec![10.5, 5.5, 1.5]);
    }

    #[test]
    fn test_as_bytes_length() {
        let mut blocks = SectionBlocks::empty();
        blocks.set(0, 0, 0, Block::Glass);
        let mesh = build_section_mesh(&blocks, &no_neighbors());
        let layer = mesh.layer(RenderLayer::Translucent);
        assert_eq!(layer.as_bytes().len(), layer.quad_count() * 4 * 16);
    }

    impl SectionMesh {
        fn vertices_have_material(&self, material: u16) -> bool {
            self.layers
                .iter()
                .flat_map(|l| l.vertices())
                .all(|v| v.material == material)
        }
    }
}
