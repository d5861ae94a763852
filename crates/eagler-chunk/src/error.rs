//! Error types for section builds and layer uploads.
//!
//! Neither kind is fatal: the scheduler logs them and abandons the task.

use crate::layer::RenderLayer;
use crate::position::SectionPos;

/// Errors produced while building a section mesh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The section's own block data is not loaded.
    #[error("section {0} is not loaded")]
    SectionUnloaded(SectionPos),

    /// A face neighbor needed for culling is not loaded.
    #[error("neighbor {neighbor} of section {section} is not loaded")]
    NeighborUnloaded {
        /// Section being built.
        section: SectionPos,
        /// Missing neighbor.
        neighbor: SectionPos,
    },

    /// The task was cancelled before it ran.
    #[error("build of section {0} was cancelled")]
    Cancelled(SectionPos),
}

/// Errors produced while uploading layer geometry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// The upload would exceed the buffer store's byte budget.
    #[error("{layer} upload for {section} needs {requested} bytes, {available} available")]
    OverBudget {
        /// Target section.
        section: SectionPos,
        /// Target layer.
        layer: RenderLayer,
        /// Bytes the allocation would need.
        requested: u64,
        /// Bytes left under the budget.
        available: u64,
    },

    /// The store was released and accepts no more uploads.
    #[error("buffer store has been released")]
    Released,
}
