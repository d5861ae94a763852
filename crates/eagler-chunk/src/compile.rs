//! [`CompileTask`] adapter over a [`SectionStore`].
//!
//! A section can be meshed once its own blocks and all six face neighbors
//! are available; until then the scheduler keeps retrying it.

use std::sync::Arc;

use crate::block::{SectionBlocks, SectionStore};
use crate::error::BuildError;
use crate::mesh::{SectionMesh, build_section_mesh};
use crate::position::SectionPos;
use crate::region::{RenderRegionCache, SectionHandle};
use crate::task::{CompileTask, TaskFactory};

/// Rebuilds one section from the blocks in a [`SectionStore`].
#[derive(Debug)]
pub struct SectionCompileTask {
    handle: SectionHandle,
    world: Arc<SectionStore>,
    cancelled: bool,
}

impl SectionCompileTask {
    /// Creates a task for the section behind `handle`.
    pub fn new(handle: SectionHandle, world: Arc<SectionStore>) -> Self {
        Self {
            handle,
            world,
            cancelled: false,
        }
    }
}

impl CompileTask for SectionCompileTask {
    fn position(&self) -> SectionPos {
        self.handle.pos
    }

    fn is_ready(&self) -> bool {
        let pos = self.handle.pos;
        self.world.contains(pos) && pos.neighbors().iter().all(|&n| self.world.is_available(n))
    }

    fn execute(&mut self) -> Result<SectionMesh, BuildError> {
        let pos = self.handle.pos;
        if self.cancelled {
            return Err(BuildError::Cancelled(pos));
        }

        let center = self
            .world
            .get(pos)
            .ok_or(BuildError::SectionUnloaded(pos))?;

        let mut neighbors: [Option<Arc<SectionBlocks>>; 6] = Default::default();
        for (slot, neighbor) in neighbors.iter_mut().zip(pos.neighbors()) {
            if !self.world.in_bounds(neighbor) {
                continue;
            }
            let blocks = self.world.get(neighbor).ok_or(BuildError::NeighborUnloaded {
                section: pos,
                neighbor,
            })?;
            *slot = Some(blocks);
        }

        Ok(build_section_mesh(&center, &neighbors))
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Creates [`SectionCompileTask`]s for sections inside the world's bounds.
#[derive(Debug, Clone)]
pub struct WorldTaskFactory {
    world: Arc<SectionStore>,
}

impl WorldTaskFactory {
    /// Creates a factory reading from `world`.
    pub fn new(world: Arc<SectionStore>) -> Self {
        Self { world }
    }
}

impl TaskFactory for WorldTaskFactory {
    fn create_task(
        &mut self,
        pos: SectionPos,
        region: &mut RenderRegionCache,
    ) -> Option<Box<dyn CompileTask>> {
        if !self.world.in_bounds(pos) {
            return None;
        }
        let handle = region.get(pos)?;
        Some(Box::new(SectionCompileTask::new(
            handle,
            Arc::clone(&self.world),
        )))
    }
}
