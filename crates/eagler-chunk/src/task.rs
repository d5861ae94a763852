//! The build-task boundary between the scheduler and whatever produces
//! section meshes, plus the queued [`ChunkTask`] wrapper.

use std::fmt;

use crate::error::BuildError;
use crate::mesh::SectionMesh;
use crate::position::SectionPos;
use crate::region::RenderRegionCache;

/// Why a task ended without being built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The queue was at capacity when the task was offered.
    QueueFull,
    /// The task stayed not-ready past the retry timeout.
    Expired,
    /// The camera disappeared and the queue was flushed.
    CameraLost,
    /// The queue was cleared by the host.
    Cleared,
    /// The factory had nothing to build for the position.
    NoTask,
}

/// Final state of a task, delivered to its completion callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskOutcome {
    /// Built and uploaded.
    Completed,
    /// The build or an upload failed; the section keeps its previous mesh.
    Failed,
    /// Dropped without building.
    Cancelled(CancelReason),
}

/// Callback fired exactly once when a task reaches its final state.
pub type CompletionCallback = Box<dyn FnOnce(SectionPos, TaskOutcome)>;

/// One rebuild of one section.
///
/// Implementations adapt a concrete mesh source; the scheduler only uses
/// these operations.
pub trait CompileTask {
    /// Section this task rebuilds.
    fn position(&self) -> SectionPos;

    /// Whether everything the build needs is available now.
    fn is_ready(&self) -> bool;

    /// Builds the section mesh.
    fn execute(&mut self) -> Result<SectionMesh, BuildError>;

    /// Marks the task as cancelled. Later `execute` calls fail.
    fn cancel(&mut self);

    /// Whether [`cancel`](Self::cancel) has been called.
    fn is_cancelled(&self) -> bool;
}

/// Creates build tasks for section positions.
pub trait TaskFactory {
    /// Task for `pos`, or `None` if there is nothing to build there.
    fn create_task(
        &mut self,
        pos: SectionPos,
        region: &mut RenderRegionCache,
    ) -> Option<Box<dyn CompileTask>>;
}

/// A [`CompileTask`] owned by the scheduler queue, with its enqueue time
/// and completion callbacks.
pub struct ChunkTask {
    inner: Box<dyn CompileTask>,
    enqueued_at_ms: u64,
    callbacks: Vec<CompletionCallback>,
}

impl ChunkTask {
    /// Wraps `inner`, stamped with the enqueue time.
    pub fn new(inner: Box<dyn CompileTask>, enqueued_at_ms: u64) -> Self {
        Self {
            inner,
            enqueued_at_ms,
            callbacks: Vec::new(),
        }
    }

    /// Section this task rebuilds.
    pub fn position(&self) -> SectionPos {
        self.inner.position()
    }

    /// Milliseconds since enqueue.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.enqueued_at_ms)
    }

    /// Whether the build can run now.
    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    /// Whether the underlying task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Registers a callback for the final outcome.
    pub fn add_callback(&mut self, callback: CompletionCallback) {
        self.callbacks.push(callback);
    }

    /// The wrapped build task.
    pub fn task_mut(&mut self) -> &mut dyn CompileTask {
        self.inner.as_mut()
    }

    /// Cancels the build and fires callbacks with `Cancelled(reason)`.
    pub fn cancel(mut self, reason: CancelReason) {
        self.inner.cancel();
        self.finish(TaskOutcome::Cancelled(reason));
    }

    /// Fires every callback with `outcome`, consuming the task.
    pub fn finish(self, outcome: TaskOutcome) {
        let pos = self.inner.position();
        for callback in self.callbacks {
            callback(pos, outcome);
        }
    }
}

impl fmt::Debug for ChunkTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkTask")
            .field("position", &self.position())
            .field("enqueued_at_ms", &self.enqueued_at_ms)
            .field("callbacks", &self.callbacks.len())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted tasks for scheduler tests.

    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::block::{Block, SectionBlocks};
    use crate::clock::ManualClock;
    use crate::mesh::build_section_mesh;

    /// Shared switches and logs that scripted tasks read and write.
    #[derive(Default)]
    pub struct Script {
        /// Positions that are not ready yet.
        pub not_ready: RefCell<Vec<SectionPos>>,
        /// Positions whose build fails.
        pub failing: RefCell<Vec<SectionPos>>,
        /// Block placed at the center of each built section.
        pub block: Cell<Option<Block>>,
        /// Additional blocks placed at fixed local coordinates.
        pub extra_blocks: RefCell<Vec<([usize; 3], Block)>>,
        /// Positions in the order they were executed.
        pub executed: RefCell<Vec<SectionPos>>,
        /// Positions whose task was cancelled.
        pub cancelled: RefCell<Vec<SectionPos>>,
        /// Clock advanced by the given nanoseconds on every build.
        pub build_cost: RefCell<Option<(ManualClock, u64)>>,
    }

    pub struct ScriptedTask {
        pos: SectionPos,
        script: Rc<Script>,
        cancelled: bool,
    }

    impl CompileTask for ScriptedTask {
        fn position(&self) -> SectionPos {
            self.pos
        }

        fn is_ready(&self) -> bool {
            !self.script.not_ready.borrow().contains(&self.pos)
        }

        fn execute(&mut self) -> Result<SectionMesh, BuildError> {
            if self.cancelled {
                return Err(BuildError::Cancelled(self.pos));
            }
            self.script.executed.borrow_mut().push(self.pos);
            if let Some((clock, nanos)) = self.script.build_cost.borrow().as_ref() {
                clock.advance_nanos(*nanos);
            }
            if self.script.failing.borrow().contains(&self.pos) {
                return Err(BuildError::SectionUnloaded(self.pos));
            }
            let mut blocks = SectionBlocks::empty();
            if let Some(block) = self.script.block.get() {
                blocks.set(8, 8, 8, block);
            }
            for &([x, y, z], block) in self.script.extra_blocks.borrow().iter() {
                blocks.set(x, y, z, block);
            }
            Ok(build_section_mesh(&blocks, &Default::default()))
        }

        fn cancel(&mut self) {
            self.cancelled = true;
            self.script.cancelled.borrow_mut().push(self.pos);
        }

        fn is_cancelled(&self) -> bool {
            self.cancelled
        }
    }

    /// Factory producing [`ScriptedTask`]s that share one [`Script`].
    pub struct ScriptedFactory {
        pub script: Rc<Script>,
    }

    impl ScriptedFactory {
        pub fn new() -> (Self, Rc<Script>) {
            let script = Rc::new(Script::default());
            script.block.set(Some(Block::Solid(1)));
            (
                Self {
                    script: Rc::clone(&script),
                },
                script,
            )
        }
    }

    impl TaskFactory for ScriptedFactory {
        fn create_task(
            &mut self,
            pos: SectionPos,
            region: &mut RenderRegionCache,
        ) -> Option<Box<dyn CompileTask>> {
            region.get(pos)?;
            Some(Box::new(ScriptedTask {
                pos,
                script: Rc::clone(&self.script),
                cancelled: false,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::testing::ScriptedFactory;
    use super::*;

    fn task_at(pos: SectionPos, at_ms: u64) -> ChunkTask {
        let (mut factory, _) = ScriptedFactory::new();
        let mut region = RenderRegionCache::new();
        ChunkTask::new(factory.create_task(pos, &mut region).unwrap(), at_ms)
    }

    #[test]
    fn test_age_saturates() {
        let task = task_at(SectionPos::new(0, 0, 0), 1_000);
        assert_eq!(task.age_ms(1_500), 500);
        assert_eq!(task.age_ms(10), 0);
    }

    #[test]
    fn test_every_callback_fires_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut task = task_at(SectionPos::new(1, 2, 3), 0);
        for _ in 0..2 {
            let seen = Rc::clone(&seen);
            task.add_callback(Box::new(move |pos, outcome| {
                seen.borrow_mut().push((pos, outcome));
            }));
        }
        task.finish(TaskOutcome::Completed);
        assert_eq!(
            *seen.borrow(),
            vec![(SectionPos::new(1, 2, 3), TaskOutcome::Completed); 2]
        );
    }

    #[test]
    fn test_cancel_marks_inner_task() {
        let (mut factory, script) = ScriptedFactory::new();
        let mut region = RenderRegionCache::new();
        let pos = SectionPos::new(0, 0, 0);
        let seen = Rc::new(RefCell::new(None));
        let mut task = ChunkTask::new(factory.create_task(pos, &mut region).unwrap(), 0);
        let sink = Rc::clone(&seen);
        task.add_callback(Box::new(move |_, outcome| *sink.borrow_mut() = Some(outcome)));

        task.cancel(CancelReason::QueueFull);
        assert_eq!(*script.cancelled.borrow(), vec![pos]);
        assert_eq!(
            *seen.borrow(),
            Some(TaskOutcome::Cancelled(CancelReason::QueueFull))
        );
    }

    #[test]
    fn test_factory_yields_nothing_for_released_region() {
        let (mut factory, _) = ScriptedFactory::new();
        let mut region = RenderRegionCache::new();
        region.release();
        assert!(factory.create_task(SectionPos::new(0, 0, 0), &mut region).is_none());
    }
}
