//! Chunk update scheduler.
//!
//! Keeps a bounded FIFO of pending section rebuilds and works through it
//! under a soft per-frame deadline. Every operation runs on the caller's
//! thread; [`ChunkUpdateScheduler::run_batch`] is the only place where work
//! is spread over frames.
//!
//! Task lifecycle:
//!
//! ```text
//! Queued -> ready     -> built -> uploaded        (Completed)
//!                               \-> error         (Failed)
//! Queued -> not ready, age <  timeout -> Queued   (retried at the tail)
//! Queued -> not ready, age >= timeout -> Dropped  (Cancelled(Expired))
//! ```

use std::collections::VecDeque;

use glam::Vec3;

use crate::camera::CameraProvider;
use crate::clock::Clock;
use crate::layer::RenderLayer;
use crate::position::SectionPos;
use crate::region::RenderRegionCache;
use crate::stats::UpdateCounters;
use crate::task::{CancelReason, ChunkTask, CompileTask, CompletionCallback, TaskFactory, TaskOutcome};
use crate::upload::UploadSink;

/// Scheduler limits and timings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of queued tasks.
    pub queue_capacity: usize,
    /// Not-ready tasks older than this are dropped, in milliseconds.
    pub retry_timeout_ms: u64,
    /// Throughput counter window, in milliseconds.
    pub stats_window_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            retry_timeout_ms: 60_000,
            stats_window_ms: 500,
        }
    }
}

/// Bounded, deduplicated, deadline-driven section rebuild queue.
///
/// Collaborators are injected: `factory` turns positions into build tasks,
/// `sink` receives layer geometry, `camera` says where the viewer is (and
/// whether there is one), `clock` provides monotonic time.
pub struct ChunkUpdateScheduler<F, S> {
    config: SchedulerConfig,
    factory: F,
    sink: S,
    camera: Box<dyn CameraProvider>,
    clock: Box<dyn Clock>,
    region: RenderRegionCache,
    queue: VecDeque<ChunkTask>,
    counters: UpdateCounters,
}

impl<F: TaskFactory, S: UploadSink> ChunkUpdateScheduler<F, S> {
    /// Creates an empty scheduler.
    pub fn new(
        config: SchedulerConfig,
        factory: F,
        sink: S,
        camera: impl CameraProvider + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        let counters = UpdateCounters::new(config.stats_window_ms);
        Self {
            queue: VecDeque::with_capacity(config.queue_capacity),
            config,
            factory,
            sink,
            camera: Box::new(camera),
            clock: Box::new(clock),
            region: RenderRegionCache::new(),
            counters,
        }
    }

    /// Queues a rebuild of `pos`.
    ///
    /// Returns `false` only when the queue is full; the factory is not
    /// consulted then. A position that is already queued is left in place
    /// and `true` is returned, as is a position the factory has no task for.
    pub fn enqueue(&mut self, pos: SectionPos) -> bool {
        self.enqueue_inner(pos, None)
    }

    /// Like [`enqueue`](Self::enqueue), with a callback for the final outcome.
    ///
    /// If `pos` is already queued, the callback joins the existing task.
    /// Otherwise it fires exactly once: with the build outcome, or with a
    /// `Cancelled` reason when the queue is full, the factory has nothing to
    /// build, the task expires, or the queue is flushed.
    pub fn enqueue_with(
        &mut self,
        pos: SectionPos,
        callback: impl FnOnce(SectionPos, TaskOutcome) + 'static,
    ) -> bool {
        self.enqueue_inner(pos, Some(Box::new(callback)))
    }

    fn enqueue_inner(&mut self, pos: SectionPos, callback: Option<CompletionCallback>) -> bool {
        if let Some(existing) = self.queue.iter_mut().find(|t| t.position() == pos) {
            if let Some(callback) = callback {
                existing.add_callback(callback);
            }
            return true;
        }

        if self.queue.len() >= self.config.queue_capacity {
            tracing::warn!(
                %pos,
                capacity = self.config.queue_capacity,
                "Chunk update queue full, rejecting section"
            );
            if let Some(callback) = callback {
                callback(pos, TaskOutcome::Cancelled(CancelReason::QueueFull));
            }
            return false;
        }

        let Some(inner) = self.factory.create_task(pos, &mut self.region) else {
            tracing::trace!(%pos, "No build task for section");
            if let Some(callback) = callback {
                callback(pos, TaskOutcome::Cancelled(CancelReason::NoTask));
            }
            return true;
        };

        let mut task = ChunkTask::new(inner, self.clock.millis());
        if let Some(callback) = callback {
            task.add_callback(callback);
        }
        self.queue.push_back(task);
        self.counters.record_queued();
        true
    }

    /// Works through the queue until it is empty or `deadline_nanos` has
    /// passed on the scheduler's clock.
    ///
    /// The deadline is checked after each build, so at least one ready task
    /// runs per call. Not-ready tasks younger than the retry timeout go back
    /// to the tail; older ones are dropped. If there is no camera the whole
    /// queue is discarded. Returns whether any task was built.
    pub fn run_batch(&mut self, deadline_nanos: u64) -> bool {
        let Some(camera) = self.camera.camera_position() else {
            if !self.queue.is_empty() {
                tracing::info!(
                    discarded = self.queue.len(),
                    "Camera lost, discarding queued section updates"
                );
            }
            self.cancel_all(CancelReason::CameraLost);
            return false;
        };

        let now_ms = self.clock.millis();
        let mut did_work = false;
        let mut deferred = Vec::new();

        while let Some(mut task) = self.queue.pop_front() {
            if !task.is_ready() {
                let age_ms = task.age_ms(now_ms);
                if age_ms < self.config.retry_timeout_ms {
                    deferred.push(task);
                } else {
                    tracing::debug!(
                        pos = %task.position(),
                        age_ms,
                        "Dropping section update that never became ready"
                    );
                    task.cancel(CancelReason::Expired);
                }
                continue;
            }

            let outcome = self.build_and_upload(task.task_mut(), camera);
            task.finish(outcome);
            did_work = true;
            self.counters.record_completed();

            if deadline_nanos < self.clock.nanos() {
                break;
            }
        }

        if !deferred.is_empty() {
            tracing::trace!(deferred = deferred.len(), "Retrying not-ready sections later");
        }
        self.queue.extend(deferred);
        did_work
    }

    /// Builds and uploads `pos` right now, bypassing the queue and the time
    /// budget.
    ///
    /// Returns `None` when there is no camera or nothing to build there.
    pub fn run_immediate(&mut self, pos: SectionPos) -> Option<TaskOutcome> {
        let camera = self.camera.camera_position()?;
        let mut task = self.factory.create_task(pos, &mut self.region)?;
        let outcome = self.build_and_upload(task.as_mut(), camera);
        self.counters.record_immediate();
        Some(outcome)
    }

    /// Discards every queued task.
    pub fn clear(&mut self) {
        self.cancel_all(CancelReason::Cleared);
    }

    /// Discards the queue and releases the region cache and upload sink.
    pub fn shutdown(&mut self) {
        self.clear();
        self.region.release();
        self.sink.release_all();
    }

    /// Queues every cached section with transparency-dependent geometry
    /// whose center lies within `radius` of the camera, so its translucent
    /// quads get re-sorted. Returns how many positions were accepted.
    pub fn enqueue_resorts(&mut self, radius: f32) -> usize {
        let Some(camera) = self.camera.camera_position() else {
            return 0;
        };
        let radius_sq = radius * radius;
        let mut candidates: Vec<SectionPos> = self
            .region
            .resort_candidates()
            .filter(|pos| pos.distance_sq_to(camera) <= radius_sq)
            .collect();
        candidates.sort_by(|a, b| a.distance_sq_to(camera).total_cmp(&b.distance_sq_to(camera)));

        let mut accepted = 0;
        for pos in candidates {
            if self.is_full() {
                break;
            }
            if !self.is_queued(pos) && self.enqueue(pos) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Whether a task for `pos` is queued.
    pub fn is_queued(&self, pos: SectionPos) -> bool {
        self.queue.iter().any(|t| t.position() == pos)
    }

    /// Queued positions in execution order.
    pub fn queued_positions(&self) -> Vec<SectionPos> {
        self.queue.iter().map(ChunkTask::position).collect()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.config.queue_capacity
    }

    /// Free queue slots.
    pub fn remaining_capacity(&self) -> usize {
        self.config.queue_capacity.saturating_sub(self.queue.len())
    }

    /// Throughput summary, `"Uq: <completed>/<queued>"`.
    pub fn debug_info(&mut self) -> String {
        let now_ms = self.clock.millis();
        self.counters.debug_string(now_ms)
    }

    /// Scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Throughput counters.
    pub fn counters(&self) -> &UpdateCounters {
        &self.counters
    }

    /// Section handle cache.
    pub fn region(&self) -> &RenderRegionCache {
        &self.region
    }

    /// Upload sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Task factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Current reading of the scheduler's clock, in nanoseconds.
    pub fn now_nanos(&self) -> u64 {
        self.clock.nanos()
    }

    fn cancel_all(&mut self, reason: CancelReason) {
        for task in self.queue.drain(..) {
            task.cancel(reason);
        }
        self.counters.reset_queued();
    }

    fn build_and_upload(&mut self, task: &mut dyn CompileTask, camera: Vec3) -> TaskOutcome {
        let pos = task.position();
        let mut mesh = match task.execute() {
            Ok(mesh) => mesh,
            Err(err) => {
                tracing::error!(%pos, "Section build failed: {err}");
                return TaskOutcome::Failed;
            }
        };

        let has_transparency = mesh.has_transparency();
        if has_transparency {
            mesh.sort_transparency(camera, pos.origin());
        }

        // Empty layers go first so their allocations count towards the budget
        // of the layers that follow.
        for layer in RenderLayer::ALL {
            if mesh.is_layer_empty(layer) {
                self.sink.release(pos, layer);
            }
        }
        for layer in RenderLayer::ALL {
            let geometry = mesh.layer(layer);
            if geometry.is_empty() {
                continue;
            }
            if let Err(err) = self.sink.upload(pos, layer, geometry.as_bytes()) {
                tracing::error!(%pos, %layer, "Section upload failed: {err}");
                // No layer may outlive a build that was only partly applied.
                for layer in RenderLayer::ALL {
                    self.sink.release(pos, layer);
                }
                self.region.mark_clean(pos);
                return TaskOutcome::Failed;
            }
        }

        if has_transparency {
            self.region.mark_needs_resort(pos);
        } else {
            self.region.mark_clean(pos);
        }

        tracing::trace!(%pos, quads = mesh.total_quads(), "Section rebuilt");
        TaskOutcome::Completed
    }
}
