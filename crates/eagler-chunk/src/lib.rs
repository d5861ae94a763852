//! Section mesh update scheduling: a bounded, deduplicated work queue of
//! section rebuilds that runs under a per-frame time budget and uploads the
//! finished geometry into per-render-layer buffers.

pub mod block;
pub mod camera;
pub mod clock;
pub mod compile;
pub mod error;
pub mod face;
pub mod layer;
pub mod mesh;
pub mod position;
pub mod region;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod upload;

pub use block::{Block, SECTION_VOLUME, SectionBlocks, SectionStore};
pub use camera::{CameraProvider, SharedCamera};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use compile::{SectionCompileTask, WorldTaskFactory};
pub use error::{BuildError, UploadError};
pub use face::FaceDirection;
pub use layer::RenderLayer;
pub use mesh::{LayerGeometry, SectionMesh, SectionVertex, build_section_mesh};
pub use position::{SECTION_SIZE, SectionPos};
pub use region::{RenderRegionCache, SectionHandle};
pub use scheduler::{ChunkUpdateScheduler, SchedulerConfig};
pub use stats::UpdateCounters;
pub use task::{CancelReason, ChunkTask, CompileTask, CompletionCallback, TaskFactory, TaskOutcome};
pub use upload::{LayerBufferStore, UploadSink};
