//! Headless driver for the chunk update scheduler.
//!
//! Streams generated terrain around a camera that flies along +X, feeds the
//! dirty sections to a [`ChunkUpdateScheduler`] and runs one budgeted batch
//! per simulated frame.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI
//! flags, e.g. `eagler-sim --frames 1200 --queue-capacity 64`.

mod world;

use std::collections::VecDeque;
use std::process::ExitCode;

use clap::Parser;
use eagler_chunk::{
    ChunkUpdateScheduler, Clock, LayerBufferStore, MonotonicClock, RenderLayer, SchedulerConfig,
    SectionPos, SharedCamera, TaskOutcome, WorldTaskFactory,
};
use eagler_config::{CliArgs, Config, default_config_dir};
use glam::Vec3;
use rustc_hash::FxHashSet;
use tracing::info;

use crate::world::{MAX_SECTION_Y, MIN_SECTION_Y, StreamingWorld, TerrainGenerator};

/// Height the camera flies at, in blocks.
const CAMERA_ALTITUDE: f32 = 36.0;

type Scheduler = ChunkUpdateScheduler<WorldTaskFactory, LayerBufferStore>;

fn scheduler_config(config: &Config) -> SchedulerConfig {
    SchedulerConfig {
        queue_capacity: config.scheduler.queue_capacity,
        retry_timeout_ms: config.scheduler.retry_timeout_ms,
        stats_window_ms: config.scheduler.stats_window_ms,
    }
}

/// Sections whose mesh must be rebuilt after `loaded` arrived: the sections
/// themselves and their already loaded neighbors, restricted to those that
/// can be built now. A section skipped here is dirtied again when its last
/// missing neighbor loads.
fn dirty_sections(world: &StreamingWorld, loaded: &[SectionPos]) -> Vec<SectionPos> {
    let mut seen = FxHashSet::default();
    let mut dirty = Vec::new();
    for &pos in loaded {
        let candidates = std::iter::once(pos).chain(pos.neighbors());
        for candidate in candidates {
            if seen.insert(candidate) && world.is_buildable(candidate) {
                dirty.push(candidate);
            }
        }
    }
    dirty
}

/// Moves backlog entries into the scheduler while it has room.
fn drain_backlog(scheduler: &mut Scheduler, backlog: &mut VecDeque<SectionPos>) {
    while !scheduler.is_full() {
        let Some(pos) = backlog.pop_front() else {
            break;
        };
        if !scheduler.enqueue(pos) {
            backlog.push_front(pos);
            break;
        }
    }
}

/// Streaming world, camera and scheduler driven one frame at a time.
struct Simulation {
    config: Config,
    camera: SharedCamera,
    camera_pos: Vec3,
    last_section: Option<SectionPos>,
    world: StreamingWorld,
    scheduler: Scheduler,
    backlog: VecDeque<SectionPos>,
    immediate_failures: u32,
}

impl Simulation {
    fn new(config: &Config, clock: impl Clock + 'static) -> Self {
        let camera_pos = Vec3::new(8.0, CAMERA_ALTITUDE, 8.0);
        let camera = SharedCamera::at(camera_pos);
        let world = StreamingWorld::new(TerrainGenerator::new(
            config.world.seed,
            config.world.sea_level,
        ));
        let scheduler = ChunkUpdateScheduler::new(
            scheduler_config(config),
            WorldTaskFactory::new(world.store().clone()),
            LayerBufferStore::new(config.uploads.max_bytes),
            camera.clone(),
            clock,
        );
        Self {
            config: config.clone(),
            camera,
            camera_pos,
            last_section: None,
            world,
            scheduler,
            backlog: VecDeque::new(),
            immediate_failures: 0,
        }
    }

    /// Moves the camera, streams sections in and runs one budgeted batch.
    fn step(&mut self, frame: u32) {
        self.camera_pos.x += self.config.simulation.camera_speed;
        self.camera.set(Some(self.camera_pos));
        let camera_section = SectionPos::from_world(self.camera_pos);

        self.world
            .request_around(camera_section, self.config.world.view_distance);
        let loaded = self
            .world
            .load_next(self.config.world.sections_loaded_per_frame);

        for pos in dirty_sections(&self.world, &loaded) {
            if pos == camera_section {
                if self.scheduler.run_immediate(pos) == Some(TaskOutcome::Failed) {
                    self.immediate_failures += 1;
                }
            } else if !self.scheduler.is_queued(pos) && !self.backlog.contains(&pos) {
                self.backlog.push_back(pos);
            }
        }
        drain_backlog(&mut self.scheduler, &mut self.backlog);

        if self.last_section != Some(camera_section) {
            if self.last_section.is_some() {
                let radius = (self.config.world.view_distance as f32) * 16.0;
                let resorts = self.scheduler.enqueue_resorts(radius);
                tracing::debug!(%camera_section, resorts, "Camera entered new section");
            }
            self.last_section = Some(camera_section);
        }

        let budget_nanos = self.config.scheduler.frame_budget_us.saturating_mul(1_000);
        let deadline = self.scheduler.now_nanos().saturating_add(budget_nanos);
        self.scheduler.run_batch(deadline);

        let every = self.config.simulation.stats_every_frames;
        if every > 0 && frame % every == 0 {
            let summary = self.scheduler.debug_info();
            info!(
                frame,
                queued = self.scheduler.len(),
                backlog = self.backlog.len(),
                streaming = self.world.pending_len(),
                "{summary}"
            );
        }
    }

    /// Runs the remaining queued work without a frame budget, logs totals
    /// and shuts the scheduler down.
    fn finish(&mut self) {
        loop {
            drain_backlog(&mut self.scheduler, &mut self.backlog);
            if !self.scheduler.run_batch(u64::MAX) {
                break;
            }
        }

        let sink = self.scheduler.sink();
        info!(
            loaded_sections = self.world.store().len(),
            cached_handles = self.scheduler.region().len(),
            uploads = sink.upload_count(),
            opaque = sink.layer_buffer_count(RenderLayer::Opaque),
            translucent = sink.layer_buffer_count(RenderLayer::Translucent),
            water = sink.layer_buffer_count(RenderLayer::WaterMask),
            allocated_bytes = sink.allocated_bytes(),
            immediate_failures = self.immediate_failures,
            unbuilt = self.scheduler.len(),
            "Simulation finished"
        );

        self.scheduler.shutdown();
    }
}

fn run(config: &Config) {
    info!(
        seed = config.world.seed,
        view_distance = config.world.view_distance,
        capacity = config.scheduler.queue_capacity,
        budget_us = config.scheduler.frame_budget_us,
        sections_y = ?(MIN_SECTION_Y..=MAX_SECTION_Y),
        "Starting chunk update simulation"
    );

    let mut sim = Simulation::new(config, MonotonicClock::new());
    for frame in 0..config.simulation.frames {
        sim.step(frame);
    }
    sim.finish();
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = match args.config.clone() {
        Some(dir) => dir,
        None => match default_config_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("Failed to resolve config directory: {e}");
                return ExitCode::FAILURE;
            }
        },
    };

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    eagler_log::init_logging(Some(&log_dir), config.debug.log_to_file, Some(&config));

    run(&config);
    ExitCode::SUCCESS
}
