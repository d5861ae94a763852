//! Command-line argument parsing for the simulation driver.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Eagler simulation command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "eagler-sim", about = "Chunk update scheduler simulation")]
pub struct CliArgs {
    /// Maximum number of pending section rebuilds.
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Per-frame batch budget in microseconds.
    #[arg(long)]
    pub frame_budget_us: Option<u64>,

    /// Number of frames to simulate.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Terrain seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// View distance in sections.
    #[arg(long)]
    pub view_distance: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(capacity) = args.queue_capacity {
            self.scheduler.queue_capacity = capacity;
        }
        if let Some(budget) = args.frame_budget_us {
            self.scheduler.frame_budget_us = budget;
        }
        if let Some(frames) = args.frames {
            self.simulation.frames = frames;
        }
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(distance) = args.view_distance {
            self.world.view_distance = distance;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
