//! Example: run a tracking scenario and write its results.
//!
//! Loads a scenario file when one is given, otherwise generates the
//! merge-and-split preset. Track observations, lifecycle events and the last
//! noisy field are written to `test_output/track_scenario/`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example track_scenario
//! cargo run --example track_scenario -- path/to/scenario.json
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use common::log_setup::{setup_logging, LogConfig};
use fieldtrack::export::{
    save_cluster_frames_json, save_events_json, save_field_json, save_track_csv,
};
use fieldtrack::{
    CancelToken, Grid, NoiseKind, NoiseSpec, PipelineProgress, ProgressCallback, ScenarioConfig,
    ScenarioKind, ScenarioParams, TrackEvent, TrackStatus, TrackerConfig,
};

fn main() -> Result<()> {
    setup_logging(&LogConfig::default()).context("setting up logging")?;

    let config = match env::args().nth(1) {
        Some(path) => ScenarioConfig::load(Path::new(&path))
            .with_context(|| format!("loading scenario {path}"))?,
        None => default_scenario()?,
    };

    let mut scene = config.build_scene().context("building scene")?;
    let pipeline = config.build_pipeline().context("building pipeline")?;

    let progress: ProgressCallback = Some(Arc::new(|p: PipelineProgress| {
        if p.current % 10 == 0 || p.current == p.total {
            tracing::info!(frame = p.frame, done = p.current, total = p.total, "progress");
        }
    }));

    let start = Instant::now();
    let run = pipeline.run(&mut scene, &progress, &CancelToken::new())?;
    tracing::info!(
        frames = run.frames.len(),
        tracks = run.tracks.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "Run complete"
    );

    for event in run.tracks.events() {
        match event {
            TrackEvent::Merge {
                frame,
                survivor,
                absorbed,
                ..
            } => println!("frame {frame:>3}: {absorbed:?} merged into {survivor}"),
            TrackEvent::Split {
                frame,
                parent,
                children,
            } => println!("frame {frame:>3}: {parent} split into {children:?}"),
            _ => {}
        }
    }
    println!(
        "{} tracks, {} still live, {} terminated",
        run.tracks.len(),
        run.tracks.live().count(),
        run.tracks.with_status(TrackStatus::Terminated).count()
    );

    let out_dir = PathBuf::from("test_output/track_scenario");
    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    save_track_csv(&out_dir.join("tracks.csv"), &run.tracks)?;
    save_events_json(&out_dir.join("events.json"), run.tracks.events())?;
    let clusters: Vec<_> = run.frames.iter().filter_map(|f| f.clusters.clone()).collect();
    save_cluster_frames_json(&out_dir.join("clusters.json"), &clusters)?;
    if let Some(field) = run.frames.last().and_then(|f| f.noisy.as_ref()) {
        save_field_json(&out_dir.join("last_frame.json"), field)?;
    }
    println!("Results written to {}", out_dir.display());

    Ok(())
}

fn default_scenario() -> Result<ScenarioConfig> {
    let mut config = ScenarioConfig::new(Grid::from_spacing(201, 201, 1.0)?);
    config.scenario = Some(ScenarioParams::new(ScenarioKind::MergeSplit, 4, 42));
    config.pipeline.frames = 120;
    config.pipeline.noise = Some(NoiseSpec::new(NoiseKind::Gaussian { std_dev: 0.01 }, 42)?);
    config.pipeline.extractor.threshold = 0.2;
    config.pipeline.tracker = TrackerConfig {
        gate_distance: 6.0,
        max_missed_frames: 3,
        ..Default::default()
    };
    Ok(config)
}
