//! Frame loop: scene snapshot, synthesis, noise, extraction and tracking.

use std::sync::Arc;

use common::CancelToken;
use serde::{Deserialize, Serialize};

use crate::error::{ConstructionError, NumericIssue, TrackingError};
use crate::extract::{extract_with, ExtractorConfig, Feature};
use crate::field::{synthesize_with, ScalarField, Superposition};
use crate::noise::{self, NoiseSpec};
use crate::scene::Scene;
use crate::track::umbrella::{ClusterFrame, UmbrellaTracker};
use crate::track::{FeatureTracker, StepReport, TrackSet, TrackerConfig};

/// Progress of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineProgress {
    /// Frames completed so far (1-based once the first frame is done).
    pub current: usize,
    pub total: usize,
    /// Scene frame that was just processed.
    pub frame: usize,
}

/// Callback type for progress reporting.
pub type ProgressCallback = Option<Arc<dyn Fn(PipelineProgress) + Send + Sync>>;

fn report_progress(callback: &ProgressCallback, current: usize, total: usize, frame: usize) {
    if let Some(f) = callback.as_ref() {
        f(PipelineProgress {
            current,
            total,
            frame,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of frames to process.
    pub frames: usize,
    pub superposition: Superposition,
    /// Noise model; the seed is offset by the frame index so every frame
    /// gets an independent but reproducible realisation.
    pub noise: Option<NoiseSpec>,
    pub extractor: ExtractorConfig,
    pub tracker: TrackerConfig,
    /// Keep the clean and noisy field of every frame in the output.
    pub keep_fields: bool,
    /// Record source-level umbrella clusters alongside feature tracking.
    pub umbrella: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames: 30,
            superposition: Superposition::default(),
            noise: None,
            extractor: ExtractorConfig::default(),
            tracker: TrackerConfig::default(),
            keep_fields: true,
            umbrella: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConstructionError> {
        if self.frames == 0 {
            return Err(ConstructionError::OutOfRange {
                context: "PipelineConfig",
                parameter: "frames",
                value: 0.0,
                min: 1.0,
                max: f64::INFINITY,
            });
        }
        self.extractor.validate()?;
        self.tracker.validate()
    }
}

/// Everything produced for one frame.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub frame: usize,
    pub clean: Option<ScalarField>,
    pub noisy: Option<ScalarField>,
    pub features: Vec<Feature>,
    pub report: StepReport,
    pub issues: Vec<NumericIssue>,
    /// Umbrella clusters of the scene sources. Filled by [`Pipeline::run`]
    /// when enabled, since it needs the previous frame's clusters.
    pub clusters: Option<ClusterFrame>,
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub frames: Vec<FrameOutput>,
    pub tracks: TrackSet,
    /// The run stopped early on a cancel request; `frames` and `tracks`
    /// hold everything committed before that.
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    tracker: FeatureTracker,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConstructionError> {
        config.validate()?;
        let tracker = FeatureTracker::new(config.tracker)?;
        Ok(Self { config, tracker })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process the configured number of frames starting at the scene's
    /// current placement. The scene is advanced after every frame.
    ///
    /// Cancellation is checked before each frame.
    pub fn run(
        &self,
        scene: &mut Scene,
        progress: &ProgressCallback,
        cancel: &CancelToken,
    ) -> Result<PipelineRun, TrackingError> {
        let total = self.config.frames;
        let mut tracks = TrackSet::new();
        let mut frames = Vec::with_capacity(total);
        let mut cancelled = false;
        let mut umbrella = UmbrellaTracker::new();

        tracing::info!(
            frames = total,
            sources = scene.sources().len(),
            start_frame = scene.frame(),
            "pipeline run started"
        );

        for i in 0..total {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let mut output = self.process_frame(scene, &mut tracks)?;
            if self.config.umbrella {
                output.clusters = Some(umbrella.observe_scene(scene));
            }
            report_progress(progress, i + 1, total, output.frame);
            frames.push(output);
            scene.advance();
        }

        tracing::info!(
            processed = frames.len(),
            tracks = tracks.len(),
            events = tracks.events().len(),
            cancelled,
            "pipeline run finished"
        );

        Ok(PipelineRun {
            frames,
            tracks,
            cancelled,
        })
    }

    /// Run one frame for the scene's current placement without advancing it.
    pub fn process_frame(
        &self,
        scene: &Scene,
        tracks: &mut TrackSet,
    ) -> Result<FrameOutput, TrackingError> {
        let frame = scene.frame();
        let sources = scene.snapshot();
        let synthesis = synthesize_with(scene.grid(), &sources, self.config.superposition);
        let clean = synthesis.field;

        let noisy = match &self.config.noise {
            Some(spec) => {
                let spec = spec.with_seed(spec.seed().wrapping_add(frame as u64));
                Some(noise::apply(&clean, &spec))
            }
            None => None,
        };
        let observed = noisy.as_ref().unwrap_or(&clean);

        let features = extract_with(observed, &self.config.extractor, frame);
        let report = self.tracker.step(tracks, &features, frame)?;

        let (clean, noisy) = if self.config.keep_fields {
            let noisy = noisy.unwrap_or_else(|| clean.clone());
            (Some(clean), Some(noisy))
        } else {
            (None, None)
        };

        Ok(FrameOutput {
            frame,
            clean,
            noisy,
            features,
            report,
            issues: synthesis.issues,
            clusters: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use glam::DVec2;

    use super::*;
    use crate::distribution::SourceSpec;
    use crate::grid::Grid;
    use crate::noise::NoiseKind;
    use crate::scene::{Motion, VectorFieldPattern};
    use crate::track::umbrella::ClusterEvent;
    use crate::track::TrackStatus;

    fn drifting_scene() -> Scene {
        let grid = Grid::from_spacing(41, 41, 1.0).unwrap();
        let mut scene = Scene::new(grid);
        let source = SourceSpec::gaussian(DVec2::new(10.0, 20.0), 1.0, 4.0).unwrap();
        scene
            .add(
                source,
                Motion::Path {
                    waypoints: vec![DVec2::new(30.0, 20.0)],
                    speed: 0.5,
                    end: Default::default(),
                },
            )
            .unwrap();
        scene
    }

    #[test]
    fn single_source_gives_one_track() {
        let pipeline = Pipeline::new(PipelineConfig {
            frames: 20,
            ..Default::default()
        })
        .unwrap();
        let mut scene = drifting_scene();
        let run = pipeline
            .run(&mut scene, &None, &CancelToken::new())
            .unwrap();

        assert!(!run.cancelled);
        assert_eq!(run.frames.len(), 20);
        assert_eq!(scene.frame(), 20);
        assert_eq!(run.tracks.len(), 1);
        let track = &run.tracks.tracks()[0];
        assert_eq!(track.status(), TrackStatus::Active);
        assert_eq!(track.features().len(), 20);
        assert!((track.last().position.x - 19.5).abs() < 0.05);
    }

    #[test]
    fn progress_reports_every_frame() {
        let pipeline = Pipeline::new(PipelineConfig {
            frames: 5,
            keep_fields: false,
            ..Default::default()
        })
        .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let progress: ProgressCallback = Some(Arc::new(move |p: PipelineProgress| {
            assert_eq!(p.total, 5);
            assert_eq!(p.frame + 1, p.current);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let run = pipeline
            .run(&mut drifting_scene(), &progress, &CancelToken::new())
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(run.frames.iter().all(|f| f.clean.is_none() && f.noisy.is_none()));
    }

    #[test]
    fn cancel_keeps_completed_frames() {
        let pipeline = Pipeline::new(PipelineConfig {
            frames: 10,
            ..Default::default()
        })
        .unwrap();
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let progress: ProgressCallback = Some(Arc::new(move |p: PipelineProgress| {
            if p.current == 3 {
                trigger.cancel();
            }
        }));

        let mut scene = drifting_scene();
        let run = pipeline.run(&mut scene, &progress, &cancel).unwrap();
        assert!(run.cancelled);
        assert_eq!(run.frames.len(), 3);
        assert_eq!(run.tracks.last_frame(), Some(2));
        assert_eq!(run.tracks.tracks()[0].features().len(), 3);
        assert_eq!(scene.frame(), 3);
    }

    #[test]
    fn noisy_runs_are_reproducible() {
        let noise = NoiseSpec::new(NoiseKind::Gaussian { std_dev: 0.01 }, 9).unwrap();
        let pipeline = Pipeline::new(PipelineConfig {
            frames: 6,
            noise: Some(noise),
            extractor: ExtractorConfig::with_threshold(0.5),
            ..Default::default()
        })
        .unwrap();

        let a = pipeline
            .run(&mut drifting_scene(), &None, &CancelToken::new())
            .unwrap();
        let b = pipeline
            .run(&mut drifting_scene(), &None, &CancelToken::new())
            .unwrap();
        assert_eq!(a.tracks, b.tracks);

        let first = a.frames[0].noisy.as_ref().unwrap();
        let second = a.frames[1].noisy.as_ref().unwrap();
        let clean_first = a.frames[0].clean.as_ref().unwrap();
        assert!(first.max_abs_difference(clean_first) > 0.0);
        assert_ne!(
            first.max_abs_difference(clean_first),
            second.max_abs_difference(a.frames[1].clean.as_ref().unwrap())
        );
    }

    #[test]
    fn process_frame_leaves_scene_in_place() {
        let grid = Grid::from_spacing(21, 21, 1.0).unwrap();
        let mut scene = Scene::new(grid);
        scene
            .add(
                SourceSpec::gaussian(DVec2::new(14.0, 10.0), 1.0, 2.0).unwrap(),
                Motion::VectorField {
                    pattern: VectorFieldPattern::Circular,
                    speed: 1.0,
                },
            )
            .unwrap();
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut tracks = TrackSet::new();
        let out = pipeline.process_frame(&scene, &mut tracks).unwrap();
        assert_eq!(out.frame, 0);
        assert_eq!(out.features.len(), 1);
        assert_eq!(scene.frame(), 0);
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn umbrella_record_follows_the_scene() {
        let grid = Grid::from_spacing(41, 41, 1.0).unwrap();
        let mut scene = Scene::new(grid);
        scene
            .add(
                SourceSpec::gaussian(DVec2::new(20.0, 20.0), 4.0, 9.0).unwrap(),
                Motion::Static,
            )
            .unwrap();
        scene
            .add(
                SourceSpec::gaussian(DVec2::new(32.0, 20.0), 1.0, 4.0).unwrap(),
                Motion::Path {
                    waypoints: vec![DVec2::new(21.0, 20.0)],
                    speed: 1.0,
                    end: Default::default(),
                },
            )
            .unwrap();

        let pipeline = Pipeline::new(PipelineConfig {
            frames: 12,
            keep_fields: false,
            ..Default::default()
        })
        .unwrap();
        let run = pipeline
            .run(&mut scene, &None, &CancelToken::new())
            .unwrap();

        let records: Vec<&ClusterFrame> =
            run.frames.iter().filter_map(|f| f.clusters.as_ref()).collect();
        assert_eq!(records.len(), 12);
        assert_eq!(records[0].clusters.len(), 2);
        assert_eq!(records[11].clusters.len(), 1);
        let merges: Vec<&ClusterEvent> = records
            .iter()
            .flat_map(|r| &r.events)
            .filter(|e| matches!(e, ClusterEvent::Merge { .. }))
            .collect();
        assert_eq!(merges.len(), 1);

        let disabled = Pipeline::new(PipelineConfig {
            frames: 2,
            umbrella: false,
            ..Default::default()
        })
        .unwrap()
        .run(&mut drifting_scene(), &None, &CancelToken::new())
        .unwrap();
        assert!(disabled.frames.iter().all(|f| f.clusters.is_none()));
    }

    #[test]
    fn zero_frames_is_rejected() {
        let err = Pipeline::new(PipelineConfig {
            frames: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConstructionError::OutOfRange { .. }));
    }
}
