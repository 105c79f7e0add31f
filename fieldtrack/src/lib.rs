//! Fieldtrack - synthetic scalar fields and multi-frame peak tracking.
//!
//! This library provides:
//! - Superposition of parametric sources (Gaussian, Cauchy, ridge, plateau and
//!   more) onto a regular grid
//! - Reproducible noise injection
//! - Local-maximum feature extraction with sub-sample refinement
//! - Frame-to-frame tracking with birth, loss, merge and split handling
//! - Moving scenes, scenario presets and a frame pipeline tying it together
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fieldtrack::{extract, synthesize, Grid, SourceSpec};
//! use glam::DVec2;
//!
//! let grid = Grid::from_spacing(100, 100, 1.0)?;
//! let source = SourceSpec::gaussian(DVec2::new(50.0, 50.0), 1.0, 1.0)?;
//! let field = synthesize(&grid, &[source]).field;
//!
//! let features = extract(&field, 0.1, 0);
//! println!("Found {} features", features.len());
//! ```

pub mod config;
pub mod distribution;
pub mod error;
pub mod export;
pub mod extract;
pub mod field;
pub mod grid;
pub mod noise;
pub mod pipeline;
pub mod scene;
pub mod track;

// ============================================================================
// Core types
// ============================================================================

pub use error::{ConstructionError, ExportError, NumericCause, NumericIssue, TrackingError};
pub use grid::{Bounds, Grid};

// ============================================================================
// Synthesis
// ============================================================================

pub use distribution::{DistributionKind, Shape, SourceSpec, Spread};
pub use field::{synthesize, synthesize_with, ScalarField, Superposition, Synthesis};
pub use noise::{NoiseKind, NoiseSpec};

// ============================================================================
// Extraction and tracking
// ============================================================================

pub use extract::{extract, extract_with, Connectivity, ExtractorConfig, Feature, Refinement};
pub use track::{
    AssignmentMethod, FeatureTracker, StepReport, Track, TrackEvent, TrackId, TrackSet,
    TrackStatus, TrackerConfig,
};
pub use track::umbrella::{
    umbrella_clusters, ClusterEvent, ClusterFrame, Correspondence, UmbrellaCluster,
    UmbrellaTracker,
};

// ============================================================================
// Scenes and runs
// ============================================================================

pub use common::CancelToken;
pub use config::{ScenarioConfig, SourceEntry};
pub use pipeline::{
    FrameOutput, Pipeline, PipelineConfig, PipelineProgress, PipelineRun, ProgressCallback,
};
pub use scene::{Motion, PathEnd, PlacedSource, ScenarioKind, ScenarioParams, Scene, VectorFieldPattern};
