//! Error types.
//!
//! Construction errors fail fast before any work runs, numeric issues are
//! non-fatal reports returned next to their result, and tracking errors abort
//! the tracking run because frame ordering is a hard invariant.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid parameters for a source, noise model, grid or configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    #[error("Unknown {family} kind '{name}'")]
    UnknownKind { family: &'static str, name: String },

    #[error("{context}: {parameter} must be finite, got {value}")]
    NonFinite {
        context: &'static str,
        parameter: &'static str,
        value: f64,
    },

    #[error("{context}: {parameter} must be positive, got {value}")]
    NonPositive {
        context: &'static str,
        parameter: &'static str,
        value: f64,
    },

    #[error("{context}: {parameter} must be non-negative, got {value}")]
    Negative {
        context: &'static str,
        parameter: &'static str,
        value: f64,
    },

    #[error("{context}: {parameter} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        context: &'static str,
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{context}: invalid range {parameter} = ({low}, {high})")]
    InvalidRange {
        context: &'static str,
        parameter: &'static str,
        low: f64,
        high: f64,
    },

    #[error("Grid must have at least 2x2 samples, got {width}x{height}")]
    GridTooSmall { width: usize, height: usize },

    #[error("Grid bounds are degenerate: min ({min_x}, {min_y}) max ({max_x}, {max_y})")]
    DegenerateBounds {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },

    #[error("Source {index}: {source}")]
    Source {
        index: usize,
        #[source]
        source: Box<ConstructionError>,
    },
}

impl ConstructionError {
    /// Attach the position of the offending source in its list.
    pub fn for_source(self, index: usize) -> Self {
        ConstructionError::Source {
            index,
            source: Box::new(self),
        }
    }
}

pub(crate) fn require_finite(
    context: &'static str,
    parameter: &'static str,
    value: f64,
) -> Result<(), ConstructionError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConstructionError::NonFinite {
            context,
            parameter,
            value,
        })
    }
}

pub(crate) fn require_positive(
    context: &'static str,
    parameter: &'static str,
    value: f64,
) -> Result<(), ConstructionError> {
    require_finite(context, parameter, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConstructionError::NonPositive {
            context,
            parameter,
            value,
        })
    }
}

pub(crate) fn require_non_negative(
    context: &'static str,
    parameter: &'static str,
    value: f64,
) -> Result<(), ConstructionError> {
    require_finite(context, parameter, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConstructionError::Negative {
            context,
            parameter,
            value,
        })
    }
}

pub(crate) fn require_unit_interval(
    context: &'static str,
    parameter: &'static str,
    value: f64,
) -> Result<(), ConstructionError> {
    require_finite(context, parameter, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConstructionError::OutOfRange {
            context,
            parameter,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

/// Non-fatal report: a source could not be rendered during synthesis.
///
/// The source's whole contribution is dropped (treated as zero) and synthesis
/// of the remaining sources continues.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Source {source_index} ({kind}) {cause}; contribution dropped")]
pub struct NumericIssue {
    pub source_index: usize,
    pub kind: crate::distribution::DistributionKind,
    pub cause: NumericCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericCause {
    /// Singular or indefinite covariance, detected before sampling.
    DegenerateSpread,
    /// Samples that evaluated to NaN or infinity.
    NonFiniteSamples(usize),
}

impl fmt::Display for NumericCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericCause::DegenerateSpread => write!(f, "has a degenerate covariance"),
            NumericCause::NonFiniteSamples(n) => write!(f, "produced {n} non-finite samples"),
        }
    }
}

/// Violations of the sequential-consistency contract of the tracker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    #[error("Frame {frame} supplied out of sequence: expected frame {expected}")]
    OutOfSequence { frame: usize, expected: usize },

    #[error("Feature {feature_index} carries frame {feature_frame} but step is for frame {frame}")]
    FrameMismatch {
        frame: usize,
        feature_index: usize,
        feature_frame: usize,
    },

    #[error("Feature {feature_index} in frame {frame} has non-finite data")]
    NonFiniteFeature { frame: usize, feature_index: usize },

    #[error("Track {track} would receive a second observation for frame {frame}")]
    DuplicateFrame { track: u64, frame: usize },
}

/// Failures while writing or reading interchange files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write CSV records: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(#[from] ConstructionError),
}
