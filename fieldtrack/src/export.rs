//! Interchange formats: track observations as CSV, lifecycle events and
//! scalar fields as JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use common::Buffer2;
use serde::{Deserialize, Serialize};

use crate::error::{ConstructionError, ExportError};
use crate::field::ScalarField;
use crate::grid::{Bounds, Grid};
use crate::track::umbrella::ClusterFrame;
use crate::track::{TrackEvent, TrackSet};

/// One observation of one track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: u64,
    pub frame: usize,
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

/// Observations of every track, ordered by track id then frame.
pub fn records(tracks: &TrackSet) -> Vec<TrackRecord> {
    tracks
        .tracks()
        .iter()
        .flat_map(|track| {
            track.features().iter().map(move |f| TrackRecord {
                id: track.id().0,
                frame: f.frame,
                x: f.position.x,
                y: f.position.y,
                value: f.value,
            })
        })
        .collect()
}

pub fn write_track_csv<W: Write>(writer: W, tracks: &TrackSet) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records(tracks) {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn save_track_csv(path: &Path, tracks: &TrackSet) -> Result<(), ExportError> {
    write_track_csv(create(path)?, tracks)?;
    tracing::info!(path = %path.display(), tracks = tracks.len(), "wrote track records");
    Ok(())
}

pub fn write_events_json<W: Write>(writer: W, events: &[TrackEvent]) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, events)?;
    Ok(())
}

pub fn save_events_json(path: &Path, events: &[TrackEvent]) -> Result<(), ExportError> {
    let mut writer = create(path)?;
    write_events_json(&mut writer, events)?;
    writer.flush()?;
    tracing::info!(path = %path.display(), events = events.len(), "wrote track events");
    Ok(())
}

/// Writes the per-frame umbrella cluster record as one JSON array.
pub fn write_cluster_frames_json<W: Write>(
    writer: W,
    frames: &[ClusterFrame],
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, frames)?;
    Ok(())
}

pub fn save_cluster_frames_json(path: &Path, frames: &[ClusterFrame]) -> Result<(), ExportError> {
    let mut writer = create(path)?;
    write_cluster_frames_json(&mut writer, frames)?;
    writer.flush()?;
    tracing::info!(path = %path.display(), frames = frames.len(), "wrote umbrella clusters");
    Ok(())
}

/// Serialized form of a [`ScalarField`]: dimensions, bounds and row-major
/// values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDocument {
    pub width: usize,
    pub height: usize,
    pub bounds: Bounds,
    pub values: Vec<f64>,
}

impl FieldDocument {
    pub fn from_field(field: &ScalarField) -> Self {
        Self {
            width: field.width(),
            height: field.height(),
            bounds: field.grid().bounds(),
            values: field.values().values().to_vec(),
        }
    }

    pub fn into_field(self) -> Result<ScalarField, ConstructionError> {
        let grid = Grid::new(self.width, self.height, self.bounds)?;
        if self.values.len() != grid.len() {
            return Err(ConstructionError::OutOfRange {
                context: "FieldDocument",
                parameter: "values",
                value: self.values.len() as f64,
                min: grid.len() as f64,
                max: grid.len() as f64,
            });
        }
        let values = Buffer2::new(self.width, self.height, self.values);
        Ok(ScalarField::new(grid, values))
    }
}

pub fn write_field_json<W: Write>(writer: W, field: &ScalarField) -> Result<(), ExportError> {
    serde_json::to_writer(writer, &FieldDocument::from_field(field))?;
    Ok(())
}

pub fn save_field_json(path: &Path, field: &ScalarField) -> Result<(), ExportError> {
    let mut writer = create(path)?;
    write_field_json(&mut writer, field)?;
    writer.flush()?;
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>, ExportError> {
    let file = File::create(path).map_err(|source| ExportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufWriter::new(file))
}
