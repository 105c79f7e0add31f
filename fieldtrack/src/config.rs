//! Scenario files: a grid, the sources that move over it and the pipeline
//! settings, loaded from JSON.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::distribution::SourceSpec;
use crate::error::{ConstructionError, ExportError};
use crate::grid::Grid;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::scene::{generate, Motion, ScenarioParams, Scene};

/// A source together with its motion rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub source: SourceSpec,
    #[serde(default)]
    pub motion: Motion,
}

/// Everything needed to reproduce a run.
///
/// Sources come from an optional generated preset followed by the explicit
/// `sources` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub grid: Grid,
    #[serde(default)]
    pub scenario: Option<ScenarioParams>,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl ScenarioConfig {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            scenario: None,
            sources: Vec::new(),
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ExportError> {
        let config: ScenarioConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let file = File::open(path).map_err(|source| ExportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ScenarioConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            frames = config.pipeline.frames,
            "loaded scenario"
        );
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConstructionError> {
        self.grid.validate()?;
        for (index, entry) in self.sources.iter().enumerate() {
            entry.motion.validate().map_err(|e| e.for_source(index))?;
        }
        self.pipeline.validate()
    }

    pub fn build_scene(&self) -> Result<Scene, ConstructionError> {
        let mut scene = match &self.scenario {
            Some(params) => generate(&self.grid, params)?,
            None => Scene::new(self.grid),
        };
        for entry in &self.sources {
            scene.add(entry.source, entry.motion.clone())?;
        }
        Ok(scene)
    }

    pub fn build_pipeline(&self) -> Result<Pipeline, ConstructionError> {
        Pipeline::new(self.pipeline.clone())
    }
}
