//! Moving sources: a [`Scene`] owns placed sources and their motion rules
//! and produces a fresh source list for every frame.

mod scenarios;

use std::str::FromStr;

use common::Buffer2;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::distribution::SourceSpec;
use crate::error::{require_finite, require_non_negative, ConstructionError};
use crate::grid::Grid;

pub use scenarios::{generate, straight_path, ScenarioKind, ScenarioParams};

const CONTEXT: &str = "Motion";

/// Analytic flow patterns about the grid centre.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum VectorFieldPattern {
    /// Counter-clockwise rotation.
    Circular,
    /// Flow toward the centre.
    Sink,
    /// Flow away from the centre.
    Source,
    /// Outward along x, inward along y.
    Saddle,
}

impl VectorFieldPattern {
    pub fn parse(name: &str) -> Result<Self, ConstructionError> {
        Self::from_str(name.trim()).map_err(|_| ConstructionError::UnknownKind {
            family: "vector field",
            name: name.to_string(),
        })
    }

    /// Unnormalised flow at `p` for a pattern centred on `center`.
    pub fn flow(self, p: DVec2, center: DVec2) -> DVec2 {
        let d = p - center;
        match self {
            VectorFieldPattern::Circular => DVec2::new(-d.y, d.x),
            VectorFieldPattern::Sink => -d,
            VectorFieldPattern::Source => d,
            VectorFieldPattern::Saddle => DVec2::new(d.x, -d.y),
        }
    }

    /// Unit direction of the flow at `p`, zero at the stagnation point.
    pub fn direction(self, p: DVec2, center: DVec2) -> DVec2 {
        self.flow(p, center).normalize_or_zero()
    }

    /// Sampled field for display: unit direction damped by `1 / (1 + 0.1 r)`.
    pub fn render(self, grid: &Grid) -> Buffer2<DVec2> {
        let center = grid.bounds().center();
        Buffer2::from_fn(grid.width(), grid.height(), |x, y| {
            let p = grid.position(x, y);
            let damping = 1.0 / (1.0 + 0.1 * p.distance(center));
            self.direction(p, center) * damping
        })
    }
}

/// What a path-following source does after its last waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathEnd {
    /// Restart from the first waypoint.
    Loop,
    /// Stay on the last waypoint.
    #[default]
    Stay,
    /// Disappear from the scene.
    Vanish,
}

/// How a source moves from one frame to the next. Speeds are distances per
/// frame in continuous units.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Motion {
    #[default]
    Static,
    /// Step along the pattern's unit direction at the source centre.
    VectorField {
        pattern: VectorFieldPattern,
        speed: f64,
    },
    /// Walk through waypoints, snapping to a waypoint once within one step.
    Path {
        waypoints: Vec<DVec2>,
        speed: f64,
        #[serde(default)]
        end: PathEnd,
    },
}

impl Motion {
    pub fn validate(&self) -> Result<(), ConstructionError> {
        match self {
            Motion::Static => Ok(()),
            Motion::VectorField { speed, .. } => require_non_negative(CONTEXT, "speed", *speed),
            Motion::Path {
                waypoints, speed, ..
            } => {
                require_non_negative(CONTEXT, "speed", *speed)?;
                if waypoints.is_empty() {
                    return Err(ConstructionError::OutOfRange {
                        context: CONTEXT,
                        parameter: "waypoints",
                        value: 0.0,
                        min: 1.0,
                        max: f64::INFINITY,
                    });
                }
                for p in waypoints {
                    require_finite(CONTEXT, "waypoint.x", p.x)?;
                    require_finite(CONTEXT, "waypoint.y", p.y)?;
                }
                Ok(())
            }
        }
    }
}

/// A source in a scene together with its motion state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PlacedSourceDef", into = "PlacedSourceDef")]
pub struct PlacedSource {
    source: SourceSpec,
    motion: Motion,
    next_waypoint: usize,
    visible: bool,
}

#[derive(Serialize, Deserialize)]
struct PlacedSourceDef {
    source: SourceSpec,
    motion: Motion,
    #[serde(default)]
    next_waypoint: usize,
    #[serde(default = "visible_default")]
    visible: bool,
}

fn visible_default() -> bool {
    true
}

impl TryFrom<PlacedSourceDef> for PlacedSource {
    type Error = ConstructionError;

    fn try_from(def: PlacedSourceDef) -> Result<Self, Self::Error> {
        let mut placed = PlacedSource::new(def.source, def.motion)?;
        let waypoints = match &placed.motion {
            Motion::Path { waypoints, .. } => waypoints.len(),
            _ => 1,
        };
        if def.next_waypoint >= waypoints {
            return Err(ConstructionError::OutOfRange {
                context: CONTEXT,
                parameter: "next_waypoint",
                value: def.next_waypoint as f64,
                min: 0.0,
                max: (waypoints - 1) as f64,
            });
        }
        placed.next_waypoint = def.next_waypoint;
        placed.visible = def.visible;
        Ok(placed)
    }
}

impl From<PlacedSource> for PlacedSourceDef {
    fn from(placed: PlacedSource) -> Self {
        PlacedSourceDef {
            source: placed.source,
            motion: placed.motion,
            next_waypoint: placed.next_waypoint,
            visible: placed.visible,
        }
    }
}

impl PlacedSource {
    pub fn new(source: SourceSpec, motion: Motion) -> Result<Self, ConstructionError> {
        motion.validate()?;
        Ok(Self {
            source,
            motion,
            next_waypoint: 0,
            visible: true,
        })
    }

    #[inline]
    pub fn source(&self) -> &SourceSpec {
        &self.source
    }

    #[inline]
    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Compute this source's position for the next frame.
    fn step(&mut self, grid: &Grid) {
        if !self.visible {
            return;
        }
        let bounds = grid.bounds();
        let position = self.source.center();
        let next = match &self.motion {
            Motion::Static => position,
            Motion::VectorField { pattern, speed } => {
                position + pattern.direction(position, bounds.center()) * *speed
            }
            Motion::Path {
                waypoints,
                speed,
                end,
            } => {
                let target = waypoints[self.next_waypoint.min(waypoints.len() - 1)];
                let remaining = position.distance(target);
                if remaining <= *speed {
                    self.next_waypoint += 1;
                    if self.next_waypoint >= waypoints.len() {
                        match end {
                            PathEnd::Loop => self.next_waypoint = 0,
                            PathEnd::Stay => self.next_waypoint = waypoints.len() - 1,
                            PathEnd::Vanish => self.visible = false,
                        }
                    }
                    target
                } else {
                    position + (target - position) / remaining * *speed
                }
            }
        };
        // The new centre is finite and the remaining parameters were already
        // validated, so re-centring cannot fail; keep the old one if it does.
        if let Ok(moved) = self.source.with_center(bounds.clamp(next)) {
            self.source = moved;
        }
    }
}

/// Sources on a grid plus the frame counter of their current placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    grid: Grid,
    sources: Vec<PlacedSource>,
    frame: usize,
}

impl Scene {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            sources: Vec::new(),
            frame: 0,
        }
    }

    pub fn add(&mut self, source: SourceSpec, motion: Motion) -> Result<(), ConstructionError> {
        let index = self.sources.len();
        let placed = PlacedSource::new(source, motion).map_err(|e| e.for_source(index))?;
        self.sources.push(placed);
        Ok(())
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn sources(&self) -> &[PlacedSource] {
        &self.sources
    }

    /// Frame the current placement belongs to.
    #[inline]
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Visible sources in insertion order.
    pub fn snapshot(&self) -> Vec<SourceSpec> {
        self.sources
            .iter()
            .filter(|s| s.visible)
            .map(|s| s.source)
            .collect()
    }

    /// Visible sources paired with their index in [`Scene::sources`], which
    /// stays fixed for the life of the scene.
    pub fn indexed_snapshot(&self) -> Vec<(usize, SourceSpec)> {
        self.sources
            .iter()
            .enumerate()
            .filter(|(_, s)| s.visible)
            .map(|(i, s)| (i, s.source))
            .collect()
    }

    /// Move every source one frame forward.
    pub fn advance(&mut self) {
        let grid = self.grid;
        for source in &mut self.sources {
            source.step(&grid);
        }
        self.frame += 1;
    }
}
