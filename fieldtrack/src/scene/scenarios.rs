//! Seeded scene presets that exercise the tracker: convergence and
//! divergence, crossing-free paths, sources draining into a sink, and
//! clustered starts and ends.

use std::f64::consts::TAU;

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::{Motion, PathEnd, Scene};
use crate::distribution::{DistributionKind, Shape, SourceSpec, Spread};
use crate::error::ConstructionError;
use crate::grid::{Bounds, Grid};

/// Extent the preset ranges were tuned on; variances scale with the square
/// of the grid's extent relative to it.
const REFERENCE_EXTENT: f64 = 200.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Sources meet in the centre, then fan out around a circle.
    #[strum(to_string = "merge_split", serialize = "Merge & Split")]
    MergeSplit,
    /// Left-to-right paths with vertically separated destinations.
    #[strum(to_string = "separate_paths", serialize = "Separate Paths")]
    SeparatePaths,
    /// Sources drift into the centre and disappear there.
    #[strum(to_string = "sink_and_vanish", serialize = "Sink & Vanish")]
    SinkAndVanish,
    /// Sources leave a few start clusters for a few end clusters.
    #[strum(to_string = "many_starts_many_ends", serialize = "Many Starts / Many Ends")]
    ManyStartsManyEnds,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    pub kind: ScenarioKind,
    pub count: usize,
    pub seed: u64,
    #[serde(default = "default_distribution")]
    pub distribution: DistributionKind,
    /// Distance travelled per frame, as a fraction of the smaller extent.
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_distribution() -> DistributionKind {
    DistributionKind::Gaussian
}

fn default_speed() -> f64 {
    0.01
}

impl ScenarioParams {
    pub fn new(kind: ScenarioKind, count: usize, seed: u64) -> Self {
        Self {
            kind,
            count,
            seed,
            distribution: default_distribution(),
            speed: default_speed(),
        }
    }
}

/// Build the scene for `params` on `grid`. Equal parameters give equal scenes.
pub fn generate(grid: &Grid, params: &ScenarioParams) -> Result<Scene, ConstructionError> {
    let mut builder = Builder {
        rng: ChaCha8Rng::seed_from_u64(params.seed),
        bounds: grid.bounds(),
        scene: Scene::new(*grid),
        distribution: params.distribution,
        speed: params.speed * grid.bounds().size().min_element(),
    };
    let n = params.count;

    match params.kind {
        ScenarioKind::MergeSplit => builder.merge_split(n)?,
        ScenarioKind::SeparatePaths => builder.separate_paths(n)?,
        ScenarioKind::SinkAndVanish => builder.sink_and_vanish(n)?,
        ScenarioKind::ManyStartsManyEnds => builder.many_starts_many_ends(n)?,
    }

    tracing::info!(
        scenario = %params.kind,
        sources = builder.scene.sources().len(),
        seed = params.seed,
        "generated scenario"
    );
    Ok(builder.scene)
}

/// `steps` evenly spaced points from `start` to `end`, both included.
pub fn straight_path(start: DVec2, end: DVec2, steps: usize) -> Vec<DVec2> {
    let last = steps.max(2) - 1;
    (0..=last)
        .map(|i| start.lerp(end, i as f64 / last as f64))
        .collect()
}

struct Builder {
    rng: ChaCha8Rng,
    bounds: Bounds,
    scene: Scene,
    distribution: DistributionKind,
    speed: f64,
}

impl Builder {
    /// Point at fractional coordinates drawn from the given ranges.
    fn point(&mut self, fx: (f64, f64), fy: (f64, f64)) -> DVec2 {
        let t = DVec2::new(
            self.rng.random_range(fx.0..fx.1),
            self.rng.random_range(fy.0..fy.1),
        );
        self.bounds.lerp(t)
    }

    fn add(
        &mut self,
        center: DVec2,
        amplitude: (f64, f64),
        variance: (f64, f64),
        waypoints: Vec<DVec2>,
        end: PathEnd,
    ) -> Result<(), ConstructionError> {
        let scale = (self.bounds.size().min_element() / REFERENCE_EXTENT).powi(2);
        let amplitude = self.rng.random_range(amplitude.0..amplitude.1);
        let variance = self.rng.random_range(variance.0..variance.1) * scale;
        let spread = Spread::isotropic(variance);
        let source = SourceSpec::new(
            Shape::default_for(self.distribution, &spread),
            center,
            amplitude,
            spread,
        )?;
        let motion = Motion::Path {
            waypoints,
            speed: self.speed,
            end,
        };
        self.scene.add(source, motion)
    }

    fn merge_split(&mut self, n: usize) -> Result<(), ConstructionError> {
        let merge_point = self.bounds.center();
        let radius = 0.2 * self.bounds.size().min_element();
        for i in 0..n {
            let start = self.point((0.05, 0.45), (0.1, 0.9));
            let theta = TAU * i as f64 / n.max(1) as f64;
            let split_point = merge_point + radius * DVec2::new(theta.cos(), theta.sin());

            let mut path = straight_path(start, merge_point, 5);
            path.extend(straight_path(merge_point, split_point, 5).into_iter().skip(1));
            self.add(start, (0.6, 1.8), (20.0, 150.0), path, PathEnd::Stay)?;
        }
        Ok(())
    }

    fn separate_paths(&mut self, n: usize) -> Result<(), ConstructionError> {
        let starts: Vec<DVec2> = (0..n)
            .map(|_| self.point((0.05, 0.45), (0.05, 0.95)))
            .collect();
        for (i, start) in starts.into_iter().enumerate() {
            let dest_x = self.rng.random_range(0.55..0.95);
            let dest_y = 0.05 + i as f64 * 0.9 / n.max(1) as f64;
            let dest = self.bounds.lerp(DVec2::new(dest_x, dest_y));
            let path = straight_path(start, dest, 10);
            self.add(start, (0.6, 1.8), (15.0, 140.0), path, PathEnd::Stay)?;
        }
        Ok(())
    }

    fn sink_and_vanish(&mut self, n: usize) -> Result<(), ConstructionError> {
        let sink = self.bounds.center();
        for _ in 0..n {
            let start = self.point((0.05, 0.95), (0.05, 0.95));
            let path = straight_path(start, sink, 12);
            self.add(start, (0.5, 2.0), (10.0, 160.0), path, PathEnd::Vanish)?;
        }
        Ok(())
    }

    fn many_starts_many_ends(&mut self, n: usize) -> Result<(), ConstructionError> {
        let clusters = (n / 3).max(2);
        let starts: Vec<DVec2> = (0..clusters)
            .map(|_| self.point((0.05, 0.45), (0.05, 0.95)))
            .collect();
        let ends: Vec<DVec2> = (0..clusters)
            .map(|_| self.point((0.55, 0.95), (0.05, 0.95)))
            .collect();
        let jitter = 0.05 * self.bounds.size().min_element();

        for _ in 0..n {
            let cluster = starts[self.rng.random_range(0..clusters)];
            let offset = DVec2::new(
                self.rng.random_range(-jitter..jitter),
                self.rng.random_range(-jitter..jitter),
            );
            let start = self.bounds.clamp(cluster + offset);
            let end = ends[self.rng.random_range(0..clusters)];
            let path = straight_path(start, end, 10);
            self.add(start, (0.6, 2.0), (10.0, 160.0), path, PathEnd::Stay)?;
        }
        Ok(())
    }
}
