//! Scalar fields and superposition of sources onto a grid.
//!
//! Each source is rendered into its own buffer (sources run in parallel,
//! rows inside a source run in parallel), then the buffers are reduced in
//! source order. The per-sample summation order is therefore fixed and the
//! output is bit-identical regardless of thread count.

#[cfg(test)]
mod tests;

use common::parallel::par_map_limited;
use common::Buffer2;
use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::distribution::{Kernel, SourceSpec};
use crate::error::{NumericCause, NumericIssue};
use crate::grid::Grid;

/// Upper bound on per-source buffers alive at once during synthesis.
const MAX_SOURCES_IN_FLIGHT: usize = 8;

/// A grid plus one real value per sample. Never mutated after creation;
/// transformations such as noise produce a new field.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    grid: Grid,
    values: Buffer2<f64>,
}

impl ScalarField {
    pub fn new(grid: Grid, values: Buffer2<f64>) -> Self {
        assert_eq!(
            (values.width(), values.height()),
            (grid.width(), grid.height()),
            "values must match grid dimensions"
        );
        Self { grid, values }
    }

    pub fn zeros(grid: Grid) -> Self {
        Self {
            grid,
            values: Buffer2::new_default(grid.width(), grid.height()),
        }
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn values(&self) -> &Buffer2<f64> {
        &self.values
    }

    #[inline]
    pub fn value(&self, x: usize, y: usize) -> f64 {
        self.values[(x, y)]
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.grid.height()
    }

    /// Smallest and largest value. `(0, 0)` for an all-NaN field.
    pub fn range(&self) -> (f64, f64) {
        let (min, max) = self
            .values
            .values()
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if min > max {
            (0.0, 0.0)
        } else {
            (min, max)
        }
    }

    /// Bilinear interpolation at a continuous position, clamped to the grid.
    pub fn sample(&self, p: DVec2) -> f64 {
        let s = self.grid.sample_coords(self.grid.bounds().clamp(p));
        let max_x = (self.width() - 1) as f64;
        let max_y = (self.height() - 1) as f64;
        let sx = s.x.clamp(0.0, max_x);
        let sy = s.y.clamp(0.0, max_y);
        let x0 = (sx.floor() as usize).min(self.width() - 2);
        let y0 = (sy.floor() as usize).min(self.height() - 2);
        let fx = sx - x0 as f64;
        let fy = sy - y0 as f64;

        let v00 = self.values[(x0, y0)];
        let v10 = self.values[(x0 + 1, y0)];
        let v01 = self.values[(x0, y0 + 1)];
        let v11 = self.values[(x0 + 1, y0 + 1)];
        v00 * (1.0 - fx) * (1.0 - fy) + v10 * fx * (1.0 - fy) + v01 * (1.0 - fx) * fy + v11 * fx * fy
    }

    /// New field with `f` applied to every sample.
    pub fn map<F>(&self, f: F) -> ScalarField
    where
        F: FnMut(&f64) -> f64,
    {
        ScalarField {
            grid: self.grid,
            values: self.values.map(f),
        }
    }

    /// Element-wise sum with a field on the same grid.
    pub fn add(&self, other: &ScalarField) -> ScalarField {
        assert_eq!(self.grid, other.grid, "fields must share a grid");
        ScalarField {
            grid: self.grid,
            values: self.values.zip_with(&other.values, |a, b| a + b),
        }
    }

    /// Largest absolute per-sample difference. Infinite if grids differ.
    pub fn max_abs_difference(&self, other: &ScalarField) -> f64 {
        if self.grid != other.grid {
            return f64::INFINITY;
        }
        self.values
            .values()
            .iter()
            .zip(other.values.values())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    pub fn into_values(self) -> Buffer2<f64> {
        self.values
    }
}

/// How source contributions combine at a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Superposition {
    /// Linear sum of all contributions.
    #[default]
    Sum,
    /// Largest contribution wins ("umbrella" rendering).
    Maximum,
}

/// Output of a synthesis call.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub field: ScalarField,
    /// Sources whose contribution was dropped because it was not finite.
    pub issues: Vec<NumericIssue>,
}

/// Superpose `sources` on `grid` by linear summation.
pub fn synthesize(grid: &Grid, sources: &[SourceSpec]) -> Synthesis {
    synthesize_with(grid, sources, Superposition::Sum)
}

/// Superpose `sources` on `grid` with the given combination rule.
pub fn synthesize_with(grid: &Grid, sources: &[SourceSpec], mode: Superposition) -> Synthesis {
    let kernels: Vec<Kernel> = sources.iter().map(SourceSpec::kernel).collect();

    // `None` for kernels that cannot be sampled at all.
    let rendered: Vec<Option<(Buffer2<f64>, usize)>> =
        par_map_limited(&kernels, MAX_SOURCES_IN_FLIGHT, |_, kernel| {
            if kernel.is_degenerate() {
                return None;
            }
            let buffer = render_kernel(grid, kernel);
            let non_finite = buffer
                .values()
                .par_iter()
                .filter(|v| !v.is_finite())
                .count();
            Some((buffer, non_finite))
        });

    let mut issues = Vec::new();
    let mut contributions: Vec<&Buffer2<f64>> = Vec::with_capacity(rendered.len());
    for (source_index, rendered) in rendered.iter().enumerate() {
        let cause = match rendered {
            None => NumericCause::DegenerateSpread,
            Some((_, non_finite)) if *non_finite > 0 => NumericCause::NonFiniteSamples(*non_finite),
            Some((buffer, _)) => {
                contributions.push(buffer);
                continue;
            }
        };
        let issue = NumericIssue {
            source_index,
            kind: kernels[source_index].kind(),
            cause,
        };
        tracing::warn!("{}", issue);
        issues.push(issue);
    }

    let values = reduce(grid, &contributions, mode);
    tracing::debug!(
        sources = sources.len(),
        dropped = issues.len(),
        width = grid.width(),
        height = grid.height(),
        "synthesized field"
    );

    Synthesis {
        field: ScalarField::new(*grid, values),
        issues,
    }
}

/// Evaluate one kernel at every sample.
fn render_kernel(grid: &Grid, kernel: &Kernel) -> Buffer2<f64> {
    Buffer2::par_from_rows(grid.width(), grid.height(), |y, row| {
        for (x, v) in row.iter_mut().enumerate() {
            *v = kernel.evaluate(grid.position(x, y));
        }
    })
}

/// Combine per-source buffers sample by sample, always in source order.
fn reduce(grid: &Grid, contributions: &[&Buffer2<f64>], mode: Superposition) -> Buffer2<f64> {
    Buffer2::par_from_rows(grid.width(), grid.height(), |y, row| {
        for (x, out) in row.iter_mut().enumerate() {
            let idx = y * grid.width() + x;
            *out = match mode {
                Superposition::Sum => contributions.iter().fold(0.0, |acc, b| acc + b[idx]),
                Superposition::Maximum => contributions
                    .iter()
                    .map(|b| b[idx])
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
                    .unwrap_or(0.0),
            };
        }
    })
}
