//! Local-maximum feature extraction with sub-sample refinement.
//!
//! Detection runs in two passes. Candidate maxima are found row-parallel:
//! a sample is a candidate when it exceeds the threshold and no neighbour is
//! strictly greater. A serial pass then groups equal-valued adjacent
//! candidates into plateaus so one physical peak yields one feature. A plateau
//! that touches an equal-valued non-candidate sample is a shoulder of a higher
//! region and is discarded.


use std::collections::VecDeque;

use common::Buffer2;
use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{require_finite, ConstructionError};
use crate::field::ScalarField;

const NEIGHBORS_4: [(isize, isize); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// Neighbourhood used for the local-maximum test and plateau grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &NEIGHBORS_4[..],
            Connectivity::Eight => &common::buffer2::NEIGHBORS_8[..],
        }
    }
}

/// Sub-sample peak refinement method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refinement {
    /// Integer sample position.
    None,
    /// Parabola through the peak and its two neighbours, per axis.
    #[default]
    Parabolic,
    /// Parabola through the logarithm of the values, exact for Gaussian
    /// peaks. Falls back to parabolic where any value is not positive.
    Gaussian,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Samples must be strictly above this value to be reported.
    pub threshold: f64,
    pub refinement: Refinement,
    pub connectivity: Connectivity,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            refinement: Refinement::default(),
            connectivity: Connectivity::default(),
        }
    }
}

impl ExtractorConfig {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConstructionError> {
        require_finite("ExtractorConfig", "threshold", self.threshold)
    }
}

/// A detected peak. `spread` estimates the peak's σ in continuous units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub position: DVec2,
    pub value: f64,
    pub spread: f64,
    pub frame: usize,
}

impl Feature {
    pub fn new(position: DVec2, value: f64, spread: f64, frame: usize) -> Self {
        Self {
            position,
            value,
            spread,
            frame,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.value.is_finite() && self.spread.is_finite()
    }
}

/// Extract features above `threshold` with default refinement.
pub fn extract(field: &ScalarField, threshold: f64, frame: usize) -> Vec<Feature> {
    extract_with(field, &ExtractorConfig::with_threshold(threshold), frame)
}

/// Extract features, sorted by descending value then ascending sample index.
pub fn extract_with(field: &ScalarField, config: &ExtractorConfig, frame: usize) -> Vec<Feature> {
    let values = field.values();
    let offsets = config.connectivity.offsets();

    let candidates = find_candidates(values, config.threshold, offsets);
    let peaks = group_plateaus(values, &candidates, offsets);

    let mut ranked: Vec<(usize, Feature)> = peaks
        .par_iter()
        .map(|peak| (peak.first_index, describe(field, peak, config.refinement, frame)))
        .collect();

    ranked.sort_by(|(ia, a), (ib, b)| b.value.total_cmp(&a.value).then(ia.cmp(ib)));

    tracing::debug!(
        frame,
        candidates = candidates.len(),
        features = ranked.len(),
        "extracted features"
    );

    ranked.into_iter().map(|(_, feature)| feature).collect()
}

/// Flat indices of candidate maxima, in ascending order.
fn find_candidates(
    values: &Buffer2<f64>,
    threshold: f64,
    offsets: &[(isize, isize)],
) -> Vec<usize> {
    let width = values.width();
    (0..values.height())
        .into_par_iter()
        .flat_map_iter(|y| {
            (0..width)
                .filter(move |&x| is_candidate(values, x, y, threshold, offsets))
                .map(move |x| y * width + x)
        })
        .collect()
}

fn is_candidate(
    values: &Buffer2<f64>,
    x: usize,
    y: usize,
    threshold: f64,
    offsets: &[(isize, isize)],
) -> bool {
    let v = values[(x, y)];
    if !v.is_finite() || v <= threshold {
        return false;
    }
    offsets.iter().all(|&(dx, dy)| {
        values
            .get_signed(x as isize + dx, y as isize + dy)
            .map_or(true, |&n| n.is_nan() || n <= v)
    })
}

/// A connected group of equal-valued candidate samples.
#[derive(Debug)]
struct Peak {
    members: Vec<usize>,
    first_index: usize,
}

fn group_plateaus(
    values: &Buffer2<f64>,
    candidates: &[usize],
    offsets: &[(isize, isize)],
) -> Vec<Peak> {
    let mut is_candidate = vec![false; values.len()];
    for &idx in candidates {
        is_candidate[idx] = true;
    }
    let mut visited = vec![false; values.len()];
    let mut peaks = Vec::with_capacity(candidates.len());
    let mut queue = VecDeque::new();

    for &start in candidates {
        if visited[start] {
            continue;
        }
        let level = values[start];
        let mut members = Vec::new();
        let mut shoulder = false;

        visited[start] = true;
        queue.push_back(start);
        while let Some(idx) = queue.pop_front() {
            members.push(idx);
            let (x, y) = values.coords_of(idx);
            for &(dx, dy) in offsets {
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                let Some(&n) = values.get_signed(nx, ny) else {
                    continue;
                };
                if n != level {
                    continue;
                }
                let nidx = values.index_of(nx as usize, ny as usize);
                if !is_candidate[nidx] {
                    shoulder = true;
                } else if !visited[nidx] {
                    visited[nidx] = true;
                    queue.push_back(nidx);
                }
            }
        }

        if !shoulder {
            members.sort_unstable();
            peaks.push(Peak {
                first_index: members[0],
                members,
            });
        }
    }
    peaks
}

fn describe(field: &ScalarField, peak: &Peak, refinement: Refinement, frame: usize) -> Feature {
    let values = field.values();
    let grid = field.grid();
    let spacing = grid.spacing();

    let (x, y) = values.coords_of(peak.first_index);
    let along_x = axis_profile(values, x, y, (1, 0));
    let along_y = axis_profile(values, x, y, (0, 1));

    let sigma_x = along_x.and_then(|p| curvature_sigma(p, spacing.x));
    let sigma_y = along_y.and_then(|p| curvature_sigma(p, spacing.y));
    let curvature_spread = match (sigma_x, sigma_y) {
        (Some(a), Some(b)) => Some(0.5 * (a + b)),
        (Some(s), None) | (None, Some(s)) => Some(s),
        (None, None) => None,
    };

    if peak.members.len() > 1 {
        let sum = peak.members.iter().fold(DVec2::ZERO, |acc, &idx| {
            let (px, py) = values.coords_of(idx);
            acc + DVec2::new(px as f64, py as f64)
        });
        let centroid = sum / peak.members.len() as f64;
        // Radius of a disc with the plateau's area.
        let area = peak.members.len() as f64 * spacing.x * spacing.y;
        let radius = (area / std::f64::consts::PI).sqrt();
        return Feature::new(
            grid.position_at(centroid),
            values[peak.first_index],
            curvature_spread.map_or(radius, |s| s.max(radius)),
            frame,
        );
    }

    let fit_x = along_x.map(|p| fit_axis(p, refinement));
    let fit_y = along_y.map(|p| fit_axis(p, refinement));
    let offset = DVec2::new(
        fit_x.map_or(0.0, |f| f.offset),
        fit_y.map_or(0.0, |f| f.offset),
    );

    Feature::new(
        grid.position_at(DVec2::new(x as f64, y as f64) + offset),
        refined_value(values[(x, y)], fit_x, fit_y, refinement),
        curvature_spread.unwrap_or(spacing.x.min(spacing.y)),
        frame,
    )
}

/// Values at `-1, 0, +1` along an axis. `None` on the border.
fn axis_profile(
    values: &Buffer2<f64>,
    x: usize,
    y: usize,
    (dx, dy): (isize, isize),
) -> Option<[f64; 3]> {
    let xi = x as isize;
    let yi = y as isize;
    let prev = *values.get_signed(xi - dx, yi - dy)?;
    let next = *values.get_signed(xi + dx, yi + dy)?;
    Some([prev, values[(x, y)], next])
}

#[derive(Debug, Clone, Copy)]
struct AxisFit {
    offset: f64,
    /// Change of the fitted function (raw or log) at `offset`.
    delta: f64,
    log_domain: bool,
}

fn fit_axis([l, c, r]: [f64; 3], refinement: Refinement) -> AxisFit {
    match refinement {
        Refinement::None => AxisFit {
            offset: 0.0,
            delta: 0.0,
            log_domain: false,
        },
        Refinement::Parabolic => parabola([l, c, r], false),
        Refinement::Gaussian => {
            if l > 0.0 && c > 0.0 && r > 0.0 {
                parabola([l.ln(), c.ln(), r.ln()], true)
            } else {
                parabola([l, c, r], false)
            }
        }
    }
}

/// Vertex of the parabola through `(-1, l), (0, c), (1, r)`, clamped to half
/// a sample.
fn parabola([l, c, r]: [f64; 3], log_domain: bool) -> AxisFit {
    let a = 0.5 * (l - 2.0 * c + r);
    let b = 0.5 * (r - l);
    if a >= 0.0 || !a.is_finite() || !b.is_finite() {
        return AxisFit {
            offset: 0.0,
            delta: 0.0,
            log_domain,
        };
    }
    let offset = (-b / (2.0 * a)).clamp(-0.5, 0.5);
    AxisFit {
        offset,
        delta: b * offset + a * offset * offset,
        log_domain,
    }
}

fn refined_value(
    center: f64,
    fit_x: Option<AxisFit>,
    fit_y: Option<AxisFit>,
    refinement: Refinement,
) -> f64 {
    if refinement == Refinement::None {
        return center;
    }
    let mut raw = 0.0;
    let mut log = 0.0;
    for fit in [fit_x, fit_y].into_iter().flatten() {
        if fit.log_domain {
            log += fit.delta;
        } else {
            raw += fit.delta;
        }
    }
    center * log.exp() + raw
}

/// σ of a Gaussian with the same log-curvature as the profile, or of a
/// parabola with the same raw curvature when the log is undefined.
fn curvature_sigma([l, c, r]: [f64; 3], spacing: f64) -> Option<f64> {
    if l > 0.0 && c > 0.0 && r > 0.0 {
        let d2 = l.ln() - 2.0 * c.ln() + r.ln();
        if d2 < 0.0 {
            return Some(spacing / (-d2).sqrt()).filter(|s| s.is_finite());
        }
    }
    let d2 = l - 2.0 * c + r;
    if d2 < 0.0 && c > 0.0 {
        return Some(spacing * (c / -d2).sqrt()).filter(|s| s.is_finite());
    }
    None
}
