//! Sampling grid and the mapping between sample indices and continuous
//! coordinates.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{require_finite, require_positive, ConstructionError};

/// Axis-aligned bounding box in continuous coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl Bounds {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    #[inline]
    pub fn clamp(&self, p: DVec2) -> DVec2 {
        p.clamp(self.min, self.max)
    }

    /// Point at fractional position `t` (0..1 per axis) inside the box.
    #[inline]
    pub fn lerp(&self, t: DVec2) -> DVec2 {
        self.min + self.size() * t
    }
}

/// Regular 2D sampling grid.
///
/// Samples are corner-aligned: sample `(0, 0)` sits on `bounds.min` and
/// sample `(width - 1, height - 1)` on `bounds.max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridDef", into = "GridDef")]
pub struct Grid {
    width: usize,
    height: usize,
    bounds: Bounds,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct GridDef {
    width: usize,
    height: usize,
    bounds: Bounds,
}

impl TryFrom<GridDef> for Grid {
    type Error = ConstructionError;

    fn try_from(def: GridDef) -> Result<Self, Self::Error> {
        Grid::new(def.width, def.height, def.bounds)
    }
}

impl From<Grid> for GridDef {
    fn from(grid: Grid) -> Self {
        GridDef {
            width: grid.width,
            height: grid.height,
            bounds: grid.bounds,
        }
    }
}

impl Grid {
    pub fn new(width: usize, height: usize, bounds: Bounds) -> Result<Self, ConstructionError> {
        let grid = Self {
            width,
            height,
            bounds,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Grid whose sample `i` sits at `i * spacing` on both axes.
    pub fn from_spacing(
        width: usize,
        height: usize,
        spacing: f64,
    ) -> Result<Self, ConstructionError> {
        require_positive("Grid", "spacing", spacing)?;
        let max = DVec2::new(
            width.saturating_sub(1) as f64 * spacing,
            height.saturating_sub(1) as f64 * spacing,
        );
        Self::new(width, height, Bounds::new(DVec2::ZERO, max))
    }

    pub fn validate(&self) -> Result<(), ConstructionError> {
        if self.width < 2 || self.height < 2 {
            return Err(ConstructionError::GridTooSmall {
                width: self.width,
                height: self.height,
            });
        }
        for (name, v) in [
            ("bounds.min.x", self.bounds.min.x),
            ("bounds.min.y", self.bounds.min.y),
            ("bounds.max.x", self.bounds.max.x),
            ("bounds.max.y", self.bounds.max.y),
        ] {
            require_finite("Grid", name, v)?;
        }
        if self.bounds.max.x <= self.bounds.min.x || self.bounds.max.y <= self.bounds.min.y {
            return Err(ConstructionError::DegenerateBounds {
                min_x: self.bounds.min.x,
                min_y: self.bounds.min.y,
                max_x: self.bounds.max.x,
                max_y: self.bounds.max.y,
            });
        }
        Ok(())
    }

    /// Same extent with `factor` times finer sample spacing.
    pub fn supersampled(&self, factor: usize) -> Self {
        let factor = factor.max(1);
        Self {
            width: (self.width - 1) * factor + 1,
            height: (self.height - 1) * factor + 1,
            bounds: self.bounds,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Distance between neighbouring samples along each axis.
    #[inline]
    pub fn spacing(&self) -> DVec2 {
        DVec2::new(
            (self.bounds.max.x - self.bounds.min.x) / (self.width - 1) as f64,
            (self.bounds.max.y - self.bounds.min.y) / (self.height - 1) as f64,
        )
    }

    /// Continuous position of sample `(x, y)`.
    #[inline]
    pub fn position(&self, x: usize, y: usize) -> DVec2 {
        self.position_at(DVec2::new(x as f64, y as f64))
    }

    /// Continuous position of a fractional sample coordinate.
    #[inline]
    pub fn position_at(&self, sample: DVec2) -> DVec2 {
        self.bounds.min + sample * self.spacing()
    }

    /// Fractional sample coordinate of a continuous position.
    #[inline]
    pub fn sample_coords(&self, p: DVec2) -> DVec2 {
        (p - self.bounds.min) / self.spacing()
    }

    /// Nearest sample to `p`, or `None` if `p` lies outside the grid.
    pub fn nearest_sample(&self, p: DVec2) -> Option<(usize, usize)> {
        if !self.bounds.contains(p) {
            return None;
        }
        let s = self.sample_coords(p).round();
        Some((
            (s.x as usize).min(self.width - 1),
            (s.y as usize).min(self.height - 1),
        ))
    }

    /// Positions of every sample in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = DVec2> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| self.position(x, y)))
    }
}
