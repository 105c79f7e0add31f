//! Analytic distributions that make up a synthesized field.
//!
//! Every kind is evaluated in the principal-axis frame of its [`Spread`]:
//! a point `p` is translated by the source center, rotated onto the spread's
//! major/minor axes and divided by the per-axis standard deviation. For an
//! isotropic spread with variance `σ²` this gives the textbook formulas:
//!
//! | kind                 | value at distance `r`                        |
//! |----------------------|----------------------------------------------|
//! | Gaussian             | `A·exp(−r²/2σ²)`                              |
//! | Cauchy               | `A/(1 + r²/γ²)` with `γ = σ`                  |
//! | Mexican hat          | `A·(1 − r²/σ²)·exp(−r²/2σ²)`                  |
//! | Exponential decay    | `A·exp(−r/λ)` with `λ = σ`                    |
//! | Anisotropic Gaussian | `A·exp(−qᵀMq/2)`, `M = diag(1/σu², 1/σv²)`    |
//! | Ridge                | Gaussian cross-section around a line segment |
//! | Multi-lobe           | sum of Gaussian lobes spaced along the u-axis |
//! | Plateau              | `A` inside `radius`, Gaussian shoulder beyond |
//!
//! The Mexican hat changes sign at `r = σ` and the exponential decay has a
//! cusp at the center; both are part of the shapes.


use std::str::FromStr;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{
    require_finite, require_non_negative, require_positive, ConstructionError,
};

const CONTEXT: &str = "SourceSpec";

/// Smallest minor/major eigenvalue ratio of a usable covariance.
const MIN_EIGEN_RATIO: f64 = 1e-12;

// ============================================================================
// Kinds
// ============================================================================

/// Name tag of a distribution family.
///
/// Parses from the display names a source editor shows ("Mexican Hat") as
/// well as snake_case identifiers, case-insensitively.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    #[strum(to_string = "Gaussian", serialize = "gaussian")]
    Gaussian,
    #[strum(to_string = "Cauchy", serialize = "cauchy")]
    Cauchy,
    #[strum(to_string = "Mexican Hat", serialize = "mexican_hat")]
    MexicanHat,
    #[strum(
        to_string = "Exponential Decay",
        serialize = "exponential_decay",
        serialize = "Exponential"
    )]
    ExponentialDecay,
    #[strum(to_string = "Anisotropic Gaussian", serialize = "anisotropic_gaussian")]
    AnisotropicGaussian,
    #[strum(to_string = "Ridge", serialize = "ridge")]
    Ridge,
    #[strum(to_string = "Multi-Lobe", serialize = "multi_lobe")]
    MultiLobe,
    #[strum(to_string = "Plateau", serialize = "plateau")]
    Plateau,
}

impl DistributionKind {
    /// Parse a kind name. Unknown names are a construction error, never a
    /// silent fallback.
    pub fn parse(name: &str) -> Result<Self, ConstructionError> {
        Self::from_str(name.trim()).map_err(|_| ConstructionError::UnknownKind {
            family: "distribution",
            name: name.to_string(),
        })
    }
}

/// Kind tag together with its kind-specific shape parameters.
///
/// Lengths (`half_length`, `spacing`, `radius`) are in continuous grid
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Gaussian,
    Cauchy,
    MexicanHat,
    ExponentialDecay,
    AnisotropicGaussian,
    /// Gaussian cross-section around a segment of length `2·half_length`
    /// along the spread's major axis.
    Ridge { half_length: f64 },
    /// `lobes` Gaussian lobes centered on the source, `spacing` apart along
    /// the spread's major axis.
    MultiLobe { lobes: u32, spacing: f64 },
    /// Flat top inside `radius` (measured along the major axis), Gaussian
    /// shoulder outside it.
    Plateau { radius: f64 },
}

impl Shape {
    pub fn kind(&self) -> DistributionKind {
        match self {
            Shape::Gaussian => DistributionKind::Gaussian,
            Shape::Cauchy => DistributionKind::Cauchy,
            Shape::MexicanHat => DistributionKind::MexicanHat,
            Shape::ExponentialDecay => DistributionKind::ExponentialDecay,
            Shape::AnisotropicGaussian => DistributionKind::AnisotropicGaussian,
            Shape::Ridge { .. } => DistributionKind::Ridge,
            Shape::MultiLobe { .. } => DistributionKind::MultiLobe,
            Shape::Plateau { .. } => DistributionKind::Plateau,
        }
    }

    /// Shape parameters a source editor starts from, scaled to the spread.
    pub fn default_for(kind: DistributionKind, spread: &Spread) -> Self {
        let sigma = spread.major_variance().max(0.0).sqrt();
        match kind {
            DistributionKind::Gaussian => Shape::Gaussian,
            DistributionKind::Cauchy => Shape::Cauchy,
            DistributionKind::MexicanHat => Shape::MexicanHat,
            DistributionKind::ExponentialDecay => Shape::ExponentialDecay,
            DistributionKind::AnisotropicGaussian => Shape::AnisotropicGaussian,
            DistributionKind::Ridge => Shape::Ridge {
                half_length: 2.0 * sigma,
            },
            DistributionKind::MultiLobe => Shape::MultiLobe {
                lobes: 3,
                spacing: 4.0 * sigma,
            },
            DistributionKind::Plateau => Shape::Plateau { radius: sigma },
        }
    }

    pub fn validate(&self) -> Result<(), ConstructionError> {
        match *self {
            Shape::Ridge { half_length } => {
                require_non_negative(CONTEXT, "ridge half_length", half_length)
            }
            Shape::MultiLobe { lobes, spacing } => {
                if lobes == 0 {
                    return Err(ConstructionError::NonPositive {
                        context: CONTEXT,
                        parameter: "lobe count",
                        value: 0.0,
                    });
                }
                require_non_negative(CONTEXT, "lobe spacing", spacing)
            }
            Shape::Plateau { radius } => require_non_negative(CONTEXT, "plateau radius", radius),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Spread
// ============================================================================

/// Spread descriptor of a source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Spread {
    /// Same variance along every direction.
    Isotropic { variance: f64 },
    /// Variances along a major axis rotated by `angle` radians from +x and
    /// along the perpendicular minor axis.
    Oriented {
        variance_major: f64,
        variance_minor: f64,
        angle: f64,
    },
    /// Full 2x2 covariance. Only the diagonal is required to be positive; a
    /// singular or indefinite covariance is accepted here and reported by
    /// synthesis, which drops the source.
    Covariance { xx: f64, xy: f64, yy: f64 },
}

/// Rotation and per-axis scale that whiten a spread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrincipalAxes {
    pub cos: f64,
    pub sin: f64,
    pub sigma_major: f64,
    pub sigma_minor: f64,
}

impl Spread {
    pub fn isotropic(variance: f64) -> Self {
        Spread::Isotropic { variance }
    }

    pub fn oriented(variance_major: f64, variance_minor: f64, angle: f64) -> Self {
        Spread::Oriented {
            variance_major,
            variance_minor,
            angle,
        }
    }

    pub fn validate(&self) -> Result<(), ConstructionError> {
        match *self {
            Spread::Isotropic { variance } => require_positive(CONTEXT, "variance", variance),
            Spread::Oriented {
                variance_major,
                variance_minor,
                angle,
            } => {
                require_positive(CONTEXT, "variance_major", variance_major)?;
                require_positive(CONTEXT, "variance_minor", variance_minor)?;
                require_finite(CONTEXT, "angle", angle)
            }
            Spread::Covariance { xx, xy, yy } => {
                require_positive(CONTEXT, "covariance xx", xx)?;
                require_positive(CONTEXT, "covariance yy", yy)?;
                require_finite(CONTEXT, "covariance xy", xy)
            }
        }
    }

    /// Variance along the major axis.
    pub fn major_variance(&self) -> f64 {
        match *self {
            Spread::Isotropic { variance } => variance,
            Spread::Oriented { variance_major, .. } => variance_major,
            Spread::Covariance { .. } => self.eigen().0,
        }
    }

    /// True for a covariance that is singular, indefinite or too badly
    /// conditioned to whiten. Isotropic and oriented spreads never are once
    /// validated.
    pub fn is_degenerate(&self) -> bool {
        match self {
            Spread::Covariance { .. } => {
                let (major, minor, _) = self.eigen();
                // NaN fails the comparison as well.
                !(minor > major * MIN_EIGEN_RATIO)
            }
            _ => false,
        }
    }

    /// Eigenvalues (major, minor) and major-axis angle.
    fn eigen(&self) -> (f64, f64, f64) {
        match *self {
            Spread::Isotropic { variance } => (variance, variance, 0.0),
            Spread::Oriented {
                variance_major,
                variance_minor,
                angle,
            } => (variance_major, variance_minor, angle),
            Spread::Covariance { xx, xy, yy } => {
                let mean = 0.5 * (xx + yy);
                let half_diff = 0.5 * (xx - yy);
                let radius = (half_diff * half_diff + xy * xy).sqrt();
                let angle = 0.5 * (2.0 * xy).atan2(xx - yy);
                (mean + radius, mean - radius, angle)
            }
        }
    }

    /// Principal axes. A degenerate covariance yields a NaN or zero sigma
    /// here.
    pub fn principal_axes(&self) -> PrincipalAxes {
        let (major, minor, angle) = self.eigen();
        let (sin, cos) = angle.sin_cos();
        PrincipalAxes {
            cos,
            sin,
            sigma_major: major.sqrt(),
            sigma_minor: minor.sqrt(),
        }
    }
}

// ============================================================================
// SourceSpec
// ============================================================================

/// One placed distribution instance. Validated on construction and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SourceSpecDef", into = "SourceSpecDef")]
pub struct SourceSpec {
    shape: Shape,
    center: DVec2,
    amplitude: f64,
    spread: Spread,
}

#[derive(Serialize, Deserialize)]
struct SourceSpecDef {
    shape: Shape,
    center: DVec2,
    amplitude: f64,
    spread: Spread,
}

impl TryFrom<SourceSpecDef> for SourceSpec {
    type Error = ConstructionError;

    fn try_from(def: SourceSpecDef) -> Result<Self, Self::Error> {
        SourceSpec::new(def.shape, def.center, def.amplitude, def.spread)
    }
}

impl From<SourceSpec> for SourceSpecDef {
    fn from(spec: SourceSpec) -> Self {
        SourceSpecDef {
            shape: spec.shape,
            center: spec.center,
            amplitude: spec.amplitude,
            spread: spec.spread,
        }
    }
}

impl SourceSpec {
    pub fn new(
        shape: Shape,
        center: DVec2,
        amplitude: f64,
        spread: Spread,
    ) -> Result<Self, ConstructionError> {
        require_finite(CONTEXT, "center.x", center.x)?;
        require_finite(CONTEXT, "center.y", center.y)?;
        require_finite(CONTEXT, "amplitude", amplitude)?;
        spread.validate()?;
        shape.validate()?;
        Ok(Self {
            shape,
            center,
            amplitude,
            spread,
        })
    }

    /// Isotropic Gaussian with variance `σ²`.
    pub fn gaussian(center: DVec2, amplitude: f64, variance: f64) -> Result<Self, ConstructionError> {
        Self::new(Shape::Gaussian, center, amplitude, Spread::isotropic(variance))
    }

    /// Source of a kind given by name, with default shape parameters.
    pub fn from_kind_name(
        name: &str,
        center: DVec2,
        amplitude: f64,
        spread: Spread,
    ) -> Result<Self, ConstructionError> {
        let kind = DistributionKind::parse(name)?;
        spread.validate()?;
        Self::new(Shape::default_for(kind, &spread), center, amplitude, spread)
    }

    #[inline]
    pub fn kind(&self) -> DistributionKind {
        self.shape.kind()
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        self.center
    }

    #[inline]
    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    #[inline]
    pub fn spread(&self) -> Spread {
        self.spread
    }

    /// Copy moved to `center`. Position is the only thing that changes
    /// between frames of an animated scene.
    pub fn with_center(&self, center: DVec2) -> Result<Self, ConstructionError> {
        Self::new(self.shape, center, self.amplitude, self.spread)
    }

    /// Centers of the individual lobes. A single entry for non-composite kinds.
    pub fn lobe_centers(&self) -> Vec<DVec2> {
        match self.shape {
            Shape::MultiLobe { lobes, spacing } => {
                let axes = self.spread.principal_axes();
                let dir = DVec2::new(axes.cos, axes.sin);
                (0..lobes)
                    .map(|k| self.center + dir * lobe_offset(k, lobes, spacing))
                    .collect()
            }
            _ => vec![self.center],
        }
    }

    /// Precompute the evaluation frame.
    pub fn kernel(&self) -> Kernel {
        let axes = self.spread.principal_axes();
        Kernel {
            shape: self.shape,
            center: self.center,
            amplitude: self.amplitude,
            cos: axes.cos,
            sin: axes.sin,
            inv_sigma_major: 1.0 / axes.sigma_major,
            inv_sigma_minor: 1.0 / axes.sigma_minor,
            degenerate: self.spread.is_degenerate(),
        }
    }

    /// Value of this source at `p`.
    pub fn evaluate(&self, p: DVec2) -> f64 {
        self.kernel().evaluate(p)
    }
}

/// Signed offset of lobe `k` of `lobes` from the source center.
#[inline]
fn lobe_offset(k: u32, lobes: u32, spacing: f64) -> f64 {
    (k as f64 - (lobes - 1) as f64 * 0.5) * spacing
}

/// Free-function form of [`SourceSpec::evaluate`].
pub fn evaluate(source: &SourceSpec, p: DVec2) -> f64 {
    source.evaluate(p)
}

// ============================================================================
// Kernel
// ============================================================================

/// A [`SourceSpec`] with its principal-axis frame precomputed.
///
/// Synthesis builds one kernel per source and evaluates it at every sample.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    shape: Shape,
    center: DVec2,
    amplitude: f64,
    cos: f64,
    sin: f64,
    inv_sigma_major: f64,
    inv_sigma_minor: f64,
    degenerate: bool,
}

impl Kernel {
    #[inline]
    pub fn kind(&self) -> DistributionKind {
        self.shape.kind()
    }

    /// The spread cannot be whitened; samples would be meaningless.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    #[inline]
    pub fn evaluate(&self, p: DVec2) -> f64 {
        let q = p - self.center;
        let u = q.x * self.cos + q.y * self.sin;
        let v = -q.x * self.sin + q.y * self.cos;
        let wu = u * self.inv_sigma_major;
        let wv = v * self.inv_sigma_minor;
        let d2 = wu * wu + wv * wv;
        let a = self.amplitude;

        match self.shape {
            Shape::Gaussian | Shape::AnisotropicGaussian => a * (-0.5 * d2).exp(),
            Shape::Cauchy => a / (1.0 + d2),
            Shape::MexicanHat => a * (1.0 - d2) * (-0.5 * d2).exp(),
            Shape::ExponentialDecay => a * (-d2.sqrt()).exp(),
            Shape::Ridge { half_length } => {
                let along = (u.abs() - half_length).max(0.0) * self.inv_sigma_major;
                a * (-0.5 * (along * along + wv * wv)).exp()
            }
            Shape::MultiLobe { lobes, spacing } => {
                let cross = wv * wv;
                (0..lobes)
                    .map(|k| {
                        let du = (u - lobe_offset(k, lobes, spacing)) * self.inv_sigma_major;
                        a * (-0.5 * (du * du + cross)).exp()
                    })
                    .sum()
            }
            Shape::Plateau { radius } => {
                let d = d2.sqrt();
                let flat = radius * self.inv_sigma_major;
                if d <= flat {
                    a
                } else {
                    let excess = d - flat;
                    a * (-0.5 * excess * excess).exp()
                }
            }
        }
    }
}
