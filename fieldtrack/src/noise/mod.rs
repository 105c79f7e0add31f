//! Noise models applied to a synthesized field.
//!
//! Randomness comes from a seeded [`ChaCha8Rng`]. Row `y` draws from stream
//! `y` of the generator, so every sample's random sequence is fixed by
//! `(seed, y, x)` alone and rows can be processed in parallel without changing
//! the output. Kinds that need field-global draws (bump placement) use a
//! dedicated stream that no row uses.


use std::str::FromStr;

use common::Buffer2;
use ::noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::distribution::SourceSpec;
use crate::error::{
    require_finite, require_non_negative, require_positive, require_unit_interval,
    ConstructionError,
};
use crate::field::{synthesize, ScalarField};

const CONTEXT: &str = "NoiseSpec";

/// Stream reserved for field-global draws.
const GLOBAL_STREAM: u64 = u64::MAX;

/// Display names of the noise kinds, as offered by a noise picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum NoiseKindName {
    #[strum(to_string = "None", serialize = "none")]
    None,
    #[strum(to_string = "Gaussian (White)", serialize = "gaussian", serialize = "white")]
    Gaussian,
    #[strum(to_string = "Salt", serialize = "salt")]
    Salt,
    #[strum(to_string = "Pepper", serialize = "pepper")]
    Pepper,
    #[strum(to_string = "Salt and Pepper", serialize = "salt_and_pepper")]
    SaltAndPepper,
    #[strum(
        to_string = "Gaussian Few",
        serialize = "gaussian_few",
        serialize = "Gaussian blobs"
    )]
    GaussianFew,
    #[strum(to_string = "Poisson", serialize = "poisson")]
    Poisson,
    #[strum(to_string = "Speckle", serialize = "speckle")]
    Speckle,
    #[strum(to_string = "Uniform", serialize = "uniform")]
    Uniform,
    #[strum(to_string = "Laplace", serialize = "laplace")]
    Laplace,
    #[strum(to_string = "Perlin", serialize = "perlin")]
    Perlin,
}

/// A perturbation model and its parameters. All intensities are in field
/// value units unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoiseKind {
    None,
    /// Additive white noise with standard deviation `std_dev`.
    Gaussian { std_dev: f64 },
    /// Each sample becomes the high level with probability `density`.
    Salt { density: f64 },
    /// Each sample becomes the low level with probability `density`.
    Pepper { density: f64 },
    /// A `density` fraction of samples is replaced, `salt_ratio` of those by
    /// the high level and the rest by the low level.
    SaltAndPepper { density: f64, salt_ratio: f64 },
    /// Between `min_count` and `max_count` extra Gaussian bumps with peak
    /// amplitude drawn from `amplitude`, placed uniformly over the grid.
    /// `sigma` is in continuous grid units.
    GaussianFew {
        min_count: u32,
        max_count: u32,
        amplitude: (f64, f64),
        sigma: f64,
    },
    /// Shot noise: `|v| / intensity` is treated as a photon count.
    Poisson { intensity: f64 },
    /// Multiplicative noise `v + v·n`, `n ~ N(0, variance)`.
    Speckle { variance: f64 },
    /// Additive noise uniform in `[-half_width, half_width]`.
    Uniform { half_width: f64 },
    /// Additive Laplace noise with scale `scale`.
    Laplace { scale: f64 },
    /// Smooth coherent noise with feature size `scale` samples, adding values
    /// in roughly `[-amplitude/2, amplitude/2]`.
    Perlin { scale: f64, amplitude: f64 },
}

impl NoiseKind {
    /// Build a kind from its picker name and a single "amount" knob, the way
    /// a simple noise control exposes it.
    pub fn from_name(name: &str, amount: f64) -> Result<Self, ConstructionError> {
        let parsed =
            NoiseKindName::from_str(name.trim()).map_err(|_| ConstructionError::UnknownKind {
                family: "noise",
                name: name.to_string(),
            })?;
        let kind = match parsed {
            NoiseKindName::None => NoiseKind::None,
            NoiseKindName::Gaussian => NoiseKind::Gaussian { std_dev: amount },
            NoiseKindName::Salt => NoiseKind::Salt { density: amount },
            NoiseKindName::Pepper => NoiseKind::Pepper { density: amount },
            NoiseKindName::SaltAndPepper => NoiseKind::SaltAndPepper {
                density: amount,
                salt_ratio: 0.5,
            },
            NoiseKindName::GaussianFew => NoiseKind::GaussianFew {
                min_count: 5,
                max_count: 5,
                amplitude: (amount, amount),
                sigma: 3.0,
            },
            NoiseKindName::Poisson => NoiseKind::Poisson { intensity: amount },
            NoiseKindName::Speckle => NoiseKind::Speckle { variance: amount },
            NoiseKindName::Uniform => NoiseKind::Uniform { half_width: amount },
            NoiseKindName::Laplace => NoiseKind::Laplace { scale: amount },
            NoiseKindName::Perlin => NoiseKind::Perlin {
                scale: 20.0,
                amplitude: amount,
            },
        };
        kind.validate()?;
        Ok(kind)
    }

    pub fn validate(&self) -> Result<(), ConstructionError> {
        match *self {
            NoiseKind::None => Ok(()),
            NoiseKind::Gaussian { std_dev } => require_non_negative(CONTEXT, "std_dev", std_dev),
            NoiseKind::Salt { density } | NoiseKind::Pepper { density } => {
                require_unit_interval(CONTEXT, "density", density)
            }
            NoiseKind::SaltAndPepper {
                density,
                salt_ratio,
            } => {
                require_unit_interval(CONTEXT, "density", density)?;
                require_unit_interval(CONTEXT, "salt_ratio", salt_ratio)
            }
            NoiseKind::GaussianFew {
                min_count,
                max_count,
                amplitude,
                sigma,
            } => {
                if min_count > max_count {
                    return Err(ConstructionError::InvalidRange {
                        context: CONTEXT,
                        parameter: "count",
                        low: min_count as f64,
                        high: max_count as f64,
                    });
                }
                require_non_negative(CONTEXT, "amplitude.0", amplitude.0)?;
                require_non_negative(CONTEXT, "amplitude.1", amplitude.1)?;
                if amplitude.0 > amplitude.1 {
                    return Err(ConstructionError::InvalidRange {
                        context: CONTEXT,
                        parameter: "amplitude",
                        low: amplitude.0,
                        high: amplitude.1,
                    });
                }
                require_positive(CONTEXT, "sigma", sigma)
            }
            NoiseKind::Poisson { intensity } => {
                require_non_negative(CONTEXT, "intensity", intensity)
            }
            NoiseKind::Speckle { variance } => require_non_negative(CONTEXT, "variance", variance),
            NoiseKind::Uniform { half_width } => {
                require_non_negative(CONTEXT, "half_width", half_width)
            }
            NoiseKind::Laplace { scale } => require_non_negative(CONTEXT, "scale", scale),
            NoiseKind::Perlin { scale, amplitude } => {
                require_positive(CONTEXT, "scale", scale)?;
                require_non_negative(CONTEXT, "amplitude", amplitude)
            }
        }
    }

    /// True when applying this kind cannot change any sample.
    pub fn is_noop(&self) -> bool {
        match *self {
            NoiseKind::None => true,
            NoiseKind::Gaussian { std_dev } => std_dev == 0.0,
            NoiseKind::Salt { density }
            | NoiseKind::Pepper { density }
            | NoiseKind::SaltAndPepper { density, .. } => density == 0.0,
            NoiseKind::GaussianFew {
                max_count,
                amplitude,
                ..
            } => max_count == 0 || amplitude.1 == 0.0,
            NoiseKind::Poisson { intensity } => intensity == 0.0,
            NoiseKind::Speckle { variance } => variance == 0.0,
            NoiseKind::Uniform { half_width } => half_width == 0.0,
            NoiseKind::Laplace { scale } => scale == 0.0,
            NoiseKind::Perlin { amplitude, .. } => amplitude == 0.0,
        }
    }
}

/// Noise model, seed and output options. Validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NoiseSpecDef", into = "NoiseSpecDef")]
pub struct NoiseSpec {
    kind: NoiseKind,
    seed: u64,
    clip_to_range: bool,
    levels: Option<(f64, f64)>,
}

#[derive(Serialize, Deserialize)]
struct NoiseSpecDef {
    kind: NoiseKind,
    seed: u64,
    #[serde(default)]
    clip_to_range: bool,
    #[serde(default)]
    levels: Option<(f64, f64)>,
}

impl TryFrom<NoiseSpecDef> for NoiseSpec {
    type Error = ConstructionError;

    fn try_from(def: NoiseSpecDef) -> Result<Self, Self::Error> {
        let spec = NoiseSpec::new(def.kind, def.seed)?.with_clipping(def.clip_to_range);
        match def.levels {
            Some((low, high)) => spec.with_levels(low, high),
            None => Ok(spec),
        }
    }
}

impl From<NoiseSpec> for NoiseSpecDef {
    fn from(spec: NoiseSpec) -> Self {
        NoiseSpecDef {
            kind: spec.kind,
            seed: spec.seed,
            clip_to_range: spec.clip_to_range,
            levels: spec.levels,
        }
    }
}

impl Default for NoiseSpec {
    fn default() -> Self {
        Self {
            kind: NoiseKind::None,
            seed: 0,
            clip_to_range: false,
            levels: None,
        }
    }
}

impl NoiseSpec {
    pub fn new(kind: NoiseKind, seed: u64) -> Result<Self, ConstructionError> {
        kind.validate()?;
        Ok(Self {
            kind,
            seed,
            clip_to_range: false,
            levels: None,
        })
    }

    /// Clamp the noisy field to the clean field's value range.
    pub fn with_clipping(mut self, clip: bool) -> Self {
        self.clip_to_range = clip;
        self
    }

    /// Override the pepper (`low`) and salt (`high`) levels, which otherwise
    /// default to the clean field's minimum and maximum.
    pub fn with_levels(mut self, low: f64, high: f64) -> Result<Self, ConstructionError> {
        require_finite(CONTEXT, "levels.low", low)?;
        require_finite(CONTEXT, "levels.high", high)?;
        self.levels = Some((low, high));
        Ok(self)
    }

    /// Same model with another seed, e.g. one per frame.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[inline]
    pub fn kind(&self) -> NoiseKind {
        self.kind
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn clip_to_range(&self) -> bool {
        self.clip_to_range
    }
}

/// Produce a noisy copy of `field`. The input is left untouched.
pub fn apply(field: &ScalarField, spec: &NoiseSpec) -> ScalarField {
    if spec.kind.is_noop() {
        return field.clone();
    }

    let (clean_min, clean_max) = field.range();
    let (low, high) = spec.levels.unwrap_or((clean_min, clean_max));
    let seed = spec.seed;

    let noisy = match spec.kind {
        NoiseKind::None => field.clone(),
        NoiseKind::Gaussian { std_dev } => perturb(field, seed, |rng, _, _, v| {
            let z: f64 = rng.sample(StandardNormal);
            v + std_dev * z
        }),
        NoiseKind::Salt { density } => perturb(field, seed, |rng, _, _, v| {
            if rng.random_bool(density) {
                high
            } else {
                v
            }
        }),
        NoiseKind::Pepper { density } => perturb(field, seed, |rng, _, _, v| {
            if rng.random_bool(density) {
                low
            } else {
                v
            }
        }),
        NoiseKind::SaltAndPepper {
            density,
            salt_ratio,
        } => perturb(field, seed, |rng, _, _, v| {
            let u: f64 = rng.random();
            if u < density * salt_ratio {
                high
            } else if u < density {
                low
            } else {
                v
            }
        }),
        NoiseKind::GaussianFew {
            min_count,
            max_count,
            amplitude,
            sigma,
        } => add_clutter(field, seed, (min_count, max_count), amplitude, sigma),
        NoiseKind::Poisson { intensity } => perturb(field, seed, |rng, _, _, v| {
            let lambda = v.abs() / intensity;
            match Poisson::new(lambda) {
                Ok(dist) => {
                    let count: f64 = dist.sample(rng);
                    v.signum() * count * intensity
                }
                // Zero or non-finite expectation: nothing to count.
                Err(_) => v,
            }
        }),
        NoiseKind::Speckle { variance } => {
            let std_dev = variance.sqrt();
            perturb(field, seed, |rng, _, _, v| {
                let z: f64 = rng.sample(StandardNormal);
                v + v * std_dev * z
            })
        }
        NoiseKind::Uniform { half_width } => perturb(field, seed, |rng, _, _, v| {
            v + rng.random_range(-half_width..=half_width)
        }),
        NoiseKind::Laplace { scale } => perturb(field, seed, |rng, _, _, v| {
            let u: f64 = rng.random::<f64>() - 0.5;
            let tail = (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE);
            v - scale * u.signum() * tail.ln()
        }),
        NoiseKind::Perlin { scale, amplitude } => {
            let perlin = Perlin::new(fold_seed(seed));
            perturb(field, seed, |_, x, y, v| {
                let n = perlin.get([x as f64 / scale, y as f64 / scale]);
                v + 0.5 * amplitude * n
            })
        }
    };

    tracing::debug!(kind = ?spec.kind, seed, "applied noise");

    if spec.clip_to_range {
        noisy.map(|&v| v.clamp(clean_min, clean_max))
    } else {
        noisy
    }
}

/// Generator for row `y`: same seed, stream `y`.
fn row_rng(seed: u64, y: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(y as u64);
    rng
}

fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

/// Apply `f(rng, x, y, value)` to every sample, rows in parallel.
fn perturb<F>(field: &ScalarField, seed: u64, f: F) -> ScalarField
where
    F: Fn(&mut ChaCha8Rng, usize, usize, f64) -> f64 + Sync + Send,
{
    let values = field.values();
    let buffer = Buffer2::par_from_rows(field.width(), field.height(), |y, row| {
        let mut rng = row_rng(seed, y);
        for (x, out) in row.iter_mut().enumerate() {
            *out = f(&mut rng, x, y, values[(x, y)]);
        }
    });
    ScalarField::new(*field.grid(), buffer)
}

/// Superpose randomly placed low-amplitude Gaussian bumps.
fn add_clutter(
    field: &ScalarField,
    seed: u64,
    (min_count, max_count): (u32, u32),
    (amp_low, amp_high): (f64, f64),
    sigma: f64,
) -> ScalarField {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(GLOBAL_STREAM);

    let count = rng.random_range(min_count..=max_count);
    let bounds = field.grid().bounds();
    let variance = sigma * sigma;

    let bumps: Vec<SourceSpec> = (0..count)
        .filter_map(|_| {
            let t = glam::DVec2::new(rng.random(), rng.random());
            let amplitude = if amp_high > amp_low {
                rng.random_range(amp_low..=amp_high)
            } else {
                amp_low
            };
            // Checked in `NoiseSpec::new`.
            SourceSpec::gaussian(bounds.lerp(t), amplitude, variance).ok()
        })
        .collect();

    tracing::debug!(bumps = bumps.len(), "adding clutter bumps");
    let clutter = synthesize(field.grid(), &bumps).field;
    field.add(&clutter)
}
