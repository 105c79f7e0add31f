//! Example: render one source of every distribution kind and list the
//! features found in each field, with and without noise.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example distribution_gallery
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use common::log_setup::{setup_logging, LogConfig};
use fieldtrack::export::save_field_json;
use fieldtrack::{
    extract_with, noise, synthesize, DistributionKind, ExtractorConfig, Grid, NoiseKind,
    NoiseSpec, SourceSpec, Spread,
};
use strum::IntoEnumIterator;

fn main() -> Result<()> {
    setup_logging(&LogConfig::default()).context("setting up logging")?;

    let grid = Grid::from_spacing(101, 101, 1.0)?.supersampled(2);
    let center = grid.bounds().center();
    let spread = Spread::oriented(60.0, 20.0, 0.4);
    let extractor = ExtractorConfig::with_threshold(0.1);
    let noise_spec = NoiseSpec::new(
        NoiseKind::SaltAndPepper {
            density: 0.002,
            salt_ratio: 0.5,
        },
        1,
    )?;

    let out_dir = PathBuf::from("test_output/distribution_gallery");
    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    for kind in DistributionKind::iter() {
        let source = SourceSpec::from_kind_name(&kind.to_string(), center, 1.0, spread)
            .with_context(|| format!("building {kind} source"))?;
        let synthesis = synthesize(&grid, &[source]);
        for issue in &synthesis.issues {
            tracing::warn!("{issue}");
        }

        let clean = extract_with(&synthesis.field, &extractor, 0);
        let noisy_field = noise::apply(&synthesis.field, &noise_spec);
        let noisy = extract_with(&noisy_field, &extractor, 0);
        let (low, high) = synthesis.field.range();

        println!(
            "{:<22} range [{:>6.3}, {:>6.3}]  features clean {:>3}  noisy {:>3}",
            kind.to_string(),
            low,
            high,
            clean.len(),
            noisy.len()
        );
        for feature in clean.iter().take(3) {
            println!(
                "    peak {:>7.3} at ({:>7.2}, {:>7.2})  spread {:.2}",
                feature.value,
                feature.position.x - center.x,
                feature.position.y - center.y,
                feature.spread
            );
        }

        let name = kind.to_string().to_lowercase().replace([' ', '-'], "_");
        save_field_json(&out_dir.join(format!("{name}.json")), &synthesis.field)?;
    }

    tracing::info!(dir = %out_dir.display(), "Gallery written");
    Ok(())
}
