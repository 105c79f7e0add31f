//! Tests for field synthesis.

use super::*;
use crate::distribution::{DistributionKind, Shape, Spread};
use crate::error::NumericCause;
use crate::grid::Bounds;
use common::FloatExt;

fn grid_100() -> Grid {
    Grid::new(100, 100, Bounds::new(DVec2::ZERO, DVec2::new(10.0, 10.0))).unwrap()
}

fn two_sources() -> (SourceSpec, SourceSpec) {
    let s1 = SourceSpec::gaussian(DVec2::new(3.0, 4.0), 2.0, 0.8).unwrap();
    let s2 = SourceSpec::new(
        Shape::Cauchy,
        DVec2::new(7.0, 6.5),
        -1.5,
        Spread::oriented(2.0, 0.5, 1.1),
    )
    .unwrap();
    (s1, s2)
}

#[test]
fn superposition_is_linear() {
    let grid = grid_100();
    let (s1, s2) = two_sources();
    let both = synthesize(&grid, &[s1, s2]).field;
    let sum = synthesize(&grid, &[s1])
        .field
        .add(&synthesize(&grid, &[s2]).field);
    assert!(both.max_abs_difference(&sum) < 1e-12);
}

#[test]
fn summation_order_is_deterministic() {
    let grid = grid_100();
    let (s1, s2) = two_sources();
    let a = synthesize(&grid, &[s1, s2]).field;
    let b = synthesize(&grid, &[s1, s2]).field;
    assert_eq!(a, b);
}

#[test]
fn empty_source_list_gives_zero_field() {
    let grid = grid_100();
    let synthesis = synthesize(&grid, &[]);
    assert!(synthesis.issues.is_empty());
    assert_eq!(synthesis.field, ScalarField::zeros(grid));
}

#[test]
fn sample_on_center_equals_amplitude() {
    let grid = Grid::from_spacing(11, 11, 1.0).unwrap();
    let source = SourceSpec::gaussian(DVec2::new(5.0, 5.0), 10.0, 1.0).unwrap();
    let field = synthesize(&grid, &[source]).field;
    assert_eq!(field.value(5, 5), 10.0);
    assert!(field.value(6, 5).within(10.0 * (-0.5f64).exp(), 1e-12));
}

#[test]
fn maximum_mode_takes_largest_contribution() {
    let grid = Grid::from_spacing(21, 21, 1.0).unwrap();
    let a = SourceSpec::gaussian(DVec2::new(5.0, 10.0), 1.0, 4.0).unwrap();
    let b = SourceSpec::gaussian(DVec2::new(15.0, 10.0), 2.0, 4.0).unwrap();
    let field = synthesize_with(&grid, &[a, b], Superposition::Maximum).field;
    assert_eq!(field.value(5, 10), a.evaluate(DVec2::new(5.0, 10.0)).max(b.evaluate(DVec2::new(5.0, 10.0))));
    assert_eq!(field.value(15, 10), 2.0);
}

#[test]
fn degenerate_source_is_dropped_and_reported() {
    let grid = grid_100();
    let good = SourceSpec::gaussian(DVec2::new(5.0, 5.0), 1.0, 1.0).unwrap();
    let bad = SourceSpec::new(
        Shape::Gaussian,
        DVec2::new(2.0, 2.0),
        1.0,
        Spread::Covariance {
            xx: 1.0,
            xy: 3.0,
            yy: 1.0,
        },
    )
    .unwrap();

    let synthesis = synthesize(&grid, &[good, bad]);
    assert_eq!(synthesis.issues.len(), 1);
    assert_eq!(synthesis.issues[0].source_index, 1);
    assert_eq!(synthesis.issues[0].cause, NumericCause::DegenerateSpread);

    let only_good = synthesize(&grid, &[good]).field;
    assert_eq!(synthesis.field, only_good);
    assert!(synthesis.field.values().values().iter().all(|v| v.is_finite()));
}

#[test]
fn singular_covariance_is_reported_not_zeroed() {
    let grid = Grid::from_spacing(11, 11, 1.0).unwrap();
    // Rank one: all the mass on the diagonal, center off the sample lattice.
    let singular = SourceSpec::new(
        Shape::Gaussian,
        DVec2::new(5.25, 5.25),
        1.0,
        Spread::Covariance {
            xx: 1.0,
            xy: 1.0,
            yy: 1.0,
        },
    )
    .unwrap();
    assert!(singular.spread().is_degenerate());

    let synthesis = synthesize(&grid, &[singular]);
    assert_eq!(
        synthesis.issues,
        vec![NumericIssue {
            source_index: 0,
            kind: DistributionKind::Gaussian,
            cause: NumericCause::DegenerateSpread,
        }]
    );
    assert!(synthesis.issues[0]
        .to_string()
        .contains("degenerate covariance"));
    assert_eq!(synthesis.field, ScalarField::zeros(grid));
}

#[test]
fn bilinear_sample_hits_grid_values() {
    let grid = Grid::from_spacing(5, 5, 1.0).unwrap();
    let values = Buffer2::from_fn(5, 5, |x, y| (x + 10 * y) as f64);
    let field = ScalarField::new(grid, values);
    assert_eq!(field.sample(DVec2::new(2.0, 3.0)), 32.0);
    assert!(field.sample(DVec2::new(2.5, 3.5)).approximately_eq(37.5));
    // Clamped to the far corner.
    assert_eq!(field.sample(DVec2::new(100.0, 100.0)), 44.0);
}

#[test]
fn range_ignores_nan() {
    let grid = Grid::from_spacing(2, 2, 1.0).unwrap();
    let field = ScalarField::new(grid, Buffer2::new(2, 2, vec![1.0, f64::NAN, -3.0, 2.0]));
    assert_eq!(field.range(), (-3.0, 2.0));
}
