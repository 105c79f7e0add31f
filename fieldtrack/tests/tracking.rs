//! End-to-end runs: moving sources are synthesized, extracted and tracked.

use common::log_setup::init_test_tracing;
use fieldtrack::{
    extract, synthesize, Bounds, CancelToken, Grid, Motion, NoiseKind, NoiseSpec, PathEnd,
    Pipeline, PipelineConfig, ScenarioConfig, ScenarioKind, ScenarioParams, Scene, SourceSpec,
    TrackEvent, TrackId, TrackStatus, TrackerConfig,
};
use glam::DVec2;

fn line_path(to: DVec2) -> Motion {
    Motion::Path {
        waypoints: vec![to],
        speed: 1.0,
        end: PathEnd::Stay,
    }
}

#[test]
fn single_gaussian_on_reference_grid() {
    init_test_tracing();
    let grid = Grid::new(100, 100, Bounds::new(DVec2::ZERO, DVec2::new(10.0, 10.0))).unwrap();
    let source = SourceSpec::gaussian(DVec2::new(5.0, 5.0), 10.0, 1.0).unwrap();
    let field = synthesize(&grid, &[source]).field;

    let features = extract(&field, 1.0, 0);
    assert_eq!(features.len(), 1);
    assert!(features[0].position.distance(DVec2::new(5.0, 5.0)) < 0.05);
    assert!((features[0].value - 10.0).abs() < 0.05);
}

#[test]
fn crossing_sources_merge_then_split() {
    init_test_tracing();
    let grid = Grid::from_spacing(61, 31, 1.0).unwrap();
    let mut scene = Scene::new(grid);
    scene
        .add(
            SourceSpec::gaussian(DVec2::new(20.0, 15.0), 1.0, 4.0).unwrap(),
            line_path(DVec2::new(36.0, 15.0)),
        )
        .unwrap();
    scene
        .add(
            SourceSpec::gaussian(DVec2::new(40.0, 15.0), 0.8, 4.0).unwrap(),
            line_path(DVec2::new(24.0, 15.0)),
        )
        .unwrap();

    let pipeline = Pipeline::new(PipelineConfig {
        frames: 17,
        tracker: TrackerConfig {
            gate_distance: 6.0,
            ..Default::default()
        },
        keep_fields: false,
        ..Default::default()
    })
    .unwrap();
    let run = pipeline.run(&mut scene, &None, &CancelToken::new()).unwrap();

    // Separated, one peak while overlapping, separated again.
    let counts: Vec<usize> = run.frames.iter().map(|f| f.features.len()).collect();
    assert_eq!(counts[0], 2);
    assert_eq!(counts[10], 1);
    assert_eq!(counts[16], 2);

    let merges: Vec<&TrackEvent> = run
        .tracks
        .events()
        .iter()
        .filter(|e| matches!(e, TrackEvent::Merge { .. }))
        .collect();
    let splits: Vec<&TrackEvent> = run
        .tracks
        .events()
        .iter()
        .filter(|e| matches!(e, TrackEvent::Split { .. }))
        .collect();
    assert_eq!(merges.len(), 1);
    assert_eq!(splits.len(), 1);

    let TrackEvent::Merge {
        frame: merge_frame,
        survivor,
        absorbed,
        ..
    } = merges[0]
    else {
        unreachable!()
    };
    assert_eq!(*survivor, TrackId(0));
    assert_eq!(absorbed, &vec![TrackId(1)]);

    let TrackEvent::Split {
        frame: split_frame,
        parent,
        children,
    } = splits[0]
    else {
        unreachable!()
    };
    assert_eq!(*parent, TrackId(0));
    assert_eq!(children.len(), 2);
    assert!(merge_frame < split_frame);

    assert_eq!(run.tracks.live().count(), 2);
    assert_eq!(
        run.tracks.get(TrackId(1)).unwrap().status(),
        TrackStatus::Terminated
    );
}

#[test]
fn noisy_single_source_keeps_one_identity() {
    init_test_tracing();
    let grid = Grid::from_spacing(64, 64, 1.0).unwrap();
    let mut scene = Scene::new(grid);
    scene
        .add(
            SourceSpec::gaussian(DVec2::new(10.0, 12.0), 1.0, 9.0).unwrap(),
            Motion::Path {
                waypoints: vec![DVec2::new(50.0, 40.0)],
                speed: 0.7,
                end: PathEnd::Stay,
            },
        )
        .unwrap();

    let noise = NoiseSpec::new(NoiseKind::Gaussian { std_dev: 0.01 }, 17).unwrap();
    let pipeline = Pipeline::new(PipelineConfig {
        frames: 30,
        noise: Some(noise),
        extractor: fieldtrack::ExtractorConfig::with_threshold(0.3),
        ..Default::default()
    })
    .unwrap();
    let run = pipeline.run(&mut scene, &None, &CancelToken::new()).unwrap();

    assert_eq!(run.tracks.len(), 1);
    let track = &run.tracks.tracks()[0];
    assert_eq!(track.status(), TrackStatus::Active);
    assert_eq!(track.features().len(), 30);
    assert_eq!(track.first_frame(), 0);
    assert_eq!(track.last_frame(), 29);
}

#[test]
fn generated_scenario_is_reproducible() {
    init_test_tracing();
    let mut config = ScenarioConfig::new(Grid::from_spacing(101, 101, 1.0).unwrap());
    config.scenario = Some(ScenarioParams::new(ScenarioKind::SeparatePaths, 4, 11));
    config.pipeline.frames = 20;
    config.pipeline.keep_fields = false;
    config.pipeline.noise = Some(NoiseSpec::new(NoiseKind::Gaussian { std_dev: 0.005 }, 3).unwrap());

    let run = |config: &ScenarioConfig| {
        let mut scene = config.build_scene().unwrap();
        config
            .build_pipeline()
            .unwrap()
            .run(&mut scene, &None, &CancelToken::new())
            .unwrap()
    };
    let a = run(&config);
    let b = run(&config);

    assert_eq!(a.tracks, b.tracks);
    assert!(!a.tracks.is_empty());
    for track in a.tracks.tracks() {
        let frames: Vec<usize> = track.features().iter().map(|f| f.frame).collect();
        assert!(frames.windows(2).all(|w| w[0] < w[1]), "{}", track.id());
    }
    assert!(a
        .tracks
        .events()
        .windows(2)
        .all(|w| w[0].frame() <= w[1].frame()));
}
