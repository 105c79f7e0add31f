//! Files written for a run can be read back by standard tools.

use std::fs;
use std::path::PathBuf;

use fieldtrack::export::{
    save_events_json, save_field_json, save_track_csv, FieldDocument, TrackRecord,
};
use fieldtrack::{CancelToken, ScenarioConfig, TrackEvent};

const SCENARIO: &str = r#"{
    "grid": { "width": 41, "height": 41,
              "bounds": { "min": [0.0, 0.0], "max": [40.0, 40.0] } },
    "frames": 8,
    "extractor": { "threshold": 0.2 },
    "sources": [
        { "source": { "shape": { "kind": "gaussian" }, "center": [10.0, 10.0],
                      "amplitude": 1.0, "spread": { "type": "isotropic", "variance": 4.0 } },
          "motion": { "type": "path", "waypoints": [[30.0, 10.0]], "speed": 1.0 } },
        { "source": { "shape": { "kind": "cauchy" }, "center": [20.0, 30.0],
                      "amplitude": 0.6, "spread": { "type": "isotropic", "variance": 2.0 } } }
    ]
}"#;

fn output_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fieldtrack-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn scenario_run_exports_tracks_events_and_fields() {
    let dir = output_dir("export");
    let scenario_path = dir.join("scenario.json");
    fs::write(&scenario_path, SCENARIO).unwrap();

    let config = ScenarioConfig::load(&scenario_path).unwrap();
    let mut scene = config.build_scene().unwrap();
    let run = config
        .build_pipeline()
        .unwrap()
        .run(&mut scene, &None, &CancelToken::new())
        .unwrap();
    assert_eq!(run.tracks.len(), 2);

    let csv_path = dir.join("tracks.csv");
    save_track_csv(&csv_path, &run.tracks).unwrap();
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let rows: Vec<TrackRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 16);
    assert!(rows[..8].iter().all(|r| r.id == 0));
    assert_eq!(rows[7].frame, 7);
    assert!((rows[7].x - 17.0).abs() < 0.01);

    let events_path = dir.join("events.json");
    save_events_json(&events_path, run.tracks.events()).unwrap();
    let events: Vec<TrackEvent> =
        serde_json::from_str(&fs::read_to_string(&events_path).unwrap()).unwrap();
    assert_eq!(events, run.tracks.events());

    let field = run.frames[0].clean.as_ref().unwrap();
    let field_path = dir.join("frame0.json");
    save_field_json(&field_path, field).unwrap();
    let doc: FieldDocument =
        serde_json::from_str(&fs::read_to_string(&field_path).unwrap()).unwrap();
    assert_eq!(doc.values.len(), 41 * 41);
    assert!(doc.into_field().unwrap().max_abs_difference(field) < 1e-12);

    fs::remove_dir_all(&dir).unwrap();
}
