// End-to-end tests: JSONL session files on disk through the full pipeline.

use std::f64::consts::TAU;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use trackline::pipeline::{AnalysisDocument, RunParams, analyze_sessions};
use trackline::telemetry::{Sample, load_session, sessions_from_folder};
use trackline::writer::write_document;

/// Constant-speed circular run with a lap counter, written the way a
/// telemetry recorder would produce it.
fn circle_samples(points_per_lap: usize, laps: usize, radius: f64) -> Vec<Sample> {
    let total = points_per_lap * laps;
    (0..total)
        .map(|i| {
            let angle = (i % points_per_lap) as f64 / points_per_lap as f64 * TAU;
            Sample {
                time: i as f64 * 0.1,
                speed: TAU * radius / (points_per_lap as f64 * 0.1),
                pos_x: Some(radius * angle.cos()),
                pos_z: Some(radius * angle.sin()),
                lap_number: (i / points_per_lap) as i32 + 1,
                gear: 3,
                ..Default::default()
            }
        })
        .collect()
}

fn write_jsonl(path: &Path, samples: &[Sample]) {
    let mut writer = BufWriter::new(File::create(path).unwrap());
    for sample in samples {
        writeln!(writer, "{}", serde_json::to_string(sample).unwrap()).unwrap();
    }
    writer.flush().unwrap();
}

fn small_params() -> RunParams {
    RunParams {
        master_samples: 300,
        ..Default::default()
    }
}

#[test]
fn test_two_sessions_from_disk_to_document() {
    let dir = tempfile::tempdir().unwrap();
    write_jsonl(&dir.path().join("run_a.jsonl"), &circle_samples(400, 2, 100.));
    write_jsonl(&dir.path().join("run_b.jsonl"), &circle_samples(500, 2, 100.));

    let files = sessions_from_folder(dir.path());
    assert_eq!(files.len(), 2);

    let sessions = files
        .iter()
        .map(|p| load_session(p).unwrap())
        .collect::<Vec<_>>();
    let doc = analyze_sessions(sessions, &small_params()).unwrap();

    assert_eq!(doc.master.len(), 300);
    assert_eq!(doc.race_type.as_deref(), Some("lapped"));
    assert_eq!(doc.cars.len(), 2);
    assert_eq!(doc.cars[0].source, "run_a");
    assert_eq!(doc.cars[1].source, "run_b");
    assert_eq!(doc.cars[0].lap_times.len(), 2);
    assert!(!doc.heatmap.is_empty());

    // Master arc length stays monotonic and close to the circle circumference.
    let circumference = TAU * 100.;
    let master_len = doc.master.last().unwrap().rel_s;
    assert!((master_len - circumference).abs() / circumference < 0.05);
    for pair in doc.master.windows(2) {
        assert!(pair[1].rel_s > pair[0].rel_s);
    }

    for pair in doc.events.windows(2) {
        assert!(pair[0].time <= pair[1].time);
    }
}

#[test]
fn test_document_written_and_parsed_back() {
    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("session.jsonl");
    write_jsonl(&session_path, &circle_samples(400, 2, 80.));

    let session = load_session(&session_path).unwrap();
    let doc = analyze_sessions(vec![session], &small_params()).unwrap();

    let out_path = dir.path().join("analysis.json");
    write_document(&doc, Some(&out_path)).unwrap();

    let raw = std::fs::read_to_string(&out_path).unwrap();
    let back: AnalysisDocument = serde_json::from_str(&raw).unwrap();
    assert_eq!(back.master.len(), doc.master.len());
    assert_eq!(back.cars.len(), 1);
    assert_eq!(back.cars[0].points.len(), doc.cars[0].points.len());
    assert_eq!(back.race_type.as_deref(), Some("lapped"));
}

#[test]
fn test_sprint_session_without_lap_counter() {
    let dir = tempfile::tempdir().unwrap();
    let samples: Vec<Sample> = (0..400)
        .map(|i| Sample {
            time: i as f64 * 0.1,
            speed: 20.,
            pos_x: Some(i as f64 * 2.),
            pos_z: Some((i as f64 * 0.01).sin() * 10.),
            ..Default::default()
        })
        .collect();
    let path = dir.path().join("hillclimb.jsonl");
    write_jsonl(&path, &samples);

    let session = load_session(&path).unwrap();
    let doc = analyze_sessions(vec![session], &small_params()).unwrap();

    assert_eq!(doc.race_type.as_deref(), Some("sprint"));
    assert_eq!(doc.cars[0].race_type.as_deref(), Some("sprint"));
    assert_eq!(doc.master.len(), 300);
}

#[test]
fn test_corrupt_file_is_rejected_by_loader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jsonl");
    std::fs::write(&path, "this is not json\n").unwrap();
    assert!(load_session(&path).is_err());
}
