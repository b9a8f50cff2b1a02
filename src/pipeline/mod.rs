// Session analysis pipeline: reconstruct, segment, average, map, merge

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::mpsc;
use std::thread;

use serde::{Deserialize, Serialize};
use simple_moving_average::{SumTreeSMA, SMA};

use crate::errors::TracklineError;
use crate::telemetry::Sample;
use crate::track::{
    Event, EventDetector, EventKind, EventThresholds, LapDetectionParams, ProgressSample, RunKind,
    SurfaceKind, Trackpoint, best_sector_times, build_master_lap, build_master_path,
    classify_surface, compute_lap_metrics, detect_overtakes, expected_time_for_progress,
    lap_and_rel_s, map_point, map_segment, reconstruct_path, segment_session,
};

mod output;
pub use output::{AnalysisDocument, CarOutput, CarPoint, EventRecord, HeatPoint, MasterPoint};

const SUSPENSION_SMOOTHING_WINDOW: usize = 5;
const ACCEL_SCALE_PERCENTILE: f64 = 0.9;

/// One recorded session: a display name and its ordered samples.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionInput {
    pub source: String,
    pub samples: Vec<Sample>,
}

/// Tunables for a full analysis run.
#[derive(Clone, Debug)]
pub struct RunParams {
    /// Expected lap length in meters, enables distance-threshold detection
    pub expected_lap_length: Option<f64>,
    pub lap_tolerance: f64,
    /// Known lap count; overrides the estimate from total distance
    pub lap_count: Option<usize>,
    pub min_lap_spacing: f64,
    pub start_finish_radius: f64,
    /// Resampled points in the master geometry
    pub master_samples: usize,
    /// Treat every session as a single point-to-point pass
    pub force_sprint: bool,
    /// Sectors per lap for timing metrics
    pub sectors: usize,
    pub event_thresholds: EventThresholds,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            expected_lap_length: None,
            lap_tolerance: 25.0,
            lap_count: None,
            min_lap_spacing: 200.0,
            start_finish_radius: 10.0,
            master_samples: 4000,
            force_sprint: false,
            sectors: 3,
            event_thresholds: EventThresholds::default(),
        }
    }
}

struct SessionAnalysis {
    source: String,
    samples: Vec<Sample>,
    points: Vec<Trackpoint>,
    events: Vec<Event>,
    kind: RunKind,
    boundaries: Vec<usize>,
}

/// Runs the whole pipeline over a set of sessions and produces the merged
/// analysis document.
///
/// Phase 1 reconstructs, segments, and scans each session in parallel;
/// sessions that fail are logged and skipped. Phase 2 averages all usable
/// laps into the master geometry. Phase 3 maps each session onto the master
/// in parallel, then merges the per-session partials in input order so the
/// output is deterministic.
pub fn analyze_sessions(
    sessions: Vec<SessionInput>,
    params: &RunParams,
) -> Result<AnalysisDocument, TracklineError> {
    let analyses = analyze_parallel(sessions, params);
    if analyses.is_empty() {
        return Err(TracklineError::NoUsableSessions);
    }

    let detected_sprint = analyses.iter().any(|a| a.kind == RunKind::Sprint);
    let effective_sprint = params.force_sprint || detected_sprint;

    // Concatenate every usable lap; the averaging step rebases each lap's
    // arc length, so per-session offsets do not matter here.
    let mut all_points: Vec<Trackpoint> = Vec::new();
    let mut all_boundaries = vec![0usize];
    for analysis in &analyses {
        for window in analysis.boundaries.windows(2) {
            all_points.extend_from_slice(&analysis.points[window[0]..window[1]]);
            all_boundaries.push(all_points.len());
            // A sprint session contributes a single pass.
            if effective_sprint || analysis.kind == RunKind::Sprint {
                break;
            }
        }
    }

    let master = if effective_sprint {
        build_master_path(&all_points, params.master_samples)
    } else {
        build_master_lap(&all_points, &all_boundaries, params.master_samples)
    }
    .ok_or(TracklineError::MasterUnavailable)?;
    log::info!(
        "master geometry: {} points from {} laps",
        master.len(),
        all_boundaries.len() - 1
    );

    let master_ref: &[Trackpoint] = &master;
    let partials: Vec<Partial> = thread::scope(|scope| {
        let handles: Vec<_> = analyses
            .iter()
            .map(|analysis| scope.spawn(move || session_partial(analysis, master_ref, params)))
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(partial) => partial,
                Err(payload) => std::panic::resume_unwind(payload),
            })
            .collect()
    });

    Ok(merge_partials(&master, partials))
}

/// Phase 1 fan-out: one worker per session, results collected by input index
/// so downstream ordering never depends on thread scheduling.
fn analyze_parallel(sessions: Vec<SessionInput>, params: &RunParams) -> Vec<SessionAnalysis> {
    let count = sessions.len();
    let (tx, rx) = mpsc::channel();
    thread::scope(|scope| {
        for (idx, session) in sessions.into_iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move || {
                let source = session.source.clone();
                let result = analyze_one(session, params).map_err(|err| (source, err));
                let _ = tx.send((idx, result));
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<SessionAnalysis>> = (0..count).map(|_| None).collect();
    for (idx, result) in rx {
        match result {
            Ok(analysis) => slots[idx] = Some(analysis),
            Err((source, err)) => log::warn!("skipping session {source}: {err}"),
        }
    }
    slots.into_iter().flatten().collect()
}

fn analyze_one(
    session: SessionInput,
    params: &RunParams,
) -> Result<SessionAnalysis, TracklineError> {
    let SessionInput { source, samples } = session;
    let points = reconstruct_path(&samples)?;
    let events = EventDetector::new(params.event_thresholds.clone()).detect(&samples);

    let lap_params = LapDetectionParams {
        lap_count: params.lap_count,
        expected_lap_length: params.expected_lap_length,
        tolerance: params.lap_tolerance,
        min_lap_spacing: params.min_lap_spacing,
        start_finish_radius: params.start_finish_radius,
    };
    let (kind, boundaries) = segment_session(&samples, &points, &lap_params, params.force_sprint);
    if boundaries.len() < 2 {
        return Err(TracklineError::NoLapsDetected {
            source_name: source,
        });
    }

    let dist = points.last().map(|p| p.s).unwrap_or(0.);
    let duration = samples.last().map(|s| s.time).unwrap_or(0.)
        - samples.first().map(|s| s.time).unwrap_or(0.);
    log::info!(
        "session {source}: laps={} dist={dist:.1}m time={duration:.1}s events={}",
        boundaries.len() - 1,
        events.len()
    );

    Ok(SessionAnalysis {
        source,
        samples,
        points,
        events,
        kind,
        boundaries,
    })
}

/// Per-session output produced by a phase 3 worker, merged later.
struct Partial {
    car: CarOutput,
    events: Vec<EventRecord>,
    mapped: Vec<ProgressSample>,
    count_speed: Vec<usize>,
    sum_accel: Vec<f64>,
    count_accel: Vec<usize>,
    surface_counts: Vec<[usize; 4]>,
    lapped: bool,
    sprint: bool,
}

fn session_partial(
    analysis: &SessionAnalysis,
    master: &[Trackpoint],
    params: &RunParams,
) -> Partial {
    let samples = &analysis.samples;
    let points = &analysis.points;
    let n = samples.len();
    let master_len = master.last().map(|p| p.s).unwrap_or(0.);
    let start_time = samples.first().map(|s| s.time).unwrap_or(0.);

    let surface_labels = classify_surface(samples);
    let (long_acc, lat_acc, yaw_rate) = derive_dynamics(samples, points);
    let (scale_pos, scale_neg) = accel_scales(&long_acc);

    let susp = [
        smooth_series(samples.iter().map(|s| s.susp_travel_fl)),
        smooth_series(samples.iter().map(|s| s.susp_travel_fr)),
        smooth_series(samples.iter().map(|s| s.susp_travel_rl)),
        smooth_series(samples.iter().map(|s| s.susp_travel_rr)),
    ];

    let lap_times = compute_lap_metrics(samples, points, &analysis.boundaries, params.sectors);
    let best_sectors = best_sector_times(&lap_times, params.sectors);

    let mut partial = Partial {
        car: CarOutput {
            source: analysis.source.clone(),
            points: Vec::with_capacity(n),
            lap_times,
            race_type: Some(race_type_name(analysis.kind).to_string()),
        },
        events: Vec::new(),
        mapped: Vec::with_capacity(n),
        count_speed: vec![0; master.len()],
        sum_accel: vec![0.; master.len()],
        count_accel: vec![0; master.len()],
        surface_counts: vec![[0; 4]; master.len()],
        lapped: analysis.kind == RunKind::Lapped,
        sprint: analysis.kind == RunKind::Sprint,
    };

    let mut last_surface: Option<SurfaceKind> = None;
    let mut lap_delta_offset: HashMap<usize, f64> = HashMap::new();

    for lap_num in 1..analysis.boundaries.len() {
        let start = analysis.boundaries[lap_num - 1];
        let end = analysis.boundaries[lap_num].min(points.len()).min(n);
        if start >= end {
            continue;
        }
        let segment = &points[start..end];
        let lap_len = {
            let span = segment[segment.len() - 1].s - segment[0].s;
            if span > 0. { span } else { segment[segment.len() - 1].s }
        };
        let lap_start_time = (samples[start].time - start_time).max(0.);
        let scale_s = if lap_len > 0. && master_len > 0. {
            master_len / lap_len
        } else {
            1.
        };

        map_segment(segment, master, start, scale_s, |idx, rel_s, _p, m| {
            let sample = &samples[idx];
            let t = (sample.time - start_time).max(0.);

            // The heatmap accel prefers the speed delta; telemetry
            // longitudinal accel is the fallback.
            let mut accel = 0.;
            if idx > 0 {
                let dt = sample.time - samples[idx - 1].time;
                if dt > 0. {
                    accel = (sample.speed - samples[idx - 1].speed) / dt;
                }
            }
            if accel == 0. {
                accel = long_acc[idx];
            }

            let speed_mph = if sample.speed_mph != 0. {
                sample.speed_mph
            } else {
                sample.speed * 2.23694
            };
            let speed_kmh = if sample.speed_kmh != 0. {
                sample.speed_kmh
            } else {
                speed_mph * 1.60934
            };

            let mi = m.master_index;
            partial.count_speed[mi] += 1;
            if accel != 0. {
                partial.sum_accel[mi] += accel;
                partial.count_accel[mi] += 1;
            }
            partial.surface_counts[mi][surface_labels[idx] as usize] += 1;

            // Delta against the ideal lap, re-zeroed at each lap's first
            // mapped point so it reads as time gained or lost within the lap.
            let elapsed_lap = t - lap_start_time;
            let expected = expected_time_for_progress(&best_sectors, master_len, rel_s);
            let mut delta = elapsed_lap - expected;
            let offset = *lap_delta_offset.entry(lap_num).or_insert(delta);
            delta -= offset;

            let mut throttle = clamp01(long_acc[idx] / scale_pos);
            let mut brake = clamp01(-long_acc[idx] / scale_neg);
            if long_acc[idx] >= 0. {
                brake = 0.;
            }
            let mut throttle_input = 0.;
            let mut brake_input = 0.;
            if sample.throttle_raw.is_some() || sample.brake_raw.is_some() {
                throttle_input = clamp01(sample.throttle_raw.unwrap_or(0) as f64 / 255.);
                brake_input = clamp01(sample.brake_raw.unwrap_or(0) as f64 / 255.);
                throttle = throttle_input;
                brake = brake_input;
            }
            let mut steer_input = 0.;
            let mut steer_deg = 0.;
            if let Some(raw) = sample.steer_raw {
                steer_input = clamp_sym(raw as f64 / 127.);
                steer_deg = raw as f64;
            }

            partial.car.points.push(CarPoint {
                time: t,
                lap: lap_num,
                rel_s,
                heading: points[idx].theta,
                master_x: m.master_x,
                master_y: m.master_y,
                speed_mph,
                speed_kmh,
                gear: sample.gear,
                delta,
                long_acc: long_acc[idx],
                lat_acc: lat_acc[idx],
                yaw_rate: yaw_rate[idx],
                yaw_deg_s: yaw_rate[idx] * 180. / PI,
                throttle,
                brake,
                steer_deg,
                throttle_input,
                brake_input,
                steer_input,
                susp_fl: susp[0][idx],
                susp_fr: susp[1][idx],
                susp_rl: susp[2][idx],
                susp_rr: susp[3][idx],
                tire_temp_fl: to_celsius(sample.tire_temp_fl),
                tire_temp_fr: to_celsius(sample.tire_temp_fr),
                tire_temp_rl: to_celsius(sample.tire_temp_rl),
                tire_temp_rr: to_celsius(sample.tire_temp_rr),
            });

            let current = surface_labels[idx];
            if last_surface != Some(current) {
                partial.events.push(EventRecord {
                    kind: EventKind::Surface,
                    source: analysis.source.clone(),
                    target: String::new(),
                    index: idx,
                    time: t,
                    note: format!("surface change {}", current.as_str()),
                    lap: Some(lap_num),
                    rel_s: Some(rel_s),
                    master_idx: None,
                    master_rel_s: None,
                    master_x: Some(m.master_x),
                    master_y: Some(m.master_y),
                    distance_sq: None,
                });
                last_surface = Some(current);
            }

            partial.mapped.push(ProgressSample {
                time: t,
                lap: lap_num,
                rel_s,
                master_x: m.master_x,
                master_y: m.master_y,
            });
        });
    }

    for ev in &analysis.events {
        if ev.index >= points.len() {
            continue;
        }
        let mut record = EventRecord {
            kind: ev.kind,
            source: analysis.source.clone(),
            target: String::new(),
            index: ev.index,
            time: (ev.time - start_time).max(0.),
            note: ev.note.clone(),
            lap: None,
            rel_s: None,
            master_idx: None,
            master_rel_s: None,
            master_x: None,
            master_y: None,
            distance_sq: None,
        };
        if let Some((lap, rel_s)) = lap_and_rel_s(&analysis.boundaries, points, ev.index) {
            let p = points[ev.index];
            if let Some(m) = map_point(master, rel_s, p.x, p.y) {
                record.lap = Some(lap);
                record.rel_s = Some(rel_s);
                record.master_idx = Some(m.master_index);
                record.master_rel_s = Some(m.master_s);
                record.master_x = Some(m.master_x);
                record.master_y = Some(m.master_y);
                record.distance_sq = Some(m.distance_sq);
            }
        }
        partial.events.push(record);
    }

    partial
}

fn merge_partials(master: &[Trackpoint], partials: Vec<Partial>) -> AnalysisDocument {
    let m = master.len();
    let mut doc = AnalysisDocument {
        master: master
            .iter()
            .map(|p| MasterPoint {
                rel_s: p.s,
                x: p.x,
                y: p.y,
                surface: None,
            })
            .collect(),
        ..Default::default()
    };

    let mut count_speed = vec![0usize; m];
    let mut sum_accel = vec![0.; m];
    let mut count_accel = vec![0usize; m];
    let mut surface_counts = vec![[0usize; 4]; m];
    let mut mapped: HashMap<String, Vec<ProgressSample>> = HashMap::new();
    let (mut lapped_count, mut sprint_count) = (0usize, 0usize);

    for partial in partials {
        doc.events.extend(partial.events);
        if !partial.mapped.is_empty() {
            mapped
                .entry(partial.car.source.clone())
                .or_default()
                .extend(partial.mapped);
        }
        for i in 0..m {
            count_speed[i] += partial.count_speed[i];
            sum_accel[i] += partial.sum_accel[i];
            count_accel[i] += partial.count_accel[i];
            for k in 0..4 {
                surface_counts[i][k] += partial.surface_counts[i][k];
            }
        }
        lapped_count += partial.lapped as usize;
        sprint_count += partial.sprint as usize;
        doc.cars.push(partial.car);
    }

    if mapped.len() > 1 {
        for ov in detect_overtakes(&mapped) {
            let note = format!("{} passed {}", ov.source, ov.target);
            doc.events.push(EventRecord {
                kind: EventKind::Overtake,
                source: ov.source,
                target: ov.target,
                index: 0,
                time: ov.time,
                note,
                lap: Some(ov.lap),
                rel_s: Some(ov.rel_s),
                master_idx: None,
                master_rel_s: None,
                master_x: Some(ov.master_x),
                master_y: Some(ov.master_y),
                distance_sq: None,
            });
        }
    }
    doc.events.sort_by(|a, b| a.time.total_cmp(&b.time));

    doc.race_type = if lapped_count > 0 {
        Some("lapped".to_string())
    } else if sprint_count > 0 {
        Some("sprint".to_string())
    } else {
        None
    };

    for i in 0..m {
        if count_speed[i] == 0 {
            continue;
        }
        let surface = dominant_surface(&surface_counts[i]);
        let avg_accel = if count_accel[i] == 0 {
            0.
        } else {
            sum_accel[i] / count_accel[i] as f64
        };
        doc.heatmap.push(HeatPoint {
            index: i,
            rel_s: master[i].s,
            x: master[i].x,
            y: master[i].y,
            avg_accel,
            surface,
        });
        doc.master[i].surface = surface;
    }

    doc
}

/// Longitudinal accel, lateral accel, and yaw rate per sample. Direct
/// telemetry channels win; otherwise they are derived from speed deltas,
/// heading deltas, and the reported yaw angle.
fn derive_dynamics(samples: &[Sample], points: &[Trackpoint]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = samples.len();
    let mut long_acc = vec![0.; n];
    let mut lat_acc = vec![0.; n];
    let mut yaw_rate = vec![0.; n];

    let mut use_direct_acc = false;
    for (i, s) in samples.iter().enumerate() {
        long_acc[i] = s.accel_x;
        lat_acc[i] = s.accel_y;
        if s.accel_x != 0. {
            use_direct_acc = true;
        }
    }

    let mut use_direct_yaw = false;
    for i in 1..n {
        if let (Some(y0), Some(y1)) = (samples[i - 1].yaw, samples[i].yaw) {
            let dt = samples[i].time - samples[i - 1].time;
            if dt > 0. {
                yaw_rate[i] = wrap_angle(y1 - y0) / dt;
                use_direct_yaw = true;
            }
        }
    }

    if !use_direct_acc {
        for i in 1..n {
            let dt = samples[i].time - samples[i - 1].time;
            if dt <= 0. {
                continue;
            }
            long_acc[i] = (samples[i].speed - samples[i - 1].speed) / dt;
        }
    }
    if !use_direct_yaw {
        for i in 1..n.min(points.len()) {
            let dt = samples[i].time - samples[i - 1].time;
            if dt <= 0. {
                continue;
            }
            yaw_rate[i] = wrap_angle(points[i].theta - points[i - 1].theta) / dt;
            if lat_acc[i] == 0. {
                lat_acc[i] = samples[i].speed * yaw_rate[i];
            }
        }
    }

    (long_acc, lat_acc, yaw_rate)
}

/// Normalization scales for pseudo throttle and brake, taken from the 90th
/// percentile of accelerations so a single outlier spike does not flatten
/// the whole trace.
fn accel_scales(long_acc: &[f64]) -> (f64, f64) {
    let mut pos = Vec::new();
    let mut neg = Vec::new();
    let (mut max_pos, mut max_neg) = (0., 0.);
    for &v in long_acc {
        if v > 0. {
            pos.push(v);
            if v > max_pos {
                max_pos = v;
            }
        } else if v < 0. {
            neg.push(-v);
            if v < max_neg {
                max_neg = v;
            }
        }
    }
    let mut scale_pos = percentile(&pos, ACCEL_SCALE_PERCENTILE);
    if scale_pos <= 0. {
        scale_pos = max_pos;
    }
    if scale_pos <= 0. {
        scale_pos = 1.;
    }
    let mut scale_neg = percentile(&neg, ACCEL_SCALE_PERCENTILE);
    if scale_neg <= 0. {
        scale_neg = -max_neg;
    }
    if scale_neg <= 0. {
        scale_neg = scale_pos;
    }
    (scale_pos, scale_neg)
}

fn dominant_surface(counts: &[usize; 4]) -> Option<SurfaceKind> {
    const ORDER: [SurfaceKind; 4] = [
        SurfaceKind::Tarmac,
        SurfaceKind::Rumble,
        SurfaceKind::Puddle,
        SurfaceKind::Dirt,
    ];
    let mut best = None;
    let mut best_count = 0;
    for kind in ORDER {
        let count = counts[kind as usize];
        if count > best_count {
            best_count = count;
            best = Some(kind);
        }
    }
    best
}

fn race_type_name(kind: RunKind) -> &'static str {
    match kind {
        RunKind::Lapped => "lapped",
        RunKind::Sprint => "sprint",
    }
}

fn smooth_series(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut sma = SumTreeSMA::<f64, f64, SUSPENSION_SMOOTHING_WINDOW>::new();
    values
        .map(|v| {
            sma.add_sample(v);
            sma.get_average()
        })
        .collect()
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = p.clamp(0., 1.) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if hi <= lo {
        return sorted[lo];
    }
    let alpha = idx - lo as f64;
    sorted[lo] * (1. - alpha) + sorted[hi] * alpha
}

fn wrap_angle(mut dh: f64) -> f64 {
    while dh > PI {
        dh -= 2. * PI;
    }
    while dh < -PI {
        dh += 2. * PI;
    }
    dh
}

fn clamp01(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0., 1.) } else { 0. }
}

fn clamp_sym(v: f64) -> f64 {
    if v.is_finite() { v.clamp(-1., 1.) } else { 0. }
}

fn to_celsius(temp_f: f64) -> f64 {
    (temp_f - 32.0) * 5.0 / 9.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    /// Constant-speed circular run with positions, `laps` full circuits of
    /// `n` samples each, lap counter included.
    fn circle_session(name: &str, n: usize, laps: usize) -> SessionInput {
        let radius = 100.;
        let total = n * laps;
        let samples = (0..total)
            .map(|i| {
                let angle = (i % n) as f64 / n as f64 * TAU;
                Sample {
                    time: i as f64 * 0.1,
                    speed: TAU * radius / (n as f64 * 0.1),
                    pos_x: Some(radius * angle.cos()),
                    pos_z: Some(radius * angle.sin()),
                    lap_number: (i / n) as i32 + 1,
                    ..Default::default()
                }
            })
            .collect();
        SessionInput {
            source: name.to_string(),
            samples,
        }
    }

    fn small_params() -> RunParams {
        RunParams {
            master_samples: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_lapped_run_produces_master_and_metrics() {
        let session = circle_session("run1", 400, 2);
        let total = session.samples.len();
        let doc = analyze_sessions(vec![session], &small_params()).unwrap();

        assert_eq!(doc.master.len(), 200);
        assert_eq!(doc.race_type.as_deref(), Some("lapped"));
        assert_eq!(doc.cars.len(), 1);
        assert_eq!(doc.cars[0].points.len(), total);
        assert_eq!(doc.cars[0].lap_times.len(), 2);
        assert!(!doc.heatmap.is_empty());
        // Mapped arc lengths stay within the master range.
        let master_len = doc.master.last().unwrap().rel_s;
        assert!(
            doc.cars[0]
                .points
                .iter()
                .all(|p| p.rel_s >= 0. && p.rel_s <= master_len + 1e-6)
        );
    }

    #[test]
    fn test_events_sorted_by_time() {
        let doc = analyze_sessions(
            vec![circle_session("a", 300, 2), circle_session("b", 300, 2)],
            &small_params(),
        )
        .unwrap();
        for pair in doc.events.windows(2) {
            assert!(pair[0].time <= pair[1].time);
        }
    }

    #[test]
    fn test_straight_run_classified_as_sprint() {
        let samples = (0..300)
            .map(|i| Sample {
                time: i as f64 * 0.1,
                speed: 10.,
                pos_x: Some(i as f64),
                pos_z: Some(0.),
                ..Default::default()
            })
            .collect();
        let session = SessionInput {
            source: "dash".to_string(),
            samples,
        };
        let doc = analyze_sessions(vec![session], &small_params()).unwrap();
        assert_eq!(doc.race_type.as_deref(), Some("sprint"));
        assert_eq!(doc.cars[0].race_type.as_deref(), Some("sprint"));
    }

    #[test]
    fn test_unusable_sessions_are_rejected() {
        let short = SessionInput {
            source: "stub".to_string(),
            samples: vec![Sample::default()],
        };
        let err = analyze_sessions(vec![short], &RunParams::default()).unwrap_err();
        assert!(matches!(err, TracklineError::NoUsableSessions));
    }

    #[test]
    fn test_failed_session_skipped_but_run_continues() {
        let good = circle_session("good", 300, 2);
        let bad = SessionInput {
            source: "bad".to_string(),
            samples: Vec::new(),
        };
        let doc = analyze_sessions(vec![bad, good], &small_params()).unwrap();
        assert_eq!(doc.cars.len(), 1);
        assert_eq!(doc.cars[0].source, "good");
    }

    #[test]
    fn test_delta_starts_at_zero_each_lap() {
        let doc = analyze_sessions(vec![circle_session("run1", 400, 3)], &small_params()).unwrap();
        let points = &doc.cars[0].points;
        for lap in 1..=3 {
            let first = points.iter().find(|p| p.lap == lap).unwrap();
            assert!(first.delta.abs() < 1e-9);
        }
    }

    #[test]
    fn test_percentile_interpolates() {
        let vals = vec![1., 2., 3., 4., 5.];
        assert!((percentile(&vals, 0.) - 1.).abs() < 1e-12);
        assert!((percentile(&vals, 1.) - 5.).abs() < 1e-12);
        assert!((percentile(&vals, 0.5) - 3.).abs() < 1e-12);
        assert!((percentile(&vals, 0.9) - 4.6).abs() < 1e-9);
        assert_eq!(percentile(&[], 0.5), 0.);
    }
}
