pub(crate) mod events;
pub(crate) mod lap;
pub(crate) mod mapper;
pub(crate) mod master;
pub(crate) mod metrics;
pub(crate) mod overtake;
pub(crate) mod reconstruct;
pub(crate) mod surface;

pub use events::{Event, EventDetector, EventKind, EventThresholds};
pub use lap::{LapDetectionParams, RunKind, lap_and_rel_s, segment_session};
pub use mapper::{MappedPoint, MasterCursor, map_point, map_segment};
pub use master::{build_master_lap, build_master_path};
pub use metrics::{LapMetrics, best_sector_times, compute_lap_metrics, expected_time_for_progress};
pub use overtake::{Overtake, ProgressSample, detect_overtakes};
pub use reconstruct::reconstruct_path;
pub use surface::{SurfaceKind, classify_surface};

use serde::{Deserialize, Serialize};

/// A reconstructed geometric sample: cumulative arc length `s`, planar
/// position, and heading. Produced one-to-one from a session's samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trackpoint {
    pub s: f64,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

/// Replaces NaN/infinite values with a fallback so corrupt telemetry never
/// propagates through the integrators.
pub(crate) fn clean_float(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}

/// Rewrites `s` as the running sum of per-step Euclidean displacement,
/// starting from 0 at the first point.
pub(crate) fn recompute_arc_length(points: &[Trackpoint]) -> Vec<Trackpoint> {
    let mut out = points.to_vec();
    if let Some(first) = out.first_mut() {
        first.s = 0.;
    }
    for i in 1..out.len() {
        let dx = out[i].x - out[i - 1].x;
        let dy = out[i].y - out[i - 1].y;
        out[i].s = out[i - 1].s + dx.hypot(dy);
    }
    out
}

/// Subtracts a uniform linear share of the start-to-end drift from every
/// point so the segment closes on itself, then snaps the last point exactly
/// onto the first.
pub(crate) fn close_loop(points: &[Trackpoint]) -> Vec<Trackpoint> {
    let n = points.len();
    if n < 2 {
        return points.to_vec();
    }

    let dx = points[n - 1].x - points[0].x;
    let dy = points[n - 1].y - points[0].y;
    if dx == 0. && dy == 0. {
        return points.to_vec();
    }

    let mut out = points.to_vec();
    for (i, p) in out.iter_mut().enumerate() {
        let t = i as f64 / (n - 1) as f64;
        p.x -= t * dx;
        p.y -= t * dy;
    }
    out[n - 1].x = out[0].x;
    out[n - 1].y = out[0].y;
    out
}

pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_path() -> Vec<Trackpoint> {
        vec![
            Trackpoint { s: 0., x: 0., y: 0., theta: 0. },
            Trackpoint { s: 1., x: 1., y: 0., theta: 0. },
            Trackpoint { s: 2., x: 1., y: 1., theta: 0. },
            Trackpoint { s: 3., x: 0., y: 1., theta: 0. },
        ]
    }

    #[test]
    fn test_recompute_arc_length_is_monotonic() {
        let points = recompute_arc_length(&square_path());
        assert_eq!(points[0].s, 0.);
        for pair in points.windows(2) {
            assert!(pair[1].s >= pair[0].s);
        }
        assert!((points[3].s - 3.).abs() < 1e-12);
    }

    #[test]
    fn test_close_loop_snaps_endpoints() {
        let closed = close_loop(&square_path());
        assert_eq!(closed[0].x, closed[3].x);
        assert_eq!(closed[0].y, closed[3].y);
        // Drift is (0, 1); interior points move by a fraction of it.
        assert!((closed[1].y - (-1. / 3.)).abs() < 1e-12);
        assert!((closed[1].x - 1.).abs() < 1e-12);
    }

    #[test]
    fn test_close_loop_already_closed_is_identity() {
        let mut points = square_path();
        points.push(points[0]);
        let closed = close_loop(&points);
        assert_eq!(closed, points);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.);
        assert_eq!(median(&[3.]), 3.);
        assert_eq!(median(&[5., 1., 3.]), 3.);
        assert_eq!(median(&[4., 1., 3., 2.]), 2.5);
    }

    #[test]
    fn test_clean_float() {
        assert_eq!(clean_float(1.5, 0.), 1.5);
        assert_eq!(clean_float(f64::NAN, 2.), 2.);
        assert_eq!(clean_float(f64::INFINITY, -1.), -1.);
    }
}
