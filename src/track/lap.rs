use serde::{Deserialize, Serialize};

use crate::{
    telemetry::Sample,
    track::{Trackpoint, median},
};

/// Laps shorter than this fraction of the median lap length are pruned as
/// spurious start/finish re-crossings.
const SHORT_LAP_MEDIAN_FRACTION: f64 = 0.8;
/// Rough lap length (m) used to estimate a lap count from total distance.
const LAP_LENGTH_ESTIMATE: f64 = 50_000.0;
const MAX_ESTIMATED_LAPS: usize = 8;

/// Whether a session drove repeated laps of a circuit or a single
/// point-to-point pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Lapped,
    Sprint,
}

/// Tunables for lap-boundary detection.
#[derive(Clone, Debug)]
pub struct LapDetectionParams {
    /// Known lap count; detected laps beyond it are trimmed
    pub lap_count: Option<usize>,
    /// Expected lap length in meters, enables distance-threshold detection
    pub expected_lap_length: Option<f64>,
    /// Tolerance for lap length matching (m)
    pub tolerance: f64,
    /// Minimum distance between lap boundaries (m)
    pub min_lap_spacing: f64,
    /// Radius (m) around the start point that counts as a start/finish crossing
    pub start_finish_radius: f64,
}

impl Default for LapDetectionParams {
    fn default() -> Self {
        Self {
            lap_count: None,
            expected_lap_length: None,
            tolerance: 25.0,
            min_lap_spacing: 200.0,
            start_finish_radius: 10.0,
        }
    }
}

/// Partitions a reconstructed path into lap boundaries, trying each
/// detection strategy in priority order:
///
/// 1. the source's own lap counter (authoritative when present),
/// 2. proximity to the start point, with short-lap pruning,
/// 3. distance-threshold detection when an expected lap length is given,
/// 4. even spacing over an estimated or requested lap count.
///
/// Returns the boundary index set (start indices plus an end-exclusive final
/// entry equal to the point count) and the resulting run classification.
pub fn segment_session(
    samples: &[Sample],
    points: &[Trackpoint],
    params: &LapDetectionParams,
    force_sprint: bool,
) -> (RunKind, Vec<usize>) {
    let n = points.len();
    if force_sprint || n == 0 {
        return (RunKind::Sprint, vec![0, n]);
    }

    if let Some(boundaries) = boundaries_from_telemetry(samples) {
        return (RunKind::Lapped, boundaries);
    }

    let mut proximity = detect_laps_near_start(
        points,
        params.start_finish_radius,
        params.min_lap_spacing,
    );
    if proximity.len() > 2 {
        proximity = prune_short_laps(proximity, points, params.min_lap_spacing);
        if let Some(count) = params.lap_count
            && count > 0
            && proximity.len() - 1 > count
        {
            proximity.truncate(count);
            proximity.push(n);
        }
        return (RunKind::Lapped, proximity);
    }

    if let Some(expected) = params.expected_lap_length
        && expected > 0.
    {
        let min_spacing = params.min_lap_spacing.max(expected * 0.2);
        let by_distance = boundaries_by_distance(points, expected, params.tolerance, min_spacing);
        if by_distance.len() > 2 {
            return (RunKind::Lapped, by_distance);
        }
    }

    let total = points.last().map(|p| p.s).unwrap_or(0.);
    let count = derive_lap_count(total, params.lap_count);
    let even = even_lap_boundaries(points, count);
    let kind = if even.len() > 2 {
        RunKind::Lapped
    } else {
        RunKind::Sprint
    };
    (kind, even)
}

/// Boundaries taken directly from the source's incrementing lap counter.
/// Returns None when the counter never increments (or is unsupported).
pub fn boundaries_from_telemetry(samples: &[Sample]) -> Option<Vec<usize>> {
    if samples.is_empty() {
        return None;
    }
    let mut boundaries = vec![0];
    let mut last = samples[0].lap_number;
    for (i, sample) in samples.iter().enumerate().skip(1) {
        if sample.lap_number >= last + 1 {
            boundaries.push(i);
            last = sample.lap_number;
        }
    }
    if boundaries.len() < 2 {
        return None;
    }
    if *boundaries.last().unwrap() != samples.len() {
        boundaries.push(samples.len());
    }
    Some(boundaries)
}

/// Marks a boundary each time the path comes back within `radius` of the
/// start point after traveling at least `min_lap_distance` since the last
/// boundary.
pub fn detect_laps_near_start(
    points: &[Trackpoint],
    radius: f64,
    min_lap_distance: f64,
) -> Vec<usize> {
    if points.is_empty() {
        return Vec::new();
    }
    let radius = if radius > 0. { radius } else { 10. };
    let r2 = radius * radius;
    let (start_x, start_y) = (points[0].x, points[0].y);

    let mut boundaries = vec![0];
    let mut last_s = points[0].s;
    for (i, p) in points.iter().enumerate().skip(1) {
        let dx = p.x - start_x;
        let dy = p.y - start_y;
        if dx * dx + dy * dy <= r2 && p.s - last_s >= min_lap_distance {
            boundaries.push(i);
            last_s = p.s;
        }
    }
    if *boundaries.last().unwrap() != points.len() {
        boundaries.push(points.len());
    }
    boundaries
}

/// Marks a boundary whenever cumulative arc length since the last boundary
/// reaches `expected - tolerance`, subject to the minimum-spacing floor.
pub fn boundaries_by_distance(
    points: &[Trackpoint],
    expected: f64,
    tolerance: f64,
    min_lap_distance: f64,
) -> Vec<usize> {
    if points.len() < 2 {
        return Vec::new();
    }
    let mut boundaries = vec![0];
    let mut last_s = points[0].s;
    for (i, p) in points.iter().enumerate().skip(1) {
        let lap_dist = p.s - last_s;
        if lap_dist >= expected - tolerance && lap_dist >= min_lap_distance {
            boundaries.push(i);
            last_s = p.s;
        }
    }
    if *boundaries.last().unwrap() != points.len() {
        boundaries.push(points.len());
    }
    boundaries
}

/// Divides total arc length into `laps` equal slices.
pub fn even_lap_boundaries(points: &[Trackpoint], laps: usize) -> Vec<usize> {
    if laps < 1 || points.is_empty() {
        return vec![0, points.len()];
    }
    let total = points.last().map(|p| p.s).unwrap_or(0.);
    if total <= 0. {
        return vec![0, points.len()];
    }
    let lap_len = total / laps as f64;
    let mut target = lap_len;
    let mut boundaries = vec![0];
    for (i, p) in points.iter().enumerate() {
        if p.s >= target && boundaries.len() < laps && i > *boundaries.last().unwrap() {
            boundaries.push(i);
            target += lap_len;
        }
    }
    if *boundaries.last().unwrap() != points.len() {
        boundaries.push(points.len());
    }
    boundaries
}

/// Estimates a lap count from total distance when the caller does not know
/// it, clamped to a sane range.
pub fn derive_lap_count(total_dist: f64, preferred: Option<usize>) -> usize {
    if let Some(count) = preferred
        && count > 0
    {
        return count;
    }
    if total_dist <= 0. {
        return 1;
    }
    ((total_dist / LAP_LENGTH_ESTIMATE).round() as usize).clamp(1, MAX_ESTIMATED_LAPS)
}

/// Drops interior laps much shorter than the median lap length. The first and
/// last boundary always survive.
fn prune_short_laps(
    boundaries: Vec<usize>,
    points: &[Trackpoint],
    min_lap_spacing: f64,
) -> Vec<usize> {
    if boundaries.len() <= 2 {
        return boundaries;
    }

    let segment_length = |start: usize, end: usize| -> Option<f64> {
        let end = end.min(points.len());
        if end <= start {
            return None;
        }
        Some(points[end - 1].s - points[start].s)
    };

    let lengths: Vec<f64> = boundaries
        .windows(2)
        .filter_map(|w| segment_length(w[0], w[1]))
        .collect();
    if lengths.is_empty() {
        return boundaries;
    }
    let med = median(&lengths);

    let mut filtered = vec![boundaries[0]];
    for i in 1..boundaries.len() - 1 {
        if let Some(len) = segment_length(boundaries[i - 1], boundaries[i])
            && len >= med * SHORT_LAP_MEDIAN_FRACTION
            && len >= min_lap_spacing
        {
            filtered.push(boundaries[i]);
        }
    }
    filtered.push(*boundaries.last().unwrap());
    filtered
}

/// Returns the 1-based lap number and relative arc length for a point index.
pub fn lap_and_rel_s(
    boundaries: &[usize],
    points: &[Trackpoint],
    idx: usize,
) -> Option<(usize, f64)> {
    for lap_num in 1..boundaries.len() {
        let start = boundaries[lap_num - 1];
        let end = boundaries[lap_num];
        if idx >= start && idx < end {
            return Some((lap_num, points[idx].s - points[start].s));
        }
    }
    None
}
