use std::collections::HashMap;

use itertools::Itertools;

/// A session sample already re-expressed in the shared master basis, the
/// input to cross-session comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProgressSample {
    pub time: f64,
    /// 1-based lap number
    pub lap: usize,
    /// Arc length from the start of the current lap
    pub rel_s: f64,
    pub master_x: f64,
    pub master_y: f64,
}

/// A rank-order flip between two sessions: `source` just moved ahead of
/// `target`.
#[derive(Clone, Debug, PartialEq)]
pub struct Overtake {
    pub source: String,
    pub target: String,
    pub time: f64,
    pub lap: usize,
    pub rel_s: f64,
    pub master_x: f64,
    pub master_y: f64,
}

/// Compares every unordered pair of sessions' progress-over-time curves and
/// emits an overtake whenever the sign of the progress difference flips.
pub fn detect_overtakes(mapped: &HashMap<String, Vec<ProgressSample>>) -> Vec<Overtake> {
    let mut events = Vec::new();
    // Sorted keys keep the output deterministic across runs.
    for pair in mapped.keys().sorted().combinations(2) {
        let (a_name, b_name) = (pair[0], pair[1]);
        events.extend(detect_pair(a_name, b_name, &mapped[a_name], &mapped[b_name]));
    }
    events
}

fn detect_pair(
    a_name: &str,
    b_name: &str,
    a_pts: &[ProgressSample],
    b_pts: &[ProgressSample],
) -> Vec<Overtake> {
    let mut out = Vec::new();
    if a_pts.is_empty() || b_pts.is_empty() {
        return out;
    }

    let lap_lengths_a = observed_lap_lengths(a_pts);
    let lap_lengths_b = observed_lap_lengths(b_pts);
    let max_t = a_pts[a_pts.len() - 1]
        .time
        .min(b_pts[b_pts.len() - 1].time);

    // Time-ordered two-pointer merge: always advance whichever side has the
    // earlier next timestamp, interpolating the other side's progress.
    let (mut ia, mut ib) = (0usize, 0usize);
    let mut prev_ahead = 0i8;
    while ia < a_pts.len() && ib < b_pts.len() {
        let t = a_pts[ia].time.min(b_pts[ib].time);
        if t > max_t {
            break;
        }
        let pa = point_at_time(a_pts, t);
        let pb = point_at_time(b_pts, t);
        let prog_a = progress(&pa, &lap_lengths_a);
        let prog_b = progress(&pb, &lap_lengths_b);

        let ahead: i8 = if prog_a > prog_b {
            1
        } else if prog_b > prog_a {
            -1
        } else {
            0
        };
        if prev_ahead != 0 && ahead != 0 && ahead != prev_ahead {
            let (winner, loser, p) = if ahead > 0 {
                (a_name, b_name, pa)
            } else {
                (b_name, a_name, pb)
            };
            out.push(Overtake {
                source: winner.to_string(),
                target: loser.to_string(),
                time: t,
                lap: p.lap,
                rel_s: p.rel_s,
                master_x: p.master_x,
                master_y: p.master_y,
            });
        }
        prev_ahead = ahead;

        if ia + 1 < a_pts.len() && (ib + 1 >= b_pts.len() || a_pts[ia + 1].time <= b_pts[ib + 1].time)
        {
            ia += 1;
        } else {
            ib += 1;
        }
    }
    out
}

/// Progress = completed laps plus fractional completion of the current lap,
/// comparable across sessions regardless of absolute lap count.
fn progress(p: &ProgressSample, lap_lengths: &HashMap<usize, f64>) -> f64 {
    let lap_len = match lap_lengths.get(&p.lap) {
        Some(&len) if len > 0. => len,
        _ => 1.,
    };
    (p.lap.saturating_sub(1)) as f64 + p.rel_s / lap_len
}

/// The longest relative arc length seen per lap in the mapped stream.
fn observed_lap_lengths(points: &[ProgressSample]) -> HashMap<usize, f64> {
    let mut lengths: HashMap<usize, f64> = HashMap::new();
    for p in points {
        let entry = lengths.entry(p.lap).or_insert(0.);
        if p.rel_s > *entry {
            *entry = p.rel_s;
        }
    }
    lengths
}

/// Interpolates the progress sample at time `t` by binary search.
fn point_at_time(points: &[ProgressSample], t: f64) -> ProgressSample {
    if t <= points[0].time {
        return points[0];
    }
    let last = points[points.len() - 1];
    if t >= last.time {
        return last;
    }
    let (mut lo, mut hi) = (0usize, points.len() - 1);
    while hi - lo > 1 {
        let mid = (hi + lo) >> 1;
        if points[mid].time <= t {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let p1 = points[lo];
    let p2 = points[hi];
    let span = p2.time - p1.time;
    if span <= 0. {
        return p1;
    }
    let alpha = (t - p1.time) / span;
    ProgressSample {
        time: t,
        lap: p1.lap,
        rel_s: p1.rel_s + (p2.rel_s - p1.rel_s) * alpha,
        master_x: p1.master_x + (p2.master_x - p1.master_x) * alpha,
        master_y: p1.master_y + (p2.master_y - p1.master_y) * alpha,
    }
}
