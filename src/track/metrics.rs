use serde::{Deserialize, Serialize};

use crate::telemetry::Sample;
use crate::track::Trackpoint;

/// Per-lap timing summary, with the lap sliced into equal arc-length sectors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LapMetrics {
    /// 1-based lap number
    pub lap: usize,
    pub lap_time: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sector_times: Vec<f64>,
    /// Time lost to the session's best time in each sector, 0 for the best
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sector_deltas: Vec<f64>,
}

/// Slices every lap into `sectors` equal arc-length pieces and times each one.
///
/// Sector edges are found by a single forward walk over the lap's points, so
/// the whole computation is O(n) per lap. Degenerate laps (fewer than two
/// samples) report zero times rather than being dropped, keeping lap numbers
/// aligned with the boundary set.
pub fn compute_lap_metrics(
    samples: &[Sample],
    points: &[Trackpoint],
    boundaries: &[usize],
    sectors: usize,
) -> Vec<LapMetrics> {
    let sectors = sectors.max(1);
    let mut metrics = Vec::new();
    if boundaries.len() < 2 || points.len() != samples.len() {
        return metrics;
    }

    for (lap_num, window) in boundaries.windows(2).enumerate() {
        let (start, end) = (window[0], window[1].min(samples.len()));
        let mut m = LapMetrics {
            lap: lap_num + 1,
            ..Default::default()
        };
        if end < start + 2 {
            m.sector_times = vec![0.; sectors];
            metrics.push(m);
            continue;
        }

        let last = end - 1;
        m.lap_time = (samples[last].time - samples[start].time).max(0.);
        let start_s = points[start].s;
        let lap_len = points[last].s - start_s;

        let mut idx = start;
        for sector in 0..sectors {
            let seg_start = idx;
            let target = start_s + lap_len * (sector + 1) as f64 / sectors as f64;
            while idx < last && points[idx].s < target {
                idx += 1;
            }
            let t = samples[idx].time - samples[seg_start].time;
            m.sector_times.push(if t.is_finite() { t.max(0.) } else { 0. });
        }
        metrics.push(m);
    }

    let best = best_sector_times(&metrics, sectors);
    for m in &mut metrics {
        m.sector_deltas = m
            .sector_times
            .iter()
            .zip(&best)
            .map(|(&t, &b)| if b > 0. && t > 0. { t - b } else { 0. })
            .collect();
    }
    metrics
}

/// The minimum non-zero time recorded for each sector across all laps, 0 when
/// no lap produced a usable time for that sector.
pub fn best_sector_times(metrics: &[LapMetrics], sectors: usize) -> Vec<f64> {
    let mut best = vec![0.; sectors.max(1)];
    for m in metrics {
        for (slot, &t) in best.iter_mut().zip(&m.sector_times) {
            if t > 0. && (*slot == 0. || t < *slot) {
                *slot = t;
            }
        }
    }
    best
}

/// The time an ideal lap (best time in every sector) would need to reach
/// arc length `rel_s` into a lap of length `lap_len`. This is the baseline
/// the live delta is measured against.
pub fn expected_time_for_progress(best: &[f64], lap_len: f64, rel_s: f64) -> f64 {
    if best.is_empty() || lap_len <= 0. {
        return 0.;
    }
    let frac = (rel_s / lap_len).clamp(0., 1.) * best.len() as f64;
    let full = (frac.floor() as usize).min(best.len());
    let mut expected: f64 = best[..full].iter().sum();
    if full < best.len() {
        expected += best[full] * (frac - full as f64);
    }
    expected
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Straight-line run: 1 m per sample, 0.1 s per sample, two equal laps.
    fn straight_run(n: usize) -> (Vec<Sample>, Vec<Trackpoint>) {
        let samples = (0..n)
            .map(|i| Sample {
                time: i as f64 * 0.1,
                ..Default::default()
            })
            .collect();
        let points = (0..n)
            .map(|i| Trackpoint {
                s: i as f64,
                x: i as f64,
                y: 0.,
                theta: 0.,
            })
            .collect();
        (samples, points)
    }

    #[test]
    fn test_sector_times_sum_to_lap_time() {
        let (samples, points) = straight_run(301);
        let boundaries = vec![0, 301];
        let metrics = compute_lap_metrics(&samples, &points, &boundaries, 3);
        assert_eq!(metrics.len(), 1);
        let m = &metrics[0];
        assert_eq!(m.sector_times.len(), 3);
        assert!(m.sector_times.iter().all(|&t| t >= 0.));
        let total: f64 = m.sector_times.iter().sum();
        assert!((total - m.lap_time).abs() < 1e-9);
        // Constant speed means equal sectors and zero deltas.
        assert!(m.sector_deltas.iter().all(|&d| d.abs() < 1e-9));
    }

    #[test]
    fn test_deltas_measured_against_fastest_lap() {
        let n = 200;
        // Lap 1 at 0.1s per metre, lap 2 at 0.2s per metre.
        let mut samples: Vec<Sample> = (0..n)
            .map(|i| Sample {
                time: i as f64 * 0.1,
                ..Default::default()
            })
            .collect();
        let lap1_end_time = samples[99].time;
        for (j, s) in samples[100..].iter_mut().enumerate() {
            s.time = lap1_end_time + (j + 1) as f64 * 0.2;
        }
        let points: Vec<Trackpoint> = (0..n)
            .map(|i| Trackpoint {
                s: (i % 100) as f64 + (i / 100) as f64 * 100.,
                x: 0.,
                y: 0.,
                theta: 0.,
            })
            .collect();
        let boundaries = vec![0, 100, 200];
        let metrics = compute_lap_metrics(&samples, &points, &boundaries, 2);

        assert_eq!(metrics.len(), 2);
        assert!(metrics[0].lap_time < metrics[1].lap_time);
        assert!(metrics[0].sector_deltas.iter().all(|&d| d.abs() < 1e-9));
        assert!(metrics[1].sector_deltas.iter().all(|&d| d > 0.));
    }

    #[test]
    fn test_degenerate_lap_reports_zeros() {
        let (samples, points) = straight_run(10);
        let boundaries = vec![0, 9, 10];
        let metrics = compute_lap_metrics(&samples, &points, &boundaries, 3);
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[1].lap_time, 0.);
        assert!(metrics[1].sector_times.iter().all(|&t| t == 0.));
    }

    #[test]
    fn test_best_sector_times_skip_zeroes() {
        let metrics = vec![
            LapMetrics {
                lap: 1,
                lap_time: 30.,
                sector_times: vec![10., 0., 12.],
                sector_deltas: Vec::new(),
            },
            LapMetrics {
                lap: 2,
                lap_time: 31.,
                sector_times: vec![11., 9., 11.],
                sector_deltas: Vec::new(),
            },
        ];
        assert_eq!(best_sector_times(&metrics, 3), vec![10., 9., 11.]);
    }

    #[test]
    fn test_expected_time_interpolates_within_sector() {
        let best = vec![10., 20., 30.];
        let lap_len = 300.;
        assert!((expected_time_for_progress(&best, lap_len, 0.) - 0.).abs() < 1e-12);
        assert!((expected_time_for_progress(&best, lap_len, 100.) - 10.).abs() < 1e-12);
        assert!((expected_time_for_progress(&best, lap_len, 150.) - 20.).abs() < 1e-12);
        assert!((expected_time_for_progress(&best, lap_len, 300.) - 60.).abs() < 1e-12);
        // Overshoot clamps to the full ideal lap.
        assert!((expected_time_for_progress(&best, lap_len, 400.) - 60.).abs() < 1e-12);
    }
}
