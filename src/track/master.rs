use crate::track::{Trackpoint, close_loop, recompute_arc_length};

/// Builds the canonical master lap from aggregated lap segments: each lap is
/// closed, resampled to `samples` points evenly spaced by arc length, aligned
/// to the first lap by a closed-form similarity fit, and averaged point by
/// point. Master arc length is taken from the reference lap.
///
/// Returns None when there are fewer than 2 boundaries or fewer than 2 target
/// samples, signaling the caller to fall back or abort.
pub fn build_master_lap(
    points: &[Trackpoint],
    boundaries: &[usize],
    samples: usize,
) -> Option<Vec<Trackpoint>> {
    if boundaries.len() < 2 || samples < 2 {
        return None;
    }

    let mut boundaries = boundaries.to_vec();
    if *boundaries.last().unwrap() != points.len() {
        boundaries.push(points.len());
    }

    let mut laps: Vec<Vec<Trackpoint>> = Vec::with_capacity(boundaries.len() - 1);
    for window in boundaries.windows(2) {
        let start = window[0];
        let end = window[1].min(points.len());
        if end <= start + 1 {
            continue;
        }
        let lap = normalize_lap_segment(&points[start..end]);
        if let Some(resampled) = resample_lap(&lap, samples) {
            laps.push(resampled);
        }
    }
    if laps.is_empty() {
        return None;
    }

    let reference = laps[0].clone();
    let mut aligned = vec![reference.clone()];
    for lap in laps.iter().skip(1) {
        aligned.push(align_to_reference(&reference, lap));
    }

    let inv_n = 1. / aligned.len() as f64;
    let master = (0..samples)
        .map(|i| {
            let (mut sx, mut sy, mut st) = (0., 0., 0.);
            for lap in &aligned {
                sx += lap[i].x;
                sy += lap[i].y;
                st += lap[i].theta;
            }
            Trackpoint {
                s: reference[i].s,
                x: sx * inv_n,
                y: sy * inv_n,
                theta: st * inv_n,
            }
        })
        .collect();

    Some(master)
}

/// Builds the master geometry for a sprint (point-to-point) run: arc length
/// is recomputed from raw geometry and the path is resampled, with no
/// closing, rotation, or averaging across passes.
pub fn build_master_path(points: &[Trackpoint], samples: usize) -> Option<Vec<Trackpoint>> {
    if points.len() < 2 || samples < 2 {
        return None;
    }
    resample_lap(&recompute_arc_length(points), samples)
}

/// Closes a lap's drift and recomputes arc length so `s` runs from 0 to the
/// lap length derived from the closed geometry.
fn normalize_lap_segment(points: &[Trackpoint]) -> Vec<Trackpoint> {
    recompute_arc_length(&close_loop(points))
}

/// Resamples a lap to `samples` points evenly spaced by arc length, linearly
/// interpolating between the two bracketing raw points. Output `s` is local
/// (0 at the lap start).
fn resample_lap(lap: &[Trackpoint], samples: usize) -> Option<Vec<Trackpoint>> {
    if lap.len() < 2 || samples < 2 {
        return None;
    }
    let s0 = lap[0].s;
    let lap_len = lap[lap.len() - 1].s - s0;
    if lap_len <= 0. {
        return None;
    }

    let mut out = Vec::with_capacity(samples);
    let mut j = 0;
    for i in 0..samples {
        let target_local = i as f64 * lap_len / (samples - 1) as f64;
        let target_s = s0 + target_local;

        while j < lap.len() - 1 && lap[j + 1].s < target_s {
            j += 1;
        }
        if j == lap.len() - 1 {
            let mut last = lap[lap.len() - 1];
            last.s = target_local;
            out.push(last);
            continue;
        }

        let p1 = lap[j];
        let p2 = lap[j + 1];
        let denom = p2.s - p1.s;
        let t = if denom > 0. { (target_s - p1.s) / denom } else { 0. };

        out.push(Trackpoint {
            s: target_local,
            x: p1.x + t * (p2.x - p1.x),
            y: p1.y + t * (p2.y - p1.y),
            theta: p1.theta + t * (p2.theta - p1.theta),
        });
    }

    Some(out)
}

/// The closed-form similarity transform (rotation + uniform scale) that best
/// maps a lap onto the reference in the least-squares sense.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SimilarityFit {
    pub cos_t: f64,
    pub sin_t: f64,
    pub scale: f64,
}

impl SimilarityFit {
    #[allow(dead_code)]
    pub(crate) fn rotation_angle(&self) -> f64 {
        self.sin_t.atan2(self.cos_t)
    }
}

pub(crate) fn fit_similarity(reference: &[Trackpoint], lap: &[Trackpoint]) -> SimilarityFit {
    let n = reference.len();
    let identity = SimilarityFit {
        cos_t: 1.,
        sin_t: 0.,
        scale: 1.,
    };
    if lap.len() != n || n == 0 {
        return identity;
    }

    let (cx_ref, cy_ref) = centroid(reference);
    let (cx_lap, cy_lap) = centroid(lap);

    // Optimal rotation from the cross/dot-product formulation.
    let (mut dot, mut cross) = (0., 0.);
    for i in 0..n {
        let rx = reference[i].x - cx_ref;
        let ry = reference[i].y - cy_ref;
        let lx = lap[i].x - cx_lap;
        let ly = lap[i].y - cy_lap;
        dot += lx * rx + ly * ry;
        cross += lx * ry - ly * rx;
    }
    let denom = dot.hypot(cross);
    let (cos_t, sin_t) = if denom > 0. {
        (dot / denom, cross / denom)
    } else {
        (1., 0.)
    };

    // Least-squares isotropic scale after rotation.
    let (mut num, mut den) = (0., 0.);
    for i in 0..n {
        let rx = reference[i].x - cx_ref;
        let ry = reference[i].y - cy_ref;
        let lx = lap[i].x - cx_lap;
        let ly = lap[i].y - cy_lap;
        let rx_rot = cos_t * lx - sin_t * ly;
        let ry_rot = sin_t * lx + cos_t * ly;
        num += rx * rx_rot + ry * ry_rot;
        den += lx * lx + ly * ly;
    }
    let scale = if den > 0. { num / den } else { 1. };

    SimilarityFit { cos_t, sin_t, scale }
}

/// Rotates, scales, and translates `lap` onto the reference frame, then
/// shifts the whole lap so its first point coincides with the reference's
/// first point to remove residual drift at the seam.
fn align_to_reference(reference: &[Trackpoint], lap: &[Trackpoint]) -> Vec<Trackpoint> {
    let n = reference.len();
    if lap.len() != n || n == 0 {
        return lap.to_vec();
    }

    let fit = fit_similarity(reference, lap);
    let (cx_ref, cy_ref) = centroid(reference);
    let (cx_lap, cy_lap) = centroid(lap);

    let mut out: Vec<Trackpoint> = lap
        .iter()
        .map(|p| {
            let dx = p.x - cx_lap;
            let dy = p.y - cy_lap;
            Trackpoint {
                s: p.s,
                x: (fit.cos_t * dx - fit.sin_t * dy) * fit.scale + cx_ref,
                y: (fit.sin_t * dx + fit.cos_t * dy) * fit.scale + cy_ref,
                theta: p.theta,
            }
        })
        .collect();

    let shift_x = reference[0].x - out[0].x;
    let shift_y = reference[0].y - out[0].y;
    if shift_x != 0. || shift_y != 0. {
        for p in &mut out {
            p.x += shift_x;
            p.y += shift_y;
        }
    }
    out
}

fn centroid(points: &[Trackpoint]) -> (f64, f64) {
    let inv_n = 1. / points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0., 0.), |(sx, sy), p| (sx + p.x, sy + p.y));
    (sx * inv_n, sy * inv_n)
}
