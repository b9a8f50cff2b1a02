use crate::{
    TracklineError,
    telemetry::Sample,
    track::{Trackpoint, clean_float},
};

/// Floor for the per-step elapsed time; also substituted for corrupt values.
const MIN_DT: f64 = 0.016;
/// Ceiling for the per-step elapsed time.
const MAX_DT: f64 = 0.25;
/// Speed floor used by the dead-reckoning integrator.
const MIN_SPEED: f64 = 0.1;
/// Below this speed the yaw-rate proxy (accel / speed) blows up, so hold heading.
const YAW_RATE_SPEED_GATE: f64 = 2.0;
/// Exponential smoothing factor applied to longitudinal acceleration.
const ACCEL_SMOOTHING: f64 = 0.15;
/// Velocity magnitude below which the velocity vector carries no usable heading.
const HEADING_VEL_EPSILON: f64 = 0.5;

/// Reconstructs a session's path geometry, one trackpoint per sample.
///
/// When the source reports absolute world positions the path is simply
/// re-based so the first sample sits at the origin. Otherwise position is
/// dead-reckoned by integrating speed along a heading driven by a smoothed
/// yaw-rate proxy. Arc length is the running sum of per-step displacement in
/// both modes.
pub fn reconstruct_path(samples: &[Sample]) -> Result<Vec<Trackpoint>, TracklineError> {
    if samples.len() < 2 {
        return Err(TracklineError::NotEnoughSamples {
            count: samples.len(),
        });
    }

    if samples.iter().any(Sample::has_position) {
        Ok(reconstruct_absolute(samples))
    } else {
        Ok(reconstruct_dead_reckoning(samples))
    }
}

fn reconstruct_absolute(samples: &[Sample]) -> Vec<Trackpoint> {
    let mut track = Vec::with_capacity(samples.len());

    // Re-base so the first reported position becomes the origin.
    let origin = samples
        .iter()
        .find(|s| s.has_position())
        .map(|s| (s.pos_x.unwrap_or(0.), s.pos_z.unwrap_or(0.)))
        .unwrap_or((0., 0.));

    let mut x = 0.;
    let mut y = 0.;
    let mut dist = 0.;
    let mut theta = 0.;

    for (i, sample) in samples.iter().enumerate() {
        let (px, py) = if sample.has_position() {
            (
                sample.pos_x.unwrap_or(0.) - origin.0,
                sample.pos_z.unwrap_or(0.) - origin.1,
            )
        } else {
            // Missing position mid-stream: hold the last known point.
            (x, y)
        };

        let (dx, dy) = (px - x, py - y);
        if i > 0 {
            dist += dx.hypot(dy);
        }
        theta = heading_for(sample, dx, dy, theta);
        x = px;
        y = py;

        track.push(Trackpoint {
            s: dist,
            x,
            y,
            theta,
        });
    }

    track
}

/// Heading priority: reported yaw, then velocity vector, then direction of
/// travel between consecutive points, then the previous heading.
fn heading_for(sample: &Sample, dx: f64, dy: f64, prev_theta: f64) -> f64 {
    if let Some(yaw) = sample.yaw
        && yaw.is_finite()
    {
        return yaw;
    }
    if sample.velocity_magnitude() > HEADING_VEL_EPSILON {
        let heading = sample.vel_z.atan2(sample.vel_x);
        if heading.is_finite() {
            return heading;
        }
    }
    if dx.hypot(dy) > f64::EPSILON {
        return dy.atan2(dx);
    }
    prev_theta
}

fn reconstruct_dead_reckoning(samples: &[Sample]) -> Vec<Trackpoint> {
    let mut track = Vec::with_capacity(samples.len());

    let mut x = 0.;
    let mut y = 0.;
    let mut dist = 0.;
    let mut theta = clean_float(samples[0].vel_z.atan2(samples[0].vel_x), 0.);
    let mut smooth_ax = clean_float(samples[0].accel_x, 0.);

    track.push(Trackpoint {
        s: 0.,
        x: 0.,
        y: 0.,
        theta,
    });

    for i in 1..samples.len() {
        let prev = &samples[i - 1];
        let cur = &samples[i];

        let dt = clean_float(cur.time - prev.time, MIN_DT).clamp(MIN_DT, MAX_DT);

        let cur_accel = clean_float(cur.accel_x, 0.);
        smooth_ax = smooth_ax * (1. - ACCEL_SMOOTHING) + cur_accel * ACCEL_SMOOTHING;

        let speed = clean_float(cur.speed, prev.speed).max(MIN_SPEED);

        let yaw_rate = if speed > YAW_RATE_SPEED_GATE {
            smooth_ax / speed
        } else {
            0.
        };
        theta += yaw_rate * dt;

        let dx = theta.cos() * speed * dt;
        let dy = theta.sin() * speed * dt;
        x += dx;
        y += dy;
        dist += dx.hypot(dy);

        track.push(Trackpoint {
            s: dist,
            x,
            y,
            theta,
        });
    }

    track
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn straight_line_samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample {
                time: i as f64,
                speed: 10.0,
                pos_x: Some(i as f64 * 10.0),
                pos_z: Some(0.0),
                vel_x: 10.0,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_rejects_short_input() {
        assert!(matches!(
            reconstruct_path(&[Sample::default()]),
            Err(TracklineError::NotEnoughSamples { count: 1 })
        ));
    }

    #[test]
    fn test_absolute_mode_rebases_and_accumulates_arc_length() {
        let track = reconstruct_path(&straight_line_samples(3)).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(track[0].x, 0.);
        assert_eq!(track[0].y, 0.);
        assert!((track[1].s - 10.).abs() < 1e-12);
        assert!((track[2].s - 20.).abs() < 1e-12);
        // Straight line on X means heading from the velocity vector is 0.
        assert!(track[2].theta.abs() < 1e-12);
    }

    #[test]
    fn test_absolute_mode_prefers_reported_yaw() {
        let mut samples = straight_line_samples(3);
        for sample in &mut samples {
            sample.yaw = Some(1.25);
        }
        let track = reconstruct_path(&samples).unwrap();
        assert!(track.iter().all(|p| (p.theta - 1.25).abs() < 1e-12));
    }

    #[test]
    fn test_absolute_mode_heading_falls_back_to_path_delta() {
        let mut samples = straight_line_samples(3);
        for sample in &mut samples {
            sample.vel_x = 0.;
        }
        let track = reconstruct_path(&samples).unwrap();
        // Moving along +X with no yaw and no velocity vector.
        assert!(track[1].theta.abs() < 1e-12);
    }

    #[test]
    fn test_dead_reckoning_straight_line() {
        let samples: Vec<Sample> = (0..5)
            .map(|i| Sample {
                time: i as f64 * 0.1,
                speed: 20.0,
                ..Default::default()
            })
            .collect();
        let track = reconstruct_path(&samples).unwrap();
        assert_eq!(track.len(), 5);
        // No lateral accel: the car keeps its heading and covers speed*dt per step.
        assert!((track[4].s - 20.0 * 0.1 * 4.).abs() < 1e-9);
        assert!((track[4].x - track[4].s).abs() < 1e-9);
    }

    #[test]
    fn test_dead_reckoning_survives_nan_fields() {
        let samples = vec![
            Sample {
                time: 0.,
                speed: 15.,
                ..Default::default()
            },
            Sample {
                time: f64::NAN,
                speed: f64::NAN,
                accel_x: f64::INFINITY,
                ..Default::default()
            },
            Sample {
                time: 0.2,
                speed: 15.,
                ..Default::default()
            },
        ];
        let track = reconstruct_path(&samples).unwrap();
        assert!(track.iter().all(|p| p.s.is_finite() && p.x.is_finite()));
    }

    #[test]
    fn test_clamps_corrupt_timestamps() {
        let samples = vec![
            Sample {
                time: 0.,
                speed: 10.,
                ..Default::default()
            },
            // 100 seconds between samples is clamped to MAX_DT
            Sample {
                time: 100.,
                speed: 10.,
                ..Default::default()
            },
        ];
        let track = reconstruct_path(&samples).unwrap();
        assert!(track[1].s <= 10.0 * MAX_DT + 1e-9);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_output_length_matches_and_arc_length_monotonic(
            speeds in prop::collection::vec(0.0f64..80.0, 2..80),
            accels in prop::collection::vec(-20.0f64..20.0, 2..80),
        ) {
            let samples: Vec<Sample> = speeds
                .iter()
                .zip(accels.iter().cycle())
                .enumerate()
                .map(|(i, (&speed, &accel_x))| Sample {
                    time: i as f64 * 0.05,
                    speed,
                    accel_x,
                    ..Default::default()
                })
                .collect();
            let track = reconstruct_path(&samples).unwrap();
            prop_assert_eq!(track.len(), samples.len());
            for pair in track.windows(2) {
                prop_assert!(pair[1].s >= pair[0].s);
            }
        }
    }
}
