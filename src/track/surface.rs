use serde::{Deserialize, Serialize};
use simple_moving_average::{SumTreeSMA, SMA};

use crate::telemetry::Sample;

const SURFACE_WINDOW: usize = 30;
const PUDDLE_FRACTION: f64 = 0.25;
const RUMBLE_FRACTION: f64 = 0.25;
const DIRT_RUMBLE_LEVEL: f64 = 0.5;

/// Surface category under the car, smoothed over a short sample window so
/// momentary kerb touches do not flicker the label.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    #[default]
    Tarmac,
    Rumble,
    Puddle,
    Dirt,
}

impl SurfaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceKind::Tarmac => "tarmac",
            SurfaceKind::Rumble => "rumble",
            SurfaceKind::Puddle => "puddle",
            SurfaceKind::Dirt => "dirt",
        }
    }
}

/// Labels every sample with a surface classification.
///
/// Puddle and rumble flags count wheels touching (0..=4 scaled to 0..=1);
/// surface rumble is the untyped roughness channel, which reads high on
/// dirt and gravel even when no kerb flag is set. Priority when several
/// indicators fire at once: puddle, then rumble, then dirt.
pub fn classify_surface(samples: &[Sample]) -> Vec<SurfaceKind> {
    let mut puddle_avg = SumTreeSMA::<f64, f64, SURFACE_WINDOW>::new();
    let mut rumble_avg = SumTreeSMA::<f64, f64, SURFACE_WINDOW>::new();
    let mut roughness_avg = SumTreeSMA::<f64, f64, SURFACE_WINDOW>::new();

    samples
        .iter()
        .map(|s| {
            puddle_avg.add_sample(wheel_fraction(&[
                s.wheel_in_puddle_fl,
                s.wheel_in_puddle_fr,
                s.wheel_in_puddle_rl,
                s.wheel_in_puddle_rr,
            ]));
            rumble_avg.add_sample(wheel_fraction(&[
                s.wheel_on_rumble_fl,
                s.wheel_on_rumble_fr,
                s.wheel_on_rumble_rl,
                s.wheel_on_rumble_rr,
            ]));
            roughness_avg.add_sample(
                (s.surface_rumble_fl + s.surface_rumble_fr + s.surface_rumble_rl
                    + s.surface_rumble_rr)
                    / 4.,
            );

            if puddle_avg.get_average() > PUDDLE_FRACTION {
                SurfaceKind::Puddle
            } else if rumble_avg.get_average() > RUMBLE_FRACTION {
                SurfaceKind::Rumble
            } else if roughness_avg.get_average() > DIRT_RUMBLE_LEVEL {
                SurfaceKind::Dirt
            } else {
                SurfaceKind::Tarmac
            }
        })
        .collect()
}

fn wheel_fraction(flags: &[f64; 4]) -> f64 {
    flags.iter().filter(|&&v| v > 0.).count() as f64 / 4.
}
