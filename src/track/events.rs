use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::telemetry::Sample;

/// Discrete driving anomalies and state changes found in a single pass over a
/// session's samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Reset,
    Crash,
    Collision,
    Rumble,
    Puddle,
    Drift,
    TractionLoss,
    PositionGain,
    PositionLoss,
    PoleGain,
    PoleLoss,
    Surface,
    Overtake,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Index of the originating sample
    pub index: usize,
    /// Time of the originating sample (s)
    pub time: f64,
    pub note: String,
}

/// Detection thresholds, overridable per run so tests never touch
/// process-wide state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventThresholds {
    /// Speed considered stopped (m/s)
    pub stop_speed: f64,
    /// Deceleration (m/s^2, negative) that qualifies as a crash
    pub crash_decel: f64,
    /// Minimum speed before the drop for a crash
    pub crash_min_pre_speed: f64,
    /// Acceleration magnitude spike for a collision (m/s^2)
    pub collision_accel_mag: f64,
    /// Required speed drop for a collision (m/s)
    pub collision_speed_drop: f64,
    /// Seconds of near-zero movement that qualify as a reset
    pub reset_min_duration: f64,
    /// Velocity magnitude considered zero (m/s)
    pub reset_vel_epsilon: f64,
    /// Minimum seconds between events of the same type
    pub dedupe_window: f64,
    /// Sum of wheel-on-rumble indicators to flag rumble contact
    pub rumble_threshold: f64,
    /// Sum of wheel-in-puddle indicators to flag puddle contact
    pub puddle_threshold: f64,
    /// Average absolute slip angle (rad) to flag a drift
    pub drift_slip_angle: f64,
    /// Minimum speed to consider a drift (m/s)
    pub drift_min_speed: f64,
    /// Average combined slip to flag traction loss
    pub traction_slip: f64,
    /// Minimum raw throttle (0-255) to consider traction loss
    pub traction_throttle: i32,
}

impl Default for EventThresholds {
    fn default() -> Self {
        Self {
            stop_speed: 1.0,
            crash_decel: -8.0,
            crash_min_pre_speed: 5.0,
            collision_accel_mag: 12.0,
            collision_speed_drop: 2.0,
            reset_min_duration: 1.5,
            reset_vel_epsilon: 0.25,
            dedupe_window: 1.0,
            rumble_threshold: 0.8,
            puddle_threshold: 0.5,
            drift_slip_angle: 0.3,
            drift_min_speed: 8.0,
            traction_slip: 0.4,
            traction_throttle: 120,
        }
    }
}

/// Single-pass event scanner. Samples before the race-active flag first turns
/// on are skipped; once it has been on and turns off again, scanning stops.
pub struct EventDetector {
    thresholds: EventThresholds,
}

impl EventDetector {
    pub fn new(thresholds: EventThresholds) -> Self {
        Self { thresholds }
    }

    pub fn detect(&self, samples: &[Sample]) -> Vec<Event> {
        let th = &self.thresholds;
        let mut events = Vec::new();
        if samples.len() < 2 {
            return events;
        }

        let mut last_of_kind: HashMap<EventKind, f64> = HashMap::new();

        let mut seen_race_on = false;
        let mut reset_start: Option<usize> = None;
        let mut reset_accum = 0.;
        let mut drift_active = false;
        let mut traction_active = false;
        let mut last_pos: i32 = -1;

        for i in 1..samples.len() {
            let prev = &samples[i - 1];
            let cur = &samples[i];

            // Wait until the race actually starts; ignore pre-race idling.
            if !cur.is_race_on && !seen_race_on {
                continue;
            }
            if cur.is_race_on {
                seen_race_on = true;
            } else {
                // Back to off after being on: trailing non-race data.
                break;
            }
            if !prev.is_race_on {
                // Skip the transition frame itself.
                continue;
            }

            if prev.race_position > 0 {
                last_pos = prev.race_position;
            }

            let mut dt = cur.time - prev.time;
            if !dt.is_finite() || dt <= 0. || dt > 1.0 {
                dt = 0.;
            }

            let speed_prev = prev.speed.max(0.);
            let speed_cur = cur.speed.max(0.);
            let d_speed = speed_cur - speed_prev;
            let decel = if dt > 0. { d_speed / dt } else { 0. };

            let accel_mag =
                (cur.accel_x * cur.accel_x + cur.accel_y * cur.accel_y + cur.accel_z * cur.accel_z)
                    .sqrt();
            let vel_mag = cur.velocity_magnitude();

            // Position gain/loss and pole changes.
            if last_pos > 0 && cur.race_position > 0 && cur.race_position != last_pos {
                let note = format!("position {} -> {}", last_pos, cur.race_position);
                let kind = if cur.race_position < last_pos {
                    EventKind::PositionGain
                } else {
                    EventKind::PositionLoss
                };
                emit_deduped(&mut events, &mut last_of_kind, th.dedupe_window, kind, i, cur.time, cur.time, note.clone());
                if last_pos == 1 && cur.race_position > 1 {
                    emit_deduped(&mut events, &mut last_of_kind, th.dedupe_window, EventKind::PoleLoss, i, cur.time, cur.time, note);
                } else if last_pos > 1 && cur.race_position == 1 {
                    emit_deduped(&mut events, &mut last_of_kind, th.dedupe_window, EventKind::PoleGain, i, cur.time, cur.time, note);
                }
                last_pos = cur.race_position;
            }

            // Reset: sustained near-zero movement. Deduped against current
            // time but stamped at the start of the still run.
            if vel_mag < th.reset_vel_epsilon && speed_cur < th.stop_speed {
                if reset_start.is_none() {
                    reset_start = Some(i);
                    reset_accum = 0.;
                }
                reset_accum += dt;
                if reset_accum >= th.reset_min_duration {
                    let start = reset_start.take().unwrap_or(i);
                    emit_deduped(
                        &mut events,
                        &mut last_of_kind,
                        th.dedupe_window,
                        EventKind::Reset,
                        start,
                        samples[start].time,
                        cur.time,
                        "near-zero movement".to_string(),
                    );
                    reset_accum = 0.;
                }
            } else {
                reset_start = None;
                reset_accum = 0.;
            }

            // Crash: large decel to near stop.
            if speed_prev > th.crash_min_pre_speed
                && speed_cur < th.stop_speed
                && decel <= th.crash_decel
            {
                emit_deduped(&mut events, &mut last_of_kind, th.dedupe_window, EventKind::Crash, i, cur.time, cur.time, "hard stop".to_string());
            }

            // Collision: accel spike plus a speed drop that is not a full stop.
            if accel_mag >= th.collision_accel_mag
                && d_speed < -th.collision_speed_drop
                && speed_cur >= th.stop_speed
            {
                emit_deduped(&mut events, &mut last_of_kind, th.dedupe_window, EventKind::Collision, i, cur.time, cur.time, "accel spike + speed drop".to_string());
            }

            // Rumble strip contact.
            let rumble = cur.wheel_on_rumble_fl
                + cur.wheel_on_rumble_fr
                + cur.wheel_on_rumble_rl
                + cur.wheel_on_rumble_rr;
            if rumble >= th.rumble_threshold {
                emit_deduped(&mut events, &mut last_of_kind, th.dedupe_window, EventKind::Rumble, i, cur.time, cur.time, "wheel on rumble".to_string());
            }

            // Puddle/wet contact.
            let puddle = cur.wheel_in_puddle_fl
                + cur.wheel_in_puddle_fr
                + cur.wheel_in_puddle_rl
                + cur.wheel_in_puddle_rr;
            if puddle >= th.puddle_threshold {
                emit_deduped(&mut events, &mut last_of_kind, th.dedupe_window, EventKind::Puddle, i, cur.time, cur.time, "wheel in puddle".to_string());
            }

            // Drift: edge-triggered so one sustained slide emits once.
            if cur.avg_slip_angle() >= th.drift_slip_angle && speed_cur >= th.drift_min_speed {
                if !drift_active {
                    emit_deduped(&mut events, &mut last_of_kind, th.dedupe_window, EventKind::Drift, i, cur.time, cur.time, "high slip angle".to_string());
                }
                drift_active = true;
            } else {
                drift_active = false;
            }

            // Traction loss: high combined slip under throttle, edge-triggered.
            if cur.avg_combined_slip() >= th.traction_slip
                && cur.throttle_raw.unwrap_or(0) >= th.traction_throttle
                && speed_cur >= th.stop_speed
            {
                if !traction_active {
                    emit_deduped(&mut events, &mut last_of_kind, th.dedupe_window, EventKind::TractionLoss, i, cur.time, cur.time, "traction loss".to_string());
                }
                traction_active = true;
            } else {
                traction_active = false;
            }
        }

        events
    }
}

/// Pushes an event unless one of the same kind was emitted less than
/// `window` seconds ago. `event_time` is what gets recorded; `dedupe_time`
/// is what the window is measured against (they differ only for resets,
/// which are stamped at the start of the still run).
#[allow(clippy::too_many_arguments)]
fn emit_deduped(
    events: &mut Vec<Event>,
    last_of_kind: &mut HashMap<EventKind, f64>,
    window: f64,
    kind: EventKind,
    index: usize,
    event_time: f64,
    dedupe_time: f64,
    note: String,
) {
    let ok = match last_of_kind.get(&kind) {
        None => true,
        Some(&last) => dedupe_time - last >= window,
    };
    if ok {
        events.push(Event {
            kind,
            index,
            time: event_time,
            note,
        });
        last_of_kind.insert(kind, dedupe_time);
    }
}
