pub(crate) mod loader;

pub use loader::{load_session, sessions_from_folder};
use serde::{Deserialize, Serialize};

/// One recorded instant of vehicle state. Samples are immutable once loaded
/// and owned by their session; every richer field beyond time/speed/accel/vel
/// is optional and the pipeline falls back gracefully when it is absent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Sample {
    /// Seconds since the recorder started
    pub time: f64,
    /// Speed over ground, m/s
    pub speed: f64,
    pub speed_kmh: f64,
    pub speed_mph: f64,

    /// Body-frame acceleration, m/s^2
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    /// World-frame velocity, m/s
    pub vel_x: f64,
    pub vel_y: f64,
    pub vel_z: f64,

    /// Absolute world position when the source reports one
    pub pos_x: Option<f64>,
    pub pos_y: Option<f64>,
    pub pos_z: Option<f64>,
    /// Heading as reported by the source (rad)
    pub yaw: Option<f64>,

    pub tire_slip_angle_fl: f64,
    pub tire_slip_angle_fr: f64,
    pub tire_slip_angle_rl: f64,
    pub tire_slip_angle_rr: f64,
    pub tire_combined_slip_fl: f64,
    pub tire_combined_slip_fr: f64,
    pub tire_combined_slip_rl: f64,
    pub tire_combined_slip_rr: f64,
    pub wheel_on_rumble_fl: f64,
    pub wheel_on_rumble_fr: f64,
    pub wheel_on_rumble_rl: f64,
    pub wheel_on_rumble_rr: f64,
    pub wheel_in_puddle_fl: f64,
    pub wheel_in_puddle_fr: f64,
    pub wheel_in_puddle_rl: f64,
    pub wheel_in_puddle_rr: f64,
    pub surface_rumble_fl: f64,
    pub surface_rumble_fr: f64,
    pub surface_rumble_rl: f64,
    pub surface_rumble_rr: f64,
    pub susp_travel_fl: f64,
    pub susp_travel_fr: f64,
    pub susp_travel_rl: f64,
    pub susp_travel_rr: f64,
    /// Tire surface temperature, Fahrenheit as reported
    pub tire_temp_fl: f64,
    pub tire_temp_fr: f64,
    pub tire_temp_rl: f64,
    pub tire_temp_rr: f64,

    /// Raw driver inputs (0-255 pedals, -127..127 steering); None when the
    /// recording carries no input channels
    pub throttle_raw: Option<i32>,
    pub brake_raw: Option<i32>,
    pub steer_raw: Option<i32>,
    pub gear: i32,

    /// Lap counter as reported by the source, 0 when unsupported
    pub lap_number: i32,
    /// Race position as reported by the source, 0 when unsupported
    pub race_position: i32,
    pub is_race_on: bool,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            time: 0.,
            speed: 0.,
            speed_kmh: 0.,
            speed_mph: 0.,
            accel_x: 0.,
            accel_y: 0.,
            accel_z: 0.,
            vel_x: 0.,
            vel_y: 0.,
            vel_z: 0.,
            pos_x: None,
            pos_y: None,
            pos_z: None,
            yaw: None,
            tire_slip_angle_fl: 0.,
            tire_slip_angle_fr: 0.,
            tire_slip_angle_rl: 0.,
            tire_slip_angle_rr: 0.,
            tire_combined_slip_fl: 0.,
            tire_combined_slip_fr: 0.,
            tire_combined_slip_rl: 0.,
            tire_combined_slip_rr: 0.,
            wheel_on_rumble_fl: 0.,
            wheel_on_rumble_fr: 0.,
            wheel_on_rumble_rl: 0.,
            wheel_on_rumble_rr: 0.,
            wheel_in_puddle_fl: 0.,
            wheel_in_puddle_fr: 0.,
            wheel_in_puddle_rl: 0.,
            wheel_in_puddle_rr: 0.,
            surface_rumble_fl: 0.,
            surface_rumble_fr: 0.,
            surface_rumble_rl: 0.,
            surface_rumble_rr: 0.,
            susp_travel_fl: 0.,
            susp_travel_fr: 0.,
            susp_travel_rl: 0.,
            susp_travel_rr: 0.,
            tire_temp_fl: 0.,
            tire_temp_fr: 0.,
            tire_temp_rl: 0.,
            tire_temp_rr: 0.,
            throttle_raw: None,
            brake_raw: None,
            steer_raw: None,
            gear: 0,
            lap_number: 0,
            race_position: 0,
            is_race_on: true,
        }
    }
}

impl Sample {
    /// True when the source reported a usable absolute planar position.
    pub fn has_position(&self) -> bool {
        matches!((self.pos_x, self.pos_z), (Some(x), Some(z)) if x.is_finite() && z.is_finite())
    }

    /// Planar velocity magnitude, m/s.
    pub fn velocity_magnitude(&self) -> f64 {
        self.vel_x.hypot(self.vel_z)
    }

    /// Average absolute tire slip angle across all four wheels (rad).
    pub fn avg_slip_angle(&self) -> f64 {
        (self.tire_slip_angle_fl.abs()
            + self.tire_slip_angle_fr.abs()
            + self.tire_slip_angle_rl.abs()
            + self.tire_slip_angle_rr.abs())
            / 4.
    }

    /// Average combined tire slip across all four wheels.
    pub fn avg_combined_slip(&self) -> f64 {
        (self.tire_combined_slip_fl
            + self.tire_combined_slip_fr
            + self.tire_combined_slip_rl
            + self.tire_combined_slip_rr)
            / 4.
    }
}
