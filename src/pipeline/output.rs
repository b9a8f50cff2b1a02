use serde::{Deserialize, Serialize};

use crate::track::{EventKind, LapMetrics, SurfaceKind};

/// The complete analysis document: the averaged reference geometry, the
/// per-master-point heatmap, the merged time-ordered event list, and one
/// entry per car.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDocument {
    pub master: Vec<MasterPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub heatmap: Vec<HeatPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cars: Vec<CarOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race_type: Option<String>,
}

/// One point of the master geometry in output form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterPoint {
    pub rel_s: f64,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<SurfaceKind>,
}

/// Aggregated statistics for one master point across every mapped session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatPoint {
    pub index: usize,
    pub rel_s: f64,
    pub x: f64,
    pub y: f64,
    pub avg_accel: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<SurfaceKind>,
}

/// A detected event enriched with lap context and its projection onto the
/// master geometry. The master fields stay unset for events that could not
/// be located on a lap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    pub index: usize,
    pub time: f64,
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lap: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_idx: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_rel_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_sq: Option<f64>,
}

/// One mapped telemetry sample of a car, in master coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarPoint {
    pub time: f64,
    pub lap: usize,
    pub rel_s: f64,
    pub heading: f64,
    pub master_x: f64,
    pub master_y: f64,
    #[serde(rename = "speedMPH")]
    pub speed_mph: f64,
    #[serde(rename = "speedKMH")]
    pub speed_kmh: f64,
    pub gear: i32,
    /// Time gap to the session's ideal lap at the same progress
    pub delta: f64,
    pub long_acc: f64,
    pub lat_acc: f64,
    pub yaw_rate: f64,
    pub yaw_deg_s: f64,
    pub throttle: f64,
    pub brake: f64,
    pub steer_deg: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub throttle_input: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub brake_input: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub steer_input: f64,
    #[serde(default, skip_serializing_if = "is_zero", rename = "suspFL")]
    pub susp_fl: f64,
    #[serde(default, skip_serializing_if = "is_zero", rename = "suspFR")]
    pub susp_fr: f64,
    #[serde(default, skip_serializing_if = "is_zero", rename = "suspRL")]
    pub susp_rl: f64,
    #[serde(default, skip_serializing_if = "is_zero", rename = "suspRR")]
    pub susp_rr: f64,
    #[serde(default, skip_serializing_if = "is_zero", rename = "tireTempFL")]
    pub tire_temp_fl: f64,
    #[serde(default, skip_serializing_if = "is_zero", rename = "tireTempFR")]
    pub tire_temp_fr: f64,
    #[serde(default, skip_serializing_if = "is_zero", rename = "tireTempRL")]
    pub tire_temp_rl: f64,
    #[serde(default, skip_serializing_if = "is_zero", rename = "tireTempRR")]
    pub tire_temp_rr: f64,
}

/// Everything produced for a single input session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarOutput {
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<CarPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lap_times: Vec<LapMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race_type: Option<String>,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.
}
