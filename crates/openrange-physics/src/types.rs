//! Simulation input and output types.

use serde::{Deserialize, Serialize};

use crate::constants::{STD_ELEVATION_FT, STD_HUMIDITY_PCT, STD_PRESSURE_INHG, STD_TEMP_F};

/// Phase of the ball's motion at a trajectory point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Flight,
    Bounce,
    Rolling,
    Stopped,
}

/// One sample of the ball's path, in output units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Time since launch, seconds.
    pub t: f64,
    /// Forward distance, yards.
    pub x: f64,
    /// Height, feet.
    pub y: f64,
    /// Lateral distance, yards (+ = right of target).
    pub z: f64,
    pub phase: Phase,
}

/// Launch conditions handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LaunchData {
    pub ball_speed_mph: f64,
    /// Vertical launch angle, degrees.
    pub vla_deg: f64,
    /// Horizontal launch angle, degrees (+ = right).
    pub hla_deg: f64,
    /// Backspin, rpm (positive = backspin).
    pub back_spin_rpm: f64,
    /// Sidespin, rpm (+ = fade/slice, curves right).
    pub side_spin_rpm: f64,
}

/// Immutable environment snapshot for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub temp_f: f64,
    pub elevation_ft: f64,
    pub humidity_pct: f64,
    /// Station pressure. Optional in stored documents; the standard
    /// atmosphere is assumed when absent.
    #[serde(default = "standard_pressure")]
    pub pressure_inhg: f64,
    pub wind_speed_mph: f64,
    /// Direction the wind blows from, degrees; 0 = headwind.
    pub wind_dir_deg: f64,
}

fn standard_pressure() -> f64 {
    STD_PRESSURE_INHG
}

impl Default for Conditions {
    fn default() -> Self {
        Self {
            temp_f: STD_TEMP_F,
            elevation_ft: STD_ELEVATION_FT,
            humidity_pct: STD_HUMIDITY_PCT,
            pressure_inhg: STD_PRESSURE_INHG,
            wind_speed_mph: 0.0,
            wind_dir_deg: 0.0,
        }
    }
}

/// Outcome metrics for a completed shot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShotSummary {
    /// Distance to the first landing, yards.
    pub carry_distance: f64,
    /// Distance to the resting position, yards.
    pub total_distance: f64,
    /// Total minus carry, yards.
    pub roll_distance: f64,
    /// Lateral distance at rest, yards (+ right, - left).
    pub offline_distance: f64,
    /// Apex height, feet.
    pub max_height: f64,
    /// Time to apex, seconds.
    pub max_height_time: f64,
    /// Time to first landing, seconds.
    pub flight_time: f64,
    /// Time to rest, seconds.
    pub total_time: f64,
    pub bounce_count: u32,
}

/// Full simulation result: sampled path plus summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotResult {
    pub trajectory: Vec<TrajectoryPoint>,
    pub summary: ShotSummary,
    pub launch: LaunchData,
    pub conditions: Conditions,
}
