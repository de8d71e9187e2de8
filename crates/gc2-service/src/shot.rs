//! Domain shot types: a shot that has cleared validation, and the numbered
//! form the router hands to sinks.

use std::time::SystemTime;

use gc2_protocol::ClubFrame;
use openrange_physics::LaunchData;

/// A shot that has cleared the completion policy and validation rules.
///
/// All ball metrics are resolved (salvaged shots carry defaults); club data
/// stays optional because only HMT-equipped devices measure it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotData {
    /// Device-assigned shot ID.
    pub shot_id: u32,
    pub ball_speed_mph: f64,
    pub vla_deg: f64,
    pub hla_deg: f64,
    pub total_spin_rpm: f64,
    pub back_spin_rpm: f64,
    pub side_spin_rpm: f64,
    pub club: Option<ClubFrame>,
    pub has_hmt: bool,
    /// Set when the shot was salvaged at the spin-wait timeout with default
    /// angles and zero spin.
    pub incomplete: bool,
    /// Wall-clock time of acceptance.
    pub accepted_at: SystemTime,
}

impl ShotData {
    /// Spin axis in degrees, `atan2(side, back)`. Zero when there is no
    /// backspin, matching what the simulator expects for salvaged shots.
    pub fn spin_axis_deg(&self) -> f64 {
        if self.back_spin_rpm == 0.0 {
            return 0.0;
        }
        self.side_spin_rpm.atan2(self.back_spin_rpm).to_degrees()
    }

    /// Launch conditions for the local flight simulation.
    pub fn launch_data(&self) -> LaunchData {
        LaunchData {
            ball_speed_mph: self.ball_speed_mph,
            vla_deg: self.vla_deg,
            hla_deg: self.hla_deg,
            back_spin_rpm: self.back_spin_rpm,
            side_spin_rpm: self.side_spin_rpm,
        }
    }
}

/// A [`ShotData`] with the router-assigned sequence number. Strictly
/// increasing per process lifetime, independent of the device's `shot_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedShot {
    pub shot_number: u64,
    pub data: ShotData,
}

#[cfg(test)]
pub(crate) fn test_shot(shot_id: u32) -> ShotData {
    ShotData {
        shot_id,
        ball_speed_mph: 150.0,
        vla_deg: 12.0,
        hla_deg: 0.0,
        total_spin_rpm: 2800.0,
        back_spin_rpm: 2650.0,
        side_spin_rpm: -300.0,
        club: None,
        has_hmt: false,
        incomplete: false,
        accepted_at: SystemTime::UNIX_EPOCH,
    }
}
