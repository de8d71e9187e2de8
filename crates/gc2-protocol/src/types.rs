//! Typed records parsed from GC2 messages.

/// Header tag of a shot message.
pub const TAG_SHOT: &str = "0H";
/// Header tag of a status message.
pub const TAG_STATUS: &str = "0M";

/// A parsed GC2 message.
#[derive(Debug, Clone, PartialEq)]
pub enum Gc2Frame {
    Shot(ShotFrame),
    Status(StatusFrame),
}

/// Ball (and optionally club) data from one `0H` message.
///
/// Every metric is optional: the device transmits a shot in two phases and
/// either transmission may omit fields. Completion policy lives downstream;
/// this type only records what was on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShotFrame {
    pub shot_id: Option<u32>,
    /// Milliseconds since club contact at transmission time. Early
    /// transmissions (small values) carry preliminary data.
    pub msec_since_contact: Option<u32>,

    pub ball_speed_mph: Option<f64>,
    /// Vertical launch angle (device key `ELEVATION_DEG`).
    pub vla_deg: Option<f64>,
    /// Horizontal launch angle (device key `AZIMUTH_DEG`, + = right).
    pub hla_deg: Option<f64>,
    pub total_spin_rpm: Option<f64>,
    pub back_spin_rpm: Option<f64>,
    pub side_spin_rpm: Option<f64>,

    pub club: ClubFrame,
    /// `HMT=1` on the wire: a head-measurement unit is attached and club
    /// fields are expected on a complete shot.
    pub has_hmt: bool,
}

impl ShotFrame {
    /// Whether any club data was measured.
    pub fn has_club_data(&self) -> bool {
        self.club.speed_mph.is_some()
    }

    /// Render this frame as a complete wire message (terminated `\n\t`).
    ///
    /// Used by the mock device and by tests; the real GC2 is the only other
    /// producer of this format.
    pub fn encode(&self) -> String {
        let mut out = String::from(TAG_SHOT);
        out.push('\n');

        let mut push_u32 = |key: &str, value: Option<u32>| {
            if let Some(v) = value {
                out.push_str(&format!("{key}={v}\n"));
            }
        };
        push_u32("SHOT_ID", self.shot_id);
        push_u32("MSEC_SINCE_CONTACT", self.msec_since_contact);

        let mut push_f64 = |key: &str, value: Option<f64>| {
            if let Some(v) = value {
                out.push_str(&format!("{key}={v}\n"));
            }
        };
        push_f64("SPEED_MPH", self.ball_speed_mph);
        push_f64("ELEVATION_DEG", self.vla_deg);
        push_f64("AZIMUTH_DEG", self.hla_deg);
        push_f64("SPIN_RPM", self.total_spin_rpm);
        push_f64("BACK_RPM", self.back_spin_rpm);
        push_f64("SIDE_RPM", self.side_spin_rpm);
        push_f64("CLUBSPEED_MPH", self.club.speed_mph);
        push_f64("HPATH_DEG", self.club.path_h_deg);
        push_f64("VPATH_DEG", self.club.path_v_deg);
        push_f64("FACE_T_DEG", self.club.face_to_target_deg);
        push_f64("LIE_DEG", self.club.lie_deg);
        push_f64("LOFT_DEG", self.club.loft_deg);
        push_f64("HIMPACT_MM", self.club.impact_h_mm);
        push_f64("VIMPACT_MM", self.club.impact_v_mm);
        push_f64("CLOSING_RATE_DEGSEC", self.club.closure_rate_deg_s);

        if self.has_hmt {
            out.push_str("HMT=1\n");
        }

        out.push('\t');
        out
    }

    /// Fill in fields this frame is missing from an earlier transmission of
    /// the same shot. Present fields always win; this only backfills gaps.
    pub fn fill_missing_from(&mut self, earlier: &ShotFrame) {
        fn fill<T: Copy>(slot: &mut Option<T>, other: Option<T>) {
            if slot.is_none() {
                *slot = other;
            }
        }

        fill(&mut self.shot_id, earlier.shot_id);
        fill(&mut self.ball_speed_mph, earlier.ball_speed_mph);
        fill(&mut self.vla_deg, earlier.vla_deg);
        fill(&mut self.hla_deg, earlier.hla_deg);
        fill(&mut self.total_spin_rpm, earlier.total_spin_rpm);
        fill(&mut self.back_spin_rpm, earlier.back_spin_rpm);
        fill(&mut self.side_spin_rpm, earlier.side_spin_rpm);

        fill(&mut self.club.speed_mph, earlier.club.speed_mph);
        fill(&mut self.club.path_h_deg, earlier.club.path_h_deg);
        fill(&mut self.club.path_v_deg, earlier.club.path_v_deg);
        fill(&mut self.club.face_to_target_deg, earlier.club.face_to_target_deg);
        fill(&mut self.club.lie_deg, earlier.club.lie_deg);
        fill(&mut self.club.loft_deg, earlier.club.loft_deg);
        fill(&mut self.club.impact_h_mm, earlier.club.impact_h_mm);
        fill(&mut self.club.impact_v_mm, earlier.club.impact_v_mm);
        fill(&mut self.club.closure_rate_deg_s, earlier.club.closure_rate_deg_s);

        self.has_hmt |= earlier.has_hmt;
    }
}

/// Club-head data measured by the HMT attachment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClubFrame {
    pub speed_mph: Option<f64>,
    /// Swing path, horizontal (device key `HPATH_DEG`).
    pub path_h_deg: Option<f64>,
    /// Angle of attack (device key `VPATH_DEG`).
    pub path_v_deg: Option<f64>,
    pub face_to_target_deg: Option<f64>,
    pub lie_deg: Option<f64>,
    pub loft_deg: Option<f64>,
    pub impact_h_mm: Option<f64>,
    pub impact_v_mm: Option<f64>,
    pub closure_rate_deg_s: Option<f64>,
}

/// Device readiness and ball detection from one `0M` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFrame {
    /// Readiness bitmask; `7` (all three bits) is the green light.
    pub flags: u8,
    /// Number of balls in view.
    pub balls: u32,
    /// Position of the first detected ball (`BALL1=x,y,z`), camera units.
    pub ball_position: Option<(i32, i32, i32)>,
}

impl StatusFrame {
    /// Green light: the device is ready to record a shot.
    pub fn is_ready(&self) -> bool {
        self.flags == 7
    }

    pub fn ball_detected(&self) -> bool {
        self.balls > 0
    }

    /// Render this frame as a complete wire message (terminated `\n\t`).
    pub fn encode(&self) -> String {
        let mut out = format!("{TAG_STATUS}\nFLAGS={}\nBALLS={}\n", self.flags, self.balls);
        if let Some((x, y, z)) = self.ball_position {
            out.push_str(&format!("BALL1={x},{y},{z}\n"));
        }
        out.push('\t');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_missing_keeps_present_fields() {
        let mut refined = ShotFrame {
            shot_id: Some(3),
            ball_speed_mph: Some(150.0),
            back_spin_rpm: Some(2650.0),
            ..Default::default()
        };
        let preliminary = ShotFrame {
            shot_id: Some(3),
            ball_speed_mph: Some(149.0),
            vla_deg: Some(11.5),
            back_spin_rpm: Some(3000.0),
            ..Default::default()
        };

        refined.fill_missing_from(&preliminary);

        // Refined values win; gaps are backfilled.
        assert_eq!(refined.ball_speed_mph, Some(150.0));
        assert_eq!(refined.back_spin_rpm, Some(2650.0));
        assert_eq!(refined.vla_deg, Some(11.5));
    }

    #[test]
    fn fill_missing_propagates_hmt() {
        let mut refined = ShotFrame::default();
        let preliminary = ShotFrame {
            has_hmt: true,
            ..Default::default()
        };
        refined.fill_missing_from(&preliminary);
        assert!(refined.has_hmt);
    }

    #[test]
    fn status_readiness() {
        let status = StatusFrame {
            flags: 7,
            balls: 1,
            ball_position: None,
        };
        assert!(status.is_ready());
        assert!(status.ball_detected());

        let not_ready = StatusFrame {
            flags: 1,
            balls: 0,
            ball_position: None,
        };
        assert!(!not_ready.is_ready());
        assert!(!not_ready.ball_detected());
    }
}
