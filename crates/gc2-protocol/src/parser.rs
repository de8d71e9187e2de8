//! `KEY=VALUE` parsing of assembled messages into typed frames.

use crate::error::ParseError;
use crate::types::{Gc2Frame, ShotFrame, StatusFrame, TAG_SHOT, TAG_STATUS};

/// Parse a complete message (header line first) into a typed frame.
///
/// Lines without `=` are ignored. Unknown keys are dropped. A value that
/// fails to parse drops that single field, never the whole frame.
pub fn parse_message(lines: &[String]) -> Result<Gc2Frame, ParseError> {
    let tag = lines
        .first()
        .map(|line| line.trim())
        .and_then(|line| line.split_ascii_whitespace().next())
        .ok_or(ParseError::EmptyMessage)?;

    match tag {
        TAG_SHOT => Ok(Gc2Frame::Shot(parse_shot(lines))),
        TAG_STATUS => Ok(Gc2Frame::Status(parse_status(lines))),
        other => Err(ParseError::UnknownTag {
            tag: other.to_string(),
        }),
    }
}

fn fields(lines: &[String]) -> impl Iterator<Item = (&str, &str)> {
    lines.iter().filter_map(|line| {
        let (key, value) = line.trim().split_once('=')?;
        Some((key.trim(), value.trim()))
    })
}

fn parse_shot(lines: &[String]) -> ShotFrame {
    let mut shot = ShotFrame::default();

    for (key, value) in fields(lines) {
        match key {
            "SHOT_ID" => shot.shot_id = parse_or_skip(key, value),
            "MSEC_SINCE_CONTACT" => shot.msec_since_contact = parse_or_skip(key, value),
            "SPEED_MPH" => shot.ball_speed_mph = parse_or_skip(key, value),
            "ELEVATION_DEG" => shot.vla_deg = parse_or_skip(key, value),
            "AZIMUTH_DEG" => shot.hla_deg = parse_or_skip(key, value),
            "SPIN_RPM" => shot.total_spin_rpm = parse_or_skip(key, value),
            "BACK_RPM" => shot.back_spin_rpm = parse_or_skip(key, value),
            "SIDE_RPM" => shot.side_spin_rpm = parse_or_skip(key, value),
            "CLUBSPEED_MPH" => shot.club.speed_mph = parse_or_skip(key, value),
            "HPATH_DEG" => shot.club.path_h_deg = parse_or_skip(key, value),
            "VPATH_DEG" => shot.club.path_v_deg = parse_or_skip(key, value),
            "FACE_T_DEG" => shot.club.face_to_target_deg = parse_or_skip(key, value),
            "LIE_DEG" => shot.club.lie_deg = parse_or_skip(key, value),
            "LOFT_DEG" => shot.club.loft_deg = parse_or_skip(key, value),
            "HIMPACT_MM" => shot.club.impact_h_mm = parse_or_skip(key, value),
            "VIMPACT_MM" => shot.club.impact_v_mm = parse_or_skip(key, value),
            "CLOSING_RATE_DEGSEC" => shot.club.closure_rate_deg_s = parse_or_skip(key, value),
            "HMT" => shot.has_hmt = parse_flag(value),
            _ => {}
        }
    }

    shot
}

fn parse_status(lines: &[String]) -> StatusFrame {
    let mut status = StatusFrame::default();

    for (key, value) in fields(lines) {
        match key {
            "FLAGS" => {
                if let Some(flags) = parse_or_skip::<u8>(key, value) {
                    status.flags = flags;
                }
            }
            "BALLS" => {
                if let Some(balls) = parse_or_skip::<u32>(key, value) {
                    status.balls = balls;
                }
            }
            "BALL1" => status.ball_position = parse_position(value),
            _ => {}
        }
    }

    status
}

fn parse_or_skip<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::debug!(key, value, "unparseable field dropped");
            None
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// `BALL1=x,y,z` camera-space position.
fn parse_position(value: &str) -> Option<(i32, i32, i32)> {
    let mut parts = value.split(',').map(str::trim);
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((x, y, z))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn shot(text: &str) -> ShotFrame {
        match parse_message(&message(text)).expect("parse") {
            Gc2Frame::Shot(shot) => shot,
            other => panic!("expected shot frame, got {other:?}"),
        }
    }

    fn status(text: &str) -> StatusFrame {
        match parse_message(&message(text)).expect("parse") {
            Gc2Frame::Status(status) => status,
            other => panic!("expected status frame, got {other:?}"),
        }
    }

    #[test]
    fn parses_ball_only_shot() {
        let frame = shot(
            "0H\nSHOT_ID=1\nSPEED_MPH=145.2\nELEVATION_DEG=11.8\nAZIMUTH_DEG=1.5\n\
             SPIN_RPM=2650\nBACK_RPM=2480\nSIDE_RPM=-320\nMSEC_SINCE_CONTACT=1000",
        );

        assert_eq!(frame.shot_id, Some(1));
        assert_eq!(frame.ball_speed_mph, Some(145.2));
        assert_eq!(frame.vla_deg, Some(11.8));
        assert_eq!(frame.hla_deg, Some(1.5));
        assert_eq!(frame.total_spin_rpm, Some(2650.0));
        assert_eq!(frame.back_spin_rpm, Some(2480.0));
        assert_eq!(frame.side_spin_rpm, Some(-320.0));
        assert_eq!(frame.msec_since_contact, Some(1000));
        assert!(!frame.has_hmt);
        assert!(!frame.has_club_data());
    }

    #[test]
    fn parses_hmt_shot() {
        let frame = shot(
            "0H\nSHOT_ID=2\nSPEED_MPH=150.5\nBACK_RPM=2650\nSIDE_RPM=-400\n\
             CLUBSPEED_MPH=105.2\nHPATH_DEG=3.1\nVPATH_DEG=-4.2\nFACE_T_DEG=1.5\n\
             LIE_DEG=0.5\nLOFT_DEG=15.2\nHMT=1",
        );

        assert!(frame.has_hmt);
        assert!(frame.has_club_data());
        assert_eq!(frame.club.speed_mph, Some(105.2));
        assert_eq!(frame.club.path_h_deg, Some(3.1));
        assert_eq!(frame.club.path_v_deg, Some(-4.2));
        assert_eq!(frame.club.face_to_target_deg, Some(1.5));
        assert_eq!(frame.club.loft_deg, Some(15.2));
    }

    #[test]
    fn parses_status() {
        let frame = status("0M\nFLAGS=7\nBALLS=1\nBALL1=120,45,300");
        assert_eq!(frame.flags, 7);
        assert_eq!(frame.balls, 1);
        assert_eq!(frame.ball_position, Some((120, 45, 300)));
        assert!(frame.is_ready());
        assert!(frame.ball_detected());
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let frame = shot("0H\nSHOT_ID=1\nSPEED_MPH=100.0\nWIBBLE=9\nFIRMWARE=2.1");
        assert_eq!(frame.shot_id, Some(1));
        assert_eq!(frame.ball_speed_mph, Some(100.0));
    }

    #[test]
    fn unparseable_value_drops_only_that_field() {
        let frame = shot("0H\nSHOT_ID=abc\nSPEED_MPH=145.0\nBACK_RPM=2480");
        assert_eq!(frame.shot_id, None);
        assert_eq!(frame.ball_speed_mph, Some(145.0));
        assert_eq!(frame.back_spin_rpm, Some(2480.0));
    }

    #[test]
    fn lines_without_equals_are_ignored() {
        let frame = shot("0H\ngarbage line\nSHOT_ID=4\nSPEED_MPH=120.0");
        assert_eq!(frame.shot_id, Some(4));
    }

    #[test]
    fn whitespace_is_trimmed() {
        let frame = shot("0H\n  SHOT_ID = 7 \n SPEED_MPH =  99.5");
        assert_eq!(frame.shot_id, Some(7));
        assert_eq!(frame.ball_speed_mph, Some(99.5));
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let err = parse_message(&message("0X\nFOO=1")).unwrap_err();
        assert!(matches!(err, ParseError::UnknownTag { tag } if tag == "0X"));
    }

    #[test]
    fn empty_message_is_an_error() {
        assert!(matches!(
            parse_message(&[]),
            Err(ParseError::EmptyMessage)
        ));
    }

    #[test]
    fn malformed_ball_position_is_dropped() {
        let frame = status("0M\nFLAGS=7\nBALLS=1\nBALL1=12,34");
        assert_eq!(frame.ball_position, None);
        let frame = status("0M\nBALL1=1,2,3,4");
        assert_eq!(frame.ball_position, None);
    }

    #[test]
    fn encode_then_parse_is_identity() {
        let original = ShotFrame {
            shot_id: Some(42),
            msec_since_contact: Some(1000),
            ball_speed_mph: Some(167.0),
            vla_deg: Some(10.9),
            hla_deg: Some(-1.5),
            total_spin_rpm: Some(2686.0),
            back_spin_rpm: Some(2686.0),
            side_spin_rpm: Some(-120.0),
            ..Default::default()
        };

        let wire = original.encode();
        assert!(wire.ends_with("\n\t"));
        let lines: Vec<String> = wire
            .trim_end_matches('\t')
            .lines()
            .map(str::to_string)
            .collect();
        match parse_message(&lines).expect("parse") {
            Gc2Frame::Shot(parsed) => assert_eq!(parsed, original),
            other => panic!("expected shot, got {other:?}"),
        }
    }

    #[test]
    fn encode_then_parse_status_is_identity() {
        let original = StatusFrame {
            flags: 7,
            balls: 1,
            ball_position: Some((12, -3, 400)),
        };

        let wire = original.encode();
        let lines: Vec<String> = wire
            .trim_end_matches('\t')
            .lines()
            .map(str::to_string)
            .collect();
        match parse_message(&lines).expect("parse") {
            Gc2Frame::Status(parsed) => assert_eq!(parsed, original),
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[test]
    fn hmt_flag_spellings() {
        assert!(shot("0H\nHMT=1").has_hmt);
        assert!(shot("0H\nHMT=true").has_hmt);
        assert!(shot("0H\nHMT=YES").has_hmt);
        assert!(!shot("0H\nHMT=0").has_hmt);
    }
}
