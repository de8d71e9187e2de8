//! Property suite over the full engine: any plausible launch produces a
//! finite, bounded, deterministic result.

use openrange_physics::prelude::*;
use proptest::prelude::*;

fn finite(point: &TrajectoryPoint) -> bool {
    point.t.is_finite() && point.x.is_finite() && point.y.is_finite() && point.z.is_finite()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_launch_terminates_sanely(
        ball_speed_mph in 10.0f64..200.0,
        vla_deg in 2.0f64..45.0,
        hla_deg in -10.0f64..10.0,
        back_spin_rpm in 500.0f64..9000.0,
        side_spin_rpm in -2000.0f64..2000.0,
    ) {
        let launch = LaunchData {
            ball_speed_mph,
            vla_deg,
            hla_deg,
            back_spin_rpm,
            side_spin_rpm,
        };
        let engine = PhysicsEngine::new(Conditions::default(), Surface::Fairway);
        let result = engine.simulate(launch);

        prop_assert!(!result.trajectory.is_empty());
        prop_assert!(result.trajectory.len() <= 600);
        prop_assert!(result.trajectory.iter().all(finite));
        prop_assert_eq!(result.trajectory.last().unwrap().phase, Phase::Stopped);

        let summary = &result.summary;
        prop_assert!(summary.carry_distance >= 0.0);
        prop_assert!(summary.total_time >= summary.flight_time);
        prop_assert!(summary.bounce_count <= 5);
        prop_assert!(summary.max_height >= 0.0);
    }

    #[test]
    fn identical_inputs_are_bitwise_identical(
        ball_speed_mph in 60.0f64..180.0,
        vla_deg in 8.0f64..30.0,
        back_spin_rpm in 1500.0f64..8000.0,
    ) {
        let launch = LaunchData {
            ball_speed_mph,
            vla_deg,
            hla_deg: 0.0,
            back_spin_rpm,
            side_spin_rpm: 0.0,
        };
        let engine = PhysicsEngine::new(Conditions::default(), Surface::Fairway);
        let a = engine.simulate(launch);
        let b = engine.simulate(launch);

        prop_assert_eq!(a.trajectory.len(), b.trajectory.len());
        for (pa, pb) in a.trajectory.iter().zip(&b.trajectory) {
            prop_assert_eq!(pa.x.to_bits(), pb.x.to_bits());
            prop_assert_eq!(pa.y.to_bits(), pb.y.to_bits());
            prop_assert_eq!(pa.z.to_bits(), pb.z.to_bits());
        }
    }

    #[test]
    fn sidespin_sign_matches_curve_direction(
        side_spin_rpm in 300.0f64..1500.0,
    ) {
        let engine = PhysicsEngine::new(Conditions::default(), Surface::Fairway);
        let base = LaunchData {
            ball_speed_mph: 140.0,
            vla_deg: 13.0,
            hla_deg: 0.0,
            back_spin_rpm: 3000.0,
            side_spin_rpm,
        };

        let fade = engine.simulate(base);
        let draw = engine.simulate(LaunchData {
            side_spin_rpm: -side_spin_rpm,
            ..base
        });

        prop_assert!(fade.summary.offline_distance > 0.0);
        prop_assert!(draw.summary.offline_distance < 0.0);
    }
}
