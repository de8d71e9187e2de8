//! Complete shot simulation: flight, bounces, roll, rest.

use crate::constants::{
    DT, MAX_BOUNCES, MAX_ITERATIONS, MAX_TRAJECTORY_POINTS, meters_to_yards,
};
use crate::ground::{GroundPhysics, Surface};
use crate::trajectory::{push_point, FlightSimulator};
use crate::types::{Conditions, LaunchData, Phase, ShotResult, ShotSummary, TrajectoryPoint};

/// Orchestrates the flight and ground models into a full [`ShotResult`].
///
/// Deterministic: identical launch data and conditions produce a
/// bitwise-identical trajectory. A single shot completes in a few
/// milliseconds of CPU.
pub struct PhysicsEngine {
    conditions: Conditions,
    flight: FlightSimulator,
    ground: GroundPhysics,
}

impl PhysicsEngine {
    pub fn new(conditions: Conditions, surface: Surface) -> Self {
        Self {
            conditions,
            flight: FlightSimulator::new(conditions),
            ground: GroundPhysics::new(surface),
        }
    }

    pub fn surface(&self) -> Surface {
        self.ground.surface()
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// Run a shot from launch to rest.
    pub fn simulate(&self, launch: LaunchData) -> ShotResult {
        if launch.ball_speed_mph <= 0.0 {
            return self.duff(launch);
        }

        let mut trajectory: Vec<TrajectoryPoint> = Vec::with_capacity(256);

        // Flight to the first landing: this fixes carry and flight time.
        let landing = self
            .flight
            .simulate_launch(&launch, &mut trajectory, MAX_TRAJECTORY_POINTS);
        let carry_x = meters_to_yards(landing.pos.x);
        let carry_z = meters_to_yards(landing.pos.z);
        let flight_time = landing.t;

        // Bounce arcs until the vertical energy is spent, then roll out.
        let mut state = landing;
        let mut bounce_count = 0u32;

        while bounce_count < MAX_BOUNCES {
            state = self.ground.bounce(&state);
            bounce_count += 1;
            push_point(&mut trajectory, MAX_TRAJECTORY_POINTS, &state, Phase::Bounce);

            if !self.ground.continues_bouncing(&state) {
                break;
            }

            state = self
                .flight
                .fly(state, 0.0, &mut trajectory, MAX_TRAJECTORY_POINTS);
        }

        // Force the ball onto the ground for the roll-out.
        state.pos.y = 0.0;
        state.vel.y = 0.0;
        state.phase = Phase::Rolling;

        let sample_every = (0.05 / DT).round().max(1.0) as usize;
        let mut steps_since_sample = 0usize;
        for _ in 0..MAX_ITERATIONS {
            if state.phase == Phase::Stopped {
                break;
            }
            state = self.ground.roll_step(&state, DT);

            steps_since_sample += 1;
            if state.phase == Phase::Rolling && steps_since_sample >= sample_every {
                push_point(&mut trajectory, MAX_TRAJECTORY_POINTS, &state, Phase::Rolling);
                steps_since_sample = 0;
            }
        }

        // Final resting point. The cap leaves room because flight sampling
        // stops at the limit too, but never drop the terminal sample if we
        // can help it.
        if trajectory.len() >= MAX_TRAJECTORY_POINTS {
            trajectory.truncate(MAX_TRAJECTORY_POINTS - 1);
        }
        push_point(&mut trajectory, MAX_TRAJECTORY_POINTS, &state, Phase::Stopped);

        let summary = summarize(
            &trajectory,
            carry_x,
            carry_z,
            flight_time,
            state.t,
            bounce_count,
        );

        ShotResult {
            trajectory,
            summary,
            launch,
            conditions: self.conditions,
        }
    }

    /// Zero or negative ball speed: the ball never leaves the tee.
    fn duff(&self, launch: LaunchData) -> ShotResult {
        let trajectory = vec![TrajectoryPoint {
            t: 0.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            phase: Phase::Stopped,
        }];

        ShotResult {
            trajectory,
            summary: ShotSummary::default(),
            launch,
            conditions: self.conditions,
        }
    }
}

fn summarize(
    trajectory: &[TrajectoryPoint],
    carry_x: f64,
    carry_z: f64,
    flight_time: f64,
    total_time: f64,
    bounce_count: u32,
) -> ShotSummary {
    let mut max_height = 0.0f64;
    let mut max_height_time = 0.0f64;
    for point in trajectory {
        if point.y > max_height {
            max_height = point.y;
            max_height_time = point.t;
        }
    }

    let final_point = trajectory.last().copied().unwrap_or(TrajectoryPoint {
        t: 0.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
        phase: Phase::Stopped,
    });

    let carry_distance = (carry_x * carry_x + carry_z * carry_z).sqrt();
    let total_distance =
        (final_point.x * final_point.x + final_point.z * final_point.z).sqrt();

    ShotSummary {
        carry_distance,
        total_distance,
        roll_distance: total_distance - carry_distance,
        offline_distance: final_point.z,
        max_height,
        max_height_time,
        flight_time,
        total_time,
        bounce_count,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
