//! Flight-phase integration: gravity, drag, Magnus lift, and wind, advanced
//! with classical fixed-step RK4.

use crate::aerodynamics::{air_density, drag_coefficient, lift_coefficient, reynolds};
use crate::constants::{
    BALL_AREA_M2, BALL_MASS_KG, BALL_RADIUS_M, DT, GRAVITY_MS2, MAX_ITERATIONS, MAX_TIME_S,
    MIN_FLIGHT_TIME_S, SPIN_DECAY_RATE, WIND_MAX_FACTOR, WIND_MIN_HEIGHT_M, WIND_REF_HEIGHT_M,
    WIND_ROUGHNESS_M, meters_to_feet, meters_to_yards, mph_to_ms, rpm_to_rad_s,
};
use crate::types::{Conditions, LaunchData, Phase, TrajectoryPoint};
use crate::vec3::Vec3;

/// Ball state during simulation. Position and velocity in SI units; spin in
/// rpm to match the launch-monitor input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimState {
    pub pos: Vec3,
    pub vel: Vec3,
    pub back_spin_rpm: f64,
    pub side_spin_rpm: f64,
    pub t: f64,
    pub phase: Phase,
}

/// Integrates the flight phase under the given conditions.
pub struct FlightSimulator {
    conditions: Conditions,
    air_density: f64,
    dt: f64,
}

impl FlightSimulator {
    pub fn new(conditions: Conditions) -> Self {
        let air_density = air_density(
            conditions.temp_f,
            conditions.elevation_ft,
            conditions.humidity_pct,
            conditions.pressure_inhg,
        );
        Self {
            conditions,
            air_density,
            dt: DT,
        }
    }

    pub fn air_density(&self) -> f64 {
        self.air_density
    }

    /// Initial state from launch conditions: the speed vector is split into
    /// vertical and horizontal components by the VLA, and the horizontal
    /// component into forward/lateral by the HLA.
    pub fn launch_state(launch: &LaunchData) -> SimState {
        let speed = mph_to_ms(launch.ball_speed_mph);
        let vla = launch.vla_deg.to_radians();
        let hla = launch.hla_deg.to_radians();

        let horizontal = speed * vla.cos();
        let vel = Vec3::new(
            horizontal * hla.cos(),
            speed * vla.sin(),
            horizontal * hla.sin(),
        );

        SimState {
            pos: Vec3::ZERO,
            vel,
            back_spin_rpm: launch.back_spin_rpm,
            side_spin_rpm: launch.side_spin_rpm,
            t: 0.0,
            phase: Phase::Flight,
        }
    }

    /// Wind at `height_m` above the ground, from the logarithmic profile
    /// `v(h) = v_ref * ln(h / z0) / ln(h_ref / z0)` clamped to
    /// `[0, 2 * v_ref]`. Direction 0 degrees = headwind (blowing against +X);
    /// 90 degrees pushes the ball right (+Z).
    pub fn wind_at_height(&self, height_m: f64) -> Vec3 {
        if self.conditions.wind_speed_mph < 0.1 || height_m <= WIND_MIN_HEIGHT_M {
            return Vec3::ZERO;
        }

        let factor = ((height_m / WIND_ROUGHNESS_M).ln()
            / (WIND_REF_HEIGHT_M / WIND_ROUGHNESS_M).ln())
        .clamp(0.0, WIND_MAX_FACTOR);

        let speed = mph_to_ms(self.conditions.wind_speed_mph) * factor;
        let dir = self.conditions.wind_dir_deg.to_radians();

        Vec3::new(-speed * dir.cos(), 0.0, speed * dir.sin())
    }

    /// Total acceleration at a trial point.
    fn acceleration(&self, pos: Vec3, vel: Vec3, back_rpm: f64, side_rpm: f64) -> Vec3 {
        let gravity = Vec3::new(0.0, -GRAVITY_MS2, 0.0);

        let wind = self.wind_at_height(pos.y);
        let rel = vel - wind;
        let speed = rel.norm();
        if speed < 0.01 {
            return gravity;
        }

        let omega_back = rpm_to_rad_s(back_rpm);
        let omega_side = rpm_to_rad_s(side_rpm);
        let omega_total = (omega_back * omega_back + omega_side * omega_side).sqrt();
        let spin_factor = omega_total * BALL_RADIUS_M / speed;

        let q = 0.5 * self.air_density * speed * speed;

        // Drag opposes the relative velocity.
        let cd = drag_coefficient(reynolds(speed), spin_factor);
        let drag = -rel.normalized() * (q * cd * BALL_AREA_M2);

        // Magnus force acts along (spin axis) x (relative velocity).
        // Backspin rotates about the horizontal axis perpendicular to the
        // velocity (v_hat x up, so that spin x v points upward); sidespin
        // rotates about the vertical, negated so that positive sidespin
        // curves the ball right.
        let magnus = if omega_total < 0.1 {
            Vec3::ZERO
        } else {
            let cl = lift_coefficient(spin_factor);
            if cl < 1e-3 {
                Vec3::ZERO
            } else {
                let rel_dir = rel.normalized();
                let mut back_axis = rel_dir.cross(Vec3::UP);
                back_axis = if back_axis.norm() > 1e-3 {
                    back_axis.normalized()
                } else {
                    // Ball moving straight up or down.
                    Vec3::new(0.0, 0.0, 1.0)
                };
                let side_axis = -Vec3::UP;

                let spin_vec = back_axis * omega_back + side_axis * omega_side;
                let dir = spin_vec.cross(rel);
                if dir.norm() < 1e-3 {
                    Vec3::ZERO
                } else {
                    dir.normalized() * (q * cl * BALL_AREA_M2)
                }
            }
        };

        gravity + (drag + magnus) * (1.0 / BALL_MASS_KG)
    }

    /// One RK4 step. Spin decays multiplicatively per step.
    pub fn rk4_step(&self, state: &SimState) -> SimState {
        let dt = self.dt;
        let back = state.back_spin_rpm;
        let side = state.side_spin_rpm;

        let a1 = self.acceleration(state.pos, state.vel, back, side);
        let k1_pos = state.vel;
        let k1_vel = a1;

        let pos2 = state.pos + k1_pos * (dt / 2.0);
        let vel2 = state.vel + k1_vel * (dt / 2.0);
        let a2 = self.acceleration(pos2, vel2, back, side);
        let k2_pos = vel2;
        let k2_vel = a2;

        let pos3 = state.pos + k2_pos * (dt / 2.0);
        let vel3 = state.vel + k2_vel * (dt / 2.0);
        let a3 = self.acceleration(pos3, vel3, back, side);
        let k3_pos = vel3;
        let k3_vel = a3;

        let pos4 = state.pos + k3_pos * dt;
        let vel4 = state.vel + k3_vel * dt;
        let a4 = self.acceleration(pos4, vel4, back, side);
        let k4_pos = vel4;
        let k4_vel = a4;

        let decay = 1.0 - SPIN_DECAY_RATE * dt;

        SimState {
            pos: state.pos + (k1_pos + k2_pos * 2.0 + k3_pos * 2.0 + k4_pos) * (dt / 6.0),
            vel: state.vel + (k1_vel + k2_vel * 2.0 + k3_vel * 2.0 + k4_vel) * (dt / 6.0),
            back_spin_rpm: back * decay,
            side_spin_rpm: side * decay,
            t: state.t + dt,
            phase: Phase::Flight,
        }
    }

    /// Integrate from `start` until the ball reaches the ground, appending
    /// sampled points (about every 20 ms) to `points` up to `max_points`.
    ///
    /// `min_airborne_s` filters the launch sample itself: a ground hit only
    /// counts after that much time in the air. Bounce arcs pass zero. The
    /// returned state is linearly interpolated to the exact ground crossing;
    /// if the time or iteration cap is hit first, the last integrated state
    /// is returned as-is.
    pub fn fly(
        &self,
        start: SimState,
        min_airborne_s: f64,
        points: &mut Vec<TrajectoryPoint>,
        max_points: usize,
    ) -> SimState {
        let mut state = start;
        let sample_every = (0.02 / self.dt).round().max(1.0) as usize;
        let mut steps_since_sample = 0usize;

        for _ in 0..MAX_ITERATIONS {
            let next = self.rk4_step(&state);

            let airborne = next.t - start.t;
            if next.pos.y <= 0.0 && airborne >= min_airborne_s {
                // Interpolate to the exact crossing.
                let span = state.pos.y - next.pos.y;
                let ratio = if span > 0.0 {
                    (state.pos.y / span).clamp(0.0, 1.0)
                } else {
                    1.0
                };

                let landing = SimState {
                    pos: Vec3::new(
                        state.pos.x + ratio * (next.pos.x - state.pos.x),
                        0.0,
                        state.pos.z + ratio * (next.pos.z - state.pos.z),
                    ),
                    vel: state.vel + (next.vel - state.vel) * ratio,
                    back_spin_rpm: next.back_spin_rpm,
                    side_spin_rpm: next.side_spin_rpm,
                    t: state.t + ratio * self.dt,
                    phase: Phase::Flight,
                };

                push_point(points, max_points, &landing, Phase::Flight);
                return landing;
            }

            state = next;
            if state.t >= MAX_TIME_S {
                break;
            }

            steps_since_sample += 1;
            if steps_since_sample >= sample_every {
                push_point(points, max_points, &state, Phase::Flight);
                steps_since_sample = 0;
            }
        }

        state
    }

    /// Integrate the initial flight of a shot, recording the launch point.
    pub fn simulate_launch(
        &self,
        launch: &LaunchData,
        points: &mut Vec<TrajectoryPoint>,
        max_points: usize,
    ) -> SimState {
        let start = Self::launch_state(launch);
        push_point(points, max_points, &start, Phase::Flight);
        self.fly(start, MIN_FLIGHT_TIME_S, points, max_points)
    }
}

pub(crate) fn push_point(
    points: &mut Vec<TrajectoryPoint>,
    max_points: usize,
    state: &SimState,
    phase: Phase,
) {
    if points.len() >= max_points {
        return;
    }
    points.push(TrajectoryPoint {
        t: state.t,
        x: meters_to_yards(state.pos.x),
        y: meters_to_feet(state.pos.y),
        z: meters_to_yards(state.pos.z),
        phase,
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
