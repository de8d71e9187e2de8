//! Physical constants and simulation parameters.
//!
//! Ball properties follow USGA specifications; the aerodynamic coefficients
//! follow the drag-crisis and quadratic-lift treatment used by the classic
//! golf trajectory calculators.

use std::f64::consts::PI;

// --- Ball properties (USGA) -------------------------------------------------

/// Maximum legal ball mass: 1.620 oz.
pub const BALL_MASS_KG: f64 = 0.04593;
/// Minimum legal ball diameter: 1.680 in.
pub const BALL_DIAMETER_M: f64 = 0.04267;
pub const BALL_RADIUS_M: f64 = BALL_DIAMETER_M / 2.0;
/// Cross-sectional area, pi * r^2.
pub const BALL_AREA_M2: f64 = PI * BALL_RADIUS_M * BALL_RADIUS_M;

// --- Atmosphere -------------------------------------------------------------

pub const GRAVITY_MS2: f64 = 9.81;
/// Kinematic viscosity of air at standard conditions.
pub const KINEMATIC_VISCOSITY: f64 = 1.5e-5;

pub const STD_TEMP_F: f64 = 70.0;
pub const STD_ELEVATION_FT: f64 = 0.0;
pub const STD_HUMIDITY_PCT: f64 = 50.0;
pub const STD_PRESSURE_INHG: f64 = 29.92;

// --- Drag model -------------------------------------------------------------

/// Base drag coefficient below the drag crisis (Re < 0.5e5).
pub const CD_LOW: f64 = 0.500;
/// Base drag coefficient above the drag crisis (Re > 1.0e5).
pub const CD_HIGH: f64 = 0.212;
/// Low/high Reynolds thresholds, in units of 1e5.
pub const RE_LOW: f64 = 0.5;
pub const RE_HIGH: f64 = 1.0;
/// Spin contribution to drag: CD_SPIN * min(S, CD_SPIN_CAP).
pub const CD_SPIN: f64 = 0.15;
pub const CD_SPIN_CAP: f64 = 0.4;

// --- Lift model -------------------------------------------------------------

/// Cl = CL_LINEAR * S + CL_QUADRATIC * S^2, clamped to [0, CL_MAX].
pub const CL_LINEAR: f64 = 1.990;
pub const CL_QUADRATIC: f64 = -3.250;
pub const CL_MAX: f64 = 0.305;

// --- Integration ------------------------------------------------------------

/// Fixed RK4 time step.
pub const DT: f64 = 0.01;
/// Hard cap on simulated time.
pub const MAX_TIME_S: f64 = 30.0;
/// Safety limit on integration steps per phase.
pub const MAX_ITERATIONS: usize = 3000;
/// Memory cap on recorded trajectory points.
pub const MAX_TRAJECTORY_POINTS: usize = 600;
/// Spin decay rate, fraction per second.
pub const SPIN_DECAY_RATE: f64 = 0.01;
/// Flight termination requires the ball past this time before a ground hit
/// counts (filters the launch sample itself).
pub const MIN_FLIGHT_TIME_S: f64 = 0.1;

// --- Ground -----------------------------------------------------------------

/// Post-bounce vertical speed below which the ball transitions to rolling.
pub const MIN_BOUNCE_SPEED_MS: f64 = 1.0;
/// Bounce count at which rolling is forced.
pub const MAX_BOUNCES: u32 = 5;
/// Rolling stops below this speed.
pub const STOPPED_THRESHOLD_MS: f64 = 0.1;
/// Floor on rolling deceleration.
pub const MIN_ROLL_DECEL_MS2: f64 = 0.5;
/// Spin lost per m/s of tangential friction impulse on a bounce.
pub const BOUNCE_SPIN_LOSS_RATE: f64 = 0.05;
/// Spin decay while rolling, fraction per second.
pub const ROLL_SPIN_DECAY_RATE: f64 = 0.1;
/// Back-spin coupling into rolling deceleration. Tunable; the cap below
/// bounds its influence.
pub const ROLL_SPIN_COUPLING: f64 = 1.0e-4;
/// Largest rolling-deceleration adjustment spin may contribute.
pub const ROLL_SPIN_ASSIST_MAX_MS2: f64 = 0.3;

// --- Wind profile -----------------------------------------------------------

/// Roughness length of short grass, meters (0.01 ft).
pub const WIND_ROUGHNESS_M: f64 = 0.003048;
/// Reference height for the quoted wind speed, meters (10 ft).
pub const WIND_REF_HEIGHT_M: f64 = 3.048;
/// Below this height the air is treated as still.
pub const WIND_MIN_HEIGHT_M: f64 = 0.03;
/// The log profile is clamped to this multiple of the reference speed.
pub const WIND_MAX_FACTOR: f64 = 2.0;

// --- Unit conversions -------------------------------------------------------

pub fn mph_to_ms(mph: f64) -> f64 {
    mph * 0.44704
}

pub fn ms_to_mph(ms: f64) -> f64 {
    ms / 0.44704
}

pub fn meters_to_yards(m: f64) -> f64 {
    m / 0.9144
}

pub fn meters_to_feet(m: f64) -> f64 {
    m / 0.3048
}

pub fn feet_to_meters(ft: f64) -> f64 {
    ft * 0.3048
}

pub fn rpm_to_rad_s(rpm: f64) -> f64 {
    rpm * 2.0 * PI / 60.0
}
