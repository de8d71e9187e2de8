//! Golf ball flight physics for the offline driving-range mode.
//!
//! This crate is pure math: no I/O, no clocks, no allocation beyond the
//! trajectory buffers. Identical inputs produce bitwise-identical output,
//! which the test suites rely on.
//!
//! The model follows the classical treatment of golf ball flight: Reynolds-
//! dependent drag with a drag-crisis transition, a quadratic lift curve in
//! the spin factor, Magnus force from the combined back/side spin axis, a
//! logarithmic wind profile, RK4 integration of the flight phase, and a
//! restitution/friction bounce model followed by rolling resistance.

pub mod aerodynamics;
pub mod constants;
pub mod engine;
pub mod ground;
pub mod prelude;
pub mod trajectory;
pub mod types;
pub mod vec3;

pub use engine::PhysicsEngine;
pub use ground::{GroundPhysics, Surface};
pub use trajectory::{FlightSimulator, SimState};
pub use types::{Conditions, LaunchData, Phase, ShotResult, ShotSummary, TrajectoryPoint};
pub use vec3::Vec3;
