//! Convenience re-exports for callers that want the whole surface.

pub use crate::engine::PhysicsEngine;
pub use crate::ground::{GroundPhysics, Surface};
pub use crate::trajectory::{FlightSimulator, SimState};
pub use crate::types::{Conditions, LaunchData, Phase, ShotResult, ShotSummary, TrajectoryPoint};
pub use crate::vec3::Vec3;
