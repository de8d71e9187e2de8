//! Ground interaction: bounce (restitution + friction) and roll (rolling
//! resistance) on a configurable surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BOUNCE_SPIN_LOSS_RATE, GRAVITY_MS2, MIN_BOUNCE_SPEED_MS, MIN_ROLL_DECEL_MS2,
    ROLL_SPIN_ASSIST_MAX_MS2, ROLL_SPIN_COUPLING, ROLL_SPIN_DECAY_RATE, STOPPED_THRESHOLD_MS,
};
use crate::trajectory::SimState;
use crate::types::Phase;
use crate::vec3::Vec3;

/// Ground surface type. Governs restitution, bounce friction, and rolling
/// resistance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Surface {
    #[default]
    Fairway,
    Rough,
    Green,
    Bunker,
}

impl Surface {
    /// Coefficient of restitution for the vertical bounce component.
    pub fn cor(self) -> f64 {
        match self {
            Surface::Fairway => 0.60,
            Surface::Rough => 0.30,
            Surface::Green => 0.40,
            Surface::Bunker => 0.20,
        }
    }

    /// Tangential friction coefficient on impact.
    pub fn friction(self) -> f64 {
        match self {
            Surface::Fairway => 0.50,
            Surface::Rough => 0.70,
            Surface::Green => 0.30,
            Surface::Bunker => 0.80,
        }
    }

    /// Rolling resistance factor (multiplied by g for deceleration).
    pub fn rolling_resistance(self) -> f64 {
        match self {
            Surface::Fairway => 0.10,
            Surface::Rough => 0.30,
            Surface::Green => 0.05,
            Surface::Bunker => 0.50,
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Surface::Fairway => "Fairway",
            Surface::Rough => "Rough",
            Surface::Green => "Green",
            Surface::Bunker => "Bunker",
        };
        f.write_str(name)
    }
}

impl FromStr for Surface {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fairway" => Ok(Surface::Fairway),
            "rough" => Ok(Surface::Rough),
            "green" => Ok(Surface::Green),
            "bunker" => Ok(Surface::Bunker),
            _ => Err(()),
        }
    }
}

/// Bounce and roll physics for one surface.
#[derive(Debug, Clone, Copy)]
pub struct GroundPhysics {
    surface: Surface,
}

impl GroundPhysics {
    pub fn new(surface: Surface) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// Apply bounce physics at ground contact.
    ///
    /// The vertical component reflects scaled by COR. The tangential speed
    /// loses `min(mu * |v_n|, |v_t|)` to friction, and spin loses an amount
    /// proportional to that friction impulse. The ball is lifted just above
    /// the surface so the flight integrator does not immediately re-trigger.
    pub fn bounce(&self, state: &SimState) -> SimState {
        let vn = state.vel.y;
        let vt = state.vel.horizontal();
        let vt_speed = vt.norm();

        let vn_new = -vn * self.surface.cor();

        let impulse = (self.surface.friction() * vn.abs()).min(vt_speed);
        let vt_new = if vt_speed > 0.0 {
            vt * ((vt_speed - impulse) / vt_speed)
        } else {
            Vec3::ZERO
        };

        let spin_retention = (1.0 - impulse * BOUNCE_SPIN_LOSS_RATE).max(0.0);

        SimState {
            pos: Vec3::new(state.pos.x, 0.001, state.pos.z),
            vel: Vec3::new(vt_new.x, vn_new, vt_new.z),
            back_spin_rpm: state.back_spin_rpm * spin_retention,
            side_spin_rpm: state.side_spin_rpm * spin_retention,
            t: state.t,
            phase: Phase::Bounce,
        }
    }

    /// Whether the post-bounce state has enough vertical energy for another
    /// bounce arc.
    pub fn continues_bouncing(&self, state: &SimState) -> bool {
        state.vel.y.abs() >= MIN_BOUNCE_SPEED_MS
    }

    /// One rolling step: decelerate antiparallel to the horizontal velocity,
    /// with a bounded back-spin adjustment, until the ball stops.
    pub fn roll_step(&self, state: &SimState, dt: f64) -> SimState {
        let speed = state.vel.norm();

        if speed < STOPPED_THRESHOLD_MS {
            return stopped(state, dt);
        }

        let base_decel = (self.surface.rolling_resistance() * GRAVITY_MS2).max(MIN_ROLL_DECEL_MS2);
        let spin_assist = (state.back_spin_rpm * ROLL_SPIN_COUPLING)
            .clamp(-ROLL_SPIN_ASSIST_MAX_MS2, ROLL_SPIN_ASSIST_MAX_MS2);
        let decel = (base_decel + spin_assist).max(MIN_ROLL_DECEL_MS2);

        let new_speed = speed - decel * dt;
        if new_speed <= 0.0 {
            return stopped(state, dt);
        }

        let direction = state.vel.normalized();
        // Average speed over the step for the position update.
        let avg_speed = (speed + new_speed) / 2.0;
        let pos = state.pos + direction * (avg_speed * dt);

        let spin_decay = 1.0 - ROLL_SPIN_DECAY_RATE * dt;

        SimState {
            pos: Vec3::new(pos.x, 0.0, pos.z),
            vel: direction * new_speed,
            back_spin_rpm: state.back_spin_rpm * spin_decay,
            side_spin_rpm: state.side_spin_rpm * spin_decay,
            t: state.t + dt,
            phase: Phase::Rolling,
        }
    }
}

fn stopped(state: &SimState, dt: f64) -> SimState {
    SimState {
        pos: Vec3::new(state.pos.x, 0.0, state.pos.z),
        vel: Vec3::ZERO,
        back_spin_rpm: 0.0,
        side_spin_rpm: 0.0,
        t: state.t + dt,
        phase: Phase::Stopped,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn landing(vx: f64, vy: f64, back: f64) -> SimState {
        SimState {
            pos: Vec3::new(200.0, 0.0, 0.0),
            vel: Vec3::new(vx, vy, 0.0),
            back_spin_rpm: back,
            side_spin_rpm: 0.0,
            t: 6.0,
            phase: Phase::Flight,
        }
    }

    #[test]
    fn bounce_reflects_vertical_with_cor() {
        let ground = GroundPhysics::new(Surface::Fairway);
        let out = ground.bounce(&landing(20.0, -15.0, 2500.0));

        assert!((out.vel.y - 15.0 * 0.60).abs() < 1e-12);
        assert_eq!(out.phase, Phase::Bounce);
        assert!((out.pos.y - 0.001).abs() < 1e-12);
    }

    #[test]
    fn bounce_friction_reduces_tangential_speed() {
        let ground = GroundPhysics::new(Surface::Fairway);
        let out = ground.bounce(&landing(20.0, -15.0, 2500.0));

        // Impulse = min(0.5 * 15, 20) = 7.5.
        assert!((out.vel.x - 12.5).abs() < 1e-12);
        assert_eq!(out.vel.z, 0.0);
    }

    #[test]
    fn bounce_friction_cannot_reverse_tangential_motion() {
        let ground = GroundPhysics::new(Surface::Bunker);
        // Steep drop with little forward speed: impulse caps at |v_t|.
        let out = ground.bounce(&landing(2.0, -30.0, 2500.0));
        assert!(out.vel.x.abs() < 1e-12);
    }

    #[test]
    fn bounce_reduces_spin() {
        let ground = GroundPhysics::new(Surface::Fairway);
        let out = ground.bounce(&landing(20.0, -15.0, 2500.0));
        assert!(out.back_spin_rpm < 2500.0);
        assert!(out.back_spin_rpm > 0.0);
    }

    #[test]
    fn weak_bounce_transitions_to_rolling() {
        let ground = GroundPhysics::new(Surface::Green);
        let out = ground.bounce(&landing(5.0, -2.0, 1000.0));
        // 2.0 * 0.40 = 0.8 < 1.0 threshold.
        assert!(!ground.continues_bouncing(&out));

        let strong = ground.bounce(&landing(20.0, -12.0, 1000.0));
        assert!(ground.continues_bouncing(&strong));
    }

    #[test]
    fn roll_decelerates_and_stops() {
        let ground = GroundPhysics::new(Surface::Fairway);
        let mut state = SimState {
            pos: Vec3::new(250.0, 0.0, 0.0),
            vel: Vec3::new(5.0, 0.0, 0.0),
            back_spin_rpm: 800.0,
            side_spin_rpm: 0.0,
            t: 7.0,
            phase: Phase::Rolling,
        };

        let mut steps = 0;
        while state.phase != Phase::Stopped {
            state = ground.roll_step(&state, 0.01);
            steps += 1;
            assert!(steps < 3000, "roll failed to stop");
        }

        assert_eq!(state.vel, Vec3::ZERO);
        assert_eq!(state.back_spin_rpm, 0.0);
        assert!(state.pos.x > 250.0);
    }

    #[test]
    fn rough_rolls_shorter_than_green() {
        let roll_out = |surface: Surface| {
            let ground = GroundPhysics::new(surface);
            let mut state = SimState {
                pos: Vec3::ZERO,
                vel: Vec3::new(6.0, 0.0, 0.0),
                back_spin_rpm: 0.0,
                side_spin_rpm: 0.0,
                t: 0.0,
                phase: Phase::Rolling,
            };
            while state.phase != Phase::Stopped {
                state = ground.roll_step(&state, 0.01);
            }
            state.pos.x
        };

        assert!(roll_out(Surface::Rough) < roll_out(Surface::Green));
    }

    #[test]
    fn backspin_shortens_the_roll() {
        let ground = GroundPhysics::new(Surface::Fairway);
        let roll_out = |back: f64| {
            let mut state = SimState {
                pos: Vec3::ZERO,
                vel: Vec3::new(6.0, 0.0, 0.0),
                back_spin_rpm: back,
                side_spin_rpm: 0.0,
                t: 0.0,
                phase: Phase::Rolling,
            };
            while state.phase != Phase::Stopped {
                state = ground.roll_step(&state, 0.01);
            }
            state.pos.x
        };

        assert!(roll_out(3000.0) < roll_out(0.0));
    }

    #[test]
    fn surface_from_str_accepts_any_case() {
        assert_eq!("fairway".parse::<Surface>(), Ok(Surface::Fairway));
        assert_eq!("GREEN".parse::<Surface>(), Ok(Surface::Green));
        assert_eq!("Bunker".parse::<Surface>(), Ok(Surface::Bunker));
        assert!("water".parse::<Surface>().is_err());
    }
}
