//! Aerodynamic coefficients: Reynolds number, drag, lift, and air density.

use crate::constants::{
    BALL_DIAMETER_M, CD_HIGH, CD_LOW, CD_SPIN, CD_SPIN_CAP, CL_LINEAR, CL_MAX, CL_QUADRATIC,
    KINEMATIC_VISCOSITY, RE_HIGH, RE_LOW,
};

/// Reynolds number for the ball at `velocity_ms` airspeed.
pub fn reynolds(velocity_ms: f64) -> f64 {
    if velocity_ms <= 0.0 {
        return 0.0;
    }
    velocity_ms * BALL_DIAMETER_M / KINEMATIC_VISCOSITY
}

/// Drag coefficient: piecewise-linear drag-crisis base plus a spin term.
///
/// Below Re = 0.5e5 the boundary layer is laminar (Cd = 0.500); above
/// Re = 1.0e5 it is turbulent (Cd = 0.212); the transition is interpolated
/// linearly. Spin adds `0.15 * min(S, 0.4)`.
pub fn drag_coefficient(reynolds: f64, spin_factor: f64) -> f64 {
    let re = reynolds / 1.0e5;

    let base = if re <= RE_LOW {
        CD_LOW
    } else if re >= RE_HIGH {
        CD_HIGH
    } else {
        let t = (re - RE_LOW) / (RE_HIGH - RE_LOW);
        CD_LOW + t * (CD_HIGH - CD_LOW)
    };

    base + CD_SPIN * spin_factor.min(CD_SPIN_CAP)
}

/// Lift coefficient from the spin factor S = omega * r / v.
///
/// Quadratic law `Cl = 1.990*S - 3.250*S^2`, clamped to [0, 0.305].
pub fn lift_coefficient(spin_factor: f64) -> f64 {
    if spin_factor <= 0.0 {
        return 0.0;
    }
    let cl = CL_LINEAR * spin_factor + CL_QUADRATIC * spin_factor * spin_factor;
    cl.clamp(0.0, CL_MAX)
}

/// Air density in kg/m^3 with temperature, elevation, humidity, and pressure
/// corrections.
///
/// Pressure and vapor pressure are carried in mmHg: the station pressure is
/// reduced with the isothermal scale height `exp(-elev_ft / 27000)`, the
/// saturation vapor pressure comes from the Magnus formula, and density is
/// `1.2929 * (273.15 / T_K) * ((P - 0.3783 * e) / 760)`.
pub fn air_density(temp_f: f64, elevation_ft: f64, humidity_pct: f64, pressure_inhg: f64) -> f64 {
    let temp_c = (temp_f - 32.0) * 5.0 / 9.0;
    let temp_k = temp_c + 273.15;

    // Magnus saturation vapor pressure, hPa -> mmHg.
    let sat_hpa = 6.1078 * ((17.27 * temp_c) / (temp_c + 237.3)).exp();
    let vapor_mmhg = (humidity_pct / 100.0) * sat_hpa * 0.750062;

    let pressure_mmhg = pressure_inhg * 25.4 * (-elevation_ft / 27_000.0).exp();

    1.2929 * (273.15 / temp_k) * ((pressure_mmhg - 0.3783 * vapor_mmhg) / 760.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
