//! Fixed-step time integration, one spatial axis per call
//!
//! The engine calls an [`Integrator`] three times per step (x, y, z) with
//! that axis's positions, velocities and forces.

use super::params::Parameters;
use super::states::Real;

/// Advances one axis of the particle state by one time step
///
/// Returns the kinetic energy carried by that axis.
pub trait Integrator {
    fn integrate(&self, x: &mut [Real], v: &mut [Real], f: &[Real]) -> Real;
}

/// Leapfrog with velocities living on half steps
///
/// Kick: v_n+1/2 = v_n-1/2 + dt * f_n / m
/// Drift: x_n+1 = x_n + dt * v_n+1/2
///
/// The kinetic energy is evaluated at the integer step from the average of
/// the two half-step velocities.
#[derive(Debug, Clone, Copy)]
pub struct Leapfrog {
    pub dt: Real,
    pub mass: Real,
}

impl Leapfrog {
    pub fn new(params: &Parameters) -> Self {
        Self {
            dt: params.dt,
            mass: params.mass,
        }
    }
}

impl Integrator for Leapfrog {
    fn integrate(&self, x: &mut [Real], v: &mut [Real], f: &[Real]) -> Real {
        let dt_over_m = self.dt / self.mass;
        let mut sum_v2 = 0.0;

        for ((xi, vi), fi) in x.iter_mut().zip(v.iter_mut()).zip(f) {
            let v_old = *vi;
            *vi += dt_over_m * fi;
            *xi += self.dt * *vi;

            let v_mid = 0.5 * (v_old + *vi);
            sum_v2 += v_mid * v_mid;
        }

        0.5 * self.mass * sum_v2
    }
}
