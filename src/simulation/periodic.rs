//! Periodic boundary conditions

use super::params::Parameters;
use super::states::Real;

/// Maps coordinates of one axis back into the simulation domain
pub trait BoundaryEnforcer {
    fn wrap(&self, x: &mut [Real]);
}

/// Cubic periodic box `[0, L)` on every axis
#[derive(Debug, Clone, Copy)]
pub struct PeriodicBox {
    pub box_length: Real,
}

impl PeriodicBox {
    pub fn new(params: &Parameters) -> Self {
        Self {
            box_length: params.box_length,
        }
    }
}

impl BoundaryEnforcer for PeriodicBox {
    fn wrap(&self, x: &mut [Real]) {
        let l = self.box_length;
        for xi in x.iter_mut() {
            *xi -= l * (*xi / l).floor();
            // x = -tiny rounds up to exactly L
            if *xi >= l {
                *xi -= l;
            }
        }
    }
}
