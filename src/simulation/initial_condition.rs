//! Initial particle configuration
//!
//! Fills a freshly allocated [`ParticleState`] before the first force call:
//! - positions on a simple cubic lattice filling the periodic box
//! - velocities drawn uniformly from `[-scaling, scaling)` with a seeded RNG
//! - centre-of-mass velocity removed so the system does not drift

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::simulation::params::Parameters;
use crate::simulation::states::{ParticleState, Real};

/// Populates positions and velocities of a new state
pub trait InitialCondition {
    fn apply(&mut self, state: &mut ParticleState);
}

#[derive(Debug, Clone)]
pub struct CubicLattice {
    pub box_length: Real,
    pub scaling: Real,
    pub seed: u64,
}

impl CubicLattice {
    pub fn new(params: &Parameters) -> Self {
        Self {
            box_length: params.box_length,
            scaling: params.scaling,
            seed: params.seed,
        }
    }
}

/// Smallest k with k^3 >= n
fn sites_per_axis(n: usize) -> usize {
    let mut k = (n as Real).cbrt().floor() as usize;
    while k * k * k < n {
        k += 1;
    }
    k.max(1)
}

impl InitialCondition for CubicLattice {
    fn apply(&mut self, state: &mut ParticleState) {
        let n = state.len();
        if n == 0 {
            return;
        }

        // Positions: cell-centred lattice sites, filled x-major
        let k = sites_per_axis(n);
        let a = self.box_length / k as Real;
        for i in 0..n {
            let (ix, iy, iz) = (i / (k * k), (i / k) % k, i % k);
            state.x[i] = (ix as Real + 0.5) * a;
            state.y[i] = (iy as Real + 0.5) * a;
            state.z[i] = (iz as Real + 0.5) * a;
        }

        // Velocities: uniform noise, then zero the mean on each axis
        let mut rng = StdRng::seed_from_u64(self.seed);
        for v in [&mut state.v_x, &mut state.v_y, &mut state.v_z] {
            for vi in v.iter_mut() {
                *vi = self.scaling * rng.gen_range(-1.0..1.0);
            }
            let mean = v.iter().sum::<Real>() / n as Real;
            v.iter_mut().for_each(|vi| *vi -= mean);
        }

        log::debug!("lattice initial condition: {n} particles, {k}^3 sites, spacing {a:.4}");
    }
}
