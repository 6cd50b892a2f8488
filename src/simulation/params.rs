//! Numerical and physical parameters for one run
//!
//! `Parameters` is the validated runtime form of [`ParametersConfig`]:
//! - particle count, step count and time step,
//! - density and the box length derived from it,
//! - particle mass and Lennard-Jones constants,
//! - initial velocity scaling, seed and the selected force kernel

use crate::configuration::config::ParametersConfig;
use crate::error::{Error, Result};
use crate::simulation::forces::KernelKind;
use crate::simulation::states::Real;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub n: usize,          // number of particles
    pub n_step: usize,     // number of steps
    pub dt: Real,          // time step
    pub rho: Real,         // number density
    pub mass: Real,        // particle mass
    pub r_cut: Real,       // cutoff radius
    pub eps_lj: Real,      // LJ well depth
    pub sig_lj: Real,      // LJ length scale
    pub scaling: Real,     // initial velocity amplitude
    pub seed: u64,         // initial velocity seed
    pub kernel: KernelKind,
    pub box_length: Real,  // L = (N / rho)^(1/3)
}

fn positive(name: &'static str, value: Real) -> Result<Real> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::invalid(name, format!("must be a positive number, got {value}")))
    }
}

impl TryFrom<ParametersConfig> for Parameters {
    type Error = Error;

    fn try_from(cfg: ParametersConfig) -> Result<Self> {
        if cfg.n == 0 {
            return Err(Error::invalid("N", "at least one particle is required"));
        }
        let rho = positive("rho", cfg.rho)?;
        if !cfg.scaling.is_finite() || cfg.scaling < 0.0 {
            return Err(Error::invalid("scaling", format!("must be non-negative, got {}", cfg.scaling)));
        }
        if !cfg.eps_lj.is_finite() {
            return Err(Error::invalid("epsLJ", "must be finite"));
        }

        Ok(Self {
            n: cfg.n,
            n_step: cfg.n_step,
            dt: positive("dt", cfg.dt)?,
            rho,
            mass: positive("mass", cfg.mass)?,
            r_cut: positive("Rcut", cfg.r_cut)?,
            eps_lj: cfg.eps_lj,
            sig_lj: positive("sigLJ", cfg.sig_lj)?,
            scaling: cfg.scaling,
            seed: cfg.seed,
            kernel: cfg.kernel,
            box_length: (cfg.n as Real / rho).cbrt(),
        })
    }
}

impl Parameters {
    /// Same parameters for `n` particles at the same density
    pub fn with_particle_count(&self, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::invalid("N", "at least one particle is required"));
        }
        Ok(Self {
            n,
            box_length: (n as Real / self.rho).cbrt(),
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_length_follows_density() {
        let cfg = ParametersConfig { n: 1000, rho: 1.0, ..Default::default() };
        let p = Parameters::try_from(cfg).unwrap();
        assert!((p.box_length - 10.0).abs() < 1e-12);
    }

    #[test]
    fn zero_particles_rejected() {
        let cfg = ParametersConfig { n: 0, ..Default::default() };
        assert!(matches!(Parameters::try_from(cfg), Err(Error::InvalidParameter { name: "N", .. })));
    }

    #[test]
    fn non_positive_dt_rejected() {
        let cfg = ParametersConfig { dt: 0.0, ..Default::default() };
        assert!(matches!(Parameters::try_from(cfg), Err(Error::InvalidParameter { name: "dt", .. })));
    }
}
