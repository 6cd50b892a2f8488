//! Structure-of-arrays particle buffers
//!
//! `ParticleState` holds one contiguous array per field:
//! - positions `x`, `y`, `z`
//! - velocities `v_x`, `v_y`, `v_z`
//! - forces `f_x`, `f_y`, `f_z`
//! - optional shadow copies of positions and velocities
//!
//! Index `i` refers to the same particle in every array. The length is fixed
//! at allocation; kernels may reorder particles but never resize.

use nalgebra::Vector3;

use crate::error::{Error, Result};

/// Floating point type of all particle data
pub type Real = f64;
pub type NVec3 = Vector3<Real>;

/// Number of primary arrays (positions, velocities, forces)
pub const PRIMARY_BUFFERS: usize = 9;
/// Number of shadow arrays (position and velocity copies)
pub const SHADOW_BUFFERS: usize = 6;

/// Shadow copies of positions and velocities
///
/// Used by kernels that rebuild a spatial structure: they scatter particles
/// into these arrays in a new order and then swap them with the primaries.
#[derive(Debug, Clone)]
pub struct ShadowBuffers {
    pub x: Vec<Real>,
    pub y: Vec<Real>,
    pub z: Vec<Real>,
    pub v_x: Vec<Real>,
    pub v_y: Vec<Real>,
    pub v_z: Vec<Real>,
}

#[derive(Debug, Clone)]
pub struct ParticleState {
    pub x: Vec<Real>,
    pub y: Vec<Real>,
    pub z: Vec<Real>,

    pub v_x: Vec<Real>,
    pub v_y: Vec<Real>,
    pub v_z: Vec<Real>,

    pub f_x: Vec<Real>,
    pub f_y: Vec<Real>,
    pub f_z: Vec<Real>,

    shadow: Option<ShadowBuffers>,
    n: usize,
}

/// Allocate one axis worth of storage, reporting exhaustion instead of aborting
fn alloc_axis(n: usize) -> Result<Vec<Real>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(n).map_err(|_| Error::Allocation {
        what: "particle buffer",
        len: n,
    })?;
    buf.resize(n, 0.0);
    Ok(buf)
}

impl ParticleState {
    /// Size all nine (or fifteen with `include_shadow`) arrays to `n`
    ///
    /// Contents are zero but carry no meaning until an initial condition
    /// has been applied.
    pub fn allocate(n: usize, include_shadow: bool) -> Result<Self> {
        let shadow = if include_shadow {
            Some(ShadowBuffers {
                x: alloc_axis(n)?,
                y: alloc_axis(n)?,
                z: alloc_axis(n)?,
                v_x: alloc_axis(n)?,
                v_y: alloc_axis(n)?,
                v_z: alloc_axis(n)?,
            })
        } else {
            None
        };

        let state = Self {
            x: alloc_axis(n)?,
            y: alloc_axis(n)?,
            z: alloc_axis(n)?,
            v_x: alloc_axis(n)?,
            v_y: alloc_axis(n)?,
            v_z: alloc_axis(n)?,
            f_x: alloc_axis(n)?,
            f_y: alloc_axis(n)?,
            f_z: alloc_axis(n)?,
            shadow,
            n,
        };
        log::debug!("allocated {} buffers for {} particles", state.buffer_count(), n);
        Ok(state)
    }

    /// Free every owned array and return how many were freed
    pub fn release(self) -> usize {
        let freed = self.buffer_count();
        log::debug!("released {} buffers for {} particles", freed, self.n);
        freed
    }

    /// Number of particles
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Number of arrays currently owned
    pub fn buffer_count(&self) -> usize {
        if self.shadow.is_some() {
            PRIMARY_BUFFERS + SHADOW_BUFFERS
        } else {
            PRIMARY_BUFFERS
        }
    }

    pub fn has_shadow(&self) -> bool {
        self.shadow.is_some()
    }

    pub fn shadow(&self) -> Option<&ShadowBuffers> {
        self.shadow.as_ref()
    }

    pub fn shadow_mut(&mut self) -> Option<&mut ShadowBuffers> {
        self.shadow.as_mut()
    }

    /// Exchange primary positions and velocities with their shadow copies
    ///
    /// Forces are not swapped; kernels recompute them after reordering.
    pub fn swap_shadow(&mut self) -> bool {
        match self.shadow.as_mut() {
            Some(s) => {
                std::mem::swap(&mut self.x, &mut s.x);
                std::mem::swap(&mut self.y, &mut s.y);
                std::mem::swap(&mut self.z, &mut s.z);
                std::mem::swap(&mut self.v_x, &mut s.v_x);
                std::mem::swap(&mut self.v_y, &mut s.v_y);
                std::mem::swap(&mut self.v_z, &mut s.v_z);
                true
            }
            None => false,
        }
    }

    /// Move particle `i` to slot `dest[i]` by writing through the shadow
    /// arrays and swapping them in
    ///
    /// `dest` must be a permutation of `0..len()`. Returns `false` when the
    /// state has no shadow buffers.
    pub fn permute_via_shadow(&mut self, dest: &[usize]) -> bool {
        debug_assert_eq!(dest.len(), self.n);
        let Some(s) = self.shadow.as_mut() else {
            return false;
        };

        for (i, &d) in dest.iter().enumerate() {
            s.x[d] = self.x[i];
            s.y[d] = self.y[i];
            s.z[d] = self.z[i];
            s.v_x[d] = self.v_x[i];
            s.v_y[d] = self.v_y[i];
            s.v_z[d] = self.v_z[i];
        }
        self.swap_shadow()
    }

    pub fn position(&self, i: usize) -> NVec3 {
        NVec3::new(self.x[i], self.y[i], self.z[i])
    }

    pub fn velocity(&self, i: usize) -> NVec3 {
        NVec3::new(self.v_x[i], self.v_y[i], self.v_z[i])
    }

    pub fn force(&self, i: usize) -> NVec3 {
        NVec3::new(self.f_x[i], self.f_y[i], self.f_z[i])
    }

    /// Sum of forces over all particles (zero for pair potentials)
    pub fn net_force(&self) -> NVec3 {
        (0..self.n).fold(NVec3::zeros(), |acc, i| acc + self.force(i))
    }

    /// Total momentum for equal-mass particles of mass `mass`
    pub fn total_momentum(&self, mass: Real) -> NVec3 {
        (0..self.n).fold(NVec3::zeros(), |acc, i| acc + self.velocity(i)) * mass
    }

    /// Dump every particle's position and velocity at debug level
    pub fn log_particles(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        for i in 0..self.n {
            log::debug!(
                " ({:.6}, {:.6}, {:.6})\t({:.6}, {:.6}, {:.6})",
                self.x[i], self.y[i], self.z[i], self.v_x[i], self.v_y[i], self.v_z[i]
            );
        }
    }
}
