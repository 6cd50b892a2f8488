//! Force kernels for the MD engine
//!
//! A [`ForceKernel`] overwrites the force arrays of a [`ParticleState`] for
//! its current positions and returns the potential energy. Two Lennard-Jones
//! variants are provided:
//! - [`LennardJonesReference`]: direct all-pairs sum
//! - [`LennardJonesCellList`]: linked cells, reorders particles through the
//!   shadow buffers

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::simulation::params::Parameters;
use crate::simulation::states::{ParticleState, Real};

/// Strategy computing forces and potential energy for the current positions
///
/// Implementations must fully overwrite `f_x`, `f_y`, `f_z` and must not
/// resize any array. They may reorder particles as long as every array is
/// permuted the same way.
pub trait ForceKernel {
    fn name(&self) -> &'static str;

    /// Whether the state must be allocated with shadow buffers
    fn requires_shadow(&self) -> bool {
        false
    }

    fn compute(&mut self, state: &mut ParticleState) -> Result<Real>;
}

/// Force kernel variants selectable from configuration or the command line
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KernelKind {
    #[default]
    Reference,
    CellList,
}

impl KernelKind {
    pub const ALL: [KernelKind; 2] = [KernelKind::Reference, KernelKind::CellList];

    pub fn name(self) -> &'static str {
        match self {
            KernelKind::Reference => "reference",
            KernelKind::CellList => "cell-list",
        }
    }

    /// Build the kernel for the given parameters
    pub fn build(self, params: &Parameters) -> Box<dyn ForceKernel + Send + Sync> {
        match self {
            KernelKind::Reference => Box::new(LennardJonesReference::new(params)),
            KernelKind::CellList => Box::new(LennardJonesCellList::new(params)),
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KernelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        KernelKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| Error::UnknownKernel(s.to_owned()))
    }
}

/// Truncated Lennard-Jones pair potential in a periodic cube
#[derive(Debug, Clone, Copy)]
pub struct LennardJones {
    pub eps: Real,
    pub sig2: Real,
    pub r_cut2: Real,
    pub box_length: Real,
}

impl LennardJones {
    pub fn new(params: &Parameters) -> Self {
        Self {
            eps: params.eps_lj,
            sig2: params.sig_lj * params.sig_lj,
            r_cut2: params.r_cut * params.r_cut,
            box_length: params.box_length,
        }
    }

    /// Shortest periodic image of a separation along one axis
    #[inline]
    pub fn minimum_image(&self, d: Real) -> Real {
        d - self.box_length * (d / self.box_length).round()
    }

    /// Force magnitude over distance and pair energy at squared distance `r2`
    ///
    /// `None` beyond the cutoff. The force on i from j is `f * (x_i - x_j)`.
    #[inline]
    pub fn pair(&self, r2: Real) -> Option<(Real, Real)> {
        if r2 > self.r_cut2 {
            return None;
        }
        let sr2 = self.sig2 / r2;
        let sr6 = sr2 * sr2 * sr2;
        let f = 24.0 * self.eps * sr6 * (2.0 * sr6 - 1.0) / r2;
        let u = 4.0 * self.eps * sr6 * (sr6 - 1.0);
        Some((f, u))
    }

    /// Accumulate the i-j interaction into the force arrays, return its energy
    #[inline]
    fn interact(&self, state: &mut ParticleState, i: usize, j: usize) -> Real {
        let dx = self.minimum_image(state.x[i] - state.x[j]);
        let dy = self.minimum_image(state.y[i] - state.y[j]);
        let dz = self.minimum_image(state.z[i] - state.z[j]);
        let r2 = dx * dx + dy * dy + dz * dz;

        match self.pair(r2) {
            Some((f, u)) => {
                state.f_x[i] += f * dx;
                state.f_y[i] += f * dy;
                state.f_z[i] += f * dz;
                state.f_x[j] -= f * dx;
                state.f_y[j] -= f * dy;
                state.f_z[j] -= f * dz;
                u
            }
            None => 0.0,
        }
    }
}

fn zero_forces(state: &mut ParticleState) {
    state.f_x.fill(0.0);
    state.f_y.fill(0.0);
    state.f_z.fill(0.0);
}

/// Direct O(N^2) Lennard-Jones sum over unordered pairs
#[derive(Debug, Clone)]
pub struct LennardJonesReference {
    pub lj: LennardJones,
}

impl LennardJonesReference {
    pub fn new(params: &Parameters) -> Self {
        Self { lj: LennardJones::new(params) }
    }
}

impl ForceKernel for LennardJonesReference {
    fn name(&self) -> &'static str {
        KernelKind::Reference.name()
    }

    fn compute(&mut self, state: &mut ParticleState) -> Result<Real> {
        zero_forces(state);
        let n = state.len();
        let mut epot = 0.0;

        for i in 0..n {
            for j in (i + 1)..n {
                epot += self.lj.interact(state, i, j);
            }
        }
        Ok(epot)
    }
}

/// Largest `m` with `m^3 <= n`, at least 1
fn cells_per_axis_limit(n: usize) -> usize {
    let mut m = ((n as Real).cbrt().floor() as usize).max(1);
    while m > 1 && m.saturating_pow(3) > n {
        m -= 1;
    }
    while (m + 1).saturating_pow(3) <= n {
        m += 1;
    }
    m
}

/// Linked-cell Lennard-Jones kernel
///
/// The box is split into `m^3` cells of side `L / m >= Rcut`, with `m^3`
/// capped at the particle count so a tiny cutoff cannot blow up the grid;
/// the cells then just get wider than `Rcut`. Each call sorts
/// particles by cell (through the shadow buffers) and then visits every
/// particle pair in the same or an adjacent cell exactly once.
#[derive(Debug, Clone)]
pub struct LennardJonesCellList {
    pub lj: LennardJones,
    cells_per_axis: usize,
    cell_len: Real,
    // cell c owns sorted slots cell_start[c]..cell_start[c + 1]
    cell_start: Vec<usize>,
    // distinct neighbour cells with a higher index, per cell
    neighbors: Vec<Vec<usize>>,
    dest: Vec<usize>,
}

impl LennardJonesCellList {
    pub fn new(params: &Parameters) -> Self {
        let lj = LennardJones::new(params);
        let m = ((params.box_length / params.r_cut).floor() as usize).clamp(1, cells_per_axis_limit(params.n));
        let cells = m * m * m;

        let index = |x: usize, y: usize, z: usize| (x * m + y) * m + z;
        let wrap = |c: usize, d: isize| (c as isize + d).rem_euclid(m as isize) as usize;

        let mut neighbors = Vec::with_capacity(cells);
        for cx in 0..m {
            for cy in 0..m {
                for cz in 0..m {
                    let me = index(cx, cy, cz);
                    let mut adj = Vec::with_capacity(26);
                    for dx in -1..=1 {
                        for dy in -1..=1 {
                            for dz in -1..=1 {
                                let other = index(wrap(cx, dx), wrap(cy, dy), wrap(cz, dz));
                                if other > me {
                                    adj.push(other);
                                }
                            }
                        }
                    }
                    // small boxes wrap onto the same cell more than once
                    adj.sort_unstable();
                    adj.dedup();
                    neighbors.push(adj);
                }
            }
        }

        log::debug!("cell list: {m}^3 cells of side {:.4}", params.box_length / m as Real);

        Self {
            lj,
            cells_per_axis: m,
            cell_len: params.box_length / m as Real,
            cell_start: vec![0; cells + 1],
            neighbors,
            dest: Vec::new(),
        }
    }

    pub fn cells_per_axis(&self) -> usize {
        self.cells_per_axis
    }

    #[inline]
    fn axis_cell(&self, x: Real) -> usize {
        let m = self.cells_per_axis as isize;
        ((x / self.cell_len).floor() as isize).rem_euclid(m) as usize
    }

    fn cell_of(&self, state: &ParticleState, i: usize) -> usize {
        let m = self.cells_per_axis;
        (self.axis_cell(state.x[i]) * m + self.axis_cell(state.y[i])) * m + self.axis_cell(state.z[i])
    }

    /// Counting sort of particles by cell, applied through the shadow buffers
    fn rebuild(&mut self, state: &mut ParticleState) -> Result<()> {
        let n = state.len();
        let cells = self.neighbors.len();

        let owner: Vec<usize> = (0..n).map(|i| self.cell_of(state, i)).collect();

        self.cell_start.fill(0);
        for &c in &owner {
            self.cell_start[c + 1] += 1;
        }
        for c in 0..cells {
            self.cell_start[c + 1] += self.cell_start[c];
        }

        let mut cursor = self.cell_start[..cells].to_vec();
        self.dest.clear();
        self.dest.extend(owner.iter().map(|&c| {
            let slot = cursor[c];
            cursor[c] += 1;
            slot
        }));

        if !state.permute_via_shadow(&self.dest) {
            return Err(Error::MissingShadow(self.name()));
        }
        Ok(())
    }
}

impl ForceKernel for LennardJonesCellList {
    fn name(&self) -> &'static str {
        KernelKind::CellList.name()
    }

    fn requires_shadow(&self) -> bool {
        true
    }

    fn compute(&mut self, state: &mut ParticleState) -> Result<Real> {
        self.rebuild(state)?;
        zero_forces(state);

        let mut epot = 0.0;
        for c in 0..self.neighbors.len() {
            let (start, end) = (self.cell_start[c], self.cell_start[c + 1]);

            for i in start..end {
                for j in (i + 1)..end {
                    epot += self.lj.interact(state, i, j);
                }
                for &nc in &self.neighbors[c] {
                    for j in self.cell_start[nc]..self.cell_start[nc + 1] {
                        epot += self.lj.interact(state, i, j);
                    }
                }
            }
        }
        Ok(epot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::config::ParametersConfig;
    use crate::simulation::initial_condition::{CubicLattice, InitialCondition};

    fn params(n: usize, rho: Real) -> Parameters {
        Parameters::try_from(ParametersConfig { n, rho, ..Default::default() }).unwrap()
    }

    fn pair_state(dist: Real) -> ParticleState {
        let mut state = ParticleState::allocate(2, true).unwrap();
        state.x = vec![1.0, 1.0 + dist];
        state.y = vec![1.0, 1.0];
        state.z = vec![1.0, 1.0];
        state
    }

    #[test]
    fn force_vanishes_at_potential_minimum() {
        let p = params(2, 0.001);
        let mut kernel = LennardJonesReference::new(&p);
        let mut state = pair_state(2.0_f64.powf(1.0 / 6.0));

        let epot = kernel.compute(&mut state).unwrap();
        assert!(state.f_x[0].abs() < 1e-12);
        assert!((epot + 1.0).abs() < 1e-12, "well depth should be -eps, got {epot}");
    }

    #[test]
    fn close_pair_repels() {
        let p = params(2, 0.001);
        let mut kernel = LennardJonesReference::new(&p);
        let mut state = pair_state(0.9);

        kernel.compute(&mut state).unwrap();
        assert!(state.f_x[0] < 0.0);
        assert!(state.f_x[1] > 0.0);
        assert!(state.net_force().norm() < 1e-12);
    }

    #[test]
    fn beyond_cutoff_no_interaction() {
        let p = params(2, 0.001);
        let mut kernel = LennardJonesReference::new(&p);
        let mut state = pair_state(p.r_cut + 0.1);

        let epot = kernel.compute(&mut state).unwrap();
        assert_eq!(epot, 0.0);
        assert_eq!(state.f_x, vec![0.0, 0.0]);
    }

    #[test]
    fn minimum_image_uses_nearest_copy() {
        let p = params(8, 1.0); // L = 2
        let lj = LennardJones::new(&p);
        assert!((lj.minimum_image(1.5) + 0.5).abs() < 1e-12);
        assert!((lj.minimum_image(-1.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn cell_list_without_shadow_fails() {
        let p = params(2, 0.001);
        let mut kernel = LennardJonesCellList::new(&p);
        let mut state = ParticleState::allocate(2, false).unwrap();
        assert!(matches!(kernel.compute(&mut state), Err(Error::MissingShadow("cell-list"))));
    }

    #[test]
    fn neighbour_lists_are_deduplicated_in_small_boxes() {
        let p = params(8, 0.1); // L ~ 4.3, one cell per axis at Rcut 2.5
        let kernel = LennardJonesCellList::new(&p);
        assert_eq!(kernel.cells_per_axis(), 1);
        assert!(kernel.neighbors[0].is_empty());
    }

    #[test]
    fn tiny_cutoff_caps_the_grid_at_particle_count() {
        let cfg = ParametersConfig { n: 8, r_cut: 1e-6, ..Default::default() };
        let p = Parameters::try_from(cfg).unwrap();
        let mut kernel = LennardJonesCellList::new(&p);
        assert_eq!(kernel.cells_per_axis(), 2);

        let mut state = ParticleState::allocate(8, true).unwrap();
        CubicLattice::new(&p).apply(&mut state);
        assert_eq!(kernel.compute(&mut state).unwrap(), 0.0);
    }

    #[test]
    fn grid_limit_is_integer_cube_root() {
        assert_eq!(cells_per_axis_limit(1), 1);
        assert_eq!(cells_per_axis_limit(7), 1);
        assert_eq!(cells_per_axis_limit(8), 2);
        assert_eq!(cells_per_axis_limit(1000), 10);
        assert_eq!(cells_per_axis_limit(1001), 10);
    }

    #[test]
    fn kernel_kind_round_trips_through_str() {
        for kind in KernelKind::ALL {
            assert_eq!(kind.name().parse::<KernelKind>().unwrap(), kind);
        }
        assert!("fft".parse::<KernelKind>().is_err());
    }
}
