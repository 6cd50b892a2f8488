pub mod error;
pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use error::{Error, Result};

pub use simulation::states::{ParticleState, ShadowBuffers, Real, NVec3};
pub use simulation::params::Parameters;
pub use simulation::engine::{Simulation, RunSummary, EnergyRecord};
pub use simulation::forces::{ForceKernel, KernelKind, LennardJones, LennardJonesReference, LennardJonesCellList};
pub use simulation::integrator::{Integrator, Leapfrog};
pub use simulation::periodic::{BoundaryEnforcer, PeriodicBox};
pub use simulation::initial_condition::{InitialCondition, CubicLattice};

pub use configuration::config::ParametersConfig;

pub use benchmark::timer::{MeasurementSession, Timer, CycleCounter, Tsc, read_cycle_counter, start, stop};
pub use benchmark::benchmark::{KernelBenchmark, bench_kernel, bench_force_kernels, bench_force_curve};
