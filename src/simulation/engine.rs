//! Time-stepping engine
//!
//! A [`Simulation`] holds the run parameters and the per-axis collaborators
//! (integrator, boundary, initial condition). [`Simulation::run`] allocates
//! the particle state, then for every step:
//!
//!   1. force kernel (forces + potential energy)
//!   2. integrator on x, y, z
//!   3. periodic wrap on x, y, z
//!   4. one report line
//!
//! and releases the state and the parameters when the loop ends.

use std::io::{self, Write};

use crate::configuration::config::ParametersConfig;
use crate::error::{Error, Result};
use crate::simulation::forces::ForceKernel;
use crate::simulation::initial_condition::{CubicLattice, InitialCondition};
use crate::simulation::integrator::{Integrator, Leapfrog};
use crate::simulation::params::Parameters;
use crate::simulation::periodic::{BoundaryEnforcer, PeriodicBox};
use crate::simulation::states::{ParticleState, Real};

/// Energies of one completed step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyRecord {
    pub step: usize,
    pub ekin_x: Real,
    pub ekin_y: Real,
    pub ekin_z: Real,
    pub ekin: Real,
    pub epot: Real,
    pub etot: Real,
}

impl EnergyRecord {
    pub fn new(step: usize, ekin_x: Real, ekin_y: Real, ekin_z: Real, epot: Real) -> Self {
        let ekin = ekin_x + ekin_y + ekin_z;
        Self {
            step,
            ekin_x,
            ekin_y,
            ekin_z,
            ekin,
            epot,
            etot: ekin + epot,
        }
    }
}

/// Outcome of a completed run
///
/// `energies` is only filled when the engine was built with
/// [`Simulation::with_energy_history`]; otherwise the report is streamed and
/// only the last record is kept.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub kernel: &'static str,
    pub particles: usize,
    pub steps: usize,
    pub last: Option<EnergyRecord>,
    pub energies: Vec<EnergyRecord>,
    pub buffers_released: usize,
}

pub fn write_report_header<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{:>10}\t{:>15}\t{:>15}\t{:>15}", "Step", "Ekin", "Epot", "Etot")
}

pub fn write_report_line<W: Write>(out: &mut W, rec: &EnergyRecord) -> io::Result<()> {
    writeln!(out, "{:>10}\t{:>15.6}\t{:>15.6}\t{:>15.6}", rec.step, rec.ekin, rec.epot, rec.etot)
}

type BoxedIntegrator = Box<dyn Integrator + Send + Sync>;
type BoxedBoundary = Box<dyn BoundaryEnforcer + Send + Sync>;
type BoxedInitial = Box<dyn InitialCondition + Send + Sync>;

/// MD engine; collaborators not set explicitly default to the leapfrog
/// integrator, the periodic box and the cubic lattice
#[derive(Default)]
pub struct Simulation {
    parameters: Option<Parameters>,
    integrator: Option<BoxedIntegrator>,
    boundary: Option<BoxedBoundary>,
    initial: Option<BoxedInitial>,
    keep_energies: bool,
}

impl Simulation {
    /// An engine with no parameters loaded
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(mut self, params: Parameters) -> Self {
        self.load_parameters(params);
        self
    }

    pub fn from_config(cfg: ParametersConfig) -> Result<Self> {
        Ok(Self::new().with_parameters(Parameters::try_from(cfg)?))
    }

    pub fn load_parameters(&mut self, params: Parameters) {
        self.parameters = Some(params);
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.parameters.is_some()
    }

    pub fn with_integrator(mut self, integrator: impl Integrator + Send + Sync + 'static) -> Self {
        self.integrator = Some(Box::new(integrator));
        self
    }

    pub fn with_boundary(mut self, boundary: impl BoundaryEnforcer + Send + Sync + 'static) -> Self {
        self.boundary = Some(Box::new(boundary));
        self
    }

    pub fn with_initial_condition(mut self, initial: impl InitialCondition + Send + Sync + 'static) -> Self {
        self.initial = Some(Box::new(initial));
        self
    }

    /// Also return every step's [`EnergyRecord`] in the run summary
    pub fn with_energy_history(mut self) -> Self {
        self.keep_energies = true;
        self
    }

    /// Run all steps, reporting to stdout
    pub fn run<K: ForceKernel + ?Sized>(&mut self, kernel: &mut K) -> Result<RunSummary> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.run_with_report(kernel, &mut out)
    }

    /// Run all steps, writing the report table to `out`
    ///
    /// Fails with [`Error::MissingParameters`] before allocating anything if
    /// no parameters are loaded. Parameters and collaborators are consumed:
    /// a second run needs a fresh `load_parameters`.
    pub fn run_with_report<K, W>(&mut self, kernel: &mut K, out: &mut W) -> Result<RunSummary>
    where
        K: ForceKernel + ?Sized,
        W: Write,
    {
        let params = self.parameters.take().ok_or(Error::MissingParameters)?;
        let n = params.n;
        let n_step = params.n_step;

        let integrator = self.integrator.take().unwrap_or_else(|| Box::new(Leapfrog::new(&params)) as BoxedIntegrator);
        let boundary = self.boundary.take().unwrap_or_else(|| Box::new(PeriodicBox::new(&params)) as BoxedBoundary);
        let mut initial = self.initial.take().unwrap_or_else(|| Box::new(CubicLattice::new(&params)) as BoxedInitial);

        let mut state = ParticleState::allocate(n, kernel.requires_shadow())?;
        initial.apply(&mut state);

        log::info!(
            "simulation: {} steps, {} particles, dt = {}, L = {:.4}, kernel `{}`",
            n_step, n, params.dt, params.box_length, kernel.name()
        );

        write_report_header(out)?;
        let mut energies = Vec::new();
        let mut last = None;

        for step in 1..=n_step {
            // 1. Compute force
            let epot = kernel.compute(&mut state)?;

            // 2. Integrate
            let ekin_x = integrator.integrate(&mut state.x, &mut state.v_x, &state.f_x);
            let ekin_y = integrator.integrate(&mut state.y, &mut state.v_y, &state.f_y);
            let ekin_z = integrator.integrate(&mut state.z, &mut state.v_z, &state.f_z);

            // 3. Periodic boundary, on post-integration positions
            boundary.wrap(&mut state.x);
            boundary.wrap(&mut state.y);
            boundary.wrap(&mut state.z);

            // 4. Report
            let record = EnergyRecord::new(step, ekin_x, ekin_y, ekin_z, epot);
            write_report_line(out, &record)?;
            if self.keep_energies {
                energies.push(record);
            }
            last = Some(record);
        }
        out.flush()?;

        state.log_particles();
        let buffers_released = state.release();
        log::info!("simulation finished after {} steps", n_step);

        Ok(RunSummary {
            kernel: kernel.name(),
            particles: n,
            steps: n_step,
            last,
            energies,
            buffers_released,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_columns_are_fixed_width() {
        let mut out = Vec::new();
        write_report_header(&mut out).unwrap();
        write_report_line(&mut out, &EnergyRecord::new(3, 1.0, 2.0, 0.5, -1.25)).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], format!("{:>10}\t{:>15}\t{:>15}\t{:>15}", "Step", "Ekin", "Epot", "Etot"));
        assert_eq!(lines[1], "         3\t       3.500000\t      -1.250000\t       2.250000");
    }

    #[test]
    fn unconfigured_engine_refuses_to_run() {
        let mut sim = Simulation::new();
        let mut kernel = crate::simulation::forces::LennardJonesReference {
            lj: crate::simulation::forces::LennardJones { eps: 1.0, sig2: 1.0, r_cut2: 1.0, box_length: 1.0 },
        };
        let mut out = Vec::new();
        assert!(matches!(sim.run_with_report(&mut kernel, &mut out), Err(Error::MissingParameters)));
        assert!(out.is_empty());
    }

    /// Keeps the level of every particle dump line
    struct DumpCapture(std::sync::Mutex<Vec<log::Level>>);

    impl log::Log for DumpCapture {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            if record.target().ends_with("simulation::states") && record.args().to_string().starts_with(" (") {
                self.0.lock().unwrap().push(record.level());
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: DumpCapture = DumpCapture(std::sync::Mutex::new(Vec::new()));

    #[test]
    fn final_particle_dump_is_logged_at_debug() {
        let _ = log::set_logger(&CAPTURE);
        log::set_max_level(log::LevelFilter::Debug);

        let cfg = ParametersConfig { n: 3, n_step: 0, ..Default::default() };
        let params = Parameters::try_from(cfg).unwrap();
        let mut kernel = crate::simulation::forces::LennardJonesReference::new(&params);
        Simulation::new()
            .with_parameters(params)
            .run_with_report(&mut kernel, &mut io::sink())
            .unwrap();

        let levels = CAPTURE.0.lock().unwrap();
        assert!(levels.len() >= 3, "expected one dump line per particle, got {}", levels.len());
        assert!(levels.iter().all(|&l| l == log::Level::Debug));
    }

    #[test]
    fn report_is_streamed_without_reserving_per_step() {
        struct FailSecond(usize);
        impl ForceKernel for FailSecond {
            fn name(&self) -> &'static str {
                "fail-second"
            }
            fn compute(&mut self, _state: &mut ParticleState) -> Result<Real> {
                self.0 += 1;
                if self.0 == 2 {
                    return Err(Error::kernel("stop"));
                }
                Ok(0.0)
            }
        }

        let cfg = ParametersConfig { n: 8, n_step: usize::MAX / 8, ..Default::default() };
        let mut sim = Simulation::new().with_parameters(Parameters::try_from(cfg).unwrap());
        let mut out = Vec::new();

        let err = sim.run_with_report(&mut FailSecond(0), &mut out).unwrap_err();
        assert!(matches!(err, Error::Kernel(_)));
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }

    #[test]
    fn energy_history_is_opt_in() {
        let cfg = ParametersConfig { n: 8, n_step: 4, ..Default::default() };
        let params = Parameters::try_from(cfg).unwrap();
        let mut kernel = crate::simulation::forces::LennardJonesReference::new(&params);

        let streamed = Simulation::new()
            .with_parameters(params.clone())
            .run_with_report(&mut kernel, &mut io::sink())
            .unwrap();
        assert!(streamed.energies.is_empty());
        assert_eq!(streamed.steps, 4);
        assert_eq!(streamed.last.map(|r| r.step), Some(4));

        let kept = Simulation::new()
            .with_parameters(params)
            .with_energy_history()
            .run_with_report(&mut kernel, &mut io::sink())
            .unwrap();
        assert_eq!(kept.energies.len(), 4);
        assert_eq!(kept.energies.last().copied(), kept.last);
    }
}
