use crate::benchmark::timer::MeasurementSession;
use crate::error::Result;
use crate::simulation::forces::{ForceKernel, KernelKind};
use crate::simulation::initial_condition::{CubicLattice, InitialCondition};
use crate::simulation::params::Parameters;
use crate::simulation::states::ParticleState;

/// Median cost of one force evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct KernelBenchmark {
    pub kernel: &'static str,
    pub n: usize,
    pub repetitions: usize,
    pub median_cycles: u64,
}

/// Time `repetitions` force evaluations of `kernel` on a lattice of
/// `params.n` particles and return the median cycle count
pub fn bench_kernel<K: ForceKernel + ?Sized>(
    kernel: &mut K,
    params: &Parameters,
    repetitions: usize,
) -> Result<KernelBenchmark> {
    let mut state = ParticleState::allocate(params.n, kernel.requires_shadow())?;
    CubicLattice::new(params).apply(&mut state);

    // Warm up caches and the cell list
    kernel.compute(&mut state)?;

    let mut session = MeasurementSession::new(repetitions)?;
    for _ in 0..repetitions {
        session.mark()?;
        let epot = kernel.compute(&mut state);
        session.record()?;
        epot?;
    }
    let median_cycles = session.finish()?;
    state.release();

    log::debug!("{}: N = {}, median {} cycles", kernel.name(), params.n, median_cycles);

    Ok(KernelBenchmark {
        kernel: kernel.name(),
        n: params.n,
        repetitions,
        median_cycles,
    })
}

/// Benchmark every kernel variant at the configured particle count
pub fn bench_force_kernels(params: &Parameters, repetitions: usize) -> Result<Vec<KernelBenchmark>> {
    let mut results = Vec::with_capacity(KernelKind::ALL.len());

    for kind in KernelKind::ALL {
        let mut kernel = kind.build(params);
        let bench = bench_kernel(kernel.as_mut(), params, repetitions)?;
        println!(
            "N = {:6}, {:>10} = {:14} cycles (median of {})",
            bench.n, bench.kernel, bench.median_cycles, bench.repetitions
        );
        results.push(bench);
    }

    Ok(results)
}

/// Median cycles per kernel over a range of N at fixed density
/// Paste output directly into a spreadsheet to graph
pub fn bench_force_curve(
    base: &Parameters,
    ns: impl IntoIterator<Item = usize>,
    repetitions: usize,
) -> Result<Vec<Vec<KernelBenchmark>>> {
    let header: Vec<&str> = KernelKind::ALL.iter().map(|k| k.name()).collect();
    println!("N,{}", header.join(","));

    let mut rows = Vec::new();
    for n in ns {
        let params = base.with_particle_count(n)?;

        // Small n: more repetitions to smooth noise
        // Large n: fewer to keep the sweep short
        let reps = if n <= 1000 { repetitions } else { (repetitions / 4).max(1) };

        let mut row = Vec::with_capacity(KernelKind::ALL.len());
        for kind in KernelKind::ALL {
            let mut kernel = kind.build(&params);
            row.push(bench_kernel(kernel.as_mut(), &params, reps)?);
        }

        let cycles: Vec<String> = row.iter().map(|b| b.median_cycles.to_string()).collect();
        println!("{},{}", n, cycles.join(","));
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::config::ParametersConfig;

    fn small_params() -> Parameters {
        Parameters::try_from(ParametersConfig { n: 64, rho: 0.5, ..Default::default() }).unwrap()
    }

    #[test]
    fn bench_reports_each_kernel() {
        let results = bench_force_kernels(&small_params(), 3).unwrap();
        let names: Vec<&str> = results.iter().map(|b| b.kernel).collect();
        assert_eq!(names, vec!["reference", "cell-list"]);
        assert!(results.iter().all(|b| b.n == 64 && b.repetitions == 3));
    }

    #[test]
    fn curve_has_one_row_per_size() {
        let rows = bench_force_curve(&small_params(), [8, 27], 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0].n, 27);
    }

    #[test]
    fn zero_repetitions_is_an_error() {
        let mut kernel = KernelKind::Reference.build(&small_params());
        assert!(bench_kernel(kernel.as_mut(), &small_params(), 0).is_err());
    }
}
