use ljmd::{bench_force_curve, bench_force_kernels};
use ljmd::{KernelKind, Parameters, ParametersConfig, Simulation};

use anyhow::{Context, Result};
use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Lennard-Jones molecular dynamics with cycle-accurate kernel benchmarks")]
struct Args {
    /// Parameter file (`key = value` or YAML); looked up under configs/ if not found as given
    #[arg(short, default_value = "ljmd.cfg")]
    file_name: String,

    /// Force kernel, overriding the `kernel` key of the parameter file
    #[arg(short, long)]
    kernel: Option<KernelKind>,

    /// Benchmark every force kernel with this many repetitions instead of simulating
    #[arg(long)]
    bench: Option<usize>,

    /// With --bench, sweep N and print a CSV of median cycles
    #[arg(long, requires = "bench")]
    curve: bool,
}

// resolve here to keep main clean
fn config_path(file_name: &str) -> PathBuf {
    let direct = PathBuf::from(file_name);
    if direct.exists() {
        return direct;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs").join(file_name)
}

fn load_parameters(args: &Args) -> Result<Parameters> {
    let path = config_path(&args.file_name);
    let mut cfg = ParametersConfig::load(&path)
        .with_context(|| format!("failed to load parameters from {}", path.display()))?;

    if let Some(kernel) = args.kernel {
        cfg.kernel = kernel;
    }
    Parameters::try_from(cfg).context("invalid parameters")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let params = load_parameters(&args)?;

    if let Some(reps) = args.bench {
        if args.curve {
            bench_force_curve(&params, (1..=16).map(|k| 250 * k), reps)?;
        } else {
            bench_force_kernels(&params, reps)?;
        }
        return Ok(());
    }

    let mut kernel = params.kernel.build(&params);
    println!("\n      ================ LJMD - Simulation steps ================\n");

    let summary = Simulation::new()
        .with_parameters(params)
        .run(kernel.as_mut())
        .context("simulation aborted")?;

    log::info!(
        "{} kernel, {} particles, {} steps, released {} buffers",
        summary.kernel,
        summary.particles,
        summary.steps,
        summary.buffers_released
    );

    Ok(())
}
