//! Configuration types for loading simulation parameters
//!
//! [`ParametersConfig`] is the `serde`-facing form of the run parameters. It
//! can be read from two kinds of source:
//!
//! - `key = value` text, one parameter per line
//! - YAML, for files ending in `.yaml` / `.yml`
//!
//! # Key/value format
//!
//! ```text
//! # Lennard-Jones fluid near the triple point
//! N       = 1000
//! Nstep   = 100
//! dt      = 0.005
//! rho     = 1.25
//! mass    = 1.0
//! Rcut    = 2.5
//! epsLJ   = 1.0
//! sigLJ   = 1.0
//! scaling = 0.05
//! seed    = 42
//! kernel  = cell-list
//! ```
//!
//! Each key/value line becomes one entry of a YAML mapping, with the value
//! typed as a YAML scalar, so both sources go through the same deserializer.
//! Keys that are not recognized are logged and ignored; keys that are missing
//! take the defaults below.
//!
//! Key/value text is more forgiving than YAML: the integer keys (`N`, `Nstep`,
//! `seed`) also accept whole numbers written as floats (`1e3`, `1000.0`), and
//! a key given twice keeps its last value with a warning. In YAML files a
//! duplicated key is an error.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};
use crate::simulation::forces::KernelKind;

/// Every key understood by [`ParametersConfig`]
pub const KNOWN_KEYS: [&str; 11] = [
    "N", "Nstep", "dt", "rho", "mass", "Rcut", "epsLJ", "sigLJ", "scaling", "seed", "kernel",
];

/// Keys holding counts, which key/value text may write in float notation
const INTEGER_KEYS: [&str; 3] = ["N", "Nstep", "seed"];

/// Run parameters as they appear in a configuration source
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ParametersConfig {
    #[serde(rename = "N")]
    pub n: usize, // number of particles
    #[serde(rename = "Nstep")]
    pub n_step: usize, // number of time steps
    pub dt: f64,   // time step
    pub rho: f64,  // number density, sets the box length
    pub mass: f64, // particle mass
    #[serde(rename = "Rcut")]
    pub r_cut: f64, // interaction cutoff radius
    #[serde(rename = "epsLJ")]
    pub eps_lj: f64, // Lennard-Jones well depth
    #[serde(rename = "sigLJ")]
    pub sig_lj: f64, // Lennard-Jones length scale
    pub scaling: f64,        // initial velocity amplitude
    pub seed: u64,           // seed for initial velocities
    pub kernel: KernelKind,  // force kernel used by the binary
}

impl Default for ParametersConfig {
    fn default() -> Self {
        Self {
            n: 1000,
            n_step: 100,
            dt: 0.005,
            rho: 1.25,
            mass: 1.0,
            r_cut: 2.5,
            eps_lj: 1.0,
            sig_lj: 1.0,
            scaling: 0.05,
            seed: 42,
            kernel: KernelKind::Reference,
        }
    }
}

impl ParametersConfig {
    /// Parse YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;

        // An empty document means "all defaults"
        let mapping = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(m) => m,
            _ => return Err(Error::Config("expected a mapping of parameter keys".into())),
        };
        Self::from_mapping(mapping)
    }

    fn from_mapping(mapping: Mapping) -> Result<Self> {
        for key in mapping.keys() {
            match key.as_str() {
                Some(k) if KNOWN_KEYS.contains(&k) => {}
                _ => log::warn!("ignoring unknown configuration key {:?}", key),
            }
        }

        serde_yaml::from_value(Value::Mapping(mapping)).map_err(|e| Error::Config(e.to_string()))
    }

    /// Parse `key = value` text
    pub fn from_key_value_str(text: &str) -> Result<Self> {
        Self::from_mapping(key_value_mapping(text)?)
    }

    /// Load from a file, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        let cfg = if is_yaml {
            Self::from_yaml_str(&text)?
        } else {
            Self::from_key_value_str(&text)?
        };
        log::info!("loaded parameters from {}", path.display());
        Ok(cfg)
    }
}

/// Collect `key = value` lines into a mapping of YAML scalars
fn key_value_mapping(text: &str) -> Result<Mapping> {
    let mut mapping = Mapping::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::Config(format!("line {}: expected `key = value`, found `{}`", lineno + 1, line))
        })?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(Error::Config(format!("line {}: empty key or value", lineno + 1)));
        }

        let mut scalar: Value =
            serde_yaml::from_str(value).map_err(|e| Error::Config(format!("line {}: {}", lineno + 1, e)))?;
        if INTEGER_KEYS.contains(&key) {
            scalar = whole_number(scalar);
        }

        if mapping.insert(Value::String(key.to_owned()), scalar).is_some() {
            log::warn!("line {}: `{}` given more than once, keeping the last value", lineno + 1, key);
        }
    }

    Ok(mapping)
}

/// `1e3` or `1000.0` as the integer 1000; anything else unchanged
fn whole_number(value: Value) -> Value {
    match value.as_f64() {
        Some(x) if value.is_f64() && x >= 0.0 && x.fract() == 0.0 && x < u64::MAX as f64 => {
            Value::Number((x as u64).into())
        }
        _ => value,
    }
}
