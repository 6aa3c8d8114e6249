//! Process-level configuration read from the environment.
//!
//! The kernel itself is stateless; these settings only seed defaults for
//! artifact loading and simulation configs. Hosts may construct
//! [`KernelSettings`] directly instead of going through the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::SimulationConfig;

/// Default valuation deadline in seconds.
pub const DEFAULT_DEADLINE_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct KernelSettings {
    /// Directory holding `manifest.json` and the model artifacts.
    pub artifact_root: PathBuf,
    /// Survival-curve variant to select; the manifest default when absent.
    pub curve_variant: Option<String>,
    /// Flat annual discount rate overriding per-scenario rates.
    pub discount_rate: Option<f64>,
    /// APEX2 seasoning ramp horizon in months.
    pub seasoning_ramp_months: u32,
    /// Log-normal shock volatility.
    pub shock_sigma: f64,
    /// Common-factor loading.
    pub shock_rho: f64,
    /// Default number of stochastic draws per scenario.
    pub default_draws: u32,
    /// Worker-pool size; `None` means the machine's CPU count.
    pub worker_threads: Option<usize>,
    /// Valuation deadline in seconds.
    pub deadline_secs: u64,
}

impl Default for KernelSettings {
    fn default() -> Self {
        KernelSettings {
            artifact_root: PathBuf::from("./models"),
            curve_variant: None,
            discount_rate: None,
            seasoning_ramp_months: 30,
            shock_sigma: 0.15,
            shock_rho: 0.30,
            default_draws: 100,
            worker_threads: None,
            deadline_secs: DEFAULT_DEADLINE_SECS,
        }
    }
}

impl KernelSettings {
    /// Reads settings from `OPENMORT_*` environment variables, keeping the
    /// documented default for anything absent or unparseable.
    pub fn from_env() -> Self {
        let base = KernelSettings::default();
        KernelSettings {
            artifact_root: env::var("OPENMORT_ARTIFACT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(base.artifact_root),
            curve_variant: env::var("OPENMORT_CURVE_VARIANT").ok().filter(|v| !v.is_empty()),
            discount_rate: parse_var("OPENMORT_DISCOUNT_RATE"),
            seasoning_ramp_months: parse_var("OPENMORT_SEASONING_RAMP")
                .unwrap_or(base.seasoning_ramp_months),
            shock_sigma: parse_var("OPENMORT_SHOCK_SIGMA").unwrap_or(base.shock_sigma),
            shock_rho: parse_var("OPENMORT_SHOCK_RHO").unwrap_or(base.shock_rho),
            default_draws: parse_var("OPENMORT_DRAWS").unwrap_or(base.default_draws),
            worker_threads: parse_var("OPENMORT_THREADS"),
            deadline_secs: parse_var("OPENMORT_DEADLINE_SECS").unwrap_or(base.deadline_secs),
        }
    }

    /// A [`SimulationConfig`] seeded with these process defaults.
    pub fn simulation_defaults(&self) -> SimulationConfig {
        SimulationConfig {
            n_draws: self.default_draws,
            discount_rate: self.discount_rate,
            seasoning_ramp_months: self.seasoning_ramp_months,
            shock_sigma: self.shock_sigma,
            shock_rho: self.shock_rho,
            ..SimulationConfig::default()
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring unparseable {name}={raw}");
            None
        }
    }
}
