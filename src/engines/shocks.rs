//! Correlated log-normal hazard shocks for the Monte Carlo driver.
//!
//! One macro factor stream `Z[t]` is drawn per `(scenario, draw)` and
//! shared by every loan in the package; each loan adds idiosyncratic
//! normals. Stream seeds are derived by mixing the base seed with the
//! `(scenario, draw, loan)` coordinates so every tuple owns an
//! independent, reproducible stream with no shared mutable RNG.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

/// Prepayment shocks run at half the default-shock volatility and with the
/// macro loading negated: a downturn that raises defaults slows refis.
pub const PREPAY_SIGMA_SCALE: f64 = 0.5;

/// Stream tag reserved for the package-wide macro factor.
const MACRO_STREAM_TAG: u64 = u64::MAX;

/// Shock distribution parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShockParams {
    /// Log-normal volatility applied to default and delinquency hazards.
    pub sigma: f64,
    /// Common-factor loading in `[0, 1)`.
    pub rho: f64,
}

/// Per-month multipliers for one `(scenario, draw, loan)` tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct ShockPath {
    /// Applied to the default and delinquency hazards.
    pub default_mult: Vec<f64>,
    /// Applied to the prepayment hazard or extra-principal amount.
    pub prepay_mult: Vec<f64>,
}

impl ShockPath {
    /// The degenerate all-ones path used when stochastics are off.
    pub fn flat(months: usize) -> Self {
        ShockPath {
            default_mult: vec![1.0; months],
            prepay_mult: vec![1.0; months],
        }
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derives a deterministic stream seed from the base seed and coordinate
/// tags. Distinct tag tuples map to independent streams.
pub fn stream_seed(base_seed: u64, tags: &[u64]) -> u64 {
    let mut state = base_seed;
    let mut out = splitmix64(&mut state);
    for &tag in tags {
        state ^= tag.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        out = splitmix64(&mut state);
    }
    out
}

/// The macro factor sequence `Z[1..=months]` for a `(scenario, draw)` pair.
pub fn macro_factors(base_seed: u64, scenario_idx: usize, draw: u32, months: usize) -> Vec<f64> {
    let seed = stream_seed(base_seed, &[scenario_idx as u64, draw as u64, MACRO_STREAM_TAG]);
    let mut rng = StdRng::seed_from_u64(seed);
    (0..months).map(|_| StandardNormal.sample(&mut rng)).collect()
}

/// A loan's shock path given the shared macro factors.
pub fn loan_shock_path(
    base_seed: u64,
    scenario_idx: usize,
    draw: u32,
    loan_idx: usize,
    macro_z: &[f64],
    params: ShockParams,
) -> ShockPath {
    let seed = stream_seed(
        base_seed,
        &[scenario_idx as u64, draw as u64, loan_idx as u64],
    );
    let mut rng = StdRng::seed_from_u64(seed);
    let rho = params.rho.clamp(0.0, 0.999_999);
    let sqrt_term = (1.0 - rho * rho).sqrt();
    let sigma_p = params.sigma * PREPAY_SIGMA_SCALE;

    let mut default_mult = Vec::with_capacity(macro_z.len());
    let mut prepay_mult = Vec::with_capacity(macro_z.len());
    for &z in macro_z {
        let eps_d: f64 = StandardNormal.sample(&mut rng);
        let eps_p: f64 = StandardNormal.sample(&mut rng);
        default_mult.push((params.sigma * (rho * z + sqrt_term * eps_d)).exp());
        prepay_mult.push((sigma_p * (-rho * z + sqrt_term * eps_p)).exp());
    }
    ShockPath {
        default_mult,
        prepay_mult,
    }
}
