//! Formula-based competing-risk prepayment hazard.
//!
//! The stub tier of the prepayment model: a per-leaf base CPR shaped by a
//! PSA-style seasoning ramp and a rate-incentive factor, converted to a
//! single monthly mortality. Calibrated to an 8-10 year effective life on
//! typical non-prime tapes.

use crate::core::LeafId;
use crate::prepay::apex2::seasoning_ramp;

/// Base annual CPR per leaf. Better credit has better refinance access.
const BASE_CPR: [f64; 5] = [0.12, 0.10, 0.07, 0.04, 0.02];
const DEFAULT_CPR: f64 = 0.07;

/// Hard cap on the annual CPR after adjustments.
const MAX_CPR: f64 = 0.60;

/// Market mortgage rate anchoring the incentive factor.
pub const MARKET_RATE: f64 = 0.065;

/// Converts an annual CPR into a single monthly mortality.
///
/// `SMM = 1 − (1 − CPR)^(1/12)`.
pub fn cpr_to_smm(cpr: f64) -> f64 {
    let cpr = cpr.clamp(0.0, 1.0);
    1.0 - (1.0 - cpr).powf(1.0 / 12.0)
}

/// Rate-incentive multiplier on the base CPR.
///
/// Below-market notes still prepay at half speed (moves and sales);
/// above-market notes ramp linearly up to 4x at a +2% spread.
pub fn rate_incentive_factor(loan_rate: f64, market_rate: f64) -> f64 {
    let spread = loan_rate - market_rate;
    if spread <= -0.01 {
        0.5
    } else if spread <= 0.01 {
        1.0
    } else {
        1.0 + 3.0 * ((spread - 0.01) / 0.01).min(1.0)
    }
}

/// Monthly prepayment hazard (SMM) for a loan at a given age.
pub fn stub_prepay_smm(
    leaf: LeafId,
    loan_age: u32,
    loan_rate: f64,
    market_rate: f64,
    ramp_months: u32,
) -> f64 {
    let base = BASE_CPR
        .get(leaf.saturating_sub(1) as usize)
        .copied()
        .unwrap_or(DEFAULT_CPR);
    let adjusted = base
        * seasoning_ramp(loan_age, ramp_months)
        * rate_incentive_factor(loan_rate, market_rate);
    cpr_to_smm(adjusted.min(MAX_CPR))
}
