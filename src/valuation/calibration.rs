//! Deterministic APEX2 reference track and calibration metrics.
//!
//! The reference track re-prices a package the way the legacy spreadsheet
//! does: the APEX2 multiplier accelerates the level payment directly, a
//! flat CDR drives credit losses at a flat net LGD, and cash is
//! discounted at the target yield. It shares no code with the projector,
//! which is what makes the comparison a genuine cross-check.

use serde::{Deserialize, Serialize};

use crate::core::{CalibrationMetrics, Loan, Package, ValuationError};
use crate::credit::monthly_cdr;
use crate::math::{monthly_payment, monthly_rate_from_annual};
use crate::prepay::multiplier_dims;
use crate::registry::Registry;
use crate::risk::bid::annualize;

/// Parameters of the reference pricing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Annual discount rate (the buyer's target yield).
    pub target_yield: f64,
    pub annual_cdr: f64,
    /// Flat recovery on defaulted balance.
    pub recovery_rate: f64,
    /// Flat 10-year treasury in percent for the rate-delta band.
    pub treasury_10y: f64,
    /// Relative-error gate in percent.
    pub tolerance_pct: f64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        ReferenceConfig {
            target_yield: 0.07,
            annual_cdr: 0.0015,
            recovery_rate: 0.50,
            treasury_10y: 4.5,
            tolerance_pct: 5.0,
        }
    }
}

/// Annual servicing drag matching the projector's default (25 bps).
const SERVICING_ANNUAL: f64 = 0.0025;

/// Reference PV of one loan: accelerated level payment, flat CDR, net-LGD
/// losses, target-yield discounting.
pub fn reference_loan_pv(
    loan: &Loan,
    registry: &Registry,
    config: &ReferenceConfig,
) -> Result<f64, ValuationError> {
    let r_yield = monthly_rate_from_annual(config.target_yield);
    let r_loan = monthly_rate_from_annual(loan.interest_rate);
    let mut balance = loan.unpaid_balance;

    let pandi = monthly_payment(balance, loan.interest_rate, loan.remaining_term);
    let dims = multiplier_dims(registry.apex2_tables(), loan, config.treasury_10y);
    let effective_payment = pandi * dims.average().max(1.0);

    let h_default = monthly_cdr(config.annual_cdr);
    let net_lgd = 1.0 - config.recovery_rate.clamp(0.0, 1.0);
    let servicing_monthly = SERVICING_ANNUAL / 12.0;

    let mut survival = 1.0_f64;
    let mut total_pv = 0.0_f64;

    for month in 1..=loan.remaining_term {
        if balance <= 0.01 {
            break;
        }
        let surv_entering = survival;
        survival *= 1.0 - h_default;

        let interest = balance * r_loan;
        let payment = effective_payment.min(balance + interest);
        let expected_payment = payment * survival;
        let credit_loss = h_default * net_lgd * balance * surv_entering;
        let servicing = balance * servicing_monthly * survival;

        let net = expected_payment - credit_loss - servicing;
        let pv = net / (1.0 + r_yield).powi(month as i32);
        if !pv.is_finite() {
            return Err(ValuationError::Numeric {
                message: format!(
                    "reference track produced a non-finite value for loan {} at month {month}",
                    loan.loan_id
                ),
            });
        }
        total_pv += pv;

        let principal = (payment - interest).min(balance);
        let default_outflow = h_default * balance * surv_entering;
        balance = (balance - principal - default_outflow).max(0.0);
    }

    Ok(total_pv)
}

/// Reference PV of a whole package and its per-loan components.
pub fn reference_package_pv(
    package: &Package,
    registry: &Registry,
    config: &ReferenceConfig,
) -> Result<(f64, Vec<f64>), ValuationError> {
    let mut per_loan = Vec::with_capacity(package.loans.len());
    for loan in &package.loans {
        loan.validate()?;
        per_loan.push(reference_loan_pv(loan, registry, config)?);
    }
    Ok((per_loan.iter().sum(), per_loan))
}

/// Compares the simulated valuation against the reference track.
pub fn calibrate(
    reference_pv: f64,
    simulated_pv: f64,
    purchase_price: f64,
    wal_years: f64,
    tolerance_pct: f64,
) -> CalibrationMetrics {
    let absolute_error = simulated_pv - reference_pv;
    let relative_error_pct = if reference_pv != 0.0 {
        absolute_error / reference_pv * 100.0
    } else {
        0.0
    };
    let roe_reference = (reference_pv - purchase_price) / purchase_price;
    let roe_simulated = (simulated_pv - purchase_price) / purchase_price;
    let roe_diff_bps = (annualize(roe_simulated, wal_years) - annualize(roe_reference, wal_years))
        * 10_000.0;
    CalibrationMetrics {
        reference_pv,
        simulated_pv,
        absolute_error,
        relative_error_pct,
        roe_reference,
        roe_simulated,
        roe_diff_bps,
        tolerance_pct,
        within_tolerance: relative_error_pct.abs() <= tolerance_pct,
    }
}
