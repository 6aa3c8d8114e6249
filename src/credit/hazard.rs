//! Hazard decomposition: monthly marginal default and prepayment rates.
//!
//! Each decomposition mode splits a loan's exit behaviour differently:
//! the KM modes read the leaf's all-causes survival curve, the stub mode
//! is purely formulaic, and the APEX2 mode replaces the prepayment hazard
//! with a dollar extra-principal schedule. Scenario stress multipliers are
//! applied here so the projector sees final rates.

use serde::{Deserialize, Serialize};

use crate::core::{FallbackLog, LeafId, Loan, PrepaymentSource, Scenario, SimulationConfig};
use crate::credit::stubs;
use crate::credit::survival::SurvivalCurve;
use crate::prepay::model::{MARKET_RATE, stub_prepay_smm};

/// Fraction of clamped months above which the KM-residual collapse is
/// reported as a model fallback.
const KM_CLAMP_WARN_FRACTION: f64 = 0.25;

/// Transition rates for a single projection month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTransition {
    /// Month index, 1-based.
    pub month: u32,
    /// Marginal default hazard after scenario stress.
    pub default_hazard: f64,
    /// Marginal prepayment hazard (SMM) after scenario stress. Zero in
    /// APEX2 mode.
    pub prepay_hazard: f64,
    /// Extra principal dollars after scenario stress. Zero outside APEX2
    /// mode.
    pub extra_principal: f64,
    /// Monthly delinquency-entry rate after scenario stress.
    pub deq_rate: f64,
    /// Loss-given-default severity.
    pub loss_severity: f64,
    /// Recovered fraction of defaulted balance after scenario stress.
    pub recovery_rate: f64,
}

/// Converts an annual CDR to its monthly equivalent:
/// `1 − (1 − CDR)^(1/12)`.
pub fn monthly_cdr(annual_cdr: f64) -> f64 {
    let annual = annual_cdr.clamp(0.0, 1.0);
    1.0 - (1.0 - annual).powf(1.0 / 12.0)
}

/// Builds the per-month transition vector for one loan under one scenario.
///
/// `extra_principal` must be supplied for [`PrepaymentSource::Apex2`]
/// (see `prepay::apex2::extra_principal_schedule`) and carries the ramped,
/// unstressed monthly dollars.
pub fn build_transitions(
    loan: &Loan,
    leaf: LeafId,
    curve: &SurvivalCurve,
    scenario: &Scenario,
    config: &SimulationConfig,
    extra_principal: Option<&[f64]>,
    fallbacks: &mut FallbackLog,
) -> Vec<MonthlyTransition> {
    let months = loan.remaining_term;
    let severity = stubs::loss_severity(leaf);
    let base_recovery = stubs::recovery_rate(leaf);
    let cdr = monthly_cdr(config.annual_cdr);

    let mut clamped_months = 0u32;
    let mut transitions = Vec::with_capacity(months as usize);

    for m in 1..=months {
        let age = loan.loan_age + m;
        let (mut default_hazard, mut prepay_hazard, mut extra) = match config.prepayment_source {
            PrepaymentSource::Stub => {
                // Mild seasoning on the flat CDR: half speed at age zero,
                // full speed once past the ramp window.
                let seasoning =
                    0.5 + 0.5 * (age as f64 / config.seasoning_ramp_months.max(1) as f64).min(1.0);
                let smm = stub_prepay_smm(
                    leaf,
                    age,
                    loan.interest_rate,
                    MARKET_RATE,
                    config.seasoning_ramp_months,
                );
                (cdr * seasoning, smm, 0.0)
            }
            PrepaymentSource::KmAll => {
                let h = curve.hazard(m as usize);
                let share = config.km_default_share.clamp(0.0, 1.0);
                (h * share, h * (1.0 - share), 0.0)
            }
            PrepaymentSource::KmWithFlatDefault => {
                let h = curve.hazard(m as usize);
                let residual = h - cdr;
                if residual < 0.0 {
                    clamped_months += 1;
                }
                (cdr, residual.max(0.0), 0.0)
            }
            PrepaymentSource::Apex2 => {
                let dollars = extra_principal
                    .and_then(|xs| xs.get(m as usize - 1))
                    .copied()
                    .unwrap_or(0.0);
                (cdr, 0.0, dollars)
            }
        };

        default_hazard = (default_hazard * scenario.default_mult).clamp(0.0, 1.0);
        // Keep the combined monthly exit probability at or below one.
        prepay_hazard =
            (prepay_hazard * scenario.prepay_mult).clamp(0.0, 1.0 - default_hazard);
        extra = (extra * scenario.prepay_mult).max(0.0);

        let deq_rate =
            (stubs::deq_rate(leaf, age) * scenario.deq_mult).clamp(0.0, 1.0);
        let recovery_rate = (base_recovery * scenario.recovery_mult).clamp(0.0, 1.0);

        transitions.push(MonthlyTransition {
            month: m,
            default_hazard,
            prepay_hazard,
            extra_principal: extra,
            deq_rate,
            loss_severity: severity,
            recovery_rate,
        });
    }

    if config.prepayment_source == PrepaymentSource::KmWithFlatDefault
        && months > 0
        && clamped_months as f64 / months as f64 > KM_CLAMP_WARN_FRACTION
    {
        fallbacks.record(
            &loan.loan_id,
            "hazard_decomposition",
            format!(
                "CDR {} exceeds the KM hazard on {clamped_months}/{months} months; \
                 prepayment collapsed to zero there",
                config.annual_cdr
            ),
        );
    }

    transitions
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::core::SimulationConfig;

    fn sample_loan(remaining: u32) -> Loan {
        Loan {
            loan_id: "H1".into(),
            unpaid_balance: 200_000.0,
            interest_rate: 0.065,
            original_term: 360,
            remaining_term: remaining,
            loan_age: 60,
            credit_score: Some(720),
            ltv: Some(0.75),
            dti: None,
            state: None,
            origination_year: None,
            itin: None,
        }
    }

    fn config(source: PrepaymentSource) -> SimulationConfig {
        SimulationConfig {
            prepayment_source: source,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn monthly_cdr_round_trips_annual() {
        let m = monthly_cdr(0.02);
        assert_relative_eq!(1.0 - (1.0 - m).powi(12), 0.02, epsilon = 1e-12);
        assert_eq!(monthly_cdr(0.0), 0.0);
    }

    #[test]
    fn km_all_split_preserves_total_hazard() {
        let loan = sample_loan(60);
        let curve = SurvivalCurve::stub_for_leaf(3, 360);
        let mut fallbacks = FallbackLog::new();
        let cfg = SimulationConfig {
            km_default_share: 0.3,
            ..config(PrepaymentSource::KmAll)
        };
        let txs = build_transitions(
            &loan,
            3,
            &curve,
            &Scenario::baseline(),
            &cfg,
            None,
            &mut fallbacks,
        );
        for tx in &txs {
            let km = curve.hazard(tx.month as usize);
            assert_relative_eq!(tx.default_hazard + tx.prepay_hazard, km, epsilon = 1e-12);
            assert_relative_eq!(tx.default_hazard, km * 0.3, epsilon = 1e-12);
        }
    }

    #[test]
    fn km_flat_default_is_cdr_with_clamped_residual() {
        let loan = sample_loan(60);
        let curve = SurvivalCurve::stub_for_leaf(3, 360);
        let mut fallbacks = FallbackLog::new();
        let cfg = config(PrepaymentSource::KmWithFlatDefault);
        let cdr = monthly_cdr(cfg.annual_cdr);
        let txs = build_transitions(
            &loan,
            3,
            &curve,
            &Scenario::baseline(),
            &cfg,
            None,
            &mut fallbacks,
        );
        for tx in &txs {
            assert_relative_eq!(tx.default_hazard, cdr, epsilon = 1e-12);
            let km = curve.hazard(tx.month as usize);
            assert_relative_eq!(tx.prepay_hazard, (km - cdr).max(0.0), epsilon = 1e-12);
            assert!(tx.prepay_hazard >= 0.0);
        }
        assert_eq!(fallbacks.count(), 0);
    }

    #[test]
    fn km_flat_collapse_on_quiet_curve_is_reported() {
        let loan = sample_loan(48);
        let curve = SurvivalCurve::flat(360);
        let mut fallbacks = FallbackLog::new();
        let cfg = SimulationConfig {
            annual_cdr: 0.02,
            ..config(PrepaymentSource::KmWithFlatDefault)
        };
        let txs = build_transitions(
            &loan,
            1,
            &curve,
            &Scenario::baseline(),
            &cfg,
            None,
            &mut fallbacks,
        );
        assert!(txs.iter().all(|tx| tx.prepay_hazard == 0.0));
        assert_eq!(fallbacks.count(), 1, "collapse must be recorded once");
    }

    #[test]
    fn scenario_multipliers_stress_rates() {
        let loan = sample_loan(36);
        let curve = SurvivalCurve::stub_for_leaf(4, 360);
        let mut fallbacks = FallbackLog::new();
        let severe = Scenario {
            name: "severe_recession".into(),
            deq_mult: 2.5,
            default_mult: 2.0,
            prepay_mult: 0.4,
            recovery_mult: 0.65,
            discount_rate: 0.14,
            treasury_curve: None,
        };
        let cfg = config(PrepaymentSource::KmAll);
        let base = build_transitions(
            &loan,
            4,
            &curve,
            &Scenario::baseline(),
            &cfg,
            None,
            &mut fallbacks,
        );
        let stressed =
            build_transitions(&loan, 4, &curve, &severe, &cfg, None, &mut fallbacks);
        for (b, s) in base.iter().zip(&stressed) {
            assert_relative_eq!(s.default_hazard, b.default_hazard * 2.0, epsilon = 1e-12);
            assert_relative_eq!(s.prepay_hazard, b.prepay_hazard * 0.4, epsilon = 1e-12);
            assert_relative_eq!(s.recovery_rate, b.recovery_rate * 0.65, epsilon = 1e-12);
            assert!(s.default_hazard + s.prepay_hazard <= 1.0);
        }
    }

    #[test]
    fn combined_exit_probability_capped_at_one() {
        let loan = sample_loan(12);
        let curve = SurvivalCurve::new(vec![0.4, 0.1, 0.02, 0.001]);
        let mut fallbacks = FallbackLog::new();
        let extreme = Scenario {
            default_mult: 10.0,
            prepay_mult: 10.0,
            ..Scenario::baseline()
        };
        let txs = build_transitions(
            &loan,
            5,
            &curve,
            &extreme,
            &config(PrepaymentSource::KmAll),
            None,
            &mut fallbacks,
        );
        for tx in &txs {
            assert!(tx.default_hazard + tx.prepay_hazard <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn apex2_mode_carries_dollars_not_hazard() {
        let loan = sample_loan(24);
        let curve = SurvivalCurve::stub_for_leaf(2, 360);
        let mut fallbacks = FallbackLog::new();
        let dollars: Vec<f64> = (0..24).map(|i| 100.0 + i as f64).collect();
        let txs = build_transitions(
            &loan,
            2,
            &curve,
            &Scenario::baseline(),
            &config(PrepaymentSource::Apex2),
            Some(&dollars),
            &mut fallbacks,
        );
        for (i, tx) in txs.iter().enumerate() {
            assert_eq!(tx.prepay_hazard, 0.0);
            assert_relative_eq!(tx.extra_principal, dollars[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn stub_mode_needs_no_curve() {
        let loan = sample_loan(120);
        let curve = SurvivalCurve::flat(1);
        let mut fallbacks = FallbackLog::new();
        let txs = build_transitions(
            &loan,
            1,
            &curve,
            &Scenario::baseline(),
            &config(PrepaymentSource::Stub),
            None,
            &mut fallbacks,
        );
        assert_eq!(txs.len(), 120);
        assert!(txs.iter().all(|tx| tx.default_hazard > 0.0));
        assert!(txs.iter().any(|tx| tx.prepay_hazard > 0.0));
    }
}
