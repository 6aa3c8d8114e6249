//! Monthly cash-flow projection for a single loan.
//!
//! The projector threads a level-payment amortisation schedule through the
//! monthly state model in expected-value form: it carries probabilities,
//! never samples. The contractual balance amortises per survivor; default
//! and prepayment remove probability mass from the surviving pool, and a
//! delinquency chain tracks the 30/60/90 DPD share of survivors.
//!
//! Event order within a month: default, then prepayment, then payment.
//! Defaulted exposure writes off `net LGD` immediately and returns the
//! remainder as recovery cash when the foreclosure timer matures
//! (judicial states take longer). Recoveries maturing past the remaining
//! term land in the final month.

use crate::core::{Loan, MonthlyCashFlow, ValuationError};
use crate::credit::MonthlyTransition;
use crate::credit::stubs::foreclosure_months;
use crate::engines::shocks::ShockPath;
use crate::math::monthly_rate_from_annual;

/// Cure probabilities per 30/60/90 DPD bucket.
const CURE: [f64; 3] = [0.40, 0.25, 0.15];
/// Roll probabilities to the next bucket (90+ rolls toward default).
const ROLL: [f64; 3] = [0.30, 0.35, 0.35];

/// Balance below which a loan counts as retired.
const BALANCE_EPS: f64 = 1e-9;

/// Discounting and cost parameters for one projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionParams {
    pub annual_discount_rate: f64,
    /// Annual servicing cost in basis points of surviving balance.
    pub servicing_bps: f64,
}

/// Output of one projection run.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub cash_flows: Vec<MonthlyCashFlow>,
    /// Sum of monthly present values.
    pub present_value: f64,
    /// Principal-weighted average life in years.
    pub wal_years: f64,
}

/// Projects expected monthly cash flows and their present value.
///
/// `transitions` must cover the loan's remaining term; `shocks`, when
/// present, perturbs the default/delinquency and prepayment rates month
/// by month.
pub fn project(
    loan: &Loan,
    transitions: &[MonthlyTransition],
    params: ProjectionParams,
    shocks: Option<&ShockPath>,
) -> Result<Projection, ValuationError> {
    let n_months = transitions.len();
    if n_months == 0 {
        return Err(ValuationError::Numeric {
            message: format!("loan {} has an empty transition schedule", loan.loan_id),
        });
    }

    let r = monthly_rate_from_annual(loan.interest_rate);
    let d = monthly_rate_from_annual(params.annual_discount_rate);
    let servicing_monthly = params.servicing_bps / 10_000.0 / 12.0;
    let payment = loan.scheduled_payment();
    let delay = foreclosure_months(loan.state.as_deref()) as usize;

    let mut balance = loan.unpaid_balance;
    let mut survival = 1.0_f64;
    // DPD shares within the surviving pool.
    let mut dpd = [0.0_f64; 3];
    // Recovery cash keyed by the month it matures (clamped to the horizon).
    let mut recoveries_due = vec![0.0_f64; n_months + 1];
    let mut last_due = 0usize;

    let mut cash_flows = Vec::with_capacity(n_months);
    let mut present_value = 0.0_f64;
    let mut principal_time = 0.0_f64;
    let mut principal_total = 0.0_f64;

    for tx in transitions {
        let m = tx.month as usize;
        let mut matured_recovery = recoveries_due.get(m).copied().unwrap_or(0.0);

        if balance <= BALANCE_EPS && matured_recovery == 0.0 {
            if m > last_due {
                break;
            }
            continue;
        }

        let (shock_d, shock_p) = match shocks {
            Some(path) => (
                path.default_mult.get(m - 1).copied().unwrap_or(1.0),
                path.prepay_mult.get(m - 1).copied().unwrap_or(1.0),
            ),
            None => (1.0, 1.0),
        };

        let h_default = (tx.default_hazard * shock_d).clamp(0.0, 1.0);
        let h_prepay = (tx.prepay_hazard * shock_p).clamp(0.0, 1.0 - h_default);
        let deq_entry = (tx.deq_rate * shock_d).clamp(0.0, 1.0);

        let surv_entering = survival;
        let exposure = balance;

        // Competing exits: default first, prepayment among non-defaulters.
        let mass_default = surv_entering * h_default;
        let mass_prepay = surv_entering * (1.0 - h_default) * h_prepay;
        survival = surv_entering * (1.0 - h_default) * (1.0 - h_prepay);

        // Contractual amortisation for survivors.
        let interest = balance * r;
        let sched_payment = payment.min(balance + interest);
        let sched_principal = (sched_payment - interest).clamp(0.0, balance);
        let extra_cap = balance - sched_principal;
        let extra = (tx.extra_principal * shock_p).clamp(0.0, extra_cap);

        // Losses recognise net LGD at the default month; the recovered
        // remainder matures after the foreclosure delay.
        let net_lgd = tx.loss_severity.max(1.0 - tx.recovery_rate).clamp(0.0, 1.0);
        let expected_loss = mass_default * exposure * net_lgd;
        let recovery_amount = mass_default * exposure * (1.0 - net_lgd);
        if recovery_amount > 0.0 {
            let due = (m + delay).min(n_months);
            if due <= m {
                // Horizon clamp on a final-month default: pay it now.
                matured_recovery += recovery_amount;
            } else {
                recoveries_due[due] += recovery_amount;
                last_due = last_due.max(due);
            }
        }

        let expected_payment = survival * (sched_payment + extra);
        let expected_prepayment = mass_prepay * exposure;
        let servicing_cost = exposure * servicing_monthly * survival;
        let net_cash_flow = expected_payment + expected_prepayment + matured_recovery
            - expected_loss
            - servicing_cost;

        let discount_factor = (1.0 + d).powi(-(m as i32));
        let pv = net_cash_flow * discount_factor;

        // Delinquency chain over the surviving pool (reporting overlay;
        // pool-level default stays with the marginal hazard).
        let current_share = (1.0 - dpd[0] - dpd[1] - dpd[2]).max(0.0);
        let inflow = current_share * deq_entry;
        let next_90 = dpd[1] * ROLL[1] + dpd[2] * (1.0 - CURE[2] - ROLL[2]);
        let next_60 = dpd[0] * ROLL[0] + dpd[1] * (1.0 - CURE[1] - ROLL[1]);
        let next_30 = inflow + dpd[0] * (1.0 - CURE[0] - ROLL[0]);
        dpd = [next_30.max(0.0), next_60.max(0.0), next_90.max(0.0)];
        let deq_probability = (dpd[0] + dpd[1] + dpd[2]).min(1.0);

        let expected_principal =
            survival * (sched_principal + extra) + expected_prepayment + matured_recovery;

        balance -= sched_principal + extra;

        if !net_cash_flow.is_finite() || !balance.is_finite() {
            return Err(ValuationError::Numeric {
                message: format!(
                    "loan {} produced a non-finite cash flow at month {m}",
                    loan.loan_id
                ),
            });
        }
        if balance < -1e-6 {
            return Err(ValuationError::Numeric {
                message: format!(
                    "loan {} balance went negative at month {m}: {balance}",
                    loan.loan_id
                ),
            });
        }
        balance = balance.max(0.0);

        present_value += pv;
        principal_time += m as f64 * expected_principal;
        principal_total += expected_principal;

        cash_flows.push(MonthlyCashFlow {
            month: tx.month,
            survival_probability: survival,
            scheduled_payment: sched_payment + extra,
            expected_payment,
            deq_probability,
            default_probability: h_default,
            prepay_probability: h_prepay,
            expected_principal,
            expected_prepayment,
            expected_loss,
            expected_recovery: matured_recovery,
            servicing_cost,
            net_cash_flow,
            discount_factor,
            present_value: pv,
        });
    }

    let wal_years = if principal_total > 0.0 {
        principal_time / principal_total / 12.0
    } else {
        0.0
    };

    Ok(Projection {
        cash_flows,
        present_value,
        wal_years,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::core::{FallbackLog, PrepaymentSource, Scenario, SimulationConfig};
    use crate::credit::{SurvivalCurve, build_transitions};

    fn amortizer_loan(balance: f64, rate: f64, months: u32) -> Loan {
        Loan {
            loan_id: "P1".into(),
            unpaid_balance: balance,
            interest_rate: rate,
            original_term: 360,
            remaining_term: months,
            loan_age: 0,
            credit_score: Some(720),
            ltv: Some(0.75),
            dti: None,
            state: Some("AZ".into()),
            origination_year: None,
            itin: None,
        }
    }

    fn zeroed_transitions(loan: &Loan) -> Vec<MonthlyTransition> {
        let zero = Scenario {
            default_mult: 0.0,
            prepay_mult: 0.0,
            deq_mult: 0.0,
            ..Scenario::baseline()
        };
        let config = SimulationConfig {
            prepayment_source: PrepaymentSource::KmWithFlatDefault,
            ..SimulationConfig::default()
        };
        build_transitions(
            loan,
            3,
            &SurvivalCurve::stub_for_leaf(3, 360),
            &zero,
            &config,
            None,
            &mut FallbackLog::new(),
        )
    }

    #[test]
    fn deterministic_amortiser_prices_at_par() {
        let loan = amortizer_loan(100_000.0, 0.06, 120);
        let params = ProjectionParams {
            annual_discount_rate: 0.06,
            servicing_bps: 0.0,
        };
        let projection = project(&loan, &zeroed_transitions(&loan), params, None).unwrap();
        assert_relative_eq!(projection.present_value, 100_000.0, epsilon = 1e-4);
        assert_eq!(projection.cash_flows.len(), 120);
    }

    #[test]
    fn balance_reaches_zero_with_no_exits() {
        let loan = amortizer_loan(100_000.0, 0.06, 120);
        let params = ProjectionParams {
            annual_discount_rate: 0.06,
            servicing_bps: 0.0,
        };
        let projection = project(&loan, &zeroed_transitions(&loan), params, None).unwrap();
        let total_principal: f64 = projection
            .cash_flows
            .iter()
            .map(|cf| cf.expected_principal)
            .sum();
        assert_relative_eq!(total_principal, 100_000.0, epsilon = 1e-6);
    }

    #[test]
    fn single_month_loan_pays_one_discounted_payment() {
        let loan = amortizer_loan(50_000.0, 0.06, 1);
        let params = ProjectionParams {
            annual_discount_rate: 0.06,
            servicing_bps: 0.0,
        };
        let projection = project(&loan, &zeroed_transitions(&loan), params, None).unwrap();
        assert_eq!(projection.cash_flows.len(), 1);
        let expected = loan.scheduled_payment() / (1.0 + 0.06 / 12.0);
        assert_relative_eq!(projection.present_value, expected, epsilon = 1e-9);
        assert_relative_eq!(projection.wal_years, 1.0 / 12.0, epsilon = 1e-12);
    }

    #[test]
    fn survival_is_non_increasing_and_principal_bounded() {
        let loan = Loan {
            loan_age: 60,
            ..amortizer_loan(200_000.0, 0.065, 300)
        };
        let config = SimulationConfig::default();
        let txs = build_transitions(
            &loan,
            4,
            &SurvivalCurve::stub_for_leaf(4, 360),
            &Scenario::baseline(),
            &config,
            None,
            &mut FallbackLog::new(),
        );
        let params = ProjectionParams {
            annual_discount_rate: 0.08,
            servicing_bps: 25.0,
        };
        let projection = project(&loan, &txs, params, None).unwrap();

        let mut prev = 1.0;
        let mut total_principal = 0.0;
        for cf in &projection.cash_flows {
            assert!(cf.survival_probability <= prev + 1e-12);
            assert!((0.0..=1.0).contains(&cf.survival_probability));
            prev = cf.survival_probability;
            total_principal += cf.expected_principal;
        }
        assert!(
            total_principal <= loan.unpaid_balance + 1e-6,
            "principal {total_principal} exceeds starting balance"
        );
    }

    #[test]
    fn pv_reproduces_component_sum() {
        let loan = Loan {
            loan_age: 24,
            ..amortizer_loan(150_000.0, 0.07, 180)
        };
        let txs = build_transitions(
            &loan,
            3,
            &SurvivalCurve::stub_for_leaf(3, 360),
            &Scenario::baseline(),
            &SimulationConfig::default(),
            None,
            &mut FallbackLog::new(),
        );
        let params = ProjectionParams {
            annual_discount_rate: 0.08,
            servicing_bps: 25.0,
        };
        let projection = project(&loan, &txs, params, None).unwrap();
        let d: f64 = 0.08 / 12.0;
        let recomputed: f64 = projection
            .cash_flows
            .iter()
            .map(|cf| cf.net_cash_flow / (1.0 + d).powi(cf.month as i32))
            .sum();
        assert_relative_eq!(projection.present_value, recomputed, epsilon = 1e-6);
        for cf in &projection.cash_flows {
            let net = cf.expected_payment + cf.expected_prepayment + cf.expected_recovery
                - cf.expected_loss
                - cf.servicing_cost;
            assert_relative_eq!(cf.net_cash_flow, net, epsilon = 1e-9);
        }
    }

    #[test]
    fn defaults_emit_recovery_after_foreclosure_delay() {
        // Non-judicial state: recoveries mature 12 months after default.
        let loan = Loan {
            loan_age: 60,
            state: Some("TX".into()),
            ..amortizer_loan(100_000.0, 0.065, 120)
        };
        let config = SimulationConfig {
            annual_cdr: 0.05,
            ..SimulationConfig::default()
        };
        let txs = build_transitions(
            &loan,
            3,
            &SurvivalCurve::flat(360),
            &Scenario::baseline(),
            &config,
            None,
            &mut FallbackLog::new(),
        );
        let params = ProjectionParams {
            annual_discount_rate: 0.08,
            servicing_bps: 0.0,
        };
        let projection = project(&loan, &txs, params, None).unwrap();
        for cf in &projection.cash_flows {
            if cf.month <= 12 {
                assert_eq!(cf.expected_recovery, 0.0, "month {}", cf.month);
            }
        }
        assert!(projection.cash_flows[12].expected_recovery > 0.0);
    }

    #[test]
    fn judicial_state_delays_recovery_longer() {
        let base = Loan {
            loan_age: 60,
            ..amortizer_loan(100_000.0, 0.065, 120)
        };
        let config = SimulationConfig {
            annual_cdr: 0.05,
            ..SimulationConfig::default()
        };
        let mut run = |state: &str| {
            let loan = Loan {
                state: Some(state.into()),
                ..base.clone()
            };
            let txs = build_transitions(
                &loan,
                3,
                &SurvivalCurve::flat(360),
                &Scenario::baseline(),
                &config,
                None,
                &mut FallbackLog::new(),
            );
            let params = ProjectionParams {
                annual_discount_rate: 0.08,
                servicing_bps: 0.0,
            };
            project(&loan, &txs, params, None).unwrap()
        };
        let first_recovery = |p: &Projection| {
            p.cash_flows
                .iter()
                .find(|cf| cf.expected_recovery > 0.0)
                .map(|cf| cf.month)
                .unwrap()
        };
        assert_eq!(first_recovery(&run("TX")), 13);
        assert_eq!(first_recovery(&run("NY")), 25);
    }

    #[test]
    fn extra_principal_shortens_wal() {
        let loan = Loan {
            loan_age: 48,
            ..amortizer_loan(250_000.0, 0.072, 312)
        };
        let config = SimulationConfig {
            prepayment_source: PrepaymentSource::Apex2,
            ..SimulationConfig::default()
        };
        let tables = crate::prepay::Apex2Tables::fallback();
        let schedule = crate::prepay::extra_principal_schedule(
            &loan,
            &tables,
            &crate::prepay::TreasuryCurve::flat(4.5),
            30,
            loan.remaining_term,
        );
        let with_extra = build_transitions(
            &loan,
            2,
            &SurvivalCurve::flat(360),
            &Scenario::baseline(),
            &config,
            Some(&schedule),
            &mut FallbackLog::new(),
        );
        let without = zeroed_transitions(&loan);
        let params = ProjectionParams {
            annual_discount_rate: 0.07,
            servicing_bps: 0.0,
        };
        let fast = project(&loan, &with_extra, params, None).unwrap();
        let slow = project(&loan, &without, params, None).unwrap();
        assert!(
            slow.wal_years - fast.wal_years >= 0.5,
            "expected at least 6 months of WAL compression, got {} vs {}",
            slow.wal_years,
            fast.wal_years
        );
        assert!(fast.cash_flows.len() < slow.cash_flows.len());
    }

    #[test]
    fn delinquency_overlay_stays_in_unit_range() {
        let loan = Loan {
            loan_age: 6,
            ..amortizer_loan(120_000.0, 0.08, 240)
        };
        let severe = Scenario {
            name: "severe_recession".into(),
            deq_mult: 2.5,
            default_mult: 2.0,
            prepay_mult: 0.4,
            recovery_mult: 0.65,
            discount_rate: 0.14,
            treasury_curve: None,
        };
        let txs = build_transitions(
            &loan,
            5,
            &SurvivalCurve::stub_for_leaf(5, 360),
            &severe,
            &SimulationConfig::default(),
            None,
            &mut FallbackLog::new(),
        );
        let params = ProjectionParams {
            annual_discount_rate: 0.14,
            servicing_bps: 25.0,
        };
        let projection = project(&loan, &txs, params, None).unwrap();
        for cf in &projection.cash_flows {
            assert!((0.0..=1.0).contains(&cf.deq_probability), "month {}", cf.month);
        }
        assert!(projection.cash_flows.iter().any(|cf| cf.deq_probability > 0.0));
    }

    #[test]
    fn empty_schedule_is_numeric_error() {
        let loan = amortizer_loan(100_000.0, 0.06, 12);
        let params = ProjectionParams {
            annual_discount_rate: 0.06,
            servicing_bps: 0.0,
        };
        let err = project(&loan, &[], params, None).unwrap_err();
        assert_eq!(err.code(), "numeric_error");
    }
}
