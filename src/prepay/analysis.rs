//! Package-level APEX2 prepayment analysis.
//!
//! Computes effective life under different multiplier sources and
//! projection methods, credit-band breakdowns, seasoning sensitivity, and
//! optional treasury-curve scenarios. This is the diagnostic companion to
//! the valuation path: same tables, same ramp, no discounting.

use serde::{Deserialize, Serialize};

use crate::core::{Loan, Package};
use crate::math::{effective_life_months, monthly_payment, monthly_rate_from_annual};
use crate::prepay::apex2::{
    Apex2Dims, Apex2Tables, multiplier_dims, rate_delta_band, seasoning_ramp,
};
use crate::prepay::treasury::TreasuryCurve;

/// Canonical display order of the credit bands.
const CREDIT_BAND_ORDER: [&str; 10] = [
    "<576", "576-600", "601-625", "626-650", "651-675", "676-700", "701-725", "726-750",
    ">=751", "no_score",
];

/// Analysis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepaymentConfig {
    /// Flat 10-year treasury in percent.
    pub treasury_10y: f64,
    pub seasoning_ramp_months: u32,
    /// Named treasury curves to re-project under.
    #[serde(default)]
    pub treasury_scenarios: Vec<TreasuryScenario>,
}

impl Default for PrepaymentConfig {
    fn default() -> Self {
        PrepaymentConfig {
            treasury_10y: 4.5,
            seasoning_ramp_months: 30,
            treasury_scenarios: Vec::new(),
        }
    }
}

/// A named treasury curve as `(pillar_month, rate_percent)` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryScenario {
    pub name: String,
    pub points: Vec<(u32, f64)>,
}

/// UPB-weighted package characteristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepaymentSummary {
    pub loan_count: usize,
    pub total_upb: f64,
    pub wtd_avg_rate_pct: f64,
    pub wtd_avg_credit: f64,
    pub wtd_avg_ltv_pct: f64,
    pub wtd_avg_seasoning: f64,
    pub wtd_avg_remaining_term: f64,
    pub treasury_10y: f64,
    pub wtd_avg_multiplier: f64,
}

/// One cell of the {multiplier source} × {projection method} grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveLifeScenario {
    pub label: String,
    pub multiplier_source: String,
    pub method: String,
    /// Closed-form annuity inversion, UPB-weighted. `None` when no loan
    /// admits the inversion.
    pub nper_months: Option<f64>,
    /// Monthly projection with constant-dollar prepay, UPB-weighted.
    pub monthly_months: f64,
    pub nper_years: Option<f64>,
    pub monthly_years: f64,
}

/// Per-credit-band aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditBandRow {
    pub band: String,
    pub loan_count: usize,
    pub total_upb: f64,
    pub avg_multiplier: f64,
    pub avg_credit_multiplier: f64,
    pub avg_rate_pct: f64,
    pub effective_life_months: f64,
}

/// Effective life at an assumed uniform age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasoningSensitivityPoint {
    pub assumed_age_months: u32,
    pub effective_life_months: f64,
    pub effective_life_years: f64,
}

/// Per-loan band assignments and multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanMultiplierDetail {
    pub loan_id: String,
    pub dims: Apex2Dims,
    pub multiplier: f64,
    pub balance: f64,
    pub pandi: f64,
    pub rate_pct: f64,
    pub remaining_term: u32,
    pub loan_age: u32,
}

/// Effective life under a named treasury curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCurveScenarioResult {
    pub scenario_name: String,
    pub wtd_eff_life_months: f64,
    pub wtd_eff_life_years: f64,
}

/// Full analysis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepaymentAnalysisResult {
    pub summary: PrepaymentSummary,
    pub scenarios: Vec<EffectiveLifeScenario>,
    pub credit_bands: Vec<CreditBandRow>,
    pub seasoning_sensitivity: Vec<SeasoningSensitivityPoint>,
    pub loan_details: Vec<LoanMultiplierDetail>,
    pub rate_curve_results: Vec<RateCurveScenarioResult>,
}

struct LoanCalc<'a> {
    loan: &'a Loan,
    pandi: f64,
    rate_pct: f64,
    dims: Apex2Dims,
}

/// Monthly projection with constant-dollar extra principal. Returns the
/// month the balance reaches zero, capped at the remaining term.
fn project_life(
    loan: &Loan,
    pandi: f64,
    multiplier: f64,
    assumed_age: u32,
    use_seasoning: bool,
    ramp_months: u32,
) -> u32 {
    let r = monthly_rate_from_annual(loan.interest_rate);
    let extra_base = pandi * (multiplier - 1.0).max(0.0);
    let mut balance = loan.unpaid_balance;
    for m in 1..=loan.remaining_term {
        if balance <= 1.0 {
            return m - 1;
        }
        let ramp = if use_seasoning {
            seasoning_ramp(assumed_age + m, ramp_months)
        } else {
            1.0
        };
        let interest = balance * r;
        let sched = pandi.min(balance * (1.0 + r));
        let principal = sched - interest;
        balance = (balance - principal - extra_base * ramp).max(0.0);
    }
    loan.remaining_term
}

/// Monthly projection with a time-varying rate-delta dimension from a
/// treasury curve; the other three dimensions stay fixed.
fn project_life_with_curve(
    calc: &LoanCalc,
    tables: &Apex2Tables,
    curve: &TreasuryCurve,
    ramp_months: u32,
) -> u32 {
    let loan = calc.loan;
    let r = monthly_rate_from_annual(loan.interest_rate);
    let fixed = calc.dims.dim_credit + calc.dims.dim_ltv + calc.dims.dim_loan_size;
    let mut balance = loan.unpaid_balance;
    for m in 1..=loan.remaining_term {
        if balance <= 1.0 {
            return m - 1;
        }
        let rd = tables.dim_rate_delta(rate_delta_band(calc.rate_pct, curve.rate_at(m)));
        let multiplier = (fixed + rd) / 4.0;
        let extra = calc.pandi * (multiplier - 1.0).max(0.0)
            * seasoning_ramp(loan.loan_age + m, ramp_months);
        let interest = balance * r;
        let sched = calc.pandi.min(balance * (1.0 + r));
        balance = (balance - (sched - interest) - extra).max(0.0);
    }
    loan.remaining_term
}

/// Runs the full prepayment analysis for a package.
pub fn run_prepayment_analysis(
    tables: &Apex2Tables,
    package: &Package,
    config: &PrepaymentConfig,
) -> PrepaymentAnalysisResult {
    let ramp = config.seasoning_ramp_months;
    let calcs: Vec<LoanCalc> = package
        .loans
        .iter()
        .map(|loan| LoanCalc {
            loan,
            pandi: monthly_payment(loan.unpaid_balance, loan.interest_rate, loan.remaining_term),
            rate_pct: loan.interest_rate * 100.0,
            dims: multiplier_dims(tables, loan, config.treasury_10y),
        })
        .collect();

    let total_upb: f64 = calcs.iter().map(|c| c.loan.unpaid_balance).sum();
    let upb = if total_upb > 0.0 { total_upb } else { 1.0 };
    let wtd = |f: &dyn Fn(&LoanCalc) -> f64| -> f64 {
        calcs.iter().map(|c| f(c) * c.loan.unpaid_balance).sum::<f64>() / upb
    };

    let summary = PrepaymentSummary {
        loan_count: calcs.len(),
        total_upb,
        wtd_avg_rate_pct: wtd(&|c| c.rate_pct),
        wtd_avg_credit: wtd(&|c| c.loan.credit_score_or_sentinel() as f64),
        wtd_avg_ltv_pct: wtd(&|c| c.loan.ltv_or_default() * 100.0),
        wtd_avg_seasoning: wtd(&|c| c.loan.loan_age as f64),
        wtd_avg_remaining_term: wtd(&|c| c.loan.remaining_term as f64),
        treasury_10y: config.treasury_10y,
        wtd_avg_multiplier: wtd(&|c| c.dims.average()),
    };

    // {4-dim avg, credit-only} × {flat, seasoned actual, seasoned new}.
    let sources: [(&str, fn(&Apex2Dims) -> f64); 2] = [
        ("4-dim avg", |d| d.average()),
        ("credit-only", |d| d.credit_only()),
    ];
    let methods: [(&str, bool, Option<u32>); 3] = [
        ("Flat", false, None),
        ("Seasoned (actual age)", true, None),
        ("Seasoned (new, age=0)", true, Some(0)),
    ];

    let mut scenarios = Vec::with_capacity(sources.len() * methods.len());
    for (source_label, source) in sources {
        for (method_label, use_seasoning, age_override) in methods {
            let mut nper_total = 0.0;
            let mut monthly_total = 0.0;
            for calc in &calcs {
                let multiplier = source(&calc.dims);
                let age = age_override.unwrap_or(calc.loan.loan_age);
                if let Some(nper) = effective_life_months(
                    calc.loan.unpaid_balance,
                    calc.pandi * multiplier,
                    calc.loan.interest_rate,
                ) {
                    nper_total += nper as f64 * calc.loan.unpaid_balance;
                }
                let life =
                    project_life(calc.loan, calc.pandi, multiplier, age, use_seasoning, ramp);
                monthly_total += life as f64 * calc.loan.unpaid_balance;
            }
            let nper_months = (nper_total > 0.0).then(|| nper_total / upb);
            let monthly_months = monthly_total / upb;
            scenarios.push(EffectiveLifeScenario {
                label: format!("{source_label} / {method_label}"),
                multiplier_source: source_label.to_string(),
                method: method_label.to_string(),
                nper_months,
                monthly_months,
                nper_years: nper_months.map(|m| m / 12.0),
                monthly_years: monthly_months / 12.0,
            });
        }
    }

    let mut credit_bands = Vec::new();
    for band in CREDIT_BAND_ORDER {
        let group: Vec<&LoanCalc> =
            calcs.iter().filter(|c| c.dims.credit_band == band).collect();
        if group.is_empty() {
            continue;
        }
        let group_upb: f64 = group.iter().map(|c| c.loan.unpaid_balance).sum();
        let gw = |f: &dyn Fn(&LoanCalc) -> f64| -> f64 {
            group.iter().map(|c| f(c) * c.loan.unpaid_balance).sum::<f64>() / group_upb
        };
        credit_bands.push(CreditBandRow {
            band: band.to_string(),
            loan_count: group.len(),
            total_upb: group_upb,
            avg_multiplier: gw(&|c| c.dims.average()),
            avg_credit_multiplier: gw(&|c| c.dims.credit_only()),
            avg_rate_pct: gw(&|c| c.rate_pct),
            effective_life_months: gw(&|c| {
                project_life(
                    c.loan,
                    c.pandi,
                    c.dims.average(),
                    c.loan.loan_age,
                    false,
                    ramp,
                ) as f64
            }),
        });
    }

    let seasoning_sensitivity = (0..=60)
        .step_by(6)
        .map(|assumed_age| {
            let months = wtd(&|c| {
                project_life(c.loan, c.pandi, c.dims.average(), assumed_age, true, ramp) as f64
            });
            SeasoningSensitivityPoint {
                assumed_age_months: assumed_age,
                effective_life_months: months,
                effective_life_years: months / 12.0,
            }
        })
        .collect();

    let loan_details = calcs
        .iter()
        .map(|c| LoanMultiplierDetail {
            loan_id: c.loan.loan_id.clone(),
            dims: c.dims.clone(),
            multiplier: c.dims.average(),
            balance: c.loan.unpaid_balance,
            pandi: c.pandi,
            rate_pct: c.rate_pct,
            remaining_term: c.loan.remaining_term,
            loan_age: c.loan.loan_age,
        })
        .collect();

    let rate_curve_results = config
        .treasury_scenarios
        .iter()
        .map(|scenario| {
            let curve = TreasuryCurve::new(scenario.points.clone());
            let months =
                wtd(&|c| project_life_with_curve(c, tables, &curve, ramp) as f64);
            RateCurveScenarioResult {
                scenario_name: scenario.name.clone(),
                wtd_eff_life_months: months,
                wtd_eff_life_years: months / 12.0,
            }
        })
        .collect();

    PrepaymentAnalysisResult {
        summary,
        scenarios,
        credit_bands,
        seasoning_sensitivity,
        loan_details,
        rate_curve_results,
    }
}
