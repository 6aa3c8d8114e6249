//! Package valuation orchestration and result shaping.
//!
//! `run_valuation` is the kernel's main inbound operation: it validates
//! the package, assigns leaves, builds per-scenario hazard schedules,
//! fans the projector out across Monte Carlo draws, and shapes the
//! aggregate result object. Per-loan numeric failures are isolated and
//! reported; invalid input fails the whole call.

pub mod calibration;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::DEFAULT_DEADLINE_SECS;
use crate::core::{
    FallbackLog, LoanIncident, LoanValuationResult, ModelProvenance, Package,
    PackageValuationResult, PrepaymentSource, SimulationConfig, ValuationError,
};
use crate::credit::build_transitions;
use crate::engines::monte_carlo::{DrawMatrix, LoanPlan, RunControl, run_draws};
use crate::engines::projector::{Projection, ProjectionParams, project};
use crate::prepay::{TreasuryCurve, extra_principal_schedule};
use crate::registry::Registry;
use crate::risk::bid::annualize;
use crate::risk::stats::five_point;

pub use calibration::{ReferenceConfig, calibrate, reference_package_pv};

/// Runs a full package valuation.
pub fn run_valuation(
    registry: &Registry,
    package: &Package,
    config: &SimulationConfig,
    control: &RunControl,
) -> Result<PackageValuationResult, ValuationError> {
    if package.loans.is_empty() {
        return Err(ValuationError::InvalidInput {
            loan_id: None,
            field: "loans",
            message: "package has no loans".into(),
        });
    }
    if config.scenarios.is_empty() {
        return Err(ValuationError::InvalidInput {
            loan_id: None,
            field: "scenarios",
            message: "at least one scenario must be enabled".into(),
        });
    }
    if let Some(price) = package.purchase_price
        && (!price.is_finite() || price <= 0.0)
    {
        return Err(ValuationError::InvalidInput {
            loan_id: None,
            field: "purchase_price",
            message: format!("must be positive, got {price}"),
        });
    }
    let weights = config.normalized_weights()?;
    let scenarios = config
        .scenarios
        .iter()
        .map(|name| registry.scenario(name).cloned())
        .collect::<Result<Vec<_>, _>>()?;

    // Fail-fast: any malformed loan rejects the whole package.
    for loan in &package.loans {
        loan.validate()?;
    }

    let control = RunControl {
        cancel: control.cancel,
        deadline: control
            .deadline
            .or_else(|| Instant::now().checked_add(Duration::from_secs(DEFAULT_DEADLINE_SECS))),
    };

    // Index of the scenario whose deterministic projection supplies the
    // reported cash-flow sequence.
    let baseline_idx = config
        .scenarios
        .iter()
        .position(|name| name == "baseline")
        .unwrap_or(0);

    let mut fallbacks = FallbackLog::new();
    let mut incidents: Vec<LoanIncident> = Vec::new();
    let mut plans: Vec<LoanPlan> = Vec::new();
    let mut baselines: Vec<Projection> = Vec::new();

    for loan in &package.loans {
        let leaf = registry.assign_leaf(loan, &mut fallbacks);
        let curve = registry.survival_curve(
            leaf,
            loan.remaining_term as usize,
            &loan.loan_id,
            &mut fallbacks,
        );

        let mut transitions = Vec::with_capacity(scenarios.len());
        let mut params = Vec::with_capacity(scenarios.len());
        for scenario in &scenarios {
            let schedule = (config.prepayment_source == PrepaymentSource::Apex2).then(|| {
                let treasury = scenario
                    .treasury_curve
                    .clone()
                    .map(TreasuryCurve::new)
                    .unwrap_or_else(|| TreasuryCurve::flat(config.treasury_10y));
                extra_principal_schedule(
                    loan,
                    registry.apex2_tables(),
                    &treasury,
                    config.seasoning_ramp_months,
                    loan.remaining_term,
                )
            });
            transitions.push(build_transitions(
                loan,
                leaf,
                &curve,
                scenario,
                config,
                schedule.as_deref(),
                &mut fallbacks,
            ));
            params.push(ProjectionParams {
                annual_discount_rate: config.discount_rate.unwrap_or(scenario.discount_rate),
                servicing_bps: config.servicing_bps,
            });
        }

        // Deterministic pass: numeric failures isolate the loan while the
        // package proceeds.
        match project(loan, &transitions[baseline_idx], params[baseline_idx], None) {
            Ok(baseline) => {
                plans.push(LoanPlan {
                    loan: loan.clone(),
                    leaf,
                    transitions,
                    params,
                });
                baselines.push(baseline);
            }
            Err(err) => {
                log::warn!("loan {} excluded from valuation: {err}", loan.loan_id);
                incidents.push(LoanIncident {
                    loan_id: loan.loan_id.clone(),
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
            }
        }
    }

    if plans.is_empty() {
        return Err(ValuationError::Numeric {
            message: format!("all {} loans failed numerically", package.loans.len()),
        });
    }

    let matrix = run_draws(&plans, scenarios.len(), config, &control)?;

    shape_result(
        registry, package, config, &weights, &scenarios, plans, baselines, incidents, fallbacks,
        matrix,
    )
}

#[allow(clippy::too_many_arguments)]
fn shape_result(
    registry: &Registry,
    package: &Package,
    config: &SimulationConfig,
    weights: &[f64],
    scenarios: &[crate::core::Scenario],
    plans: Vec<LoanPlan>,
    baselines: Vec<Projection>,
    incidents: Vec<LoanIncident>,
    fallbacks: FallbackLog,
    matrix: DrawMatrix,
) -> Result<PackageValuationResult, ValuationError> {
    let mut loan_results = Vec::with_capacity(plans.len());
    for (i, (plan, baseline)) in plans.iter().zip(baselines).enumerate() {
        let mut pv_by_scenario = BTreeMap::new();
        let mut expected_pv = 0.0;
        for (s, scenario) in scenarios.iter().enumerate() {
            let mean = matrix.loan_scenario_mean(i, s);
            expected_pv += weights[s] * mean;
            pv_by_scenario.insert(scenario.name.clone(), mean);
        }
        let mut pv_distribution = matrix.loan_pvs[i].clone();
        pv_distribution.sort_by(f64::total_cmp);
        let pv_percentiles = Some(five_point(&pv_distribution)?);

        loan_results.push(LoanValuationResult {
            loan_id: plan.loan.loan_id.clone(),
            leaf_id: plan.leaf,
            expected_pv,
            pv_by_scenario,
            pv_distribution,
            pv_percentiles,
            monthly_cash_flows: baseline.cash_flows,
            wal_years: baseline.wal_years,
        });
    }

    let mut npv_by_scenario = BTreeMap::new();
    let mut expected_npv = 0.0;
    for (s, scenario) in scenarios.iter().enumerate() {
        let mean = matrix.scenario_mean(s);
        expected_npv += weights[s] * mean;
        npv_by_scenario.insert(scenario.name.clone(), mean);
    }
    let mut npv_distribution = matrix.package_npvs.clone();
    npv_distribution.sort_by(f64::total_cmp);
    let npv_percentiles = Some(five_point(&npv_distribution)?);

    let included_upb: f64 = plans.iter().map(|p| p.loan.unpaid_balance).sum();
    let wal_years = plans
        .iter()
        .zip(&loan_results)
        .map(|(plan, lr)| plan.loan.unpaid_balance * lr.wal_years)
        .sum::<f64>()
        / included_upb;
    let avg_remaining_years = plans
        .iter()
        .map(|p| p.loan.unpaid_balance * p.loan.remaining_term as f64)
        .sum::<f64>()
        / included_upb
        / 12.0;
    let horizon_years = if wal_years > 0.0 { wal_years } else { avg_remaining_years };

    let price = package.effective_price();
    let roe = (expected_npv - price) / price;
    let roe_by_scenario: BTreeMap<String, f64> = npv_by_scenario
        .iter()
        .map(|(name, npv)| (name.clone(), (npv - price) / price))
        .collect();
    let roe_distribution: Vec<f64> = npv_distribution
        .iter()
        .map(|npv| (npv - price) / price)
        .collect();
    let roe_percentiles = Some(five_point(&roe_distribution)?);

    let mut model_manifest = registry.status();
    model_manifest.fallbacks = fallbacks.count() as u64;

    let baseline_discount = config
        .discount_rate
        .unwrap_or_else(|| scenarios.first().map(|s| s.discount_rate).unwrap_or(0.08));
    let credit_model = match config.prepayment_source {
        PrepaymentSource::Stub => "stub_formula".to_string(),
        PrepaymentSource::KmAll => format!("km_all_share_{}", config.km_default_share),
        PrepaymentSource::KmWithFlatDefault | PrepaymentSource::Apex2 => {
            format!("flat_cdr_{}", config.annual_cdr)
        }
    };
    let provenance = ModelProvenance {
        prepayment_source: config.prepayment_source.as_str().to_string(),
        credit_model,
        discount_method: if config.discount_rate.is_some() {
            "flat_override".to_string()
        } else {
            "scenario_cost_of_capital".to_string()
        },
        discount_rate_annual: baseline_discount,
        curve_variant: registry.curve_variant().to_string(),
    };

    Ok(PackageValuationResult {
        package_id: package.package_id.clone(),
        package_name: package.name.clone(),
        loan_count: loan_results.len(),
        total_upb: package.total_upb(),
        purchase_price: package.purchase_price,
        expected_npv,
        npv_by_scenario,
        npv_distribution,
        npv_percentiles,
        roe,
        roe_annualized: annualize(roe, horizon_years),
        roe_by_scenario,
        roe_distribution,
        roe_percentiles,
        wal_years,
        loan_results,
        incidents,
        model_manifest,
        provenance,
        calibration: None,
        computed_at: Utc::now(),
    })
}
