//! Result payloads produced by the valuation kernel.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::engine::{LoanIncident, ModelManifestView};
use crate::core::types::LeafId;

/// Projected cash flow for a single month of a single draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCashFlow {
    /// Month index, 1-based from the valuation date.
    pub month: u32,
    /// Cumulative probability of still performing at month end.
    pub survival_probability: f64,
    /// Contractual P&I payment (plus extra principal in APEX2 mode).
    pub scheduled_payment: f64,
    /// Survival-weighted payment cash.
    pub expected_payment: f64,
    /// Share of the surviving pool that is 30+ days past due.
    pub deq_probability: f64,
    /// Marginal default hazard applied this month.
    pub default_probability: f64,
    /// Marginal prepayment hazard applied this month.
    pub prepay_probability: f64,
    /// Expected principal returned (scheduled, prepaid, and recovered).
    pub expected_principal: f64,
    /// Expected payoff cash from full prepayments.
    pub expected_prepayment: f64,
    /// Expected write-off from defaults arriving this month.
    pub expected_loss: f64,
    /// Recovery cash from defaults whose foreclosure timer matures now.
    pub expected_recovery: f64,
    /// Servicing drag on the surviving balance.
    pub servicing_cost: f64,
    /// Payment + prepayment + recovery − loss − servicing.
    pub net_cash_flow: f64,
    /// `1 / (1 + r/12)^month`.
    pub discount_factor: f64,
    /// `net_cash_flow · discount_factor`.
    pub present_value: f64,
}

/// Five-point summary of a sorted distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Which models and parameters produced a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProvenance {
    pub prepayment_source: String,
    pub credit_model: String,
    pub discount_method: String,
    pub discount_rate_annual: f64,
    pub curve_variant: String,
}

/// Comparison of the Monte Carlo valuation against the deterministic
/// APEX2 reference track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMetrics {
    pub reference_pv: f64,
    pub simulated_pv: f64,
    pub absolute_error: f64,
    pub relative_error_pct: f64,
    pub roe_reference: f64,
    pub roe_simulated: f64,
    pub roe_diff_bps: f64,
    pub tolerance_pct: f64,
    pub within_tolerance: bool,
}

/// Valuation output for a single loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanValuationResult {
    pub loan_id: String,
    /// Segmentation leaf the loan priced under.
    pub leaf_id: LeafId,
    /// Scenario-weighted mean present value.
    pub expected_pv: f64,
    /// Mean PV per scenario across draws.
    pub pv_by_scenario: BTreeMap<String, f64>,
    /// All `(scenario, draw)` PVs, sorted ascending.
    pub pv_distribution: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv_percentiles: Option<Percentiles>,
    /// Baseline deterministic monthly cash-flow sequence.
    pub monthly_cash_flows: Vec<MonthlyCashFlow>,
    /// Weighted-average life in years under the baseline projection.
    pub wal_years: f64,
}

/// Aggregated valuation output for a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageValuationResult {
    pub package_id: String,
    pub package_name: String,
    pub loan_count: usize,
    pub total_upb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<f64>,
    /// Scenario-weighted mean package NPV.
    pub expected_npv: f64,
    pub npv_by_scenario: BTreeMap<String, f64>,
    /// Per-(scenario, draw) package NPVs, sorted ascending.
    pub npv_distribution: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npv_percentiles: Option<Percentiles>,
    pub roe: f64,
    pub roe_annualized: f64,
    pub roe_by_scenario: BTreeMap<String, f64>,
    pub roe_distribution: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roe_percentiles: Option<Percentiles>,
    /// UPB-weighted weighted-average life in years.
    pub wal_years: f64,
    pub loan_results: Vec<LoanValuationResult>,
    /// Loans that failed numerically and were excluded from aggregates.
    pub incidents: Vec<LoanIncident>,
    pub model_manifest: ModelManifestView,
    pub provenance: ModelProvenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationMetrics>,
    pub computed_at: DateTime<Utc>,
}

/// One rung of the bid ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRow {
    pub price: f64,
    pub expected_roe: f64,
    pub annualized_roe: f64,
    pub roe_percentiles: Percentiles,
    /// Fraction of draws with `ROE >= target_roe`.
    pub prob_roe_above_target: f64,
}

/// Bid ladder over a fixed NPV distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidLadder {
    pub center_price: f64,
    pub increment: f64,
    pub target_roe: f64,
    /// UPB-weighted average remaining term in years, used to annualise.
    pub avg_remaining_years: f64,
    pub rows: Vec<BidRow>,
}
