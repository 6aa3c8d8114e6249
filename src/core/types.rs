use serde::{Deserialize, Serialize};

use crate::core::engine::ValuationError;
use crate::math::monthly_payment;

/// Identifier of a segmentation leaf (1-based, `1..=K`).
pub type LeafId = u32;

/// Canonical credit-score sentinel meaning "no score on file".
pub const NO_SCORE_SENTINEL: u16 = 555;

/// A single seasoned residential mortgage. Immutable per valuation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    /// Opaque loan identifier.
    pub loan_id: String,
    /// Unpaid principal balance in currency units.
    pub unpaid_balance: f64,
    /// Annual note rate as a decimal fraction (e.g. 0.072).
    pub interest_rate: f64,
    /// Original amortisation term in months.
    pub original_term: u32,
    /// Remaining term in months (`remaining_term <= original_term`).
    pub remaining_term: u32,
    /// Seasoning in months since origination.
    pub loan_age: u32,
    /// FICO-style score in 300..=850; `None` or 555 means "no score".
    #[serde(default)]
    pub credit_score: Option<u16>,
    /// Loan-to-value as a decimal fraction (e.g. 0.80).
    #[serde(default)]
    pub ltv: Option<f64>,
    /// Debt-to-income as a decimal fraction.
    #[serde(default)]
    pub dti: Option<f64>,
    /// Two-letter property state code.
    #[serde(default)]
    pub state: Option<String>,
    /// Calendar year of origination.
    #[serde(default)]
    pub origination_year: Option<i32>,
    /// Borrower identified by ITIN rather than SSN.
    #[serde(default)]
    pub itin: Option<bool>,
}

impl Loan {
    /// Scheduled monthly P&I payment that fully amortises the current
    /// balance over the remaining term at the note rate.
    pub fn scheduled_payment(&self) -> f64 {
        monthly_payment(self.unpaid_balance, self.interest_rate, self.remaining_term)
    }

    /// Credit score with the no-score sentinel substituted for absence.
    pub fn credit_score_or_sentinel(&self) -> u16 {
        self.credit_score.unwrap_or(NO_SCORE_SENTINEL)
    }

    /// LTV with the conventional 80% fallback for missing values.
    pub fn ltv_or_default(&self) -> f64 {
        self.ltv.unwrap_or(0.80)
    }

    /// Validates the loan against the input contract. Any failure here
    /// fails the whole package valuation.
    pub fn validate(&self) -> Result<(), ValuationError> {
        let fail = |field: &'static str, message: String| {
            Err(ValuationError::InvalidInput {
                loan_id: Some(self.loan_id.clone()),
                field,
                message,
            })
        };
        if !self.unpaid_balance.is_finite() || self.unpaid_balance <= 0.0 {
            return fail(
                "unpaid_balance",
                format!("must be positive, got {}", self.unpaid_balance),
            );
        }
        if !self.interest_rate.is_finite() || !(0.0..1.0).contains(&self.interest_rate) {
            return fail(
                "interest_rate",
                format!("must lie in [0, 1), got {}", self.interest_rate),
            );
        }
        if self.remaining_term == 0 {
            return fail("remaining_term", "must be at least one month".into());
        }
        if self.original_term == 0 || self.remaining_term > self.original_term {
            return fail(
                "remaining_term",
                format!(
                    "remaining term {} exceeds original term {}",
                    self.remaining_term, self.original_term
                ),
            );
        }
        if let Some(score) = self.credit_score
            && score != NO_SCORE_SENTINEL
            && !(300..=850).contains(&score)
        {
            return fail("credit_score", format!("must lie in 300..=850, got {score}"));
        }
        if let Some(ltv) = self.ltv
            && (!ltv.is_finite() || !(0.0..3.0).contains(&ltv))
        {
            return fail("ltv", format!("must lie in [0, 3), got {ltv}"));
        }
        if let Some(dti) = self.dti
            && !dti.is_finite()
        {
            return fail("dti", "must be finite".into());
        }
        Ok(())
    }
}

/// A package of loans priced together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub package_id: String,
    pub name: String,
    /// Contemplated purchase price; defaults to total UPB when absent.
    #[serde(default)]
    pub purchase_price: Option<f64>,
    pub loans: Vec<Loan>,
}

impl Package {
    /// Sum of unpaid balances across the package.
    pub fn total_upb(&self) -> f64 {
        self.loans.iter().map(|l| l.unpaid_balance).sum()
    }

    /// Purchase price used for ROE, falling back to total UPB.
    pub fn effective_price(&self) -> f64 {
        self.purchase_price.unwrap_or_else(|| self.total_upb())
    }
}

/// A named macro parameter set applied on top of the base hazards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Multiplier on the monthly delinquency-entry rate.
    pub deq_mult: f64,
    /// Multiplier on the monthly default hazard.
    pub default_mult: f64,
    /// Multiplier on the prepayment hazard or extra-principal amount.
    pub prepay_mult: f64,
    /// Multiplier on recovery severity.
    pub recovery_mult: f64,
    /// Annual discount rate for this scenario.
    pub discount_rate: f64,
    /// Optional treasury curve as `(pillar_month, rate_percent)` points.
    /// Interpolated monthly by the projector in APEX2 mode.
    #[serde(default)]
    pub treasury_curve: Option<Vec<(u32, f64)>>,
}

impl Scenario {
    /// The unstressed base case: all multipliers one, 8% annual discount.
    pub fn baseline() -> Self {
        Scenario {
            name: "baseline".into(),
            deq_mult: 1.0,
            default_mult: 1.0,
            prepay_mult: 1.0,
            recovery_mult: 1.0,
            discount_rate: 0.08,
            treasury_curve: None,
        }
    }
}

/// Which prepayment model drives the projector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepaymentSource {
    /// Formula CDR default plus PSA-style prepayment ramp. No KM curve.
    Stub,
    /// KM hazard treated as all-causes exit, split by a fixed default share.
    KmAll,
    /// Flat CDR default; prepayment is the KM residual clamped at zero.
    KmWithFlatDefault,
    /// Flat CDR default; prepayment as APEX2 extra-principal dollars.
    Apex2,
}

impl PrepaymentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stub => "stub",
            Self::KmAll => "km_all",
            Self::KmWithFlatDefault => "km_with_flat_default",
            Self::Apex2 => "apex2",
        }
    }
}

/// Configuration for one valuation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Stochastic draws per scenario. Forced to 1 when
    /// `include_stochastic` is false.
    pub n_draws: u32,
    /// Enabled scenario names; must be a non-empty subset of the catalogue.
    pub scenarios: Vec<String>,
    /// Optional scenario weights (same length as `scenarios`); equal
    /// weighting when absent. Normalised before use.
    #[serde(default)]
    pub scenario_weights: Option<Vec<f64>>,
    /// When false, every shock multiplier is one and `n_draws` is 1.
    pub include_stochastic: bool,
    /// Seed for reproducible draws; a random seed is taken when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    pub prepayment_source: PrepaymentSource,
    /// Flat annual discount rate overriding the per-scenario rate.
    #[serde(default)]
    pub discount_rate: Option<f64>,
    /// Annual conditional default rate used by the flat-CDR modes.
    pub annual_cdr: f64,
    /// Default share `α` of the all-causes hazard in `km_all` mode.
    pub km_default_share: f64,
    /// Flat 10-year treasury yield in percent (APEX2 rate-delta anchor).
    pub treasury_10y: f64,
    /// APEX2 seasoning ramp horizon in months.
    pub seasoning_ramp_months: u32,
    /// Log-normal shock volatility `σ`.
    pub shock_sigma: f64,
    /// Common-factor loading `ρ`.
    pub shock_rho: f64,
    /// Annual servicing cost in basis points of surviving balance.
    pub servicing_bps: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            n_draws: 100,
            scenarios: vec![
                "baseline".into(),
                "mild_recession".into(),
                "severe_recession".into(),
            ],
            scenario_weights: None,
            include_stochastic: true,
            seed: Some(42),
            prepayment_source: PrepaymentSource::KmWithFlatDefault,
            discount_rate: None,
            annual_cdr: 0.0015,
            km_default_share: 0.20,
            treasury_10y: 4.5,
            seasoning_ramp_months: 30,
            shock_sigma: 0.15,
            shock_rho: 0.30,
            servicing_bps: 25.0,
        }
    }
}

impl SimulationConfig {
    /// Draws actually executed per scenario.
    pub fn effective_draws(&self) -> u32 {
        if self.include_stochastic { self.n_draws.max(1) } else { 1 }
    }

    /// Normalised per-scenario weights, equal when none are supplied.
    pub fn normalized_weights(&self) -> Result<Vec<f64>, ValuationError> {
        let n = self.scenarios.len();
        match &self.scenario_weights {
            None => Ok(vec![1.0 / n as f64; n]),
            Some(w) => {
                if w.len() != n {
                    return Err(ValuationError::InvalidInput {
                        loan_id: None,
                        field: "scenario_weights",
                        message: format!("expected {n} weights, got {}", w.len()),
                    });
                }
                let total: f64 = w.iter().sum();
                if !(total.is_finite() && total > 0.0) || w.iter().any(|x| *x < 0.0) {
                    return Err(ValuationError::InvalidInput {
                        loan_id: None,
                        field: "scenario_weights",
                        message: "weights must be non-negative with a positive sum".into(),
                    });
                }
                Ok(w.iter().map(|x| x / total).collect())
            }
        }
    }
}

/// Bid-ladder request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BidConfig {
    /// Ladder centre; defaults to `round(UPB · 0.90)` when absent.
    #[serde(default)]
    pub center_price: Option<f64>,
    /// Price step between rungs.
    pub increment: f64,
    /// ROE hurdle used for the exceedance probability.
    pub target_roe: f64,
}

impl Default for BidConfig {
    fn default() -> Self {
        BidConfig {
            center_price: None,
            increment: 10_000.0,
            target_roe: 0.12,
        }
    }
}
