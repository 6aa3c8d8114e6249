//! APEX2 prepayment multipliers.
//!
//! The legacy model expresses prepayment speed as four independent lookup
//! tables keyed by banded loan characteristics; a loan's multiplier is the
//! arithmetic mean of the four table values. Values above 1 imply principal
//! payments accelerated relative to schedule.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{Loan, NO_SCORE_SENTINEL};
use crate::math::monthly_payment;
use crate::prepay::treasury::TreasuryCurve;

/// Band label for a loan with no usable credit score.
pub const NO_SCORE_BAND: &str = "no_score";

const DEFAULT_DIM_CREDIT: f64 = 2.0;
const DEFAULT_DIM_RATE_DELTA: f64 = 1.8;
const DEFAULT_DIM_LTV: f64 = 2.2;
const DEFAULT_DIM_LOAN_SIZE: f64 = 2.5;

/// The four APEX2 lookup tables, label → multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apex2Tables {
    pub credit: BTreeMap<String, f64>,
    pub rate_delta: BTreeMap<String, f64>,
    pub ltv: BTreeMap<String, f64>,
    pub loan_size: BTreeMap<String, f64>,
}

impl Apex2Tables {
    /// Canonical table values used when no artifact is loaded.
    pub fn fallback() -> Self {
        let credit = [
            ("<576", 1.3583),
            ("576-600", 1.5713),
            ("601-625", 1.8124),
            ("626-650", 2.1814),
            ("651-675", 2.4668),
            ("676-700", 2.7220),
            ("701-725", 2.7022),
            ("726-750", 2.7284),
            (">=751", 2.7159),
            (NO_SCORE_BAND, 2.0),
        ];
        let rate_delta = [
            ("<=-3%", 1.4307),
            ("-2 to -2.99%", 1.2733),
            ("-1 to -1.99%", 1.7116),
            ("-0.99 to 0.99%", 1.8363),
            ("1 to 1.99%", 2.0108),
            ("2 to 2.99%", 2.4278),
            (">=3%", 2.3215),
        ];
        let ltv = [
            ("< 75%", 2.2420),
            ("75% - 79.99%", 2.5268),
            ("80% - 84.99%", 2.5173),
            ("85% - 89.99%", 2.0415),
            (">= 90%", 1.6916),
        ];
        let loan_size = [
            ("$0 - $49,999", 1.3169),
            ("$50,000 - $99,999", 1.6846),
            ("$100,000 - $149,999", 2.2964),
            ("$150,000 - $199,999", 2.6937),
            ("$200,000 - $249,999", 2.8286),
            ("$250,000 - $499,999", 2.9982),
            ("$500,000 - $999,999", 3.3578),
            ("$1,000,000+", 3.3335),
        ];
        let to_map = |entries: &[(&str, f64)]| {
            entries
                .iter()
                .map(|&(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<String, f64>>()
        };
        Apex2Tables {
            credit: to_map(&credit),
            rate_delta: to_map(&rate_delta),
            ltv: to_map(&ltv),
            loan_size: to_map(&loan_size),
        }
    }

    fn dim(&self, table: &BTreeMap<String, f64>, band: &str, default: f64) -> f64 {
        table.get(band).copied().unwrap_or(default)
    }

    pub fn dim_credit(&self, band: &str) -> f64 {
        self.dim(&self.credit, band, DEFAULT_DIM_CREDIT)
    }

    pub fn dim_rate_delta(&self, band: &str) -> f64 {
        self.dim(&self.rate_delta, band, DEFAULT_DIM_RATE_DELTA)
    }

    pub fn dim_ltv(&self, band: &str) -> f64 {
        self.dim(&self.ltv, band, DEFAULT_DIM_LTV)
    }

    pub fn dim_loan_size(&self, band: &str) -> f64 {
        self.dim(&self.loan_size, band, DEFAULT_DIM_LOAN_SIZE)
    }
}

/// Credit band for a score; 555 is the no-score sentinel.
pub fn credit_band(score: u16) -> &'static str {
    if score == NO_SCORE_SENTINEL {
        return NO_SCORE_BAND;
    }
    match score {
        0..=575 => "<576",
        576..=600 => "576-600",
        601..=625 => "601-625",
        626..=650 => "626-650",
        651..=675 => "651-675",
        676..=700 => "676-700",
        701..=725 => "701-725",
        726..=750 => "726-750",
        _ => ">=751",
    }
}

/// Rate-delta band over `note_rate% − treasury%`.
pub fn rate_delta_band(rate_pct: f64, treasury_pct: f64) -> &'static str {
    let delta = rate_pct - treasury_pct;
    if delta <= -3.0 {
        "<=-3%"
    } else if delta <= -2.0 {
        "-2 to -2.99%"
    } else if delta <= -1.0 {
        "-1 to -1.99%"
    } else if delta < 1.0 {
        "-0.99 to 0.99%"
    } else if delta < 2.0 {
        "1 to 1.99%"
    } else if delta < 3.0 {
        "2 to 2.99%"
    } else {
        ">=3%"
    }
}

/// LTV band over the percentage form.
pub fn ltv_band(ltv_pct: f64) -> &'static str {
    if ltv_pct < 75.0 {
        "< 75%"
    } else if ltv_pct < 80.0 {
        "75% - 79.99%"
    } else if ltv_pct < 85.0 {
        "80% - 84.99%"
    } else if ltv_pct < 90.0 {
        "85% - 89.99%"
    } else {
        ">= 90%"
    }
}

/// Loan-size band in dollars.
pub fn loan_size_band(balance: f64) -> &'static str {
    if balance < 50_000.0 {
        "$0 - $49,999"
    } else if balance < 100_000.0 {
        "$50,000 - $99,999"
    } else if balance < 150_000.0 {
        "$100,000 - $149,999"
    } else if balance < 200_000.0 {
        "$150,000 - $199,999"
    } else if balance < 250_000.0 {
        "$200,000 - $249,999"
    } else if balance < 500_000.0 {
        "$250,000 - $499,999"
    } else if balance < 1_000_000.0 {
        "$500,000 - $999,999"
    } else {
        "$1,000,000+"
    }
}

/// Banded table values for one loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apex2Dims {
    pub credit_band: String,
    pub dim_credit: f64,
    pub rate_delta_band: String,
    pub dim_rate_delta: f64,
    pub ltv_band: String,
    pub dim_ltv: f64,
    pub loan_size_band: String,
    pub dim_loan_size: f64,
}

impl Apex2Dims {
    /// The 4-dimension arithmetic mean.
    pub fn average(&self) -> f64 {
        (self.dim_credit + self.dim_rate_delta + self.dim_ltv + self.dim_loan_size) / 4.0
    }

    /// The credit-only multiplier variant.
    pub fn credit_only(&self) -> f64 {
        self.dim_credit
    }
}

/// Looks up all four dimensions for a loan at a given treasury yield.
pub fn multiplier_dims(tables: &Apex2Tables, loan: &Loan, treasury_pct: f64) -> Apex2Dims {
    let rate_pct = loan.interest_rate * 100.0;
    let ltv_pct = loan.ltv_or_default() * 100.0;
    let cb = credit_band(loan.credit_score_or_sentinel());
    let rdb = rate_delta_band(rate_pct, treasury_pct);
    let lb = ltv_band(ltv_pct);
    let sb = loan_size_band(loan.unpaid_balance);
    Apex2Dims {
        credit_band: cb.to_string(),
        dim_credit: tables.dim_credit(cb),
        rate_delta_band: rdb.to_string(),
        dim_rate_delta: tables.dim_rate_delta(rdb),
        ltv_band: lb.to_string(),
        dim_ltv: tables.dim_ltv(lb),
        loan_size_band: sb.to_string(),
        dim_loan_size: tables.dim_loan_size(sb),
    }
}

/// Seasoning ramp `min(age / ramp, 1)`, zero at age zero, saturating at 1
/// for any age at or past the horizon.
pub fn seasoning_ramp(age_months: u32, ramp_months: u32) -> f64 {
    if age_months == 0 {
        return 0.0;
    }
    (age_months as f64 / ramp_months.max(1) as f64).min(1.0)
}

/// Monthly extra-principal dollars for the projector's APEX2 mode.
///
/// The rate-delta dimension is recomputed each month from the treasury
/// curve; credit, LTV, and loan-size dimensions stay fixed. The returned
/// amounts already include the seasoning ramp but not scenario stress.
pub fn extra_principal_schedule(
    loan: &Loan,
    tables: &Apex2Tables,
    treasury: &TreasuryCurve,
    ramp_months: u32,
    months: u32,
) -> Vec<f64> {
    let rate_pct = loan.interest_rate * 100.0;
    let pandi = monthly_payment(loan.unpaid_balance, loan.interest_rate, loan.remaining_term);
    let dims = multiplier_dims(tables, loan, treasury.rate_at(0));
    let fixed = dims.dim_credit + dims.dim_ltv + dims.dim_loan_size;

    (1..=months)
        .map(|m| {
            let rd = tables.dim_rate_delta(rate_delta_band(rate_pct, treasury.rate_at(m)));
            let multiplier = (fixed + rd) / 4.0;
            let ramp = seasoning_ramp(loan.loan_age + m, ramp_months);
            pandi * (multiplier - 1.0).max(0.0) * ramp
        })
        .collect()
}
