//! Bid-ladder analytics.
//!
//! Re-prices a fixed package NPV distribution across a ladder of purchase
//! prices: 21 rungs centred on the bid (or `round(UPB · 0.90)` by
//! default), each with expected and annualised ROE, ROE percentiles, and
//! the probability of clearing the target return.

use crate::core::{BidConfig, BidLadder, BidRow, Loan, ValuationError};
use crate::risk::stats::{five_point, mean};

/// Rungs on either side of the centre price.
const LADDER_HALF_WIDTH: i32 = 10;

/// Builds the bid ladder for a package NPV distribution.
///
/// The distribution is independent of purchase price, so a single
/// valuation supports the whole ladder.
pub fn run_bid_analysis(
    npv_distribution: &[f64],
    loans: &[Loan],
    config: &BidConfig,
) -> Result<BidLadder, ValuationError> {
    if npv_distribution.is_empty() {
        return Err(ValuationError::Numeric {
            message: "bid analysis needs a non-empty NPV distribution".into(),
        });
    }
    if loans.is_empty() {
        return Err(ValuationError::InvalidInput {
            loan_id: None,
            field: "loans",
            message: "bid analysis needs the priced loans for term weighting".into(),
        });
    }
    if config.increment <= 0.0 {
        return Err(ValuationError::InvalidInput {
            loan_id: None,
            field: "increment",
            message: format!("must be positive, got {}", config.increment),
        });
    }

    let total_upb: f64 = loans.iter().map(|l| l.unpaid_balance).sum();
    let center_price = config
        .center_price
        .unwrap_or_else(|| (total_upb * 0.90).round());
    let avg_remaining_years = loans
        .iter()
        .map(|l| l.remaining_term as f64 * l.unpaid_balance)
        .sum::<f64>()
        / total_upb
        / 12.0;

    let mut rows = Vec::with_capacity(2 * LADDER_HALF_WIDTH as usize + 1);
    for i in -LADDER_HALF_WIDTH..=LADDER_HALF_WIDTH {
        let price = center_price + i as f64 * config.increment;
        if price <= 0.0 {
            continue;
        }
        rows.push(bid_row(npv_distribution, price, config.target_roe, avg_remaining_years)?);
    }

    Ok(BidLadder {
        center_price,
        increment: config.increment,
        target_roe: config.target_roe,
        avg_remaining_years,
        rows,
    })
}

fn bid_row(
    npv_distribution: &[f64],
    price: f64,
    target_roe: f64,
    years: f64,
) -> Result<BidRow, ValuationError> {
    let mut roes: Vec<f64> = npv_distribution
        .iter()
        .map(|npv| (npv - price) / price)
        .collect();
    let expected_roe = mean(&roes);

    // ROE ≥ target exactly when NPV ≥ price · (1 + target).
    let hurdle = price * (1.0 + target_roe);
    let above = npv_distribution.iter().filter(|&&npv| npv >= hurdle).count();
    let prob_roe_above_target = above as f64 / npv_distribution.len() as f64;

    roes.sort_by(f64::total_cmp);
    let roe_percentiles = five_point(&roes)?;

    Ok(BidRow {
        price,
        expected_roe,
        annualized_roe: annualize(expected_roe, years),
        roe_percentiles,
        prob_roe_above_target,
    })
}

/// `(1 + ROE)^(1/years) − 1`, falling back to the simple ROE for
/// degenerate inputs (total loss or a zero horizon).
pub fn annualize(roe: f64, years: f64) -> f64 {
    if years > 0.0 && roe > -1.0 {
        (1.0 + roe).powf(1.0 / years) - 1.0
    } else {
        roe
    }
}
