//! Level-payment amortisation math.
//!
//! All routines are double precision and guard the `ln`/`powi` call sites
//! against the zero-rate and zero-payment corner cases, which both collapse
//! to closed-form values.

/// Converts an annual rate quoted as a decimal fraction into a monthly rate.
#[inline]
pub fn monthly_rate_from_annual(annual: f64) -> f64 {
    annual / 12.0
}

/// Standard PMT for a fixed-rate amortising loan.
///
/// `PMT = B·r / (1 − (1+r)^−n)` with monthly rate `r`. Degenerates to the
/// straight-line `B/n` at zero rate.
pub fn monthly_payment(balance: f64, annual_rate: f64, remaining_months: u32) -> f64 {
    if remaining_months == 0 || balance <= 0.0 {
        return 0.0;
    }
    let r = monthly_rate_from_annual(annual_rate);
    if r <= 0.0 {
        return balance / remaining_months as f64;
    }
    balance * r / (1.0 - (1.0 + r).powi(-(remaining_months as i32)))
}

/// Inverts the annuity formula for the number of months needed to retire
/// `balance` with a fixed `payment` at the loan's monthly rate.
///
/// Returns `None` when the payment does not cover interest (the balance
/// would never amortise) or when either input is degenerate.
pub fn effective_life_months(balance: f64, payment: f64, annual_rate: f64) -> Option<u32> {
    let r = monthly_rate_from_annual(annual_rate);
    if payment <= 0.0 || balance <= 0.0 {
        return None;
    }
    if r <= 0.0 {
        return Some((balance / payment).ceil() as u32);
    }
    let ratio = balance * r / payment;
    if ratio >= 1.0 {
        return None;
    }
    // n = −ln(1 − B·r/PMT) / ln(1 + r)
    let n = -(-ratio).ln_1p() / r.ln_1p();
    Some(n.ceil() as u32)
}
