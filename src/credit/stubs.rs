//! Formula-based per-leaf model parameters.
//!
//! These back the stub tiers of the model set: delinquency entry rates,
//! loss severities, recovery rates, and foreclosure timelines keyed by the
//! five canonical leaves. Loaded artifacts take precedence everywhere;
//! these values are the floor the kernel can always stand on.

use crate::core::LeafId;

/// Base annual delinquency-entry rates per leaf.
const DEQ_BASE_RATES: [f64; 5] = [0.01, 0.025, 0.05, 0.10, 0.18];
const DEQ_DEFAULT_BASE: f64 = 0.05;
const DEQ_SEASONING_DECAY: f64 = 0.02;

/// Loss-given-default severities per leaf.
const LOSS_SEVERITIES: [f64; 5] = [0.20, 0.25, 0.35, 0.45, 0.55];
const DEFAULT_SEVERITY: f64 = 0.35;

/// Recovered fraction of defaulted balance per leaf.
const RECOVERY_RATES: [f64; 5] = [0.70, 0.60, 0.50, 0.40, 0.30];
const DEFAULT_RECOVERY: f64 = 0.50;

/// States requiring judicial foreclosure.
const JUDICIAL_STATES: [&str; 25] = [
    "CT", "DE", "FL", "HI", "IL", "IN", "IA", "KS", "KY", "LA", "ME", "MD", "MA", "NE", "NJ",
    "NM", "NY", "ND", "OH", "OK", "PA", "SC", "SD", "VT", "WI",
];

const JUDICIAL_MONTHS: u32 = 24;
const NON_JUDICIAL_MONTHS: u32 = 12;

fn leaf_entry(table: &[f64; 5], leaf: LeafId, default: f64) -> f64 {
    table.get(leaf.saturating_sub(1) as usize).copied().unwrap_or(default)
}

/// Monthly delinquency-entry rate at a given loan age. Seasoning reduces
/// delinquency exponentially.
pub fn deq_rate(leaf: LeafId, loan_age: u32) -> f64 {
    let monthly_base = leaf_entry(&DEQ_BASE_RATES, leaf, DEQ_DEFAULT_BASE) / 12.0;
    monthly_base * (-DEQ_SEASONING_DECAY * loan_age as f64).exp()
}

/// Loss-given-default as a fraction of defaulted balance.
pub fn loss_severity(leaf: LeafId) -> f64 {
    leaf_entry(&LOSS_SEVERITIES, leaf, DEFAULT_SEVERITY)
}

/// Expected recovered fraction of defaulted balance.
pub fn recovery_rate(leaf: LeafId) -> f64 {
    leaf_entry(&RECOVERY_RATES, leaf, DEFAULT_RECOVERY)
}

/// Whether the state forecloses through the courts.
pub fn is_judicial_state(state: &str) -> bool {
    let upper = state.to_ascii_uppercase();
    JUDICIAL_STATES.contains(&upper.as_str())
}

/// Months from default to liquidation cash.
pub fn foreclosure_months(state: Option<&str>) -> u32 {
    match state {
        Some(s) if is_judicial_state(s) => JUDICIAL_MONTHS,
        _ => NON_JUDICIAL_MONTHS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deq_rate_declines_with_seasoning() {
        assert!(deq_rate(3, 60) < deq_rate(3, 0));
    }

    #[test]
    fn riskier_leaves_have_higher_deq_and_severity() {
        assert!(deq_rate(5, 12) > deq_rate(1, 12));
        assert!(loss_severity(5) > loss_severity(1));
        assert!(recovery_rate(5) < recovery_rate(1));
    }

    #[test]
    fn unknown_leaf_uses_middle_defaults() {
        assert_eq!(loss_severity(99), DEFAULT_SEVERITY);
        assert_eq!(recovery_rate(0), DEFAULT_RECOVERY);
    }

    #[test]
    fn judicial_states_take_longer() {
        assert_eq!(foreclosure_months(Some("NY")), 24);
        assert_eq!(foreclosure_months(Some("ny")), 24);
        assert_eq!(foreclosure_months(Some("TX")), 12);
        assert_eq!(foreclosure_months(None), 12);
    }
}
