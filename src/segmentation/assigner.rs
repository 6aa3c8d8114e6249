//! Leaf assignment with tiered fallback.
//!
//! Strategy order: decision tree, then the loaded rule table, then the
//! built-in 5-bucket classifier. The first available strategy wins, every
//! drop to a lower tier is recorded, and the function is total: some leaf
//! id always comes back.

use crate::core::{FallbackLog, LeafId, Loan};
use crate::segmentation::rules::RuleSet;
use crate::segmentation::tree::SegmentationTree;

/// DTI assumed when the tape carries none.
const DEFAULT_DTI_PCT: f64 = 36.0;
/// State group assumed for unknown or missing property states.
const DEFAULT_STATE_GROUP: f64 = 3.0;

/// Pre-binned state groups used as a tree feature.
const STATE_GROUPS: [(&str, u8); 51] = [
    ("CT", 1), ("DC", 1), ("DE", 1), ("MA", 1), ("MD", 1), ("ME", 1), ("NH", 1), ("NJ", 1),
    ("NY", 1), ("PA", 1), ("RI", 1), ("VT", 1),
    ("AL", 2), ("AR", 2), ("FL", 2), ("GA", 2), ("KY", 2), ("LA", 2), ("MS", 2), ("NC", 2),
    ("SC", 2), ("TN", 2), ("VA", 2), ("WV", 2),
    ("IA", 3), ("IL", 3), ("IN", 3), ("KS", 3), ("MI", 3), ("MN", 3), ("MO", 3), ("ND", 3),
    ("NE", 3), ("OH", 3), ("OK", 3), ("SD", 3), ("WI", 3),
    ("AK", 4), ("AZ", 4), ("CA", 4), ("CO", 4), ("HI", 4), ("ID", 4), ("MT", 4), ("NM", 4),
    ("NV", 4), ("OR", 4), ("UT", 4), ("WA", 4), ("WY", 4),
    ("TX", 5),
];

/// Maps a two-letter state code to its pre-binned group.
pub fn state_group(state: &str) -> Option<u8> {
    let upper = state.to_ascii_uppercase();
    STATE_GROUPS
        .iter()
        .find(|(code, _)| *code == upper)
        .map(|&(_, group)| group)
}

/// Loan features after scale conversion and imputation, addressable by the
/// names the tree and rule artifacts use.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub credit_score: f64,
    pub ltv_pct: f64,
    pub rate_pct: f64,
    pub dti_pct: f64,
    pub loan_size: f64,
    pub original_term: f64,
    pub itin: f64,
    pub state_group: f64,
    pub origination_year: Option<f64>,
}

impl FeatureVector {
    /// Derives the feature vector, recording every imputation applied.
    pub fn from_loan(loan: &Loan, fallbacks: &mut FallbackLog) -> Self {
        let dti_pct = match loan.dti {
            Some(dti) => dti * 100.0,
            None => {
                fallbacks.record(&loan.loan_id, "imputation", "dti missing, assumed 36%");
                DEFAULT_DTI_PCT
            }
        };
        let itin = match loan.itin {
            Some(flag) => {
                if flag {
                    1.0
                } else {
                    0.0
                }
            }
            None => {
                fallbacks.record(&loan.loan_id, "imputation", "itin flag missing, assumed 0");
                0.0
            }
        };
        let state_group = match loan.state.as_deref().map(state_group) {
            Some(Some(group)) => group as f64,
            Some(None) => {
                fallbacks.record(
                    &loan.loan_id,
                    "imputation",
                    format!(
                        "unknown state {:?}, assumed group {DEFAULT_STATE_GROUP}",
                        loan.state.as_deref().unwrap_or("")
                    ),
                );
                DEFAULT_STATE_GROUP
            }
            None => {
                fallbacks.record(
                    &loan.loan_id,
                    "imputation",
                    format!("state missing, assumed group {DEFAULT_STATE_GROUP}"),
                );
                DEFAULT_STATE_GROUP
            }
        };
        FeatureVector {
            credit_score: loan.credit_score_or_sentinel() as f64,
            ltv_pct: loan.ltv_or_default() * 100.0,
            rate_pct: loan.interest_rate * 100.0,
            dti_pct,
            loan_size: loan.unpaid_balance,
            original_term: loan.original_term as f64,
            itin,
            state_group,
            origination_year: loan.origination_year.map(|y| y as f64),
        }
    }

    /// Feature lookup by artifact name. `None` for a feature the loan
    /// genuinely lacks, which fails the current tier.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "credit_score" => Some(self.credit_score),
            "ltv_pct" => Some(self.ltv_pct),
            "rate_pct" => Some(self.rate_pct),
            "dti_pct" => Some(self.dti_pct),
            "loan_size" => Some(self.loan_size),
            "original_term" => Some(self.original_term),
            "itin" => Some(self.itin),
            "state_group" => Some(self.state_group),
            "origination_year" => self.origination_year,
            _ => None,
        }
    }
}

/// Assigns a loan to a leaf. Total: always returns a valid leaf id.
pub fn assign_leaf(
    tree: Option<&SegmentationTree>,
    rules: Option<&RuleSet>,
    loan: &Loan,
    fallbacks: &mut FallbackLog,
) -> LeafId {
    let features = FeatureVector::from_loan(loan, fallbacks);

    if let Some(tree) = tree {
        if let Some(leaf) = tree.apply(&features) {
            return leaf;
        }
        fallbacks.record(
            &loan.loan_id,
            "leaf_assigner",
            "tree traversal failed, trying rule table",
        );
    }

    if let Some(rules) = rules {
        if let Some(leaf) = rules.assign(&features) {
            return leaf;
        }
        fallbacks.record(
            &loan.loan_id,
            "leaf_assigner",
            "rule table had no match, using built-in classifier",
        );
    }

    RuleSet::hardcoded()
        .assign(&features)
        .expect("built-in classifier has a catch-all")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::tree::TreeNode;

    fn sample_loan() -> Loan {
        Loan {
            loan_id: "S1".into(),
            unpaid_balance: 220_000.0,
            interest_rate: 0.0712,
            original_term: 360,
            remaining_term: 290,
            loan_age: 70,
            credit_score: Some(715),
            ltv: Some(0.78),
            dti: Some(0.41),
            state: Some("FL".into()),
            origination_year: Some(2018),
            itin: Some(false),
        }
    }

    #[test]
    fn feature_scales_are_converted() {
        let mut fallbacks = FallbackLog::new();
        let fv = FeatureVector::from_loan(&sample_loan(), &mut fallbacks);
        assert_eq!(fv.rate_pct, 7.12);
        assert_eq!(fv.ltv_pct, 78.0);
        assert_eq!(fv.dti_pct, 41.0);
        assert_eq!(fv.state_group, 2.0);
        assert_eq!(fallbacks.count(), 0);
    }

    #[test]
    fn missing_optionals_are_imputed_and_recorded() {
        let loan = Loan {
            dti: None,
            itin: None,
            state: None,
            ..sample_loan()
        };
        let mut fallbacks = FallbackLog::new();
        let fv = FeatureVector::from_loan(&loan, &mut fallbacks);
        assert_eq!(fv.dti_pct, DEFAULT_DTI_PCT);
        assert_eq!(fv.itin, 0.0);
        assert_eq!(fv.state_group, DEFAULT_STATE_GROUP);
        assert_eq!(fallbacks.count(), 3);
    }

    #[test]
    fn unknown_state_falls_to_default_group() {
        let loan = Loan {
            state: Some("ZZ".into()),
            ..sample_loan()
        };
        let mut fallbacks = FallbackLog::new();
        let fv = FeatureVector::from_loan(&loan, &mut fallbacks);
        assert_eq!(fv.state_group, DEFAULT_STATE_GROUP);
        assert_eq!(fallbacks.count(), 1);
    }

    #[test]
    fn tree_tier_wins_when_it_resolves() {
        let tree = SegmentationTree {
            feature_names: vec!["credit_score".into()],
            nodes: vec![
                TreeNode {
                    feature: Some(0),
                    threshold: Some(700.0),
                    left: Some(1),
                    right: Some(2),
                    leaf_id: None,
                },
                TreeNode {
                    feature: None,
                    threshold: None,
                    left: None,
                    right: None,
                    leaf_id: Some(9),
                },
                TreeNode {
                    feature: None,
                    threshold: None,
                    left: None,
                    right: None,
                    leaf_id: Some(3),
                },
            ],
            leaves: vec![],
        };
        let mut fallbacks = FallbackLog::new();
        let leaf = assign_leaf(Some(&tree), None, &sample_loan(), &mut fallbacks);
        assert_eq!(leaf, 3);
        assert_eq!(fallbacks.count(), 0);
    }

    #[test]
    fn tree_failure_drops_to_rules_with_record() {
        // Tree requires origination_year, which this loan lacks.
        let tree = SegmentationTree {
            feature_names: vec!["origination_year".into()],
            nodes: vec![TreeNode {
                feature: Some(0),
                threshold: Some(2015.0),
                left: Some(0),
                right: Some(0),
                leaf_id: None,
            }],
            leaves: vec![],
        };
        let loan = Loan {
            origination_year: None,
            ..sample_loan()
        };
        let mut fallbacks = FallbackLog::new();
        let leaf = assign_leaf(Some(&tree), Some(&RuleSet::hardcoded()), &loan, &mut fallbacks);
        assert_eq!(leaf, 2, "715 score at 78% LTV is Near-Prime");
        assert!(
            fallbacks
                .events
                .iter()
                .any(|e| e.component == "leaf_assigner"),
            "tier drop must be recorded"
        );
    }

    #[test]
    fn assignment_is_total_without_any_artifacts() {
        let mut fallbacks = FallbackLog::new();
        let leaf = assign_leaf(None, None, &sample_loan(), &mut fallbacks);
        assert!((1..=5).contains(&leaf));
    }

    #[test]
    fn same_loan_same_leaf() {
        let mut fallbacks = FallbackLog::new();
        let a = assign_leaf(None, Some(&RuleSet::hardcoded()), &sample_loan(), &mut fallbacks);
        let b = assign_leaf(None, Some(&RuleSet::hardcoded()), &sample_loan(), &mut fallbacks);
        assert_eq!(a, b);
    }
}
