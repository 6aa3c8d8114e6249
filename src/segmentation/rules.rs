//! Rule-table leaf assignment.
//!
//! Each leaf carries an ordered conjunction of `(feature, operator, value)`
//! predicates; the first fully-satisfied leaf wins and an empty rule list
//! is a catch-all. This is both the second assignment tier (loaded from
//! JSON) and, through [`RuleSet::hardcoded`], the terminal tier.

use serde::{Deserialize, Serialize};

use crate::core::LeafId;
use crate::segmentation::assigner::FeatureVector;

/// Comparison operator in a rule predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOp {
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl RuleOp {
    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Ge => lhs >= rhs,
            Self::Gt => lhs > rhs,
            Self::Le => lhs <= rhs,
            Self::Lt => lhs < rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }
}

/// A single `(feature, operator, value)` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub feature: String,
    pub operator: RuleOp,
    pub value: f64,
}

/// One leaf with its conjunction of predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafRule {
    pub leaf_id: LeafId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub rules: Vec<Predicate>,
}

/// Ordered rule table; first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub leaves: Vec<LeafRule>,
}

impl RuleSet {
    /// Matches a feature vector against the table. `None` only when the
    /// table is empty or carries no catch-all and nothing matches.
    pub fn assign(&self, features: &FeatureVector) -> Option<LeafId> {
        for leaf in &self.leaves {
            if leaf.rules.is_empty() {
                return Some(leaf.leaf_id);
            }
            let all_hold = leaf.rules.iter().all(|p| {
                features
                    .get(&p.feature)
                    .is_some_and(|v| p.operator.holds(v, p.value))
            });
            if all_hold {
                return Some(leaf.leaf_id);
            }
        }
        None
    }

    /// The built-in 5-bucket credit-score × LTV classifier. Total over any
    /// feature vector thanks to the trailing catch-all.
    pub fn hardcoded() -> Self {
        let band = |leaf_id: LeafId, label: &str, score: f64, ltv_pct: f64| LeafRule {
            leaf_id,
            label: label.to_string(),
            rules: vec![
                Predicate {
                    feature: "credit_score".into(),
                    operator: RuleOp::Ge,
                    value: score,
                },
                Predicate {
                    feature: "ltv_pct".into(),
                    operator: RuleOp::Lt,
                    value: ltv_pct,
                },
            ],
        };
        RuleSet {
            leaves: vec![
                band(1, "Prime", 740.0, 70.0),
                band(2, "Near-Prime", 700.0, 80.0),
                band(3, "Non-Prime", 660.0, 90.0),
                band(4, "Sub-Prime", 600.0, 100.0),
                LeafRule {
                    leaf_id: 5,
                    label: "Deep Sub-Prime".into(),
                    rules: vec![],
                },
            ],
        }
    }
}
