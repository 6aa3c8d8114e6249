//! Loan segmentation: decision tree, rule table, and the tiered assigner.

pub mod assigner;
pub mod rules;
pub mod tree;

pub use assigner::{FeatureVector, assign_leaf, state_group};
pub use rules::{LeafRule, Predicate, RuleOp, RuleSet};
pub use tree::{LeafMeta, SegmentationTree, TreeNode};
