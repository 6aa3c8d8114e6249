//! Binary segmentation tree over the loan feature vector.
//!
//! The tree arrives as a JSON artifact: a flat node array where split
//! nodes carry `(feature, threshold, left, right)` and terminal nodes
//! carry `leaf_id`, plus per-leaf metadata (decision path, sample count,
//! source-population counts).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::LeafId;
use crate::segmentation::assigner::FeatureVector;

/// One node of the serialized tree. Split nodes set `feature`,
/// `threshold`, `left`, `right`; leaves set `leaf_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub left: Option<usize>,
    #[serde(default)]
    pub right: Option<usize>,
    #[serde(default)]
    pub leaf_id: Option<LeafId>,
}

/// Metadata attached to a terminal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafMeta {
    pub leaf_id: LeafId,
    /// Human-readable predicate list from root to leaf.
    #[serde(default)]
    pub path: Vec<String>,
    /// Training-cohort size behind this leaf's survival curve.
    #[serde(default)]
    pub sample_count: u64,
    /// Source-population counts, e.g. agency vs portfolio loans.
    #[serde(default)]
    pub population: BTreeMap<String, u64>,
}

/// Serialized decision tree plus leaf metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationTree {
    pub feature_names: Vec<String>,
    pub nodes: Vec<TreeNode>,
    #[serde(default)]
    pub leaves: Vec<LeafMeta>,
}

impl SegmentationTree {
    /// Structural validation run at load time.
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node.leaf_id {
                Some(_) => {}
                None => {
                    let feature = node
                        .feature
                        .ok_or(format!("node {i} is neither split nor leaf"))?;
                    if feature >= self.feature_names.len() {
                        return Err(format!("node {i} references unknown feature {feature}"));
                    }
                    if node.threshold.is_none() {
                        return Err(format!("split node {i} has no threshold"));
                    }
                    for child in [node.left, node.right] {
                        match child {
                            Some(c) if c < self.nodes.len() => {}
                            _ => return Err(format!("split node {i} has invalid children")),
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Traverses the tree for a feature vector. `None` when a required
    /// feature is unavailable or the structure is malformed; the caller
    /// falls through to the next assignment tier.
    pub fn apply(&self, features: &FeatureVector) -> Option<LeafId> {
        let mut index = 0usize;
        // A well-formed tree terminates well before `nodes.len()` hops;
        // the bound guards against cyclic artifacts.
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(index)?;
            if let Some(leaf) = node.leaf_id {
                return Some(leaf);
            }
            let name = self.feature_names.get(node.feature?)?;
            let value = features.get(name)?;
            let threshold = node.threshold?;
            index = if value <= threshold { node.left? } else { node.right? };
        }
        None
    }

    pub fn leaf(&self, id: LeafId) -> Option<&LeafMeta> {
        self.leaves.iter().find(|l| l.leaf_id == id)
    }

    pub fn leaf_ids(&self) -> Vec<LeafId> {
        let mut ids: Vec<LeafId> = self.nodes.iter().filter_map(|n| n.leaf_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
