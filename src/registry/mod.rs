//! Immutable model registry.
//!
//! Loads the segmentation tree, rule table, survival-curve variant, APEX2
//! tables, and scenario catalogue from an artifact directory, then hands
//! out read-only views. A registry never mutates after construction; hot
//! reloads build a fresh registry and swap the shared handle atomically so
//! in-flight valuations keep a consistent model set.

pub mod manifest;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::core::{
    FallbackLog, LeafId, Loan, ModelManifestView, ModelStatusView, Scenario, ValuationError,
};
use crate::credit::SurvivalCurve;
use crate::prepay::{Apex2Dims, Apex2Tables, multiplier_dims};
use crate::segmentation::{RuleSet, SegmentationTree, assign_leaf};

pub use manifest::{Manifest, ManifestModel};

const TREE_PATH: &str = "segmentation/tree_structure.json";
const RULES_PATH: &str = "segmentation/leaf_rules.json";
const SCENARIOS_PATH: &str = "scenarios.json";
const DEFAULT_CURVES_PATH: &str = "survival/curves.csv";
const APEX2_FILES: [(&str, &str); 4] = [
    ("credit", "apex2/credit_rates.json"),
    ("rate_delta", "apex2/rate_delta_rates.json"),
    ("ltv", "apex2/ltv_rates.json"),
    ("loan_size", "apex2/loan_size_rates.json"),
];

/// Detail view of one segmentation leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafView {
    pub leaf_id: LeafId,
    pub path: Vec<String>,
    pub sample_count: u64,
    pub population: BTreeMap<String, u64>,
    /// Months of loaded survival history behind this leaf (0 = stub).
    pub curve_months: usize,
}

/// The loaded, immutable model set.
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
    manifest: Manifest,
    tree: Option<SegmentationTree>,
    rules: Option<RuleSet>,
    curves: BTreeMap<LeafId, SurvivalCurve>,
    curve_variant: String,
    apex2: Apex2Tables,
    apex2_loaded: bool,
    scenarios: BTreeMap<String, Scenario>,
}

impl Registry {
    /// Loads all artifacts under `root`, selecting `curve_variant` (or the
    /// manifest default). Fails with `MissingArtifact` when the manifest
    /// promises a real model whose file is absent, `BadFormat` on any
    /// unparseable file, and `VariantNotFound` for an unregistered
    /// variant name.
    pub fn load(root: &Path, curve_variant: Option<&str>) -> Result<Self, ValuationError> {
        let manifest = Manifest::from_file(&root.join("manifest.json"))?;

        let tree = load_tree(root, &manifest)?;
        let rules = load_rules(root, &manifest)?;
        let (curves, curve_variant) = load_curves(root, &manifest, curve_variant)?;
        let (apex2, apex2_loaded) = load_apex2(root, &manifest)?;
        let scenarios = load_scenarios(root)?;

        log::info!(
            "registry loaded from {}: tree={}, rules={}, curves={} leaves (variant {curve_variant}), apex2={}",
            root.display(),
            tree.is_some(),
            rules.is_some(),
            curves.len(),
            if apex2_loaded { "loaded" } else { "fallback" },
        );

        Ok(Registry {
            root: root.to_path_buf(),
            manifest,
            tree,
            rules,
            curves,
            curve_variant,
            apex2,
            apex2_loaded,
            scenarios,
        })
    }

    /// Builds a new registry on the same root with a different curve
    /// variant, for atomic swapping into a [`SharedRegistry`].
    pub fn with_curve_variant(&self, variant: &str) -> Result<Self, ValuationError> {
        Registry::load(&self.root, Some(variant))
    }

    pub fn curve_variant(&self) -> &str {
        &self.curve_variant
    }

    pub fn tree(&self) -> Option<&SegmentationTree> {
        self.tree.as_ref()
    }

    pub fn rules(&self) -> Option<&RuleSet> {
        self.rules.as_ref()
    }

    pub fn apex2_tables(&self) -> &Apex2Tables {
        &self.apex2
    }

    /// Looks up a scenario by name; configured names must exist.
    pub fn scenario(&self, name: &str) -> Result<&Scenario, ValuationError> {
        self.scenarios
            .get(name)
            .ok_or_else(|| ValuationError::UnknownScenario { name: name.into() })
    }

    pub fn scenario_names(&self) -> Vec<String> {
        self.scenarios.keys().cloned().collect()
    }

    /// Assigns a loan to a leaf through the tiered assigner.
    pub fn assign_leaf(&self, loan: &Loan, fallbacks: &mut FallbackLog) -> LeafId {
        assign_leaf(self.tree.as_ref(), self.rules.as_ref(), loan, fallbacks)
    }

    /// The survival curve for a leaf, extended to `months`.
    ///
    /// Fallback ladder: exact loaded curve, then the average of all loaded
    /// curves, then the formula stub. Every drop is recorded.
    pub fn survival_curve(
        &self,
        leaf: LeafId,
        months: usize,
        loan_id: &str,
        fallbacks: &mut FallbackLog,
    ) -> SurvivalCurve {
        if let Some(curve) = self.curves.get(&leaf) {
            return curve.extended_to(months);
        }
        if !self.curves.is_empty() {
            if let Some(avg) = SurvivalCurve::average(self.curves.values()) {
                fallbacks.record(
                    loan_id,
                    "survival_curve",
                    format!("leaf {leaf} missing from variant {}, using average curve", self.curve_variant),
                );
                return avg.extended_to(months);
            }
        }
        fallbacks.record(
            loan_id,
            "survival_curve",
            format!("no curves loaded, using formula stub for leaf {leaf}"),
        );
        SurvivalCurve::stub_for_leaf(leaf, months)
    }

    /// APEX2 band dims for a loan at a treasury yield (percent).
    pub fn apex2_dims(&self, loan: &Loan, treasury_pct: f64) -> Apex2Dims {
        multiplier_dims(&self.apex2, loan, treasury_pct)
    }

    /// Status view for the model-status operation and result manifests.
    pub fn status(&self) -> ModelManifestView {
        let mut models: BTreeMap<String, ModelStatusView> = self
            .manifest
            .models
            .iter()
            .map(|(name, m)| {
                (
                    name.clone(),
                    ModelStatusView {
                        status: m.status.clone(),
                        version: m
                            .version
                            .clone()
                            .unwrap_or_else(|| self.manifest.version.clone()),
                        metrics: m.metrics.clone(),
                    },
                )
            })
            .collect();

        let synthesize = |models: &mut BTreeMap<String, ModelStatusView>, name: &str, real: bool| {
            models.entry(name.to_string()).or_insert_with(|| ModelStatusView {
                status: if real { "real" } else { "stub" }.to_string(),
                version: self.manifest.version.clone(),
                metrics: None,
            });
        };
        synthesize(&mut models, "segmentation", self.tree.is_some());
        synthesize(&mut models, "survival", !self.curves.is_empty());
        synthesize(&mut models, "apex2", self.apex2_loaded);
        synthesize(&mut models, "scenarios", true);

        ModelManifestView {
            version: self.manifest.version.clone(),
            curve_variant: self.curve_variant.clone(),
            models,
            fallbacks: 0,
        }
    }

    /// Detail for one leaf, or `None` when the id is unknown to both the
    /// tree metadata and the curve set.
    pub fn leaf_detail(&self, leaf: LeafId) -> Option<LeafView> {
        let meta = self.tree.as_ref().and_then(|t| t.leaf(leaf));
        let curve_months = self.curves.get(&leaf).map(|c| c.len()).unwrap_or(0);
        if meta.is_none() && curve_months == 0 {
            return None;
        }
        Some(LeafView {
            leaf_id: leaf,
            path: meta.map(|m| m.path.clone()).unwrap_or_default(),
            sample_count: meta.map(|m| m.sample_count).unwrap_or(0),
            population: meta.map(|m| m.population.clone()).unwrap_or_default(),
            curve_months,
        })
    }
}

/// Atomically swappable registry handle. In-flight valuations hold their
/// own `Arc` and keep a consistent model set across a reload.
#[derive(Debug)]
pub struct SharedRegistry {
    inner: RwLock<Arc<Registry>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        SharedRegistry {
            inner: RwLock::new(Arc::new(registry)),
        }
    }

    /// The current registry. Callers clone the `Arc` for the duration of
    /// one valuation.
    pub fn get(&self) -> Arc<Registry> {
        self.inner.read().expect("registry lock poisoned").clone()
    }

    /// Swaps in a freshly-loaded registry.
    pub fn swap(&self, registry: Registry) {
        *self.inner.write().expect("registry lock poisoned") = Arc::new(registry);
    }
}

fn load_tree(root: &Path, manifest: &Manifest) -> Result<Option<SegmentationTree>, ValuationError> {
    let path = root.join(TREE_PATH);
    if !path.is_file() {
        if manifest.requires_artifact("segmentation") {
            return Err(ValuationError::MissingArtifact { path });
        }
        return Ok(None);
    }
    let text = read_artifact(&path)?;
    let tree: SegmentationTree =
        serde_json::from_str(&text).map_err(|e| ValuationError::BadFormat {
            path: path.clone(),
            message: e.to_string(),
        })?;
    tree.validate().map_err(|message| ValuationError::BadFormat {
        path: path.clone(),
        message,
    })?;
    Ok(Some(tree))
}

fn load_rules(root: &Path, manifest: &Manifest) -> Result<Option<RuleSet>, ValuationError> {
    let path = root.join(RULES_PATH);
    if !path.is_file() {
        if manifest.requires_artifact("leaf_rules") {
            return Err(ValuationError::MissingArtifact { path });
        }
        return Ok(None);
    }
    let text = read_artifact(&path)?;
    let rules: RuleSet = serde_json::from_str(&text).map_err(|e| ValuationError::BadFormat {
        path,
        message: e.to_string(),
    })?;
    Ok(Some(rules))
}

#[derive(Debug, Deserialize)]
struct CurveRow {
    leaf_id: LeafId,
    month: u32,
    survival_prob: f64,
}

fn load_curves(
    root: &Path,
    manifest: &Manifest,
    requested_variant: Option<&str>,
) -> Result<(BTreeMap<LeafId, SurvivalCurve>, String), ValuationError> {
    let (variant, rel_path) = match requested_variant {
        Some(name) => match manifest.curve_variants.get(name) {
            Some(path) => (name.to_string(), path.clone()),
            None => {
                return Err(ValuationError::VariantNotFound {
                    variant: name.to_string(),
                });
            }
        },
        None => match manifest.resolved_default_variant() {
            Some(name) => (
                name.to_string(),
                manifest
                    .curve_variants
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_CURVES_PATH.to_string()),
            ),
            None => ("default".to_string(), DEFAULT_CURVES_PATH.to_string()),
        },
    };

    let path = root.join(&rel_path);
    if !path.is_file() {
        if manifest.requires_artifact("survival") || requested_variant.is_some() {
            return Err(ValuationError::MissingArtifact { path });
        }
        return Ok((BTreeMap::new(), variant));
    }

    let mut reader = csv::Reader::from_path(&path).map_err(|e| ValuationError::BadFormat {
        path: path.clone(),
        message: e.to_string(),
    })?;
    let mut raw: BTreeMap<LeafId, Vec<(u32, f64)>> = BTreeMap::new();
    for record in reader.deserialize::<CurveRow>() {
        let row = record.map_err(|e| ValuationError::BadFormat {
            path: path.clone(),
            message: e.to_string(),
        })?;
        raw.entry(row.leaf_id).or_default().push((row.month, row.survival_prob));
    }

    let mut curves = BTreeMap::new();
    for (leaf, mut points) in raw {
        points.sort_by_key(|&(month, _)| month);
        curves.insert(
            leaf,
            SurvivalCurve::new(points.into_iter().map(|(_, p)| p).collect()),
        );
    }
    Ok((curves, variant))
}

fn load_apex2(root: &Path, manifest: &Manifest) -> Result<(Apex2Tables, bool), ValuationError> {
    let mut tables = Apex2Tables::fallback();
    let mut loaded = 0usize;
    for (dim, rel_path) in APEX2_FILES {
        let path = root.join(rel_path);
        if !path.is_file() {
            if manifest.requires_artifact("apex2") {
                return Err(ValuationError::MissingArtifact { path });
            }
            continue;
        }
        let text = read_artifact(&path)?;
        let table: BTreeMap<String, f64> =
            serde_json::from_str(&text).map_err(|e| ValuationError::BadFormat {
                path,
                message: e.to_string(),
            })?;
        match dim {
            "credit" => tables.credit = table,
            "rate_delta" => tables.rate_delta = table,
            "ltv" => tables.ltv = table,
            _ => tables.loan_size = table,
        }
        loaded += 1;
    }
    Ok((tables, loaded == APEX2_FILES.len()))
}

fn load_scenarios(root: &Path) -> Result<BTreeMap<String, Scenario>, ValuationError> {
    let path = root.join(SCENARIOS_PATH);
    if !path.is_file() {
        return Ok(builtin_scenarios());
    }
    let text = read_artifact(&path)?;
    let entries: Vec<Scenario> = serde_json::from_str(&text).map_err(|e| ValuationError::BadFormat {
        path,
        message: e.to_string(),
    })?;
    let mut scenarios = builtin_scenarios();
    for scenario in entries {
        scenarios.insert(scenario.name.clone(), scenario);
    }
    Ok(scenarios)
}

/// The canonical scenario set. Additional named entries may be layered on
/// from `scenarios.json`.
pub fn builtin_scenarios() -> BTreeMap<String, Scenario> {
    let mild = Scenario {
        name: "mild_recession".into(),
        deq_mult: 1.5,
        default_mult: 1.3,
        prepay_mult: 0.7,
        recovery_mult: 0.85,
        discount_rate: 0.10,
        treasury_curve: None,
    };
    let severe = Scenario {
        name: "severe_recession".into(),
        deq_mult: 2.5,
        default_mult: 2.0,
        prepay_mult: 0.4,
        recovery_mult: 0.65,
        discount_rate: 0.14,
        treasury_curve: None,
    };
    [Scenario::baseline(), mild, severe]
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect()
}

fn read_artifact(path: &Path) -> Result<String, ValuationError> {
    std::fs::read_to_string(path).map_err(|e| ValuationError::BadFormat {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
