//! Artifact manifest describing which models exist and their versions.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::ValuationError;

/// One model entry in `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestModel {
    /// `real` for trained artifacts the loader must find on disk,
    /// `stub` for formula fallbacks.
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub metrics: Option<BTreeMap<String, f64>>,
}

/// Parsed `manifest.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub models: BTreeMap<String, ManifestModel>,
    /// Survival-curve variant name → path relative to the artifact root.
    #[serde(default)]
    pub curve_variants: BTreeMap<String, String>,
    #[serde(default)]
    pub default_curve_variant: Option<String>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

impl Manifest {
    /// Reads and parses the manifest. The manifest file itself is the one
    /// unconditionally required artifact.
    pub fn from_file(path: &Path) -> Result<Self, ValuationError> {
        if !path.is_file() {
            return Err(ValuationError::MissingArtifact {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| ValuationError::BadFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ValuationError::BadFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Whether the manifest promises a trained artifact for `model`,
    /// making its file required at load time.
    pub fn requires_artifact(&self, model: &str) -> bool {
        self.models.get(model).is_some_and(|m| m.status == "real")
    }

    /// The curve variant to use when the caller names none.
    pub fn resolved_default_variant(&self) -> Option<&str> {
        self.default_curve_variant
            .as_deref()
            .or_else(|| self.curve_variants.keys().next().map(|s| s.as_str()))
    }
}
