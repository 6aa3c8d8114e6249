//! Library-wide error taxonomy, fallback accounting, and manifest views.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors surfaced by the valuation kernel.
///
/// Every operation either returns a result or one of these tagged values;
/// `code()` gives the stable machine identifier and `Display` the human
/// message.
#[derive(Debug, Clone, PartialEq)]
pub enum ValuationError {
    /// Malformed input. Fails the whole valuation (fail-fast contract).
    InvalidInput {
        loan_id: Option<String>,
        field: &'static str,
        message: String,
    },
    /// A required model artifact file is absent.
    MissingArtifact { path: PathBuf },
    /// An artifact file exists but cannot be parsed.
    BadFormat { path: PathBuf, message: String },
    /// A named survival-curve variant is not registered.
    VariantNotFound { variant: String },
    /// A configured scenario name is absent from the catalogue.
    UnknownScenario { name: String },
    /// The caller cancelled the run; no partial aggregates are returned.
    Cancelled,
    /// The run exceeded its deadline; no partial aggregates are returned.
    Timeout,
    /// A numeric failure (negative balance drift, non-converging schedule,
    /// percentile of an empty distribution).
    Numeric { message: String },
}

impl ValuationError {
    /// Stable machine code for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::MissingArtifact { .. } => "missing_artifact",
            Self::BadFormat { .. } => "bad_format",
            Self::VariantNotFound { .. } => "variant_not_found",
            Self::UnknownScenario { .. } => "unknown_scenario",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Numeric { .. } => "numeric_error",
        }
    }
}

impl std::fmt::Display for ValuationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput {
                loan_id,
                field,
                message,
            } => match loan_id {
                Some(id) => write!(f, "invalid input on loan {id}, field {field}: {message}"),
                None => write!(f, "invalid input, field {field}: {message}"),
            },
            Self::MissingArtifact { path } => {
                write!(f, "missing model artifact: {}", path.display())
            }
            Self::BadFormat { path, message } => {
                write!(f, "malformed artifact {}: {message}", path.display())
            }
            Self::VariantNotFound { variant } => {
                write!(f, "survival-curve variant not found: {variant}")
            }
            Self::UnknownScenario { name } => write!(f, "unknown scenario: {name}"),
            Self::Cancelled => write!(f, "valuation cancelled"),
            Self::Timeout => write!(f, "valuation deadline exceeded"),
            Self::Numeric { message } => write!(f, "numeric error: {message}"),
        }
    }
}

impl std::error::Error for ValuationError {}

/// One use of a lower-tier model or a default imputation. Never an error;
/// logged, counted, and carried into the result manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackEvent {
    /// Loan the fallback applied to, empty for package-level events.
    pub loan_id: String,
    /// Component that fell back, e.g. `leaf_assigner` or `survival_curve`.
    pub component: String,
    pub detail: String,
}

/// Collects fallback events during a single valuation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackLog {
    pub events: Vec<FallbackEvent>,
}

impl FallbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, loan_id: &str, component: &str, detail: impl Into<String>) {
        let detail = detail.into();
        log::warn!("model fallback [{component}] loan={loan_id}: {detail}");
        self.events.push(FallbackEvent {
            loan_id: loan_id.to_string(),
            component: component.to_string(),
            detail,
        });
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }
}

/// Status of a single registered model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatusView {
    /// `real` for trained artifacts, `stub` for formula fallbacks.
    pub status: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, f64>>,
}

/// Read-only view of the loaded model set, embedded into results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelManifestView {
    pub version: String,
    pub curve_variant: String,
    pub models: BTreeMap<String, ModelStatusView>,
    /// Number of model fallbacks observed while producing the result.
    #[serde(default)]
    pub fallbacks: u64,
}

/// A per-loan incident that did not fail the package (numeric isolation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanIncident {
    pub loan_id: String,
    pub code: String,
    pub message: String,
}
