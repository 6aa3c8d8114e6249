//! Common domain types, result payloads, and the library-wide error taxonomy.

pub mod engine;
pub mod results;
pub mod types;

pub use engine::{
    FallbackEvent, FallbackLog, LoanIncident, ModelManifestView, ModelStatusView, ValuationError,
};
pub use results::{
    BidLadder, BidRow, CalibrationMetrics, LoanValuationResult, ModelProvenance, MonthlyCashFlow,
    PackageValuationResult, Percentiles,
};
pub use types::{
    BidConfig, LeafId, Loan, NO_SCORE_SENTINEL, Package, PrepaymentSource, Scenario,
    SimulationConfig,
};
