//! OpenMort is a valuation kernel for packages of seasoned residential
//! mortgage loans: it projects each loan's cash flows under a monthly
//! state model driven by per-leaf survival hazards, repeats the
//! projection under correlated stochastic shocks, and aggregates to
//! package-level NPV and ROE distributions with bid-ladder analytics.
//!
//! The pipeline runs leaves-first:
//! - [`registry`] loads immutable model artifacts (segmentation tree,
//!   survival-curve variants, APEX2 tables, scenario catalogue),
//! - [`segmentation`] maps each loan to a survival-curve leaf through a
//!   tiered fallback assigner,
//! - [`credit`] decomposes the leaf's all-causes hazard into default and
//!   prepayment under a selected mode,
//! - [`engines`] projects monthly cash flows and fans out Monte Carlo
//!   draws,
//! - [`valuation`] and [`risk`] shape results, percentiles, ROE, and the
//!   bid ladder.
//!
//! Numerical considerations: all projection math is `f64`, amortisation
//! guards its zero-rate and zero-payment corner cases, and every
//! `(scenario, draw, loan)` tuple owns a seed-derived RNG stream so runs
//! are bit-reproducible for a fixed seed, parallel or not.
//!
//! # Quick Start
//! Scheduled payment of a level-payment mortgage:
//! ```rust
//! use openmort::math::monthly_payment;
//!
//! let pmt = monthly_payment(100_000.0, 0.06, 120);
//! assert!(pmt > 1_110.0 && pmt < 1_111.0);
//! ```
//!
//! APEX2 multiplier for a loan profile:
//! ```rust
//! use openmort::prepay::{Apex2Tables, multiplier_dims};
//! use openmort::core::Loan;
//!
//! let loan = Loan {
//!     loan_id: "L1".into(),
//!     unpaid_balance: 250_000.0,
//!     interest_rate: 0.072,
//!     original_term: 360,
//!     remaining_term: 312,
//!     loan_age: 48,
//!     credit_score: Some(720),
//!     ltv: Some(0.80),
//!     dti: None,
//!     state: None,
//!     origination_year: None,
//!     itin: None,
//! };
//! let dims = multiplier_dims(&Apex2Tables::fallback(), &loan, 4.5);
//! assert!(dims.average() > 1.0);
//! ```
//!
//! Bid ladder over a fixed NPV distribution:
//! ```rust
//! use openmort::core::{BidConfig, Loan};
//! use openmort::risk::run_bid_analysis;
//!
//! let loan = Loan {
//!     loan_id: "L1".into(),
//!     unpaid_balance: 1_000_000.0,
//!     interest_rate: 0.065,
//!     original_term: 360,
//!     remaining_term: 240,
//!     loan_age: 120,
//!     credit_score: Some(700),
//!     ltv: Some(0.8),
//!     dti: None,
//!     state: None,
//!     origination_year: None,
//!     itin: None,
//! };
//! let npvs = vec![930_000.0; 50];
//! let ladder = run_bid_analysis(&npvs, &[loan], &BidConfig::default()).unwrap();
//! assert_eq!(ladder.rows.len(), 21);
//! ```
//!
//! # Feature Flags
//! - `parallel`: dispatches Monte Carlo draws onto a Rayon pool
//!   (default). The sequential path produces bit-identical results.

pub mod config;
pub mod core;
pub mod credit;
pub mod engines;
pub mod math;
pub mod prepay;
pub mod registry;
pub mod risk;
pub mod segmentation;
pub mod valuation;

/// Common imports for ergonomic usage.
pub mod prelude {
    pub use crate::config::KernelSettings;
    pub use crate::core::{
        BidConfig, BidLadder, Loan, Package, PackageValuationResult, PrepaymentSource, Scenario,
        SimulationConfig, ValuationError,
    };
    pub use crate::engines::RunControl;
    pub use crate::registry::{Registry, SharedRegistry};
    pub use crate::risk::run_bid_analysis;
    pub use crate::valuation::run_valuation;
}
