//! Credit-risk primitives: survival curves, hazard decomposition, and the
//! per-leaf stub parameter set.

pub mod hazard;
pub mod stubs;
pub mod survival;

pub use hazard::{MonthlyTransition, build_transitions, monthly_cdr};
pub use survival::SurvivalCurve;
