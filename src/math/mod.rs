//! Numerical helpers shared across the valuation kernel.

pub mod amortize;
pub mod interpolation;

pub use amortize::{effective_life_months, monthly_payment, monthly_rate_from_annual};
pub use interpolation::lerp;
