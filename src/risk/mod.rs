//! Distribution statistics and bid-ladder analytics.

pub mod bid;
pub mod stats;

pub use bid::{annualize, run_bid_analysis};
pub use stats::{five_point, mean, percentile};
