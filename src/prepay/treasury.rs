//! Piecewise-linear treasury curves for the rate-delta dimension.

use serde::{Deserialize, Serialize};

use crate::math::interpolation::piecewise_linear;

/// Fallback 10-year yield in percent when no curve is supplied.
pub const DEFAULT_TREASURY_PCT: f64 = 4.5;

/// Treasury yields in percent at pillar months, interpolated linearly with
/// flat extrapolation beyond the endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryCurve {
    points: Vec<(u32, f64)>,
}

impl TreasuryCurve {
    pub fn new(points: Vec<(u32, f64)>) -> Self {
        TreasuryCurve { points }
    }

    /// A curve flat at `rate_pct` for every month.
    pub fn flat(rate_pct: f64) -> Self {
        TreasuryCurve {
            points: vec![(0, rate_pct)],
        }
    }

    /// Interpolated yield in percent at the given projection month.
    pub fn rate_at(&self, month: u32) -> f64 {
        let pts: Vec<(f64, f64)> = self.points.iter().map(|&(m, r)| (m as f64, r)).collect();
        piecewise_linear(&pts, month as f64, DEFAULT_TREASURY_PCT)
    }
}
