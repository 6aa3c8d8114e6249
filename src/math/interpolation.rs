//! Piecewise-linear interpolation over sorted pillar points.
//!
//! The treasury curves consumed by the prepayment model carry a handful of
//! pillar months; everything between them is linear and everything outside
//! them is flat.

/// Linear blend between `a` and `b` at weight `w ∈ [0, 1]`.
#[inline]
pub fn lerp(a: f64, b: f64, w: f64) -> f64 {
    a + w * (b - a)
}

/// Interpolates `points` (sorted or not) at abscissa `x` with flat
/// extrapolation beyond the endpoints. Returns `default` for an empty set.
pub fn piecewise_linear(points: &[(f64, f64)], x: f64, default: f64) -> f64 {
    if points.is_empty() {
        return default;
    }
    if points.len() == 1 {
        return points[0].1;
    }
    let mut pts: Vec<(f64, f64)> = points.to_vec();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0));

    if x <= pts[0].0 {
        return pts[0].1;
    }
    if x >= pts[pts.len() - 1].0 {
        return pts[pts.len() - 1].1;
    }
    for window in pts.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        if x <= x1 {
            if (x1 - x0).abs() <= f64::EPSILON {
                return y0;
            }
            return lerp(y0, y1, (x - x0) / (x1 - x0));
        }
    }
    pts[pts.len() - 1].1
}
