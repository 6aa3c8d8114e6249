//! Monthly survival curves per segmentation leaf.
//!
//! A curve holds `S[1..=n]` on a monthly grid with `S[0] = 1` implied.
//! Curves are sanitised on construction (clamped to `[0, 1]`, forced
//! non-increasing) and can be tail-extended by continuing the last
//! observed decay ratio.

use serde::{Deserialize, Serialize};

use crate::core::LeafId;

/// Annual all-causes hazard per leaf used by the formula stub.
const STUB_ANNUAL_HAZARDS: [f64; 5] = [0.005, 0.010, 0.020, 0.040, 0.070];
const STUB_DEFAULT_HAZARD: f64 = 0.020;

/// Kaplan–Meier style survival curve on a monthly grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalCurve {
    probs: Vec<f64>,
}

impl SurvivalCurve {
    /// Canonical curve horizon in months.
    pub const HORIZON_MONTHS: usize = 360;

    /// Builds a curve from raw monthly probabilities, clamping each point
    /// to `[0, 1]` and forcing the sequence non-increasing.
    pub fn new(raw: Vec<f64>) -> Self {
        let mut probs = Vec::with_capacity(raw.len());
        let mut prev = 1.0_f64;
        for p in raw {
            let clamped = if p.is_finite() { p.clamp(0.0, 1.0).min(prev) } else { prev };
            probs.push(clamped);
            prev = clamped;
        }
        SurvivalCurve { probs }
    }

    /// A curve flat at 1.0 (no exits) over `n` months.
    pub fn flat(n: usize) -> Self {
        SurvivalCurve { probs: vec![1.0; n] }
    }

    /// Formula stub `S(t) = exp(−λ·t/12)` with the per-leaf annual hazard.
    pub fn stub_for_leaf(leaf: LeafId, n: usize) -> Self {
        let annual = STUB_ANNUAL_HAZARDS
            .get(leaf.saturating_sub(1) as usize)
            .copied()
            .unwrap_or(STUB_DEFAULT_HAZARD);
        let monthly = annual / 12.0;
        SurvivalCurve {
            probs: (1..=n).map(|m| (-monthly * m as f64).exp()).collect(),
        }
    }

    /// Point-wise average of several curves, trimmed to the shortest.
    pub fn average<'a>(curves: impl IntoIterator<Item = &'a SurvivalCurve>) -> Option<Self> {
        let curves: Vec<&SurvivalCurve> = curves.into_iter().collect();
        if curves.is_empty() {
            return None;
        }
        let len = curves.iter().map(|c| c.len()).min().unwrap_or(0);
        if len == 0 {
            return None;
        }
        let n = curves.len() as f64;
        let probs = (0..len)
            .map(|i| curves.iter().map(|c| c.probs[i]).sum::<f64>() / n)
            .collect();
        Some(SurvivalCurve::new(probs))
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// Survival probability at month `t` (`t = 0` returns 1.0). Months past
    /// the stored horizon continue the tail decay ratio.
    pub fn survival(&self, month: usize) -> f64 {
        if month == 0 || self.probs.is_empty() {
            return 1.0;
        }
        if month <= self.probs.len() {
            return self.probs[month - 1];
        }
        let last = self.probs[self.probs.len() - 1];
        let ratio = self.tail_ratio();
        (last * ratio.powi((month - self.probs.len()) as i32)).max(0.0)
    }

    /// Discrete hazard `h[t] = 1 − S[t]/S[t−1]`, zero once the curve hits
    /// zero.
    pub fn hazard(&self, month: usize) -> f64 {
        if month == 0 {
            return 0.0;
        }
        let prev = self.survival(month - 1);
        if prev <= 0.0 {
            return 0.0;
        }
        (1.0 - self.survival(month) / prev).clamp(0.0, 1.0)
    }

    /// A copy extended to at least `n` months by continuing the tail decay.
    pub fn extended_to(&self, n: usize) -> Self {
        if self.probs.len() >= n {
            return self.clone();
        }
        let mut probs = self.probs.clone();
        if probs.is_empty() {
            return SurvivalCurve::flat(n);
        }
        let ratio = self.tail_ratio();
        while probs.len() < n {
            let next = (probs[probs.len() - 1] * ratio).max(0.0);
            probs.push(next);
        }
        SurvivalCurve { probs }
    }

    fn tail_ratio(&self) -> f64 {
        if self.probs.len() < 2 {
            return 0.999;
        }
        let last = self.probs[self.probs.len() - 1];
        let prev = self.probs[self.probs.len() - 2];
        if prev > 0.0 { (last / prev).clamp(0.0, 1.0) } else { 0.999 }
    }
}
