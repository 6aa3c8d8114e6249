//! Monte Carlo driver: repeats the projector across scenarios and draws.
//!
//! Draws are embarrassingly parallel and fan out over a rayon pool when
//! the `parallel` feature is on; the sequential path produces bit-identical
//! results because every `(scenario, draw)` task derives its own RNG
//! streams from the base seed rather than sharing state. Macro shocks are
//! drawn once per `(scenario, draw)` so they stay consistent across loans.
//!
//! Cancellation is cooperative at draw granularity: each task checks the
//! shared flag (and the deadline) before starting, in-flight draws run to
//! completion, and a tripped run returns `Cancelled`/`Timeout` with no
//! partial aggregates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::Rng;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::{LeafId, Loan, SimulationConfig, ValuationError};
use crate::credit::MonthlyTransition;
use crate::engines::projector::{ProjectionParams, project};
use crate::engines::shocks::{ShockParams, loan_shock_path, macro_factors};

/// Caller-supplied run controls.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunControl<'a> {
    /// Cooperative cancellation flag, checked between draws.
    pub cancel: Option<&'a AtomicBool>,
    /// Hard deadline for the whole valuation.
    pub deadline: Option<Instant>,
}

impl RunControl<'_> {
    pub fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn timed_out(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn check(&self) -> Result<(), ValuationError> {
        if self.cancelled() {
            return Err(ValuationError::Cancelled);
        }
        if self.timed_out() {
            return Err(ValuationError::Timeout);
        }
        Ok(())
    }
}

/// Everything the driver needs for one loan, prebuilt outside the draw
/// loop: transitions and discount parameters per enabled scenario.
#[derive(Debug, Clone)]
pub struct LoanPlan {
    pub loan: Loan,
    pub leaf: LeafId,
    /// One transition schedule per enabled scenario, in config order.
    pub transitions: Vec<Vec<MonthlyTransition>>,
    /// Discounting parameters per enabled scenario, in config order.
    pub params: Vec<ProjectionParams>,
}

/// Raw per-draw present values before shaping.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawMatrix {
    pub n_scenarios: usize,
    pub n_draws: u32,
    /// Package NPV per `(scenario, draw)`, scenario-major:
    /// index `s * n_draws + k`.
    pub package_npvs: Vec<f64>,
    /// Loan PVs in the same scenario-major layout, one row per plan.
    pub loan_pvs: Vec<Vec<f64>>,
}

impl DrawMatrix {
    /// Mean package NPV for one scenario.
    pub fn scenario_mean(&self, scenario_idx: usize) -> f64 {
        let n = self.n_draws as usize;
        let slice = &self.package_npvs[scenario_idx * n..(scenario_idx + 1) * n];
        slice.iter().sum::<f64>() / n as f64
    }

    /// Mean PV of one loan under one scenario.
    pub fn loan_scenario_mean(&self, loan_idx: usize, scenario_idx: usize) -> f64 {
        let n = self.n_draws as usize;
        let slice = &self.loan_pvs[loan_idx][scenario_idx * n..(scenario_idx + 1) * n];
        slice.iter().sum::<f64>() / n as f64
    }
}

/// Runs every `(scenario, draw)` pair and assembles the PV matrix.
pub fn run_draws(
    plans: &[LoanPlan],
    n_scenarios: usize,
    config: &SimulationConfig,
    control: &RunControl,
) -> Result<DrawMatrix, ValuationError> {
    let n_draws = config.effective_draws();
    let stochastic = config.include_stochastic;
    let base_seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let shock_params = ShockParams {
        sigma: config.shock_sigma,
        rho: config.shock_rho,
    };
    let max_months = plans
        .iter()
        .map(|p| p.loan.remaining_term)
        .max()
        .unwrap_or(0) as usize;

    let tasks: Vec<(usize, u32)> = (0..n_scenarios)
        .flat_map(|s| (0..n_draws).map(move |k| (s, k)))
        .collect();

    let run_one = |&(s, k): &(usize, u32)| -> Result<Vec<f64>, ValuationError> {
        control.check()?;
        let macro_z = stochastic.then(|| macro_factors(base_seed, s, k, max_months));
        let mut pvs = Vec::with_capacity(plans.len());
        for (i, plan) in plans.iter().enumerate() {
            let months = plan.loan.remaining_term as usize;
            let shocks = macro_z.as_ref().map(|z| {
                loan_shock_path(base_seed, s, k, i, &z[..months], shock_params)
            });
            let projection = project(
                &plan.loan,
                &plan.transitions[s],
                plan.params[s],
                shocks.as_ref(),
            )?;
            pvs.push(projection.present_value);
        }
        Ok(pvs)
    };

    #[cfg(feature = "parallel")]
    let per_task: Result<Vec<Vec<f64>>, ValuationError> = tasks.par_iter().map(run_one).collect();
    #[cfg(not(feature = "parallel"))]
    let per_task: Result<Vec<Vec<f64>>, ValuationError> = tasks.iter().map(run_one).collect();
    let per_task = per_task?;

    let total = n_scenarios * n_draws as usize;
    let mut package_npvs = vec![0.0; total];
    let mut loan_pvs = vec![vec![0.0; total]; plans.len()];
    for (slot, pvs) in per_task.into_iter().enumerate() {
        package_npvs[slot] = pvs.iter().sum();
        for (loan_idx, pv) in pvs.into_iter().enumerate() {
            loan_pvs[loan_idx][slot] = pv;
        }
    }

    Ok(DrawMatrix {
        n_scenarios,
        n_draws,
        package_npvs,
        loan_pvs,
    })
}
