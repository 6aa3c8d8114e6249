//! End-to-end valuation checks against hand-computable references.

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use approx::assert_relative_eq;

use openmort::core::{BidConfig, Loan, Package, PrepaymentSource, SimulationConfig};
use openmort::engines::RunControl;
use openmort::registry::Registry;
use openmort::risk::run_bid_analysis;
use openmort::valuation::run_valuation;

fn write_stub_artifacts(dir: &Path) {
    fs::write(
        dir.join("manifest.json"),
        r#"{"version": "1.0.0", "models": {"survival": {"status": "stub"}}}"#,
    )
    .unwrap();
    // Extra scenarios used by the reference tests: a pure amortiser (no
    // exits, discount at the 6% note rate) and a no-prepay stress.
    fs::write(
        dir.join("scenarios.json"),
        r#"[
            {"name": "amortizer", "deq_mult": 0.0, "default_mult": 0.0,
             "prepay_mult": 0.0, "recovery_mult": 1.0, "discount_rate": 0.06},
            {"name": "no_prepay", "deq_mult": 1.0, "default_mult": 1.0,
             "prepay_mult": 0.0, "recovery_mult": 1.0, "discount_rate": 0.07}
        ]"#,
    )
    .unwrap();
}

fn stub_registry() -> (tempfile::TempDir, Registry) {
    let dir = tempfile::tempdir().unwrap();
    write_stub_artifacts(dir.path());
    let registry = Registry::load(dir.path(), None).unwrap();
    (dir, registry)
}

fn loan_l1() -> Loan {
    Loan {
        loan_id: "L1".into(),
        unpaid_balance: 100_000.0,
        interest_rate: 0.06,
        original_term: 360,
        remaining_term: 120,
        loan_age: 0,
        credit_score: Some(720),
        ltv: Some(0.75),
        dti: None,
        state: Some("WA".into()),
        origination_year: None,
        itin: None,
    }
}

fn loan_l2() -> Loan {
    Loan {
        loan_id: "L2".into(),
        unpaid_balance: 250_000.0,
        interest_rate: 0.072,
        original_term: 360,
        remaining_term: 312,
        loan_age: 48,
        credit_score: Some(720),
        ltv: Some(0.80),
        dti: None,
        state: Some("GA".into()),
        origination_year: None,
        itin: None,
    }
}

fn package(loans: Vec<Loan>) -> Package {
    Package {
        package_id: "PKG".into(),
        name: "reference".into(),
        purchase_price: None,
        loans,
    }
}

fn amortizer_config() -> SimulationConfig {
    SimulationConfig {
        n_draws: 1,
        scenarios: vec!["amortizer".into()],
        include_stochastic: false,
        seed: Some(1),
        servicing_bps: 0.0,
        ..SimulationConfig::default()
    }
}

#[test]
fn deterministic_amortiser_prices_at_par() {
    let (_dir, registry) = stub_registry();
    let result = run_valuation(
        &registry,
        &package(vec![loan_l1()]),
        &amortizer_config(),
        &RunControl::default(),
    )
    .unwrap();
    assert_relative_eq!(result.expected_npv, 100_000.0, epsilon = 1e-4);
    assert_eq!(result.loan_count, 1);
    assert_eq!(result.loan_results[0].monthly_cash_flows.len(), 120);
}

#[test]
fn par_price_bid_ladder_is_flat_at_zero_roe() {
    let (_dir, registry) = stub_registry();
    let loans = vec![loan_l1()];
    let result = run_valuation(
        &registry,
        &package(loans.clone()),
        &amortizer_config(),
        &RunControl::default(),
    )
    .unwrap();
    assert_relative_eq!(result.expected_npv, 100_000.0, epsilon = 1e-4);

    let config = BidConfig {
        center_price: Some(100_000.0),
        increment: 10_000.0,
        target_roe: 0.0,
    };
    let ladder = run_bid_analysis(&result.npv_distribution, &loans, &config).unwrap();
    let center = ladder
        .rows
        .iter()
        .find(|row| (row.price - 100_000.0).abs() < 1e-9)
        .expect("center rung present");
    assert_relative_eq!(center.expected_roe, 0.0, epsilon = 1e-8);
    assert_relative_eq!(center.annualized_roe, 0.0, epsilon = 1e-8);
    assert_eq!(center.prob_roe_above_target, 1.0);
}

#[test]
fn apex2_acceleration_compresses_wal_by_at_least_six_months() {
    let (_dir, registry) = stub_registry();
    let pkg = package(vec![loan_l2()]);

    let apex2 = SimulationConfig {
        n_draws: 1,
        scenarios: vec!["baseline".into()],
        include_stochastic: false,
        prepayment_source: PrepaymentSource::Apex2,
        treasury_10y: 4.5,
        ..SimulationConfig::default()
    };
    let stub_no_prepay = SimulationConfig {
        n_draws: 1,
        scenarios: vec!["no_prepay".into()],
        include_stochastic: false,
        prepayment_source: PrepaymentSource::Stub,
        ..SimulationConfig::default()
    };

    let fast = run_valuation(&registry, &pkg, &apex2, &RunControl::default()).unwrap();
    let slow = run_valuation(&registry, &pkg, &stub_no_prepay, &RunControl::default()).unwrap();
    let compression = slow.wal_years - fast.wal_years;
    assert!(
        compression >= 0.5,
        "WAL must compress by at least six months: stub {} vs apex2 {}",
        slow.wal_years,
        fast.wal_years
    );
}

#[test]
fn scenario_npvs_are_monotone_in_stress() {
    let (_dir, registry) = stub_registry();
    let pkg = package(vec![loan_l1(), loan_l2()]);
    let config = SimulationConfig {
        n_draws: 1,
        include_stochastic: false,
        ..SimulationConfig::default()
    };
    let result = run_valuation(&registry, &pkg, &config, &RunControl::default()).unwrap();
    let baseline = result.npv_by_scenario["baseline"];
    let mild = result.npv_by_scenario["mild_recession"];
    let severe = result.npv_by_scenario["severe_recession"];
    assert!(
        baseline >= mild - 1e-3 && mild >= severe - 1e-3,
        "expected {baseline} >= {mild} >= {severe}"
    );
    assert!(baseline > severe, "stress must strictly reduce NPV");
}

#[test]
fn percentiles_are_ordered_for_stochastic_runs() {
    let (_dir, registry) = stub_registry();
    let pkg = package(vec![loan_l1(), loan_l2()]);
    let config = SimulationConfig {
        n_draws: 40,
        seed: Some(11),
        ..SimulationConfig::default()
    };
    let result = run_valuation(&registry, &pkg, &config, &RunControl::default()).unwrap();
    assert_eq!(result.npv_distribution.len(), 40 * 3);
    let p = result.npv_percentiles.unwrap();
    assert!(p.p5 <= p.p25 && p.p25 <= p.p50 && p.p50 <= p.p75 && p.p75 <= p.p95);
    let roe = result.roe_percentiles.unwrap();
    assert!(roe.p5 <= roe.p95);
}

#[test]
fn bid_probability_near_half_at_mean_anchored_price() {
    let (_dir, registry) = stub_registry();
    let loans = vec![loan_l1(), loan_l2()];
    let pkg = package(loans.clone());
    let config = SimulationConfig {
        n_draws: 200,
        scenarios: vec!["baseline".into()],
        seed: Some(23),
        ..SimulationConfig::default()
    };
    let result = run_valuation(&registry, &pkg, &config, &RunControl::default()).unwrap();
    let mean = result.npv_distribution.iter().sum::<f64>()
        / result.npv_distribution.len() as f64;

    let target = 0.12;
    let bid = BidConfig {
        center_price: Some(mean / (1.0 + target)),
        increment: 1_000.0,
        target_roe: target,
    };
    let ladder = run_bid_analysis(&result.npv_distribution, &loans, &bid).unwrap();
    let center = &ladder.rows[10];
    assert!(
        (0.40..=0.60).contains(&center.prob_roe_above_target),
        "p(ROE >= target) at the mean-anchored price was {}",
        center.prob_roe_above_target
    );
}

#[test]
fn same_seed_reproduces_the_distribution_bit_for_bit() {
    let (_dir, registry) = stub_registry();
    let pkg = package(vec![loan_l1(), loan_l2()]);
    let config = SimulationConfig {
        n_draws: 30,
        seed: Some(99),
        ..SimulationConfig::default()
    };
    let a = run_valuation(&registry, &pkg, &config, &RunControl::default()).unwrap();
    let b = run_valuation(&registry, &pkg, &config, &RunControl::default()).unwrap();
    assert_eq!(a.npv_distribution, b.npv_distribution);
    assert_eq!(a.expected_npv, b.expected_npv);

    let other = SimulationConfig {
        seed: Some(100),
        ..config
    };
    let c = run_valuation(&registry, &pkg, &other, &RunControl::default()).unwrap();
    assert_ne!(a.npv_distribution, c.npv_distribution);
}

#[test]
fn leaf_assignment_is_stable_across_runs() {
    let (_dir, registry) = stub_registry();
    let pkg = package(vec![loan_l1(), loan_l2()]);
    let config = SimulationConfig {
        n_draws: 2,
        seed: Some(5),
        ..SimulationConfig::default()
    };
    let a = run_valuation(&registry, &pkg, &config, &RunControl::default()).unwrap();
    let b = run_valuation(&registry, &pkg, &config, &RunControl::default()).unwrap();
    for (x, y) in a.loan_results.iter().zip(&b.loan_results) {
        assert_eq!(x.leaf_id, y.leaf_id);
    }
}

#[test]
fn invalid_loan_fails_the_whole_package() {
    let (_dir, registry) = stub_registry();
    let mut bad = loan_l1();
    bad.unpaid_balance = -1.0;
    let pkg = package(vec![loan_l2(), bad]);
    let err = run_valuation(
        &registry,
        &pkg,
        &SimulationConfig::default(),
        &RunControl::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), "invalid_input");
}

#[test]
fn unknown_scenario_is_rejected() {
    let (_dir, registry) = stub_registry();
    let config = SimulationConfig {
        scenarios: vec!["boom_times".into()],
        ..SimulationConfig::default()
    };
    let err = run_valuation(
        &registry,
        &package(vec![loan_l1()]),
        &config,
        &RunControl::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), "unknown_scenario");
}

#[test]
fn cancellation_returns_no_partial_aggregates() {
    let (_dir, registry) = stub_registry();
    let cancel = AtomicBool::new(true);
    let control = RunControl {
        cancel: Some(&cancel),
        deadline: None,
    };
    let err = run_valuation(
        &registry,
        &package(vec![loan_l1()]),
        &SimulationConfig::default(),
        &control,
    )
    .unwrap_err();
    assert_eq!(err.code(), "cancelled");
}

#[test]
fn result_manifest_counts_fallbacks_and_names_the_variant() {
    let (_dir, registry) = stub_registry();
    let result = run_valuation(
        &registry,
        &package(vec![loan_l1()]),
        &amortizer_config(),
        &RunControl::default(),
    )
    .unwrap();
    // Stub registry: curve fallback plus missing dti/itin imputations.
    assert!(result.model_manifest.fallbacks > 0);
    assert_eq!(result.model_manifest.curve_variant, "default");
    assert_eq!(result.provenance.prepayment_source, "km_with_flat_default");
}
