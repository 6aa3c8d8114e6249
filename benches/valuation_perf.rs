use criterion::{Criterion, criterion_group, criterion_main};

use openmort::core::{Loan, Package, SimulationConfig};
use openmort::engines::RunControl;
use openmort::registry::Registry;
use openmort::valuation::run_valuation;

fn synthetic_package(n_loans: usize) -> Package {
    let loans = (0..n_loans)
        .map(|i| Loan {
            loan_id: format!("L{i:04}"),
            unpaid_balance: 80_000.0 + 3_000.0 * (i % 50) as f64,
            interest_rate: 0.055 + 0.0005 * (i % 40) as f64,
            original_term: 360,
            remaining_term: 180 + (i % 180) as u32,
            loan_age: 12 + (i % 96) as u32,
            credit_score: Some(580 + (i % 27) as u16 * 10),
            ltv: Some(0.55 + 0.01 * (i % 40) as f64),
            dti: Some(0.30 + 0.002 * (i % 20) as f64),
            state: Some(["TX", "FL", "CA", "NY", "OH"][i % 5].to_string()),
            origination_year: Some(2015 + (i % 8) as i32),
            itin: Some(i % 11 == 0),
        })
        .collect();
    Package {
        package_id: "BENCH".into(),
        name: "bench".into(),
        purchase_price: None,
        loans,
    }
}

fn bench_package_valuation(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("manifest.json"),
        r#"{"version": "1.0.0", "models": {}}"#,
    )
    .unwrap();
    let registry = Registry::load(dir.path(), None).unwrap();
    let package = synthetic_package(50);
    let config = SimulationConfig {
        n_draws: 20,
        seed: Some(42),
        ..SimulationConfig::default()
    };

    c.bench_function("valuation_50_loans_20_draws", |b| {
        b.iter(|| {
            run_valuation(&registry, &package, &config, &RunControl::default()).unwrap()
        })
    });
}

criterion_group!(benches, bench_package_valuation);
criterion_main!(benches);
