//! Criterion benchmarks for forest training and scoring.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use propensity_rf::RandomForestConfig;

/// Dummy-coded rows resembling an encoded marketing table: mostly 0/1 columns
/// plus a few continuous covariates.
fn make_encoded(n_samples: usize, n_dummies: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<u8>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let mut row: Vec<f64> = (0..n_dummies)
            .map(|_| f64::from(u8::from(rng.gen_bool(0.2))))
            .collect();
        row.extend((0..4).map(|_| rng.r#gen::<f64>()));
        let signal = row[0] + row[n_dummies] - 0.6;
        labels.push(u8::from(signal + rng.gen_range(-0.5..0.5) > 0.0));
        features.push(row);
    }
    let names = (0..n_dummies + 4).map(|f| format!("f{f}")).collect();
    (features, labels, names)
}

fn bench_rf_train(c: &mut Criterion) {
    let (features, labels, names) = make_encoded(1_000, 40, 42);
    let cfg = RandomForestConfig::new(100).unwrap();
    c.bench_function("rf_train_1000x44_100trees", |b| {
        b.iter(|| cfg.fit(&features, &labels, &names).unwrap());
    });
}

fn bench_rf_vote_fraction_batch(c: &mut Criterion) {
    let (features, labels, names) = make_encoded(1_000, 40, 42);
    let forest = RandomForestConfig::new(100)
        .unwrap()
        .fit(&features, &labels, &names)
        .unwrap()
        .into_forest();
    c.bench_function("rf_vote_fraction_batch_1000x44_100trees", |b| {
        b.iter(|| forest.vote_fraction_batch(&features, 1).unwrap());
    });
}

criterion_group!(benches, bench_rf_train, bench_rf_vote_fraction_batch);
criterion_main!(benches);
