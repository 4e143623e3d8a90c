//! Accuracy regression tests on a deterministic, noisy response dataset.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use propensity_rf::{OobMode, RandomForestConfig};

/// Rows with two informative columns, one 0/1 dummy, and five noise columns.
///
/// The response is drawn from a logistic model so the data are not separable.
fn make_response(n_samples: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<u8>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let mut row: Vec<f64> = (0..8).map(|_| rng.gen_range(-1.0..1.0)).collect();
        row[2] = f64::from(u8::from(rng.gen_bool(0.3)));
        let eta = -0.5 + 3.0 * row[0] - 2.0 * row[1] + 1.5 * row[2];
        let p = 1.0 / (1.0 + (-eta).exp());
        labels.push(u8::from(rng.gen_bool(p)));
        features.push(row);
    }
    let names = (0..8).map(|f| format!("f{f}")).collect();
    (features, labels, names)
}

#[test]
fn holdout_accuracy_beats_majority_rate() {
    let (features, labels, names) = make_response(1_200, 42);
    let (train_x, test_x) = features.split_at(800);
    let (train_y, test_y) = labels.split_at(800);

    let forest = RandomForestConfig::new(100)
        .unwrap()
        .fit(train_x, train_y, &names)
        .unwrap()
        .into_forest();
    let predicted = forest.predict_batch(test_x).unwrap();

    let correct = predicted.iter().zip(test_y).filter(|(p, y)| p == y).count();
    let accuracy = correct as f64 / test_y.len() as f64;
    let positives = test_y.iter().filter(|&&y| y == 1).count() as f64 / test_y.len() as f64;
    let majority = positives.max(1.0 - positives);
    assert!(
        accuracy > majority + 0.05,
        "accuracy {accuracy} vs majority rate {majority}"
    );
}

#[test]
fn scores_rank_responders_higher() {
    let (features, labels, names) = make_response(1_000, 7);
    let forest = RandomForestConfig::new(60)
        .unwrap()
        .fit(&features[..700], &labels[..700], &names)
        .unwrap()
        .into_forest();
    let scores = forest.vote_fraction_batch(&features[700..], 1).unwrap();

    let mean = |class: u8| {
        let picked: Vec<f64> = scores
            .iter()
            .zip(&labels[700..])
            .filter(|&(_, &y)| y == class)
            .map(|(&s, _)| s)
            .collect();
        picked.iter().sum::<f64>() / picked.len() as f64
    };
    assert!(mean(1) > mean(0) + 0.15, "{} vs {}", mean(1), mean(0));
    assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
}

#[test]
fn oob_accuracy_and_importances_are_sensible() {
    let (features, labels, names) = make_response(800, 11);
    let result = RandomForestConfig::new(100)
        .unwrap()
        .with_oob_mode(OobMode::Enabled)
        .fit(&features, &labels, &names)
        .unwrap();

    let oob = result.oob_score().unwrap();
    assert!(oob.accuracy > 0.65, "oob accuracy {}", oob.accuracy);

    let mdi = result.importances();
    assert_eq!(mdi[0].name, "f0");

    let perm = result.permutation_importances(&features, &labels, 42).unwrap();
    let top_two: Vec<&str> = perm[..2].iter().map(|p| p.name.as_str()).collect();
    assert!(top_two.contains(&"f0"), "{top_two:?}");
    assert!(top_two.contains(&"f1"), "{top_two:?}");
}

#[test]
fn thread_count_does_not_change_the_forest() {
    let (features, labels, names) = make_response(400, 3);
    let fit_with = |threads: usize| {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap();
        pool.install(|| {
            RandomForestConfig::new(16)
                .unwrap()
                .fit(&features, &labels, &names)
                .unwrap()
                .into_forest()
        })
    };
    assert_eq!(fit_with(1), fit_with(4));
}
