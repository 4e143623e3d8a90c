//! Evaluation of stand-in scorers on a synthetic combined sample.

use propensity_eval::{
    EvalError, Evaluator, ModelDescription, Report, Scorer, Term, TermKind, report,
};
use propensity_io::{Cell, Column, CombinedSample, Partition, Record, Schema};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Scores a record by its numeric `x` cell, optionally squashed.
struct ColumnScorer {
    name: &'static str,
    power: f64,
}

impl Scorer for ColumnScorer {
    fn name(&self) -> &str {
        self.name
    }

    fn score(&self, record: &Record) -> Result<f64, EvalError> {
        match record.cells()[0] {
            Cell::Number(x) => Ok(x.powf(self.power)),
            Cell::Level(_) => Ok(0.0),
        }
    }

    fn describe(&self) -> ModelDescription {
        ModelDescription {
            model: self.name.to_string(),
            kind: TermKind::Importances,
            terms: vec![Term {
                name: "x".to_string(),
                field: "x".to_string(),
                estimate: 1.0,
                statistic: None,
                p_value: None,
            }],
            baselines: vec![],
        }
    }
}

/// 150 training then 250 testing rows; response probability rises with `x`.
fn sample(seed: u64) -> CombinedSample {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let schema = Schema::new(
        vec![Column::numeric("x"), Column::categorical("segment", ["a", "b"])],
        "resp",
    );
    let mut records = Vec::new();
    let mut partitions = Vec::new();
    for (partition, n) in [(Partition::Train, 150), (Partition::Test, 250)] {
        for i in 0..n {
            let x: f64 = rng.r#gen();
            let resp = u8::from(rng.gen_bool(x * x));
            records.push(Record::new(vec![Cell::Number(x), Cell::Level(i % 2)], resp));
            partitions.push(partition);
        }
    }
    CombinedSample::new(schema, records, partitions)
}

const LINEAR: ColumnScorer = ColumnScorer {
    name: "linear",
    power: 1.0,
};
const SQUARED: ColumnScorer = ColumnScorer {
    name: "squared",
    power: 2.0,
};

#[test]
fn deciles_partition_each_subset() {
    let sample = sample(1);
    let eval = Evaluator::default().evaluate(&sample, &LINEAR).unwrap();

    for partition in Partition::ALL {
        let idx = sample.indices(partition);
        let n = idx.len();
        for decile in 1..=10u8 {
            let size = idx.iter().filter(|&&i| eval.deciles()[i] == decile).count();
            assert!(size == n / 10 || size == n.div_ceil(10), "{partition} {decile}: {size}");
        }
        let rows: Vec<_> = eval.lift_in(partition).collect();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows.iter().map(|r| r.count).sum::<usize>(), n);
        let top = rows[0].mean_score;
        assert!(rows[1..].iter().all(|r| r.mean_score < top));
    }
    assert!(eval.deciles().iter().all(|d| (1..=10).contains(d)));
}

#[test]
fn top_decile_lifts_response() {
    let sample = sample(2);
    let eval = Evaluator::default().evaluate(&sample, &LINEAR).unwrap();
    let test: Vec<_> = eval.lift_in(Partition::Test).collect();
    assert!(test[0].response_pct > test[9].response_pct);
    assert!((test[9].cumulative_capture_pct - 100.0).abs() < 1e-9);
}

#[test]
fn confusion_counts_cover_the_sample() {
    let sample = sample(3);
    let eval = Evaluator::default().evaluate(&sample, &LINEAR).unwrap();
    let cm = eval.confusion();
    assert_eq!(cm.total(), sample.len());
    assert_eq!(
        cm.metrics().accuracy,
        (cm.tp + cm.tn) as f64 / cm.total() as f64
    );
    let per_partition: usize = eval.by_partition().iter().map(|p| p.confusion.total()).sum();
    assert_eq!(per_partition, sample.len());
    for (&s, &c) in eval.scores().iter().zip(eval.classes()) {
        assert_eq!(c, u8::from(s >= 0.88));
    }
}

#[test]
fn raising_the_cutoff_never_adds_positives() {
    let sample = sample(4);
    let mut previous = usize::MAX;
    for cutoff in [0.0, 0.2, 0.5, 0.88, 0.95, 1.0] {
        let eval = Evaluator::new(cutoff).unwrap().evaluate(&sample, &LINEAR).unwrap();
        let positives = eval.confusion().predicted_positive();
        assert!(positives <= previous, "cutoff {cutoff}");
        previous = positives;
    }
}

#[test]
fn comparison_shares_one_cutoff() {
    let sample = sample(5);
    let evaluator = Evaluator::new(0.5).unwrap();
    let comparison = evaluator.compare(&sample, &[&LINEAR, &SQUARED]).unwrap();
    assert_eq!(comparison.cutoff(), 0.5);
    assert_eq!(comparison.models().len(), 2);

    let linear = comparison.model("linear").unwrap();
    let squared = comparison.model("squared").unwrap();
    // Same ranking, so same deciles; squaring lowers scores, so fewer positives.
    assert_eq!(linear.deciles(), squared.deciles());
    assert!(squared.confusion().predicted_positive() <= linear.confusion().predicted_positive());

    let columns = comparison.prediction_columns();
    assert_eq!(columns[1].model, "squared");
    assert_eq!(columns[1].scores.len(), sample.len());
}

#[test]
fn evaluation_is_deterministic() {
    let sample = sample(6);
    let a = Evaluator::default().compare(&sample, &[&LINEAR]).unwrap();
    let b = Evaluator::default().compare(&sample, &[&LINEAR]).unwrap();
    assert_eq!(a, b);
}

#[test]
fn invalid_configurations_are_rejected() {
    assert!(matches!(
        Evaluator::new(1.5),
        Err(EvalError::InvalidCutoff { .. })
    ));
    assert!(Evaluator::new(f64::NAN).is_err());

    let sample = sample(7);
    assert!(matches!(
        Evaluator::default().compare(&sample, &[]),
        Err(EvalError::NoModels)
    ));
    assert!(matches!(
        Evaluator::default().compare(&sample, &[&LINEAR, &LINEAR]),
        Err(EvalError::DuplicateModel { .. })
    ));

    let out_of_range = ColumnScorer {
        name: "bad",
        power: -1.0,
    };
    assert!(matches!(
        Evaluator::default().evaluate(&sample, &out_of_range),
        Err(EvalError::InvalidScore { .. })
    ));
}

#[test]
fn tiny_partition_cannot_form_deciles() {
    let schema = Schema::new(vec![Column::numeric("x")], "resp");
    let mut records = Vec::new();
    let mut partitions = Vec::new();
    for i in 0..25 {
        records.push(Record::new(vec![Cell::Number(f64::from(i) / 25.0)], u8::from(i % 3 == 0)));
        partitions.push(if i < 20 { Partition::Train } else { Partition::Test });
    }
    let sample = CombinedSample::new(schema, records, partitions);
    assert!(matches!(
        Evaluator::default().evaluate(&sample, &LINEAR),
        Err(EvalError::TooFewForDeciles {
            partition: Partition::Test,
            n_rows: 5
        })
    ));
}

#[test]
fn report_writes_charts_and_summary() {
    let sample = sample(8);
    let comparison = Evaluator::default()
        .compare(&sample, &[&LINEAR, &SQUARED])
        .unwrap();
    let report = Report::build(&comparison, &[LINEAR.describe(), SQUARED.describe()]);
    // Two importance charts and two lift charts.
    assert_eq!(report.charts().len(), 4);
    assert_eq!(report.charts()[2].series.len(), 2);
    assert_eq!(report.charts()[2].categories.len(), 10);

    let dir = tempfile::TempDir::new().unwrap();
    let paths = report.write(dir.path()).unwrap();
    assert_eq!(paths.len(), 2 * 4 + 3);
    assert!(dir.path().join("lift_linear.txt").exists());

    let text = std::fs::read_to_string(dir.path().join(report::REPORT_TEXT_FILE)).unwrap();
    assert!(text.contains("cutoff: 0.88"));
    assert!(text.contains("sensitivity"));

    let summary: serde_json::Value = serde_json::from_slice(
        &std::fs::read(dir.path().join(report::COMPARISON_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(summary["models"][0]["model"], "linear");
    assert_eq!(summary["models"][0]["lift"].as_array().unwrap().len(), 20);
}
