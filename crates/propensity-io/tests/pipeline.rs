//! End-to-end integration tests: CSV table -> prepare -> sample -> export -> read back.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;

use propensity_io::{
    ArtifactWriter, Coding, Connection, FeatureEncoder, FeaturePlan, Partition, SampleConfig,
    SchemaReader, prepare,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

const JOBS: [&str; 4] = ["admin.", "blue-collar", "services", "technician"];
const EDUCATION: [&str; 5] = [
    "basic 4-year",
    "basic 6-year",
    "high school",
    "illiterate",
    "university degree",
];

/// Write a synthetic bank table; row `i` gets percentile `i % 100 + 1` and
/// its index in the `age` column so partitions can be traced back.
fn write_bank(dir: &TempDir, n_rows: usize) -> HashSet<(usize, bool)> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut csv = String::from(
        "job,education,age,in_default,date,personal_loan,term_deposit,percentile\n",
    );
    let mut truth = HashSet::new();
    for i in 0..n_rows {
        let job = JOBS[rng.gen_range(0..JOBS.len())];
        let edu = EDUCATION[rng.gen_range(0..EDUCATION.len())];
        let yes = rng.gen_bool(0.1);
        let deposit = if yes { "yes" } else { "no" };
        writeln!(csv, "{job},{edu},{i},no,2008-05-05,no,{deposit},{}", i % 100 + 1).unwrap();
        truth.insert((i, yes));
    }
    fs::write(dir.path().join("bank.csv"), csv).unwrap();
    truth
}

fn config() -> SampleConfig {
    SampleConfig::new(15.0, 75.0)
        .unwrap()
        .with_categorical(&["job", "education"])
}

#[test]
fn sample_round_trip() {
    let source = TempDir::new().unwrap();
    let truth = write_bank(&source, 1000);

    let conn = Connection::open(&format!("csv://{}", source.path().display())).unwrap();
    let table = conn.table("bank").unwrap();
    let query = prepare(&table, &FeaturePlan::bank_marketing()).unwrap();
    let sample = config().draw(&query).unwrap();

    assert_eq!(sample.partition_len(Partition::Train), 150);
    assert_eq!(sample.partition_len(Partition::Test), 250);
    assert!(sample.check_trainable().is_ok());

    // resp is 1 exactly where term_deposit was "yes"
    let age = sample.schema().position("age").unwrap();
    for record in sample.records() {
        let propensity_io::Cell::Number(row) = record.cells()[age] else {
            panic!("age should be numeric");
        };
        assert!(truth.contains(&(row as usize, record.resp() == 1)));
    }

    // education was collapsed before levels were computed
    let edu = &sample.schema().columns()[sample.schema().position("education").unwrap()];
    assert_eq!(
        edu.levels().unwrap(),
        &["high school", "less than 5 years", "university degree"]
    );

    let out = TempDir::new().unwrap();
    let writer = ArtifactWriter::new(&out.path().join("api")).unwrap();
    let schema_path = writer.write_schema_sample(&sample).unwrap();
    let csv_path = writer.write_sample_csv(&sample).unwrap();

    let schema = SchemaReader::new(&schema_path).read().unwrap();
    assert_eq!(&schema, sample.schema());

    let treatment = FeatureEncoder::new(&schema, Coding::Treatment);
    assert_eq!(
        FeatureEncoder::new(sample.schema(), Coding::Treatment).feature_names(),
        treatment.feature_names()
    );

    let extract = fs::read_to_string(csv_path).unwrap();
    assert_eq!(extract.lines().count(), 1 + sample.len());
    assert!(extract.starts_with("sample,job,education,age,resp\n"));
}

#[test]
fn partitions_are_disjoint() {
    let source = TempDir::new().unwrap();
    write_bank(&source, 500);

    let conn = Connection::open(source.path().to_str().unwrap()).unwrap();
    let query = prepare(&conn.table("bank").unwrap(), &FeaturePlan::bank_marketing()).unwrap();
    let sample = config().draw(&query).unwrap();

    let age = sample.schema().position("age").unwrap();
    let rows_of = |partition| -> HashSet<u64> {
        sample
            .records_in(partition)
            .iter()
            .map(|r| match r.cells()[age] {
                propensity_io::Cell::Number(v) => v as u64,
                propensity_io::Cell::Level(_) => unreachable!(),
            })
            .collect()
    };
    let train = rows_of(Partition::Train);
    let test = rows_of(Partition::Test);
    assert!(train.is_disjoint(&test));
    assert!(train.len() + test.len() < 500);
}
