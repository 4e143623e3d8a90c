//! Percentile-based train/test sampling into a typed combined sample.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{Column, CombinedSample, Partition, Schema};
use crate::source::{Frame, Predicate, TableQuery};

const DEFAULT_CATEGORICAL: [&str; 8] = [
    "job",
    "marital",
    "education",
    "housing_loan",
    "contact",
    "month",
    "day_of_week",
    "prior_outcome",
];

/// Configuration for drawing the training and testing partitions.
///
/// # Defaults
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `percentile_column` | `"percentile"` |
/// | `categorical` | job, marital, education, housing_loan, contact, month, day_of_week, prior_outcome |
/// | `response` | `"resp"` |
///
/// Training rows satisfy `percentile <= train_upper`; testing rows satisfy
/// `percentile > test_lower`.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    percentile_column: String,
    train_upper: f64,
    test_lower: f64,
    categorical: Vec<String>,
    response: String,
}

impl SampleConfig {
    /// Create a sampling configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OverlappingPartitions`] unless both bounds are finite
    /// and `train_upper < test_lower`.
    pub fn new(train_upper: f64, test_lower: f64) -> Result<Self, IoError> {
        if !(train_upper.is_finite() && test_lower.is_finite() && train_upper < test_lower) {
            return Err(IoError::OverlappingPartitions {
                train_upper,
                test_lower,
            });
        }
        Ok(Self {
            percentile_column: "percentile".to_string(),
            train_upper,
            test_lower,
            categorical: DEFAULT_CATEGORICAL.iter().map(|s| s.to_string()).collect(),
            response: "resp".to_string(),
        })
    }

    /// Set the column holding each row's percentile.
    #[must_use]
    pub fn with_percentile_column(mut self, column: &str) -> Self {
        self.percentile_column = column.to_string();
        self
    }

    /// Set the columns treated as factors.
    #[must_use]
    pub fn with_categorical<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.categorical = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Set the binary response column.
    #[must_use]
    pub fn with_response(mut self, column: &str) -> Self {
        self.response = column.to_string();
        self
    }

    /// Return the percentile column name.
    #[must_use]
    pub fn percentile_column(&self) -> &str {
        &self.percentile_column
    }

    /// Return the inclusive upper percentile of the training partition.
    #[must_use]
    pub fn train_upper(&self) -> f64 {
        self.train_upper
    }

    /// Return the exclusive lower percentile of the testing partition.
    #[must_use]
    pub fn test_lower(&self) -> f64 {
        self.test_lower
    }

    /// Return the factor column names.
    #[must_use]
    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    /// Return the response column name.
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// Draw both partitions from a prepared query and type them.
    ///
    /// Factor levels are taken from the union of both partitions and sorted,
    /// so every record of the combined sample encodes against the same table.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::MissingColumn`] | percentile, response or a factor column is absent |
    /// | [`IoError::EmptyPartition`] | either partition selects no rows |
    /// | [`IoError::InvalidNumber`] | a non-factor column does not parse, or the response is not 0/1 |
    /// | other | propagated from [`TableQuery::collect`] |
    #[instrument(skip_all, fields(table = %prepared.table().name(), train_upper = self.train_upper, test_lower = self.test_lower))]
    pub fn draw(&self, prepared: &TableQuery) -> Result<CombinedSample, IoError> {
        let partition_query = |predicate: Predicate| {
            prepared
                .clone()
                .filter(predicate)
                .drop_columns(&[self.percentile_column.as_str()])
        };

        let train = partition_query(Predicate::AtMost {
            column: self.percentile_column.clone(),
            bound: self.train_upper,
        })
        .collect()?;
        let test = partition_query(Predicate::Above {
            column: self.percentile_column.clone(),
            bound: self.test_lower,
        })
        .collect()?;

        for (partition, frame) in [(Partition::Train, &train), (Partition::Test, &test)] {
            if frame.n_rows() == 0 {
                return Err(IoError::EmptyPartition {
                    partition: partition.to_string(),
                });
            }
        }

        let table = prepared.table().name();
        let schema = self.schema(&train, &test, table)?;
        let binder = schema.binder(train.columns(), table)?;

        let mut records = Vec::with_capacity(train.n_rows() + test.n_rows());
        let mut partitions = Vec::with_capacity(records.capacity());
        let mut row_index = 0usize;
        for (partition, frame) in [(Partition::Train, &train), (Partition::Test, &test)] {
            for row in frame.rows() {
                records.push(binder.bind(row, row_index)?);
                partitions.push(partition);
                row_index += 1;
            }
        }

        info!(
            n_train = train.n_rows(),
            n_test = test.n_rows(),
            n_columns = schema.columns().len(),
            "sample drawn"
        );
        Ok(CombinedSample::new(schema, records, partitions))
    }

    /// Infer the schema: factor columns get levels from both frames, every
    /// other non-response column is numeric.
    fn schema(&self, train: &Frame, test: &Frame, table: &str) -> Result<Schema, IoError> {
        let missing = |column: &str| IoError::MissingColumn {
            column: column.to_string(),
            table: table.to_string(),
        };
        if train.column_index(&self.response).is_none() {
            return Err(missing(&self.response));
        }
        if let Some(absent) = self
            .categorical
            .iter()
            .find(|c| train.column_index(c).is_none())
        {
            return Err(missing(absent));
        }

        let mut columns = Vec::new();
        for (idx, name) in train.columns().iter().enumerate() {
            if *name == self.response {
                continue;
            }
            if self.categorical.contains(name) {
                let levels: BTreeSet<&str> = train
                    .rows()
                    .iter()
                    .chain(test.rows())
                    .map(|r| r[idx].as_str())
                    .collect();
                debug!(column = %name, n_levels = levels.len(), "factor levels");
                columns.push(Column::categorical(name, levels));
            } else {
                columns.push(Column::numeric(name));
            }
        }
        Ok(Schema::new(columns, &self.response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Cell;
    use crate::prepare::{FeaturePlan, prepare};
    use crate::source::Connection;
    use std::fs;
    use tempfile::TempDir;

    const BANK: &str = "\
job,education,age,in_default,date,personal_loan,term_deposit,percentile
admin.,basic 4-year,30,no,d,no,yes,3
services,high school,41,no,d,yes,no,15
retired,illiterate,67,no,d,no,no,16
admin.,university degree,52,no,d,no,yes,75
blue-collar,high school,28,no,d,no,no,76
services,university degree,35,no,d,no,yes,100
";

    fn drawn(config: &SampleConfig) -> Result<CombinedSample, IoError> {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bank.csv"), BANK).unwrap();
        let conn = Connection::open(dir.path().to_str().unwrap()).unwrap();
        let table = conn.table("bank").unwrap();
        let query = prepare(&table, &FeaturePlan::bank_marketing()).unwrap();
        config.draw(&query)
    }

    fn config() -> SampleConfig {
        SampleConfig::new(15.0, 75.0)
            .unwrap()
            .with_categorical(&["job", "education"])
    }

    #[test]
    fn overlapping_bounds_rejected() {
        assert!(matches!(
            SampleConfig::new(75.0, 75.0),
            Err(IoError::OverlappingPartitions { .. })
        ));
        assert!(SampleConfig::new(f64::NAN, 75.0).is_err());
    }

    #[test]
    fn partitions_follow_percentile_bounds() {
        let sample = drawn(&config()).unwrap();
        assert_eq!(sample.partition_len(Partition::Train), 2);
        assert_eq!(sample.partition_len(Partition::Test), 2);
        assert_eq!(
            sample.partitions(),
            &[Partition::Train, Partition::Train, Partition::Test, Partition::Test]
        );
    }

    #[test]
    fn percentile_column_is_dropped() {
        let sample = drawn(&config()).unwrap();
        let names: Vec<&str> = sample
            .schema()
            .columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["job", "education", "age"]);
    }

    #[test]
    fn levels_span_both_partitions() {
        let sample = drawn(&config()).unwrap();
        let job = &sample.schema().columns()[0];
        assert_eq!(job.levels().unwrap(), &["admin.", "blue-collar", "services"]);
        // "blue-collar" only appears in the test partition
        assert_eq!(sample.records()[2].cells()[0], Cell::Level(1));
    }

    #[test]
    fn empty_partition_is_error() {
        let config = SampleConfig::new(1.0, 99.0).unwrap();
        let err = drawn(&config.with_categorical(&["job", "education"])).unwrap_err();
        assert!(matches!(err, IoError::EmptyPartition { ref partition } if partition == "train"));
    }

    #[test]
    fn factor_column_must_exist() {
        let err = drawn(&config().with_categorical(&["job", "month"])).unwrap_err();
        assert!(matches!(err, IoError::MissingColumn { ref column, .. } if column == "month"));
    }

    #[test]
    fn undeclared_text_column_is_invalid_number() {
        let err = drawn(&config().with_categorical(&["job"])).unwrap_err();
        assert!(matches!(err, IoError::InvalidNumber { ref column, .. } if column == "education"));
    }
}
