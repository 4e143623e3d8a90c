//! Domain types for propensity-io.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::IoError;
use crate::source::parse_number;

/// The sample partition a prepared record was drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Rows with a low percentile, used to fit models.
    Train,
    /// Rows with a high percentile, held out for evaluation.
    Test,
}

impl Partition {
    /// Both partitions, training first.
    pub const ALL: [Partition; 2] = [Partition::Train, Partition::Test];

    /// Return the partition label used in exports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Test => "test",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a prepared column is typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnKind {
    /// A factor with a fixed, sorted level table.
    Categorical {
        /// Allowed levels in encoding order; the first is the baseline.
        levels: Vec<String>,
    },
    /// A finite floating-point covariate.
    Numeric,
}

/// A named, typed feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column type and level table.
    #[serde(flatten)]
    pub kind: ColumnKind,
}

impl Column {
    /// Build a categorical column from observed values; levels are sorted and deduplicated.
    #[must_use]
    pub fn categorical<I, S>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let levels: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        Self {
            name: name.to_string(),
            kind: ColumnKind::Categorical {
                levels: levels.into_iter().collect(),
            },
        }
    }

    /// Build a numeric column.
    #[must_use]
    pub fn numeric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Numeric,
        }
    }

    /// Return the level table for categorical columns.
    #[must_use]
    pub fn levels(&self) -> Option<&[String]> {
        match &self.kind {
            ColumnKind::Categorical { levels } => Some(levels),
            ColumnKind::Numeric => None,
        }
    }
}

/// Ordered feature columns plus the name of the binary response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
    response: String,
}

impl Schema {
    /// Create a schema from feature columns and a response column name.
    #[must_use]
    pub fn new(columns: Vec<Column>, response: &str) -> Self {
        Self {
            columns,
            response: response.to_string(),
        }
    }

    /// Return the feature columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Return the response column name.
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// Return the position of a feature column.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Render a cell of column `index` as text.
    #[must_use]
    pub fn render(&self, index: usize, cell: Cell) -> String {
        match (cell, self.columns[index].levels()) {
            (Cell::Level(l), Some(levels)) => levels[l].clone(),
            (Cell::Number(v), _) => v.to_string(),
            (Cell::Level(l), None) => l.to_string(),
        }
    }

    /// Map this schema onto the columns of a materialized frame.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingColumn`] when a schema column or the response
    /// is absent from `frame_columns`.
    pub fn binder(&self, frame_columns: &[String], table: &str) -> Result<RowBinder<'_>, IoError> {
        let locate = |name: &str| {
            frame_columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| IoError::MissingColumn {
                    column: name.to_string(),
                    table: table.to_string(),
                })
        };
        let positions = self
            .columns
            .iter()
            .map(|c| locate(&c.name))
            .collect::<Result<Vec<_>, _>>()?;
        let response = locate(&self.response)?;
        Ok(RowBinder {
            schema: self,
            positions,
            response,
        })
    }
}

/// One typed value of a prepared record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// Index into the column's level table.
    Level(usize),
    /// Numeric value.
    Number(f64),
}

/// A prepared record: typed feature cells aligned with a [`Schema`] plus the
/// binary response.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    cells: Vec<Cell>,
    resp: u8,
}

impl Record {
    /// Create a record. `resp` must be 0 or 1.
    #[must_use]
    pub fn new(cells: Vec<Cell>, resp: u8) -> Self {
        debug_assert!(resp <= 1, "response must be binary");
        Self { cells, resp }
    }

    /// Return the feature cells.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Return the binary response.
    #[must_use]
    pub fn resp(&self) -> u8 {
        self.resp
    }
}

/// Converts raw frame rows into [`Record`]s for one schema.
#[derive(Debug)]
pub struct RowBinder<'a> {
    schema: &'a Schema,
    positions: Vec<usize>,
    response: usize,
}

impl RowBinder<'_> {
    /// Type one raw row.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::UnknownLevel`] | a categorical value is not in the level table |
    /// | [`IoError::InvalidNumber`] | a numeric cell does not parse, or the response is not 0/1 |
    pub fn bind(&self, row: &[String], row_index: usize) -> Result<Record, IoError> {
        let mut cells = Vec::with_capacity(self.positions.len());
        for (column, &pos) in self.schema.columns.iter().zip(&self.positions) {
            let raw = &row[pos];
            let cell = match &column.kind {
                ColumnKind::Categorical { levels } => {
                    let idx = levels
                        .binary_search(raw)
                        .map_err(|_| IoError::UnknownLevel {
                            column: column.name.clone(),
                            level: raw.clone(),
                        })?;
                    Cell::Level(idx)
                }
                ColumnKind::Numeric => {
                    let value = parse_number(raw).ok_or_else(|| IoError::InvalidNumber {
                        column: column.name.clone(),
                        row_index,
                        raw: raw.clone(),
                    })?;
                    Cell::Number(value)
                }
            };
            cells.push(cell);
        }

        let raw = &row[self.response];
        let resp = match raw.as_str() {
            "0" => 0,
            "1" => 1,
            _ => {
                return Err(IoError::InvalidNumber {
                    column: self.schema.response.clone(),
                    row_index,
                    raw: raw.clone(),
                });
            }
        };
        Ok(Record::new(cells, resp))
    }
}

/// Training and testing records combined, each tagged with its partition.
///
/// Records and partitions are parallel vectors: `partitions[i]` is the
/// partition of `records[i]`. Training rows come first, each partition in
/// source order.
#[derive(Debug, Clone)]
pub struct CombinedSample {
    schema: Schema,
    records: Vec<Record>,
    partitions: Vec<Partition>,
}

impl CombinedSample {
    /// Create a combined sample from parallel records and partition tags.
    #[must_use]
    pub fn new(schema: Schema, records: Vec<Record>, partitions: Vec<Partition>) -> Self {
        debug_assert_eq!(records.len(), partitions.len());
        Self {
            schema,
            records,
            partitions,
        }
    }

    /// Return the schema shared by every record.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Return all records.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Return the partition tag of every record.
    #[must_use]
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Return the total number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Return `true` when the sample holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Return the indices of records in `partition`, in order.
    #[must_use]
    pub fn indices(&self, partition: Partition) -> Vec<usize> {
        self.partitions
            .iter()
            .enumerate()
            .filter_map(|(i, &p)| (p == partition).then_some(i))
            .collect()
    }

    /// Return the records of one partition.
    #[must_use]
    pub fn records_in(&self, partition: Partition) -> Vec<&Record> {
        self.records
            .iter()
            .zip(&self.partitions)
            .filter_map(|(r, &p)| (p == partition).then_some(r))
            .collect()
    }

    /// Return the number of records in `partition`.
    #[must_use]
    pub fn partition_len(&self, partition: Partition) -> usize {
        self.partitions.iter().filter(|&&p| p == partition).count()
    }

    /// Check that the training partition can support a model fit.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::EmptyPartition`] | no training rows |
    /// | [`IoError::DegenerateResponse`] | every training row has the same response |
    /// | [`IoError::DegenerateFactor`] | a categorical column shows fewer than two levels in training |
    pub fn check_trainable(&self) -> Result<(), IoError> {
        let train = self.records_in(Partition::Train);
        let Some(first) = train.first() else {
            return Err(IoError::EmptyPartition {
                partition: Partition::Train.to_string(),
            });
        };
        if train.iter().all(|r| r.resp == first.resp) {
            return Err(IoError::DegenerateResponse {
                column: self.schema.response.clone(),
                value: first.resp,
                n_rows: train.len(),
            });
        }

        for (idx, column) in self.schema.columns.iter().enumerate() {
            if column.levels().is_none() {
                continue;
            }
            let observed: BTreeSet<usize> = train
                .iter()
                .filter_map(|r| match r.cells[idx] {
                    Cell::Level(l) => Some(l),
                    Cell::Number(_) => None,
                })
                .collect();
            if observed.len() < 2 {
                return Err(IoError::DegenerateFactor {
                    column: column.name.clone(),
                    observed: observed.len(),
                });
            }
        }
        Ok(())
    }
}
