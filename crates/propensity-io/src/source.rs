//! Table data source: connection, table handles, and lazy queries.
//!
//! A data source is a directory of delimited tables, one `<table>.csv` per
//! table. Queries are plans: nothing is read until [`TableQuery::collect`],
//! and filters run row-by-row while streaming so rejected rows are never
//! materialized.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;

const SCHEME: &str = "csv://";

/// An open connection to a table data source.
///
/// Holds the resolved root directory for the lifetime of the run; dropping
/// the value releases it.
#[derive(Debug)]
pub struct Connection {
    uri: String,
    root: PathBuf,
}

impl Connection {
    /// Open a data source from a connection string.
    ///
    /// Accepts `csv://<dir>` or a bare directory path.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::UnsupportedScheme`] | `uri` uses a scheme other than `csv://` |
    /// | [`IoError::Connection`] | the directory is missing or unreadable |
    #[instrument(fields(uri = %uri))]
    pub fn open(uri: &str) -> Result<Self, IoError> {
        let root = match uri.strip_prefix(SCHEME) {
            Some(rest) => PathBuf::from(rest),
            None if uri.contains("://") => {
                return Err(IoError::UnsupportedScheme {
                    uri: uri.to_string(),
                });
            }
            None => PathBuf::from(uri),
        };

        let meta = fs::metadata(&root).map_err(|e| IoError::Connection {
            uri: uri.to_string(),
            source: e,
        })?;
        if !meta.is_dir() {
            return Err(IoError::Connection {
                uri: uri.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    "data source root is not a directory",
                ),
            });
        }
        // Check readability now so an unusable source fails before any work.
        fs::read_dir(&root).map_err(|e| IoError::Connection {
            uri: uri.to_string(),
            source: e,
        })?;

        info!(root = %root.display(), "data source connected");
        Ok(Self {
            uri: uri.to_string(),
            root,
        })
    }

    /// Return the connection string this connection was opened with.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Open a handle to a table, reading only its header.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::TableNotFound`] | `<root>/<name>.csv` cannot be opened |
    /// | [`IoError::CsvParse`] | the header row is malformed |
    #[instrument(skip(self))]
    pub fn table(&self, name: &str) -> Result<TableHandle, IoError> {
        let path = self.root.join(format!("{name}.csv"));
        let file = fs::File::open(&path).map_err(|e| IoError::TableNotFound {
            table: name.to_string(),
            path: path.clone(),
            source: e,
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let header = rdr.headers().map_err(|e| IoError::CsvParse {
            path: path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        })?;
        let columns: Vec<String> = header.iter().map(String::from).collect();
        debug!(n_columns = columns.len(), "table header read");

        Ok(TableHandle {
            name: name.to_string(),
            path,
            columns,
        })
    }
}

/// A handle to one table of a data source.
#[derive(Debug, Clone)]
pub struct TableHandle {
    name: String,
    path: PathBuf,
    columns: Vec<String>,
}

impl TableHandle {
    /// Return the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the file backing this table.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the header column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Start a lazy query over this table.
    #[must_use]
    pub fn query(&self) -> TableQuery {
        TableQuery {
            table: self.clone(),
            steps: Vec::new(),
        }
    }
}

/// A row filter on a numeric column.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Keep rows where `column <= bound`.
    AtMost {
        /// Column to compare.
        column: String,
        /// Inclusive upper bound.
        bound: f64,
    },
    /// Keep rows where `column > bound`.
    Above {
        /// Column to compare.
        column: String,
        /// Exclusive lower bound.
        bound: f64,
    },
}

impl Predicate {
    fn column(&self) -> &str {
        match self {
            Predicate::AtMost { column, .. } | Predicate::Above { column, .. } => column,
        }
    }

    fn keeps(&self, value: f64) -> bool {
        match self {
            Predicate::AtMost { bound, .. } => value <= *bound,
            Predicate::Above { bound, .. } => value > *bound,
        }
    }
}

#[derive(Debug, Clone)]
enum Step {
    Filter(Predicate),
    Recode {
        column: String,
        from: Vec<String>,
        to: String,
    },
    Indicator {
        source: String,
        target: String,
        positive: String,
    },
    Drop(Vec<String>),
}

/// A lazily evaluated, composable query over a table.
///
/// Steps apply in the order they were added.
#[derive(Debug, Clone)]
pub struct TableQuery {
    table: TableHandle,
    steps: Vec<Step>,
}

/// A step resolved against concrete column positions.
enum Op {
    Filter {
        index: usize,
        column: String,
        predicate: Predicate,
    },
    Recode {
        index: usize,
        from: Vec<String>,
        to: String,
    },
    Indicator {
        index: usize,
        positive: String,
    },
    Keep(Vec<bool>),
}

impl TableQuery {
    /// Keep only rows matching `predicate`.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.steps.push(Step::Filter(predicate));
        self
    }

    /// Replace any value of `column` found in `from` with `to`.
    #[must_use]
    pub fn recode<S: AsRef<str>>(mut self, column: &str, from: &[S], to: &str) -> Self {
        self.steps.push(Step::Recode {
            column: column.to_string(),
            from: from.iter().map(|s| s.as_ref().to_string()).collect(),
            to: to.to_string(),
        });
        self
    }

    /// Append `target` = 1 where `source == positive`, else 0.
    #[must_use]
    pub fn indicator(mut self, source: &str, target: &str, positive: &str) -> Self {
        self.steps.push(Step::Indicator {
            source: source.to_string(),
            target: target.to_string(),
            positive: positive.to_string(),
        });
        self
    }

    /// Remove columns.
    #[must_use]
    pub fn drop_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.steps.push(Step::Drop(
            columns.iter().map(|c| c.as_ref().to_string()).collect(),
        ));
        self
    }

    /// Return the table this query reads from.
    #[must_use]
    pub fn table(&self) -> &TableHandle {
        &self.table
    }

    /// Resolve the plan and return the output column names without reading rows.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingColumn`] or [`IoError::DuplicateColumn`] when
    /// a step references a column that is not present at that point.
    pub fn columns(&self) -> Result<Vec<String>, IoError> {
        self.compile().map(|(_, columns)| columns)
    }

    fn compile(&self) -> Result<(Vec<Op>, Vec<String>), IoError> {
        let mut columns = self.table.columns.clone();
        let mut ops = Vec::with_capacity(self.steps.len());

        let position = |columns: &[String], name: &str| -> Result<usize, IoError> {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| IoError::MissingColumn {
                    column: name.to_string(),
                    table: self.table.name.clone(),
                })
        };

        for step in &self.steps {
            match step {
                Step::Filter(predicate) => {
                    let index = position(&columns, predicate.column())?;
                    ops.push(Op::Filter {
                        index,
                        column: predicate.column().to_string(),
                        predicate: predicate.clone(),
                    });
                }
                Step::Recode { column, from, to } => {
                    let index = position(&columns, column)?;
                    ops.push(Op::Recode {
                        index,
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
                Step::Indicator {
                    source,
                    target,
                    positive,
                } => {
                    let index = position(&columns, source)?;
                    if columns.iter().any(|c| c == target) {
                        return Err(IoError::DuplicateColumn {
                            column: target.clone(),
                            table: self.table.name.clone(),
                        });
                    }
                    columns.push(target.clone());
                    ops.push(Op::Indicator {
                        index,
                        positive: positive.clone(),
                    });
                }
                Step::Drop(names) => {
                    let mut keep = vec![true; columns.len()];
                    for name in names {
                        keep[position(&columns, name)?] = false;
                    }
                    let mut flags = keep.iter();
                    columns.retain(|_| flags.next().copied().unwrap_or(true));
                    ops.push(Op::Keep(keep));
                }
            }
        }

        Ok((ops, columns))
    }

    /// Execute the plan and materialize the surviving rows.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::MissingColumn`] | a step references an absent column |
    /// | [`IoError::DuplicateColumn`] | an indicator target already exists |
    /// | [`IoError::TableNotFound`] | the table file disappeared since the handle was opened |
    /// | [`IoError::CsvParse`] | malformed CSV record |
    /// | [`IoError::InconsistentRowLength`] | row width differs from the header |
    /// | [`IoError::InvalidNumber`] | a filtered column holds a non-numeric value |
    #[instrument(skip(self), fields(table = %self.table.name, n_steps = self.steps.len()))]
    pub fn collect(&self) -> Result<Frame, IoError> {
        let (ops, columns) = self.compile()?;
        let path = &self.table.path;

        let file = fs::File::open(path).map_err(|e| IoError::TableNotFound {
            table: self.table.name.clone(),
            path: path.clone(),
            source: e,
        })?;
        // flexible(true) so our InconsistentRowLength check fires instead of a
        // low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let expected = self.table.columns.len();
        let mut rows = Vec::new();
        let mut scanned = 0usize;

        'rows: for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| IoError::CsvParse {
                path: path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?;
            scanned += 1;
            if record.len() != expected {
                return Err(IoError::InconsistentRowLength {
                    path: path.clone(),
                    row_index,
                    expected,
                    got: record.len(),
                });
            }

            let mut row: Vec<String> = record.iter().map(String::from).collect();
            for op in &ops {
                match op {
                    Op::Filter {
                        index,
                        column,
                        predicate,
                    } => {
                        let raw = &row[*index];
                        let value = parse_number(raw).ok_or_else(|| IoError::InvalidNumber {
                            column: column.clone(),
                            row_index,
                            raw: raw.clone(),
                        })?;
                        if !predicate.keeps(value) {
                            continue 'rows;
                        }
                    }
                    Op::Recode { index, from, to } => {
                        if from.iter().any(|f| *f == row[*index]) {
                            row[*index] = to.clone();
                        }
                    }
                    Op::Indicator { index, positive } => {
                        let flag = if row[*index] == *positive { "1" } else { "0" };
                        row.push(flag.to_string());
                    }
                    Op::Keep(keep) => {
                        let mut flags = keep.iter();
                        row.retain(|_| flags.next().copied().unwrap_or(true));
                    }
                }
            }
            rows.push(row);
        }

        info!(scanned, kept = rows.len(), "query collected");
        Ok(Frame { columns, rows })
    }
}

/// Parse a cell as a finite number.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Materialized query output: string cells in row-major order.
#[derive(Debug, Clone)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Frame {
    /// Return the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Return the rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Return the position of a column, if present.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_with(table: &str, content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(format!("{table}.csv")), content).unwrap();
        dir
    }

    const PEOPLE: &str = "name,score,grade\nann,10,a\nbob,55,b\ncid,80,c\ndee,95,a\n";

    #[test]
    fn open_accepts_scheme_and_bare_path() {
        let dir = source_with("people", PEOPLE);
        let uri = format!("csv://{}", dir.path().display());
        assert!(Connection::open(&uri).is_ok());
        assert!(Connection::open(dir.path().to_str().unwrap()).is_ok());
    }

    #[test]
    fn open_missing_directory_is_connection_error() {
        let err = Connection::open("/nonexistent/propensity/source").unwrap_err();
        assert!(matches!(err, IoError::Connection { .. }));
    }

    #[test]
    fn open_rejects_other_schemes() {
        let err = Connection::open("postgres://localhost/bank").unwrap_err();
        assert!(matches!(err, IoError::UnsupportedScheme { .. }));
    }

    #[test]
    fn missing_table_is_reported() {
        let dir = source_with("people", PEOPLE);
        let conn = Connection::open(dir.path().to_str().unwrap()).unwrap();
        let err = conn.table("bank").unwrap_err();
        assert!(matches!(err, IoError::TableNotFound { .. }));
    }

    #[test]
    fn filter_recode_indicator_drop() {
        let dir = source_with("people", PEOPLE);
        let conn = Connection::open(dir.path().to_str().unwrap()).unwrap();
        let frame = conn
            .table("people")
            .unwrap()
            .query()
            .filter(Predicate::Above {
                column: "score".into(),
                bound: 50.0,
            })
            .recode("grade", &["b", "c"], "lower")
            .indicator("grade", "top", "a")
            .drop_columns(&["score"])
            .collect()
            .unwrap();

        assert_eq!(frame.columns(), &["name", "grade", "top"]);
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.rows()[0], vec!["bob", "lower", "0"]);
        assert_eq!(frame.rows()[2], vec!["dee", "a", "1"]);
    }

    #[test]
    fn at_most_is_inclusive() {
        let dir = source_with("people", PEOPLE);
        let conn = Connection::open(dir.path().to_str().unwrap()).unwrap();
        let frame = conn
            .table("people")
            .unwrap()
            .query()
            .filter(Predicate::AtMost {
                column: "score".into(),
                bound: 55.0,
            })
            .collect()
            .unwrap();
        assert_eq!(frame.n_rows(), 2);
    }

    #[test]
    fn plan_validates_columns_before_reading() {
        let dir = source_with("people", PEOPLE);
        let conn = Connection::open(dir.path().to_str().unwrap()).unwrap();
        let query = conn.table("people").unwrap().query().drop_columns(&["nope"]);
        let err = query.columns().unwrap_err();
        assert!(matches!(err, IoError::MissingColumn { ref column, .. } if column == "nope"));
    }

    #[test]
    fn dropped_column_cannot_be_referenced_later() {
        let dir = source_with("people", PEOPLE);
        let conn = Connection::open(dir.path().to_str().unwrap()).unwrap();
        let query = conn
            .table("people")
            .unwrap()
            .query()
            .drop_columns(&["grade"])
            .recode("grade", &["a"], "x");
        assert!(matches!(query.collect(), Err(IoError::MissingColumn { .. })));
    }

    #[test]
    fn indicator_target_must_be_new() {
        let dir = source_with("people", PEOPLE);
        let conn = Connection::open(dir.path().to_str().unwrap()).unwrap();
        let query = conn.table("people").unwrap().query().indicator("grade", "name", "a");
        assert!(matches!(query.columns(), Err(IoError::DuplicateColumn { .. })));
    }

    #[test]
    fn non_numeric_filter_value_is_schema_error() {
        let dir = source_with("people", "name,score\nann,ten\n");
        let conn = Connection::open(dir.path().to_str().unwrap()).unwrap();
        let err = conn
            .table("people")
            .unwrap()
            .query()
            .filter(Predicate::AtMost {
                column: "score".into(),
                bound: 1.0,
            })
            .collect()
            .unwrap_err();
        assert!(matches!(err, IoError::InvalidNumber { row_index: 0, .. }));
    }

    #[test]
    fn ragged_row_is_rejected() {
        let dir = source_with("people", "a,b\n1,2\n3\n");
        let conn = Connection::open(dir.path().to_str().unwrap()).unwrap();
        let err = conn.table("people").unwrap().query().collect().unwrap_err();
        assert!(matches!(err, IoError::InconsistentRowLength { row_index: 1, .. }));
    }
}
