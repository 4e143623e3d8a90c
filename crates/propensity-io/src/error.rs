//! I/O error types for propensity-io.

use std::path::PathBuf;

/// Errors from the table source, feature preparation, sampling, encoding,
/// and artifact export.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the data source directory cannot be opened.
    #[error("cannot connect to data source {uri}")]
    Connection {
        /// Connection string that was attempted.
        uri: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the connection string uses a scheme other than `csv://`.
    #[error("unsupported data source scheme in {uri}: expected csv://<dir> or a directory path")]
    UnsupportedScheme {
        /// The rejected connection string.
        uri: String,
    },

    /// Returned when the named table does not exist in the data source.
    #[error("table \"{table}\" not found at {path}")]
    TableNotFound {
        /// Requested table name.
        table: String,
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a query or plan references a column the table does not have.
    #[error("column \"{column}\" not found in table \"{table}\"")]
    MissingColumn {
        /// The missing column name.
        column: String,
        /// Table (or artifact) the column was looked up in.
        table: String,
    },

    /// Returned when a derived column would shadow an existing one.
    #[error("column \"{column}\" already exists in table \"{table}\"")]
    DuplicateColumn {
        /// The duplicated column name.
        column: String,
        /// Table the column was added to.
        table: String,
    },

    /// Returned when a numeric cell is empty, unparseable, or non-finite.
    #[error("invalid numeric value in column \"{column}\", row {row_index}: \"{raw}\"")]
    InvalidNumber {
        /// Column holding the bad value.
        column: String,
        /// Zero-based row index within the scanned rows.
        row_index: usize,
        /// The raw cell text.
        raw: String,
    },

    /// Returned when a categorical value is not in the column's level table.
    #[error("unknown level \"{level}\" in categorical column \"{column}\"")]
    UnknownLevel {
        /// Categorical column name.
        column: String,
        /// The unrecognised value.
        level: String,
    },

    /// Returned when the training and testing percentile ranges would overlap.
    #[error("training upper bound {train_upper} must be below testing lower bound {test_lower}")]
    OverlappingPartitions {
        /// Inclusive upper percentile of the training partition.
        train_upper: f64,
        /// Exclusive lower percentile of the testing partition.
        test_lower: f64,
    },

    /// Returned when a sampled partition has no rows.
    #[error("partition \"{partition}\" is empty")]
    EmptyPartition {
        /// Name of the empty partition.
        partition: String,
    },

    /// Returned when the response is constant across the training partition.
    #[error("response \"{column}\" is constant ({value}) across all {n_rows} training rows")]
    DegenerateResponse {
        /// Response column name.
        column: String,
        /// The single observed value.
        value: u8,
        /// Number of training rows.
        n_rows: usize,
    },

    /// Returned when a categorical field has fewer than two observed levels in training.
    #[error("categorical column \"{column}\" has {observed} observed level(s) in training, need at least 2")]
    DegenerateFactor {
        /// Categorical column name.
        column: String,
        /// Number of distinct levels observed.
        observed: usize,
    },

    /// Returned when a record does not match the encoder's schema.
    #[error("record has {got} cells, schema expects {expected}")]
    RecordShape {
        /// Number of schema columns.
        expected: usize,
        /// Number of cells in the record.
        got: usize,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a CSV export row cannot be written.
    #[error("cannot write CSV export {path}")]
    CsvWrite {
        /// Path of the export.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when an artifact cannot be encoded as JSON.
    #[error("cannot serialize artifact {path}")]
    Serialize {
        /// Path of the artifact.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when an artifact file cannot be read.
    #[error("cannot read file {path}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a schema artifact cannot be decoded.
    #[error("cannot decode schema sample {path}")]
    DeserializeSchema {
        /// Path of the artifact.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when a schema artifact carries an unsupported format version.
    #[error("incompatible schema sample version in {path}: expected {expected}, found {found}")]
    IncompatibleSchemaVersion {
        /// The format version this build expects.
        expected: u32,
        /// The format version found in the file.
        found: u32,
        /// Path of the artifact.
        path: PathBuf,
    },
}
