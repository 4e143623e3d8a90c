//! Artifact exporter: predictions, schema sample, and sample extract.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{Cell, Column, CombinedSample};

/// Version stamped into every JSON artifact written here.
pub const FORMAT_VERSION: u32 = 1;

/// Column name carrying the partition label in exports.
pub const PARTITION_COLUMN: &str = "sample";

/// File name of the zero-row schema sample.
pub const SCHEMA_SAMPLE_FILE: &str = "sample_schema.json";

/// File name of the combined-sample extract.
pub const SAMPLE_CSV_FILE: &str = "sample.csv";

/// File name of the joined predictions.
pub const PREDICTIONS_FILE: &str = "predictions.json";

/// Per-record outputs of one model, parallel to a sample's records.
///
/// Plain vectors so the exporter does not depend on the model crates.
#[derive(Debug, Clone)]
pub struct PredictionColumn {
    /// Model name used as the key in exported rows.
    pub model: String,
    /// Predicted probability of response.
    pub scores: Vec<f64>,
    /// Decile bucket within the record's partition, 1 = highest scores.
    pub deciles: Vec<u8>,
    /// Thresholded class.
    pub classes: Vec<u8>,
}

/// Writes pipeline artifacts into one directory.
///
/// Creates the directory on construction. Every file is written to a
/// temporary file in the same directory and renamed into place, so readers
/// never observe a half-written artifact. Existing files are replaced.
#[derive(Debug)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    /// Create a writer targeting `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display()))]
    pub fn new(output_dir: &Path) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Return the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Return the path of `file_name` inside the output directory without writing.
    #[must_use]
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Write `bytes` to `file_name` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the temporary file cannot be created,
    /// written, or renamed.
    pub fn write_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, IoError> {
        let path = self.path(file_name);
        write_atomic(&path, bytes)?;
        debug!(path = %path.display(), size_bytes = bytes.len(), "artifact written");
        Ok(path)
    }

    /// Serialize `value` as pretty JSON into `file_name`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | the value cannot be encoded |
    /// | [`IoError::WriteFile`] | the file cannot be written |
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<PathBuf, IoError> {
        let json = serde_json::to_vec_pretty(value).map_err(|e| IoError::Serialize {
            path: self.path(file_name),
            source: e,
        })?;
        self.write_bytes(file_name, &json)
    }

    /// Write the zero-row schema sample to `sample_schema.json`.
    ///
    /// Carries column names, types and factor level tables so a consumer can
    /// validate and encode incoming records exactly as training did.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`].
    #[instrument(skip_all)]
    pub fn write_schema_sample(&self, sample: &CombinedSample) -> Result<PathBuf, IoError> {
        let artifact = SchemaArtifact {
            format_version: FORMAT_VERSION,
            response: sample.schema().response(),
            partition_column: PARTITION_COLUMN,
            columns: sample.schema().columns(),
            rows: [],
        };
        let path = self.write_json(SCHEMA_SAMPLE_FILE, &artifact)?;
        info!(path = %path.display(), n_columns = artifact.columns.len(), "schema sample written");
        Ok(path)
    }

    /// Write the full combined sample to `sample.csv`.
    ///
    /// Header: `sample`, every feature column, then the response.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::CsvWrite`] or [`IoError::WriteFile`].
    #[instrument(skip_all, fields(n_rows = sample.len()))]
    pub fn write_sample_csv(&self, sample: &CombinedSample) -> Result<PathBuf, IoError> {
        let path = self.path(SAMPLE_CSV_FILE);
        let csv_err = |e: csv::Error| IoError::CsvWrite {
            path: path.clone(),
            source: e,
        };
        let schema = sample.schema();

        let mut wtr = csv::Writer::from_writer(Vec::new());
        let header = std::iter::once(PARTITION_COLUMN)
            .chain(schema.columns().iter().map(|c| c.name.as_str()))
            .chain(std::iter::once(schema.response()));
        wtr.write_record(header).map_err(csv_err)?;

        for (record, partition) in sample.records().iter().zip(sample.partitions()) {
            let mut fields = Vec::with_capacity(record.cells().len() + 2);
            fields.push(partition.as_str().to_string());
            fields.extend(
                record
                    .cells()
                    .iter()
                    .enumerate()
                    .map(|(i, &cell)| schema.render(i, cell)),
            );
            fields.push(record.resp().to_string());
            wtr.write_record(&fields).map_err(csv_err)?;
        }

        let bytes = wtr.into_inner().map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e.into_error(),
        })?;
        self.write_bytes(SAMPLE_CSV_FILE, &bytes)?;
        info!(path = %path.display(), "sample extract written");
        Ok(path)
    }

    /// Write the combined sample joined with every model's outputs to
    /// `predictions.json`.
    ///
    /// Each row holds the partition, every feature value, the response, and
    /// per model `<model>_score`, `<model>_decile` and `<model>_class`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::RecordShape`] | a prediction column's length differs from the sample |
    /// | [`IoError::Serialize`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | the file cannot be written |
    #[instrument(skip_all, fields(n_rows = sample.len(), n_models = predictions.len()))]
    pub fn write_predictions(
        &self,
        sample: &CombinedSample,
        predictions: &[PredictionColumn],
        cutoff: f64,
    ) -> Result<PathBuf, IoError> {
        for column in predictions {
            for got in [column.scores.len(), column.deciles.len(), column.classes.len()] {
                if got != sample.len() {
                    return Err(IoError::RecordShape {
                        expected: sample.len(),
                        got,
                    });
                }
            }
        }

        let rows: Vec<Value> = sample
            .records()
            .iter()
            .zip(sample.partitions())
            .enumerate()
            .map(|(i, (record, partition))| {
                let mut row = Map::new();
                row.insert(PARTITION_COLUMN.into(), partition.as_str().into());
                for (column, &cell) in sample.schema().columns().iter().zip(record.cells()) {
                    row.insert(column.name.clone(), cell_value(column, cell));
                }
                row.insert(sample.schema().response().into(), record.resp().into());
                for p in predictions {
                    row.insert(format!("{}_score", p.model), p.scores[i].into());
                    row.insert(format!("{}_decile", p.model), p.deciles[i].into());
                    row.insert(format!("{}_class", p.model), p.classes[i].into());
                }
                Value::Object(row)
            })
            .collect();

        let models: Vec<&str> = predictions.iter().map(|p| p.model.as_str()).collect();
        let artifact = PredictionsArtifact {
            format_version: FORMAT_VERSION,
            cutoff,
            models,
            n_rows: rows.len(),
            rows,
        };
        let path = self.write_json(PREDICTIONS_FILE, &artifact)?;
        info!(path = %path.display(), "predictions written");
        Ok(path)
    }
}

fn cell_value(column: &Column, cell: Cell) -> Value {
    match (cell, column.levels()) {
        (Cell::Level(l), Some(levels)) => Value::from(levels[l].as_str()),
        (Cell::Number(v), _) => Value::from(v),
        (Cell::Level(l), None) => Value::from(l),
    }
}

/// Write `bytes` to `path` through a sibling temporary file and a rename.
///
/// # Errors
///
/// Returns [`IoError::WriteFile`] on any I/O failure.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IoError> {
    let write_err = |e: std::io::Error| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct SchemaArtifact<'a> {
    format_version: u32,
    response: &'a str,
    partition_column: &'a str,
    columns: &'a [Column],
    rows: [Value; 0],
}

#[derive(Serialize)]
struct PredictionsArtifact<'a> {
    format_version: u32,
    cutoff: f64,
    models: Vec<&'a str>,
    n_rows: usize,
    rows: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Partition, Record, Schema};
    use tempfile::TempDir;

    fn sample() -> CombinedSample {
        let schema = Schema::new(
            vec![
                Column::categorical("contact", ["cellular", "telephone"]),
                Column::numeric("age"),
            ],
            "resp",
        );
        CombinedSample::new(
            schema,
            vec![
                Record::new(vec![Cell::Level(1), Cell::Number(30.0)], 0),
                Record::new(vec![Cell::Level(0), Cell::Number(45.5)], 1),
            ],
            vec![Partition::Train, Partition::Test],
        )
    }

    fn column(model: &str) -> PredictionColumn {
        PredictionColumn {
            model: model.into(),
            scores: vec![0.2, 0.9],
            deciles: vec![1, 1],
            classes: vec![0, 1],
        }
    }

    #[test]
    fn new_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("api");
        ArtifactWriter::new(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn new_fails_when_target_is_a_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("api");
        fs::write(&target, b"not a directory").unwrap();
        let err = ArtifactWriter::new(&target).unwrap_err();
        assert!(matches!(err, IoError::OutputDirCreate { ref path, .. } if *path == target));
    }

    #[test]
    fn schema_sample_has_zero_rows_and_levels() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        let path = writer.write_schema_sample(&sample()).unwrap();

        let content: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(content["format_version"], 1);
        assert_eq!(content["response"], "resp");
        assert_eq!(content["rows"].as_array().unwrap().len(), 0);
        assert_eq!(content["columns"][0]["type"], "categorical");
        assert_eq!(content["columns"][0]["levels"][1], "telephone");
        assert_eq!(content["columns"][1]["type"], "numeric");
    }

    #[test]
    fn sample_csv_round_trips_values() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        let path = writer.write_sample_csv(&sample()).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["sample,contact,age,resp", "train,telephone,30,0", "test,cellular,45.5,1"]);
    }

    #[test]
    fn predictions_join_every_model() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        let path = writer
            .write_predictions(&sample(), &[column("logistic"), column("forest")], 0.88)
            .unwrap();

        let content: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(content["n_rows"], 2);
        let row = &content["rows"][1];
        assert_eq!(row["sample"], "test");
        assert_eq!(row["contact"], "cellular");
        assert_eq!(row["logistic_score"], 0.9);
        assert_eq!(row["forest_class"], 1);
    }

    #[test]
    fn predictions_length_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        let mut short = column("logistic");
        short.deciles.pop();
        assert!(matches!(
            writer.write_predictions(&sample(), &[short], 0.88),
            Err(IoError::RecordShape { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn existing_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        writer.write_bytes("x.txt", b"first").unwrap();
        writer.write_bytes("x.txt", b"second").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("x.txt")).unwrap(), "second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
