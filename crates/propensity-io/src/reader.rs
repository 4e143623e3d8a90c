//! Reader for the exported schema sample.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::IoError;
use crate::domain::{Column, Schema};
use crate::writer::FORMAT_VERSION;

#[derive(Deserialize)]
struct SchemaArtifact {
    format_version: u32,
    response: String,
    columns: Vec<Column>,
}

/// Loads the zero-row schema sample written by
/// [`ArtifactWriter::write_schema_sample`](crate::ArtifactWriter::write_schema_sample).
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::ReadFile`] | the file cannot be read |
/// | [`IoError::DeserializeSchema`] | the content is not a schema sample |
/// | [`IoError::IncompatibleSchemaVersion`] | format version mismatch |
pub struct SchemaReader {
    path: PathBuf,
}

impl SchemaReader {
    /// Create a reader for the given file.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the schema sample.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Schema, IoError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| IoError::ReadFile {
            path: self.path.clone(),
            source: e,
        })?;
        let artifact: SchemaArtifact =
            serde_json::from_str(&text).map_err(|e| IoError::DeserializeSchema {
                path: self.path.clone(),
                source: e,
            })?;
        if artifact.format_version != FORMAT_VERSION {
            return Err(IoError::IncompatibleSchemaVersion {
                expected: FORMAT_VERSION,
                found: artifact.format_version,
                path: self.path.clone(),
            });
        }
        debug!(n_columns = artifact.columns.len(), "schema sample loaded");
        Ok(Schema::new(artifact.columns, &artifact.response))
    }
}
