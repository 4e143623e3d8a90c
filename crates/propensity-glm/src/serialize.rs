//! Model persistence as versioned JSON.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::GlmError;
use crate::model::{Coefficient, FitSummary, LogisticModel};

/// Current model file format version.
const FORMAT_VERSION: u32 = 1;

const MODEL_KIND: &str = "logistic_regression";

/// Versioned envelope for the serialized model.
#[derive(Serialize, Deserialize)]
struct ModelEnvelope {
    format_version: u32,
    kind: String,
    link: String,
    feature_names: Vec<String>,
    intercept: Coefficient,
    coefficients: Vec<Coefficient>,
    summary: FitSummary,
}

impl LogisticModel {
    /// Save the model as JSON.
    ///
    /// The file is written next to `path` under a temporary name and renamed
    /// into place; an existing file is replaced.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`GlmError::SerializeModel`] | JSON encoding failed |
    /// | [`GlmError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GlmError> {
        let path = path.as_ref();
        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            kind: MODEL_KIND.to_string(),
            link: "logit".to_string(),
            feature_names: self.coefficients.iter().map(|c| c.name.clone()).collect(),
            intercept: self.intercept.clone(),
            coefficients: self.coefficients.clone(),
            summary: self.summary.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| GlmError::SerializeModel { source: e })?;

        let write_err = |e: std::io::Error| GlmError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        info!(
            size_bytes = bytes.len(),
            n_coefficients = self.coefficients.len(),
            "model saved"
        );
        Ok(())
    }

    /// Load a model saved by [`LogisticModel::save`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`GlmError::ReadModel`] | file read failed |
    /// | [`GlmError::DeserializeModel`] | JSON decoding failed |
    /// | [`GlmError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GlmError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| GlmError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;
        let envelope: ModelEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| GlmError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(GlmError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        debug!(
            n_coefficients = envelope.coefficients.len(),
            iterations = envelope.summary.iterations,
            "model loaded"
        );
        Ok(Self {
            intercept: envelope.intercept,
            coefficients: envelope.coefficients,
            summary: envelope.summary,
        })
    }
}
