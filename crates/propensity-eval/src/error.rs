use propensity_io::{IoError, Partition};

/// Errors from scoring, evaluation, and report output.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Returned when the cutoff is NaN or outside [0, 1].
    #[error("cutoff must lie in [0, 1], got {cutoff}")]
    InvalidCutoff {
        /// The rejected cutoff.
        cutoff: f64,
    },

    /// Returned when a partition is too small to form ten deciles.
    #[error("{partition} partition has {n_rows} rows, at least 10 are needed for deciles")]
    TooFewForDeciles {
        /// The undersized partition.
        partition: Partition,
        /// Number of rows in it.
        n_rows: usize,
    },

    /// Returned when decile assignment gets fewer than 10 scores.
    #[error("{n_scores} scores, at least 10 are needed for deciles")]
    TooFewScores {
        /// Number of scores supplied.
        n_scores: usize,
    },

    /// Returned when a comparison is requested for no models.
    #[error("no models to evaluate")]
    NoModels,

    /// Returned when two compared models share a name.
    #[error("model name {name:?} is used more than once")]
    DuplicateModel {
        /// The repeated name.
        name: String,
    },

    /// Returned when actual and predicted classes differ in length or are empty.
    #[error("confusion matrix needs equal, non-empty inputs, got {n_actual} actual and {n_predicted} predicted")]
    ClassLengthMismatch {
        /// Number of actual classes.
        n_actual: usize,
        /// Number of predicted classes.
        n_predicted: usize,
    },

    /// Returned when a model produces a score that is not a probability.
    #[error("model {model} scored row {row_index} as {score}, expected a value in [0, 1]")]
    InvalidScore {
        /// Model name.
        model: String,
        /// Zero-based row of the combined sample.
        row_index: usize,
        /// The offending score.
        score: f64,
    },

    /// Returned when a model fails to score a record.
    #[error("model {model} failed to score a record")]
    Scoring {
        /// Model name.
        model: String,
        /// The model's own error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Returned when report JSON cannot be produced.
    #[error("failed to encode report {name}")]
    EncodeReport {
        /// Report or chart name.
        name: String,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when writing report files fails.
    #[error(transparent)]
    Io(#[from] IoError),
}

impl EvalError {
    /// Wrap a model's own error as [`EvalError::Scoring`].
    pub fn scoring(model: &str, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        EvalError::Scoring {
            model: model.to_string(),
            source: Box::new(source),
        }
    }
}
