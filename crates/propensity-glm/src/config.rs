//! Configuration builder for logistic regression fitting.

use crate::error::GlmError;
use crate::model::LogisticModel;

/// Configuration for fitting a binomial GLM with logit link.
///
/// # Defaults
///
/// | Parameter   | Default |
/// |-------------|---------|
/// | `max_iter`  | 25      |
/// | `tolerance` | 1e-8    |
///
/// Iteration stops when `|dev - dev_prev| / (|dev| + 0.1) < tolerance`.
#[derive(Debug, Clone)]
pub struct LogisticConfig {
    pub(crate) max_iter: usize,
    pub(crate) tolerance: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            max_iter: 25,
            tolerance: 1e-8,
        }
    }
}

impl LogisticConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of IRLS iterations.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the relative deviance tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Return the maximum number of IRLS iterations.
    #[must_use]
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Return the relative deviance tolerance.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Fit an intercept plus one coefficient per feature column.
    ///
    /// `features[sample_idx][feature_idx]` row-major; `labels` are 0/1.
    ///
    /// # Errors
    ///
    /// | Variant                             | When                                             |
    /// |-------------------------------------|--------------------------------------------------|
    /// | [`GlmError::InvalidMaxIter`]        | `max_iter` is zero                               |
    /// | [`GlmError::InvalidTolerance`]      | tolerance is not positive and finite             |
    /// | [`GlmError::EmptyDataset`]          | `features` is empty                              |
    /// | [`GlmError::LabelCountMismatch`]    | `labels.len() != features.len()`                 |
    /// | [`GlmError::FeatureNameMismatch`]   | names do not match the row width                 |
    /// | [`GlmError::FeatureCountMismatch`]  | rows have inconsistent lengths                   |
    /// | [`GlmError::NonFiniteValue`]        | any value is NaN or infinite                     |
    /// | [`GlmError::InvalidLabel`]          | a label is not 0 or 1                            |
    /// | [`GlmError::ConstantResponse`]      | all labels are equal                             |
    /// | [`GlmError::UnobservedLevel`]       | a column is zero on every row                    |
    /// | [`GlmError::SingularDesign`]        | information matrix is singular during IRLS       |
    ///
    /// Columns that are linear combinations of earlier columns (a constant
    /// covariate, a duplicated indicator) are not an error: they are aliased,
    /// left out of the fit and reported by [`LogisticModel::aliased`].
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[u8],
        feature_names: &[String],
    ) -> Result<LogisticModel, GlmError> {
        crate::irls::fit(self, features, labels, feature_names)
    }

    pub(crate) fn validate(&self) -> Result<(), GlmError> {
        if self.max_iter == 0 {
            return Err(GlmError::InvalidMaxIter {
                max_iter: self.max_iter,
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(GlmError::InvalidTolerance {
                tolerance: self.tolerance,
            });
        }
        Ok(())
    }
}
