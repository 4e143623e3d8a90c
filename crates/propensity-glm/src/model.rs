//! Fitted logistic regression model and its coefficient table.

use serde::{Deserialize, Serialize};

use crate::error::GlmError;

/// Name given to the intercept term.
pub const INTERCEPT: &str = "(Intercept)";

/// One term with its Wald inference.
///
/// A column that is a linear combination of earlier columns in the training
/// design is aliased: it is left out of the fit, its estimate is zero and it
/// carries no inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    /// Term name; the intercept is [`INTERCEPT`].
    pub name: String,
    /// Estimated log-odds effect.
    pub estimate: f64,
    /// Standard error from the inverse information matrix.
    pub std_error: Option<f64>,
    /// Wald statistic `estimate / std_error`.
    pub z_value: Option<f64>,
    /// Two-sided normal p-value of `z_value`.
    pub p_value: Option<f64>,
}

impl Coefficient {
    /// Whether the column was aliased and left out of the fit.
    #[must_use]
    pub fn is_aliased(&self) -> bool {
        self.std_error.is_none()
    }
}

/// Goodness-of-fit summary of a logistic regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    /// Residual deviance at the final estimate.
    pub deviance: f64,
    /// Deviance of the intercept-only model.
    pub null_deviance: f64,
    /// Akaike information criterion, `deviance + 2 * n_parameters`, counting
    /// only the terms actually estimated.
    pub aic: f64,
    /// Number of training observations.
    pub n_obs: usize,
    /// IRLS iterations performed.
    pub iterations: usize,
    /// Whether the deviance criterion was met within `max_iter`.
    pub converged: bool,
}

/// A binomial GLM with logit link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub(crate) intercept: Coefficient,
    pub(crate) coefficients: Vec<Coefficient>,
    pub(crate) summary: FitSummary,
}

impl LogisticModel {
    /// Return the intercept term.
    #[must_use]
    pub fn intercept(&self) -> &Coefficient {
        &self.intercept
    }

    /// Return one coefficient per feature column, in training order.
    #[must_use]
    pub fn coefficients(&self) -> &[Coefficient] {
        &self.coefficients
    }

    /// Return the intercept followed by every coefficient.
    pub fn terms(&self) -> impl Iterator<Item = &Coefficient> {
        std::iter::once(&self.intercept).chain(&self.coefficients)
    }

    /// Look up a coefficient by feature name.
    #[must_use]
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Return the names of aliased columns, in training order.
    pub fn aliased(&self) -> impl Iterator<Item = &str> {
        self.coefficients
            .iter()
            .filter(|c| c.is_aliased())
            .map(|c| c.name.as_str())
    }

    /// Return the fit summary.
    #[must_use]
    pub fn summary(&self) -> &FitSummary {
        &self.summary
    }

    /// Return the feature names the model was fitted on.
    #[must_use]
    pub fn feature_names(&self) -> Vec<&str> {
        self.coefficients.iter().map(|c| c.name.as_str()).collect()
    }

    /// Return the number of feature columns expected by prediction.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// Compute the linear predictor `b0 + x . b`.
    ///
    /// # Errors
    ///
    /// Returns [`GlmError::PredictionFeatureMismatch`] if `sample` has the wrong width.
    pub fn linear_predictor(&self, sample: &[f64]) -> Result<f64, GlmError> {
        if sample.len() != self.coefficients.len() {
            return Err(GlmError::PredictionFeatureMismatch {
                expected: self.coefficients.len(),
                got: sample.len(),
            });
        }
        Ok(self.intercept.estimate
            + sample
                .iter()
                .zip(&self.coefficients)
                .map(|(x, c)| x * c.estimate)
                .sum::<f64>())
    }

    /// Predict the probability of response for one sample.
    ///
    /// # Errors
    ///
    /// Returns [`GlmError::PredictionFeatureMismatch`] if `sample` has the wrong width.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<f64, GlmError> {
        self.linear_predictor(sample).map(logistic)
    }

    /// Predict probabilities for many samples.
    ///
    /// # Errors
    ///
    /// Returns the first [`GlmError::PredictionFeatureMismatch`].
    pub fn predict_proba_batch(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, GlmError> {
        features.iter().map(|row| self.predict_proba(row)).collect()
    }
}

/// Inverse logit.
#[must_use]
pub fn logistic(eta: f64) -> f64 {
    1.0 / (1.0 + (-eta).exp())
}
