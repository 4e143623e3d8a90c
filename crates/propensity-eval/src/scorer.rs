//! The capability every compared model exposes to the evaluator.

use propensity_io::Record;
use serde::{Deserialize, Serialize};

use crate::EvalError;

/// `Term::field` of a model's intercept; charts skip terms with this field.
pub const INTERCEPT_TERM: &str = "(Intercept)";

/// A fitted model that can score prepared records and describe itself.
///
/// Scorers are shared across rayon workers during evaluation.
pub trait Scorer: Sync {
    /// Stable model name, used as a key in exports and reports.
    fn name(&self) -> &str;

    /// Probability-like score in [0, 1] that `record` responds.
    ///
    /// # Errors
    ///
    /// Implementations wrap their own failures with [`EvalError::scoring`].
    fn score(&self, record: &Record) -> Result<f64, EvalError>;

    /// Parameters or importances for reporting.
    fn describe(&self) -> ModelDescription;
}

/// What the numbers in a [`ModelDescription`] mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    /// Regression coefficients with Wald statistics.
    Coefficients,
    /// Variable importances.
    Importances,
}

/// One coefficient or importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    /// Encoded term name, e.g. `job[retired]`.
    pub name: String,
    /// Source field the term was encoded from.
    pub field: String,
    /// Coefficient estimate or importance value.
    pub estimate: f64,
    /// Test statistic (z value) when available.
    pub statistic: Option<f64>,
    /// Two-sided p-value when available.
    pub p_value: Option<f64>,
}

/// Reference level of a treatment-coded factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    /// Factor name.
    pub field: String,
    /// Level absorbed into the intercept.
    pub level: String,
}

/// A model's parameters or importances, as consumed by reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    /// Model name.
    pub model: String,
    /// Meaning of `terms`.
    pub kind: TermKind,
    /// Terms in model order.
    pub terms: Vec<Term>,
    /// Baseline level per treatment-coded factor; a coefficient's sign is
    /// relative to its factor's baseline.
    pub baselines: Vec<Baseline>,
}
