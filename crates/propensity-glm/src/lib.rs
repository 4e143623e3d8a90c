//! Logistic regression as a binomial GLM with logit link.
//!
//! Fits by iteratively reweighted least squares and reports Wald inference
//! for every coefficient, together with deviance-based fit statistics.

mod config;
mod error;
mod irls;
mod linalg;
mod model;
mod serialize;

pub use config::LogisticConfig;
pub use error::GlmError;
pub use model::{Coefficient, FitSummary, INTERCEPT, LogisticModel, logistic};
