//! Model evaluation for the propensity pipeline.
//!
//! An [`Evaluator`] scores the combined sample with every [`Scorer`] under a
//! single cutoff, buckets scores into per-partition deciles, builds lift
//! tables and binary confusion metrics, and [`report`] turns the result into
//! text and JSON charts.

mod confusion;
mod decile;
mod error;
mod evaluator;
mod lift;
pub mod report;
mod scorer;

pub use confusion::{ConfusionMatrix, ConfusionMetrics};
pub use decile::{N_DECILES, assign_deciles};
pub use error::EvalError;
pub use evaluator::{
    Comparison, ComparisonSummary, Evaluator, ModelEvaluation, ModelSummary, PartitionConfusion,
    PartitionSummary,
};
pub use lift::{LiftRow, lift_table};
pub use report::{REPORT_TEXT_FILE, Report};
pub use scorer::{Baseline, INTERCEPT_TERM, ModelDescription, Scorer, Term, TermKind};
