//! Scoring a combined sample with every compared model under one cutoff.

use std::collections::BTreeSet;

use propensity_io::{CombinedSample, Partition, PredictionColumn};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::EvalError;
use crate::confusion::{ConfusionMatrix, ConfusionMetrics};
use crate::decile::assign_deciles;
use crate::lift::{LiftRow, lift_table};
use crate::scorer::Scorer;

/// Applies one probability cutoff to every model under comparison.
///
/// # Defaults
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `cutoff`  | 0.88    |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluator {
    cutoff: f64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            cutoff: Self::DEFAULT_CUTOFF,
        }
    }
}

impl Evaluator {
    /// Cutoff used when none is configured.
    pub const DEFAULT_CUTOFF: f64 = 0.88;

    /// Create an evaluator with the given cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidCutoff`] unless `0 <= cutoff <= 1`.
    pub fn new(cutoff: f64) -> Result<Self, EvalError> {
        if !(0.0..=1.0).contains(&cutoff) {
            return Err(EvalError::InvalidCutoff { cutoff });
        }
        Ok(Self { cutoff })
    }

    /// Return the cutoff.
    #[must_use]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Class 1 iff `score >= cutoff`.
    #[must_use]
    pub fn classify(&self, score: f64) -> u8 {
        u8::from(score >= self.cutoff)
    }

    /// Score, bucket, classify, and tabulate `sample` with one model.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EvalError::Scoring`] | the model fails on a record |
    /// | [`EvalError::InvalidScore`] | a score is not a probability |
    /// | [`EvalError::TooFewForDeciles`] | a partition has fewer than 10 rows |
    #[instrument(skip_all, fields(model = scorer.name(), n_rows = sample.len()))]
    pub fn evaluate(
        &self,
        sample: &CombinedSample,
        scorer: &dyn Scorer,
    ) -> Result<ModelEvaluation, EvalError> {
        let model = scorer.name().to_string();
        let scores: Vec<f64> = sample
            .records()
            .par_iter()
            .enumerate()
            .map(|(row_index, record)| {
                let score = scorer.score(record)?;
                if !(0.0..=1.0).contains(&score) {
                    return Err(EvalError::InvalidScore {
                        model: model.clone(),
                        row_index,
                        score,
                    });
                }
                Ok(score)
            })
            .collect::<Result<_, _>>()?;

        let resp: Vec<u8> = sample.records().iter().map(|r| r.resp()).collect();
        let classes: Vec<u8> = scores.iter().map(|&s| self.classify(s)).collect();
        let mut deciles = vec![0u8; sample.len()];
        let mut lift = Vec::with_capacity(20);
        let mut by_partition = Vec::with_capacity(2);

        for partition in Partition::ALL {
            let idx = sample.indices(partition);
            if idx.len() < 10 {
                return Err(EvalError::TooFewForDeciles {
                    partition,
                    n_rows: idx.len(),
                });
            }
            let part_scores: Vec<f64> = idx.iter().map(|&i| scores[i]).collect();
            let part_resp: Vec<u8> = idx.iter().map(|&i| resp[i]).collect();
            let part_classes: Vec<u8> = idx.iter().map(|&i| classes[i]).collect();
            let part_deciles = assign_deciles(&part_scores)?;
            for (&i, &d) in idx.iter().zip(&part_deciles) {
                deciles[i] = d;
            }
            lift.extend(lift_table(partition, &part_scores, &part_deciles, &part_resp));
            by_partition.push(PartitionConfusion {
                partition,
                confusion: ConfusionMatrix::from_classes(&part_resp, &part_classes)?,
            });
        }

        let confusion = ConfusionMatrix::from_classes(&resp, &classes)?;
        info!(
            model = %model,
            accuracy = confusion.metrics().accuracy,
            predicted_positive = confusion.predicted_positive(),
            "model evaluated"
        );
        Ok(ModelEvaluation {
            model,
            scores,
            deciles,
            classes,
            lift,
            confusion,
            by_partition,
        })
    }

    /// Evaluate every scorer on `sample` with this evaluator's cutoff.
    ///
    /// # Errors
    ///
    /// [`EvalError::NoModels`] for an empty list,
    /// [`EvalError::DuplicateModel`] when names repeat, and any error of
    /// [`Evaluator::evaluate`].
    #[instrument(skip_all, fields(cutoff = self.cutoff, n_models = scorers.len()))]
    pub fn compare(
        &self,
        sample: &CombinedSample,
        scorers: &[&dyn Scorer],
    ) -> Result<Comparison, EvalError> {
        if scorers.is_empty() {
            return Err(EvalError::NoModels);
        }
        let mut seen = BTreeSet::new();
        for s in scorers {
            if !seen.insert(s.name()) {
                return Err(EvalError::DuplicateModel {
                    name: s.name().to_string(),
                });
            }
        }
        let models = scorers
            .iter()
            .map(|s| self.evaluate(sample, *s))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(n_models = models.len(), "comparison complete");
        Ok(Comparison {
            cutoff: self.cutoff,
            models,
        })
    }
}

/// Confusion counts restricted to one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionConfusion {
    /// The partition.
    pub partition: Partition,
    /// Its confusion counts.
    pub confusion: ConfusionMatrix,
}

/// Per-record and aggregate results of one model.
///
/// `scores`, `deciles` and `classes` are parallel to the sample's records.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvaluation {
    model: String,
    scores: Vec<f64>,
    deciles: Vec<u8>,
    classes: Vec<u8>,
    lift: Vec<LiftRow>,
    confusion: ConfusionMatrix,
    by_partition: Vec<PartitionConfusion>,
}

impl ModelEvaluation {
    /// Return the model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Return the per-record scores.
    #[must_use]
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Return the per-record decile within its partition.
    #[must_use]
    pub fn deciles(&self) -> &[u8] {
        &self.deciles
    }

    /// Return the per-record thresholded class.
    #[must_use]
    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    /// Return lift rows, training deciles 1..10 then testing deciles 1..10.
    #[must_use]
    pub fn lift(&self) -> &[LiftRow] {
        &self.lift
    }

    /// Return the lift rows of one partition.
    pub fn lift_in(&self, partition: Partition) -> impl Iterator<Item = &LiftRow> {
        self.lift.iter().filter(move |r| r.partition == partition)
    }

    /// Return the confusion matrix over the whole combined sample.
    #[must_use]
    pub fn confusion(&self) -> &ConfusionMatrix {
        &self.confusion
    }

    /// Return the confusion matrices per partition.
    #[must_use]
    pub fn by_partition(&self) -> &[PartitionConfusion] {
        &self.by_partition
    }

    /// Return the per-record outputs in exporter form.
    #[must_use]
    pub fn prediction_column(&self) -> PredictionColumn {
        PredictionColumn {
            model: self.model.clone(),
            scores: self.scores.clone(),
            deciles: self.deciles.clone(),
            classes: self.classes.clone(),
        }
    }

    /// Return the aggregate results without per-record vectors.
    #[must_use]
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            model: self.model.clone(),
            confusion: self.confusion,
            metrics: self.confusion.metrics(),
            partitions: self
                .by_partition
                .iter()
                .map(|p| PartitionSummary {
                    partition: p.partition,
                    confusion: p.confusion,
                    metrics: p.confusion.metrics(),
                })
                .collect(),
            lift: self.lift.clone(),
        }
    }
}

/// All models evaluated under one shared cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    cutoff: f64,
    models: Vec<ModelEvaluation>,
}

impl Comparison {
    /// Return the shared cutoff.
    #[must_use]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Return the evaluations in input order.
    #[must_use]
    pub fn models(&self) -> &[ModelEvaluation] {
        &self.models
    }

    /// Look up an evaluation by model name.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelEvaluation> {
        self.models.iter().find(|m| m.model == name)
    }

    /// Return every model's per-record outputs in exporter form.
    #[must_use]
    pub fn prediction_columns(&self) -> Vec<PredictionColumn> {
        self.models.iter().map(ModelEvaluation::prediction_column).collect()
    }

    /// Return the serializable aggregate view.
    #[must_use]
    pub fn summary(&self) -> ComparisonSummary {
        ComparisonSummary {
            cutoff: self.cutoff,
            models: self.models.iter().map(ModelEvaluation::summary).collect(),
        }
    }
}

/// Metrics of one partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionSummary {
    /// The partition.
    pub partition: Partition,
    /// Its confusion counts.
    pub confusion: ConfusionMatrix,
    /// Rates derived from `confusion`.
    pub metrics: ConfusionMetrics,
}

/// Aggregate results of one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    /// Model name.
    pub model: String,
    /// Counts over the whole combined sample.
    pub confusion: ConfusionMatrix,
    /// Rates derived from `confusion`.
    pub metrics: ConfusionMetrics,
    /// Per-partition counts and rates.
    pub partitions: Vec<PartitionSummary>,
    /// Lift rows for both partitions.
    pub lift: Vec<LiftRow>,
}

/// Aggregate view of a [`Comparison`], as written to reports and printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    /// Shared cutoff.
    pub cutoff: f64,
    /// One entry per model.
    pub models: Vec<ModelSummary>,
}
