//! What a training run returns besides the forest.

use serde::{Deserialize, Serialize};

use crate::error::RfError;
use crate::forest::RandomForest;
use crate::importance::RankedFeature;
use crate::oob::OobScore;
use crate::perm_importance::{PermutationImportance, compute_permutation_importance};

/// Parameters the forest was actually grown with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    /// Trees grown.
    pub n_trees: usize,
    /// Encoded feature columns.
    pub n_features: usize,
    /// Training rows.
    pub n_samples: usize,
    /// Split candidates drawn per node.
    pub max_features_resolved: usize,
    /// Master seed the per-tree seeds were drawn from.
    pub seed: u64,
}

/// Rows each tree never saw, and the accuracy measured on them.
#[derive(Debug, Clone)]
pub(crate) struct OutOfBag {
    pub(crate) indices_per_tree: Vec<Vec<usize>>,
    pub(crate) score: Option<OobScore>,
}

/// A fitted forest with its MDI ranking and out-of-bag bookkeeping.
///
/// The training rows themselves are not kept; out-of-bag diagnostics that
/// need them take them again as arguments.
#[derive(Debug)]
pub struct RandomForestResult {
    forest: RandomForest,
    importances: Vec<RankedFeature>,
    oob: OutOfBag,
    metadata: TrainingMetadata,
}

impl RandomForestResult {
    pub(crate) fn new(
        forest: RandomForest,
        importances: Vec<RankedFeature>,
        oob: OutOfBag,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            importances,
            oob,
            metadata,
        }
    }

    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    /// MDI importances, most important first.
    #[must_use]
    pub fn importances(&self) -> &[RankedFeature] {
        &self.importances
    }

    /// OOB accuracy and confusion counts; `None` unless `OobMode::Enabled`.
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob.score.as_ref()
    }

    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    /// Training rows left out of each tree's bootstrap draw, in tree order.
    #[must_use]
    pub fn oob_indices_per_tree(&self) -> &[Vec<usize>] {
        &self.oob.indices_per_tree
    }

    /// Number of training rows that are out of bag for at least one tree.
    #[must_use]
    pub fn oob_coverage(&self) -> usize {
        let mut seen = vec![false; self.metadata.n_samples];
        for &i in self.oob.indices_per_tree.iter().flatten() {
            seen[i] = true;
        }
        seen.into_iter().filter(|&s| s).count()
    }

    /// OOB permutation importance, ranked.
    ///
    /// `features` and `labels` must be the rows the forest was fitted on.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::TrainingDataMismatch`] | row count differs from training |
    /// | [`RfError::LabelCountMismatch`] | `labels.len() != features.len()` |
    /// | [`RfError::PredictionFeatureMismatch`] | a row has the wrong width |
    pub fn permutation_importances(
        &self,
        features: &[Vec<f64>],
        labels: &[u8],
        seed: u64,
    ) -> Result<Vec<PermutationImportance>, RfError> {
        if features.len() != self.metadata.n_samples {
            return Err(RfError::TrainingDataMismatch {
                expected: self.metadata.n_samples,
                got: features.len(),
            });
        }
        if labels.len() != features.len() {
            return Err(RfError::LabelCountMismatch {
                n_rows: features.len(),
                n_labels: labels.len(),
            });
        }
        if let Some(row) = features.iter().find(|r| r.len() != self.metadata.n_features) {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.metadata.n_features,
                got: row.len(),
            });
        }
        Ok(compute_permutation_importance(
            &self.forest,
            features,
            labels,
            &self.oob.indices_per_tree,
            seed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::{OobMode, RandomForestConfig, RfError};

    fn fitted() -> (crate::RandomForestResult, Vec<Vec<f64>>, Vec<u8>) {
        let features: Vec<Vec<f64>> = (0..30).map(|i| vec![f64::from(i)]).collect();
        let labels: Vec<u8> = (0..30).map(|i| u8::from(i >= 15)).collect();
        let result = RandomForestConfig::new(20)
            .unwrap()
            .with_oob_mode(OobMode::Enabled)
            .fit(&features, &labels, &["x".to_string()])
            .unwrap();
        (result, features, labels)
    }

    #[test]
    fn coverage_counts_rows_left_out_somewhere() {
        let (result, features, _) = fitted();
        assert_eq!(result.oob_indices_per_tree().len(), 20);
        assert_eq!(result.oob_coverage(), result.oob_score().unwrap().n_oob_samples);
        assert!(result.oob_coverage() <= features.len());
    }

    #[test]
    fn permutation_rejects_other_data() {
        let (result, features, labels) = fitted();
        assert!(matches!(
            result.permutation_importances(&features[..10], &labels[..10], 1),
            Err(RfError::TrainingDataMismatch { expected: 30, got: 10 })
        ));
        assert!(matches!(
            result.permutation_importances(&features, &labels[..29], 1),
            Err(RfError::LabelCountMismatch { .. })
        ));
        let wide: Vec<Vec<f64>> = features.iter().map(|r| vec![r[0], 0.0]).collect();
        assert!(matches!(
            result.permutation_importances(&wide, &labels, 1),
            Err(RfError::PredictionFeatureMismatch { expected: 1, got: 2 })
        ));
    }
}
