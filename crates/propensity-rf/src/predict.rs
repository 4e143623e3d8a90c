//! Prediction methods for the forest.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::RfError;
use crate::forest::RandomForest;
use crate::importance::{RankedFeature, aggregate_importances};
use crate::tree::DecisionTree;

impl RandomForest {
    fn check_width(&self, sample: &[f64]) -> Result<(), RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(())
    }

    /// Return the fraction of trees whose leaf votes for `class`.
    ///
    /// This is the forest's score for a sample: `vote_fraction(sample, 1)` is
    /// the estimated probability of the positive class.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::InvalidClass`] | `class` is not 0 or 1 |
    /// | [`RfError::PredictionFeatureMismatch`] | `sample.len() != n_features` |
    pub fn vote_fraction(&self, sample: &[f64], class: u8) -> Result<f64, RfError> {
        if class > 1 {
            return Err(RfError::InvalidClass { class });
        }
        self.check_width(sample)?;
        let votes = self.trees.iter().filter(|t| t.vote(sample) == class).count();
        Ok(votes as f64 / self.trees.len() as f64)
    }

    /// Predict the majority-vote class; ties go to class 0.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<u8, RfError> {
        Ok(u8::from(self.vote_fraction(sample, 1)? > 0.5))
    }

    /// [`RandomForest::vote_fraction`] over a batch, in parallel.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid class or mis-sized sample.
    pub fn vote_fraction_batch(&self, features: &[Vec<f64>], class: u8) -> Result<Vec<f64>, RfError> {
        features
            .par_iter()
            .map(|sample| self.vote_fraction(sample, class))
            .collect()
    }

    /// [`RandomForest::predict`] over a batch, in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] if any sample has the wrong width.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<u8>, RfError> {
        features.par_iter().map(|sample| self.predict(sample)).collect()
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the trees of the ensemble.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean decrease in impurity of the stored trees, ranked.
    ///
    /// Matches [`RandomForestResult::importances`](crate::RandomForestResult::importances)
    /// for the forest it was fitted as, so it also serves loaded models.
    #[must_use]
    pub fn importances(&self) -> Vec<RankedFeature> {
        let per_tree: Vec<Vec<f64>> = self
            .trees
            .iter()
            .map(DecisionTree::feature_importances)
            .collect();
        aggregate_importances(&per_tree, &self.feature_names)
    }

    /// Return the feature names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

#[cfg(test)]
mod tests {
    use crate::{RandomForestConfig, RfError};

    fn forest() -> crate::RandomForest {
        let features: Vec<Vec<f64>> = (0..40).map(|i| vec![f64::from(i)]).collect();
        let labels: Vec<u8> = (0..40).map(|i| u8::from(i >= 20)).collect();
        RandomForestConfig::new(25)
            .unwrap()
            .fit(&features, &labels, &["x".to_string()])
            .unwrap()
            .into_forest()
    }

    #[test]
    fn class_fractions_sum_to_one() {
        let f = forest();
        for x in [0.0, 19.5, 35.0] {
            let p0 = f.vote_fraction(&[x], 0).unwrap();
            let p1 = f.vote_fraction(&[x], 1).unwrap();
            assert!((p0 + p1 - 1.0).abs() < 1e-12);
        }
        assert_eq!(f.vote_fraction(&[0.0], 1).unwrap(), 0.0);
        assert_eq!(f.vote_fraction(&[39.0], 1).unwrap(), 1.0);
    }

    #[test]
    fn batch_matches_single() {
        let f = forest();
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![f64::from(i) + 0.25]).collect();
        let batch = f.vote_fraction_batch(&rows, 1).unwrap();
        for (row, score) in rows.iter().zip(&batch) {
            assert_eq!(f.vote_fraction(row, 1).unwrap(), *score);
        }
        let classes = f.predict_batch(&rows).unwrap();
        assert!(classes.iter().zip(&batch).all(|(&c, &s)| c == u8::from(s > 0.5)));
    }

    #[test]
    fn importances_match_training_result() {
        let features: Vec<Vec<f64>> = (0..40).map(|i| vec![f64::from(i), 1.0]).collect();
        let labels: Vec<u8> = (0..40).map(|i| u8::from(i >= 20)).collect();
        let names = vec!["x".to_string(), "flat".to_string()];
        let result = RandomForestConfig::new(10)
            .unwrap()
            .fit(&features, &labels, &names)
            .unwrap();
        assert_eq!(result.forest().importances(), result.importances());
    }

    #[test]
    fn bad_inputs_rejected() {
        let f = forest();
        assert!(matches!(
            f.vote_fraction(&[1.0], 2),
            Err(RfError::InvalidClass { class: 2 })
        ));
        assert!(matches!(
            f.vote_fraction(&[1.0, 2.0], 1),
            Err(RfError::PredictionFeatureMismatch { expected: 1, got: 2 })
        ));
    }
}
