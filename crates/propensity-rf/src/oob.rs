//! Out-of-bag evaluation.

use serde::{Deserialize, Serialize};

use crate::error::RfError;
use crate::tree::DecisionTree;

/// Out-of-bag evaluation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OobScore {
    /// Fraction of OOB-evaluated samples whose majority vote matches the label.
    pub accuracy: f64,
    /// `confusion_matrix[actual][predicted]`.
    pub confusion_matrix: [[usize; 2]; 2],
    /// Number of samples that had at least one OOB tree.
    pub n_oob_samples: usize,
}

/// Majority vote over the trees for which each sample was out of bag.
///
/// Samples that were in every bootstrap are skipped. Vote ties go to class 0.
pub(crate) fn compute_oob(
    trees: &[DecisionTree],
    features: &[Vec<f64>],
    labels: &[u8],
    oob_indices_per_tree: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let mut votes = vec![[0usize; 2]; features.len()];
    for (tree, oob) in trees.iter().zip(oob_indices_per_tree) {
        for &i in oob {
            votes[i][usize::from(tree.vote(&features[i]))] += 1;
        }
    }

    let mut confusion = [[0usize; 2]; 2];
    let mut n_oob_samples = 0usize;
    for (v, &label) in votes.iter().zip(labels) {
        if v[0] + v[1] == 0 {
            continue;
        }
        n_oob_samples += 1;
        let predicted = usize::from(v[1] > v[0]);
        confusion[usize::from(label)][predicted] += 1;
    }
    if n_oob_samples == 0 {
        return Err(RfError::OobEvaluationFailed {
            reason: "no sample has any OOB tree".to_string(),
        });
    }

    let correct = confusion[0][0] + confusion[1][1];
    Ok(OobScore {
        accuracy: correct as f64 / n_oob_samples as f64,
        confusion_matrix: confusion,
        n_oob_samples,
    })
}
