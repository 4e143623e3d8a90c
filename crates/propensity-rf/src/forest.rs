//! Random forest training with parallel tree construction.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{OobMode, RandomForestConfig, max_features_for};
use crate::error::RfError;
use crate::importance::aggregate_importances;
use crate::oob::compute_oob;
use crate::result::{OutOfBag, RandomForestResult, TrainingMetadata};
use crate::tree::{DecisionTree, TreeParams};

/// A fitted random forest over 0/1 labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) feature_names: Vec<String>,
}

/// Draw `n_samples` indices with replacement; return them with the out-of-bag rest.
fn bootstrap_sample(n_samples: usize, rng: &mut impl Rng) -> (Vec<usize>, Vec<usize>) {
    let mut in_bag = vec![false; n_samples];
    let mut drawn = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let idx = rng.gen_range(0..n_samples);
        drawn.push(idx);
        in_bag[idx] = true;
    }
    let oob = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    (drawn, oob)
}

fn validate_inputs(
    features: &[Vec<f64>],
    labels: &[u8],
    feature_names: &[String],
) -> Result<usize, RfError> {
    let Some(first) = features.first() else {
        return Err(RfError::EmptyDataset);
    };
    let n_features = first.len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }
    if labels.len() != features.len() {
        return Err(RfError::LabelCountMismatch {
            n_rows: features.len(),
            n_labels: labels.len(),
        });
    }
    if feature_names.len() != n_features {
        return Err(RfError::FeatureNameMismatch {
            n_features,
            n_names: feature_names.len(),
        });
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    if let Some((sample_index, &value)) = labels.iter().enumerate().find(|(_, l)| **l > 1) {
        return Err(RfError::InvalidLabel {
            sample_index,
            value,
        });
    }
    let positives = labels.iter().filter(|&&l| l == 1).count();
    if positives == 0 || positives == labels.len() {
        return Err(RfError::SingleClass {
            class: u8::from(positives > 0),
            n_samples: labels.len(),
        });
    }
    Ok(n_features)
}

/// Train the forest.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[u8],
    feature_names: &[String],
) -> Result<RandomForestResult, RfError> {
    let n_features = validate_inputs(features, labels, feature_names)?;
    let n_samples = features.len();

    let params = TreeParams {
        max_features: max_features_for(n_features),
    };

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        max_features = params.max_features,
        "training random forest"
    );

    let col_features: Vec<Vec<f64>> = (0..n_features)
        .map(|j| features.iter().map(|row| row[j]).collect())
        .collect();

    // Per-tree seeds come from one master stream so results do not depend
    // on the thread count.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let grown: Vec<(DecisionTree, Vec<usize>)> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (in_bag, oob) = bootstrap_sample(n_samples, &mut rng);
            let tree = DecisionTree::grow(&col_features, labels, &in_bag, &params, &mut rng);
            (tree, oob)
        })
        .collect();
    let (trees, oob_indices_per_tree): (Vec<DecisionTree>, Vec<Vec<usize>>) =
        grown.into_iter().unzip();

    let per_tree: Vec<Vec<f64>> = trees.iter().map(DecisionTree::feature_importances).collect();
    let importances = aggregate_importances(&per_tree, feature_names);
    debug!(
        mean_nodes = trees.iter().map(DecisionTree::n_nodes).sum::<usize>() / trees.len(),
        "trees grown"
    );

    let oob_score = match config.oob_mode {
        OobMode::Enabled => Some(compute_oob(&trees, features, labels, &oob_indices_per_tree)?),
        OobMode::Disabled => None,
    };

    info!(
        oob_accuracy = oob_score.as_ref().map(|s| s.accuracy),
        "random forest training complete"
    );

    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_features,
        n_samples,
        max_features_resolved: params.max_features,
        seed: config.seed,
    };
    let forest = RandomForest {
        trees,
        n_features,
        feature_names: feature_names.to_vec(),
    };
    let oob = OutOfBag {
        indices_per_tree: oob_indices_per_tree,
        score: oob_score,
    };
    Ok(RandomForestResult::new(forest, importances, oob, metadata))
}
