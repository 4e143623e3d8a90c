//! Permutation feature importance on out-of-bag samples.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::forest::RandomForest;
use crate::tree::DecisionTree;

/// Permutation importance for a single feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermutationImportance {
    /// Feature name.
    pub name: String,
    /// Mean OOB accuracy drop across trees when this feature is shuffled.
    pub importance: f64,
    /// Population standard deviation of the drop across trees.
    pub std: f64,
    /// Rank (1 = most important).
    pub rank: usize,
}

fn tree_accuracy(
    tree: &DecisionTree,
    features: &[Vec<f64>],
    labels: &[u8],
    oob: &[usize],
    permuted: Option<(usize, &[f64])>,
) -> f64 {
    let mut sample = Vec::new();
    let correct = oob
        .iter()
        .enumerate()
        .filter(|&(k, &i)| {
            let vote = match permuted {
                Some((feature, values)) => {
                    sample.clone_from(&features[i]);
                    sample[feature] = values[k];
                    tree.vote(&sample)
                }
                None => tree.vote(&features[i]),
            };
            vote == labels[i]
        })
        .count();
    correct as f64 / oob.len() as f64
}

/// Per-tree accuracy drops for every feature; trees with no OOB samples are skipped.
///
/// The shuffle for (tree, feature) is seeded from `seed` alone so the result
/// does not depend on scheduling.
pub(crate) fn compute_permutation_importance(
    forest: &RandomForest,
    features: &[Vec<f64>],
    labels: &[u8],
    oob_indices_per_tree: &[Vec<usize>],
    seed: u64,
) -> Vec<PermutationImportance> {
    let names = &forest.feature_names;
    let n_features = names.len();

    let drops: Vec<Vec<f64>> = forest
        .trees
        .par_iter()
        .zip(oob_indices_per_tree.par_iter())
        .enumerate()
        .filter(|(_, (_, oob))| !oob.is_empty())
        .map(|(tree_idx, (tree, oob))| {
            let baseline = tree_accuracy(tree, features, labels, oob, None);
            (0..n_features)
                .map(|feature| {
                    let stream = (tree_idx * n_features + feature) as u64;
                    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(stream));
                    let mut values: Vec<f64> = oob.iter().map(|&i| features[i][feature]).collect();
                    values.shuffle(&mut rng);
                    let shuffled = Some((feature, values.as_slice()));
                    baseline - tree_accuracy(tree, features, labels, oob, shuffled)
                })
                .collect()
        })
        .collect();

    let n_trees = drops.len().max(1) as f64;
    let mut results: Vec<PermutationImportance> = names
        .iter()
        .enumerate()
        .map(|(feature, name)| {
            let mean = drops.iter().map(|d| d[feature]).sum::<f64>() / n_trees;
            let variance = drops
                .iter()
                .map(|d| (d[feature] - mean).powi(2))
                .sum::<f64>()
                / n_trees;
            PermutationImportance {
                name: name.clone(),
                importance: mean,
                std: variance.sqrt(),
                rank: 0,
            }
        })
        .collect();

    results.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    for (i, r) in results.iter_mut().enumerate() {
        r.rank = i + 1;
    }
    results
}
