use rand::Rng;

use crate::node::{ClassCounts, FeatureIndex, Impurity};

/// Gini impurity `1 - p0² - p1²` of a node; an empty node is pure.
pub(crate) fn gini(counts: ClassCounts) -> Impurity {
    let n = counts.total();
    if n == 0 {
        return Impurity::new(0.0);
    }
    let p1 = counts.get(1) as f64 / n as f64;
    let p0 = 1.0 - p1;
    Impurity::new(1.0 - p0 * p0 - p1 * p1)
}

/// Best split found for a node, with the partitioned sample indices.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    /// `n·parent - nL·left - nR·right`.
    pub(crate) impurity_decrease: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Find the best threshold split among `max_features` randomly drawn features.
///
/// `features` is column-major (`features[feature][sample]`) and
/// `sample_indices` index into its columns. Candidate thresholds are the
/// midpoints between consecutive distinct sorted values.
///
/// Returns `None` when every drawn feature is constant over the node.
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    labels: &[u8],
    sample_indices: &[usize],
    max_features: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = features.len();
    let n_samples = sample_indices.len();
    if n_samples < 2 || n_features == 0 {
        return None;
    }

    let parent_counts = ClassCounts::tally(labels, sample_indices);
    let parent_impurity = gini(parent_counts);

    // Partial Fisher-Yates over the first `take` positions.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = max_features.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(FeatureIndex, f64)> = None;
    let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n_samples);

    for &feat_idx in &feature_order[..take] {
        let column = &features[feat_idx];
        sorted.clear();
        sorted.extend(sample_indices.iter().map(|&si| (column[si], si)));
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = ClassCounts::default();
        let mut right = parent_counts;

        for i in 0..n_samples - 1 {
            let (value, si) = sorted[i];
            left.add(labels[si]);
            right.remove(labels[si]);

            let next = sorted[i + 1].0;
            if value == next {
                continue;
            }
            let n_left = i + 1;
            let n_right = n_samples - n_left;
            let decrease = n_samples as f64 * parent_impurity.value()
                - n_left as f64 * gini(left).value()
                - n_right as f64 * gini(right).value();
            if decrease > best_decrease {
                best_decrease = decrease;
                best = Some((FeatureIndex::new(feat_idx), (value + next) / 2.0));
            }
        }
    }

    let (feature, threshold) = best?;
    let column = &features[feature.index()];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .partition(|&&si| column[si] <= threshold);

    Some(SplitResult {
        feature,
        threshold,
        impurity_decrease: best_decrease,
        left_indices,
        right_indices,
    })
}
