use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::RfError;
use crate::node::{ClassCounts, Node, NodeIndex};
use crate::split::{find_best_split, gini};

/// Growth settings shared by every tree of a forest.
///
/// Trees grow until a node is pure, holds one sample, or admits no split.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub(crate) max_features: usize,
}

/// A fitted classification tree over 0/1 labels.
///
/// Stored as a `Vec<Node>` arena with the root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl DecisionTree {
    /// Grow a tree on `sample_indices` (with repeats, for bootstrap samples).
    ///
    /// `col_features` is column-major. Inputs are validated by the forest.
    pub(crate) fn grow(
        col_features: &[Vec<f64>],
        labels: &[u8],
        sample_indices: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut nodes = Vec::new();
        build_tree(col_features, labels, sample_indices, params, rng, &mut nodes);
        Self {
            nodes,
            n_features: col_features.len(),
        }
    }

    /// Return the class voted for by the leaf that `sample` lands in.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<u8, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(self.vote(sample))
    }

    /// Leaf vote for a sample of known width.
    pub(crate) fn vote(&self, sample: &[f64]) -> u8 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { class, .. } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }

    /// Mean decrease in impurity per feature, normalized to sum to 1.0.
    ///
    /// All zeros for a single-leaf tree.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[feature.index()] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Return the arena of nodes; the root is at index 0.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the total number of nodes.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth; a lone root leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match self.nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
                Some(Node::Leaf { .. }) => max_depth = max_depth.max(d),
                None => {}
            }
        }
        max_depth
    }
}

fn build_tree(
    col_features: &[Vec<f64>],
    labels: &[u8],
    sample_indices: &[usize],
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<Node>,
) -> NodeIndex {
    let counts = ClassCounts::tally(labels, sample_indices);
    let impurity = gini(counts);
    let leaf = Node::Leaf {
        class: counts.majority(),
        counts,
        impurity,
    };

    if sample_indices.len() < 2 || impurity.value() == 0.0 {
        arena.push(leaf);
        return NodeIndex::new(arena.len() - 1);
    }

    let Some(split) = find_best_split(
        col_features,
        labels,
        sample_indices,
        params.max_features,
        rng,
    ) else {
        arena.push(leaf);
        return NodeIndex::new(arena.len() - 1);
    };

    // Reserve the slot so children get higher indices, then overwrite.
    let node_idx = arena.len();
    arena.push(leaf);
    let left = build_tree(
        col_features,
        labels,
        &split.left_indices,
        params,
        rng,
        arena,
    );
    let right = build_tree(
        col_features,
        labels,
        &split.right_indices,
        params,
        rng,
        arena,
    );
    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
        impurity,
        n_samples: sample_indices.len(),
        impurity_decrease: split.impurity_decrease,
    };
    NodeIndex::new(node_idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params(max_features: usize) -> TreeParams {
        TreeParams { max_features }
    }

    fn columns(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        (0..rows[0].len())
            .map(|j| rows.iter().map(|r| r[j]).collect())
            .collect()
    }

    fn grow(rows: &[Vec<f64>], labels: &[u8], p: &TreeParams) -> DecisionTree {
        let indices: Vec<usize> = (0..rows.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        DecisionTree::grow(&columns(rows), labels, &indices, p, &mut rng)
    }

    #[test]
    fn pure_labels_give_single_leaf() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let tree = grow(&rows, &[1, 1, 1], &params(2));
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict(&[0.0, 0.0]).unwrap(), 1);
    }

    #[test]
    fn separable_data_is_fit_exactly() {
        let rows: Vec<Vec<f64>> = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0]
            .iter()
            .map(|&x| vec![x, 0.0])
            .collect();
        let tree = grow(&rows, &[0, 0, 0, 1, 1, 1], &params(2));
        assert_eq!(tree.predict(&[2.0, 0.0]).unwrap(), 0);
        assert_eq!(tree.predict(&[11.0, 0.0]).unwrap(), 1);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.feature_importances(), vec![1.0, 0.0]);
    }

    #[test]
    fn xor_grows_two_levels() {
        let rows = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let labels = [0, 1, 1, 0];
        let tree = grow(&rows, &labels, &params(2));
        assert_eq!(tree.depth(), 2);
        for (row, &label) in rows.iter().zip(&labels) {
            assert_eq!(tree.predict(row).unwrap(), label);
        }
    }

    #[test]
    fn wrong_width_is_rejected() {
        let rows = vec![vec![1.0], vec![2.0]];
        let tree = grow(&rows, &[0, 1], &params(1));
        assert!(matches!(
            tree.predict(&[1.0, 2.0]),
            Err(RfError::PredictionFeatureMismatch { expected: 1, got: 2 })
        ));
    }
}
