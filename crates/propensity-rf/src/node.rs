use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based feature column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a node in a tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Gini impurity of a node.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Number of training samples of each class, indexed by the 0/1 label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassCounts([usize; 2]);

impl ClassCounts {
    /// Count the labels selected by `indices`.
    pub(crate) fn tally(labels: &[u8], indices: &[usize]) -> Self {
        let mut counts = Self::default();
        for &i in indices {
            counts.add(labels[i]);
        }
        counts
    }

    pub(crate) fn add(&mut self, label: u8) {
        self.0[usize::from(label)] += 1;
    }

    pub(crate) fn remove(&mut self, label: u8) {
        self.0[usize::from(label)] -= 1;
    }

    /// Return the count for `class` (0 or 1).
    #[must_use]
    pub fn get(self, class: u8) -> usize {
        self.0[usize::from(class)]
    }

    /// Return the total number of samples.
    #[must_use]
    pub fn total(self) -> usize {
        self.0[0] + self.0[1]
    }

    /// Return the majority class; ties go to class 0.
    #[must_use]
    pub fn majority(self) -> u8 {
        u8::from(self.0[1] > self.0[0])
    }
}

/// A node in a decision tree arena.
///
/// Trees are stored as `Vec<Node>` with children referenced by [`NodeIndex`];
/// the root is at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// An interior split node.
    Split {
        /// Feature used for the split.
        feature: FeatureIndex,
        /// Samples with `feature <= threshold` go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Impurity at this node before splitting.
        impurity: Impurity,
        /// Number of training samples that reached this node.
        n_samples: usize,
        /// Weighted decrease in impurity from this split.
        impurity_decrease: f64,
    },
    /// A terminal node voting for one class.
    Leaf {
        /// Majority class of the samples in the leaf.
        class: u8,
        /// Class counts of the samples in the leaf.
        counts: ClassCounts,
        /// Impurity at this leaf.
        impurity: Impurity,
    },
}

impl Node {
    /// Return the impurity at this node (before splitting for interior nodes).
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the number of training samples that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } => *n_samples,
            Node::Leaf { counts, .. } => counts.total(),
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_track_labels() {
        let mut c = ClassCounts::tally(&[0, 1, 1, 0, 1], &[0, 1, 2, 4]);
        assert_eq!((c.get(0), c.get(1), c.total()), (1, 3, 4));
        c.remove(1);
        c.add(0);
        assert_eq!((c.get(0), c.get(1)), (2, 2));
    }

    #[test]
    fn majority_ties_go_to_zero() {
        assert_eq!(ClassCounts([2, 2]).majority(), 0);
        assert_eq!(ClassCounts([1, 2]).majority(), 1);
        assert_eq!(ClassCounts([3, 0]).majority(), 0);
    }

    #[test]
    fn leaf_samples_come_from_counts() {
        let leaf = Node::Leaf {
            class: 1,
            counts: ClassCounts([1, 4]),
            impurity: Impurity::new(0.32),
        };
        assert!(leaf.is_leaf());
        assert_eq!(leaf.n_samples(), 5);
        assert_eq!(format!("{}", leaf.impurity()), "0.320000");
    }

    #[test]
    fn node_serializes_with_type_tag() {
        let split = Node::Split {
            feature: FeatureIndex::new(2),
            threshold: 3.5,
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            impurity: Impurity::new(0.48),
            n_samples: 20,
            impurity_decrease: 0.16,
        };
        let value = serde_json::to_value(&split).unwrap();
        assert_eq!(value["type"], "split");
        assert_eq!(value["feature"], 2);
        assert_eq!(value["left"], 1);
    }
}
