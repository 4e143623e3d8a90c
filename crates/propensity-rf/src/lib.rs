//! Bagged CART random forest for binary (0/1) response scoring.
//!
//! Trees are grown in parallel on bootstrap samples with a random subset of
//! features considered at each split. A forest scores a sample by the
//! fraction of trees voting for a class, and reports mean-decrease-in-impurity
//! importances, optional out-of-bag accuracy and OOB permutation importance.

mod config;
mod error;
mod forest;
mod importance;
mod node;
mod oob;
mod perm_importance;
mod predict;
mod result;
mod serialize;
mod split;
mod tree;

pub use config::{OobMode, RandomForestConfig, max_features_for};
pub use error::RfError;
pub use forest::RandomForest;
pub use importance::RankedFeature;
pub use node::{ClassCounts, FeatureIndex, Impurity, Node, NodeIndex};
pub use oob::OobScore;
pub use perm_importance::PermutationImportance;
pub use result::{RandomForestResult, TrainingMetadata};
pub use tree::DecisionTree;
