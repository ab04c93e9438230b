//! Trained classifier types
//!
//! The shipped estimator is a random forest: an ensemble of decision
//! trees whose leaves carry class distributions. The artifact is plain
//! serde-serialized JSON; [`Classifier`] is the seam that lets tests use
//! hand-built stand-ins.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A pre-trained per-pixel classifier.
///
/// Implementations must be immutable after construction and safe to share
/// read-only across worker threads.
pub trait Classifier: Send + Sync {
    /// Number of classes the classifier distinguishes
    fn num_classes(&self) -> usize;

    /// Write the class distribution for one sample into `out`.
    ///
    /// `features` is ordered by the trained column order; `out` has length
    /// `num_classes()` and is overwritten.
    fn class_probabilities(&self, features: &[f32], out: &mut [f32]);
}

/// One node of a decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TreeNode {
    /// Binary split: `feature <= threshold` goes left, otherwise right
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    /// Terminal node carrying a class distribution (counts or weights)
    Leaf { distribution: Vec<f32> },
}

/// A single decision tree, nodes indexed from the root at 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Walk the tree for one sample and return the leaf distribution
    fn leaf_distribution(&self, features: &[f32]) -> &[f32] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                TreeNode::Leaf { distribution } => return distribution,
            }
        }
    }

    /// Largest feature index referenced by any split
    fn max_feature_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                TreeNode::Split { feature, .. } => Some(*feature),
                TreeNode::Leaf { .. } => None,
            })
            .max()
    }

    fn validate(&self, n_classes: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split { left, right, .. } => {
                    // Children must point forward; rules out cycles
                    if *left <= idx || *right <= idx {
                        return Err(format!("node {idx} has non-forward child reference"));
                    }
                    if *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(format!("node {idx} references a missing child"));
                    }
                }
                TreeNode::Leaf { distribution } => {
                    if distribution.len() != n_classes {
                        return Err(format!(
                            "leaf {idx} has {} classes, expected {n_classes}",
                            distribution.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn add_normalized(acc: &mut [f32], distribution: &[f32]) {
    let total: f32 = distribution.iter().sum();
    if total > 0.0 {
        for (a, d) in acc.iter_mut().zip(distribution) {
            *a += d / total;
        }
    }
}

/// Random forest estimator.
///
/// The `jobs` knob mirrors the training framework's thread-count
/// parameter. The loader forces it to 1 so that a process running many
/// tiles concurrently is not oversubscribed by per-model threading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_classes: usize,
    trees: Vec<DecisionTree>,
    #[serde(default = "default_jobs")]
    jobs: usize,
}

fn default_jobs() -> usize {
    1
}

impl RandomForest {
    /// Create a forest from trees
    pub fn new(n_classes: usize, trees: Vec<DecisionTree>) -> Self {
        Self {
            n_classes,
            trees,
            jobs: default_jobs(),
        }
    }

    /// Number of trees in the ensemble
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Set the thread count used for tree traversal (minimum 1)
    pub fn set_jobs(&mut self, jobs: usize) {
        self.jobs = jobs.max(1);
    }

    /// Current thread-count setting
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Largest feature index referenced by any tree
    pub fn max_feature_index(&self) -> Option<usize> {
        self.trees.iter().filter_map(|t| t.max_feature_index()).max()
    }

    /// Structural validation of a deserialized artifact.
    ///
    /// Class code 255 is reserved for no-data in the output encoding, so
    /// at most 255 classes are representable.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.n_classes < 2 {
            return Err(format!("need at least 2 classes, got {}", self.n_classes));
        }
        if self.n_classes > 255 {
            return Err(format!(
                "{} classes cannot be encoded in a u8 class raster",
                self.n_classes
            ));
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_classes)
                .map_err(|e| format!("tree {idx}: {e}"))?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn num_classes(&self) -> usize {
        self.n_classes
    }

    fn class_probabilities(&self, features: &[f32], out: &mut [f32]) {
        if self.jobs > 1 {
            let acc = self
                .trees
                .par_iter()
                .fold(
                    || vec![0.0f32; self.n_classes],
                    |mut acc, tree| {
                        add_normalized(&mut acc, tree.leaf_distribution(features));
                        acc
                    },
                )
                .reduce(
                    || vec![0.0f32; self.n_classes],
                    |mut a, b| {
                        for (x, y) in a.iter_mut().zip(&b) {
                            *x += y;
                        }
                        a
                    },
                );
            out.copy_from_slice(&acc);
        } else {
            out.fill(0.0);
            for tree in &self.trees {
                add_normalized(out, tree.leaf_distribution(features));
            }
        }

        let n_trees = self.trees.len() as f32;
        for p in out.iter_mut() {
            *p /= n_trees;
        }
    }
}

/// An immutable trained model: the classifier plus the exact ordered
/// feature columns it was trained on.
pub struct TrainedModel {
    classifier: Box<dyn Classifier>,
    columns: Vec<String>,
}

impl TrainedModel {
    /// Create a trained model
    pub fn new(classifier: Box<dyn Classifier>, columns: Vec<String>) -> Self {
        Self {
            classifier,
            columns,
        }
    }

    /// The classifier
    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// Ordered feature columns the classifier expects
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.classifier.num_classes()
    }
}
