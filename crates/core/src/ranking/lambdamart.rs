//! LambdaMART: gradient-boosted regression trees fit to LambdaRank gradients.
//!
//! Each boosting round computes, per query group, a lambda for every document
//! from all its label-ordered pairs, weighted by the |ΔNDCG@k| of swapping the
//! pair. A depth-limited regression tree is fit to the lambdas with Newton leaf
//! values, and its output is added to the ensemble with shrinkage.

use crate::ranking::features::{FeatureRow, FEATURE_NAMES, NUM_FEATURES};
use crate::ranking::metrics::dcg_at_k;
use crate::storage::persistence::{Artifact, ArtifactKind};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Added to hessian sums so near-converged leaves stay finite.
const HESSIAN_EPSILON: f64 = 1e-6;

/// Splits must improve the objective by more than this.
const MIN_SPLIT_GAIN: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f32,
    },
    Split {
        feature: u8,
        threshold: f32,
        gain: f32,
        left: u32,
        right: u32,
    },
}

/// Tree growth limits.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

/// A binary regression tree stored in pre-order. Children always follow their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fits a tree to `gradients` over `rows`, with Newton leaf values `Σg / Σh`.
    pub fn fit(rows: &[FeatureRow], gradients: &[f32], hessians: &[f32], params: TreeParams) -> Self {
        let mut builder = TreeBuilder {
            rows,
            gradients,
            hessians,
            params,
            nodes: Vec::new(),
        };
        let mut indices: Vec<usize> = (0..rows.len()).collect();
        builder.grow(&mut indices, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn predict(&self, row: &FeatureRow) -> f32 {
        let mut i = 0usize;
        loop {
            match self.nodes.get(i) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                }) => {
                    i = if row[*feature as usize] <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
                None => return 0.0,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], i: usize) -> usize {
            match nodes.get(i) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left as usize).max(walk(nodes, *right as usize))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("node {i}: non-finite leaf value"));
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature as usize >= NUM_FEATURES {
                        return Err(format!("node {i}: feature {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i}: non-finite threshold"));
                    }
                    for child in [*left as usize, *right as usize] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i}: bad child index {child}"));
                        }
                    }
                }
                Node::Leaf { .. } => {}
            }
        }
        Ok(())
    }
}

struct TreeBuilder<'a> {
    rows: &'a [FeatureRow],
    gradients: &'a [f32],
    hessians: &'a [f32],
    params: TreeParams,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f32,
    gain: f64,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> u32 {
        let id = self.nodes.len() as u32;
        let (g, h) = self.sums(indices);
        self.nodes.push(Node::Leaf {
            value: (g / (h + HESSIAN_EPSILON)) as f32,
        });

        if depth >= self.params.max_depth || indices.len() < 2 * self.params.min_samples_leaf.max(1) {
            return id;
        }
        let Some(best) = self.best_split(indices, g, h) else {
            return id;
        };

        // Partition in place: rows going left first.
        let mut mid = 0;
        for i in 0..indices.len() {
            if self.rows[indices[i]][best.feature] <= best.threshold {
                indices.swap(i, mid);
                mid += 1;
            }
        }
        let (left_idx, right_idx) = indices.split_at_mut(mid);
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[id as usize] = Node::Split {
            feature: best.feature as u8,
            threshold: best.threshold,
            gain: best.gain as f32,
            left,
            right,
        };
        id
    }

    fn sums(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.gradients[i] as f64, h + self.hessians[i] as f64)
        })
    }

    fn best_split(&self, indices: &[usize], g_total: f64, h_total: f64) -> Option<BestSplit> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent = g_total * g_total / (h_total + HESSIAN_EPSILON);
        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..NUM_FEATURES {
            sorted.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));
            let (mut gl, mut hl) = (0.0f64, 0.0f64);
            for p in 1..sorted.len() {
                let prev = sorted[p - 1];
                gl += self.gradients[prev] as f64;
                hl += self.hessians[prev] as f64;
                if p < min_leaf || sorted.len() - p < min_leaf {
                    continue;
                }
                let lo = self.rows[prev][feature];
                let hi = self.rows[sorted[p]][feature];
                if lo >= hi {
                    continue;
                }
                let (gr, hr) = (g_total - gl, h_total - hl);
                let gain = gl * gl / (hl + HESSIAN_EPSILON) + gr * gr / (hr + HESSIAN_EPSILON) - parent;
                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    // midpoint can round up to `hi` for adjacent floats
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// Computes LambdaRank gradients and hessians for every row.
///
/// `groups` partitions the rows by query. Pairs are weighted by the |ΔNDCG@k|
/// of swapping them in the ranking induced by `scores`.
pub fn lambda_gradients(
    labels: &[f32],
    scores: &[f32],
    groups: &[Range<usize>],
    k: usize,
    gradients: &mut [f32],
    hessians: &mut [f32],
) {
    gradients.iter_mut().for_each(|g| *g = 0.0);
    hessians.iter_mut().for_each(|h| *h = 0.0);

    for group in groups {
        let labels = &labels[group.clone()];
        let scores = &scores[group.clone()];
        let n = labels.len();
        if n < 2 {
            continue;
        }

        let mut ideal: Vec<f64> = labels.iter().map(|&l| l as f64).collect();
        ideal.sort_by(|a, b| b.total_cmp(a));
        let idcg = dcg_at_k(&ideal, k);
        if idcg < 1e-10 {
            continue;
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        let mut discount = vec![0f64; n];
        for (rank, &doc) in order.iter().enumerate() {
            if rank < k {
                discount[doc] = 1.0 / (rank as f64 + 2.0).log2();
            }
        }

        for i in 0..n {
            for j in 0..n {
                if labels[i] <= labels[j] {
                    continue;
                }
                let delta = ((labels[i] - labels[j]) as f64 * (discount[i] - discount[j])).abs() / idcg;
                if delta == 0.0 {
                    continue;
                }
                let rho = 1.0 / (1.0 + ((scores[i] - scores[j]) as f64).exp());
                let lambda = (delta * rho) as f32;
                let weight = (delta * rho * (1.0 - rho)) as f32;
                gradients[group.start + i] += lambda;
                gradients[group.start + j] -= lambda;
                hessians[group.start + i] += weight;
                hessians[group.start + j] += weight;
            }
        }
    }
}

/// A trained LambdaMART ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaMart {
    learning_rate: f32,
    trees: Vec<RegressionTree>,
}

impl LambdaMart {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            trees: Vec::new(),
        }
    }

    /// Raw ranking score. Only the order between scores is meaningful.
    pub fn predict(&self, row: &FeatureRow) -> f32 {
        self.trees
            .iter()
            .map(|t| t.predict(row))
            .sum::<f32>()
            * self.learning_rate
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub(crate) fn push_tree(&mut self, tree: RegressionTree) {
        self.trees.push(tree);
    }

    pub(crate) fn truncate(&mut self, num_trees: usize) {
        self.trees.truncate(num_trees);
    }

    /// Total split gain per feature, descending. Features never split on are omitted.
    pub fn feature_importance(&self) -> Vec<(&'static str, f64)> {
        let mut gain = [0f64; NUM_FEATURES];
        for node in self.trees.iter().flat_map(|t| &t.nodes) {
            if let Node::Split { feature, gain: g, .. } = node {
                gain[*feature as usize] += *g as f64;
            }
        }
        let mut out: Vec<(&'static str, f64)> = FEATURE_NAMES
            .iter()
            .zip(gain)
            .filter(|(_, g)| *g > 0.0)
            .map(|(n, g)| (*n, g))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }
}

impl Artifact for LambdaMart {
    const KIND: ArtifactKind = ArtifactKind::RankerModel;

    fn validate(&self) -> Result<(), String> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(format!("invalid learning rate {}", self.learning_rate));
        }
        if self.trees.is_empty() {
            return Err("model has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: TreeParams = TreeParams {
        max_depth: 3,
        min_samples_leaf: 1,
    };

    fn row(x: f32) -> FeatureRow {
        [x, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
    }

    #[test]
    fn test_tree_splits_on_informative_feature() {
        let rows = vec![row(0.0), row(1.0), row(2.0), row(3.0)];
        let grads = [-1.0, -1.0, 1.0, 1.0];
        let hess = [1.0; 4];
        let tree = RegressionTree::fit(&rows, &grads, &hess, PARAMS);
        assert!(tree.depth() >= 1);
        assert!(tree.predict(&row(0.5)) < 0.0);
        assert!(tree.predict(&row(2.5)) > 0.0);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_tree_respects_depth_and_leaf_size() {
        let rows: Vec<FeatureRow> = (0..16).map(|i| row(i as f32)).collect();
        let grads: Vec<f32> = (0..16).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let hess = vec![1.0; 16];
        let tree = RegressionTree::fit(
            &rows,
            &grads,
            &hess,
            TreeParams {
                max_depth: 2,
                min_samples_leaf: 4,
            },
        );
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_constant_gradients_give_single_leaf() {
        let rows = vec![row(0.0), row(1.0)];
        let tree = RegressionTree::fit(&rows, &[0.5, 0.5], &[1.0, 1.0], PARAMS);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_lambdas_push_relevant_up() {
        // one group, relevant doc currently ranked last
        let labels = [0.0, 0.0, 3.0];
        let scores = [0.9, 0.5, 0.1];
        let mut g = [0.0; 3];
        let mut h = [0.0; 3];
        lambda_gradients(&labels, &scores, &[0..3], 10, &mut g, &mut h);
        assert!(g[2] > 0.0);
        assert!(g[0] < 0.0);
        assert!((g.iter().sum::<f32>()).abs() < 1e-6);
        assert!(h.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_lambdas_zero_for_uniform_labels() {
        let mut g = [1.0; 3];
        let mut h = [1.0; 3];
        lambda_gradients(&[2.0; 3], &[0.3, 0.2, 0.1], &[0..3], 10, &mut g, &mut h);
        assert_eq!(g, [0.0; 3]);
        assert_eq!(h, [0.0; 3]);
    }

    #[test]
    fn test_ensemble_validation() {
        let empty = LambdaMart::new(0.1);
        assert!(empty.validate().is_err());

        let mut model = LambdaMart::new(0.1);
        model.push_tree(RegressionTree::fit(&[row(0.0), row(1.0)], &[-1.0, 1.0], &[1.0, 1.0], PARAMS));
        assert!(model.validate().is_ok());
        assert!(model.predict(&row(1.0)) > model.predict(&row(0.0)));
        assert_eq!(model.feature_importance()[0].0, "semantic_score");
    }
}
