//! Bagged regression-tree ensemble.
//!
//! Each tree is grown on a bootstrap sample of the training rows with CART
//! variance-reduction splits over every feature. Tree `t` draws its sample from
//! an RNG seeded with `seed + t`, so trees can be grown in parallel and the
//! forest is still a pure function of (data, params).

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::ForestParams;
use crate::error::FitError;
use crate::models::model::check_design;

/// Minimum SSE reduction for a split to be accepted.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub n_features: usize,
    pub params: ForestParams,
    pub trees: Vec<RegressionTree>,
}

impl ForestModel {
    pub fn fit(rows: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<Self, FitError> {
        let width = check_design(rows, y)?;
        if params.n_trees == 0 {
            return Err(FitError::InvalidParams("tree count must be > 0".to_string()));
        }
        if params.min_leaf == 0 {
            return Err(FitError::InvalidParams("minimum leaf size must be > 0".to_string()));
        }

        let n = rows.len();
        let trees: Vec<RegressionTree> = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::grow(rows, y, sample, params)
            })
            .collect();

        Ok(Self {
            n_features: width,
            params: *params,
            trees,
        })
    }

    /// Mean of the tree predictions. NaN for a forest with no trees.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        sum / self.trees.len() as f64
    }

    /// Structural check for a forest read back from disk.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest model has no trees".to_string());
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features).map_err(|e| format!("tree {t}: {e}"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "lowercase")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitChoice {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    fn grow(rows: &[Vec<f64>], y: &[f64], sample: Vec<usize>, params: &ForestParams) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(rows, y, sample, 0, params);
        tree
    }

    fn build(&mut self, rows: &[Vec<f64>], y: &[f64], idx: Vec<usize>, depth: usize, params: &ForestParams) -> usize {
        let id = self.nodes.len();
        let mean = idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64;
        self.nodes.push(Node::Leaf { value: mean });

        if depth >= params.max_depth || idx.len() < 2 * params.min_leaf {
            return id;
        }
        let Some(split) = best_split(rows, y, &idx, params.min_leaf) else {
            return id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
            .iter()
            .partition(|&&i| rows[i][split.feature] <= split.threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return id;
        }

        let left = self.build(rows, y, left_idx, depth + 1, params);
        let right = self.build(rows, y, right_idx, depth + 1, params);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let Some(&x) = row.get(*feature) else {
                        return f64::NAN;
                    };
                    id = if x <= *threshold { *left } else { *right };
                }
                None => return f64::NAN,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Children must point forward and stay in bounds, so `predict` always
    /// reaches a leaf. Split features must be below `n_features`.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".to_string());
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("node {id} has a non-finite leaf value"));
                }
                Node::Leaf { .. } => {}
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= n_features {
                        return Err(format!(
                            "node {id} splits on feature {feature} but the model has {n_features}"
                        ));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {id} has a NaN threshold"));
                    }
                    for child in [left, right] {
                        if child <= id || child >= self.nodes.len() {
                            return Err(format!("node {id} has invalid child index {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Best variance-reduction split over all features, scanning sorted values with
/// running sums. Ties keep the first candidate found (lowest feature, lowest value).
fn best_split(rows: &[Vec<f64>], y: &[f64], idx: &[usize], min_leaf: usize) -> Option<SplitChoice> {
    let n = idx.len();
    let total_sum: f64 = idx.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = idx.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;
    if parent_sse <= MIN_GAIN {
        return None;
    }

    let width = rows[idx[0]].len();
    let mut order = idx.to_vec();
    let mut best: Option<SplitChoice> = None;

    for feature in 0..width {
        order.sort_by(|&a, &b| {
            rows[a][feature]
                .partial_cmp(&rows[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..n - 1 {
            let i = order[k];
            left_sum += y[i];
            left_sq += y[i] * y[i];

            let n_left = k + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let x_here = rows[i][feature];
            let x_next = rows[order[k + 1]][feature];
            if x_next <= x_here {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left as f64)
                + (right_sq - right_sum * right_sum / n_right as f64);
            let gain = parent_sse - sse;
            if gain > MIN_GAIN && best.is_none_or(|b| gain > b.gain) {
                best = Some(SplitChoice {
                    feature,
                    threshold: 0.5 * (x_here + x_next),
                    gain,
                });
            }
        }
    }

    best
}
