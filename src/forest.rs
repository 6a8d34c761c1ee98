//! Random forest regressor built from CART regression trees.
//!
//! Each tree is grown on a bootstrap sample of the training rows, splitting
//! on whichever feature/threshold pair gives the largest reduction in squared
//! error. Predictions average the leaf values reached in every tree.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows each tree until its leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Node {
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

/// A single regression tree stored as a flat node arena; the root is node 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Checks that walking this tree with a row of `n_features` values stays
    /// in bounds and terminates. Children must come after their parent,
    /// which is how the builder lays them out and which rules out cycles.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("leaf {} holds {}", idx, value));
                }
                Node::Leaf { .. } => {}
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, n_features
                        ));
                    }
                    if let Some(child) = [left, right]
                        .into_iter()
                        .find(|&c| c <= idx || c >= self.nodes.len())
                    {
                        return Err(format!(
                            "node {} points at node {} ({} nodes)",
                            idx,
                            child,
                            self.nodes.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct TreeBuilder<'a> {
    columns: &'a [Vec<f64>],
    targets: &'a [f64],
    params: &'a ForestParams,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl<'a> TreeBuilder<'a> {
    fn build(mut self, samples: &mut [usize]) -> RegressionTree {
        self.grow(samples, 0);
        RegressionTree { nodes: self.nodes }
    }

    /// Grows the subtree for `samples` and returns the index of its root.
    fn grow(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let n = samples.len();
        let sum: f64 = samples.iter().map(|&i| self.targets[i]).sum();
        let mean = sum / n as f64;

        let depth_exhausted = self.params.max_depth.is_some_and(|max| depth >= max);
        let too_small = n < self.params.min_samples_split || n < 2 * self.params.min_samples_leaf;
        let pure = samples.iter().all(|&i| self.targets[i] == self.targets[samples[0]]);

        let split = if depth_exhausted || too_small || pure {
            None
        } else {
            self.best_split(samples, sum)
        };

        let Some(split) = split else {
            self.nodes.push(Node::Leaf { value: mean });
            return self.nodes.len() - 1;
        };

        let column = &self.columns[split.feature];
        let mid = partition(samples, |i| column[i] <= split.threshold);

        let idx = self.nodes.len();
        // Placeholder until both children exist.
        self.nodes.push(Node::Leaf { value: mean });
        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.grow(left_samples, depth + 1);
        let right = self.grow(right_samples, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    /// Finds the split maximising `sum_l^2/n_l + sum_r^2/n_r`, which is
    /// equivalent to minimising the children's total squared error.
    fn best_split(&self, samples: &[usize], total: f64) -> Option<BestSplit> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent_score = total * total / n as f64;
        let mut best: Option<BestSplit> = None;
        let mut order = samples.to_vec();

        for (feature, column) in self.columns.iter().enumerate() {
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut left_sum = 0.0;
            for pos in 1..n {
                left_sum += self.targets[order[pos - 1]];
                let (lo, hi) = (column[order[pos - 1]], column[order[pos]]);
                if pos < min_leaf || n - pos < min_leaf || lo == hi {
                    continue;
                }

                let n_left = pos as f64;
                let n_right = (n - pos) as f64;
                let right_sum = total - left_sum;
                let score = left_sum * left_sum / n_left + right_sum * right_sum / n_right;

                if score > parent_score && best.as_ref().map_or(true, |b| score > b.score) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi || !threshold.is_finite() {
                        threshold = lo;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        score,
                    });
                }
            }
        }

        best
    }
}

/// Reorders `items` so those matching `pred` come first; returns their count.
fn partition(items: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..items.len() {
        if pred(items[i]) {
            items.swap(mid, i);
            mid += 1;
        }
    }
    mid
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fits a forest on row-major `rows` against `targets`.
    ///
    /// Trees are grown in parallel, each from its own seed drawn up front
    /// from `params.seed`, so a given seed always yields the same forest.
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], params: &ForestParams) -> Result<Self, FitError> {
        if params.n_trees == 0 {
            return Err(FitError::NoTrees);
        }
        let Some(first) = rows.first() else {
            return Err(FitError::Empty);
        };
        if rows.len() != targets.len() {
            return Err(FitError::LengthMismatch {
                rows: rows.len(),
                targets: targets.len(),
            });
        }
        let n_features = first.len();
        if let Some((row, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_features) {
            return Err(FitError::RaggedRow {
                row,
                expected: n_features,
                actual: bad.len(),
            });
        }

        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|j| rows.iter().map(|r| r[j]).collect())
            .collect();

        let mut master = StdRng::seed_from_u64(params.seed);
        let tree_seeds: Vec<u64> = (0..params.n_trees).map(|_| master.gen()).collect();
        let n = rows.len();

        let trees = tree_seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                TreeBuilder {
                    columns: &columns,
                    targets,
                    params,
                    nodes: Vec::new(),
                }
                .build(&mut samples)
            })
            .collect();

        Ok(Self { trees, n_features })
    }

    /// Mean of the per-tree predictions for one row.
    pub fn predict(&self, row: &[f64]) -> f64 {
        debug_assert_eq!(row.len(), self.n_features);
        let total: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Rejects forests that could panic, loop or average over nothing at
    /// prediction time. Run on every forest read from outside the process.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| format!("tree {}: {}", t, e))?;
        }
        Ok(())
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

#[cfg(test)]
impl RandomForest {
    /// Assembles a forest directly from node arenas.
    pub(crate) fn from_nodes(trees: Vec<Vec<Node>>, n_features: usize) -> Self {
        Self {
            trees: trees.into_iter().map(|nodes| RegressionTree { nodes }).collect(),
            n_features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(feature: usize, left: usize, right: usize) -> Node {
        Node::Split {
            feature,
            threshold: 0.5,
            left,
            right,
        }
    }

    fn leaf(value: f64) -> Node {
        Node::Leaf { value }
    }

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y jumps from 1 to 5 at x0 = 10; x1 is noise.
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![i as f64 / 2.0, ((i * 7) % 11) as f64])
            .collect();
        let targets = rows
            .iter()
            .map(|r| if r[0] < 10.0 { 1.0 } else { 5.0 })
            .collect();
        (rows, targets)
    }

    #[test]
    fn single_tree_learns_a_step() {
        let (rows, targets) = step_data();
        let params = ForestParams {
            n_trees: 1,
            ..Default::default()
        };
        let forest = RandomForest::fit(&rows, &targets, &params).unwrap();

        assert_eq!(forest.predict(&[2.0, 3.0]), 1.0);
        assert_eq!(forest.predict(&[15.0, 3.0]), 5.0);
    }

    #[test]
    fn forest_averages_to_sensible_values() {
        let (rows, targets) = step_data();
        let forest = RandomForest::fit(&rows, &targets, &ForestParams::default()).unwrap();

        assert_eq!(forest.trees().len(), 100);
        assert!((forest.predict(&[1.0, 0.0]) - 1.0).abs() < 0.5);
        assert!((forest.predict(&[18.0, 0.0]) - 5.0).abs() < 0.5);
    }

    #[test]
    fn same_seed_gives_identical_forest() {
        let (rows, targets) = step_data();
        let params = ForestParams {
            n_trees: 8,
            ..Default::default()
        };
        let a = RandomForest::fit(&rows, &targets, &params).unwrap();
        let b = RandomForest::fit(&rows, &targets, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn max_depth_caps_tree_depth() {
        let rows: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();
        let params = ForestParams {
            n_trees: 3,
            max_depth: Some(2),
            ..Default::default()
        };
        let forest = RandomForest::fit(&rows, &targets, &params).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn constant_target_yields_single_leaf() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets = vec![3.0; 10];
        let params = ForestParams {
            n_trees: 2,
            ..Default::default()
        };
        let forest = RandomForest::fit(&rows, &targets, &params).unwrap();
        assert!(forest.trees().iter().all(|t| t.node_count() == 1));
        assert_eq!(forest.predict(&[100.0]), 3.0);
    }

    #[test]
    fn malformed_input_is_rejected() {
        let params = ForestParams::default();
        assert_eq!(RandomForest::fit(&[], &[], &params), Err(FitError::Empty));
        assert_eq!(
            RandomForest::fit(&[vec![1.0]], &[1.0, 2.0], &params),
            Err(FitError::LengthMismatch {
                rows: 1,
                targets: 2
            })
        );
        assert_eq!(
            RandomForest::fit(&[vec![1.0, 2.0], vec![1.0]], &[1.0, 2.0], &params),
            Err(FitError::RaggedRow {
                row: 1,
                expected: 2,
                actual: 1
            })
        );
        let no_trees = ForestParams {
            n_trees: 0,
            ..Default::default()
        };
        assert_eq!(
            RandomForest::fit(&[vec![1.0]], &[1.0], &no_trees),
            Err(FitError::NoTrees)
        );
    }

    #[test]
    fn fitted_forest_is_valid() {
        let (rows, targets) = step_data();
        let params = ForestParams {
            n_trees: 4,
            ..Default::default()
        };
        let forest = RandomForest::fit(&rows, &targets, &params).unwrap();
        assert_eq!(forest.validate(), Ok(()));

        let hand_built = RandomForest::from_nodes(vec![vec![split(1, 1, 2), leaf(1.0), leaf(2.0)]], 2);
        assert_eq!(hand_built.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_unwalkable_trees() {
        let cases = [
            (Vec::new(), "no trees"),
            (vec![vec![]], "no nodes"),
            (vec![vec![split(0, 7, 7), leaf(1.0)]], "points at node 7"),
            (vec![vec![split(99, 1, 2), leaf(1.0), leaf(2.0)]], "feature 99"),
            (vec![vec![split(0, 0, 1), leaf(1.0)]], "points at node 0"),
            (vec![vec![leaf(1.0), split(0, 0, 0)]], "points at node 0"),
            (vec![vec![leaf(f64::NAN)]], "holds NaN"),
        ];
        for (trees, expected) in cases {
            let err = RandomForest::from_nodes(trees, 2).validate().unwrap_err();
            assert!(err.contains(expected), "{:?} does not mention {:?}", err, expected);
        }
    }

    #[test]
    fn partition_moves_matches_to_front() {
        let mut items = vec![5, 1, 8, 2, 9, 3];
        let mid = partition(&mut items, |v| v < 4);
        assert_eq!(mid, 3);
        assert!(items[..mid].iter().all(|&v| v < 4));
        assert!(items[mid..].iter().all(|&v| v >= 4));
    }
}
