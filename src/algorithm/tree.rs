//! CART decision trees for classification and regression.
//!
//! One shared tree core handles both tasks: gini impurity with per-leaf
//! class histograms for classification, variance reduction with per-leaf
//! means for regression. The random forest and gradient boosting ensembles
//! build on the same core.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabmlError};

/// Depth bound applied when a caller does not override it.
const DEFAULT_MAX_DEPTH: usize = 20;
const DEFAULT_MIN_SAMPLES_SPLIT: usize = 2;

/// Split quality measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum SplitCriterion {
    Gini,
    Variance,
}

/// Tree growth parameters.
#[derive(Debug, Clone)]
pub(crate) struct TreeConfig {
    pub criterion: SplitCriterion,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub n_classes: usize,
    /// Candidate feature indices; `None` means all features.
    pub features: Option<Vec<usize>>,
}

impl TreeConfig {
    pub fn classification(n_classes: usize) -> Self {
        TreeConfig {
            criterion: SplitCriterion::Gini,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_split: DEFAULT_MIN_SAMPLES_SPLIT,
            n_classes,
            features: None,
        }
    }

    pub fn regression() -> Self {
        TreeConfig {
            criterion: SplitCriterion::Variance,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_split: DEFAULT_MIN_SAMPLES_SPLIT,
            n_classes: 0,
            features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeNode {
    /// Feature index for the split; -1 marks a leaf.
    feature: i32,
    threshold: f64,
    /// Leaf prediction value (mean target for regression, unused for
    /// classification leaves).
    value: f64,
    /// Leaf class histogram; empty for regression trees.
    class_counts: Vec<f64>,
    left: Option<Box<TreeNode>>,
    right: Option<Box<TreeNode>>,
}

/// A fitted CART tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Tree {
    root: Option<Box<TreeNode>>,
    n_classes: usize,
}

impl Tree {
    /// Fit a tree on targets given as `f64` (class ids are cast by the
    /// classification wrappers).
    pub fn fit(x: &[Vec<f64>], y: &[f64], config: &TreeConfig) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TabmlError::algorithm(
                "decision tree requires a non-empty feature matrix matching the target length",
            ));
        }

        let indices: Vec<usize> = (0..x.len()).collect();
        let root = build_node(x, y, &indices, 0, config);
        Ok(Tree {
            root,
            n_classes: config.n_classes,
        })
    }

    /// Predicted value for one row (regression or raw leaf mean).
    pub fn predict_value(&self, row: &[f64]) -> f64 {
        match self.leaf_for(row) {
            Some(leaf) => leaf.value,
            None => 0.0,
        }
    }

    /// Leaf class distribution for one row, normalized to sum to one.
    pub fn predict_distribution(&self, row: &[f64]) -> Vec<f64> {
        let mut distribution = vec![0.0; self.n_classes];
        if let Some(leaf) = self.leaf_for(row) {
            let total: f64 = leaf.class_counts.iter().sum();
            if total > 0.0 {
                for (slot, count) in distribution.iter_mut().zip(&leaf.class_counts) {
                    *slot = count / total;
                }
            }
        }
        distribution
    }

    fn leaf_for(&self, row: &[f64]) -> Option<&TreeNode> {
        let mut node = self.root.as_deref()?;
        loop {
            if node.feature < 0 {
                return Some(node);
            }
            let value = row.get(node.feature as usize).copied().unwrap_or(0.0);
            node = if value <= node.threshold {
                node.left.as_deref()?
            } else {
                node.right.as_deref()?
            };
        }
    }
}

fn build_node(
    x: &[Vec<f64>],
    y: &[f64],
    indices: &[usize],
    depth: usize,
    config: &TreeConfig,
) -> Option<Box<TreeNode>> {
    if indices.is_empty() {
        return None;
    }

    let stop = depth >= config.max_depth
        || indices.len() < config.min_samples_split
        || is_pure(y, indices);

    if !stop {
        if let Some((feature, threshold, left_indices, right_indices)) =
            find_best_split(x, y, indices, config)
        {
            let left = build_node(x, y, &left_indices, depth + 1, config);
            let right = build_node(x, y, &right_indices, depth + 1, config);
            if let (Some(left), Some(right)) = (left, right) {
                return Some(Box::new(TreeNode {
                    feature: feature as i32,
                    threshold,
                    value: 0.0,
                    class_counts: Vec::new(),
                    left: Some(left),
                    right: Some(right),
                }));
            }
        }
    }

    Some(Box::new(make_leaf(y, indices, config)))
}

fn make_leaf(y: &[f64], indices: &[usize], config: &TreeConfig) -> TreeNode {
    let mut class_counts = Vec::new();
    let mut value = 0.0;

    match config.criterion {
        SplitCriterion::Gini => {
            class_counts = vec![0.0; config.n_classes];
            for &i in indices {
                let class = y[i] as usize;
                if class < class_counts.len() {
                    class_counts[class] += 1.0;
                }
            }
        }
        SplitCriterion::Variance => {
            value = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
        }
    }

    TreeNode {
        feature: -1,
        threshold: 0.0,
        value,
        class_counts,
        left: None,
        right: None,
    }
}

fn is_pure(y: &[f64], indices: &[usize]) -> bool {
    let first = y[indices[0]];
    indices.iter().all(|&i| y[i] == first)
}

/// Find the split minimizing weighted child impurity. Returns the feature,
/// threshold, and the two index partitions, or `None` when every candidate
/// feature is constant over the node.
fn find_best_split(
    x: &[Vec<f64>],
    y: &[f64],
    indices: &[usize],
    config: &TreeConfig,
) -> Option<(usize, f64, Vec<usize>, Vec<usize>)> {
    let n_features = x[0].len();
    let all_features: Vec<usize>;
    let candidates: &[usize] = match &config.features {
        Some(subset) => subset,
        None => {
            all_features = (0..n_features).collect();
            &all_features
        }
    };

    let mut best_impurity = f64::INFINITY;
    let mut best: Option<(usize, f64, usize)> = None; // feature, threshold, split position

    for &feature in candidates {
        let mut values: Vec<(f64, usize)> =
            indices.iter().map(|&i| (x[i][feature], i)).collect();
        values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        match config.criterion {
            SplitCriterion::Gini => {
                let mut left_counts = vec![0.0f64; config.n_classes];
                let mut right_counts = vec![0.0f64; config.n_classes];
                for &(_, i) in &values {
                    let class = y[i] as usize;
                    if class < right_counts.len() {
                        right_counts[class] += 1.0;
                    }
                }

                for split in 1..values.len() {
                    let class = y[values[split - 1].1] as usize;
                    if class < left_counts.len() {
                        left_counts[class] += 1.0;
                        right_counts[class] -= 1.0;
                    }
                    if values[split].0 == values[split - 1].0 {
                        continue;
                    }
                    let impurity = weighted_gini(&left_counts, split as f64)
                        + weighted_gini(&right_counts, (values.len() - split) as f64);
                    if impurity < best_impurity {
                        best_impurity = impurity;
                        let threshold = (values[split - 1].0 + values[split].0) / 2.0;
                        best = Some((feature, threshold, split));
                    }
                }
            }
            SplitCriterion::Variance => {
                let mut left_sum = 0.0;
                let mut left_sq = 0.0;
                let mut right_sum: f64 = values.iter().map(|&(_, i)| y[i]).sum();
                let mut right_sq: f64 = values.iter().map(|&(_, i)| y[i] * y[i]).sum();

                for split in 1..values.len() {
                    let target = y[values[split - 1].1];
                    left_sum += target;
                    left_sq += target * target;
                    right_sum -= target;
                    right_sq -= target * target;
                    if values[split].0 == values[split - 1].0 {
                        continue;
                    }
                    let impurity = sse(left_sq, left_sum, split as f64)
                        + sse(right_sq, right_sum, (values.len() - split) as f64);
                    if impurity < best_impurity {
                        best_impurity = impurity;
                        let threshold = (values[split - 1].0 + values[split].0) / 2.0;
                        best = Some((feature, threshold, split));
                    }
                }
            }
        }
    }

    let (feature, threshold, _) = best?;
    let mut left_indices = Vec::new();
    let mut right_indices = Vec::new();
    for &i in indices {
        if x[i][feature] <= threshold {
            left_indices.push(i);
        } else {
            right_indices.push(i);
        }
    }
    if left_indices.is_empty() || right_indices.is_empty() {
        return None;
    }
    Some((feature, threshold, left_indices, right_indices))
}

/// `n * gini` for a class histogram, expressed so the weighted sum over
/// children can be compared directly.
fn weighted_gini(counts: &[f64], n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    let sum_sq: f64 = counts.iter().map(|c| c * c).sum();
    n * (1.0 - sum_sq / (n * n))
}

/// Sum of squared errors around the mean, from running sums.
fn sse(sum_sq: f64, sum: f64, n: f64) -> f64 {
    if n == 0.0 { 0.0 } else { sum_sq - sum * sum / n }
}

/// Decision tree classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    tree: Option<Tree>,
}

impl DecisionTreeClassifier {
    pub fn new() -> Self {
        DecisionTreeClassifier { tree: None }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<()> {
        let targets: Vec<f64> = y.iter().map(|&c| c as f64).collect();
        self.tree = Some(Tree::fit(x, &targets, &TreeConfig::classification(n_classes))?);
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }

    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        match &self.tree {
            Some(tree) => tree.predict_distribution(row),
            None => Vec::new(),
        }
    }
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Decision tree regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    tree: Option<Tree>,
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        DecisionTreeRegressor { tree: None }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.tree = Some(Tree::fit(x, y, &TreeConfig::regression())?);
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        match &self.tree {
            Some(tree) => tree.predict_value(row),
            None => 0.0,
        }
    }
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the largest value; ties resolve to the smallest index.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (index, &value) in values.iter().enumerate() {
        if value > best_value {
            best_value = value;
            best = index;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_separable_data() {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.2, 0.1],
            vec![0.1, 0.3],
            vec![5.0, 5.0],
            vec![5.2, 4.9],
            vec![4.8, 5.1],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];

        let mut model = DecisionTreeClassifier::new();
        model.fit(&x, &y, 2).unwrap();

        for (row, &label) in x.iter().zip(&y) {
            assert_eq!(model.predict_row(row), label);
        }

        let proba = model.predict_proba(&[0.1, 0.1]);
        assert_eq!(proba.len(), 2);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(proba[0] > proba[1]);
    }

    #[test]
    fn test_regressor_step_function() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 1.0 } else { 9.0 }).collect();

        let mut model = DecisionTreeRegressor::new();
        model.fit(&x, &y).unwrap();

        assert!((model.predict_row(&[2.0]) - 1.0).abs() < 1e-9);
        assert!((model.predict_row(&[8.0]) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_fit_is_error() {
        let mut model = DecisionTreeClassifier::new();
        assert!(model.fit(&[], &[], 2).is_err());
    }

    #[test]
    fn test_constant_features_fall_back_to_leaf() {
        let x = vec![vec![1.0], vec![1.0], vec![1.0], vec![1.0]];
        let y = vec![0, 1, 0, 1];
        let mut model = DecisionTreeClassifier::new();
        model.fit(&x, &y, 2).unwrap();
        // No split possible; the tree still answers with the majority class.
        let prediction = model.predict_row(&[1.0]);
        assert!(prediction < 2);
    }

    #[test]
    fn test_argmax_tie_takes_smallest_index() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
    }
}
