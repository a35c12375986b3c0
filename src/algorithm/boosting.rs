//! Gradient boosting over shallow CART trees.
//!
//! Regression boosts on squared-error residuals from a mean baseline.
//! Classification boosts the logistic loss one-vs-rest: each class keeps its
//! own ensemble whose trees fit the probability residuals. Stage count and
//! depth are fixed, so every fit is bounded and deterministic.

use serde::{Deserialize, Serialize};

use crate::algorithm::tree::{Tree, TreeConfig, argmax};
use crate::error::{Result, TabmlError};

const N_STAGES: usize = 100;
const LEARNING_RATE: f64 = 0.1;
const STAGE_TREE_DEPTH: usize = 3;

fn stage_config() -> TreeConfig {
    let mut config = TreeConfig::regression();
    config.max_depth = STAGE_TREE_DEPTH;
    config
}

/// Gradient boosting regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    init: f64,
    trees: Vec<Tree>,
}

impl GradientBoostingRegressor {
    pub fn new() -> Self {
        GradientBoostingRegressor {
            init: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TabmlError::algorithm(
                "gradient boosting requires a non-empty feature matrix matching the target length",
            ));
        }

        self.init = y.iter().sum::<f64>() / y.len() as f64;
        self.trees = Vec::with_capacity(N_STAGES);

        let config = stage_config();
        let mut scores = vec![self.init; y.len()];

        for _ in 0..N_STAGES {
            let residuals: Vec<f64> = y
                .iter()
                .zip(&scores)
                .map(|(target, score)| target - score)
                .collect();
            let tree = Tree::fit(x, &residuals, &config)?;
            for (score, row) in scores.iter_mut().zip(x) {
                *score += LEARNING_RATE * tree.predict_value(row);
            }
            self.trees.push(tree);
        }

        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.init
            + LEARNING_RATE
                * self
                    .trees
                    .iter()
                    .map(|tree| tree.predict_value(row))
                    .sum::<f64>()
    }
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new()
    }
}

/// One boosted score function for a single class-vs-rest problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassEnsemble {
    init: f64,
    trees: Vec<Tree>,
}

impl ClassEnsemble {
    fn score(&self, row: &[f64]) -> f64 {
        self.init
            + LEARNING_RATE
                * self
                    .trees
                    .iter()
                    .map(|tree| tree.predict_value(row))
                    .sum::<f64>()
    }
}

/// Gradient boosting classifier (one-vs-rest logistic loss).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    n_classes: usize,
    ensembles: Vec<ClassEnsemble>,
}

impl GradientBoostingClassifier {
    pub fn new() -> Self {
        GradientBoostingClassifier {
            n_classes: 0,
            ensembles: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TabmlError::algorithm(
                "gradient boosting requires a non-empty feature matrix matching the target length",
            ));
        }
        if n_classes < 2 {
            return Err(TabmlError::algorithm(
                "gradient boosting classification requires at least two classes",
            ));
        }

        let config = stage_config();
        self.n_classes = n_classes;
        self.ensembles = Vec::with_capacity(n_classes);

        for class in 0..n_classes {
            let targets: Vec<f64> = y
                .iter()
                .map(|&label| if label == class { 1.0 } else { 0.0 })
                .collect();

            // Log-odds baseline, clamped away from degenerate priors.
            let positive = targets.iter().sum::<f64>() / targets.len() as f64;
            let prior = positive.clamp(1e-6, 1.0 - 1e-6);
            let init = (prior / (1.0 - prior)).ln();

            let mut trees = Vec::with_capacity(N_STAGES);
            let mut scores = vec![init; targets.len()];

            for _ in 0..N_STAGES {
                let residuals: Vec<f64> = targets
                    .iter()
                    .zip(&scores)
                    .map(|(target, score)| target - sigmoid(*score))
                    .collect();
                let tree = Tree::fit(x, &residuals, &config)?;
                for (score, row) in scores.iter_mut().zip(x) {
                    *score += LEARNING_RATE * tree.predict_value(row);
                }
                trees.push(tree);
            }

            self.ensembles.push(ClassEnsemble { init, trees });
        }

        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }

    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let scores: Vec<f64> = self
            .ensembles
            .iter()
            .map(|ensemble| sigmoid(ensemble.score(row)))
            .collect();
        let total: f64 = scores.iter().sum();
        if total > 0.0 {
            scores.iter().map(|s| s / total).collect()
        } else {
            vec![1.0 / self.n_classes as f64; self.n_classes]
        }
    }
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
