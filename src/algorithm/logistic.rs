//! Logistic regression classifier.
//!
//! One-vs-rest binary models fitted by full-batch gradient descent with a
//! small L2 penalty and a fixed iteration bound. Probabilities are the
//! per-class sigmoid scores normalized to sum to one.

use serde::{Deserialize, Serialize};

use crate::algorithm::tree::argmax;
use crate::error::{Result, TabmlError};

const MAX_ITER: usize = 1000;
const LEARNING_RATE: f64 = 0.1;
const L2_PENALTY: f64 = 1e-4;
const GRADIENT_TOLERANCE: f64 = 1e-6;

/// One-vs-rest logistic regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// One weight vector per class.
    weights: Vec<Vec<f64>>,
    /// One intercept per class.
    intercepts: Vec<f64>,
}

impl LogisticRegression {
    pub fn new() -> Self {
        LogisticRegression {
            weights: Vec::new(),
            intercepts: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TabmlError::algorithm(
                "logistic regression requires a non-empty feature matrix matching the target length",
            ));
        }
        if n_classes < 2 {
            return Err(TabmlError::algorithm(
                "logistic regression requires at least two classes",
            ));
        }

        let d = x[0].len();
        self.weights = Vec::with_capacity(n_classes);
        self.intercepts = Vec::with_capacity(n_classes);

        for class in 0..n_classes {
            let targets: Vec<f64> = y
                .iter()
                .map(|&label| if label == class { 1.0 } else { 0.0 })
                .collect();
            let (weights, intercept) = fit_binary(x, &targets, d);
            self.weights.push(weights);
            self.intercepts.push(intercept);
        }

        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }

    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let scores: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.intercepts)
            .map(|(weights, intercept)| sigmoid(dot(weights, row) + intercept))
            .collect();

        let total: f64 = scores.iter().sum();
        if total > 0.0 {
            scores.iter().map(|s| s / total).collect()
        } else {
            vec![1.0 / scores.len() as f64; scores.len()]
        }
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

/// Full-batch gradient descent for one binary problem.
fn fit_binary(x: &[Vec<f64>], targets: &[f64], d: usize) -> (Vec<f64>, f64) {
    let n = x.len() as f64;
    let mut weights = vec![0.0; d];
    let mut intercept = 0.0;

    for _ in 0..MAX_ITER {
        let mut gradient = vec![0.0; d];
        let mut intercept_gradient = 0.0;

        for (row, &target) in x.iter().zip(targets) {
            let error = sigmoid(dot(&weights, row) + intercept) - target;
            for (g, value) in gradient.iter_mut().zip(row) {
                *g += error * value;
            }
            intercept_gradient += error;
        }

        let mut gradient_norm = 0.0;
        for (g, w) in gradient.iter_mut().zip(&weights) {
            *g = *g / n + L2_PENALTY * w;
            gradient_norm += *g * *g;
        }
        intercept_gradient /= n;
        gradient_norm += intercept_gradient * intercept_gradient;

        for (w, g) in weights.iter_mut().zip(&gradient) {
            *w -= LEARNING_RATE * g;
        }
        intercept -= LEARNING_RATE * intercept_gradient;

        if gradient_norm.sqrt() < GRADIENT_TOLERANCE {
            break;
        }
    }

    (weights, intercept)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
