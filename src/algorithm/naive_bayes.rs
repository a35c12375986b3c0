//! Gaussian naive Bayes classifier.
//!
//! Per-class feature means and variances with variance smoothing;
//! likelihoods are combined in the log domain and exponentiated with a
//! max-shift for stable probabilities.

use serde::{Deserialize, Serialize};

use crate::algorithm::tree::argmax;
use crate::error::{Result, TabmlError};

const VAR_SMOOTHING: f64 = 1e-9;

/// Gaussian naive Bayes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNb {
    priors: Vec<f64>,
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
}

impl GaussianNb {
    pub fn new() -> Self {
        GaussianNb {
            priors: Vec::new(),
            means: Vec::new(),
            variances: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TabmlError::algorithm(
                "naive bayes requires a non-empty feature matrix matching the target length",
            ));
        }

        let d = x[0].len();
        let mut counts = vec![0usize; n_classes];
        let mut means = vec![vec![0.0; d]; n_classes];
        let mut variances = vec![vec![0.0; d]; n_classes];

        for (row, &class) in x.iter().zip(y) {
            counts[class] += 1;
            for (mean, value) in means[class].iter_mut().zip(row) {
                *mean += value;
            }
        }
        for (class, count) in counts.iter().enumerate() {
            if *count > 0 {
                for mean in &mut means[class] {
                    *mean /= *count as f64;
                }
            }
        }

        for (row, &class) in x.iter().zip(y) {
            for ((variance, mean), value) in
                variances[class].iter_mut().zip(&means[class]).zip(row)
            {
                let delta = value - mean;
                *variance += delta * delta;
            }
        }

        // Smoothing relative to the largest feature variance, so constant
        // features never produce a zero denominator.
        let max_variance = variances
            .iter()
            .flatten()
            .fold(0.0f64, |acc, &v| acc.max(v));
        let smoothing = VAR_SMOOTHING * max_variance.max(1.0);

        for (class, count) in counts.iter().enumerate() {
            if *count > 0 {
                for variance in &mut variances[class] {
                    *variance = *variance / *count as f64 + smoothing;
                }
            } else {
                for variance in &mut variances[class] {
                    *variance = smoothing;
                }
            }
        }

        let n = x.len() as f64;
        self.priors = counts.iter().map(|&c| c as f64 / n).collect();
        self.means = means;
        self.variances = variances;
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }

    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let log_posteriors: Vec<f64> = (0..self.priors.len())
            .map(|class| self.log_posterior(class, row))
            .collect();

        let max = log_posteriors
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let exp: Vec<f64> = log_posteriors.iter().map(|&lp| (lp - max).exp()).collect();
        let total: f64 = exp.iter().sum();
        if total > 0.0 {
            exp.iter().map(|e| e / total).collect()
        } else {
            vec![1.0 / exp.len().max(1) as f64; exp.len()]
        }
    }

    fn log_posterior(&self, class: usize, row: &[f64]) -> f64 {
        if self.priors[class] == 0.0 {
            return f64::NEG_INFINITY;
        }
        let mut log_p = self.priors[class].ln();
        for ((value, mean), variance) in row
            .iter()
            .zip(&self.means[class])
            .zip(&self.variances[class])
        {
            let delta = value - mean;
            log_p += -0.5 * (2.0 * std::f64::consts::PI * variance).ln()
                - delta * delta / (2.0 * variance);
        }
        log_p
    }
}

impl Default for GaussianNb {
    fn default() -> Self {
        Self::new()
    }
}
