//! K-nearest-neighbors models.
//!
//! Fitting stores the training data; prediction votes (classification) or
//! averages (regression) over the five nearest rows by Euclidean distance.

use serde::{Deserialize, Serialize};

use crate::algorithm::euclidean_distance;
use crate::error::{Result, TabmlError};

const N_NEIGHBORS: usize = 5;

/// Indices of the `k` nearest training rows.
fn nearest(x: &[Vec<f64>], row: &[f64], k: usize) -> Vec<usize> {
    let mut distances: Vec<(f64, usize)> = x
        .iter()
        .enumerate()
        .map(|(i, point)| (euclidean_distance(point, row), i))
        .collect();
    distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    distances.truncate(k);
    distances.into_iter().map(|(_, i)| i).collect()
}

/// KNN classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    n_classes: usize,
    x: Vec<Vec<f64>>,
    y: Vec<usize>,
}

impl KnnClassifier {
    pub fn new() -> Self {
        KnnClassifier {
            n_classes: 0,
            x: Vec::new(),
            y: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TabmlError::algorithm(
                "knn requires a non-empty feature matrix matching the target length",
            ));
        }
        self.n_classes = n_classes;
        self.x = x.to_vec();
        self.y = y.to_vec();
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> usize {
        crate::algorithm::tree::argmax(&self.predict_proba(row))
    }

    /// Vote fractions over the neighbor set.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut votes = vec![0.0; self.n_classes];
        let k = N_NEIGHBORS.min(self.x.len());
        if k == 0 {
            return votes;
        }
        for i in nearest(&self.x, row, k) {
            if self.y[i] < votes.len() {
                votes[self.y[i]] += 1.0;
            }
        }
        for vote in &mut votes {
            *vote /= k as f64;
        }
        votes
    }
}

impl Default for KnnClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// KNN regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnRegressor {
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
}

impl KnnRegressor {
    pub fn new() -> Self {
        KnnRegressor {
            x: Vec::new(),
            y: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TabmlError::algorithm(
                "knn requires a non-empty feature matrix matching the target length",
            ));
        }
        self.x = x.to_vec();
        self.y = y.to_vec();
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let k = N_NEIGHBORS.min(self.x.len());
        if k == 0 {
            return 0.0;
        }
        nearest(&self.x, row, k)
            .into_iter()
            .map(|i| self.y[i])
            .sum::<f64>()
            / k as f64
    }
}

impl Default for KnnRegressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_votes() {
        let x = vec![
            vec![0.0],
            vec![0.1],
            vec![0.2],
            vec![10.0],
            vec![10.1],
            vec![10.2],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];

        let mut model = KnnClassifier::new();
        model.fit(&x, &y, 2).unwrap();

        assert_eq!(model.predict_row(&[0.05]), 0);
        assert_eq!(model.predict_row(&[10.05]), 1);

        let proba = model.predict_proba(&[0.05]);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(proba[0] > proba[1]);
    }

    #[test]
    fn test_regressor_averages_neighbors() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();

        let mut model = KnnRegressor::new();
        model.fit(&x, &y).unwrap();

        // Neighbors of 4.5 are 3, 4, 5 plus two of 2/6.
        let prediction = model.predict_row(&[4.5]);
        assert!((prediction - 4.5).abs() < 1.5);
    }

    #[test]
    fn test_fewer_rows_than_k() {
        let x = vec![vec![1.0], vec![2.0]];
        let y = vec![0, 1];
        let mut model = KnnClassifier::new();
        model.fit(&x, &y, 2).unwrap();
        assert_eq!(model.predict_row(&[1.1]), 0);
    }
}
