//! Random forests built from bootstrap-sampled CART trees.
//!
//! Each tree draws a bootstrap sample and a per-tree feature subset from a
//! seeded RNG, so two fits over the same data are identical. Classification
//! averages the per-tree leaf distributions; regression averages the leaf
//! means.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::algorithm::tree::{Tree, TreeConfig, argmax};
use crate::error::{Result, TabmlError};

const N_ESTIMATORS: usize = 100;

/// Random forest classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    seed: u64,
    n_classes: usize,
    trees: Vec<Tree>,
}

impl RandomForestClassifier {
    pub fn new(seed: u64) -> Self {
        RandomForestClassifier {
            seed,
            n_classes: 0,
            trees: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<()> {
        let targets: Vec<f64> = y.iter().map(|&c| c as f64).collect();
        self.n_classes = n_classes;
        self.trees = fit_ensemble(
            x,
            &targets,
            self.seed,
            TreeConfig::classification(n_classes),
            |d| (d as f64).sqrt().ceil() as usize,
        )?;
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }

    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut distribution = vec![0.0; self.n_classes];
        if self.trees.is_empty() {
            return distribution;
        }
        for tree in &self.trees {
            for (slot, p) in distribution.iter_mut().zip(tree.predict_distribution(row)) {
                *slot += p;
            }
        }
        for slot in &mut distribution {
            *slot /= self.trees.len() as f64;
        }
        distribution
    }
}

/// Random forest regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    seed: u64,
    trees: Vec<Tree>,
}

impl RandomForestRegressor {
    pub fn new(seed: u64) -> Self {
        RandomForestRegressor {
            seed,
            trees: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        self.trees = fit_ensemble(x, y, self.seed, TreeConfig::regression(), |d| {
            (d / 3).max(1)
        })?;
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees
            .iter()
            .map(|tree| tree.predict_value(row))
            .sum::<f64>()
            / self.trees.len() as f64
    }
}

/// Fit the bootstrap ensemble shared by both forests. `subset_size` maps the
/// feature count to the per-tree candidate count.
fn fit_ensemble(
    x: &[Vec<f64>],
    y: &[f64],
    seed: u64,
    base_config: TreeConfig,
    subset_size: fn(usize) -> usize,
) -> Result<Vec<Tree>> {
    if x.is_empty() || x.len() != y.len() {
        return Err(TabmlError::algorithm(
            "random forest requires a non-empty feature matrix matching the target length",
        ));
    }

    let n = x.len();
    let d = x[0].len();
    let k = subset_size(d).min(d).max(1);
    let mut trees = Vec::with_capacity(N_ESTIMATORS);

    for t in 0..N_ESTIMATORS {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));

        let mut sample_x = Vec::with_capacity(n);
        let mut sample_y = Vec::with_capacity(n);
        for _ in 0..n {
            let i = rng.random_range(0..n);
            sample_x.push(x[i].clone());
            sample_y.push(y[i]);
        }

        let mut config = base_config.clone();
        config.features = Some(index::sample(&mut rng, d, k).into_vec());
        trees.push(Tree::fit(&sample_x, &sample_y, &config)?);
    }

    Ok(trees)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..10 {
            x.push(vec![i as f64 * 0.1, i as f64 * 0.05]);
            y.push(0);
            x.push(vec![5.0 + i as f64 * 0.1, 5.0 + i as f64 * 0.05]);
            y.push(1);
        }
        (x, y)
    }

    #[test]
    fn test_classifier_separable() {
        let (x, y) = blobs();
        let mut model = RandomForestClassifier::new(42);
        model.fit(&x, &y, 2).unwrap();

        assert_eq!(model.predict_row(&[0.2, 0.1]), 0);
        assert_eq!(model.predict_row(&[5.4, 5.2]), 1);

        let proba = model.predict_proba(&[0.2, 0.1]);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs();
        let mut first = RandomForestClassifier::new(42);
        first.fit(&x, &y, 2).unwrap();
        let mut second = RandomForestClassifier::new(42);
        second.fit(&x, &y, 2).unwrap();

        for point in [[0.3, 0.2], [4.9, 5.3], [2.5, 2.5]] {
            assert_eq!(first.predict_proba(&point), second.predict_proba(&point));
        }
    }

    #[test]
    fn test_regressor_tracks_mean() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| i as f64 * 2.0).collect();

        let mut model = RandomForestRegressor::new(42);
        model.fit(&x, &y).unwrap();

        let prediction = model.predict_row(&[10.0]);
        assert!((prediction - 20.0).abs() < 5.0);
    }
}
