//! Clustering algorithms: k-means, DBSCAN, agglomerative, Gaussian mixture,
//! and mean shift.
//!
//! All fit on the full feature matrix and label every row; k-means, GMM and
//! mean shift can also assign new rows to their learned centers. Labels are
//! `i64` with −1 reserved for DBSCAN noise.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::algorithm::euclidean_distance;
use crate::error::{Result, TabmlError};

const KMEANS_MAX_ITER: usize = 300;
const KMEANS_TOLERANCE: f64 = 1e-4;
const GMM_MAX_ITER: usize = 100;
const GMM_TOLERANCE: f64 = 1e-3;
const GMM_VARIANCE_FLOOR: f64 = 1e-6;
const MEAN_SHIFT_MAX_ITER: usize = 300;
const MEAN_SHIFT_QUANTILE: f64 = 0.3;

/// K-means with k-means++ initialization and Lloyd iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    n_clusters: usize,
    seed: u64,
    centroids: Vec<Vec<f64>>,
}

impl KMeans {
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        KMeans {
            n_clusters,
            seed,
            centroids: Vec::new(),
        }
    }

    pub fn fit_predict(&mut self, x: &[Vec<f64>]) -> Result<Vec<i64>> {
        if x.is_empty() {
            return Err(TabmlError::algorithm("kmeans requires a non-empty matrix"));
        }
        if self.n_clusters == 0 || self.n_clusters > x.len() {
            return Err(TabmlError::algorithm(format!(
                "kmeans requires 1 <= n_clusters <= n_rows, got n_clusters={} for {} rows",
                self.n_clusters,
                x.len()
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = init_plus_plus(x, self.n_clusters, &mut rng);
        let mut assignments = vec![0usize; x.len()];

        for _ in 0..KMEANS_MAX_ITER {
            for (slot, point) in assignments.iter_mut().zip(x) {
                *slot = nearest_index(&centroids, point);
            }

            let mut shift: f64 = 0.0;
            for (cluster, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<&Vec<f64>> = x
                    .iter()
                    .zip(&assignments)
                    .filter(|&(_, &a)| a == cluster)
                    .map(|(point, _)| point)
                    .collect();

                let updated = if members.is_empty() {
                    // Re-seed an empty cluster with the point farthest from
                    // its current centroid.
                    let farthest = x
                        .iter()
                        .max_by(|a, b| {
                            euclidean_distance(a, centroid)
                                .partial_cmp(&euclidean_distance(b, centroid))
                                .unwrap_or(std::cmp::Ordering::Equal)
                        })
                        .unwrap()
                        .clone();
                    farthest
                } else {
                    mean_point(&members)
                };

                shift = shift.max(euclidean_distance(centroid, &updated));
                *centroid = updated;
            }

            if shift < KMEANS_TOLERANCE {
                break;
            }
        }

        for (slot, point) in assignments.iter_mut().zip(x) {
            *slot = nearest_index(&centroids, point);
        }
        self.centroids = centroids;
        Ok(assignments.into_iter().map(|a| a as i64).collect())
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<i64> {
        if self.centroids.is_empty() {
            return Err(TabmlError::algorithm("kmeans model is not fitted"));
        }
        Ok(nearest_index(&self.centroids, row) as i64)
    }
}

fn init_plus_plus(x: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(x[rng.random_range(0..x.len())].clone());

    while centroids.len() < k {
        let distances: Vec<f64> = x
            .iter()
            .map(|point| {
                centroids
                    .iter()
                    .map(|c| {
                        let d = euclidean_distance(point, c);
                        d * d
                    })
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = distances.iter().sum();

        let chosen = if total == 0.0 {
            rng.random_range(0..x.len())
        } else {
            let mut r = rng.random::<f64>() * total;
            let mut index = x.len() - 1;
            for (i, &d) in distances.iter().enumerate() {
                if r <= d {
                    index = i;
                    break;
                }
                r -= d;
            }
            index
        };
        centroids.push(x[chosen].clone());
    }

    centroids
}

fn nearest_index(centers: &[Vec<f64>], point: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, center) in centers.iter().enumerate() {
        let distance = euclidean_distance(center, point);
        if distance < best_distance {
            best_distance = distance;
            best = index;
        }
    }
    best
}

fn mean_point(points: &[&Vec<f64>]) -> Vec<f64> {
    let d = points[0].len();
    let mut mean = vec![0.0; d];
    for point in points {
        for (slot, value) in mean.iter_mut().zip(point.iter()) {
            *slot += value;
        }
    }
    for slot in &mut mean {
        *slot /= points.len() as f64;
    }
    mean
}

/// Density-based clustering. Points in no dense region are labeled −1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dbscan {
    eps: f64,
    min_samples: usize,
}

impl Dbscan {
    pub fn new() -> Self {
        Dbscan {
            eps: 0.5,
            min_samples: 5,
        }
    }

    pub fn fit_predict(&mut self, x: &[Vec<f64>]) -> Result<Vec<i64>> {
        if x.is_empty() {
            return Err(TabmlError::algorithm("dbscan requires a non-empty matrix"));
        }

        let n = x.len();
        let mut labels: Vec<Option<i64>> = vec![None; n];
        let mut next_cluster = 0i64;

        for i in 0..n {
            if labels[i].is_some() {
                continue;
            }
            let neighbors = self.region_query(x, i);
            if neighbors.len() < self.min_samples {
                labels[i] = Some(-1);
                continue;
            }

            labels[i] = Some(next_cluster);
            let mut queue = neighbors;
            let mut cursor = 0;
            while cursor < queue.len() {
                let j = queue[cursor];
                cursor += 1;

                match labels[j] {
                    Some(-1) => labels[j] = Some(next_cluster), // border point
                    Some(_) => continue,
                    None => {
                        labels[j] = Some(next_cluster);
                        let expansion = self.region_query(x, j);
                        if expansion.len() >= self.min_samples {
                            queue.extend(expansion);
                        }
                    }
                }
            }
            next_cluster += 1;
        }

        Ok(labels.into_iter().map(|l| l.unwrap_or(-1)).collect())
    }

    fn region_query(&self, x: &[Vec<f64>], i: usize) -> Vec<usize> {
        x.iter()
            .enumerate()
            .filter(|(_, point)| euclidean_distance(point, &x[i]) <= self.eps)
            .map(|(j, _)| j)
            .collect()
    }
}

impl Default for Dbscan {
    fn default() -> Self {
        Self::new()
    }
}

/// Agglomerative clustering with average linkage, merged bottom-up until the
/// requested cluster count remains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agglomerative {
    n_clusters: usize,
}

impl Agglomerative {
    pub fn new(n_clusters: usize) -> Self {
        Agglomerative { n_clusters }
    }

    pub fn fit_predict(&mut self, x: &[Vec<f64>]) -> Result<Vec<i64>> {
        if x.is_empty() {
            return Err(TabmlError::algorithm(
                "hierarchical clustering requires a non-empty matrix",
            ));
        }
        if self.n_clusters == 0 {
            return Err(TabmlError::algorithm("n_clusters must be at least 1"));
        }

        let n = x.len();
        // Active clusters: member indices plus pairwise average-linkage
        // distances maintained with the Lance-Williams update.
        let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
        let mut distance = vec![vec![0.0f64; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = euclidean_distance(&x[i], &x[j]);
                distance[i][j] = d;
                distance[j][i] = d;
            }
        }

        let mut active = n;
        while active > self.n_clusters.min(n) {
            // Closest active pair.
            let mut best = (0usize, 0usize);
            let mut best_distance = f64::INFINITY;
            for i in 0..n {
                if members[i].is_none() {
                    continue;
                }
                for j in (i + 1)..n {
                    if members[j].is_none() {
                        continue;
                    }
                    if distance[i][j] < best_distance {
                        best_distance = distance[i][j];
                        best = (i, j);
                    }
                }
            }

            let (a, b) = best;
            let size_a = members[a].as_ref().unwrap().len() as f64;
            let size_b = members[b].as_ref().unwrap().len() as f64;

            for k in 0..n {
                if k == a || k == b || members[k].is_none() {
                    continue;
                }
                let merged =
                    (size_a * distance[a][k] + size_b * distance[b][k]) / (size_a + size_b);
                distance[a][k] = merged;
                distance[k][a] = merged;
            }

            let absorbed = members[b].take().unwrap();
            members[a].as_mut().unwrap().extend(absorbed);
            active -= 1;
        }

        let mut labels = vec![0i64; n];
        let mut cluster = 0i64;
        for slot in members.into_iter().flatten() {
            for i in slot {
                labels[i] = cluster;
            }
            cluster += 1;
        }
        Ok(labels)
    }
}

/// Gaussian mixture with diagonal covariance, fitted by EM from a k-means
/// initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gmm {
    n_components: usize,
    seed: u64,
    weights: Vec<f64>,
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
}

impl Gmm {
    pub fn new(n_components: usize, seed: u64) -> Self {
        Gmm {
            n_components,
            seed,
            weights: Vec::new(),
            means: Vec::new(),
            variances: Vec::new(),
        }
    }

    pub fn fit_predict(&mut self, x: &[Vec<f64>]) -> Result<Vec<i64>> {
        if x.is_empty() {
            return Err(TabmlError::algorithm("gmm requires a non-empty matrix"));
        }
        if self.n_components == 0 || self.n_components > x.len() {
            return Err(TabmlError::algorithm(format!(
                "gmm requires 1 <= n_components <= n_rows, got {} for {} rows",
                self.n_components,
                x.len()
            )));
        }

        let n = x.len();
        let d = x[0].len();
        let k = self.n_components;

        // Initialize from a k-means pass with the same seed.
        let mut kmeans = KMeans::new(k, self.seed);
        let initial = kmeans.fit_predict(x)?;

        let mut weights = vec![0.0; k];
        let mut means = vec![vec![0.0; d]; k];
        for (point, &label) in x.iter().zip(&initial) {
            weights[label as usize] += 1.0;
            for (slot, value) in means[label as usize].iter_mut().zip(point) {
                *slot += value;
            }
        }
        for (weight, mean) in weights.iter_mut().zip(&mut means) {
            if *weight > 0.0 {
                for slot in mean.iter_mut() {
                    *slot /= *weight;
                }
            }
            *weight /= n as f64;
        }

        let mut variances = vec![vec![0.0; d]; k];
        for (point, &label) in x.iter().zip(&initial) {
            for ((variance, mean), value) in variances[label as usize]
                .iter_mut()
                .zip(&means[label as usize])
                .zip(point)
            {
                let delta = value - mean;
                *variance += delta * delta;
            }
        }
        for (component, weight) in variances.iter_mut().zip(&weights) {
            let count = (weight * n as f64).max(1.0);
            for variance in component.iter_mut() {
                *variance = (*variance / count).max(GMM_VARIANCE_FLOOR);
            }
        }

        // EM iterations.
        let mut responsibilities = vec![vec![0.0; k]; n];
        let mut previous_log_likelihood = f64::NEG_INFINITY;

        for _ in 0..GMM_MAX_ITER {
            // E-step with log-sum-exp normalization.
            let mut log_likelihood = 0.0;
            for (point, resp) in x.iter().zip(&mut responsibilities) {
                for component in 0..k {
                    resp[component] = weights[component].max(1e-300).ln()
                        + log_gaussian(point, &means[component], &variances[component]);
                }
                let max = resp.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
                let total: f64 = resp.iter().map(|&lp| (lp - max).exp()).sum();
                let log_norm = max + total.ln();
                log_likelihood += log_norm;
                for value in resp.iter_mut() {
                    *value = (*value - log_norm).exp();
                }
            }

            // M-step.
            for component in 0..k {
                let resp_sum: f64 = responsibilities.iter().map(|r| r[component]).sum();
                if resp_sum <= 0.0 {
                    continue;
                }
                weights[component] = resp_sum / n as f64;

                let mut mean = vec![0.0; d];
                for (point, resp) in x.iter().zip(&responsibilities) {
                    for (slot, value) in mean.iter_mut().zip(point) {
                        *slot += resp[component] * value;
                    }
                }
                for slot in &mut mean {
                    *slot /= resp_sum;
                }

                let mut variance = vec![0.0; d];
                for (point, resp) in x.iter().zip(&responsibilities) {
                    for ((slot, value), m) in variance.iter_mut().zip(point).zip(&mean) {
                        let delta = value - m;
                        *slot += resp[component] * delta * delta;
                    }
                }
                for slot in &mut variance {
                    *slot = (*slot / resp_sum).max(GMM_VARIANCE_FLOOR);
                }

                means[component] = mean;
                variances[component] = variance;
            }

            if (log_likelihood - previous_log_likelihood).abs() < GMM_TOLERANCE {
                break;
            }
            previous_log_likelihood = log_likelihood;
        }

        self.weights = weights;
        self.means = means;
        self.variances = variances;

        Ok(responsibilities
            .iter()
            .map(|resp| {
                resp.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i as i64)
                    .unwrap_or(0)
            })
            .collect())
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<i64> {
        if self.means.is_empty() {
            return Err(TabmlError::algorithm("gmm model is not fitted"));
        }
        let best = (0..self.means.len())
            .map(|component| {
                self.weights[component].max(1e-300).ln()
                    + log_gaussian(row, &self.means[component], &self.variances[component])
            })
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i as i64)
            .unwrap_or(0);
        Ok(best)
    }
}

fn log_gaussian(point: &[f64], mean: &[f64], variance: &[f64]) -> f64 {
    let mut log_p = 0.0;
    for ((value, m), v) in point.iter().zip(mean).zip(variance) {
        let delta = value - m;
        log_p += -0.5 * (2.0 * std::f64::consts::PI * v).ln() - delta * delta / (2.0 * v);
    }
    log_p
}

/// Mean shift with a flat kernel and a bandwidth estimated from the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanShift {
    bandwidth: f64,
    modes: Vec<Vec<f64>>,
}

impl MeanShift {
    pub fn new() -> Self {
        MeanShift {
            bandwidth: 0.0,
            modes: Vec::new(),
        }
    }

    pub fn fit_predict(&mut self, x: &[Vec<f64>]) -> Result<Vec<i64>> {
        if x.is_empty() {
            return Err(TabmlError::algorithm(
                "mean shift requires a non-empty matrix",
            ));
        }

        let bandwidth = estimate_bandwidth(x);
        if bandwidth == 0.0 {
            // Every point identical: one cluster.
            self.bandwidth = 0.0;
            self.modes = vec![x[0].clone()];
            return Ok(vec![0; x.len()]);
        }
        self.bandwidth = bandwidth;

        // Shift every point to its local mode.
        let mut converged = Vec::with_capacity(x.len());
        for start in x {
            let mut current = start.clone();
            for _ in 0..MEAN_SHIFT_MAX_ITER {
                let within: Vec<&Vec<f64>> = x
                    .iter()
                    .filter(|point| euclidean_distance(point, &current) <= bandwidth)
                    .collect();
                if within.is_empty() {
                    break;
                }
                let next = mean_point(&within);
                let moved = euclidean_distance(&next, &current);
                current = next;
                if moved < 1e-3 * bandwidth {
                    break;
                }
            }
            converged.push(current);
        }

        // Merge modes closer than the bandwidth.
        let mut modes: Vec<Vec<f64>> = Vec::new();
        let mut labels = Vec::with_capacity(x.len());
        for mode in &converged {
            let assigned = modes
                .iter()
                .position(|m| euclidean_distance(m, mode) < bandwidth);
            match assigned {
                Some(index) => labels.push(index as i64),
                None => {
                    modes.push(mode.clone());
                    labels.push((modes.len() - 1) as i64);
                }
            }
        }

        self.modes = modes;
        Ok(labels)
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<i64> {
        if self.modes.is_empty() {
            return Err(TabmlError::algorithm("mean shift model is not fitted"));
        }
        Ok(nearest_index(&self.modes, row) as i64)
    }
}

impl Default for MeanShift {
    fn default() -> Self {
        Self::new()
    }
}

/// Average distance to each point's nearest `quantile * n` neighbors.
fn estimate_bandwidth(x: &[Vec<f64>]) -> f64 {
    let n = x.len();
    let k = ((n as f64 * MEAN_SHIFT_QUANTILE) as usize).max(1);

    let mut total = 0.0;
    for point in x {
        let mut distances: Vec<f64> = x
            .iter()
            .map(|other| euclidean_distance(point, other))
            .collect();
        distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        // Skip the zero self-distance at position 0.
        let neighbors = &distances[1..(k + 1).min(distances.len())];
        if !neighbors.is_empty() {
            total += neighbors.iter().sum::<f64>() / neighbors.len() as f64;
        }
    }
    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_blobs() -> Vec<Vec<f64>> {
        let mut x = Vec::new();
        for i in 0..10 {
            let offset = i as f64 * 0.01;
            x.push(vec![0.0 + offset, 0.0]);
            x.push(vec![10.0 + offset, 0.0]);
            x.push(vec![0.0 + offset, 10.0]);
        }
        x
    }

    #[test]
    fn test_kmeans_three_blobs() {
        let x = three_blobs();
        let mut model = KMeans::new(3, 42);
        let labels = model.fit_predict(&x).unwrap();

        assert_eq!(labels.len(), 30);
        let distinct: std::collections::BTreeSet<i64> = labels.iter().copied().collect();
        assert_eq!(distinct.len(), 3);

        // Points from the same blob share a label.
        assert_eq!(labels[0], labels[3]);
        assert_ne!(labels[0], labels[1]);

        // Out-of-sample assignment picks the nearest centroid.
        let near_first_blob = model.predict_row(&[0.1, 0.2]).unwrap();
        assert_eq!(near_first_blob, labels[0]);
    }

    #[test]
    fn test_kmeans_deterministic() {
        let x = three_blobs();
        let labels_a = KMeans::new(3, 42).fit_predict(&x).unwrap();
        let labels_b = KMeans::new(3, 42).fit_predict(&x).unwrap();
        assert_eq!(labels_a, labels_b);
    }

    #[test]
    fn test_kmeans_too_many_clusters() {
        let x = vec![vec![1.0], vec![2.0]];
        let mut model = KMeans::new(3, 42);
        assert!(model.fit_predict(&x).is_err());
    }

    #[test]
    fn test_dbscan_noise_and_clusters() {
        let mut x = Vec::new();
        for i in 0..6 {
            x.push(vec![i as f64 * 0.05, 0.0]);
            x.push(vec![5.0 + i as f64 * 0.05, 0.0]);
        }
        x.push(vec![100.0, 100.0]); // isolated noise point

        let mut model = Dbscan::new();
        let labels = model.fit_predict(&x).unwrap();

        assert_eq!(labels.len(), 13);
        assert_eq!(labels[12], -1);
        let clusters: std::collections::BTreeSet<i64> =
            labels.iter().copied().filter(|&l| l >= 0).collect();
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_agglomerative_merges_to_requested_count() {
        let x = three_blobs();
        let mut model = Agglomerative::new(3);
        let labels = model.fit_predict(&x).unwrap();

        let distinct: std::collections::BTreeSet<i64> = labels.iter().copied().collect();
        assert_eq!(distinct.len(), 3);
        assert_eq!(labels[0], labels[3]);
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn test_gmm_three_blobs() {
        let x = three_blobs();
        let mut model = Gmm::new(3, 42);
        let labels = model.fit_predict(&x).unwrap();

        let distinct: std::collections::BTreeSet<i64> = labels.iter().copied().collect();
        assert_eq!(distinct.len(), 3);

        let assignment = model.predict_row(&[10.1, 0.1]).unwrap();
        assert_eq!(assignment, labels[1]);
    }

    #[test]
    fn test_mean_shift_finds_separated_modes() {
        let x = three_blobs();
        let mut model = MeanShift::new();
        let labels = model.fit_predict(&x).unwrap();

        let distinct: std::collections::BTreeSet<i64> = labels.iter().copied().collect();
        assert_eq!(distinct.len(), 3);

        let assignment = model.predict_row(&[0.1, 9.9]).unwrap();
        assert_eq!(assignment, labels[2]);
    }

    #[test]
    fn test_mean_shift_identical_points() {
        let x = vec![vec![1.0, 1.0]; 5];
        let mut model = MeanShift::new();
        let labels = model.fit_predict(&x).unwrap();
        assert!(labels.iter().all(|&l| l == 0));
    }
}
