//! Evaluation metrics per problem type.
//!
//! Classification and regression metrics are computed on the held-out test
//! split; clustering metrics on the full feature matrix. Each metric set
//! exposes the single problem-appropriate ranking score used for best-model
//! selection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::algorithm::euclidean_distance;

/// Classification metrics. Precision/recall/F1 are support-weighted and
/// zero-division-safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub confusion_matrix: Vec<Vec<usize>>,
}

/// Regression metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2_score: f64,
}

/// Clustering metrics. Noise points (label −1) are excluded from the
/// cluster count and the silhouette but reported in `cluster_sizes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringMetrics {
    pub silhouette_score: f64,
    pub n_clusters: usize,
    pub cluster_sizes: BTreeMap<i64, usize>,
}

/// Metric set for one trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metrics {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
    Clustering(ClusteringMetrics),
}

impl Metrics {
    /// The problem-appropriate score used to rank models: accuracy for
    /// classification, R² for regression, silhouette for clustering.
    /// Higher is better for all three.
    pub fn ranking_score(&self) -> f64 {
        match self {
            Metrics::Classification(m) => m.accuracy,
            Metrics::Regression(m) => m.r2_score,
            Metrics::Clustering(m) => m.silhouette_score,
        }
    }
}

/// Compute classification metrics over encoded class ids.
pub fn classification_metrics(
    y_true: &[usize],
    y_pred: &[usize],
    n_classes: usize,
) -> ClassificationMetrics {
    let n = y_true.len();
    let mut confusion = vec![vec![0usize; n_classes]; n_classes];
    let mut correct = 0usize;

    for (&truth, &pred) in y_true.iter().zip(y_pred) {
        if truth < n_classes && pred < n_classes {
            confusion[truth][pred] += 1;
        }
        if truth == pred {
            correct += 1;
        }
    }

    let accuracy = if n == 0 { 0.0 } else { correct as f64 / n as f64 };

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for class in 0..n_classes {
        let tp = confusion[class][class] as f64;
        let support: usize = confusion[class].iter().sum();
        let predicted: usize = (0..n_classes).map(|row| confusion[row][class]).sum();

        let class_precision = safe_ratio(tp, predicted as f64);
        let class_recall = safe_ratio(tp, support as f64);
        let class_f1 = safe_ratio(
            2.0 * class_precision * class_recall,
            class_precision + class_recall,
        );

        let weight = if n == 0 { 0.0 } else { support as f64 / n as f64 };
        precision += weight * class_precision;
        recall += weight * class_recall;
        f1 += weight * class_f1;
    }

    ClassificationMetrics {
        accuracy,
        precision,
        recall,
        f1_score: f1,
        confusion_matrix: confusion,
    }
}

/// Compute regression metrics.
pub fn regression_metrics(y_true: &[f64], y_pred: &[f64]) -> RegressionMetrics {
    let n = y_true.len() as f64;
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>()
        / n;
    let mae = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n;

    let mean = y_true.iter().sum::<f64>() / n;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();

    // A constant target has no variance to explain: R² is 1.0 for a perfect
    // fit and 0.0 otherwise.
    let r2 = if ss_tot == 0.0 {
        if ss_res < 1e-12 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    };

    RegressionMetrics {
        mse,
        rmse: mse.sqrt(),
        mae,
        r2_score: r2,
    }
}

/// Compute clustering metrics over the full feature matrix.
pub fn clustering_metrics(x: &[Vec<f64>], labels: &[i64]) -> ClusteringMetrics {
    let mut cluster_sizes: BTreeMap<i64, usize> = BTreeMap::new();
    for &label in labels {
        *cluster_sizes.entry(label).or_insert(0) += 1;
    }
    let n_clusters = cluster_sizes.keys().filter(|&&label| label >= 0).count();

    ClusteringMetrics {
        silhouette_score: silhouette_score(x, labels),
        n_clusters,
        cluster_sizes,
    }
}

/// Mean silhouette coefficient, 0.0 when fewer than two clusters result.
/// Noise points (label −1) are left out of the computation.
fn silhouette_score(x: &[Vec<f64>], labels: &[i64]) -> f64 {
    let clusters: Vec<i64> = {
        let mut distinct: Vec<i64> = labels.iter().copied().filter(|&l| l >= 0).collect();
        distinct.sort_unstable();
        distinct.dedup();
        distinct
    };
    if clusters.len() < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    let mut counted = 0usize;

    for (i, point) in x.iter().enumerate() {
        if labels[i] < 0 {
            continue;
        }

        // Mean distance to every cluster, own cluster excluded from its own
        // count via the self-distance of zero.
        let mut sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
        for (j, other) in x.iter().enumerate() {
            if i == j || labels[j] < 0 {
                continue;
            }
            let entry = sums.entry(labels[j]).or_insert((0.0, 0));
            entry.0 += euclidean_distance(point, other);
            entry.1 += 1;
        }

        let own = sums.get(&labels[i]).copied().unwrap_or((0.0, 0));
        if own.1 == 0 {
            // Singleton cluster: silhouette defined as zero.
            counted += 1;
            continue;
        }
        let a = own.0 / own.1 as f64;

        let b = sums
            .iter()
            .filter(|&(&label, _)| label != labels[i])
            .map(|(_, &(sum, count))| sum / count as f64)
            .fold(f64::INFINITY, f64::min);
        if !b.is_finite() {
            counted += 1;
            continue;
        }

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
        counted += 1;
    }

    if counted == 0 { 0.0 } else { total / counted as f64 }
}

fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_metrics_perfect() {
        let y = vec![0, 1, 0, 1];
        let m = classification_metrics(&y, &y, 2);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1_score, 1.0);
        assert_eq!(m.confusion_matrix, vec![vec![2, 0], vec![0, 2]]);
    }

    #[test]
    fn test_classification_metrics_zero_division_safe() {
        // Class 1 never predicted, class 2 never present.
        let y_true = vec![0, 0, 1];
        let y_pred = vec![0, 0, 0];
        let m = classification_metrics(&y_true, &y_pred, 3);
        assert!(m.accuracy > 0.0 && m.accuracy < 1.0);
        assert!(m.precision.is_finite());
        assert!(m.recall.is_finite());
        assert!(m.f1_score.is_finite());
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = vec![1.0, 2.0, 3.0];
        let y_pred = vec![1.0, 2.0, 3.0];
        let m = regression_metrics(&y_true, &y_pred);
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.r2_score, 1.0);

        let worse = regression_metrics(&y_true, &[3.0, 2.0, 1.0]);
        assert!(worse.r2_score < 1.0);
        assert!(worse.mse > 0.0);
    }

    #[test]
    fn test_clustering_metrics_two_blobs() {
        let x = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
        ];
        let labels = vec![0, 0, 1, 1];
        let m = clustering_metrics(&x, &labels);
        assert_eq!(m.n_clusters, 2);
        assert_eq!(m.cluster_sizes[&0], 2);
        assert_eq!(m.cluster_sizes[&1], 2);
        assert!(m.silhouette_score > 0.9);
    }

    #[test]
    fn test_single_cluster_silhouette_is_zero() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let labels = vec![0, 0, 0];
        let m = clustering_metrics(&x, &labels);
        assert_eq!(m.silhouette_score, 0.0);
        assert_eq!(m.n_clusters, 1);
    }

    #[test]
    fn test_noise_excluded_from_cluster_count() {
        let x = vec![vec![0.0], vec![0.1], vec![5.0], vec![5.1], vec![99.0]];
        let labels = vec![0, 0, 1, 1, -1];
        let m = clustering_metrics(&x, &labels);
        assert_eq!(m.n_clusters, 2);
        assert_eq!(m.cluster_sizes[&-1], 1);
    }

    #[test]
    fn test_ranking_score_dispatch() {
        let m = Metrics::Regression(regression_metrics(&[1.0, 2.0], &[1.0, 2.0]));
        assert_eq!(m.ranking_score(), 1.0);
    }
}
