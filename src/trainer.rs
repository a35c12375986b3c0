//! Multi-algorithm training with best-model selection.
//!
//! One call validates the dataset, fits the preprocessing state once,
//! splits the rows with a fixed seed, and fits a fresh estimator per
//! requested algorithm. Unknown algorithm names are skipped silently;
//! algorithm failures become failure records without aborting the rest.
//! Every successful fit is persisted as an immutable artifact.

use std::time::Instant;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::algorithm::{AlgorithmRegistry, FittedModel, ProblemType, TrainOptions};
use crate::artifact::{ARTIFACT_FORMAT_VERSION, ArtifactStore, ModelArtifact};
use crate::dataset::{Dataset, Record};
use crate::error::{Result, TabmlError};
use crate::features::{FeatureMatrix, FeatureSpace};
use crate::metrics::{
    Metrics, classification_metrics, clustering_metrics, regression_metrics,
};
use crate::target::TargetCodec;

/// Minimum row count for supervised training.
pub const MIN_TRAINING_ROWS: usize = 10;

/// Seed for the train/test split and every randomized estimator.
pub const SPLIT_SEED: u64 = 42;

pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_N_CLUSTERS: usize = 3;

fn default_test_size() -> f64 {
    DEFAULT_TEST_SIZE
}

fn default_n_clusters() -> usize {
    DEFAULT_N_CLUSTERS
}

/// One training call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainRequest {
    pub workspace_id: String,
    pub dataset_id: String,
    pub problem_type: ProblemType,
    /// Required for supervised problem types.
    #[serde(default)]
    pub target_column: Option<String>,
    pub algorithms: Vec<String>,
    /// Held-out fraction for supervised evaluation.
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    /// Target cluster count; ignored by density-based algorithms.
    #[serde(default = "default_n_clusters")]
    pub n_clusters: usize,
}

/// Per-algorithm result: success with metrics and a stored artifact, or an
/// isolated failure. Never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AlgorithmOutcome {
    Success {
        algorithm: String,
        metrics: Metrics,
        artifact_id: String,
        training_time: f64,
    },
    Failed {
        algorithm: String,
        error: String,
    },
}

impl AlgorithmOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AlgorithmOutcome::Success { .. })
    }

    pub fn algorithm(&self) -> &str {
        match self {
            AlgorithmOutcome::Success { algorithm, .. } => algorithm,
            AlgorithmOutcome::Failed { algorithm, .. } => algorithm,
        }
    }

    /// Ranking score, present only for successes.
    pub fn score(&self) -> Option<f64> {
        match self {
            AlgorithmOutcome::Success { metrics, .. } => Some(metrics.ranking_score()),
            AlgorithmOutcome::Failed { .. } => None,
        }
    }
}

/// The full result of one training call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub problem_type: ProblemType,
    pub results: Vec<AlgorithmOutcome>,
    /// The success record with the highest problem-appropriate score;
    /// absent when every algorithm failed.
    pub best_model: Option<AlgorithmOutcome>,
    pub models_trained: usize,
    pub total_failed: usize,
    /// Wall-clock seconds for the whole call.
    pub total_training_time: f64,
}

/// Trains models against a dataset and persists the successful fits.
pub struct Trainer {
    store: ArtifactStore,
    registry: AlgorithmRegistry,
}

impl Trainer {
    /// A trainer with the default algorithm registry.
    pub fn new(store: ArtifactStore) -> Self {
        Trainer {
            store,
            registry: AlgorithmRegistry::default(),
        }
    }

    /// A trainer with an injected registry (tests, per-call overrides).
    pub fn with_registry(store: ArtifactStore, registry: AlgorithmRegistry) -> Self {
        Trainer { store, registry }
    }

    /// The artifact store backing this trainer.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run one training call.
    pub fn train(&self, rows: &[Record], request: &TrainRequest) -> Result<TrainingOutcome> {
        let started = Instant::now();

        if request.algorithms.is_empty() {
            return Err(TabmlError::validation("at least one algorithm is required"));
        }
        if !(request.test_size > 0.0 && request.test_size < 1.0) {
            return Err(TabmlError::validation(format!(
                "test_size must be in (0, 1), got {}",
                request.test_size
            )));
        }

        let dataset = Dataset::new(rows)?;
        let options = TrainOptions {
            seed: SPLIT_SEED,
            n_clusters: request.n_clusters,
        };

        let results = match request.problem_type {
            ProblemType::Classification | ProblemType::Regression => {
                self.train_supervised(&dataset, request, &options)?
            }
            ProblemType::Clustering => self.train_clustering(&dataset, request, &options)?,
        };

        // First-seen wins on ties, matching request order.
        let mut best: Option<&AlgorithmOutcome> = None;
        let mut best_score = f64::NEG_INFINITY;
        for outcome in &results {
            if let Some(score) = outcome.score() {
                if score > best_score {
                    best_score = score;
                    best = Some(outcome);
                }
            }
        }

        let models_trained = results.iter().filter(|r| r.is_success()).count();
        Ok(TrainingOutcome {
            problem_type: request.problem_type,
            best_model: best.cloned(),
            total_failed: results.len() - models_trained,
            models_trained,
            results,
            total_training_time: started.elapsed().as_secs_f64(),
        })
    }

    fn train_supervised(
        &self,
        dataset: &Dataset<'_>,
        request: &TrainRequest,
        options: &TrainOptions,
    ) -> Result<Vec<AlgorithmOutcome>> {
        let target = request.target_column.as_deref().ok_or_else(|| {
            TabmlError::validation("target_column is required for supervised training")
        })?;
        if !dataset.has_column(target) {
            return Err(TabmlError::validation(format!(
                "target column '{target}' not found in dataset"
            )));
        }
        if dataset.len() < MIN_TRAINING_ROWS {
            return Err(TabmlError::validation(format!(
                "dataset has {} rows; supervised training requires at least {MIN_TRAINING_ROWS}",
                dataset.len()
            )));
        }

        let (space, matrix) = FeatureSpace::fit(dataset, Some(target))?;
        let target_values: Vec<Value> = dataset
            .rows()
            .iter()
            .map(|row| row.get(target).cloned().unwrap_or(Value::Null))
            .collect();

        match request.problem_type {
            ProblemType::Classification => {
                let codec = TargetCodec::fit_categorical(target_values.iter());
                let n_classes = codec.n_classes();
                if n_classes < 2 {
                    return Err(TabmlError::validation(
                        "classification requires at least two distinct target classes",
                    ));
                }
                let y: Vec<usize> = target_values
                    .iter()
                    .map(|v| codec.encode_class(v))
                    .collect::<Result<_>>()?;

                let (train_indices, test_indices) =
                    stratified_split(&y, request.test_size, SPLIT_SEED);
                let x_train = select_rows(&matrix, &train_indices);
                let x_test = select_rows(&matrix, &test_indices);
                let y_train: Vec<usize> = train_indices.iter().map(|&i| y[i]).collect();
                let y_test: Vec<usize> = test_indices.iter().map(|&i| y[i]).collect();

                Ok(request
                    .algorithms
                    .par_iter()
                    .filter_map(|name| {
                        if !self.registry.contains(ProblemType::Classification, name) {
                            warn!(algorithm = %name, "unknown classification algorithm, skipping");
                            return None;
                        }
                        Some(self.fit_classifier(
                            name, request, options, &space, &codec, n_classes, &x_train, &y_train,
                            &x_test, &y_test,
                        ))
                    })
                    .collect())
            }
            ProblemType::Regression => {
                let y: Vec<f64> = target_values
                    .iter()
                    .map(TargetCodec::encode_numeric)
                    .collect::<Result<_>>()?;

                let (train_indices, test_indices) =
                    shuffled_split(dataset.len(), request.test_size, SPLIT_SEED);
                let x_train = select_rows(&matrix, &train_indices);
                let x_test = select_rows(&matrix, &test_indices);
                let y_train: Vec<f64> = train_indices.iter().map(|&i| y[i]).collect();
                let y_test: Vec<f64> = test_indices.iter().map(|&i| y[i]).collect();

                Ok(request
                    .algorithms
                    .par_iter()
                    .filter_map(|name| {
                        if !self.registry.contains(ProblemType::Regression, name) {
                            warn!(algorithm = %name, "unknown regression algorithm, skipping");
                            return None;
                        }
                        Some(self.fit_regressor(
                            name, request, options, &space, &x_train, &y_train, &x_test, &y_test,
                        ))
                    })
                    .collect())
            }
            ProblemType::Clustering => Err(TabmlError::internal(
                "clustering routed through supervised training",
            )),
        }
    }

    fn train_clustering(
        &self,
        dataset: &Dataset<'_>,
        request: &TrainRequest,
        options: &TrainOptions,
    ) -> Result<Vec<AlgorithmOutcome>> {
        let (space, matrix) = FeatureSpace::fit(dataset, None)?;

        Ok(request
            .algorithms
            .par_iter()
            .filter_map(|name| {
                if !self.registry.contains(ProblemType::Clustering, name) {
                    warn!(algorithm = %name, "unknown clustering algorithm, skipping");
                    return None;
                }
                Some(self.fit_clusterer(name, request, options, &space, &matrix))
            })
            .collect())
    }

    #[allow(clippy::too_many_arguments)]
    fn fit_classifier(
        &self,
        algorithm: &str,
        request: &TrainRequest,
        options: &TrainOptions,
        space: &FeatureSpace,
        codec: &TargetCodec,
        n_classes: usize,
        x_train: &[Vec<f64>],
        y_train: &[usize],
        x_test: &[Vec<f64>],
        y_test: &[usize],
    ) -> AlgorithmOutcome {
        info!(algorithm, problem_type = "classification", "training");
        let started = Instant::now();

        let Some(mut model) = self.registry.build_classifier(algorithm, options) else {
            return failure(algorithm, "algorithm disappeared from registry");
        };
        if let Err(error) = model.fit(x_train, y_train, n_classes) {
            return failure(algorithm, &error.to_string());
        }

        let y_pred = model.predict_batch(x_test);
        let metrics = Metrics::Classification(classification_metrics(y_test, &y_pred, n_classes));

        let supports_probability = model.supports_probability();
        let artifact = self.artifact(
            request,
            algorithm,
            space.clone(),
            codec.clone(),
            supports_probability,
            FittedModel::Classifier(model),
        );
        match self.store.save(&artifact) {
            Ok(artifact_id) => AlgorithmOutcome::Success {
                algorithm: algorithm.to_string(),
                metrics,
                artifact_id,
                training_time: started.elapsed().as_secs_f64(),
            },
            Err(error) => failure(algorithm, &error.to_string()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fit_regressor(
        &self,
        algorithm: &str,
        request: &TrainRequest,
        options: &TrainOptions,
        space: &FeatureSpace,
        x_train: &[Vec<f64>],
        y_train: &[f64],
        x_test: &[Vec<f64>],
        y_test: &[f64],
    ) -> AlgorithmOutcome {
        info!(algorithm, problem_type = "regression", "training");
        let started = Instant::now();

        let Some(mut model) = self.registry.build_regressor(algorithm, options) else {
            return failure(algorithm, "algorithm disappeared from registry");
        };
        if let Err(error) = model.fit(x_train, y_train) {
            return failure(algorithm, &error.to_string());
        }

        let y_pred = model.predict_batch(x_test);
        let metrics = Metrics::Regression(regression_metrics(y_test, &y_pred));

        let artifact = self.artifact(
            request,
            algorithm,
            space.clone(),
            TargetCodec::Identity,
            false,
            FittedModel::Regressor(model),
        );
        match self.store.save(&artifact) {
            Ok(artifact_id) => AlgorithmOutcome::Success {
                algorithm: algorithm.to_string(),
                metrics,
                artifact_id,
                training_time: started.elapsed().as_secs_f64(),
            },
            Err(error) => failure(algorithm, &error.to_string()),
        }
    }

    fn fit_clusterer(
        &self,
        algorithm: &str,
        request: &TrainRequest,
        options: &TrainOptions,
        space: &FeatureSpace,
        matrix: &FeatureMatrix,
    ) -> AlgorithmOutcome {
        info!(algorithm, problem_type = "clustering", "training");
        let started = Instant::now();

        let Some(mut model) = self.registry.build_clusterer(algorithm, options) else {
            return failure(algorithm, "algorithm disappeared from registry");
        };
        let labels = match model.fit_predict(matrix) {
            Ok(labels) => labels,
            Err(error) => return failure(algorithm, &error.to_string()),
        };

        let metrics = Metrics::Clustering(clustering_metrics(matrix, &labels));

        let artifact = self.artifact(
            request,
            algorithm,
            space.clone(),
            TargetCodec::Identity,
            false,
            FittedModel::Clusterer(model),
        );
        match self.store.save(&artifact) {
            Ok(artifact_id) => AlgorithmOutcome::Success {
                algorithm: algorithm.to_string(),
                metrics,
                artifact_id,
                training_time: started.elapsed().as_secs_f64(),
            },
            Err(error) => failure(algorithm, &error.to_string()),
        }
    }

    fn artifact(
        &self,
        request: &TrainRequest,
        algorithm: &str,
        feature_space: FeatureSpace,
        target_codec: TargetCodec,
        supports_probability: bool,
        model: FittedModel,
    ) -> ModelArtifact {
        ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            workspace_id: request.workspace_id.clone(),
            dataset_id: request.dataset_id.clone(),
            algorithm: algorithm.to_string(),
            problem_type: request.problem_type,
            target_column: request.target_column.clone(),
            feature_space,
            target_codec,
            supports_probability,
            model,
            trained_at: Utc::now(),
        }
    }
}

fn failure(algorithm: &str, error: &str) -> AlgorithmOutcome {
    warn!(algorithm, error, "algorithm failed");
    AlgorithmOutcome::Failed {
        algorithm: algorithm.to_string(),
        error: error.to_string(),
    }
}

fn select_rows(matrix: &FeatureMatrix, indices: &[usize]) -> Vec<Vec<f64>> {
    indices.iter().map(|&i| matrix[i].clone()).collect()
}

/// Seeded shuffled split. The test side gets `ceil(n * test_size)` rows,
/// clamped so both sides stay non-empty.
fn shuffled_split(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1);
    let (test, train) = indices.split_at(n_test);
    (train.to_vec(), test.to_vec())
}

/// Seeded stratified split: each class contributes proportionally to the
/// test side while keeping at least one training row per class.
fn stratified_split(y: &[usize], test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut by_class: std::collections::BTreeMap<usize, Vec<usize>> =
        std::collections::BTreeMap::new();
    for (index, &class) in y.iter().enumerate() {
        by_class.entry(class).or_default().push(index);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for members in by_class.values_mut() {
        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_size).floor() as usize).min(members.len() - 1);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    // Tiny classes everywhere can leave the test side empty; steal one row.
    if test.is_empty() && train.len() > 1 {
        if let Some(index) = train.pop() {
            test.push(index);
        }
    }

    (train, test)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffled_split_sizes() {
        let (train, test) = shuffled_split(15, 0.2, SPLIT_SEED);
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 12);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffled_split_deterministic() {
        assert_eq!(
            shuffled_split(20, 0.2, SPLIT_SEED),
            shuffled_split(20, 0.2, SPLIT_SEED)
        );
    }

    #[test]
    fn test_stratified_split_keeps_classes_in_train() {
        let y = vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
        let (train, test) = stratified_split(&y, 0.2, SPLIT_SEED);
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);

        // Both classes survive on the training side.
        assert!(train.iter().any(|&i| y[i] == 0));
        assert!(train.iter().any(|&i| y[i] == 1));
        // And the test side is balanced here.
        assert_eq!(test.iter().filter(|&&i| y[i] == 0).count(), 1);
        assert_eq!(test.iter().filter(|&&i| y[i] == 1).count(), 1);
    }

    #[test]
    fn test_stratified_split_single_member_class_stays_in_train() {
        let y = vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let (train, test) = stratified_split(&y, 0.2, SPLIT_SEED);
        assert!(train.iter().any(|&i| y[i] == 1));
        assert!(!test.iter().any(|&i| y[i] == 1));
        assert!(!test.is_empty());
    }
}
