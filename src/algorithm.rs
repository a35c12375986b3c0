//! Model implementations and the algorithm registry.
//!
//! Every estimator is a plain serde-serializable struct fitted through an
//! enum wrapper per problem type, so a trained model can be persisted inside
//! an artifact and replayed without dynamic dispatch. The registry is an
//! explicit table injected into the trainer — there is no process-wide
//! mutable state, and a fresh estimator instance is constructed for every
//! fit.

pub mod boosting;
pub mod cluster;
pub mod forest;
pub mod knn;
pub mod linear;
pub mod logistic;
pub mod naive_bayes;
pub mod tree;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabmlError};

pub use boosting::{GradientBoostingClassifier, GradientBoostingRegressor};
pub use cluster::{Agglomerative, Dbscan, Gmm, KMeans, MeanShift};
pub use forest::{RandomForestClassifier, RandomForestRegressor};
pub use knn::{KnnClassifier, KnnRegressor};
pub use linear::{Lasso, LinearRegression, Ridge};
pub use logistic::LogisticRegression;
pub use naive_bayes::GaussianNb;
pub use tree::{DecisionTreeClassifier, DecisionTreeRegressor};

/// The kind of problem a training run solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Classification,
    Regression,
    Clustering,
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemType::Classification => "classification",
            ProblemType::Regression => "regression",
            ProblemType::Clustering => "clustering",
        }
    }
}

impl FromStr for ProblemType {
    type Err = TabmlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classification" => Ok(ProblemType::Classification),
            "regression" => Ok(ProblemType::Regression),
            "clustering" => Ok(ProblemType::Clustering),
            other => Err(TabmlError::validation(format!(
                "invalid problem type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options handed to estimator constructors.
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    /// Seed for every randomized step, fixed for reproducibility.
    pub seed: u64,
    /// Target cluster count; ignored by density-based algorithms.
    pub n_clusters: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        TrainOptions {
            seed: 42,
            n_clusters: 3,
        }
    }
}

/// Euclidean distance between two feature vectors.
pub(crate) fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// A fitted classification model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassifierModel {
    Logistic(LogisticRegression),
    Tree(DecisionTreeClassifier),
    Forest(RandomForestClassifier),
    Boosting(GradientBoostingClassifier),
    Knn(KnnClassifier),
    NaiveBayes(GaussianNb),
}

impl ClassifierModel {
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Result<()> {
        match self {
            ClassifierModel::Logistic(m) => m.fit(x, y, n_classes),
            ClassifierModel::Tree(m) => m.fit(x, y, n_classes),
            ClassifierModel::Forest(m) => m.fit(x, y, n_classes),
            ClassifierModel::Boosting(m) => m.fit(x, y, n_classes),
            ClassifierModel::Knn(m) => m.fit(x, y, n_classes),
            ClassifierModel::NaiveBayes(m) => m.fit(x, y, n_classes),
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> usize {
        match self {
            ClassifierModel::Logistic(m) => m.predict_row(row),
            ClassifierModel::Tree(m) => m.predict_row(row),
            ClassifierModel::Forest(m) => m.predict_row(row),
            ClassifierModel::Boosting(m) => m.predict_row(row),
            ClassifierModel::Knn(m) => m.predict_row(row),
            ClassifierModel::NaiveBayes(m) => m.predict_row(row),
        }
    }

    /// Class-probability vector for one row.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        match self {
            ClassifierModel::Logistic(m) => m.predict_proba(row),
            ClassifierModel::Tree(m) => m.predict_proba(row),
            ClassifierModel::Forest(m) => m.predict_proba(row),
            ClassifierModel::Boosting(m) => m.predict_proba(row),
            ClassifierModel::Knn(m) => m.predict_proba(row),
            ClassifierModel::NaiveBayes(m) => m.predict_proba(row),
        }
    }

    /// Whether the model exposes class probabilities. Recorded on the
    /// artifact as a capability flag at training time.
    pub fn supports_probability(&self) -> bool {
        true
    }

    pub fn predict_batch(&self, x: &[Vec<f64>]) -> Vec<usize> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }
}

/// A fitted regression model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegressorModel {
    Linear(LinearRegression),
    Ridge(Ridge),
    Lasso(Lasso),
    Tree(DecisionTreeRegressor),
    Forest(RandomForestRegressor),
    Boosting(GradientBoostingRegressor),
    Knn(KnnRegressor),
}

impl RegressorModel {
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        match self {
            RegressorModel::Linear(m) => m.fit(x, y),
            RegressorModel::Ridge(m) => m.fit(x, y),
            RegressorModel::Lasso(m) => m.fit(x, y),
            RegressorModel::Tree(m) => m.fit(x, y),
            RegressorModel::Forest(m) => m.fit(x, y),
            RegressorModel::Boosting(m) => m.fit(x, y),
            RegressorModel::Knn(m) => m.fit(x, y),
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            RegressorModel::Linear(m) => m.predict_row(row),
            RegressorModel::Ridge(m) => m.predict_row(row),
            RegressorModel::Lasso(m) => m.predict_row(row),
            RegressorModel::Tree(m) => m.predict_row(row),
            RegressorModel::Forest(m) => m.predict_row(row),
            RegressorModel::Boosting(m) => m.predict_row(row),
            RegressorModel::Knn(m) => m.predict_row(row),
        }
    }

    pub fn predict_batch(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }
}

/// A fitted clustering model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClustererModel {
    KMeans(KMeans),
    Dbscan(Dbscan),
    Agglomerative(Agglomerative),
    Gmm(Gmm),
    MeanShift(MeanShift),
}

impl ClustererModel {
    /// Fit on the whole feature matrix and return one label per row.
    pub fn fit_predict(&mut self, x: &[Vec<f64>]) -> Result<Vec<i64>> {
        match self {
            ClustererModel::KMeans(m) => m.fit_predict(x),
            ClustererModel::Dbscan(m) => m.fit_predict(x),
            ClustererModel::Agglomerative(m) => m.fit_predict(x),
            ClustererModel::Gmm(m) => m.fit_predict(x),
            ClustererModel::MeanShift(m) => m.fit_predict(x),
        }
    }

    /// Assign one new row to a learned cluster. Algorithms without an
    /// out-of-sample assignment rule return an error.
    pub fn predict_row(&self, row: &[f64]) -> Result<i64> {
        match self {
            ClustererModel::KMeans(m) => m.predict_row(row),
            ClustererModel::Dbscan(_) => Err(TabmlError::algorithm(
                "dbscan does not support out-of-sample prediction",
            )),
            ClustererModel::Agglomerative(_) => Err(TabmlError::algorithm(
                "hierarchical clustering does not support out-of-sample prediction",
            )),
            ClustererModel::Gmm(m) => m.predict_row(row),
            ClustererModel::MeanShift(m) => m.predict_row(row),
        }
    }
}

/// A fitted model of any problem type, as persisted in an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    Classifier(ClassifierModel),
    Regressor(RegressorModel),
    Clusterer(ClustererModel),
}

type ClassifierBuilder = fn(&TrainOptions) -> ClassifierModel;
type RegressorBuilder = fn(&TrainOptions) -> RegressorModel;
type ClustererBuilder = fn(&TrainOptions) -> ClustererModel;

/// Name -> constructor tables, one per problem type.
///
/// The default tables mirror the backend's public algorithm names. Callers
/// can inject a custom registry for tests or per-call overrides.
pub struct AlgorithmRegistry {
    classifiers: BTreeMap<String, ClassifierBuilder>,
    regressors: BTreeMap<String, RegressorBuilder>,
    clusterers: BTreeMap<String, ClustererBuilder>,
}

impl AlgorithmRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        AlgorithmRegistry {
            classifiers: BTreeMap::new(),
            regressors: BTreeMap::new(),
            clusterers: BTreeMap::new(),
        }
    }

    pub fn register_classifier(&mut self, name: &str, builder: ClassifierBuilder) {
        self.classifiers.insert(name.to_string(), builder);
    }

    pub fn register_regressor(&mut self, name: &str, builder: RegressorBuilder) {
        self.regressors.insert(name.to_string(), builder);
    }

    pub fn register_clusterer(&mut self, name: &str, builder: ClustererBuilder) {
        self.clusterers.insert(name.to_string(), builder);
    }

    /// Construct a fresh classifier for the given algorithm name.
    pub fn build_classifier(&self, name: &str, options: &TrainOptions) -> Option<ClassifierModel> {
        self.classifiers.get(name).map(|builder| builder(options))
    }

    /// Construct a fresh regressor for the given algorithm name.
    pub fn build_regressor(&self, name: &str, options: &TrainOptions) -> Option<RegressorModel> {
        self.regressors.get(name).map(|builder| builder(options))
    }

    /// Construct a fresh clusterer for the given algorithm name.
    pub fn build_clusterer(&self, name: &str, options: &TrainOptions) -> Option<ClustererModel> {
        self.clusterers.get(name).map(|builder| builder(options))
    }

    /// Whether the registry knows the algorithm for the given problem type.
    pub fn contains(&self, problem_type: ProblemType, name: &str) -> bool {
        match problem_type {
            ProblemType::Classification => self.classifiers.contains_key(name),
            ProblemType::Regression => self.regressors.contains_key(name),
            ProblemType::Clustering => self.clusterers.contains_key(name),
        }
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        let mut registry = AlgorithmRegistry::empty();

        registry.register_classifier("logistic_regression", |_| {
            ClassifierModel::Logistic(LogisticRegression::new())
        });
        registry.register_classifier("decision_tree", |_| {
            ClassifierModel::Tree(DecisionTreeClassifier::new())
        });
        registry.register_classifier("random_forest", |o| {
            ClassifierModel::Forest(RandomForestClassifier::new(o.seed))
        });
        registry.register_classifier("gradient_boosting", |_| {
            ClassifierModel::Boosting(GradientBoostingClassifier::new())
        });
        registry.register_classifier("knn", |_| ClassifierModel::Knn(KnnClassifier::new()));
        registry.register_classifier("naive_bayes", |_| {
            ClassifierModel::NaiveBayes(GaussianNb::new())
        });

        registry.register_regressor("linear_regression", |_| {
            RegressorModel::Linear(LinearRegression::new())
        });
        registry.register_regressor("ridge", |_| RegressorModel::Ridge(Ridge::new()));
        registry.register_regressor("lasso", |_| RegressorModel::Lasso(Lasso::new()));
        registry.register_regressor("decision_tree", |_| {
            RegressorModel::Tree(DecisionTreeRegressor::new())
        });
        registry.register_regressor("random_forest", |o| {
            RegressorModel::Forest(RandomForestRegressor::new(o.seed))
        });
        registry.register_regressor("gradient_boosting", |_| {
            RegressorModel::Boosting(GradientBoostingRegressor::new())
        });
        registry.register_regressor("knn", |_| RegressorModel::Knn(KnnRegressor::new()));

        registry.register_clusterer("kmeans", |o| {
            ClustererModel::KMeans(KMeans::new(o.n_clusters, o.seed))
        });
        registry.register_clusterer("dbscan", |_| ClustererModel::Dbscan(Dbscan::new()));
        registry.register_clusterer("hierarchical", |o| {
            ClustererModel::Agglomerative(Agglomerative::new(o.n_clusters))
        });
        registry.register_clusterer("gmm", |o| {
            ClustererModel::Gmm(Gmm::new(o.n_clusters, o.seed))
        });
        registry.register_clusterer("mean_shift", |_| {
            ClustererModel::MeanShift(MeanShift::new())
        });

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_type_parsing() {
        assert_eq!(
            "classification".parse::<ProblemType>().unwrap(),
            ProblemType::Classification
        );
        assert_eq!(
            "clustering".parse::<ProblemType>().unwrap(),
            ProblemType::Clustering
        );
        assert!("ranking".parse::<ProblemType>().is_err());
    }

    #[test]
    fn test_default_registry_contents() {
        let registry = AlgorithmRegistry::default();
        let options = TrainOptions::default();

        assert!(registry.contains(ProblemType::Classification, "logistic_regression"));
        assert!(registry.contains(ProblemType::Regression, "linear_regression"));
        assert!(registry.contains(ProblemType::Clustering, "kmeans"));
        assert!(!registry.contains(ProblemType::Classification, "not_a_real_algo"));

        assert!(registry.build_classifier("knn", &options).is_some());
        assert!(registry.build_regressor("ridge", &options).is_some());
        assert!(registry.build_clusterer("dbscan", &options).is_some());
        assert!(registry.build_classifier("svm", &options).is_none());
    }

    #[test]
    fn test_registry_injection() {
        let mut registry = AlgorithmRegistry::empty();
        assert!(!registry.contains(ProblemType::Classification, "knn"));

        registry.register_classifier("knn", |_| ClassifierModel::Knn(KnnClassifier::new()));
        assert!(registry.contains(ProblemType::Classification, "knn"));
    }

    #[test]
    fn test_euclidean_distance() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.0], &[1.0]), 0.0);
    }
}
