//! Prediction over stored artifacts.
//!
//! Loads an artifact, replays its feature space in transform-only mode over
//! each raw record, runs the model, decodes labels, and reports a
//! confidence. Records in a batch are processed independently: one record's
//! transform failure never blocks the others.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::algorithm::{FittedModel, ProblemType};
use crate::artifact::{ArtifactStore, ModelArtifact};
use crate::dataset::Record;
use crate::error::{Result, TabmlError};
use crate::metrics::{Metrics, classification_metrics, regression_metrics};
use crate::target::TargetCodec;

/// Predictor knobs.
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    /// Confidence reported when the model exposes no probability output.
    /// A product default rather than a derived quantity, so it stays
    /// configurable.
    pub default_confidence: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        PredictorConfig {
            default_confidence: 0.5,
        }
    }
}

/// One successful prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Decoded label, regression value, or cluster id.
    pub value: Value,
    /// Max class probability, or the configured neutral default when the
    /// model exposes none. Always present.
    pub confidence: f64,
    /// Full class-probability vector when available.
    pub probabilities: Option<Vec<f64>>,
}

/// Per-record outcome in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Success { prediction: Prediction },
    Failed { error: String },
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RecordOutcome::Success { .. })
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            RecordOutcome::Success { prediction } => Some(prediction),
            RecordOutcome::Failed { .. } => None,
        }
    }
}

/// Scores new records against stored artifacts.
pub struct Predictor<'a> {
    store: &'a ArtifactStore,
    config: PredictorConfig,
}

impl<'a> Predictor<'a> {
    pub fn new(store: &'a ArtifactStore) -> Self {
        Predictor {
            store,
            config: PredictorConfig::default(),
        }
    }

    pub fn with_config(store: &'a ArtifactStore, config: PredictorConfig) -> Self {
        Predictor { store, config }
    }

    /// Predict a batch of records. Artifact lookup errors propagate;
    /// per-record failures are isolated into `RecordOutcome::Failed`.
    pub fn predict(&self, artifact_id: &str, records: &[Record]) -> Result<Vec<RecordOutcome>> {
        let artifact = self.store.load(artifact_id)?;

        Ok(records
            .iter()
            .map(|record| match self.predict_record(&artifact, record) {
                Ok(prediction) => RecordOutcome::Success { prediction },
                Err(error) => RecordOutcome::Failed {
                    error: error.to_string(),
                },
            })
            .collect())
    }

    /// Replay training-evaluation over externally labeled rows: predict each
    /// row and recompute the metric set for the artifact's problem type.
    pub fn evaluate(
        &self,
        artifact_id: &str,
        rows: &[Record],
        target_column: &str,
    ) -> Result<Metrics> {
        let artifact = self.store.load(artifact_id)?;
        if rows.is_empty() {
            return Err(TabmlError::validation("evaluation rows are empty"));
        }

        match artifact.problem_type {
            ProblemType::Classification => {
                let mut y_true = Vec::with_capacity(rows.len());
                let mut y_pred = Vec::with_capacity(rows.len());
                for row in rows {
                    let label = row.get(target_column).ok_or_else(|| {
                        TabmlError::validation(format!(
                            "evaluation row is missing target column '{target_column}'"
                        ))
                    })?;
                    y_true.push(artifact.target_codec.encode_class(label)?);

                    let features = artifact.feature_space.transform_record(row)?;
                    match &artifact.model {
                        FittedModel::Classifier(model) => y_pred.push(model.predict_row(&features)),
                        _ => {
                            return Err(TabmlError::artifact_format(
                                "classification artifact does not contain a classifier",
                            ));
                        }
                    }
                }
                let n_classes = artifact.target_codec.n_classes();
                Ok(Metrics::Classification(classification_metrics(
                    &y_true, &y_pred, n_classes,
                )))
            }
            ProblemType::Regression => {
                let mut y_true = Vec::with_capacity(rows.len());
                let mut y_pred = Vec::with_capacity(rows.len());
                for row in rows {
                    let target = row.get(target_column).ok_or_else(|| {
                        TabmlError::validation(format!(
                            "evaluation row is missing target column '{target_column}'"
                        ))
                    })?;
                    y_true.push(TargetCodec::encode_numeric(target)?);

                    let features = artifact.feature_space.transform_record(row)?;
                    match &artifact.model {
                        FittedModel::Regressor(model) => y_pred.push(model.predict_row(&features)),
                        _ => {
                            return Err(TabmlError::artifact_format(
                                "regression artifact does not contain a regressor",
                            ));
                        }
                    }
                }
                Ok(Metrics::Regression(regression_metrics(&y_true, &y_pred)))
            }
            ProblemType::Clustering => Err(TabmlError::validation(
                "clustering artifacts cannot be evaluated against labels",
            )),
        }
    }

    fn predict_record(&self, artifact: &ModelArtifact, record: &Record) -> Result<Prediction> {
        let features = artifact.feature_space.transform_record(record)?;

        match &artifact.model {
            FittedModel::Classifier(model) => {
                let class = model.predict_row(&features);
                let value = artifact.target_codec.decode_label(class as i64);

                if artifact.supports_probability {
                    let probabilities = model.predict_proba(&features);
                    let confidence = probabilities
                        .iter()
                        .fold(0.0f64, |acc, &p| acc.max(p));
                    Ok(Prediction {
                        value,
                        confidence,
                        probabilities: Some(probabilities),
                    })
                } else {
                    Ok(Prediction {
                        value,
                        confidence: self.config.default_confidence,
                        probabilities: None,
                    })
                }
            }
            FittedModel::Regressor(model) => {
                let prediction = model.predict_row(&features);
                Ok(Prediction {
                    value: number_value(prediction),
                    confidence: self.config.default_confidence,
                    probabilities: None,
                })
            }
            FittedModel::Clusterer(model) => {
                let cluster = model.predict_row(&features)?;
                Ok(Prediction {
                    value: Value::from(cluster),
                    confidence: self.config.default_confidence,
                    probabilities: None,
                })
            }
        }
    }
}

/// A finite JSON number; non-finite predictions degrade to null rather than
/// producing unserializable output.
fn number_value(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}
