//! Feature assembly: fit-once transformation state and its replay.
//!
//! [`FeatureSpace`] owns the per-column transformers and the column order
//! they were fitted in. Training fits it once; the artifact persists it;
//! prediction replays it in transform-only mode. Assembly concatenates each
//! retained column's output (a TF-IDF block for text, one scaled value for
//! structured data) in fitted order, independent of the key order of the raw
//! record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::dataset::{Dataset, Record, cell_to_f64, cell_to_string, is_missing};
use crate::error::{Result, TabmlError};
use crate::features::classifier::{ColumnRole, classify_column};
use crate::features::encoder::CategoryEncoder;
use crate::features::scaler::StandardScaler;
use crate::features::text::TfidfVectorizer;
use crate::features::FeatureMatrix;

/// The complete fitted preprocessing state for one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpace {
    /// Retained feature columns in dataset order. This order is the feature
    /// matrix layout and is replayed exactly at prediction time.
    feature_columns: Vec<String>,
    /// Columns vectorized as text.
    text_columns: Vec<String>,
    /// Columns treated as structured data.
    structured_columns: Vec<String>,
    /// Fitted vectorizer per text column.
    vectorizers: BTreeMap<String, TfidfVectorizer>,
    /// Fitted encoder per categorical structured column. Numeric columns
    /// carry no entry.
    encoders: BTreeMap<String, CategoryEncoder>,
    /// Scaler over the structured block, fitted on training rows.
    scaler: StandardScaler,
}

impl FeatureSpace {
    /// Classify and fit every feature column of the dataset, returning the
    /// fitted space together with the assembled training matrix.
    pub fn fit(dataset: &Dataset<'_>, target: Option<&str>) -> Result<(Self, FeatureMatrix)> {
        let mut feature_columns = Vec::new();
        let mut text_columns = Vec::new();
        let mut structured_columns = Vec::new();
        let mut vectorizers = BTreeMap::new();
        let mut encoders = BTreeMap::new();

        for column in dataset.feature_columns(target) {
            let values = dataset.column_values(&column);
            match classify_column(&values) {
                ColumnRole::Text => {
                    let documents: Vec<String> =
                        values.iter().map(|v| document_for(*v)).collect();
                    match TfidfVectorizer::fit(&documents) {
                        Ok(vectorizer) => {
                            vectorizers.insert(column.clone(), vectorizer);
                            text_columns.push(column.clone());
                            feature_columns.push(column);
                        }
                        Err(error) => {
                            warn!(column = %column, %error, "dropping text column");
                        }
                    }
                }
                ColumnRole::Structured => {
                    let numeric = values
                        .iter()
                        .all(|v| is_missing(*v) || cell_to_f64(v.unwrap()).is_some());
                    if !numeric {
                        let encoder =
                            CategoryEncoder::fit(values.iter().map(|v| category_for(*v)));
                        encoders.insert(column.clone(), encoder);
                    }
                    structured_columns.push(column.clone());
                    feature_columns.push(column);
                }
            }
        }

        if feature_columns.is_empty() {
            return Err(TabmlError::validation(
                "no usable feature columns in dataset",
            ));
        }

        let mut space = FeatureSpace {
            feature_columns,
            text_columns,
            structured_columns,
            vectorizers,
            encoders,
            scaler: StandardScaler::default(),
        };

        // The scaler is fitted over the raw structured block, then the
        // training matrix is assembled through the same transform path the
        // predictor uses.
        let block: Vec<Vec<f64>> = dataset
            .rows()
            .iter()
            .map(|row| {
                space
                    .structured_columns
                    .iter()
                    .map(|column| space.structured_raw(column, row.get(column)))
                    .collect()
            })
            .collect();
        space.scaler = StandardScaler::fit(&block);

        let matrix = dataset
            .rows()
            .iter()
            .map(|row| space.transform_record(row))
            .collect::<Result<FeatureMatrix>>()?;

        Ok((space, matrix))
    }

    /// Transform one raw record into a feature vector, reusing the fitted
    /// state. A feature column absent from the record is a validation
    /// error naming the column; extra columns are ignored.
    pub fn transform_record(&self, record: &Record) -> Result<Vec<f64>> {
        let mut features = Vec::with_capacity(self.dimension());
        let mut structured_index = 0usize;

        for column in &self.feature_columns {
            if !record.contains_key(column) {
                return Err(TabmlError::validation(format!(
                    "input record is missing feature column '{column}'"
                )));
            }
            let value = record.get(column);

            if let Some(vectorizer) = self.vectorizers.get(column) {
                features.extend(vectorizer.transform(&document_for(value)));
            } else {
                let raw = self.structured_raw(column, value);
                features.push(self.scaler.scale(structured_index, raw));
                structured_index += 1;
            }
        }

        Ok(features)
    }

    /// Raw (pre-scaling) value of one structured column cell.
    fn structured_raw(&self, column: &str, value: Option<&Value>) -> f64 {
        if let Some(encoder) = self.encoders.get(column) {
            return encoder.encode(&category_for(value)) as f64;
        }
        if is_missing(value) {
            return 0.0;
        }
        match cell_to_f64(value.unwrap()) {
            Some(number) => number,
            None => {
                warn!(column = %column, "non-numeric value in numeric column treated as missing");
                0.0
            }
        }
    }

    /// Retained feature columns in matrix order.
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Columns vectorized as text.
    pub fn text_columns(&self) -> &[String] {
        &self.text_columns
    }

    /// Columns treated as structured data.
    pub fn structured_columns(&self) -> &[String] {
        &self.structured_columns
    }

    /// Total width of the assembled feature vector.
    pub fn dimension(&self) -> usize {
        self.feature_columns
            .iter()
            .map(|column| {
                self.vectorizers
                    .get(column)
                    .map_or(1, TfidfVectorizer::dimension)
            })
            .sum()
    }
}

/// Missing-filled stringified form used for text columns.
fn document_for(value: Option<&Value>) -> String {
    if is_missing(value) {
        String::new()
    } else {
        cell_to_string(value.unwrap())
    }
}

/// Missing-filled stringified form used for categorical columns.
fn category_for(value: Option<&Value>) -> String {
    document_for(value)
}
