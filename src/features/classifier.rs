//! Per-column feature-type detection.
//!
//! A column holding long free-form strings gets vectorized; everything else
//! is treated as structured (numeric or categorical) data. The decision is
//! made once at training time from a bounded sample and stored in the
//! artifact — prediction never reclassifies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::{cell_to_string, is_missing};

/// How many non-missing values are sampled per column.
pub const SAMPLE_SIZE: usize = 100;

/// Mean stringified length above which a column counts as text.
pub const TEXT_LENGTH_THRESHOLD: f64 = 20.0;

/// The role a feature column plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    /// Free-form text, vectorized with TF-IDF.
    Text,
    /// Numeric or categorical data.
    Structured,
}

/// Classify a column from its values.
///
/// Looks at the first [`SAMPLE_SIZE`] non-missing values and compares their
/// mean stringified length against [`TEXT_LENGTH_THRESHOLD`]. A column with
/// no usable values defaults to [`ColumnRole::Structured`].
pub fn classify_column(values: &[Option<&Value>]) -> ColumnRole {
    let mut total_len = 0usize;
    let mut sampled = 0usize;

    for value in values {
        if is_missing(*value) {
            continue;
        }
        // `is_missing` returned false, so the value is present.
        total_len += cell_to_string(value.unwrap()).chars().count();
        sampled += 1;
        if sampled == SAMPLE_SIZE {
            break;
        }
    }

    if sampled == 0 {
        return ColumnRole::Structured;
    }

    if total_len as f64 / sampled as f64 > TEXT_LENGTH_THRESHOLD {
        ColumnRole::Text
    } else {
        ColumnRole::Structured
    }
}
