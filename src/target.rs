//! Target encoding and decoding.
//!
//! Classification targets are encoded to ordinal class ids; regression
//! targets pass through untouched. The codec is persisted in the artifact so
//! prediction can reverse the mapping exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::{cell_to_f64, cell_to_string};
use crate::error::{Result, TabmlError};

/// A class label as it appeared in the training data.
///
/// A dedicated scalar type rather than a raw JSON value: the artifact blob
/// is a non-self-describing binary format, and this round-trips through it
/// while still decoding numeric labels back to numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassLabel {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ClassLabel {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ClassLabel::Int(i)
                } else if let Some(f) = n.as_f64() {
                    ClassLabel::Float(f)
                } else {
                    ClassLabel::Text(n.to_string())
                }
            }
            Value::Bool(b) => ClassLabel::Bool(*b),
            other => ClassLabel::Text(cell_to_string(other)),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            ClassLabel::Text(s) => Value::String(s.clone()),
            ClassLabel::Int(i) => Value::from(*i),
            ClassLabel::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number)
            }
            ClassLabel::Bool(b) => Value::Bool(*b),
        }
    }
}

/// One encoded class: the stringified key it is matched by, plus the
/// original label it decodes back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedClass {
    key: String,
    label: ClassLabel,
}

/// Reversible target transformation fitted at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TargetCodec {
    /// Regression: values used as-is.
    Identity,
    /// Classification: class id `i` decodes to `classes[i]`.
    ///
    /// Classes are the distinct target values ordered by their string form,
    /// so a refit over the same data reproduces the same ids.
    Categorical { classes: Vec<EncodedClass> },
}

impl TargetCodec {
    /// Build a categorical codec from the target column's values.
    pub fn fit_categorical<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut classes: Vec<EncodedClass> = values
            .into_iter()
            .map(|v| EncodedClass {
                key: cell_to_string(v),
                label: ClassLabel::from_value(v),
            })
            .collect();
        classes.sort_by(|a, b| a.key.cmp(&b.key));
        classes.dedup_by(|a, b| a.key == b.key);

        TargetCodec::Categorical { classes }
    }

    /// Encode one target value to its class id.
    ///
    /// Only meaningful for categorical codecs; the value must have been seen
    /// when the codec was fitted.
    pub fn encode_class(&self, value: &Value) -> Result<usize> {
        match self {
            TargetCodec::Identity => Err(TabmlError::internal(
                "encode_class called on an identity codec",
            )),
            TargetCodec::Categorical { classes } => {
                let key = cell_to_string(value);
                classes
                    .binary_search_by(|c| c.key.as_str().cmp(key.as_str()))
                    .map_err(|_| {
                        TabmlError::validation(format!("target label '{key}' not seen in training"))
                    })
            }
        }
    }

    /// Decode a predicted class id back to the original label.
    ///
    /// An id outside the recorded range falls back to the raw id itself — a
    /// recoverable decode miss, never an error.
    pub fn decode_label(&self, id: i64) -> Value {
        match self {
            TargetCodec::Identity => Value::from(id),
            TargetCodec::Categorical { classes } => {
                if id >= 0 && (id as usize) < classes.len() {
                    classes[id as usize].label.to_value()
                } else {
                    Value::from(id)
                }
            }
        }
    }

    /// Parse one target value as a number (regression targets).
    pub fn encode_numeric(value: &Value) -> Result<f64> {
        cell_to_f64(value).ok_or_else(|| {
            TabmlError::validation(format!(
                "target value '{}' is not numeric",
                cell_to_string(value)
            ))
        })
    }

    /// Number of classes (zero for identity codecs).
    pub fn n_classes(&self) -> usize {
        match self {
            TargetCodec::Identity => 0,
            TargetCodec::Categorical { classes } => classes.len(),
        }
    }
}
