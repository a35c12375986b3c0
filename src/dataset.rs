//! Tabular dataset types and cell-value helpers.
//!
//! A dataset is an ordered sequence of rows, each a mapping from column name
//! to a JSON scalar. The surrounding layer (file parsing, upload handling)
//! produces these rows; this module only validates their shape and provides
//! the value coercions the feature pipeline relies on.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Result, TabmlError};

/// A single raw row: column name to scalar value.
pub type Record = BTreeMap<String, Value>;

/// Returns true if a cell counts as missing: an absent key, JSON `null`, or
/// an empty / all-whitespace string.
pub fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Stringify a scalar cell without JSON quoting. Missing values become the
/// empty string.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Interpret a cell as a number, accepting numeric strings.
pub fn cell_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// A validated view over a slice of raw rows.
///
/// Construction enforces the dataset invariants: at least one row, and every
/// row carrying exactly the same column set.
#[derive(Debug)]
pub struct Dataset<'a> {
    rows: &'a [Record],
    columns: Vec<String>,
}

impl<'a> Dataset<'a> {
    /// Validate the rows and build a dataset view over them.
    pub fn new(rows: &'a [Record]) -> Result<Self> {
        let first = rows
            .first()
            .ok_or_else(|| TabmlError::validation("dataset is empty"))?;
        let columns: Vec<String> = first.keys().cloned().collect();

        for (index, row) in rows.iter().enumerate().skip(1) {
            if row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(c)) {
                return Err(TabmlError::validation(format!(
                    "row {index} does not share the dataset's column set"
                )));
            }
        }

        Ok(Dataset { rows, columns })
    }

    /// The rows backing this dataset.
    pub fn rows(&self) -> &'a [Record] {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the dataset holds no rows. `new` rejects this, so it only
    /// exists to satisfy the `len`/`is_empty` convention.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names, in the order they appear in the first row.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// True if the dataset has the named column.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Feature column names: every column except the target, preserving
    /// dataset order.
    pub fn feature_columns(&self, target: Option<&str>) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| Some(c.as_str()) != target)
            .cloned()
            .collect()
    }

    /// All values of one column, row by row.
    pub fn column_values(&self, name: &str) -> Vec<Option<&'a Value>> {
        self.rows.iter().map(|row| row.get(name)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let rows: Vec<Record> = Vec::new();
        assert!(matches!(
            Dataset::new(&rows),
            Err(TabmlError::Validation(_))
        ));
    }

    #[test]
    fn test_inconsistent_columns_rejected() {
        let rows = vec![
            row(&[("a", json!(1)), ("b", json!(2))]),
            row(&[("a", json!(3)), ("c", json!(4))]),
        ];
        let err = Dataset::new(&rows).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_feature_columns_exclude_target() {
        let rows = vec![row(&[
            ("age", json!(30)),
            ("city", json!("Osaka")),
            ("label", json!("yes")),
        ])];
        let dataset = Dataset::new(&rows).unwrap();
        assert_eq!(dataset.feature_columns(Some("label")), vec!["age", "city"]);
        assert_eq!(
            dataset.feature_columns(None),
            vec!["age", "city", "label"]
        );
    }

    #[test]
    fn test_missing_and_coercions() {
        assert!(is_missing(None));
        assert!(is_missing(Some(&Value::Null)));
        assert!(is_missing(Some(&json!("   "))));
        assert!(!is_missing(Some(&json!(0))));

        assert_eq!(cell_to_string(&json!("text")), "text");
        assert_eq!(cell_to_string(&json!(2.5)), "2.5");
        assert_eq!(cell_to_f64(&json!("3.5")), Some(3.5));
        assert_eq!(cell_to_f64(&json!("abc")), None);
        assert_eq!(cell_to_f64(&json!(true)), Some(1.0));
    }
}
