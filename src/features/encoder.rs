//! Categorical encoder for structured non-numeric columns.
//!
//! Distinct stringified training values are mapped to integer ids assigned
//! in sorted order. A value unseen during fitting encodes to the
//! [`UNSEEN_SENTINEL`] id at transform time; the miss is logged but never an
//! error.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Sentinel id substituted for categories unseen during fitting.
pub const UNSEEN_SENTINEL: i64 = -1;

/// A fitted value -> id mapping for one categorical column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEncoder {
    /// Distinct training values, sorted. A value's id is its index here.
    classes: Vec<String>,
}

impl CategoryEncoder {
    /// Fit an encoder from the stringified training values of one column.
    pub fn fit<I>(values: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut classes: Vec<String> = values.into_iter().collect();
        classes.sort();
        classes.dedup();
        CategoryEncoder { classes }
    }

    /// Encode one value. Unseen values map to [`UNSEEN_SENTINEL`].
    pub fn encode(&self, value: &str) -> i64 {
        match self.classes.binary_search_by(|c| c.as_str().cmp(value)) {
            Ok(index) => index as i64,
            Err(_) => {
                warn!(category = value, "unseen category mapped to sentinel id");
                UNSEEN_SENTINEL
            }
        }
    }

    /// Number of distinct categories seen during fitting.
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_id_assignment() {
        let encoder = CategoryEncoder::fit(
            ["pear", "apple", "plum", "apple"].iter().map(|s| s.to_string()),
        );
        assert_eq!(encoder.n_classes(), 3);
        assert_eq!(encoder.encode("apple"), 0);
        assert_eq!(encoder.encode("pear"), 1);
        assert_eq!(encoder.encode("plum"), 2);
    }

    #[test]
    fn test_unseen_category_gets_sentinel() {
        let encoder = CategoryEncoder::fit(["a", "b"].iter().map(|s| s.to_string()));
        assert_eq!(encoder.encode("zebra"), UNSEEN_SENTINEL);
    }

    #[test]
    fn test_refit_is_identical() {
        let values = || ["x", "y", "z", "y"].iter().map(|s| s.to_string());
        let first = CategoryEncoder::fit(values());
        let second = CategoryEncoder::fit(values());
        assert_eq!(first.classes, second.classes);
    }
}
