//! Standard scaler for the structured feature block.
//!
//! Fitted over the encoded/numeric structured columns at training time and
//! replayed as-is at prediction time. TF-IDF blocks are already weighted and
//! are not scaled.

use serde::{Deserialize, Serialize};

/// Per-column mean/standard-deviation scaler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit the scaler on a block of rows (each row one value per structured
    /// column). A constant column scales with a standard deviation of 1.0 so
    /// its values collapse to zero instead of dividing by zero.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let n_columns = rows.first().map_or(0, |r| r.len());
        let n_rows = rows.len() as f64;

        let mut means = vec![0.0; n_columns];
        for row in rows {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        for mean in &mut means {
            *mean /= n_rows;
        }

        let mut stds = vec![0.0; n_columns];
        for row in rows {
            for (column, value) in row.iter().enumerate() {
                let delta = value - means[column];
                stds[column] += delta * delta;
            }
        }
        for std in &mut stds {
            *std = (*std / n_rows).sqrt();
            if *std == 0.0 {
                *std = 1.0;
            }
        }

        StandardScaler { means, stds }
    }

    /// Scale one value from the given column.
    pub fn scale(&self, column: usize, value: f64) -> f64 {
        (value - self.means[column]) / self.stds[column]
    }

    /// Number of columns this scaler was fitted on.
    pub fn n_columns(&self) -> usize {
        self.means.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling_centers_and_normalizes() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let scaler = StandardScaler::fit(&rows);

        let scaled: Vec<f64> = rows.iter().map(|r| scaler.scale(0, r[0])).collect();
        let mean: f64 = scaled.iter().sum::<f64>() / scaled.len() as f64;
        assert!(mean.abs() < 1e-12);
        assert!(scaled[0] < 0.0 && scaled[2] > 0.0);
    }

    #[test]
    fn test_constant_column_is_safe() {
        let rows = vec![vec![5.0], vec![5.0], vec![5.0]];
        let scaler = StandardScaler::fit(&rows);
        assert_eq!(scaler.scale(0, 5.0), 0.0);
        assert!(scaler.scale(0, 6.0).is_finite());
    }

    #[test]
    fn test_empty_block() {
        let rows: Vec<Vec<f64>> = Vec::new();
        let scaler = StandardScaler::fit(&rows);
        assert_eq!(scaler.n_columns(), 0);
    }
}
