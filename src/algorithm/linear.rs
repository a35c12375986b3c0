//! Linear regression models: ordinary least squares, ridge, and lasso.
//!
//! OLS and ridge solve the normal equations with Gaussian elimination; lasso
//! runs bounded coordinate descent. All three carry an intercept term.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabmlError};

const LASSO_MAX_ITER: usize = 1000;
const LASSO_TOLERANCE: f64 = 1e-4;

/// Ordinary least squares regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        LinearRegression {
            coefficients: Vec::new(),
            intercept: 0.0,
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let (coefficients, intercept) = solve_normal_equations(x, y, 0.0)?;
        self.coefficients = coefficients;
        self.intercept = intercept;
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        dot(&self.coefficients, row) + self.intercept
    }
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

/// Ridge regression with L2 penalty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ridge {
    alpha: f64,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl Ridge {
    pub fn new() -> Self {
        Ridge {
            alpha: 1.0,
            coefficients: Vec::new(),
            intercept: 0.0,
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let (coefficients, intercept) = solve_normal_equations(x, y, self.alpha)?;
        self.coefficients = coefficients;
        self.intercept = intercept;
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        dot(&self.coefficients, row) + self.intercept
    }
}

impl Default for Ridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Lasso regression with L1 penalty, fitted by coordinate descent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lasso {
    alpha: f64,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl Lasso {
    pub fn new() -> Self {
        Lasso {
            alpha: 1.0,
            coefficients: Vec::new(),
            intercept: 0.0,
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TabmlError::algorithm(
                "lasso requires a non-empty feature matrix matching the target length",
            ));
        }

        let n = x.len();
        let d = x[0].len();
        let mut weights = vec![0.0; d];
        let mut intercept = y.iter().sum::<f64>() / n as f64;

        // Column squared norms for the coordinate updates.
        let mut column_norms = vec![0.0; d];
        for row in x {
            for (norm, value) in column_norms.iter_mut().zip(row) {
                *norm += value * value;
            }
        }

        // residual = y - Xw - b
        let mut residual: Vec<f64> = x
            .iter()
            .zip(y)
            .map(|(row, target)| target - dot(&weights, row) - intercept)
            .collect();

        for _ in 0..LASSO_MAX_ITER {
            let mut max_delta: f64 = 0.0;

            for j in 0..d {
                if column_norms[j] == 0.0 {
                    continue;
                }
                let rho: f64 = x
                    .iter()
                    .zip(&residual)
                    .map(|(row, r)| row[j] * (r + row[j] * weights[j]))
                    .sum();
                let updated = soft_threshold(rho, self.alpha * n as f64) / column_norms[j];
                let delta = updated - weights[j];
                if delta != 0.0 {
                    for (r, row) in residual.iter_mut().zip(x) {
                        *r -= delta * row[j];
                    }
                    weights[j] = updated;
                    max_delta = max_delta.max(delta.abs());
                }
            }

            // Re-center the intercept on the residual mean.
            let shift = residual.iter().sum::<f64>() / n as f64;
            if shift != 0.0 {
                intercept += shift;
                for r in &mut residual {
                    *r -= shift;
                }
                max_delta = max_delta.max(shift.abs());
            }

            if max_delta < LASSO_TOLERANCE {
                break;
            }
        }

        self.coefficients = weights;
        self.intercept = intercept;
        Ok(())
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        dot(&self.coefficients, row) + self.intercept
    }
}

impl Default for Lasso {
    fn default() -> Self {
        Self::new()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Solve `(X'X + alpha·I) w = X'y` with an appended bias column (the bias is
/// not penalized). Returns the coefficient vector and intercept.
fn solve_normal_equations(x: &[Vec<f64>], y: &[f64], alpha: f64) -> Result<(Vec<f64>, f64)> {
    if x.is_empty() || x.len() != y.len() {
        return Err(TabmlError::algorithm(
            "linear model requires a non-empty feature matrix matching the target length",
        ));
    }

    let d = x[0].len();
    let width = d + 1; // bias column appended

    let mut gram = vec![vec![0.0; width]; width];
    let mut moment = vec![0.0; width];

    for (row, &target) in x.iter().zip(y) {
        for i in 0..width {
            let xi = if i < d { row[i] } else { 1.0 };
            moment[i] += xi * target;
            for j in i..width {
                let xj = if j < d { row[j] } else { 1.0 };
                gram[i][j] += xi * xj;
            }
        }
    }
    // Mirror the upper triangle and apply the penalty to non-bias terms.
    for i in 0..width {
        for j in 0..i {
            gram[i][j] = gram[j][i];
        }
        if i < d {
            gram[i][i] += alpha;
        }
    }

    let solution = solve_linear_system(gram, moment)?;
    let intercept = solution[d];
    let coefficients = solution[..d].to_vec();
    Ok((coefficients, intercept))
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();

    for column in 0..n {
        let pivot_row = (column..n)
            .max_by(|&i, &j| {
                a[i][column]
                    .abs()
                    .partial_cmp(&a[j][column].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(column);
        if a[pivot_row][column].abs() < 1e-12 {
            return Err(TabmlError::algorithm(
                "singular design matrix; features are linearly dependent",
            ));
        }
        a.swap(column, pivot_row);
        b.swap(column, pivot_row);

        for row in (column + 1)..n {
            let factor = a[row][column] / a[column][column];
            if factor == 0.0 {
                continue;
            }
            for k in column..n {
                a[row][k] -= factor * a[column][k];
            }
            b[row] -= factor * b[column];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[row][k] * solution[k];
        }
        solution[row] = sum / a[row][row];
    }
    Ok(solution)
}
