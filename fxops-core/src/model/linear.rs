//! Ordinary least squares linear regression.
//!
//! Fits `y = intercept + Σ coef_j · x_j` by solving the normal equations on
//! centered data. Lag features of a smooth series are close to collinear, so
//! the solver is rank-revealing: Gauss-Jordan elimination with partial
//! pivoting, where a column whose pivot falls below a relative tolerance is
//! treated as free and its coefficient fixed at zero. Any least-squares
//! solution predicts identically on the span of the training data.

use super::ModelError;
use serde::{Deserialize, Serialize};

/// Pivots smaller than this fraction of the largest diagonal entry are rank
/// deficient.
const RANK_TOLERANCE: f64 = 1e-10;

/// Fitted linear mapping from named features to the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub fit_intercept: bool,
    /// Number of linearly independent features found during the fit.
    pub rank: usize,
}

impl LinearModel {
    /// Predict from column-major features in `feature_names` order.
    pub fn predict(&self, features: &[&[f64]]) -> Result<Vec<f64>, ModelError> {
        if features.len() != self.coefficients.len() {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }
        let n = rows_of(features)?;
        Ok((0..n)
            .map(|i| {
                self.intercept
                    + features
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(col, c)| col[i] * c)
                        .sum::<f64>()
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LinearRegression {
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self {
            fit_intercept: true,
        }
    }
}

impl LinearRegression {
    /// Fit on column-major `features` (one slice per feature) and `target`.
    pub fn fit(
        &self,
        feature_names: &[String],
        features: &[&[f64]],
        target: &[f64],
    ) -> Result<LinearModel, ModelError> {
        if features.is_empty() {
            return Err(ModelError::NoFeatures);
        }
        if feature_names.len() != features.len() {
            return Err(ModelError::FeatureCountMismatch {
                expected: feature_names.len(),
                actual: features.len(),
            });
        }
        let n = rows_of(features)?;
        if n != target.len() {
            return Err(ModelError::LengthMismatch {
                expected: target.len(),
                actual: n,
            });
        }
        if n == 0 {
            return Err(ModelError::InsufficientRows {
                required: 1,
                actual: 0,
            });
        }
        if features.iter().any(|c| c.iter().any(|v| !v.is_finite()))
            || target.iter().any(|v| !v.is_finite())
        {
            return Err(ModelError::NonFinite);
        }

        let p = features.len();
        let (x_means, y_mean) = if self.fit_intercept {
            (
                features.iter().map(|c| mean(c)).collect::<Vec<_>>(),
                mean(target),
            )
        } else {
            (vec![0.0; p], 0.0)
        };

        // Normal equations: (XᵀX) β = Xᵀy on centered columns.
        let mut gram = vec![vec![0.0; p]; p];
        let mut rhs = vec![0.0; p];
        for i in 0..n {
            let yc = target[i] - y_mean;
            for a in 0..p {
                let xa = features[a][i] - x_means[a];
                rhs[a] += xa * yc;
                for b in a..p {
                    gram[a][b] += xa * (features[b][i] - x_means[b]);
                }
            }
        }
        for a in 0..p {
            for b in 0..a {
                gram[a][b] = gram[b][a];
            }
        }

        let (coefficients, rank) = solve_least_squares(gram, rhs);
        let intercept = if self.fit_intercept {
            y_mean
                - coefficients
                    .iter()
                    .zip(&x_means)
                    .map(|(c, m)| c * m)
                    .sum::<f64>()
        } else {
            0.0
        };

        Ok(LinearModel {
            feature_names: feature_names.to_vec(),
            coefficients,
            intercept,
            fit_intercept: self.fit_intercept,
            rank,
        })
    }
}

/// Reduce `[a | b]` to row echelon form and read off a solution with free
/// variables at zero. Returns the solution and the numerical rank.
fn solve_least_squares(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> (Vec<f64>, usize) {
    let p = b.len();
    let scale = (0..p).map(|i| a[i][i].abs()).fold(0.0, f64::max);
    let tol = scale * RANK_TOLERANCE;

    let mut pivot_cols = Vec::with_capacity(p);
    let mut row = 0;
    for col in 0..p {
        if row == p {
            break;
        }
        let best = (row..p)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(row);
        if a[best][col].abs() <= tol {
            continue;
        }
        a.swap(row, best);
        b.swap(row, best);

        let pivot = a[row][col];
        for k in col..p {
            a[row][k] /= pivot;
        }
        b[row] /= pivot;

        for r in 0..p {
            if r == row {
                continue;
            }
            let factor = a[r][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..p {
                a[r][k] -= factor * a[row][k];
            }
            b[r] -= factor * b[row];
        }
        pivot_cols.push(col);
        row += 1;
    }

    let mut solution = vec![0.0; p];
    for (r, &col) in pivot_cols.iter().enumerate() {
        solution[col] = b[r];
    }
    (solution, pivot_cols.len())
}

fn rows_of(features: &[&[f64]]) -> Result<usize, ModelError> {
    let n = features.first().map_or(0, |c| c.len());
    if let Some(bad) = features.iter().find(|c| c.len() != n) {
        return Err(ModelError::LengthMismatch {
            expected: n,
            actual: bad.len(),
        });
    }
    Ok(n)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
