use anyhow::{Context, Result};
use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    dataset::{DataPoint, Dataset},
    linalg::{dot, matrix_rows, norm, Matrix, Vector},
};

/// Gram eigenvalues at or below this fraction of the largest one are
/// treated as zero variance.
const DEGENERATE_RATIO: f64 = 1e-10;

/// Principal component model: a mean face and an orthonormal basis of the
/// top-k variance directions, one column per component.
#[derive(Debug, Clone)]
pub struct PcaModel {
    mean: Vector,
    basis: Matrix,
    eigenvalues: Vec<f64>,
    total_variance: f64,
}

impl PcaModel {
    /// Fits `k` components to the feature vectors of `training`.
    ///
    /// Face datasets have far more pixels than samples, so the eigenvectors
    /// come from the `n × n` Gram matrix of the centred data rather than the
    /// `dim_x × dim_x` covariance. An eigenvector `u` of `A·Aᵀ` maps to the
    /// covariance eigenvector `Aᵀ·u`, whose squared norm is the Gram
    /// eigenvalue. Components with no variance left are filled in by
    /// Gram-Schmidt so the basis stays orthonormal.
    pub fn fit(training: &Dataset, k: usize) -> Result<Self> {
        let n = training.len();
        let dim_x = training.dim_x();
        let max = dim_x.min(n);
        if k == 0 || k > max {
            return Err(PcaError::InvalidComponents { k, max }.into());
        }

        let data = training.feature_matrix().context("Fitting PCA")?;
        let mean = data.mean_row();
        let centered = data.sub(&matrix_rows(&mean, n)).context("Centre training data")?;

        debug!("computing {}x{} gram matrix over {} features", n, n, dim_x);
        let gram = centered.gram();
        let eigen = gram.symmetric_eigen().context("Decompose gram matrix")?;

        let largest = eigen.values.first().copied().unwrap_or(0.0).max(0.0);
        let denominator = if n > 1 { (n - 1) as f64 } else { 1.0 };
        let total_variance = eigen.values.iter().map(|v| v.max(0.0)).sum::<f64>() / denominator;

        let mut columns: Vec<Vector> = Vec::with_capacity(k);
        let mut degenerate = Vec::new();
        for i in 0..k {
            let value = eigen.values[i];
            if value <= largest * DEGENERATE_RATIO || value <= 0.0 {
                degenerate.push(i);
                columns.push(Vector::zeros(dim_x));
                continue;
            }
            let u = eigen.vectors.get_col(i)?;
            let mut v = centered.vec_mul_left(&u)?;
            let length = v.norm();
            if length == 0.0 {
                degenerate.push(i);
                columns.push(Vector::zeros(dim_x));
                continue;
            }
            v = v.scale(1.0 / length);
            columns.push(v);
        }
        if !degenerate.is_empty() {
            warn!(
                "{} of {} components carry no variance, completing basis",
                degenerate.len(),
                k
            );
            complete_basis(&mut columns, &degenerate);
        }

        let eigenvalues = eigen.values[..k]
            .iter()
            .map(|v| v.max(0.0) / denominator)
            .collect::<Vec<f64>>();
        let basis = Matrix::from_columns(&columns)?;
        info!("fitted {} components on {} samples of {} features", k, n, dim_x);

        Ok(Self {
            mean,
            basis,
            eigenvalues,
            total_variance,
        })
    }

    pub fn mean(&self) -> &Vector {
        &self.mean
    }

    /// `dim_x × k`, column i is the i-th principal direction.
    pub fn basis(&self) -> &Matrix {
        &self.basis
    }

    pub fn components(&self) -> usize {
        self.basis.width()
    }

    /// Sample-covariance variance of each kept component, descending.
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        if self.total_variance <= 0.0 {
            return vec![0.0; self.eigenvalues.len()];
        }
        self.eigenvalues
            .iter()
            .map(|v| v / self.total_variance)
            .collect()
    }

    pub fn eigenface(&self, n: usize) -> Result<Vector> {
        Ok(self.basis.get_col(n)?)
    }

    /// Coordinates of `x` in the reduced space.
    pub fn project(&self, x: &Vector) -> Result<Vector> {
        if x.len() != self.mean.len() {
            return Err(PcaError::DimensionMismatch {
                expected: self.mean.len(),
                found: x.len(),
            }
            .into());
        }
        let centered = x.sub(&self.mean)?;
        self.basis.vec_mul_left(&centered)
    }

    /// Approximate original vector for reduced coordinates `r`.
    pub fn reconstruct(&self, r: &Vector) -> Result<Vector> {
        if r.len() != self.components() {
            return Err(PcaError::DimensionMismatch {
                expected: self.components(),
                found: r.len(),
            }
            .into());
        }
        self.basis.vec_mul(r)?.add(&self.mean)
    }

    pub fn transform(&self, dataset: &Dataset) -> Result<Dataset> {
        if let Some((found, _)) = dataset.dims() {
            if found != self.mean.len() {
                return Err(PcaError::DimensionMismatch {
                    expected: self.mean.len(),
                    found,
                }
                .into());
            }
        }
        let mut result = Dataset::with_dims(self.components(), dataset.dim_y());
        for point in dataset {
            let x = self.project(&point.x)?;
            result.add(DataPoint::new(x, point.y.clone()))?;
        }
        Ok(result)
    }

    pub fn to_original_space(&self, dataset: &Dataset) -> Result<Dataset> {
        if let Some((found, _)) = dataset.dims() {
            if found != self.components() {
                return Err(PcaError::DimensionMismatch {
                    expected: self.components(),
                    found,
                }
                .into());
            }
        }
        let mut result = Dataset::with_dims(self.mean.len(), dataset.dim_y());
        for point in dataset {
            let x = self.reconstruct(&point.x)?;
            result.add(DataPoint::new(x, point.y.clone()))?;
        }
        Ok(result)
    }
}

/// Replaces the columns listed in `missing` with unit vectors orthogonal to
/// every other column, built from standard basis vectors.
fn complete_basis(columns: &mut [Vector], missing: &[usize]) {
    let dim = columns.first().map(|c| c.len()).unwrap_or(0);
    let mut accepted: Vec<usize> = (0..columns.len())
        .filter(|i| !missing.contains(i))
        .collect();

    let mut next_axis = 0;
    for &slot in missing {
        // Some axis has a residual at least this large.
        let target = (dim - accepted.len()) as f64 / dim as f64 * (1.0 - 1e-9);
        let mut best: Option<(f64, Vec<f64>, usize)> = None;
        for step in 0..dim {
            let axis = (next_axis + step) % dim;
            let mut candidate = vec![0.0; dim];
            candidate[axis] = 1.0;
            // Twice for stability.
            for _ in 0..2 {
                for &j in &accepted {
                    let column = columns[j].as_slice();
                    let coef = dot(&candidate, column);
                    for (c, a) in candidate.iter_mut().zip(column) {
                        *c -= coef * a;
                    }
                }
            }
            let residual = norm(&candidate);
            let better = best.as_ref().map(|(r, _, _)| residual > *r).unwrap_or(true);
            if better {
                best = Some((residual, candidate, axis));
            }
            if residual * residual >= target {
                break;
            }
        }
        if let Some((residual, candidate, axis)) = best {
            columns[slot] = Vector::new(candidate).scale(1.0 / residual);
            next_axis = axis + 1;
        }
        accepted.push(slot);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PcaError {
    #[error("cannot fit {k} components, must be between 1 and {max}")]
    InvalidComponents { k: usize, max: usize },
    #[error("expected vectors of dimension {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
}
