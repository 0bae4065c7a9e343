use std::{
    cmp::min,
    ops::{Index, IndexMut},
};

use anyhow::Result;
use log::debug;
use thiserror::Error;

/// Fixed-length vector of reals. The length never changes once created.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vector {
    elements: Vec<f64>,
}

impl Vector {
    pub fn new(elements: Vec<f64>) -> Self {
        Self { elements }
    }

    pub fn zeros(len: usize) -> Self {
        Self {
            elements: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.elements.iter()
    }

    pub fn add(&self, other: &Vector) -> Result<Vector> {
        self.check_len(other)?;
        Ok(Vector::new(add(&self.elements, &other.elements)))
    }

    pub fn sub(&self, other: &Vector) -> Result<Vector> {
        self.check_len(other)?;
        Ok(Vector::new(sub(&self.elements, &other.elements)))
    }

    pub fn scale(&self, value: f64) -> Vector {
        Vector::new(scalar_mul(value, &self.elements))
    }

    pub fn dot(&self, other: &Vector) -> Result<f64> {
        self.check_len(other)?;
        Ok(dot(&self.elements, &other.elements))
    }

    pub fn norm(&self) -> f64 {
        norm(&self.elements)
    }

    pub fn distance_squared(&self, other: &Vector) -> Result<f64> {
        self.check_len(other)?;
        Ok(distance_squared(&self.elements, &other.elements))
    }

    fn check_len(&self, other: &Vector) -> Result<(), LinalgError> {
        if self.len() != other.len() {
            return Err(LinalgError::SizeMismatch);
        }
        Ok(())
    }
}

impl From<Vec<f64>> for Vector {
    fn from(elements: Vec<f64>) -> Self {
        Self::new(elements)
    }
}

impl Index<usize> for Vector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.elements[index]
    }
}

impl IndexMut<usize> for Vector {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.elements[index]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    // Row-major.
    elements: Vec<f64>,
    width: usize,
    height: usize,
}

impl Matrix {
    pub fn new(elements: Vec<f64>, height: usize, width: usize) -> Result<Self> {
        if elements.len() != width * height {
            return Err(LinalgError::SizeMismatch.into());
        }

        Ok(Self {
            elements,
            height,
            width,
        })
    }

    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            elements: vec![0.0; width * height],
            width,
            height,
        }
    }

    /// Builds a matrix whose i-th column is `columns[i]`.
    pub fn from_columns(columns: &[Vector]) -> Result<Self> {
        let width = columns.len();
        let height = columns.first().map(|c| c.len()).unwrap_or(0);
        if columns.iter().any(|c| c.len() != height) {
            return Err(LinalgError::SizeMismatch.into());
        }
        let mut matrix = Self::zeros(height, width);
        for (j, column) in columns.iter().enumerate() {
            for i in 0..height {
                matrix.set_unchecked(i, j, column[i]);
            }
        }
        Ok(matrix)
    }

    pub fn mul(&self, matrix: &Matrix) -> Result<Matrix> {
        if self.width != matrix.height {
            return Err(LinalgError::SizeMismatch.into());
        }

        let mut elements: Vec<f64> = Vec::with_capacity(self.height * matrix.width);
        for ij in 0..self.height * matrix.width {
            let column = ij % matrix.width;
            let row = ij / matrix.width;
            let mut value = 0.0;
            for i in 0..self.width {
                value += self.get_unchecked(row, i) * matrix.get_unchecked(i, column);
            }

            elements.push(value);
        }
        Ok(Matrix {
            elements,
            width: matrix.width,
            height: self.height,
        })
    }

    /// `M · v`
    pub fn vec_mul(&self, vec: &Vector) -> Result<Vector> {
        if self.width != vec.len() {
            return Err(LinalgError::SizeMismatch.into());
        }

        let result = (0..self.height)
            .map(|i| dot(self.row_unchecked(i), vec.as_slice()))
            .collect::<Vec<f64>>();
        Ok(Vector::new(result))
    }

    /// `vᵀ · M`
    pub fn vec_mul_left(&self, vec: &Vector) -> Result<Vector> {
        if self.height != vec.len() {
            return Err(LinalgError::SizeMismatch.into());
        }

        let mut result = vec![0.0; self.width];
        for i in 0..self.height {
            let coef = vec[i];
            if coef == 0.0 {
                continue;
            }
            for (r, a) in result.iter_mut().zip(self.row_unchecked(i)) {
                *r += coef * a;
            }
        }
        Ok(Vector::new(result))
    }

    pub fn sub(&self, matrix: &Matrix) -> Result<Self> {
        if self.width != matrix.width || self.height != matrix.height {
            return Err(LinalgError::SizeMismatch.into());
        }
        Ok(Self {
            elements: sub(&self.elements, &matrix.elements),
            width: self.width,
            height: self.height,
        })
    }

    pub fn row(&self, i: usize) -> Result<&[f64], LinalgError> {
        if i >= self.height {
            return Err(LinalgError::OutOfBounds);
        }
        Ok(self.row_unchecked(i))
    }

    fn row_unchecked(&self, i: usize) -> &[f64] {
        &self.elements[i * self.width..(i + 1) * self.width]
    }

    pub fn get_col(&self, i: usize) -> Result<Vector, LinalgError> {
        if i >= self.width {
            return Err(LinalgError::OutOfBounds);
        }
        let elements = (0..self.height)
            .map(|j| self.get_unchecked(j, i))
            .collect::<Vec<f64>>();
        Ok(Vector::new(elements))
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64, LinalgError> {
        if row >= self.height || col >= self.width {
            Err(LinalgError::OutOfBounds)
        } else {
            Ok(self.get_unchecked(row, col))
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), LinalgError> {
        if row >= self.height || col >= self.width {
            Err(LinalgError::OutOfBounds)
        } else {
            self.set_unchecked(row, col, value);
            Ok(())
        }
    }

    pub fn set_unchecked(&mut self, row: usize, col: usize, value: f64) {
        self.elements[row * self.width + col] = value;
    }

    pub fn get_unchecked(&self, row: usize, col: usize) -> f64 {
        self.elements[row * self.width + col]
    }

    pub fn transpose(&self) -> Matrix {
        let mut elements: Vec<f64> = Vec::with_capacity(self.elements.len());
        for i in 0..self.width {
            for j in 0..self.height {
                elements.push(self.get_unchecked(j, i));
            }
        }
        Matrix {
            elements,
            width: self.height,
            height: self.width,
        }
    }

    /// `A · Aᵀ`, the inner products of every pair of rows.
    pub fn gram(&self) -> SquareMatrix {
        let n = self.height;
        let mut gram = Matrix::zeros(n, n);
        for i in 0..n {
            let row_i = self.row_unchecked(i);
            for j in i..n {
                let value = dot(row_i, self.row_unchecked(j));
                gram.set_unchecked(i, j, value);
                gram.set_unchecked(j, i, value);
            }
        }
        SquareMatrix { matrix: gram, n }
    }

    pub fn round(&self, places: i32) -> Self {
        Self {
            elements: round(&self.elements, places),
            width: self.width,
            height: self.height,
        }
    }

    pub fn mean_row(&self) -> Vector {
        let mut elements = vec![0.0; self.width];
        for i in 0..self.height {
            for (e, a) in elements.iter_mut().zip(self.row_unchecked(i)) {
                *e += a / self.height as f64;
            }
        }
        Vector::new(elements)
    }

    pub fn identity(width: usize, height: usize) -> Self {
        let mut elements = vec![0.0; width * height];
        let n = min(width, height);
        for i in 0..n {
            elements[i * width + i] = 1.0;
        }
        Self {
            elements,
            width,
            height,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrix {
    matrix: Matrix,
    n: usize,
}

/// Eigenvalues in descending order, `vectors` holds the matching unit
/// eigenvectors as columns.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    pub values: Vec<f64>,
    pub vectors: Matrix,
}

impl SquareMatrix {
    const JACOBI_MAX_SWEEPS: usize = 100;
    const JACOBI_TOLERANCE: f64 = 1e-12;

    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        for i in 0..self.n {
            for j in i + 1..self.n {
                let a = self.matrix.get_unchecked(i, j);
                let b = self.matrix.get_unchecked(j, i);
                if (a - b).abs() > tolerance * a.abs().max(b.abs()).max(1.0) {
                    return false;
                }
            }
        }
        true
    }

    /// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
    ///
    /// Each rotation zeroes one off-diagonal pair; sweeps repeat until the
    /// off-diagonal mass is negligible next to the whole matrix. Equal
    /// eigenvalues keep their diagonal order.
    pub fn symmetric_eigen(&self) -> Result<SymmetricEigen> {
        if !self.is_symmetric(1e-9) {
            return Err(LinalgError::NotSymmetric.into());
        }

        let n = self.n;
        let mut a = self.matrix.clone();
        let mut v = Matrix::identity(n, n);
        let total = norm(&a.elements);

        let mut converged = false;
        for sweep in 0..Self::JACOBI_MAX_SWEEPS {
            let off = off_diagonal_norm(&a);
            if off == 0.0 || off <= Self::JACOBI_TOLERANCE * total {
                debug!("jacobi converged after {} sweeps (n = {})", sweep, n);
                converged = true;
                break;
            }
            for p in 0..n {
                for q in p + 1..n {
                    rotate(&mut a, &mut v, p, q);
                }
            }
        }
        if !converged {
            return Err(LinalgError::NoConvergence(Self::JACOBI_MAX_SWEEPS).into());
        }

        let mut order: Vec<usize> = (0..n).collect();
        // Stable, so ties keep diagonal order.
        order.sort_by(|&i, &j| {
            a.get_unchecked(j, j).total_cmp(&a.get_unchecked(i, i))
        });

        let values = order.iter().map(|&i| a.get_unchecked(i, i)).collect();
        let mut vectors = Matrix::zeros(n, n);
        for (col, &i) in order.iter().enumerate() {
            for row in 0..n {
                vectors.set_unchecked(row, col, v.get_unchecked(row, i));
            }
        }
        Ok(SymmetricEigen { values, vectors })
    }
}

/// Applies the rotation in the (p, q) plane that zeroes `a[p][q]`,
/// accumulating it into `v`.
fn rotate(a: &mut Matrix, v: &mut Matrix, p: usize, q: usize) {
    let apq = a.get_unchecked(p, q);
    if apq == 0.0 {
        return;
    }
    let app = a.get_unchecked(p, p);
    let aqq = a.get_unchecked(q, q);
    let theta = (aqq - app) / (2.0 * apq);
    let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
    let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    let n = a.height;
    for k in 0..n {
        let akp = a.get_unchecked(k, p);
        let akq = a.get_unchecked(k, q);
        a.set_unchecked(k, p, c * akp - s * akq);
        a.set_unchecked(k, q, s * akp + c * akq);
    }
    for k in 0..n {
        let apk = a.get_unchecked(p, k);
        let aqk = a.get_unchecked(q, k);
        a.set_unchecked(p, k, c * apk - s * aqk);
        a.set_unchecked(q, k, s * apk + c * aqk);
    }
    for k in 0..n {
        let vkp = v.get_unchecked(k, p);
        let vkq = v.get_unchecked(k, q);
        v.set_unchecked(k, p, c * vkp - s * vkq);
        v.set_unchecked(k, q, s * vkp + c * vkq);
    }
}

fn off_diagonal_norm(a: &Matrix) -> f64 {
    let mut sum = 0.0;
    for i in 0..a.height {
        for j in 0..a.width {
            if i != j {
                let x = a.get_unchecked(i, j);
                sum += x * x;
            }
        }
    }
    sum.sqrt()
}

impl TryFrom<Matrix> for SquareMatrix {
    type Error = LinalgError;
    fn try_from(value: Matrix) -> std::result::Result<Self, Self::Error> {
        if value.height != value.width {
            Err(LinalgError::NotSquare)
        } else {
            Ok(SquareMatrix {
                n: value.width,
                matrix: value,
            })
        }
    }
}

impl From<SquareMatrix> for Matrix {
    fn from(value: SquareMatrix) -> Self {
        value.matrix
    }
}

pub fn dot(u: &[f64], v: &[f64]) -> f64 {
    u.iter().zip(v.iter()).fold(0.0, |acc, (a, b)| acc + a * b)
}

/// A matrix with `height` copies of `u` as its rows.
pub fn matrix_rows(u: &Vector, height: usize) -> Matrix {
    Matrix {
        elements: u.as_slice().repeat(height),
        height,
        width: u.len(),
    }
}

pub fn norm(u: &[f64]) -> f64 {
    u.iter().fold(0.0, |acc, a| acc + a * a).sqrt()
}

pub fn distance_squared(u: &[f64], v: &[f64]) -> f64 {
    u.iter().zip(v.iter()).fold(0.0, |acc, (a, b)| {
        let d = a - b;
        acc + d * d
    })
}

fn add(u: &[f64], v: &[f64]) -> Vec<f64> {
    u.iter().zip(v.iter()).map(|(a, b)| a + b).collect()
}

fn sub(u: &[f64], v: &[f64]) -> Vec<f64> {
    u.iter().zip(v.iter()).map(|(a, b)| a - b).collect()
}

fn scalar_mul(a: f64, u: &[f64]) -> Vec<f64> {
    u.iter().map(|b| a * b).collect()
}

pub fn round(u: &[f64], places: i32) -> Vec<f64> {
    let shift = 10.0_f64.powi(places);
    u.iter().map(|a| (a * shift).round() / shift).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum LinalgError {
    #[error("operand sizes do not match")]
    SizeMismatch,
    #[error("index out of bounds")]
    OutOfBounds,
    #[error("matrix is not square")]
    NotSquare,
    #[error("matrix is not symmetric")]
    NotSymmetric,
    #[error("eigen-decomposition did not converge within {0} sweeps")]
    NoConvergence(usize),
}
