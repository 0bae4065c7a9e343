use std::ops::Index;

use anyhow::{Context, Result};
use log::debug;
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::linalg::{Matrix, Vector};

/// A feature vector `x` with its label vector `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub x: Vector,
    pub y: Vector,
}

impl DataPoint {
    pub fn new(x: Vector, y: Vector) -> Self {
        Self { x, y }
    }

    /// A point labelled with the one-hot encoding of `class`.
    pub fn one_hot(x: Vector, class: usize, n_classes: usize) -> Result<Self> {
        if class >= n_classes {
            return Err(DatasetError::ClassOutOfRange { class, n_classes }.into());
        }
        let mut y = Vector::zeros(n_classes);
        y[class] = 1.0;
        Ok(Self { x, y })
    }

    /// The class index when `y` is exactly one-hot.
    pub fn class(&self) -> Option<usize> {
        let mut class = None;
        for (i, &value) in self.y.iter().enumerate() {
            if value == 1.0 && class.is_none() {
                class = Some(i);
            } else if value != 0.0 {
                return None;
            }
        }
        class
    }
}

/// Ordered points sharing the same feature and label dimensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    points: Vec<DataPoint>,
    // Unset until the first point is added.
    dims: Option<(usize, usize)>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dims(dim_x: usize, dim_y: usize) -> Self {
        Self {
            points: Vec::new(),
            dims: Some((dim_x, dim_y)),
        }
    }

    pub fn add(&mut self, point: DataPoint) -> Result<()> {
        let found = (point.x.len(), point.y.len());
        match self.dims {
            Some(expected) if expected != found => {
                return Err(DatasetError::DimensionMismatch {
                    index: self.points.len(),
                    expected,
                    found,
                }
                .into());
            }
            Some(_) => {}
            None => self.dims = Some(found),
        }
        self.points.push(point);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Feature dimension, 0 while unset.
    pub fn dim_x(&self) -> usize {
        self.dims.map(|(x, _)| x).unwrap_or(0)
    }

    /// `(dim_x, dim_y)`, `None` until fixed by `with_dims` or the first `add`.
    pub fn dims(&self) -> Option<(usize, usize)> {
        self.dims
    }

    /// Label dimension, 0 while unset.
    pub fn dim_y(&self) -> usize {
        self.dims.map(|(_, y)| y).unwrap_or(0)
    }

    pub fn get(&self, index: usize) -> Option<&DataPoint> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataPoint> {
        self.points.iter()
    }

    /// The feature vectors as rows of an `n × dim_x` matrix.
    pub fn feature_matrix(&self) -> Result<Matrix> {
        let dim_x = self.dim_x();
        let mut elements = Vec::with_capacity(self.len() * dim_x);
        for point in &self.points {
            elements.extend_from_slice(point.x.as_slice());
        }
        Matrix::new(elements, self.len(), dim_x).context("Create feature matrix")
    }

    /// Partitions the dataset into parts sized by `proportions`
    /// (percentages).
    ///
    /// Each part holds `round(len × pct / 100)` points. If the proportions
    /// add up to 100 the last part takes whatever rounding left over, so the
    /// parts cover the whole dataset. Less than 100 leaves the tail unused.
    ///
    /// With `shuffle = Some(seed)` the points are permuted by a ChaCha8 RNG
    /// seeded with `seed` before slicing, so the same seed always yields the
    /// same parts. `None` keeps the stored order.
    pub fn split(&self, proportions: &[f64], shuffle: Option<u64>) -> Result<Vec<Dataset>> {
        if self.is_empty() {
            return Err(DatasetError::EmptyDataset.into());
        }
        if proportions.is_empty() {
            return Err(DatasetError::NoProportions.into());
        }
        if let Some(&bad) = proportions.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(DatasetError::InvalidProportion(bad).into());
        }
        let total: f64 = proportions.iter().sum();
        if total > 100.0 + PROPORTION_EPSILON {
            return Err(DatasetError::ProportionsExceed(total).into());
        }

        let sizes = part_sizes(self.len(), proportions, total);
        debug!("splitting {} points into parts of {:?}", self.len(), sizes);

        let mut order: Vec<usize> = (0..self.len()).collect();
        if let Some(seed) = shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            order.shuffle(&mut rng);
        }

        let (dim_x, dim_y) = (self.dim_x(), self.dim_y());
        let mut parts = Vec::with_capacity(sizes.len());
        let mut start = 0;
        for size in sizes {
            let mut part = Dataset::with_dims(dim_x, dim_y);
            part.points = order[start..start + size]
                .iter()
                .map(|&i| self.points[i].clone())
                .collect();
            parts.push(part);
            start += size;
        }
        Ok(parts)
    }
}

const PROPORTION_EPSILON: f64 = 1e-9;

fn part_sizes(len: usize, proportions: &[f64], total: f64) -> Vec<usize> {
    let mut sizes: Vec<usize> = proportions
        .iter()
        .map(|p| (len as f64 * p / 100.0).round() as usize)
        .collect();
    let last = sizes.len() - 1;
    let before_last: usize = sizes[..last].iter().sum();
    let before_last = before_last.min(len);
    if (total - 100.0).abs() <= PROPORTION_EPSILON {
        sizes[last] = len - before_last;
    } else {
        sizes[last] = sizes[last].min(len - before_last);
    }
    // Rounding up of earlier parts can overshoot a tiny dataset.
    let mut remaining = len;
    for size in sizes.iter_mut() {
        *size = (*size).min(remaining);
        remaining -= *size;
    }
    sizes
}

impl Index<usize> for Dataset {
    type Output = DataPoint;

    fn index(&self, index: usize) -> &DataPoint {
        &self.points[index]
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a DataPoint;
    type IntoIter = std::slice::Iter<'a, DataPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DatasetError {
    #[error("point {index} has dimensions {found:?}, dataset expects {expected:?}")]
    DimensionMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("class {class} out of range for {n_classes} classes")]
    ClassOutOfRange { class: usize, n_classes: usize },
    #[error("cannot split an empty dataset")]
    EmptyDataset,
    #[error("no split proportions given")]
    NoProportions,
    #[error("invalid split proportion {0}")]
    InvalidProportion(f64),
    #[error("split proportions sum to {0}, more than 100")]
    ProportionsExceed(f64),
}
