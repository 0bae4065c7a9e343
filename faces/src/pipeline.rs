use std::fmt::Display;

use anyhow::{Context, Result};
use log::{debug, info};
use thiserror::Error;

use crate::{
    dataset::Dataset,
    kdtree::KdTree,
    linalg::Vector,
    pca::PcaModel,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Training then testing share, in percent.
    pub proportions: Vec<f64>,
    /// Principal components kept.
    pub components: usize,
    /// Seed for the split shuffle, `None` keeps dataset order.
    pub shuffle_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            proportions: vec![70.0, 30.0],
            components: 20,
            shuffle_seed: Some(0),
        }
    }
}

/// Result of classifying one test point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub test_index: usize,
    /// Index of the nearest training point.
    pub neighbor_index: usize,
    pub distance: f64,
    pub correct: bool,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub training: Dataset,
    pub testing: Dataset,
    pub training_transformed: Dataset,
    pub testing_transformed: Dataset,
    pub model: PcaModel,
    pub predictions: Vec<Prediction>,
}

impl Outcome {
    pub fn correct_count(&self) -> usize {
        self.predictions.iter().filter(|p| p.correct).count()
    }

    pub fn test_size(&self) -> usize {
        self.testing.len()
    }

    /// Share of correct predictions, in percent.
    pub fn accuracy(&self) -> f64 {
        self.summary().accuracy()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            correct: self.correct_count(),
            total: self.test_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub correct: usize,
    pub total: usize,
}

impl Summary {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.correct as f64 / self.total as f64
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Got {} correct answers out of {}. This is {}% accuracy.",
            self.correct,
            self.total,
            significant(self.accuracy(), 6)
        )
    }
}

/// `value` rounded to `digits` significant digits, trailing zeros dropped.
fn significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{}", value);
    }
    let magnitude = value.abs().log10().floor() as i64 + 1;
    let decimals = (digits as i64 - magnitude).max(0) as usize;
    let text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// A prediction counts only when the label vectors are exactly equal.
pub fn labels_match(predicted: &Vector, actual: &Vector) -> bool {
    predicted == actual
}

/// Splits `dataset`, fits PCA on the training part and labels every
/// testing point with its nearest training neighbour in the reduced space.
pub fn run(dataset: &Dataset, config: &PipelineConfig) -> Result<Outcome> {
    if config.proportions.len() != 2 {
        return Err(PipelineError::PartitionCount(config.proportions.len()).into());
    }
    if let Some(index) = dataset.iter().position(|p| p.class().is_none()) {
        return Err(PipelineError::NotOneHot(index).into());
    }

    let mut parts = dataset
        .split(&config.proportions, config.shuffle_seed)
        .context("Splitting dataset")?
        .into_iter();
    let (training, testing) = match (parts.next(), parts.next()) {
        (Some(training), Some(testing)) => (training, testing),
        _ => return Err(PipelineError::PartitionCount(0).into()),
    };
    if testing.is_empty() {
        return Err(PipelineError::EmptyTestPartition.into());
    }
    debug!("training on {}, testing on {}", training.len(), testing.len());

    let model = PcaModel::fit(&training, config.components).context("Fitting PCA")?;
    let training_transformed = model
        .transform(&training)
        .context("Transforming training set")?;
    let testing_transformed = model
        .transform(&testing)
        .context("Transforming testing set")?;

    let predictions = classify(&training_transformed, &testing_transformed)?;

    let outcome = Outcome {
        training,
        testing,
        training_transformed,
        testing_transformed,
        model,
        predictions,
    };
    info!("{}", outcome.summary());
    Ok(outcome)
}

/// 1-nearest-neighbour labels for every point of `testing`.
pub fn classify(training: &Dataset, testing: &Dataset) -> Result<Vec<Prediction>> {
    let tree = KdTree::build(training).context("Building kd-tree")?;
    let mut predictions = Vec::with_capacity(testing.len());
    for (i, point) in testing.iter().enumerate() {
        let neighbors = tree
            .get_knn(&point.x, 1)
            .with_context(|| format!("Querying test point {}", i))?;
        let nearest = neighbors
            .first()
            .ok_or(PipelineError::NoNeighbor(i))?;
        predictions.push(Prediction {
            test_index: i,
            neighbor_index: nearest.index,
            distance: nearest.distance,
            correct: labels_match(&nearest.point.y, &point.y),
        });
    }
    Ok(predictions)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("expected training and testing proportions, got {0}")]
    PartitionCount(usize),
    #[error("label of point {0} is not one-hot")]
    NotOneHot(usize),
    #[error("testing partition is empty")]
    EmptyTestPartition,
    #[error("no neighbour found for test point {0}")]
    NoNeighbor(usize),
}
