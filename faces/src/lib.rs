//! Eigenfaces: PCA dimensionality reduction and exact nearest-neighbour
//! classification of grayscale face images.

pub mod dataset;
pub mod kdtree;
pub mod layout;
pub mod linalg;
pub mod pca;
pub mod pipeline;
pub mod source;
mod util;

pub use dataset::{DataPoint, Dataset};
pub use kdtree::{KdTree, Neighbor};
pub use linalg::{Matrix, Vector};
pub use pca::PcaModel;
pub use pipeline::{Outcome, PipelineConfig};
