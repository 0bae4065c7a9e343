use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    dataset::{DataPoint, Dataset},
    linalg::Vector,
};

/// Something that turns an image path into a row-major grayscale vector.
///
/// A failed load must be an error, never a zero-filled vector.
pub trait ImageSource {
    fn load(&self, path: &Path) -> Result<Vector>;
}

/// Luma of an RGB pixel, truncated to a whole intensity.
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).trunc()
}

/// Loads every `(path, class)` sample into a dataset with one-hot labels
/// over `n_classes`.
pub fn load_labelled<S, I>(source: &S, samples: I, n_classes: usize) -> Result<Dataset>
where
    S: ImageSource + ?Sized,
    I: IntoIterator<Item = (PathBuf, usize)>,
{
    let mut dataset = Dataset::new();
    for (path, class) in samples {
        let context = || format!("Loading sample {}", path.display());
        let pixels = source.load(&path).with_context(context)?;
        let point = DataPoint::one_hot(pixels, class, n_classes).with_context(context)?;
        dataset.add(point).with_context(context)?;
    }
    debug!(
        "loaded {} samples of {} pixels",
        dataset.len(),
        dataset.dim_x()
    );
    Ok(dataset)
}
