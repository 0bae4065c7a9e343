use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use faces::{source::load_labelled, Dataset};
use log::info;

use crate::image_source::ImageFileSource;

/// Where the face images are and what they look like
#[derive(Debug, Args)]
pub struct DatasetArgs {
    /// Directory holding the images
    pub dir: PathBuf,
    /// Image width in pixels
    #[arg(long, default_value_t = 70)]
    pub width: usize,
    /// Image height in pixels
    #[arg(long, default_value_t = 80)]
    pub height: usize,
    /// Number of people
    #[arg(long, default_value_t = 40)]
    pub classes: usize,
    /// Images per person
    #[arg(long, default_value_t = 10)]
    pub per_class: usize,
}

/// Paths of the Olivetti naming scheme: image `j` (1-based) of class `i`
/// (0-based) is `{per_class * i + j}_{i + 1}.jpg`.
pub fn olivetti_paths(args: &DatasetArgs) -> Vec<(PathBuf, usize)> {
    let mut samples = Vec::with_capacity(args.classes * args.per_class);
    for i in 0..args.classes {
        for j in 1..=args.per_class {
            let name = format!("{}_{}.jpg", args.per_class * i + j, i + 1);
            samples.push((args.dir.join(name), i));
        }
    }
    samples
}

pub fn load_dataset(args: &DatasetArgs) -> Result<Dataset> {
    let source = ImageFileSource::new(args.width, args.height);
    let dataset = load_labelled(&source, olivetti_paths(args), args.classes)
        .with_context(|| format!("Loading dataset from {}", args.dir.display()))?;
    info!(
        "loaded {} images of {}x{} from {}",
        dataset.len(),
        args.width,
        args.height,
        args.dir.display()
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_olivetti_paths() {
        let args = DatasetArgs {
            dir: PathBuf::from("faces"),
            width: 70,
            height: 80,
            classes: 40,
            per_class: 10,
        };

        let paths = olivetti_paths(&args);

        assert_eq!(paths.len(), 400);
        assert_eq!(paths[0], (PathBuf::from("faces/1_1.jpg"), 0));
        assert_eq!(paths[9], (PathBuf::from("faces/10_1.jpg"), 0));
        assert_eq!(paths[10], (PathBuf::from("faces/11_2.jpg"), 1));
        assert_eq!(paths[399], (PathBuf::from("faces/400_40.jpg"), 39));
    }
}
