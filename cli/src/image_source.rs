use std::path::Path;

use anyhow::{bail, Context, Result};
use faces::{source::luminance, source::ImageSource, Vector};

/// Decodes image files and converts them to grayscale, row by row.
#[derive(Debug, Clone, Copy)]
pub struct ImageFileSource {
    width: usize,
    height: usize,
}

impl ImageFileSource {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

impl ImageSource for ImageFileSource {
    fn load(&self, path: &Path) -> Result<Vector> {
        let image = image::open(path)
            .with_context(|| format!("Decoding {}", path.display()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        if width as usize != self.width || height as usize != self.height {
            bail!(
                "{} is {}x{}, expected {}x{}",
                path.display(),
                width,
                height,
                self.width,
                self.height
            );
        }
        let pixels = image
            .pixels()
            .map(|p| luminance(p[0], p[1], p[2]))
            .collect::<Vec<f64>>();
        Ok(Vector::new(pixels))
    }
}
