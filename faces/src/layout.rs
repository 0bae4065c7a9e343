//! Placement of pixel buffers on an abstract canvas.
//!
//! Nothing here draws. The functions produce [`Placement`]s, a [`Canvas`]
//! implementation supplied by the caller decides how to show them. Canvas
//! units: every face occupies a 1 × 1 square, y grows upward.

use anyhow::{Context, Result};
use thiserror::Error;

use crate::{linalg::Vector, pca::PcaModel, pipeline::Outcome};

/// Correctly classified faces shown at most.
pub const MAX_CORRECT_SHOWN: usize = 10;

/// Eigenface grid cells before positions repeat.
pub const EIGENFACE_GRID: usize = 20;

const CELL: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// Grayscale image stored row-major, `width` pixels per row.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pixels: Vector,
    width: usize,
}

impl PixelBuffer {
    pub fn new(pixels: Vector, width: usize) -> Result<Self> {
        if width == 0 || pixels.len() % width != 0 {
            return Err(LayoutError::Width {
                len: pixels.len(),
                width,
            }
            .into());
        }
        Ok(Self { pixels, width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.pixels.len() / self.width
    }

    pub fn pixels(&self) -> &Vector {
        &self.pixels
    }

    /// `(x, y)` of the i-th pixel.
    pub fn pixel_position(&self, i: usize) -> (usize, usize) {
        (i % self.width, i / self.width)
    }

    /// Intensities clamped to `[0, 255]` and truncated.
    pub fn to_luma8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .map(|p| p.clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Linearly rescaled so the darkest pixel is 0 and the brightest 255.
    pub fn normalized(&self) -> PixelBuffer {
        let min = self.pixels.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.pixels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        let pixels = self
            .pixels
            .iter()
            .map(|p| if range > 0.0 { 255.0 * (p - min) / range } else { 0.0 })
            .collect::<Vec<f64>>();
        PixelBuffer {
            pixels: Vector::new(pixels),
            width: self.width,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub rect: Rect,
    pub buffer: PixelBuffer,
}

/// Display sink for placed images.
pub trait Canvas {
    fn draw(&mut self, placement: &Placement) -> Result<()>;
}

pub fn render<C: Canvas + ?Sized>(canvas: &mut C, placements: &[Placement]) -> Result<()> {
    for placement in placements {
        canvas.draw(placement)?;
    }
    Ok(())
}

/// Original, reconstructed and predicted face for each test point.
///
/// Misclassified points fill the left column top to bottom, the first
/// [`MAX_CORRECT_SHOWN`] correct ones fill the right column.
pub fn prediction_panels(outcome: &Outcome, width: usize) -> Result<Vec<Placement>> {
    let mut placements = Vec::new();
    let mut corrects = 0;
    for (i, prediction) in outcome.predictions.iter().enumerate() {
        let (row, x) = if prediction.correct {
            corrects += 1;
            if corrects > MAX_CORRECT_SHOWN {
                continue;
            }
            (corrects - 1, 4.5)
        } else {
            (i - corrects, 0.5)
        };

        let test = prediction.test_index;
        let original = outcome.testing[test].x.clone();
        let reconstructed = outcome
            .model
            .reconstruct(&outcome.testing_transformed[test].x)
            .with_context(|| format!("Reconstructing test point {}", test))?;
        let predicted = outcome.training[prediction.neighbor_index].x.clone();

        let y = row as f64;
        for (j, pixels) in [original, reconstructed, predicted].into_iter().enumerate() {
            let x0 = x + CELL * j as f64;
            placements.push(Placement {
                rect: Rect::new(x0, -1.5 - CELL * y, x0 + 1.0, -0.5 - CELL * y),
                buffer: PixelBuffer::new(pixels, width)?,
            });
        }
    }
    Ok(placements)
}

pub fn mean_face_panel(model: &PcaModel, width: usize) -> Result<Placement> {
    Ok(Placement {
        rect: Rect::new(1.0, 4.0, 2.0, 5.0),
        buffer: PixelBuffer::new(model.mean().clone(), width)?,
    })
}

/// The first `count` eigenfaces, each rescaled to the full intensity range.
pub fn eigenface_panels(model: &PcaModel, width: usize, count: usize) -> Result<Vec<Placement>> {
    if count > model.components() {
        return Err(LayoutError::TooManyEigenfaces {
            requested: count,
            available: model.components(),
        }
        .into());
    }
    let mut placements = Vec::with_capacity(count);
    for n in 0..count {
        let buffer = PixelBuffer::new(model.eigenface(n)?, width)?.normalized();
        let column = (n % 5) as f64;
        let row = (n % 4) as f64;
        placements.push(Placement {
            rect: Rect::new(
                2.1 + column * CELL,
                4.0 - CELL * row,
                3.1 + column * CELL,
                5.0 - CELL * row,
            ),
            buffer,
        });
    }
    Ok(placements)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("{len} pixels cannot form rows of width {width}")]
    Width { len: usize, width: usize },
    #[error("requested {requested} eigenfaces but the model has {available}")]
    TooManyEigenfaces { requested: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        dataset::{DataPoint, Dataset},
        pipeline::{run, PipelineConfig},
    };

    #[derive(Default)]
    struct Recorder {
        drawn: Vec<Rect>,
    }

    impl Canvas for Recorder {
        fn draw(&mut self, placement: &Placement) -> Result<()> {
            self.drawn.push(placement.rect);
            Ok(())
        }
    }

    fn outcome() -> Outcome {
        let mut dataset = Dataset::new();
        for i in 0..40 {
            let class = i % 4;
            let mut x = vec![0.0; 6];
            x[class] = 200.0;
            x[4] = (i * 7 % 11) as f64;
            x[5] = (i * 3 % 5) as f64;
            dataset
                .add(DataPoint::one_hot(Vector::new(x), class, 4).unwrap())
                .unwrap();
        }
        run(&dataset, &PipelineConfig { components: 3, ..Default::default() }).unwrap()
    }

    #[test]
    fn test_pixel_buffer_geometry() {
        let buffer = PixelBuffer::new(Vector::zeros(12), 4).unwrap();

        assert_eq!(buffer.height(), 3);
        assert_eq!(buffer.pixel_position(0), (0, 0));
        assert_eq!(buffer.pixel_position(5), (1, 1));
        assert_eq!(buffer.pixel_position(11), (3, 2));
        assert!(PixelBuffer::new(Vector::zeros(10), 4).is_err());
        assert!(PixelBuffer::new(Vector::zeros(10), 0).is_err());
    }

    #[test]
    fn test_to_luma8_clamps_and_truncates() {
        let buffer = PixelBuffer::new(Vector::new(vec![-5.0, 12.9, 255.0, 300.0]), 2).unwrap();

        assert_eq!(buffer.to_luma8(), vec![0, 12, 255, 255]);
    }

    #[test]
    fn test_normalized_range() {
        let buffer = PixelBuffer::new(Vector::new(vec![-0.5, 0.0, 0.5, 1.5]), 2).unwrap();

        let normalized = buffer.normalized();

        assert_abs_diff_eq!(normalized.pixels()[0], 0.0);
        assert_abs_diff_eq!(normalized.pixels()[1], 63.75);
        assert_abs_diff_eq!(normalized.pixels()[3], 255.0);
        let flat = PixelBuffer::new(Vector::new(vec![3.0, 3.0]), 1).unwrap().normalized();
        assert_eq!(flat.pixels(), &Vector::zeros(2));
    }

    #[test]
    fn test_prediction_panel_layout() {
        let outcome = outcome();

        let placements = prediction_panels(&outcome, 3).unwrap();

        let shown_correct = outcome.correct_count().min(MAX_CORRECT_SHOWN);
        let wrong = outcome.test_size() - outcome.correct_count();
        assert_eq!(placements.len(), 3 * (shown_correct + wrong));
        let mut corrects = 0;
        let mut placed = placements.chunks(3);
        for (i, p) in outcome.predictions.iter().enumerate() {
            let (row, x) = if p.correct {
                corrects += 1;
                if corrects > MAX_CORRECT_SHOWN {
                    continue;
                }
                (corrects - 1, 4.5)
            } else {
                (i - corrects, 0.5)
            };
            let triple = placed.next().unwrap();
            let y = row as f64;
            assert_abs_diff_eq!(triple[0].rect.x0, x);
            assert_abs_diff_eq!(triple[1].rect.x0, x + 1.1);
            assert_abs_diff_eq!(triple[2].rect.x1, x + 3.2);
            assert_abs_diff_eq!(triple[0].rect.y0, -1.5 - 1.1 * y);
            assert_abs_diff_eq!(triple[0].rect.y1, -0.5 - 1.1 * y);
            assert_eq!(triple[0].buffer.pixels(), &outcome.testing[i].x);
            assert_eq!(triple[2].buffer.pixels(), &outcome.training[p.neighbor_index].x);
        }
    }

    #[test]
    fn test_mean_and_eigenface_panels() {
        let outcome = outcome();

        let mean = mean_face_panel(&outcome.model, 3).unwrap();
        let faces = eigenface_panels(&outcome.model, 3, 3).unwrap();

        assert_eq!(mean.rect, Rect::new(1.0, 4.0, 2.0, 5.0));
        assert_eq!(faces.len(), 3);
        assert_abs_diff_eq!(faces[2].rect.x0, 2.1 + 2.0 * 1.1);
        assert_abs_diff_eq!(faces[2].rect.y1, 5.0 - 2.0 * 1.1);
        for face in &faces {
            let max = face.buffer.pixels().iter().copied().fold(f64::MIN, f64::max);
            assert_abs_diff_eq!(max, 255.0, epsilon = 1e-9);
        }
        assert!(eigenface_panels(&outcome.model, 3, 4).is_err());
    }

    #[test]
    fn test_render_draws_every_placement() {
        let outcome = outcome();
        let mut placements = prediction_panels(&outcome, 2).unwrap();
        placements.push(mean_face_panel(&outcome.model, 2).unwrap());
        let mut canvas = Recorder::default();

        render(&mut canvas, &placements).unwrap();

        assert_eq!(canvas.drawn.len(), placements.len());
    }
}
