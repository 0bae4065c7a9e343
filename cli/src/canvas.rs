use std::path::Path;

use anyhow::{bail, Context, Result};
use faces::layout::{Canvas, Placement};
use image::{GrayImage, Luma};
use log::debug;

/// Collects placements and composes them into one grayscale PNG.
///
/// `scale` pixels per canvas unit. The output covers the bounding box of
/// everything drawn, canvas y pointing up.
#[derive(Debug)]
pub struct PngCanvas {
    scale: f64,
    placements: Vec<Placement>,
}

impl PngCanvas {
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            placements: Vec::new(),
        }
    }

    pub fn compose(&self) -> Result<GrayImage> {
        if self.placements.is_empty() {
            bail!("nothing to render");
        }
        let min_x = self.fold(|p| p.rect.x0.min(p.rect.x1), f64::min);
        let max_x = self.fold(|p| p.rect.x0.max(p.rect.x1), f64::max);
        let min_y = self.fold(|p| p.rect.y0.min(p.rect.y1), f64::min);
        let max_y = self.fold(|p| p.rect.y0.max(p.rect.y1), f64::max);

        let width = ((max_x - min_x) * self.scale).ceil() as u32;
        let height = ((max_y - min_y) * self.scale).ceil() as u32;
        debug!("composing {} placements into {}x{}", self.placements.len(), width, height);
        let mut out = GrayImage::from_pixel(width.max(1), height.max(1), Luma([0]));

        for placement in &self.placements {
            let rect = placement.rect;
            let left = ((rect.x0.min(rect.x1) - min_x) * self.scale).floor() as u32;
            let top = ((max_y - rect.y0.max(rect.y1)) * self.scale).floor() as u32;
            let w = ((rect.x1 - rect.x0).abs() * self.scale).round() as u32;
            let h = ((rect.y1 - rect.y0).abs() * self.scale).round() as u32;

            let buffer = &placement.buffer;
            let luma = buffer.to_luma8();
            for dy in 0..h {
                for dx in 0..w {
                    // Nearest source pixel.
                    let sx = dx as usize * buffer.width() / w as usize;
                    let sy = dy as usize * buffer.height() / h as usize;
                    let (x, y) = (left + dx, top + dy);
                    if x < out.width() && y < out.height() {
                        out.put_pixel(x, y, Luma([luma[sy * buffer.width() + sx]]));
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.compose()?
            .save(path)
            .with_context(|| format!("Writing {}", path.display()))
    }

    fn fold(&self, value: impl Fn(&Placement) -> f64, pick: fn(f64, f64) -> f64) -> f64 {
        self.placements
            .iter()
            .map(value)
            .reduce(pick)
            .unwrap_or(0.0)
    }
}

impl Canvas for PngCanvas {
    fn draw(&mut self, placement: &Placement) -> Result<()> {
        self.placements.push(placement.clone());
        Ok(())
    }
}
