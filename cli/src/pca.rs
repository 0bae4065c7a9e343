use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use faces::{
    layout::{eigenface_panels, mean_face_panel, render, EIGENFACE_GRID},
    PcaModel,
};

use crate::{
    canvas::PngCanvas,
    util::{self, DatasetArgs},
};

/// Principal component analysis of the whole dataset
#[derive(Debug, Args)]
#[command(version, about, long_about = None)]
pub struct PcaArgs {
    #[command(flatten)]
    dataset: DatasetArgs,
    /// Principal components to keep
    #[arg(short, long, default_value_t = 20)]
    components: usize,
    /// Write the mean face and eigenfaces to this PNG
    #[arg(short, long)]
    render: Option<PathBuf>,
    /// Output pixels per face when rendering
    #[arg(long, default_value_t = 80.0)]
    scale: f64,
}

pub fn pca_main(args: PcaArgs) -> Result<()> {
    let dataset = util::load_dataset(&args.dataset)?;
    let model = PcaModel::fit(&dataset, args.components).context("Fitting PCA")?;

    println!("component,variance,explained_ratio");
    let ratios = model.explained_variance_ratio();
    for (i, (variance, ratio)) in model.eigenvalues().iter().zip(&ratios).enumerate() {
        println!("{},{},{}", i + 1, variance, ratio);
    }
    let kept: f64 = ratios.iter().sum();
    println!("# {} components explain {:.2}% of the variance", model.components(), 100.0 * kept);

    if let Some(path) = &args.render {
        let width = args.dataset.width;
        let mut placements = vec![mean_face_panel(&model, width)?];
        let count = model.components().min(EIGENFACE_GRID);
        placements.extend(eigenface_panels(&model, width, count)?);

        let mut canvas = PngCanvas::new(args.scale);
        render(&mut canvas, &placements)?;
        canvas.save(path)?;
    }
    Ok(())
}
