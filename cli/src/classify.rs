use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use faces::{
    layout::{eigenface_panels, mean_face_panel, prediction_panels, render, EIGENFACE_GRID},
    pipeline::{self, PipelineConfig},
};
use log::info;

use crate::{
    canvas::PngCanvas,
    util::{self, DatasetArgs},
};

/// Classify faces by nearest neighbour in eigenface space
#[derive(Debug, Args)]
#[command(version, about, long_about = None)]
pub struct ClassifyArgs {
    #[command(flatten)]
    dataset: DatasetArgs,
    /// Principal components to keep
    #[arg(short, long, default_value_t = 20)]
    components: usize,
    /// Percentage of the images used for training
    #[arg(long, default_value_t = 70.0)]
    train: f64,
    /// Percentage of the images used for testing
    #[arg(long, default_value_t = 30.0)]
    test: f64,
    /// Seed for shuffling before the split
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Split in file order instead of shuffling
    #[arg(long)]
    no_shuffle: bool,
    /// Write predictions, mean face and eigenfaces to this PNG
    #[arg(short, long)]
    render: Option<PathBuf>,
    /// Output pixels per face when rendering
    #[arg(long, default_value_t = 80.0)]
    scale: f64,
}

pub fn classify_main(args: ClassifyArgs) -> Result<()> {
    let dataset = util::load_dataset(&args.dataset)?;
    let config = PipelineConfig {
        proportions: vec![args.train, args.test],
        components: args.components,
        shuffle_seed: if args.no_shuffle { None } else { Some(args.seed) },
    };

    let outcome = pipeline::run(&dataset, &config).context("Classifying faces")?;
    println!("{}", outcome.summary());

    if let Some(path) = &args.render {
        let width = args.dataset.width;
        let mut placements = prediction_panels(&outcome, width)?;
        placements.push(mean_face_panel(&outcome.model, width)?);
        let count = outcome.model.components().min(EIGENFACE_GRID);
        placements.extend(eigenface_panels(&outcome.model, width, count)?);

        let mut canvas = PngCanvas::new(args.scale);
        render(&mut canvas, &placements)?;
        canvas.save(path)?;
        info!("wrote {} panels to {}", placements.len(), path.display());
    }
    Ok(())
}
