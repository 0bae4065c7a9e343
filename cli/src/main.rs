mod canvas;
mod classify;
mod image_source;
mod pca;
mod util;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use classify::ClassifyArgs;
use pca::PcaArgs;

/// Face recognition with eigenfaces
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    tool: Tool,
}

/// Face recognition with eigenfaces
#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Tool {
    /// Nearest neighbour classification in eigenface space
    #[command(version, about, long_about = None)]
    Classify(ClassifyArgs),

    /// Principal component analysis of a dataset
    #[command(version, about, long_about = None)]
    PCA(PcaArgs),
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.tool {
        Tool::Classify(args) => classify::classify_main(args),
        Tool::PCA(args) => pca::pca_main(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
