//! Command line client for the food classification service.

use std::path::PathBuf;

use chrono::Local;
use food_serve::gateway::Url;
use food_serve::{GatewayConfig, ImageReference, Result};
use log::{info, warn};
use structopt::StructOpt;

pub mod estimator;
pub mod output;

pub use estimator::{Estimator, LocalEstimator, ServerEstimator};
pub use output::write_result;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "food-classify",
    about = "CLI app to classify food images and store the results as JSON"
)]
pub struct CmdArgs {
    /// Path or URL of the image
    #[structopt(short = "i", long)]
    pub image: String,

    /// Classification server address
    #[structopt(long = "server-ip", alias = "server_ip", default_value = "0.0.0.0")]
    pub server_ip: String,

    /// Classification server port
    #[structopt(long = "server-port", alias = "server_port", default_value = "5015")]
    pub server_port: u16,

    /// Folder the JSON results are written to
    #[structopt(
        long = "out",
        alias = "json_results_folder",
        parse(from_os_str),
        default_value = "json_results"
    )]
    pub json_results_folder: PathBuf,

    /// Classify in this process instead of going through the server
    #[structopt(long)]
    pub local: bool,

    /// Model server predict endpoint, used with --local
    #[structopt(
        long,
        env = "FOOD_CLASSIFY_INFERENCE_URL",
        default_value = "http://localhost:9000/v1/models/ImageClassifier:predict"
    )]
    pub inference_url: Url,
}

impl CmdArgs {
    pub async fn estimator(&self) -> Result<Box<dyn Estimator>> {
        if self.local {
            let config = GatewayConfig {
                endpoint: self.inference_url.clone(),
                ..Default::default()
            };
            Ok(Box::new(LocalEstimator::new(config)?))
        } else {
            Ok(Box::new(
                ServerEstimator::connect(&self.server_ip, self.server_port).await?,
            ))
        }
    }
}

/// Classify the image named on the command line and store the answer.
///
/// Returns the path of the written file, or `None` when no image was given.
pub async fn run(args: &CmdArgs) -> Result<Option<PathBuf>> {
    let estimator = args.estimator().await?;

    let reference = match ImageReference::parse(&args.image) {
        Some(reference) => reference,
        None => {
            warn!("no image given, nothing to classify");
            return Ok(None);
        }
    };

    let json_results = estimator.estimate(&reference).await?;

    let path = write_result(&args.json_results_folder, &json_results, Local::now())?;
    info!("json results contained in: {}", path.display());
    info!("json results: {}", json_results);

    Ok(Some(path))
}
