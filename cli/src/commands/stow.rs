//! `ocistow stow` command - copy an image, then sign it at its destination.

use clap::Args;
use ocistow_core::{Annotations, StowConfig};
use ocistow_runtime::StowRequest;

use super::RequestArgs;

#[derive(Args, Debug)]
pub struct StowArgs {
    /// Source image reference (required unless copying is disabled)
    #[arg(long, env = "SOURCE")]
    pub source: Option<String>,

    /// Destination image reference
    #[arg(long, env = "DESTINATION")]
    pub destination: String,

    /// Annotation in key=value form (repeatable)
    #[arg(short, long = "annotation", env = "ANNOTATIONS", value_delimiter = ',')]
    pub annotations: Vec<String>,

    #[command(flatten)]
    pub request: RequestArgs,
}

pub async fn execute(args: StowArgs, config: StowConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.request.apply(config)?;
    if config.copy && args.source.is_none() {
        return Err("--source is required when copying".into());
    }

    let annotations = Annotations::from_pairs(&args.annotations)?;
    let request = StowRequest::new(
        args.source.unwrap_or_default(),
        args.destination,
        annotations,
    );

    super::run_request(&config, &request).await?;
    println!("Stowed {}", request.dst_image_ref);
    Ok(())
}
