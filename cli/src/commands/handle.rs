//! `ocistow handle` command - run a JSON stow request.

use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use ocistow_core::StowConfig;
use ocistow_runtime::StowRequest;

use super::RequestArgs;

#[derive(Args, Debug)]
pub struct HandleArgs {
    /// Request file, or `-` for stdin
    #[arg(long, default_value = "-")]
    pub request: PathBuf,

    #[command(flatten)]
    pub overrides: RequestArgs,
}

pub async fn execute(args: HandleArgs, config: StowConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.overrides.apply(config)?;

    let data = if args.request.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(&args.request)
            .map_err(|e| format!("failed to read {}: {}", args.request.display(), e))?
    };
    let request = StowRequest::from_json(&data)?;
    tracing::debug!(
        src = %request.src_image_ref,
        dst = %request.dst_image_ref,
        annotations = request.annotations.len(),
        "Handling request"
    );

    super::run_request(&config, &request).await?;
    println!("Stowed {}", request.dst_image_ref);
    Ok(())
}
