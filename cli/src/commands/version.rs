//! `ocistow version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "ocistow version {} (runtime {})",
        ocistow_core::VERSION,
        ocistow_runtime::VERSION
    );
    Ok(())
}
