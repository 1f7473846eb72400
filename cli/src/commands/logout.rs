//! `ocistow logout` command - remove stored registry credentials.

use clap::Args;
use ocistow_core::StowConfig;

#[derive(Args)]
pub struct LogoutArgs {
    /// Registry server (default: index.docker.io)
    pub server: Option<String>,
}

pub async fn execute(args: LogoutArgs, config: StowConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server = args
        .server
        .unwrap_or_else(|| super::login::DEFAULT_SERVER.to_string());

    let store = super::login::credential_store(&config)?;
    if store.logout(&server)? {
        println!("Removing login credentials for {}", server);
    } else {
        println!("Not logged in to {}", server);
    }

    Ok(())
}
