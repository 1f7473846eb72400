//! ocistow CLI entry point.

use std::io::IsTerminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ocistow_cli::commands::{dispatch, Cli, LogFormat};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.base_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.debug, cli.log_format);

    if let Err(e) = dispatch(cli, config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over `--debug`. JSON unless stderr is a terminal.
fn init_tracing(debug: bool, format: Option<LogFormat>) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let json = match format {
        Some(LogFormat::Json) => true,
        Some(LogFormat::Text) => false,
        None => !std::io::stderr().is_terminal(),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
