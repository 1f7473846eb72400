//! CLI command definitions and dispatch.

mod generate_key;
mod handle;
mod login;
mod logout;
mod stow;
mod version;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ocistow_core::{Context, StowConfig};
use ocistow_runtime::{
    logging, stow as run_stow, tracing_spans, LocalKeyBackend, ServiceBuilder, StowFlags,
    StowRequest, StowService,
};
use tracing::Instrument;

/// ocistow - copy an OCI image between registries and sign it.
#[derive(Parser)]
#[command(name = "ocistow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// YAML configuration file; flags override its values
    #[arg(long, global = true, env = "OCISTOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, env = "DEBUG")]
    pub debug: bool,

    /// Log output format (default: json unless stderr is a terminal)
    #[arg(long, global = true, value_enum, env = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Copy an image to its destination, then sign it there
    Stow(stow::StowArgs),
    /// Run a JSON stow request ({"SrcImageRef", "DstImageRef", "Annotations"})
    Handle(handle::HandleArgs),
    /// Generate an ECDSA P-256 signing key
    GenerateKey(generate_key::GenerateKeyArgs),
    /// Log in to a registry
    Login(login::LoginArgs),
    /// Log out from a registry
    Logout(logout::LogoutArgs),
    /// Show version information
    Version(version::VersionArgs),
}

impl Cli {
    /// Configuration from `--config` (or defaults) with the global flags
    /// applied.
    pub fn base_config(&self) -> Result<StowConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => StowConfig::from_file(path)?,
            None => StowConfig::default(),
        };
        config.debug |= self.debug;
        Ok(config)
    }
}

/// Per-request overrides shared by `stow` and `handle`.
#[derive(Args, Debug, Default)]
pub struct RequestArgs {
    /// PKCS#8 signing key (PEM or DER)
    #[arg(long = "key", env = "KEY_PATH")]
    pub key_path: Option<PathBuf>,

    /// Whether to copy the source to the destination
    #[arg(long, env = "COPY", value_name = "BOOL")]
    pub copy: Option<bool>,

    /// Whether to sign the destination
    #[arg(long, env = "SIGN", value_name = "BOOL")]
    pub sign: Option<bool>,

    /// Skip the copy stage
    #[arg(long, conflicts_with = "copy")]
    pub no_copy: bool,

    /// Skip the sign stage
    #[arg(long, conflicts_with = "sign")]
    pub no_sign: bool,

    /// Deadline for the whole request, in seconds
    #[arg(long, env = "TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Registry reached over plain HTTP (repeatable)
    #[arg(long = "insecure-registry", env = "INSECURE_REGISTRIES", value_delimiter = ',')]
    pub insecure_registries: Vec<String>,
}

impl RequestArgs {
    /// Layer these flags over `base`.
    pub fn apply(&self, mut config: StowConfig) -> Result<StowConfig, Box<dyn std::error::Error>> {
        if let Some(path) = &self.key_path {
            config.key_path = Some(path.clone());
        }
        if let Some(copy) = self.copy {
            config.copy = copy;
        }
        if let Some(sign) = self.sign {
            config.sign = sign;
        }
        if self.no_copy {
            config.copy = false;
        }
        if self.no_sign {
            config.sign = false;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        config
            .insecure_registries
            .extend(self.insecure_registries.iter().cloned());
        config.validate()?;
        Ok(config)
    }
}

/// Build the backend and middleware chain, bind a deadline, and run the
/// request. Ctrl-C cancels in-flight registry calls.
pub(crate) async fn run_request(
    config: &StowConfig,
    request: &StowRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = LocalKeyBackend::from_config(config)?;
    let service = ServiceBuilder::new()
        .layer(logging())
        .layer(tracing_spans())
        .build(StowService::new(backend));

    let ctx = Context::with_timeout(config.timeout());
    let interrupt = ctx.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling request");
            interrupt.cancel();
        }
    });

    let span = tracing::info_span!("stow", request_id = ctx.request_id());
    let result = run_stow(&ctx, service.as_ref(), StowFlags::from(config), request)
        .instrument(span)
        .await;
    watcher.abort();

    result?;
    Ok(())
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli, config: StowConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Stow(args) => stow::execute(args, config).await,
        Command::Handle(args) => handle::execute(args, config).await,
        Command::GenerateKey(args) => generate_key::execute(args).await,
        Command::Login(args) => login::execute(args, config).await,
        Command::Logout(args) => logout::execute(args, config).await,
        Command::Version(args) => version::execute(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_request_args_override_config() {
        let args = RequestArgs {
            key_path: Some(PathBuf::from("/keys/cosign.key")),
            no_copy: true,
            timeout_secs: Some(60),
            insecure_registries: vec!["localhost:5000".to_string()],
            ..Default::default()
        };
        let config = args.apply(StowConfig::default()).unwrap();
        assert!(!config.copy);
        assert!(config.sign);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.key_path, Some(PathBuf::from("/keys/cosign.key")));
        assert!(config.is_insecure("localhost:5000"));
    }

    #[test]
    fn test_request_args_reject_zero_timeout() {
        let args = RequestArgs {
            timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(args.apply(StowConfig::default()).is_err());
    }

    #[test]
    fn test_explicit_bool_flags() {
        let cli = Cli::try_parse_from([
            "ocistow",
            "stow",
            "--destination",
            "registry.example/b:v1",
            "--copy",
            "false",
        ])
        .unwrap();
        match cli.command {
            Command::Stow(args) => {
                let config = args.request.apply(StowConfig::default()).unwrap();
                assert!(!config.copy);
                assert!(config.sign);
            }
            _ => panic!("expected stow"),
        }
    }
}
