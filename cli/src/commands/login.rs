//! `ocistow login` command - store registry credentials.

use clap::Args;
use ocistow_core::StowConfig;
use ocistow_runtime::{CredentialStore, RegistryLogin};

pub(super) const DEFAULT_SERVER: &str = "index.docker.io";

#[derive(Args)]
pub struct LoginArgs {
    /// Registry server (default: index.docker.io)
    pub server: Option<String>,

    /// Username
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password
    #[arg(short, long)]
    pub password: Option<String>,

    /// Read password from stdin
    #[arg(long)]
    pub password_stdin: bool,

    /// Reach this registry over plain HTTP
    #[arg(long)]
    pub insecure: bool,
}

/// The store named by `credentials_path`, or the per-user default.
pub(super) fn credential_store(
    config: &StowConfig,
) -> Result<CredentialStore, Box<dyn std::error::Error>> {
    Ok(match &config.credentials_path {
        Some(path) => CredentialStore::new(path),
        None => CredentialStore::default_path()?,
    })
}

fn read_line(prompt: Option<&str>) -> std::io::Result<String> {
    if let Some(prompt) = prompt {
        eprint!("{prompt}: ");
    }
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub async fn execute(args: LoginArgs, config: StowConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server = args.server.unwrap_or_else(|| DEFAULT_SERVER.to_string());

    let username = match args.username {
        Some(u) => u,
        None => read_line(Some("Username"))?,
    };
    let password = if args.password_stdin {
        read_line(None)?
    } else {
        match args.password {
            Some(p) => p,
            None => read_line(Some("Password"))?,
        }
    };

    if username.is_empty() || password.is_empty() {
        return Err("Username and password are required".into());
    }

    credential_store(&config)?.login(
        &server,
        RegistryLogin::new(username, password).insecure(args.insecure),
    )?;

    println!("Login Succeeded");
    Ok(())
}
