//! `ocistow generate-key` command.

use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug)]
pub struct GenerateKeyArgs {
    /// Where to write the private key; the public key goes to `<output>.pub`
    #[arg(short, long, default_value = "cosign.key")]
    pub output: PathBuf,
}

pub async fn execute(args: GenerateKeyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let output = args.output;
    let path = output.clone();
    tokio::task::spawn_blocking(move || ocistow_runtime::generate_key(path)).await??;

    println!("Private key written to {}", output.display());
    println!("Public key written to {}.pub", output.display());
    Ok(())
}
