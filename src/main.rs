//! # Secret Generator Controller
//!
//! A Kubernetes controller that fills annotated Secrets with generated values:
//! random strings, SSH keypairs and basic-auth credentials.
//!
//! Settings come from environment variables (see [`secret_generator_controller::config`]);
//! the generator flags below override them.

use anyhow::Result;
use clap::Parser;
use secret_generator_controller::config::{load_config, GeneratorConfig};
use secret_generator_controller::runtime::{initialize, run_watch_loop};

/// Secret Generator Controller
#[derive(Debug, Parser)]
#[command(name = "secret-generator-controller", version, about, long_about = None)]
struct Args {
    /// Regenerate all fields of Secrets that lack the secure marker
    #[arg(long)]
    regenerate_insecure: bool,

    /// Default length of generated strings
    #[arg(long)]
    secret_length: Option<usize>,

    /// Default encoding of generated strings (base64, base64url, base32, hex, raw)
    #[arg(long)]
    secret_encoding: Option<String>,

    /// Default RSA key size for ssh-keypair Secrets (bits)
    #[arg(long)]
    ssh_key_length: Option<usize>,
}

impl Args {
    fn apply(self, generator: &mut GeneratorConfig) {
        if self.regenerate_insecure {
            generator.regenerate_insecure = true;
        }
        if let Some(value) = self.secret_length {
            generator.secret_length = value;
        }
        if let Some(value) = self.secret_encoding {
            generator.secret_encoding = value;
        }
        if let Some(value) = self.ssh_key_length {
            generator.ssh_key_length = value;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut controller_config, server_config) = load_config();
    args.apply(&mut controller_config.generator);

    let init_result = initialize(controller_config, server_config).await?;

    run_watch_loop(
        init_result.secrets,
        init_result.reconciler,
        init_result.server_state,
        init_result.controller_config,
    )
    .await
}
