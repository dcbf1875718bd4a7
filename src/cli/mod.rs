//! # SGCTL CLI
//!
//! Command-line interface for the Secret Generator Controller.
//!
//! ## Usage
//!
//! ```bash
//! # Regenerate every field of a Secret
//! sgctl regenerate my-secret
//!
//! # Regenerate selected fields only
//! sgctl regenerate my-secret --fields password,token
//!
//! # List Secrets managed by the controller
//! sgctl list
//!
//! # Show directives and field sizes of a Secret
//! sgctl status my-secret --namespace default
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kube::Client;

mod list;
mod regenerate;
mod status;

/// Secret Generator Controller CLI
#[derive(Debug, Parser)]
#[command(name = "sgctl")]
#[command(
    about = "Secret Generator Controller CLI",
    long_about = None,
    after_help = "\
Examples:
  sgctl list
  sgctl regenerate my-secret --fields password
  sgctl status my-secret --namespace default --output json
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to `default`; `list` covers all namespaces when unset)
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask the controller to regenerate fields of a Secret
    Regenerate {
        /// Name of the Secret
        #[arg(value_name = "NAME")]
        name: String,

        /// Comma-separated fields to regenerate (all fields when omitted)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// List Secrets managed by the controller
    List,
    /// Show generation directives and field sizes of a Secret
    Status {
        /// Name of the Secret
        #[arg(value_name = "NAME")]
        name: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sgctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::Regenerate { name, fields } => {
            regenerate::regenerate_command(client, name, cli.namespace, fields).await
        }
        Commands::List => list::list_command(client, cli.namespace).await,
        Commands::Status { name, output } => {
            status::status_command(client, name, cli.namespace, output).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regenerate_splits_fields() {
        let cli = Cli::parse_from(["sgctl", "regenerate", "db", "--fields", "a,b"]);
        match cli.command {
            Commands::Regenerate { name, fields } => {
                assert_eq!(name, "db");
                assert_eq!(fields, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_namespace_is_global() {
        let cli = Cli::parse_from(["sgctl", "status", "db", "-n", "apps", "-o", "json"]);
        assert_eq!(cli.namespace.as_deref(), Some("apps"));
        assert!(matches!(
            cli.command,
            Commands::Status {
                output: OutputFormat::Json,
                ..
            }
        ));
    }
}
