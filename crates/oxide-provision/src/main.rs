//! oxide-provision CLI
//!
//! Runs one reconciliation per invocation. The request is read as JSON from a
//! file or stdin, the response is printed as JSON on stdout, and logs go to
//! stderr.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_provision::prelude::*;

/// Reconciles a PostgreSQL user and database against a desired state.
#[derive(Parser)]
#[command(name = "oxide-provision")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file mapping secret ids to `{username, password, versionId}`.
    #[arg(short, long, env = "OXIDE_PROVISION_SECRETS")]
    secrets_file: PathBuf,

    /// Maintenance database both sessions connect to.
    #[arg(long, env = "OXIDE_PROVISION_ADMIN_DATABASE", default_value = "postgres")]
    admin_database: String,

    /// TLS mode. `require` encrypts without verifying the server certificate.
    #[arg(long, env = "OXIDE_PROVISION_SSL_MODE", value_enum, default_value_t = SslMode::Require)]
    ssl_mode: SslMode,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, update or delete the user/database pair.
    Reconcile {
        /// Request file (`-` for stdin).
        #[arg(short, long, default_value = "-")]
        request: PathBuf,
    },

    /// Report the active version of a secret.
    SecretVersion {
        /// Request file (`-` for stdin).
        #[arg(short, long, default_value = "-")]
        request: PathBuf,
    },

    /// Show the statements a Create would issue, without connecting.
    Sql {
        /// Request file (`-` for stdin).
        #[arg(short, long, default_value = "-")]
        request: PathBuf,
    },
}

fn read_request(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut payload = String::new();
        std::io::stdin()
            .read_to_string(&mut payload)
            .context("failed to read request from stdin")?;
        Ok(payload)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request file '{}'", path.display()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let secrets: Arc<dyn SecretResolver> = Arc::new(FileSecretStore::new(&cli.secrets_file));
    let config = ProvisionConfig::new()
        .admin_database(cli.admin_database)
        .ssl_mode(cli.ssl_mode);

    match cli.command {
        Commands::Reconcile { request } => {
            let request = ReconcileRequest::from_json(&read_request(&request)?)?;
            let reconciler = Reconciler::postgres(secrets, config);
            let token = reconciler.reconcile(&request).await?;
            println!("{}", json!({ "identityToken": token.as_str() }));
        }

        Commands::SecretVersion { request } => {
            let request = SecretVersionRequest::from_json(&read_request(&request)?)?;
            let version = SecretVersionReconciler::new(secrets)
                .reconcile(&request)
                .await?;
            println!("{}", json!({ "versionId": version }));
        }

        Commands::Sql { request } => {
            let request = ReconcileRequest::from_json(&read_request(&request)?)?;
            let reconciler = Reconciler::postgres(secrets, config);
            info!(
                host = %request.spec.host,
                database = %request.spec.database_name,
                "Previewing Create statements"
            );
            for statement in reconciler.preview_create(&request.spec).await? {
                println!("{statement};");
            }
        }
    }

    Ok(())
}
