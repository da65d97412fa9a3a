use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use runvault_artifact::{ArtifactRepository, LocalFactory, StorageRegistry};
use runvault_core::RunvaultConfig;
use runvault_server::{InMemoryRunCatalog, create_router};

/// runvault - run artifact storage over local disk and object stores
#[derive(Parser)]
#[command(name = "runvault")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (default: runvault.toml, searched upward)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// List the immediate children of a path under an artifact root
    Ls {
        /// Artifact root URI, e.g. s3://bucket/exp1 or /data/mlruns/1
        root_uri: String,

        /// Path relative to the root
        #[arg(default_value = "")]
        path: String,
    },

    /// Write the contents of an artifact to stdout
    Cat {
        /// Artifact root URI
        root_uri: String,

        /// Path of the file relative to the root
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    runvault_telemetry::init_telemetry(&config.observability)
        .context("failed to initialize telemetry")?;

    let mut registry = StorageRegistry::from_config(&config.storage);
    // The CLI reads with the caller's own permissions, so local roots are not
    // confined to the server's allowed roots
    if config.storage.local.enabled && !matches!(cli.command, Commands::Serve { .. }) {
        registry.register(LocalFactory::default());
    }
    let repository = ArtifactRepository::new(Arc::new(registry));

    match cli.command {
        Commands::Serve { host, port } => serve(config, repository, host, port).await,
        Commands::Ls { root_uri, path } => list(&repository, &root_uri, &path).await,
        Commands::Cat { root_uri, path } => cat(&repository, &root_uri, &path).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<RunvaultConfig> {
    match path {
        Some(path) => RunvaultConfig::load_from(path)
            .with_context(|| format!("failed to load config file: {}", path.display())),
        None => RunvaultConfig::load().context("failed to load configuration"),
    }
}

async fn serve(
    mut config: RunvaultConfig,
    repository: ArtifactRepository,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let catalog = Arc::new(InMemoryRunCatalog::with_runs(config.runs.clone()));
    tracing::info!(runs = catalog.len(), "Run catalog loaded");

    let app = create_router(
        repository,
        catalog,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn list(repository: &ArtifactRepository, root_uri: &str, path: &str) -> Result<()> {
    let objects = repository
        .list(root_uri, path)
        .await
        .with_context(|| format!("failed to list '{}' under {}", path, root_uri))?;

    for object in objects {
        if object.is_dir {
            println!("{:>12}  {}/", "-", object.path);
        } else {
            println!("{:>12}  {}", object.size, object.path);
        }
    }
    Ok(())
}

async fn cat(repository: &ArtifactRepository, root_uri: &str, path: &str) -> Result<()> {
    let mut stream = repository
        .get(root_uri, path)
        .await
        .with_context(|| format!("failed to open '{}' under {}", path, root_uri))?;

    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("failed to read '{}'", path))?;
        stdout.write_all(&chunk).await?;
    }
    stdout.flush().await?;
    Ok(())
}
