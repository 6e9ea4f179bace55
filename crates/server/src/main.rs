use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod api;
mod config;
mod websocket;

use config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "toolmesh")]
#[command(about = "Federated tool registry and trust network node", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TOOLMESH_CONFIG", default_value = "toolmesh.toml")]
    config: PathBuf,

    /// Data directory for storage
    #[arg(short, long, env = "TOOLMESH_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "TOOLMESH_PORT", default_value = "8080")]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "TOOLMESH_HOST", default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolmesh=info,toolmesh_core=info,tower_http=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let args = Args::parse();

    tracing::info!("Starting toolmesh node");
    tracing::info!("Data directory: {}", args.data_dir.display());

    let config = ServerConfig::load(&args.config, args.data_dir)?;
    tracing::info!(
        "Network {} (discovery {}, announce {})",
        config.federation.network_id,
        config.federation.discovery_enabled,
        config.federation.announce_enabled
    );

    let addr = format!("{}:{}", args.host, args.port);
    tracing::info!("Starting API server on {}", addr);

    api::serve(&addr, config).await?;

    Ok(())
}
