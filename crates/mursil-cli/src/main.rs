//! Mursil - Object Event Trigger Gateway
//!
//! Receives S3-compatible storage notifications and forwards each
//! object as an idempotent trigger call to the configured schedulers.

use clap::{Parser, Subcommand};
use mursil_core::config::MursilConfig;
use mursil_gateway::GatewayServer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mursil")]
#[command(author = "Mursil Team")]
#[command(version = mursil_core::VERSION)]
#[command(about = "Object Event Trigger Gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Bind address
    #[arg(long, env = "MURSIL_BIND_ADDRESS")]
    bind: Option<String>,

    /// Port number
    #[arg(short, long, env = "MURSIL_PORT")]
    port: Option<u16>,

    /// Shared secret for ingest authentication
    #[arg(long, env = "MURSIL_SHARED_SECRET")]
    shared_secret: Option<String>,

    /// Identity mode (hash-prefix, basename, key-path)
    #[arg(long, env = "MURSIL_IDENTITY_MODE")]
    identity_mode: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MURSIL_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Server,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &cli.config {
        MursilConfig::from_file(config_path)?
    } else {
        MursilConfig::from_env()
    };

    // Override with CLI args
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(secret) = cli.shared_secret {
        config.auth.shared_secret = Some(secret);
    }
    if let Some(mode) = cli.identity_mode {
        config.identity.mode = mode.parse()?;
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("mursil {}", mursil_core::VERSION);
        }
        Some(Commands::Server) | None => {
            config.validate()?;
            info!(version = mursil_core::VERSION, "starting mursil gateway");
            GatewayServer::new(config).run().await?;
        }
    }

    Ok(())
}
