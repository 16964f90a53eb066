//! Playdeck CLI - Command-line interface for the Playdeck session transport.
//!
//! Joins an activity instance from the terminal and streams its events,
//! resolves endpoints for each of the supported network topologies, and
//! inspects the effective configuration. Useful for headless operation,
//! scripting, and debugging connectivity.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;

use pd_core::config::{AppConfig, ConfigHandle};
use pd_core::error::PdResult;
use pd_core::logging;
use pd_core::platform::Platform;

/// Playdeck - shared activity sessions from the terminal.
#[derive(Parser)]
#[command(
    name = "playdeck",
    version,
    about = "Playdeck session transport CLI",
    long_about = "A command-line client for Playdeck activity instances.\n\
                   Join an instance to chat and watch participants come and go, or inspect\n\
                   how the transport resolves its backend endpoint."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join an activity instance and stream its events.
    Join {
        /// Instance identifier to join.
        instance: String,
        /// Activity identifier within the instance.
        #[arg(short, long)]
        activity: Option<String>,
        /// User identifier (defaults to a generated UUID).
        #[arg(short, long)]
        user: Option<String>,
        /// Display name (defaults to the hostname).
        #[arg(short = 'n', long)]
        username: Option<String>,
        /// Origin to behave as running from, e.g. "https://abc123.playdeck.run".
        #[arg(short, long)]
        origin: Option<String>,
        /// Backend override URL (takes precedence over detection).
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Show how an origin and override resolve to a channel endpoint.
    Resolve {
        /// Origin to resolve from.
        origin: String,
        /// Backend override URL.
        #[arg(short, long)]
        server: Option<String>,
        /// Substitute host for local development.
        #[arg(long)]
        dev_host: Option<String>,
    },
    /// Show the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> PdResult<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let log_dir = Platform::data_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
        .join("logs");
    let _guard = logging::init_logging(log_level, &log_dir, false)?;

    // Load configuration
    let config_path = cli.config.as_deref().map(std::path::Path::new);
    let config = if let Some(path) = config_path {
        AppConfig::load_from_file(path)?
    } else {
        AppConfig::load_default()?
    };

    let config_handle = ConfigHandle::new(config);

    info!("Playdeck CLI v{}", pd_core::constants::APP_VERSION);

    // Dispatch to command handlers
    match cli.command {
        Commands::Join {
            instance,
            activity,
            user,
            username,
            origin,
            server,
        } => {
            commands::join::run(config_handle, instance, activity, user, username, origin, server)
                .await
        }
        Commands::Resolve {
            origin,
            server,
            dev_host,
        } => commands::resolve::run(config_handle, origin, server, dev_host).await,
        Commands::Config => commands::config::run(config_handle).await,
    }
}
