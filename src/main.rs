use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use companion_chat::config::Config;
use companion_chat::transport::{self, cli};

#[derive(Parser)]
#[command(name = "companion")]
#[command(author, version, about = "Companion - streaming chat client for companion assistant backends", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend base URL (overrides the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session
    Chat {
        /// Read completed replies aloud with the configured speech command
        #[arg(long)]
        speak: bool,
    },

    /// List stored conversations
    Sessions,

    /// Print a stored conversation
    History {
        /// Session id as shown by `sessions`
        id: String,
    },

    /// Delete every stored conversation
    Clear,

    /// Run a local echo backend for development
    ServeEcho {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },

    /// Show the effective configuration
    Config {
        /// Write the defaults to the config file if it does not exist
        #[arg(long)]
        init: bool,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable config: {:#}", e);
            Config::default()
        }),
    };
    match &cli.base_url {
        Some(url) => config.with_base_url(url),
        None => Ok(config),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "companion_chat=debug,companion=debug"
    } else {
        "companion_chat=info,companion=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Chat { speak } => cli::run_chat(&config, speak).await?,
        Commands::Sessions => cli::run_sessions(&config).await?,
        Commands::History { id } => cli::run_history(&config, &id).await?,
        Commands::Clear => cli::run_clear(&config).await?,
        Commands::ServeEcho { host, port } => {
            transport::run_echo_server(&host, port, &config.backend.endpoints).await?
        }
        Commands::Config { init } => {
            let path = match cli.config {
                Some(path) => path,
                None => Config::config_path()?,
            };
            if init && !path.exists() {
                config
                    .save_to(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
