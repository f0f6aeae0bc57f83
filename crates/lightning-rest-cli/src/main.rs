#![deny(unsafe_code)]

//! lightning-rest: REST/JSON gateway for a Lightning node's RPC socket.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use lightning_rest_config::AppConfig;
use lightning_rest_core::Gateway;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Serve a Lightning daemon's JSON-RPC interface as a REST API.
#[derive(Parser, Debug)]
#[command(name = "lightning-rest", version, about, long_about = None)]
struct Cli {
    /// Port to listen on [default: 8000].
    port: Option<u16>,

    /// Path to the daemon's RPC socket [default: ~/.lightning/lightning-rpc].
    path: Option<String>,

    /// Address to bind [default: 0.0.0.0, all interfaces].
    #[arg(short, long, value_name = "ADDRESS")]
    bind: Option<String>,

    /// Path to configuration file. Optional; defaults apply if it is missing.
    #[arg(short, long, default_value = "lightning-rest.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate and print the resolved configuration, then exit.
    #[arg(long)]
    check_config: bool,
}

impl Cli {
    /// Command-line values win over the file.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = &self.path {
            config.rpc.socket_path = path.clone();
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, found) = load_config(&cli.config).await?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &config))),
        )
        .init();

    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    if cli.check_config {
        let toml_str = toml::to_string_pretty(&config).context("failed to render config")?;
        println!("{toml_str}");
        return Ok(());
    }

    let gateway = Gateway::connect(config)
        .await
        .context("cannot start gateway")?;
    gateway.run().await?;
    Ok(())
}

/// `-v` and `-vv` override the configured level.
fn log_filter(verbose: u8, config: &AppConfig) -> String {
    match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// The file at `path` if there is one, otherwise defaults.
async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if path.exists() {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}
