//! Rugate CLI
//!
//! A command-line interface around the Rugate tunnel adapter.

mod replay;

use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gate_tun::{LoggingProvider, TunnelNetworkSettings};
use rugate_engine::{
    generate_network_settings, parse_resources, Adapter, AdapterOptions, Config,
    InterfaceAddresses, ManualPathMonitor,
};

use crate::replay::ReplayConnector;

/// Rugate - platform-side control layer for a tunnel client
#[derive(Parser)]
#[command(name = "rugate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "rugate.toml")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace) [default: from config, else info]
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the adapter, replaying a resource list as the engine
    Run {
        /// JSON resource list delivered on every connect
        #[arg(short, long)]
        resources: PathBuf,

        #[command(flatten)]
        addresses: AddressArgs,
    },

    /// Print the tunnel settings generated for a resource list
    Render {
        /// JSON resource list
        #[arg(short, long)]
        resources: PathBuf,

        #[command(flatten)]
        addresses: AddressArgs,
    },

    /// Generate a sample configuration file
    GenConfig {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "rugate.toml")]
        output: PathBuf,
    },

    /// Validate the configuration file
    CheckConfig,
}

#[derive(clap::Args)]
struct AddressArgs {
    /// Tunnel interface IPv4 address
    #[arg(long, requires = "ipv6")]
    ipv4: Option<Ipv4Addr>,

    /// Tunnel interface IPv6 address
    #[arg(long, requires = "ipv4")]
    ipv6: Option<Ipv6Addr>,
}

impl AddressArgs {
    fn interface_addresses(&self) -> Option<InterfaceAddresses> {
        match (self.ipv4, self.ipv6) {
            (Some(ipv4), Some(ipv6)) => Some(InterfaceAddresses::new(ipv4, ipv6)),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&log_level(cli.log_level.as_deref(), &cli.config));

    match cli.command {
        Commands::Run {
            resources,
            addresses,
        } => run(&cli.config, &resources, addresses.interface_addresses()).await,
        Commands::Render {
            resources,
            addresses,
        } => render(&resources, addresses.interface_addresses()),
        Commands::GenConfig { output } => generate_config(output),
        Commands::CheckConfig => check_config(&cli.config),
    }
}

/// Command-line level first, then the config file's, then "info"
///
/// An unreadable config falls back silently here; the command that needs it
/// reports the error once logging is up.
fn log_level(cli_level: Option<&str>, config_path: &Path) -> String {
    if let Some(level) = cli_level {
        return level.to_string();
    }
    Config::load(config_path)
        .map(|config| config.common.log_level)
        .unwrap_or_else(|_| "info".to_string())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(
    config_path: &Path,
    resources_path: &Path,
    addresses: Option<InterfaceAddresses>,
) -> Result<()> {
    info!("Starting Rugate adapter...");

    let config = load_config(config_path)?;
    info!("Configuration loaded from {:?}", config_path);

    let resources = read_resources(resources_path)?;
    // Fail early instead of on every replayed update
    parse_resources(&resources)
        .with_context(|| format!("Invalid resource list in {:?}", resources_path))?;

    let options = AdapterOptions::from(&config);
    info!("Platform: {}, settings timeout: {:?}", options.platform, options.settings_timeout);

    let adapter = Adapter::spawn(
        Arc::new(LoggingProvider),
        Arc::new(ReplayConnector::new(resources, addresses)),
        Arc::new(ManualPathMonitor::new()),
        options,
    );

    adapter
        .start(config.portal.url.as_str(), config.portal.token.as_str())
        .await
        .context("Failed to start adapter")?;

    wait_for_shutdown().await?;

    info!("Shutting down adapter...");
    if let Err(e) = adapter.stop().await {
        warn!("Failed to stop adapter: {}", e);
    }
    adapter.shutdown().await;

    Ok(())
}

fn render(resources_path: &Path, addresses: Option<InterfaceAddresses>) -> Result<()> {
    let settings = render_settings(resources_path, addresses)?;
    let json = serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?;
    println!("{}", json);
    Ok(())
}

fn render_settings(
    resources_path: &Path,
    addresses: Option<InterfaceAddresses>,
) -> Result<TunnelNetworkSettings> {
    let json = read_resources(resources_path)?;
    let resources = parse_resources(&json)
        .with_context(|| format!("Invalid resource list in {:?}", resources_path))?;

    info!("Loaded {} resource(s) from {:?}", resources.len(), resources_path);
    Ok(generate_network_settings(addresses.as_ref(), &resources))
}

fn read_resources(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read resources from {:?}", path))
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))
}

fn generate_config(output: PathBuf) -> Result<()> {
    let sample = Config::sample();

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write configuration to {:?}", output))?;

    info!("Generated sample configuration at {:?}", output);
    println!("Sample configuration written to {:?}", output);
    println!("\nEdit the configuration file and set your portal token before running.");

    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let options = AdapterOptions::from(&config);

    println!("Configuration {:?} is valid", path);
    println!("  portal:           {}", config.portal.url);
    println!("  platform:         {}", options.platform);
    println!("  settings timeout: {:?}", options.settings_timeout);

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to register SIGTERM handler")?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("Failed to register SIGINT handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_addresses_must_come_in_pairs() {
        let result = Cli::try_parse_from(["rugate", "render", "-r", "r.json", "--ipv4", "100.100.111.2"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "rugate", "render", "-r", "r.json", "--ipv4", "100.100.111.2", "--ipv6", "fd00::2",
        ])
        .unwrap();
        match cli.command {
            Commands::Render { addresses, .. } => assert!(addresses.interface_addresses().is_some()),
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_log_level_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rugate.toml");
        std::fs::write(
            &path,
            r#"
[common]
log_level = "debug"

[portal]
url = "wss://api.example.com"
token = "secret"
"#,
        )
        .unwrap();

        assert_eq!(log_level(None, &path), "debug");
        assert_eq!(log_level(Some("trace"), &path), "trace");
        assert_eq!(log_level(None, &dir.path().join("missing.toml")), "info");

        let cli = Cli::try_parse_from(["rugate", "check-config"]).unwrap();
        assert_eq!(cli.log_level, None);
    }

    #[test]
    fn test_render_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.json");
        std::fs::write(
            &path,
            r#"[{"type": "cidr", "name": "VPC", "address": "10.0.0.0/24"}]"#,
        )
        .unwrap();

        let settings = render_settings(&path, None).unwrap();
        assert_eq!(settings.ipv4.included_routes.len(), 1);
        assert!(settings.ipv4.addresses.is_empty());
    }

    #[test]
    fn test_render_rejects_bad_resources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.json");
        std::fs::write(&path, r#"[{"type": "bogus"}]"#).unwrap();

        assert!(render_settings(&path, None).is_err());
        assert!(render_settings(&dir.path().join("missing.json"), None).is_err());
    }
}
