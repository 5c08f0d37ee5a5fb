//! Tunnel network settings for VPN clients
//!
//! This crate describes the OS-level configuration of a tunnel interface and
//! applies it through the platform's tunnel provider.
//!
//! # Features
//!
//! - **Settings Model**: interface addresses, included routes, DNS, MTU
//! - **Routes**: host and network routes derived from `ipnet` networks
//! - **Provider Abstraction**: the asynchronous "apply settings" OS surface
//! - **Settings Bridge**: bounded wait on the provider's completion callback
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gate_tun::{DnsSettings, Ipv4Settings, LoggingProvider, SettingsBridge, TunnelNetworkSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = TunnelNetworkSettings::new(std::net::Ipv4Addr::LOCALHOST)
//!         .with_ipv4(Ipv4Settings::default().with_host_address("100.100.111.2".parse()?))
//!         .with_dns(DnsSettings::match_all(vec!["1.1.1.1".parse()?]));
//!
//!     let bridge = SettingsBridge::new(Arc::new(LoggingProvider));
//!     bridge.apply(&settings).await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

pub mod bridge;
pub mod error;
pub mod mock;
pub mod provider;
pub mod route;
pub mod settings;

pub use bridge::SettingsBridge;
pub use error::{Error, Result};
pub use provider::{Completion, CompletionResult, LoggingProvider, TunnelProvider};
pub use route::{Ipv4Route, Ipv6Route, Route};
pub use settings::{DnsSettings, Ipv4Settings, Ipv6Settings, TunnelNetworkSettings};

/// Default MTU for the tunnel interface
///
/// 1280 is the IPv6 minimum, which keeps dual-stack tunnels working without
/// path MTU discovery.
pub const DEFAULT_MTU: u16 = 1280;

/// How long to wait for the provider's completion callback
pub const SETTINGS_TIMEOUT: Duration = Duration::from_secs(5);
