//! OS tunnel provider abstraction
//!
//! The platform exposes "apply network settings" as an asynchronous request
//! that reports back through a completion callback. [`TunnelProvider`] models
//! exactly that surface; [`crate::bridge::SettingsBridge`] turns it into a
//! bounded call.
//!
//! # Implementation Notes
//!
//! - `set_tunnel_network_settings` must not block waiting for the OS
//! - `completion` is invoked at most once, from any thread
//! - the OS may never invoke `completion`; callers must not rely on it
//! - settings are set, never queried back

use crate::error::Result;
use crate::settings::TunnelNetworkSettings;

/// Outcome reported by the OS; `Err` carries the OS error description
pub type CompletionResult = std::result::Result<(), String>;

/// Completion callback handed to the provider
pub type Completion = Box<dyn FnOnce(CompletionResult) + Send + 'static>;

/// The OS surface that applies tunnel network settings
pub trait TunnelProvider: Send + Sync {
    /// Ask the OS to apply `settings`
    ///
    /// Returns `Err` only if the request could not be issued. The OS result
    /// arrives through `completion`.
    fn set_tunnel_network_settings(
        &self,
        settings: &TunnelNetworkSettings,
        completion: Completion,
    ) -> Result<()>;
}

/// Provider that only logs the settings and completes immediately
///
/// Useful on hosts where the tunnel interface is configured out of band.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProvider;

impl TunnelProvider for LoggingProvider {
    fn set_tunnel_network_settings(
        &self,
        settings: &TunnelNetworkSettings,
        completion: Completion,
    ) -> Result<()> {
        log::info!(
            "Tunnel settings: {} IPv4 address(es), {} IPv6 address(es), {} route(s), mtu {}",
            settings.ipv4.addresses.len(),
            settings.ipv6.addresses.len(),
            settings.routes().count(),
            settings.mtu
        );
        for route in settings.routes() {
            log::debug!("Included route: {}", route);
        }
        completion(Ok(()));
        Ok(())
    }
}
