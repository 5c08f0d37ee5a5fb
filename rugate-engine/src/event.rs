//! Adapter events

use crate::adapter::AdapterStateKind;
use crate::interface::InterfaceAddresses;
use crate::path::PathStatus;

/// Events emitted by the adapter
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// State changed
    StateChanged {
        old: AdapterStateKind,
        new: AdapterStateKind,
    },

    /// Tunnel settings were handed to the OS
    SettingsApplied {
        /// Number of included routes, both families
        routes: usize,
    },

    /// A new resource list replaced the previous one
    ResourcesUpdated {
        /// Number of resources in the new list
        count: usize,
    },

    /// The engine assigned new interface addresses
    InterfaceAddressesUpdated(InterfaceAddresses),

    /// The OS reported a path change
    PathChanged(PathStatus),

    /// Error occurred
    Error {
        /// Error message
        message: String,
        /// Whether the error is recoverable
        recoverable: bool,
    },
}

/// Event handler trait for receiving adapter events
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an adapter event
    async fn on_event(&self, event: AdapterEvent);
}

/// Simple event handler that logs events
pub struct LoggingEventHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingEventHandler {
    async fn on_event(&self, event: AdapterEvent) {
        match event {
            AdapterEvent::StateChanged { old, new } => {
                log::info!("Adapter state: {} -> {}", old, new);
            }
            AdapterEvent::SettingsApplied { routes } => {
                log::info!("Tunnel settings applied: {} route(s)", routes);
            }
            AdapterEvent::ResourcesUpdated { count } => {
                log::info!("Resources updated: {} resource(s)", count);
            }
            AdapterEvent::InterfaceAddressesUpdated(addresses) => {
                log::info!("Interface addresses: {}", addresses);
            }
            AdapterEvent::PathChanged(status) => {
                log::debug!("Network path {}", status);
            }
            AdapterEvent::Error {
                message,
                recoverable,
            } => {
                if recoverable {
                    log::warn!("Recoverable error: {}", message);
                } else {
                    log::error!("Error: {}", message);
                }
            }
        }
    }
}
