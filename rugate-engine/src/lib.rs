//! Rugate Engine
//!
//! This crate provides the platform-side control layer of a tunnel client:
//! it owns the lifecycle of one tunnel interface, turns the tunnel engine's
//! resource and address notifications into OS network settings, and reacts
//! to network path changes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │  ┌─────────────────┐              ┌─────────────────────┐   │
//! │  │   rugate-cli    │              │  Platform wrappers  │   │
//! │  └────────┬────────┘              └──────────┬──────────┘   │
//! │           └───────────────┬──────────────────┘              │
//! │                           ▼                                  │
//! │  ┌────────────────────────────────────────────────────────┐ │
//! │  │                   rugate-engine                         │ │
//! │  │  - Adapter (state machine, serial context)             │ │
//! │  │  - Resources + settings generation                     │ │
//! │  │  - Session / path monitor seams                        │ │
//! │  │  - Config (TOML configuration)                         │ │
//! │  │  - Events (status updates, errors)                     │ │
//! │  └────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Library Layer                            │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │  gate-tun                                             │  │
//! │  │  - Tunnel settings model, routes                      │  │
//! │  │  - TunnelProvider (OS seam)                           │  │
//! │  │  - SettingsBridge (bounded apply)                     │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Engine callbacks and path updates are enqueued onto the adapter's serial
//! context; see [`adapter`].

pub mod adapter;
pub mod config;
pub mod error;
pub mod event;
pub mod interface;
pub mod path;
pub mod resource;
pub mod session;
pub mod settings;

pub use adapter::{Adapter, AdapterBuilder, AdapterOptions, AdapterSnapshot, AdapterStateKind};
pub use config::{AdapterConfig, CommonConfig, Config, PortalConfig};
pub use error::{AdapterError, AddressError, Error, ResourceError, Result, SessionError};
pub use event::{AdapterEvent, EventHandler, LoggingEventHandler};
pub use interface::InterfaceAddresses;
pub use path::{
    plan_path_update, ManualPathMonitor, PathAction, PathMonitor, PathSink, PathStatus, PathWatch,
    Platform,
};
pub use resource::{parse_resources, Resource, ResourceLocation};
pub use session::{EngineCallbacks, SessionConnector, SessionHandle};
pub use settings::{generate_network_settings, DNS_SENTINEL, TUNNEL_REMOTE_ADDRESS};
