//! The tunnel adapter
//!
//! [`Adapter`] owns the lifecycle of one tunnel interface. All state lives in
//! a single tokio task, the serial context, which processes [`Command`]s one
//! at a time. The public handle, the engine callbacks and the path sink only
//! enqueue commands, so callers on any thread are queued and never
//! interleaved.
//!
//! ```text
//!            start(url, token)
//!   Stopped ──────────────────────► Started(session)
//!      ▲  ◄──────── stop() ─────────  │     ▲
//!      │                       path   │     │ path satisfied
//!      │ stop()         unsatisfied   ▼     │ (re-apply, reconnect)
//!      └──────────────────────── TemporaryShutdown
//! ```
//!
//! The task keeps only a weak sender to its own queue. Once every
//! [`Adapter`] handle is dropped the queue closes, the task ends and an
//! active session is disconnected.

use std::sync::Arc;
use std::time::Duration;

use gate_tun::{SettingsBridge, TunnelNetworkSettings, TunnelProvider, SETTINGS_TIMEOUT};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;

use crate::config::Config;
use crate::error::AdapterError;
use crate::event::{AdapterEvent, EventHandler, LoggingEventHandler};
use crate::interface::InterfaceAddresses;
use crate::path::{plan_path_update, PathAction, PathMonitor, PathSink, PathStatus, PathWatch, Platform};
use crate::resource::{parse_resources, Resource};
use crate::session::{EngineCallbacks, SessionConnector, SessionHandle};
use crate::settings::generate_network_settings;

/// Observable adapter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterStateKind {
    /// No session, no path monitoring
    Stopped,
    /// Session established and settings applied
    Started,
    /// Session paused until the network path comes back
    TemporaryShutdown,
}

impl AdapterStateKind {
    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            AdapterStateKind::Stopped => "Stopped",
            AdapterStateKind::Started => "Started",
            AdapterStateKind::TemporaryShutdown => "Temporary shutdown",
        }
    }
}

impl std::fmt::Display for AdapterStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

enum AdapterState {
    Stopped,
    Started(Box<dyn SessionHandle>),
    TemporaryShutdown,
}

impl AdapterState {
    fn kind(&self) -> AdapterStateKind {
        match self {
            AdapterState::Stopped => AdapterStateKind::Stopped,
            AdapterState::Started(_) => AdapterStateKind::Started,
            AdapterState::TemporaryShutdown => AdapterStateKind::TemporaryShutdown,
        }
    }
}

/// Adapter tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Platform class, selects the reconnection policy
    pub platform: Platform,
    /// How long to wait for the OS to acknowledge settings
    pub settings_timeout: Duration,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            settings_timeout: SETTINGS_TIMEOUT,
        }
    }
}

impl From<&Config> for AdapterOptions {
    fn from(config: &Config) -> Self {
        Self {
            platform: config.adapter.platform.unwrap_or_else(Platform::current),
            settings_timeout: config.adapter.settings_timeout(),
        }
    }
}

/// Consistent view of the adapter's state
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterSnapshot {
    pub state: AdapterStateKind,
    pub resources: Vec<Resource>,
    pub interface_addresses: Option<InterfaceAddresses>,
    pub last_settings: Option<TunnelNetworkSettings>,
}

/// Work items for the serial context
pub(crate) enum Command {
    Start {
        portal_url: String,
        token: String,
        reply: oneshot::Sender<Result<(), AdapterError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), AdapterError>>,
    },
    ResourcesUpdated {
        session: Option<u64>,
        json: Vec<u8>,
    },
    InterfaceAddressesUpdated {
        session: Option<u64>,
        ipv4: String,
        ipv6: String,
    },
    EngineError {
        session: Option<u64>,
        message: String,
        fatal: bool,
    },
    PathUpdated {
        generation: u64,
        status: PathStatus,
    },
    Snapshot {
        reply: oneshot::Sender<AdapterSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Builder for [`Adapter`]
pub struct AdapterBuilder {
    provider: Arc<dyn TunnelProvider>,
    connector: Arc<dyn SessionConnector>,
    monitor: Arc<dyn PathMonitor>,
    options: AdapterOptions,
    event_handler: Arc<dyn EventHandler>,
}

impl AdapterBuilder {
    /// Set the platform class
    pub fn platform(mut self, platform: Platform) -> Self {
        self.options.platform = platform;
        self
    }

    /// Set the settings acknowledgement timeout
    pub fn settings_timeout(mut self, timeout: Duration) -> Self {
        self.options.settings_timeout = timeout;
        self
    }

    /// Replace all options
    pub fn options(mut self, options: AdapterOptions) -> Self {
        self.options = options;
        self
    }

    /// Set a custom event handler
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = handler;
        self
    }

    /// Spawn the serial context and return a handle to it
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> Adapter {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = AdapterTask {
            commands: tx.downgrade(),
            connector: self.connector,
            monitor: self.monitor,
            bridge: SettingsBridge::new(self.provider).with_timeout(self.options.settings_timeout),
            platform: self.options.platform,
            event_handler: self.event_handler,
            state: AdapterState::Stopped,
            credentials: None,
            watch: None,
            generation: 0,
            session: 0,
            resources: Vec::new(),
            addresses: None,
            last_settings: None,
        };
        log::debug!("Spawning adapter ({} platform)", task.platform);
        tokio::spawn(task.run(rx));
        Adapter { commands: tx }
    }
}

/// Handle to a running adapter
///
/// Cheap to clone. Every method is answered by the serial context; once it
/// has shut down they fail with [`AdapterError::Shutdown`].
#[derive(Clone)]
pub struct Adapter {
    commands: UnboundedSender<Command>,
}

impl Adapter {
    /// Start building an adapter
    pub fn builder(
        provider: Arc<dyn TunnelProvider>,
        connector: Arc<dyn SessionConnector>,
        monitor: Arc<dyn PathMonitor>,
    ) -> AdapterBuilder {
        AdapterBuilder {
            provider,
            connector,
            monitor,
            options: AdapterOptions::default(),
            event_handler: Arc::new(LoggingEventHandler),
        }
    }

    /// Spawn an adapter with the given options and the logging event handler
    pub fn spawn(
        provider: Arc<dyn TunnelProvider>,
        connector: Arc<dyn SessionConnector>,
        monitor: Arc<dyn PathMonitor>,
        options: AdapterOptions,
    ) -> Self {
        Self::builder(provider, connector, monitor)
            .options(options)
            .spawn()
    }

    /// Connect to the portal and bring the tunnel up
    ///
    /// Fails with [`AdapterError::InvalidState`] unless stopped. On any other
    /// failure the adapter is left stopped.
    pub async fn start(
        &self,
        portal_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<(), AdapterError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start {
            portal_url: portal_url.into(),
            token: token.into(),
            reply,
        })?;
        rx.await.map_err(|_| AdapterError::Shutdown)?
    }

    /// Bring the tunnel down
    ///
    /// Fails with [`AdapterError::InvalidState`] if already stopped.
    pub async fn stop(&self) -> Result<(), AdapterError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply })?;
        rx.await.map_err(|_| AdapterError::Shutdown)?
    }

    /// Current state, resources, addresses and settings
    pub async fn snapshot(&self) -> Result<AdapterSnapshot, AdapterError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        rx.await.map_err(|_| AdapterError::Shutdown)
    }

    /// Current state
    pub async fn state(&self) -> Result<AdapterStateKind, AdapterError> {
        Ok(self.snapshot().await?.state)
    }

    /// Resource list currently in effect
    pub async fn resources(&self) -> Result<Vec<Resource>, AdapterError> {
        Ok(self.snapshot().await?.resources)
    }

    /// Interface addresses currently in effect
    pub async fn interface_addresses(&self) -> Result<Option<InterfaceAddresses>, AdapterError> {
        Ok(self.snapshot().await?.interface_addresses)
    }

    /// Settings computed from the latest addresses and resources
    pub async fn last_settings(&self) -> Result<Option<TunnelNetworkSettings>, AdapterError> {
        Ok(self.snapshot().await?.last_settings)
    }

    /// Callback sink feeding this adapter
    ///
    /// Unlike the sink handed to a connecting session, this one is not tied
    /// to any session and is accepted in every state.
    pub fn callbacks(&self) -> EngineCallbacks {
        EngineCallbacks::new(self.commands.downgrade(), None)
    }

    /// Stop the serial context, disconnecting an active session
    ///
    /// Other handles fail with [`AdapterError::Shutdown`] afterwards.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, command: Command) -> Result<(), AdapterError> {
        self.commands
            .send(command)
            .map_err(|_| AdapterError::Shutdown)
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("running", &!self.commands.is_closed())
            .finish()
    }
}

#[derive(Clone)]
struct Credentials {
    portal_url: String,
    token: String,
}

struct AdapterTask {
    commands: WeakUnboundedSender<Command>,
    connector: Arc<dyn SessionConnector>,
    monitor: Arc<dyn PathMonitor>,
    bridge: SettingsBridge,
    platform: Platform,
    event_handler: Arc<dyn EventHandler>,

    state: AdapterState,
    credentials: Option<Credentials>,
    watch: Option<Box<dyn PathWatch>>,
    generation: u64,
    session: u64,

    resources: Vec<Resource>,
    addresses: Option<InterfaceAddresses>,
    last_settings: Option<TunnelNetworkSettings>,
}

impl AdapterTask {
    async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Start {
                    portal_url,
                    token,
                    reply,
                } => {
                    let result = self.start(portal_url, token).await;
                    let _ = reply.send(result);
                }
                Command::Stop { reply } => {
                    let result = self.stop().await;
                    let _ = reply.send(result);
                }
                Command::ResourcesUpdated { session, json } => {
                    if self.accepts(session) {
                        self.on_resources_updated(&json).await
                    }
                }
                Command::InterfaceAddressesUpdated {
                    session,
                    ipv4,
                    ipv6,
                } => {
                    if self.accepts(session) {
                        self.on_interface_addresses_updated(&ipv4, &ipv6).await
                    }
                }
                Command::EngineError {
                    session,
                    message,
                    fatal,
                } => {
                    if self.accepts(session) {
                        self.on_engine_error(message, fatal).await
                    }
                }
                Command::PathUpdated { generation, status } => {
                    self.on_path_updated(generation, status).await
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                Command::Shutdown { reply } => {
                    self.teardown();
                    let _ = reply.send(());
                    break;
                }
            }
        }
        log::debug!("Adapter task finished");
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    async fn start(&mut self, portal_url: String, token: String) -> Result<(), AdapterError> {
        if !matches!(self.state, AdapterState::Stopped) {
            return Err(AdapterError::InvalidState {
                state: self.state.kind(),
            });
        }

        log::info!("Starting tunnel via {}", portal_url);
        self.begin_path_monitoring();

        let callbacks = self.next_session_callbacks();
        let session = match self.connector.connect(&portal_url, &token, callbacks) {
            Ok(session) => session,
            Err(e) => {
                log::error!("Failed to connect session: {}", e);
                self.end_path_monitoring();
                return Err(e.into());
            }
        };

        let settings = self.regenerate_settings();
        if let Err(e) = self.apply_settings(&settings).await {
            log::error!("Failed to apply initial settings: {}", e);
            session.disconnect();
            self.end_path_monitoring();
            return Err(e);
        }

        self.credentials = Some(Credentials { portal_url, token });
        self.set_state(AdapterState::Started(session)).await;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AdapterError> {
        if matches!(self.state, AdapterState::Stopped) {
            return Err(AdapterError::InvalidState {
                state: AdapterStateKind::Stopped,
            });
        }

        log::info!("Stopping tunnel");
        if let AdapterState::Started(session) = self.set_state(AdapterState::Stopped).await {
            session.disconnect();
        }
        self.end_path_monitoring();
        Ok(())
    }

    /// Disconnect and stop monitoring without emitting events
    fn teardown(&mut self) {
        if let AdapterState::Started(session) =
            std::mem::replace(&mut self.state, AdapterState::Stopped)
        {
            log::info!("Disconnecting session on adapter shutdown");
            session.disconnect();
        }
        self.end_path_monitoring();
    }

    /// Replace the state, returning the previous one
    async fn set_state(&mut self, new_state: AdapterState) -> AdapterState {
        let previous = std::mem::replace(&mut self.state, new_state);
        let (old, new) = (previous.kind(), self.state.kind());
        if old != new {
            self.emit_event(AdapterEvent::StateChanged { old, new }).await;
        }
        previous
    }

    /// Callbacks for a session about to connect
    fn next_session_callbacks(&mut self) -> EngineCallbacks {
        self.session += 1;
        EngineCallbacks::new(self.commands.clone(), Some(self.session))
    }

    /// Whether a callback command may act on the current state
    ///
    /// Session-tagged commands are only accepted from the session that is
    /// currently connected.
    fn accepts(&self, session: Option<u64>) -> bool {
        match session {
            None => true,
            Some(id) if id == self.session && matches!(self.state, AdapterState::Started(_)) => {
                true
            }
            Some(id) => {
                log::debug!("Ignoring callback from disconnected session {}", id);
                false
            }
        }
    }

    fn snapshot(&self) -> AdapterSnapshot {
        AdapterSnapshot {
            state: self.state.kind(),
            resources: self.resources.clone(),
            interface_addresses: self.addresses,
            last_settings: self.last_settings.clone(),
        }
    }

    // ========================================================================
    // Settings
    // ========================================================================

    fn regenerate_settings(&mut self) -> TunnelNetworkSettings {
        let settings = generate_network_settings(self.addresses.as_ref(), &self.resources);
        self.last_settings = Some(settings.clone());
        settings
    }

    async fn apply_settings(&self, settings: &TunnelNetworkSettings) -> Result<(), AdapterError> {
        self.bridge.apply(settings).await?;
        self.emit_event(AdapterEvent::SettingsApplied {
            routes: settings.routes().count(),
        })
        .await;
        Ok(())
    }

    /// Recompute settings and push them if the tunnel is up
    async fn refresh_settings(&mut self) {
        let settings = self.regenerate_settings();
        if !matches!(self.state, AdapterState::Started(_)) {
            log::debug!("Tunnel not started, settings stored but not applied");
            return;
        }
        if let Err(e) = self.apply_settings(&settings).await {
            self.report("Failed to refresh tunnel settings", e).await;
        }
    }

    // ========================================================================
    // Engine callbacks
    // ========================================================================

    async fn on_resources_updated(&mut self, json: &[u8]) {
        let resources = match parse_resources(json) {
            Ok(resources) => resources,
            Err(e) => {
                self.report("Discarding resource update", e.into()).await;
                return;
            }
        };

        for resource in &resources {
            log::debug!("Resource: {}", resource);
        }
        self.resources = resources;
        self.emit_event(AdapterEvent::ResourcesUpdated {
            count: self.resources.len(),
        })
        .await;
        self.refresh_settings().await;
    }

    async fn on_interface_addresses_updated(&mut self, ipv4: &str, ipv6: &str) {
        let addresses = match InterfaceAddresses::parse(ipv4, ipv6) {
            Ok(addresses) => addresses,
            Err(e) => {
                self.report("Discarding interface address update", e.into()).await;
                return;
            }
        };

        self.addresses = Some(addresses);
        self.emit_event(AdapterEvent::InterfaceAddressesUpdated(addresses))
            .await;
        self.refresh_settings().await;
    }

    async fn on_engine_error(&mut self, message: String, fatal: bool) {
        if fatal {
            log::error!("Fatal engine error: {}", message);
        } else {
            log::warn!("Engine error: {}", message);
        }
        self.emit_event(AdapterEvent::Error {
            message,
            recoverable: !fatal,
        })
        .await;

        if !fatal || matches!(self.state, AdapterState::Stopped) {
            return;
        }
        log::info!("Stopping tunnel after fatal engine error");
        if let AdapterState::Started(session) = self.set_state(AdapterState::Stopped).await {
            session.disconnect();
        }
        self.end_path_monitoring();
    }

    // ========================================================================
    // Path monitoring
    // ========================================================================

    fn begin_path_monitoring(&mut self) {
        self.end_path_monitoring();
        self.generation += 1;
        let sink = PathSink::new(self.commands.clone(), self.generation);
        self.watch = Some(self.monitor.start(sink));
    }

    fn end_path_monitoring(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.cancel();
        }
    }

    async fn on_path_updated(&mut self, generation: u64, status: PathStatus) {
        if self.watch.is_none() || generation != self.generation {
            log::debug!("Ignoring path update from a cancelled watch");
            return;
        }
        self.emit_event(AdapterEvent::PathChanged(status)).await;

        match plan_path_update(self.state.kind(), status, self.platform) {
            PathAction::Ignore => {}
            PathAction::BumpSockets => {
                if let AdapterState::Started(session) = &self.state {
                    session.bump_sockets();
                }
            }
            PathAction::Roam => {
                if let AdapterState::Started(session) = &self.state {
                    session.disable_roaming_workaround();
                    session.bump_sockets();
                }
            }
            PathAction::Pause => {
                log::info!("Network path lost, pausing tunnel");
                if let AdapterState::Started(session) =
                    self.set_state(AdapterState::TemporaryShutdown).await
                {
                    session.disconnect();
                }
            }
            PathAction::Resume => self.resume().await,
        }
    }

    /// Re-apply the last settings and reconnect after a pause
    async fn resume(&mut self) {
        let Some(credentials) = self.credentials.clone() else {
            log::error!("No portal credentials to resume with");
            return;
        };
        log::info!("Network path restored, resuming tunnel");

        let settings = match self.last_settings.clone() {
            Some(settings) => settings,
            None => self.regenerate_settings(),
        };
        if let Err(e) = self.apply_settings(&settings).await {
            self.report("Failed to restore tunnel settings", e).await;
            return;
        }

        let callbacks = self.next_session_callbacks();
        match self
            .connector
            .connect(&credentials.portal_url, &credentials.token, callbacks)
        {
            Ok(session) => {
                self.set_state(AdapterState::Started(session)).await;
            }
            Err(e) => self.report("Failed to reconnect session", e.into()).await,
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    async fn emit_event(&self, event: AdapterEvent) {
        self.event_handler.on_event(event).await;
    }

    /// Log a failure that has no caller to return to
    async fn report(&self, context: &str, error: AdapterError) {
        log::warn!("{}: {}", context, error);
        self.emit_event(AdapterEvent::Error {
            message: format!("{}: {}", context, error),
            recoverable: error.is_recoverable(),
        })
        .await;
    }
}

impl Drop for AdapterTask {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_kind_display() {
        assert_eq!(AdapterStateKind::Stopped.to_string(), "Stopped");
        assert_eq!(
            AdapterStateKind::TemporaryShutdown.to_string(),
            "Temporary shutdown"
        );
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::from_toml(
            r#"
[portal]
url = "wss://api.example.com"
token = "secret"

[adapter]
platform = "mobile"
settings_timeout_ms = 250
"#,
        )
        .unwrap();

        let options = AdapterOptions::from(&config);
        assert_eq!(options.platform, Platform::Mobile);
        assert_eq!(options.settings_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_default_options() {
        let options = AdapterOptions::default();
        assert_eq!(options.settings_timeout, SETTINGS_TIMEOUT);
        assert_eq!(options.platform, Platform::current());
    }
}
