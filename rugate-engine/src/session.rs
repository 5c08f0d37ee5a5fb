//! Tunnel engine session seam
//!
//! The packet-forwarding engine is an external component. The adapter only
//! needs to connect it, disconnect it and nudge it after network changes;
//! the engine talks back through [`EngineCallbacks`].
//!
//! # Implementation Notes
//!
//! - `connect` may invoke the callbacks before it returns; they are queued
//!   and handled once the adapter is done starting
//! - a handle is owned by exactly one adapter and is consumed by `disconnect`

pub mod mock;

use tokio::sync::mpsc::WeakUnboundedSender;

use crate::adapter::Command;
use crate::error::SessionError;

/// A live engine session
pub trait SessionHandle: Send + Sync {
    /// Tear the session down
    fn disconnect(self: Box<Self>);

    /// Rebind the engine's sockets after an interface change
    fn bump_sockets(&self);

    /// Turn off the engine's roaming workaround for mobile networks
    fn disable_roaming_workaround(&self);
}

/// Establishes engine sessions
pub trait SessionConnector: Send + Sync {
    /// Connect to the portal and start a session
    fn connect(
        &self,
        portal_url: &str,
        token: &str,
        callbacks: EngineCallbacks,
    ) -> Result<Box<dyn SessionHandle>, SessionError>;
}

/// Callback sink handed to the engine
///
/// Every call only enqueues a command for the adapter and returns
/// immediately, so it is safe from any thread. The sink does not keep the
/// adapter alive; calls made after the adapter is gone return `false`.
///
/// A sink passed to [`SessionConnector::connect`] belongs to that session:
/// once the session is disconnected the adapter ignores what it sends.
#[derive(Clone)]
pub struct EngineCallbacks {
    commands: WeakUnboundedSender<Command>,
    session: Option<u64>,
}

impl EngineCallbacks {
    pub(crate) fn new(commands: WeakUnboundedSender<Command>, session: Option<u64>) -> Self {
        Self { commands, session }
    }

    /// The engine's resource list changed; `json` is the full new list
    pub fn resources_updated(&self, json: &[u8]) -> bool {
        self.send(Command::ResourcesUpdated {
            session: self.session,
            json: json.to_vec(),
        })
    }

    /// The engine assigned new tunnel interface addresses
    pub fn interface_addresses_updated(&self, ipv4: &str, ipv6: &str) -> bool {
        self.send(Command::InterfaceAddressesUpdated {
            session: self.session,
            ipv4: ipv4.to_string(),
            ipv6: ipv6.to_string(),
        })
    }

    /// The engine hit an error; a fatal one stops the tunnel
    pub fn error(&self, message: &str, fatal: bool) -> bool {
        self.send(Command::EngineError {
            session: self.session,
            message: message.to_string(),
            fatal,
        })
    }

    fn send(&self, command: Command) -> bool {
        match self.commands.upgrade() {
            Some(tx) => tx.send(command).is_ok(),
            None => {
                log::debug!("Engine callback after adapter shutdown, ignoring");
                false
            }
        }
    }
}

impl std::fmt::Debug for EngineCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCallbacks")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
