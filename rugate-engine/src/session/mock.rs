//! Mock engine sessions for testing
//!
//! [`MockConnector`] records every connect attempt, hands out
//! [`MockSession`]s whose calls are counted in a shared [`SessionState`],
//! and keeps the latest [`EngineCallbacks`] so tests can play the engine.
//!
//! # Example
//!
//! ```ignore
//! let connector = Arc::new(MockConnector::new());
//! connector.deliver_on_connect(Some(("100.100.111.2", "fd00::2")), Some(resources_json));
//! // ... start the adapter ...
//! assert_eq!(connector.connect_count(), 1);
//! assert!(!connector.session(0).unwrap().is_disconnected());
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{EngineCallbacks, SessionConnector, SessionHandle};
use crate::error::SessionError;

/// Observable state of one mock session
#[derive(Debug, Default)]
pub struct SessionState {
    disconnected: AtomicBool,
    bumps: AtomicUsize,
    roaming_disabled: AtomicUsize,
}

impl SessionState {
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn bump_count(&self) -> usize {
        self.bumps.load(Ordering::SeqCst)
    }

    pub fn roaming_disabled_count(&self) -> usize {
        self.roaming_disabled.load(Ordering::SeqCst)
    }
}

/// Session handle backed by a shared [`SessionState`]
#[derive(Debug)]
pub struct MockSession {
    state: Arc<SessionState>,
}

impl SessionHandle for MockSession {
    fn disconnect(self: Box<Self>) {
        self.state.disconnected.store(true, Ordering::SeqCst);
    }

    fn bump_sockets(&self) {
        self.state.bumps.fetch_add(1, Ordering::SeqCst);
    }

    fn disable_roaming_workaround(&self) {
        self.state.roaming_disabled.fetch_add(1, Ordering::SeqCst);
    }
}

/// A recorded connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectAttempt {
    pub portal_url: String,
    pub token: String,
}

#[derive(Default)]
struct Inner {
    attempts: Vec<ConnectAttempt>,
    sessions: Vec<Arc<SessionState>>,
    callbacks: Option<EngineCallbacks>,
    failure: Option<String>,
    initial_addresses: Option<(String, String)>,
    initial_resources: Option<Vec<u8>>,
}

/// Recording session connector
#[derive(Default)]
pub struct MockConnector {
    inner: Mutex<Inner>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent connects fail with `message`, or succeed again with `None`
    pub fn set_failure(&self, message: Option<&str>) {
        self.inner.lock().unwrap().failure = message.map(str::to_string);
    }

    /// Deliver these updates from inside every successful `connect`
    pub fn deliver_on_connect(&self, addresses: Option<(&str, &str)>, resources: Option<&[u8]>) {
        let mut inner = self.inner.lock().unwrap();
        inner.initial_addresses = addresses.map(|(v4, v6)| (v4.to_string(), v6.to_string()));
        inner.initial_resources = resources.map(<[u8]>::to_vec);
    }

    /// Every connect attempt, including failed ones
    pub fn attempts(&self) -> Vec<ConnectAttempt> {
        self.inner.lock().unwrap().attempts.clone()
    }

    /// Number of connect attempts
    pub fn connect_count(&self) -> usize {
        self.inner.lock().unwrap().attempts.len()
    }

    /// State of the `index`th session handed out
    pub fn session(&self, index: usize) -> Option<Arc<SessionState>> {
        self.inner.lock().unwrap().sessions.get(index).cloned()
    }

    /// State of the most recent session
    pub fn last_session(&self) -> Option<Arc<SessionState>> {
        self.inner.lock().unwrap().sessions.last().cloned()
    }

    /// Number of sessions handed out
    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    /// Callbacks from the most recent connect attempt
    pub fn callbacks(&self) -> Option<EngineCallbacks> {
        self.inner.lock().unwrap().callbacks.clone()
    }
}

impl std::fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("MockConnector")
            .field("attempts", &inner.attempts.len())
            .field("sessions", &inner.sessions.len())
            .field("failure", &inner.failure)
            .finish()
    }
}

impl SessionConnector for MockConnector {
    fn connect(
        &self,
        portal_url: &str,
        token: &str,
        callbacks: EngineCallbacks,
    ) -> Result<Box<dyn SessionHandle>, SessionError> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts.push(ConnectAttempt {
            portal_url: portal_url.to_string(),
            token: token.to_string(),
        });
        inner.callbacks = Some(callbacks.clone());

        if let Some(message) = &inner.failure {
            return Err(SessionError::new(message.clone()));
        }

        if let Some((v4, v6)) = &inner.initial_addresses {
            callbacks.interface_addresses_updated(v4, v6);
        }
        if let Some(json) = &inner.initial_resources {
            callbacks.resources_updated(json);
        }

        let state = Arc::new(SessionState::default());
        inner.sessions.push(state.clone());
        Ok(Box::new(MockSession { state }))
    }
}
