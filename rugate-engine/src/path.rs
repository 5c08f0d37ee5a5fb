//! Network path monitoring and the reconnection policy
//!
//! The OS reports whether the current network path is usable. The adapter
//! starts one [`PathWatch`] per session and decides what to do with each
//! update through [`plan_path_update`].
//!
//! On desktop platforms an interface change only needs the engine's sockets
//! rebound. On mobile platforms losing the path pauses the tunnel entirely,
//! and regaining it restores the last settings and reconnects.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::WeakUnboundedSender;

use crate::adapter::{AdapterStateKind, Command};

/// Reachability of the current network path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathStatus {
    Satisfied,
    Unsatisfied,
}

impl std::fmt::Display for PathStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathStatus::Satisfied => write!(f, "satisfied"),
            PathStatus::Unsatisfied => write!(f, "unsatisfied"),
        }
    }
}

/// Platform class, which selects the reconnection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Desktop,
    Mobile,
}

impl Platform {
    /// Platform class of the host we were built for
    pub fn current() -> Self {
        if cfg!(any(target_os = "ios", target_os = "android")) {
            Platform::Mobile
        } else {
            Platform::Desktop
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Desktop => write!(f, "desktop"),
            Platform::Mobile => write!(f, "mobile"),
        }
    }
}

/// What the adapter does with a path update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAction {
    /// Nothing to do
    Ignore,
    /// Rebind the engine's sockets
    BumpSockets,
    /// Disable the roaming workaround, then rebind sockets
    Roam,
    /// Disconnect and enter `TemporaryShutdown`
    Pause,
    /// Re-apply the last settings and reconnect
    Resume,
}

/// Decide how to react to `status` while in `state`
pub fn plan_path_update(
    state: AdapterStateKind,
    status: PathStatus,
    platform: Platform,
) -> PathAction {
    match (state, status, platform) {
        (AdapterStateKind::Stopped, _, _) => PathAction::Ignore,
        (AdapterStateKind::Started, _, Platform::Desktop) => PathAction::BumpSockets,
        (AdapterStateKind::Started, PathStatus::Satisfied, Platform::Mobile) => PathAction::Roam,
        (AdapterStateKind::Started, PathStatus::Unsatisfied, Platform::Mobile) => PathAction::Pause,
        (AdapterStateKind::TemporaryShutdown, PathStatus::Unsatisfied, _) => PathAction::Ignore,
        (AdapterStateKind::TemporaryShutdown, PathStatus::Satisfied, _) => PathAction::Resume,
    }
}

/// Sink the OS monitor reports path updates into
///
/// Updates are tagged with the generation of the watch they belong to, so
/// updates from a cancelled watch are dropped by the adapter.
#[derive(Clone)]
pub struct PathSink {
    commands: WeakUnboundedSender<Command>,
    generation: u64,
}

impl PathSink {
    pub(crate) fn new(commands: WeakUnboundedSender<Command>, generation: u64) -> Self {
        Self {
            commands,
            generation,
        }
    }

    /// Report a path update; returns `false` if the adapter is gone
    pub fn update(&self, status: PathStatus) -> bool {
        let Some(tx) = self.commands.upgrade() else {
            return false;
        };
        tx.send(Command::PathUpdated {
            generation: self.generation,
            status,
        })
        .is_ok()
    }

    /// Generation of the watch this sink belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for PathSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathSink")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// An active path watch
pub trait PathWatch: Send + Sync {
    /// Stop reporting updates
    fn cancel(&mut self);
}

/// OS path monitor
pub trait PathMonitor: Send + Sync {
    /// Begin reporting path updates into `sink`
    fn start(&self, sink: PathSink) -> Box<dyn PathWatch>;
}

#[derive(Debug, Default)]
struct ManualInner {
    sink: Option<PathSink>,
    starts: usize,
    cancels: usize,
}

/// Path monitor driven by hand
///
/// Used by tests, and on hosts without an OS monitor where nothing ever
/// calls [`ManualPathMonitor::update`].
#[derive(Debug, Clone, Default)]
pub struct ManualPathMonitor {
    inner: Arc<Mutex<ManualInner>>,
}

impl ManualPathMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `status` to the active watch; `false` if there is none
    pub fn update(&self, status: PathStatus) -> bool {
        let sink = match self.inner.lock() {
            Ok(inner) => inner.sink.clone(),
            Err(_) => None,
        };
        sink.map_or(false, |sink| sink.update(status))
    }

    /// Sink of the active watch
    pub fn sink(&self) -> Option<PathSink> {
        self.inner.lock().ok().and_then(|inner| inner.sink.clone())
    }

    /// Whether a watch is active
    pub fn is_watching(&self) -> bool {
        self.sink().is_some()
    }

    /// Number of watches started
    pub fn start_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.starts).unwrap_or(0)
    }

    /// Number of watches cancelled
    pub fn cancel_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.cancels).unwrap_or(0)
    }
}

impl PathMonitor for ManualPathMonitor {
    fn start(&self, sink: PathSink) -> Box<dyn PathWatch> {
        let generation = sink.generation();
        if let Ok(mut inner) = self.inner.lock() {
            inner.starts += 1;
            inner.sink = Some(sink);
        }
        Box::new(ManualWatch {
            inner: self.inner.clone(),
            generation,
            cancelled: false,
        })
    }
}

struct ManualWatch {
    inner: Arc<Mutex<ManualInner>>,
    generation: u64,
    cancelled: bool,
}

impl PathWatch for ManualWatch {
    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        if let Ok(mut inner) = self.inner.lock() {
            inner.cancels += 1;
            if inner.sink.as_ref().map(PathSink::generation) == Some(self.generation) {
                inner.sink = None;
            }
        }
    }
}
