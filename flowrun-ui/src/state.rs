//! Shared application state for the UI server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use flowrun::io::config::MonitorConfig;
use flowrun::monitor::FlowMonitor;
use tokio::sync::{Mutex, broadcast};
use tokio::task::AbortHandle;
use tracing::debug;

/// Events broadcast to SSE clients when a run changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    RunStarted { run_id: String },
    /// New frames landed; `frames` is the ledger length afterwards.
    FramesAppended { run_id: String, frames: usize },
    RunCompleted { run_id: String },
    RunReset { run_id: String },
    AllReset,
}

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MonitorConfig>,
    pub monitor: Arc<Mutex<FlowMonitor>>,
    /// Broadcast sender for run change events.
    pub event_tx: Arc<broadcast::Sender<ChangeEvent>>,
    /// Ingestion socket task per run.
    sockets: Arc<StdMutex<HashMap<String, AbortHandle>>>,
}

impl AppState {
    pub fn new(config: MonitorConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.server.broadcast_capacity);
        let monitor = FlowMonitor::new(config.reducer.options());
        Self {
            config: Arc::new(config),
            monitor: Arc::new(Mutex::new(monitor)),
            event_tx: Arc::new(event_tx),
            sockets: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Send to SSE subscribers. No subscribers is not an error.
    pub fn notify(&self, event: ChangeEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Track the socket task for `run_id`, aborting any previous one.
    pub fn register_socket(&self, run_id: &str, handle: AbortHandle) {
        let previous = self
            .sockets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(run_id.to_string(), handle);
        if let Some(previous) = previous {
            debug!(run_id, "replacing stale socket");
            previous.abort();
        }
    }

    /// Abort the socket task for `run_id`. Returns whether one was tracked.
    pub fn close_socket(&self, run_id: &str) -> bool {
        let handle = self
            .sockets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(run_id);
        match handle {
            Some(handle) => {
                handle.abort();
                debug!(run_id, "socket aborted");
                true
            }
            None => false,
        }
    }

    /// Abort every tracked socket task.
    pub fn close_all_sockets(&self) {
        let handles: Vec<AbortHandle> = self
            .sockets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        for handle in handles {
            handle.abort();
        }
    }

    /// Forget `run_id`'s socket once its task ended on its own.
    ///
    /// Only removes the entry if it still belongs to `task`; a newer socket
    /// for the same run is left alone.
    pub fn release_socket(&self, run_id: &str, task: tokio::task::Id) {
        let mut sockets = self
            .sockets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if sockets.get(run_id).is_some_and(|h| h.id() == task) {
            sockets.remove(run_id);
        }
    }

    /// Whether `task` is still the registered socket for `run_id`.
    pub fn owns_socket(&self, run_id: &str, task: tokio::task::Id) -> bool {
        self.sockets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(run_id)
            .is_some_and(|h| h.id() == task)
    }

    #[cfg(test)]
    pub fn has_socket(&self, run_id: &str) -> bool {
        self.sockets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(run_id)
    }
}
