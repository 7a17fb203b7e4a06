//! Runtime construction and lifecycle.
//!
//! [`Runtime::spawn`] builds the channel set exactly once, moves the backend
//! onto a dedicated worker thread running the dispatch loop, and hands out
//! proxies that share the injected channels. There is no process-global
//! state; independent runtimes are fully isolated.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};

use crate::backend::Backend;
use crate::protocol::{MethodRequest, NamespacedRequest, PrimitiveRequest};
use crate::proxy::{CallProxy, Timeout};
use crate::trace::{debug, info};
use crate::worker::{Worker, WorkerConfig};

/// The three request channels, one per call category. Shared by every proxy
/// of one runtime; the single worker owns the receiving ends.
pub(crate) struct ChannelSet {
    pub primitive: Sender<PrimitiveRequest>,
    pub namespaced: Sender<NamespacedRequest>,
    pub method: Sender<MethodRequest>,
}

/// Configuration for a runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Initial cooperative yield interval of the dispatch loop.
    pub min_pause: Duration,
    /// Cap on the yield interval while every channel is idle.
    pub max_pause: Duration,
    /// Drain rounds per yield (one message per category per round).
    pub drain_rounds: usize,
    /// Default wait timeout for proxy calls that expect a reply.
    pub call_timeout: Timeout,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            min_pause: Duration::from_millis(200),
            max_pause: Duration::from_secs(1),
            drain_rounds: 10,
            call_timeout: Timeout::Duration(Duration::from_secs(30)),
        }
    }
}

/// Error spawning the runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Handle to a running worker.
///
/// Dropping the handle signals shutdown but does not wait for the worker to
/// exit. Use [`Runtime::shutdown`] for graceful shutdown with join.
pub struct Runtime {
    channels: Arc<ChannelSet>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    call_timeout: Timeout,
}

impl Runtime {
    /// Spawns the worker thread around `backend`.
    ///
    /// The registry and the worker are created exactly once here and live
    /// until the dispatch loop exits.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Spawn`] if the thread cannot be created.
    pub fn spawn<B: Backend>(backend: B, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        info!(
            min_pause_ms = config.min_pause.as_millis() as u64,
            max_pause_ms = config.max_pause.as_millis() as u64,
            drain_rounds = config.drain_rounds,
            "runtime starting"
        );

        let (primitive_tx, primitive_rx) = unbounded();
        let (namespaced_tx, namespaced_rx) = unbounded();
        let (method_tx, method_rx) = unbounded();

        let channels = Arc::new(ChannelSet {
            primitive: primitive_tx,
            namespaced: namespaced_tx,
            method: method_tx,
        });

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_config = WorkerConfig {
            min_pause: config.min_pause,
            max_pause: config.max_pause,
            drain_rounds: config.drain_rounds,
        };

        debug!("spawning worker thread");
        let flag = Arc::clone(&shutdown);
        let worker = std::thread::Builder::new()
            .name("courier-worker".into())
            .spawn(move || {
                info!("worker thread started");
                let mut worker =
                    Worker::new(backend, primitive_rx, namespaced_rx, method_rx, flag, worker_config);
                worker.run();
                info!("worker thread exiting");
            })?;

        Ok(Self {
            channels,
            shutdown,
            worker: Some(worker),
            call_timeout: config.call_timeout,
        })
    }

    /// Creates a proxy sharing this runtime's channel set.
    #[must_use]
    pub fn proxy(&self) -> CallProxy {
        CallProxy::new(Arc::clone(&self.channels), self.call_timeout)
    }

    /// Initiates graceful shutdown and waits for the worker to exit.
    ///
    /// Requests already enqueued when the flag is observed are not drained;
    /// their callers receive [`ProxyError::Disconnected`](crate::ProxyError).
    pub fn shutdown(mut self) {
        info!("runtime shutdown initiated");
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            debug!("waiting for worker thread to exit");
            let _ = handle.join();
        }
        info!("runtime shutdown complete");
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Best-effort signal; shutdown() joins explicitly.
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
