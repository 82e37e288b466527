/*!
 * Device discovery for FleetLink.
 *
 * Each transport contributes a [`DiscoveryBackend`]. The [`ScanCoordinator`]
 * drives every registered backend as one logical scan.
 */
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::device::{Device, DeviceError};
use crate::error::{HubError, Result};

/// A notification pushed by a discovery backend
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A device was found, connected and initialized
    DeviceDiscovered(Arc<dyn Device>),
    /// The backend stopped discovering on its own or after a stop request
    DiscoveryFinished,
}

/// Discovery backend trait
///
/// One implementation per transport (short-range radio, serial, network and so on).
#[async_trait]
pub trait DiscoveryBackend: Send + Sync + Debug {
    /// Backend name, used in logs and errors
    fn name(&self) -> &str;

    /// Start discovering devices
    async fn start_discovery(&self) -> std::result::Result<(), DeviceError>;

    /// Stop discovering devices
    async fn stop_discovery(&self) -> std::result::Result<(), DeviceError>;

    /// Whether the backend is currently discovering
    fn is_discovering(&self) -> bool;

    /// Receiver for the backend's discovery notifications
    fn events(&self) -> broadcast::Receiver<DiscoveryEvent>;
}

/// Scan coordinator
///
/// Starts and stops discovery across every registered backend. Whether the
/// fleet is scanning is always derived from the backends themselves.
#[derive(Debug, Default)]
pub struct ScanCoordinator {
    /// The registered backends
    backends: RwLock<Vec<Arc<dyn DiscoveryBackend>>>,
    /// Serializes `start_all` calls and finish reports against them
    start_lock: Mutex<()>,
    /// Armed by `start_all`, consumed by the finish notification
    finish_pending: AtomicBool,
}

impl ScanCoordinator {
    /// Create a new scan coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a discovery backend
    pub fn register_backend(&self, backend: Arc<dyn DiscoveryBackend>) -> Result<()> {
        let mut backends = self.backends.write().map_err(|_| {
            DeviceError::Other("Failed to acquire write lock on discovery backends".to_string())
        })?;
        info!("Registered discovery backend {}", backend.name());
        backends.push(backend);
        Ok(())
    }

    /// Remove every backend
    pub fn clear_backends(&self) -> Result<()> {
        let mut backends = self.backends.write().map_err(|_| {
            DeviceError::Other("Failed to acquire write lock on discovery backends".to_string())
        })?;
        info!("Cleared {} discovery backends", backends.len());
        backends.clear();
        Ok(())
    }

    /// Snapshot of the registered backends
    pub fn backends(&self) -> Result<Vec<Arc<dyn DiscoveryBackend>>> {
        let backends = self.backends.read().map_err(|_| {
            DeviceError::Other("Failed to acquire read lock on discovery backends".to_string())
        })?;
        Ok(backends.clone())
    }

    /// Number of registered backends
    pub fn backend_count(&self) -> Result<usize> {
        Ok(self.backends()?.len())
    }

    /// Whether any backend is discovering
    pub fn is_scanning(&self) -> Result<bool> {
        Ok(self.backends()?.iter().any(|b| b.is_discovering()))
    }

    /// Start discovery on every backend that is not already discovering.
    ///
    /// Backends are started one at a time in registration order. If one fails,
    /// every backend currently discovering is stopped again and the failure is
    /// returned. A scan that was already running before the failed call still
    /// gets its finish notification once the rollback has stopped it.
    pub async fn start_all(&self) -> Result<()> {
        let _guard = self.start_lock.lock().await;

        let backends = self.backends()?;
        if backends.is_empty() {
            warn!("Scan requested with no discovery backends registered");
            return Err(HubError::NoBackendsAvailable);
        }

        let already_pending = self.finish_pending.swap(true, Ordering::SeqCst);

        for backend in &backends {
            if backend.is_discovering() {
                debug!("Backend {} already discovering", backend.name());
                continue;
            }

            debug!("Starting discovery on backend {}", backend.name());
            if let Err(e) = backend.start_discovery().await {
                error!("Backend {} failed to start discovery: {}", backend.name(), e);
                self.finish_pending.store(already_pending, Ordering::SeqCst);
                stop_discovering(&backends).await;
                return Err(HubError::BackendStartFailure {
                    backend: backend.name().to_string(),
                    source: e,
                });
            }
        }

        info!("Discovery started on {} backends", backends.len());
        Ok(())
    }

    /// Stop discovery on every backend that is discovering.
    ///
    /// A backend that fails to stop is logged and skipped.
    pub async fn stop_all(&self) -> Result<()> {
        let backends = self.backends()?;
        stop_discovering(&backends).await;
        Ok(())
    }

    /// Record that a backend reported discovery finished.
    ///
    /// Returns `true` exactly once per scan: when the first finish report
    /// arrives after every backend has gone idle. A report that races an
    /// in-progress `start_all` waits for it, so backends still queued to start
    /// are counted.
    pub async fn on_backend_finished(&self) -> Result<bool> {
        let _guard = self.start_lock.lock().await;

        if self.is_scanning()? {
            debug!("Backend finished, others still discovering");
            return Ok(false);
        }

        let notify = self.finish_pending.swap(false, Ordering::SeqCst);
        if notify {
            info!("Discovery finished on all backends");
        }
        Ok(notify)
    }
}

async fn stop_discovering(backends: &[Arc<dyn DiscoveryBackend>]) {
    for backend in backends.iter().filter(|b| b.is_discovering()) {
        debug!("Stopping discovery on backend {}", backend.name());
        if let Err(e) = backend.stop_discovery().await {
            warn!("Backend {} failed to stop discovery: {}", backend.name(), e);
        }
    }
}
