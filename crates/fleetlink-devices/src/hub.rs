/*!
 * The device hub.
 *
 * [`DeviceHub`] owns the registry, the scan coordinator and the router, and
 * wires backend and device signals into them. Every signal subscription is an
 * explicit [`Subscription`] created when its producer is attached and torn
 * down when the producer is detached.
 */
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use fleetlink_core::{
    config::DevicesConfig,
    event::{subscribe, Subscription},
    utils::spawn_and_log,
};

use crate::device::{Device, DeviceError};
use crate::discovery::{DiscoveryBackend, DiscoveryEvent, ScanCoordinator};
use crate::error::{Result, RouteError};
use crate::message::{CommandMessage, DeviceIndex, ResponseMessage};
use crate::registry::{Admission, DeviceRegistry};
use crate::router::MessageRouter;
use crate::sink::{EventSink, HubEvent};

struct HubInner {
    registry: Arc<DeviceRegistry>,
    scanner: Arc<ScanCoordinator>,
    router: MessageRouter,
    sink: Box<dyn EventSink>,
    config: DevicesConfig,
    backend_subscriptions: Mutex<Vec<Subscription>>,
    device_subscriptions: Mutex<HashMap<DeviceIndex, Subscription>>,
}

/// Device command-routing hub
///
/// Cloning is cheap and every clone drives the same hub. Attaching backends and
/// admitting devices spawns listener tasks, so those calls need a Tokio runtime.
#[derive(Clone)]
pub struct DeviceHub {
    inner: Arc<HubInner>,
}

impl DeviceHub {
    /// Create a hub that admits every identity
    pub fn new(sink: impl EventSink + 'static) -> Self {
        Self::with_config(DevicesConfig::default(), sink)
    }

    /// Create a hub configured by the `[devices]` configuration section
    pub fn with_config(config: DevicesConfig, sink: impl EventSink + 'static) -> Self {
        let registry = Arc::new(DeviceRegistry::with_config(config.clone()));
        let scanner = Arc::new(ScanCoordinator::new());
        let router = MessageRouter::new(registry.clone(), scanner.clone());

        Self {
            inner: Arc::new(HubInner {
                registry,
                scanner,
                router,
                sink: Box::new(sink),
                config,
                backend_subscriptions: Mutex::new(Vec::new()),
                device_subscriptions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a discovery backend and start listening to its notifications
    pub fn register_backend(&self, backend: Arc<dyn DiscoveryBackend>) -> Result<()> {
        let events = backend.events();
        self.inner.scanner.register_backend(backend.clone())?;

        let hub = Arc::downgrade(&self.inner);
        let subscription = subscribe(format!("backend:{}", backend.name()), events, move |event| {
            if let Some(hub) = hub.upgrade() {
                hub.on_discovery_event(event);
            }
        });
        self.inner.backend_subscriptions()?.push(subscription);

        Ok(())
    }

    /// Remove every discovery backend and stop listening to them
    pub fn clear_backends(&self) -> Result<()> {
        self.inner.scanner.clear_backends()?;
        let subscriptions: Vec<_> = self.inner.backend_subscriptions()?.drain(..).collect();
        debug!("Cancelling {} backend subscriptions", subscriptions.len());
        subscriptions.into_iter().for_each(Subscription::cancel);
        Ok(())
    }

    /// Route a command message. See [`MessageRouter::route`].
    pub async fn route(
        &self,
        message: CommandMessage,
    ) -> std::result::Result<ResponseMessage, RouteError> {
        self.inner.router.route(message).await
    }

    /// Disconnect every live device and wait until all have answered.
    ///
    /// Disconnect failures are logged; every device is evicted either way.
    pub async fn shutdown(&self) -> Result<()> {
        if self.inner.config.stop_scanning_on_shutdown {
            self.inner.scanner.stop_all().await?;
        }

        let devices = self.inner.registry.devices()?;
        info!("Shutting down hub, disconnecting {} devices", devices.len());

        let outcomes = join_all(
            devices
                .iter()
                .map(|(index, device)| async move { (*index, device.disconnect().await) }),
        )
        .await;

        for (index, outcome) in outcomes {
            if let Err(e) = outcome {
                warn!("Device {} failed to disconnect: {}", index, e);
            }
        }

        for (_, device) in &devices {
            self.inner.device_removed(device)?;
        }

        Ok(())
    }

    /// Handle a device reported by a backend.
    ///
    /// Returns the new index, or `None` for a re-discovery or a denied identity.
    pub fn handle_device_discovered(
        &self,
        device: Arc<dyn Device>,
    ) -> Result<Option<DeviceIndex>> {
        self.inner.device_discovered(device)
    }

    /// Handle a device that removed itself. No-op if it is not registered.
    pub fn handle_device_removed(&self, device: &Arc<dyn Device>) -> Result<Option<DeviceIndex>> {
        self.inner.device_removed(device)
    }

    /// Handle a backend reporting discovery finished.
    ///
    /// Returns whether a scan-finished notification was emitted.
    pub async fn handle_backend_finished(&self) -> Result<bool> {
        self.inner.backend_finished().await
    }

    /// Whether any backend is discovering
    pub fn is_scanning(&self) -> Result<bool> {
        self.inner.scanner.is_scanning()
    }

    /// Number of live devices
    pub fn device_count(&self) -> Result<usize> {
        Ok(self.inner.registry.len()?)
    }

    /// Look up a live device
    pub fn device(&self, index: DeviceIndex) -> Result<Option<Arc<dyn Device>>> {
        Ok(self.inner.registry.get(index)?)
    }
}

impl fmt::Debug for DeviceHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHub")
            .field("registry", &self.inner.registry)
            .field("scanner", &self.inner.scanner)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl HubInner {
    fn backend_subscriptions(&self) -> Result<MutexGuard<'_, Vec<Subscription>>> {
        Ok(self.backend_subscriptions.lock().map_err(|_| {
            DeviceError::Other("Failed to acquire lock on backend subscriptions".to_string())
        })?)
    }

    fn device_subscriptions(&self) -> Result<MutexGuard<'_, HashMap<DeviceIndex, Subscription>>> {
        Ok(self.device_subscriptions.lock().map_err(|_| {
            DeviceError::Other("Failed to acquire lock on device subscriptions".to_string())
        })?)
    }

    fn on_discovery_event(self: &Arc<Self>, event: DiscoveryEvent) {
        match event {
            DiscoveryEvent::DeviceDiscovered(device) => {
                if let Err(e) = self.device_discovered(device) {
                    error!("Failed to handle discovered device: {}", e);
                }
            }
            DiscoveryEvent::DiscoveryFinished => {
                // May have to wait for a scan start in progress.
                let hub = self.clone();
                spawn_and_log("backend finished", async move { hub.backend_finished().await });
            }
        }
    }

    fn device_discovered(self: &Arc<Self>, device: Arc<dyn Device>) -> Result<Option<DeviceIndex>> {
        // Taken before admission so a removal racing the admission is still seen.
        let removal = device.removal_signal();

        let index = match self.registry.admit(device.clone())? {
            Admission::Admitted(index) => index,
            Admission::Duplicate(_) | Admission::Denied => return Ok(None),
        };

        // Held until DeviceAdded is out, so a concurrent removal is reported after it.
        let mut subscriptions = self.device_subscriptions()?;

        let hub: Weak<Self> = Arc::downgrade(self);
        let subject = device.clone();
        let subscription = subscribe(format!("device:{}", index), removal, move |()| {
            if let Some(hub) = hub.upgrade() {
                if let Err(e) = hub.device_removed(&subject) {
                    error!("Failed to handle removal of device {}: {}", subject.identifier(), e);
                }
            }
        });
        subscriptions.insert(index, subscription);

        self.sink.emit(HubEvent::DeviceAdded {
            index,
            name: device.name().to_string(),
            capabilities: device.capabilities().to_vec(),
        });

        Ok(Some(index))
    }

    fn device_removed(&self, device: &Arc<dyn Device>) -> Result<Option<DeviceIndex>> {
        let Some(index) = self.registry.evict(device)? else {
            return Ok(None);
        };

        let subscription = self.device_subscriptions()?.remove(&index);
        if let Some(subscription) = subscription {
            subscription.cancel();
        }

        self.sink.emit(HubEvent::DeviceRemoved { index });
        Ok(Some(index))
    }

    async fn backend_finished(&self) -> Result<bool> {
        let finished = self.scanner.on_backend_finished().await?;
        if finished {
            self.sink.emit(HubEvent::ScanningFinished);
        }
        Ok(finished)
    }
}
