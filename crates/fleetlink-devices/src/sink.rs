/*!
 * Outbound notifications from the hub to its owner.
 */
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use fleetlink_core::event::Signal;

use crate::device::DeviceCapability;
use crate::message::DeviceIndex;

/// A notification emitted by the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HubEvent {
    /// A device was admitted
    DeviceAdded {
        /// Registry index
        index: DeviceIndex,
        /// Display name
        name: String,
        /// Capability specifications
        capabilities: Vec<DeviceCapability>,
    },
    /// A device was evicted
    DeviceRemoved {
        /// Registry index the device held
        index: DeviceIndex,
    },
    /// Every backend has stopped discovering
    ScanningFinished,
}

/// Receives hub notifications on behalf of the caller.
///
/// `emit` may run while the hub holds internal locks and must not call back
/// into the hub synchronously.
pub trait EventSink: Send + Sync {
    /// Deliver one notification
    fn emit(&self, event: HubEvent);
}

impl<F> EventSink for F
where
    F: Fn(HubEvent) + Send + Sync,
{
    fn emit(&self, event: HubEvent) {
        self(event)
    }
}

/// An [`EventSink`] that fans notifications out over a broadcast channel
#[derive(Debug, Clone, Default)]
pub struct BroadcastSink {
    signal: Signal<HubEvent>,
}

impl BroadcastSink {
    /// Create a new broadcast sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new broadcast sink buffering up to `capacity` notifications per receiver
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            signal: Signal::with_capacity(capacity),
        }
    }

    /// Receive every notification emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.signal.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: HubEvent) {
        self.signal.emit(event);
    }
}
