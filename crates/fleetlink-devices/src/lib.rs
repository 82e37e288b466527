/*!
 * FleetLink Devices
 *
 * This crate owns the registry of connected devices, coordinates discovery
 * across transport backends and routes command messages to the right device.
 */

#![warn(missing_docs)]

// Re-export core types
pub use fleetlink_core::prelude;

pub mod device;
pub mod discovery;
pub mod error;
pub mod hub;
pub mod message;
pub mod registry;
pub mod router;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use device::{Device, DeviceCapability, DeviceError};
pub use discovery::{DiscoveryBackend, DiscoveryEvent, ScanCoordinator};
pub use error::{HubError, RouteError};
pub use hub::DeviceHub;
pub use message::{
    CommandKind, CommandMessage, DeviceAction, DeviceCommand, DeviceIndex, DeviceListEntry,
    MessageId, ResponseMessage,
};
pub use registry::{Admission, DeviceRegistry};
pub use router::MessageRouter;
pub use sink::{BroadcastSink, EventSink, HubEvent};

/// FleetLink devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging and report the crate version
pub fn init() -> Result<(), fleetlink_core::error::Error> {
    fleetlink_core::init()?;
    tracing::info!("FleetLink Devices {} initialized", VERSION);
    Ok(())
}
