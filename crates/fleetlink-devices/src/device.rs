/*!
 * Device capability contract.
 *
 * A [`Device`] is a connected, initialized hardware endpoint handed to the hub
 * by a discovery backend. The hub never constructs devices; it only admits,
 * routes to and disconnects them.
 */
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use fleetlink_core::{error::Error as CoreError, types::Id};

use crate::message::{CommandKind, DeviceCommand, ResponseMessage};

/// Error type for device and backend operations
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device is not connected
    #[error("Device not connected")]
    NotConnected,

    /// The device is in an invalid state for the operation
    #[error("Invalid device state: {0}")]
    InvalidState(String),

    /// Communication error with the device
    #[error("Communication error: {0}")]
    CommunicationError(String),

    /// Protocol-specific error
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),

    /// Core error
    #[error("Core error: {0}")]
    CoreError(#[from] CoreError),
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// A capability specification advertised by a device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceCapability {
    /// The command kind the capability backs
    pub kind: CommandKind,
    /// Number of features (actuators, sensors or endpoints) of this kind
    pub feature_count: u32,
    /// Number of discrete steps each feature resolves, if it is stepped
    pub step_count: Option<u32>,
    /// Free-form descriptor, such as an actuator or sensor type
    pub descriptor: Option<String>,
}

impl DeviceCapability {
    /// Create a capability with `feature_count` features of `kind`
    pub fn new(kind: CommandKind, feature_count: u32) -> Self {
        Self {
            kind,
            feature_count,
            step_count: None,
            descriptor: None,
        }
    }

    /// Set the step count
    pub fn with_step_count(mut self, steps: u32) -> Self {
        self.step_count = Some(steps);
        self
    }

    /// Set the descriptor
    pub fn with_descriptor<S: Into<String>>(mut self, descriptor: S) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }
}

/// The device capability trait
///
/// Implemented by per-model drivers outside this crate.
#[async_trait]
pub trait Device: Send + Sync + Debug {
    /// Backend-assigned identity token
    fn identifier(&self) -> &Id;

    /// Display name
    fn name(&self) -> &str;

    /// Command kinds the device accepts
    fn allowed_messages(&self) -> &BTreeSet<CommandKind>;

    /// Capability specifications
    fn capabilities(&self) -> &[DeviceCapability];

    /// Check whether the device accepts `kind`
    fn supports(&self, kind: CommandKind) -> bool {
        self.allowed_messages().contains(&kind)
    }

    /// Handle a command already validated against [`Device::allowed_messages`]
    async fn handle_command(&self, command: DeviceCommand) -> Result<ResponseMessage>;

    /// Disconnect from the hardware
    async fn disconnect(&self) -> Result<()>;

    /// Receiver for the device's self-initiated removal signal.
    ///
    /// The device emits once when it goes away on its own (link loss, power off).
    fn removal_signal(&self) -> broadcast::Receiver<()>;
}

/// Whether two handles point at the same device instance.
///
/// Compares data pointers only; identity tokens are not consulted.
pub fn same_device(a: &Arc<dyn Device>, b: &Arc<dyn Device>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
