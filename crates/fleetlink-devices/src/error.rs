/*!
 * Error types for hub operations.
 */
use thiserror::Error;

use crate::device::DeviceError;
use crate::message::{CommandKind, DeviceIndex, MessageId};

/// Error type for hub operations
#[derive(Error, Debug)]
pub enum HubError {
    /// Scanning was requested with no discovery backends registered
    #[error("No discovery backends available")]
    NoBackendsAvailable,

    /// A backend failed to start discovery; backends already started were stopped again
    #[error("Discovery backend {backend} failed to start: {source}")]
    BackendStartFailure {
        /// Name of the failing backend
        backend: String,
        /// The backend's error
        #[source]
        source: DeviceError,
    },

    /// No live device at the requested index
    #[error("Unknown device index {0}")]
    UnknownDevice(DeviceIndex),

    /// The device does not accept the command kind
    #[error("Device {index} does not support {kind} commands")]
    UnsupportedCommand {
        /// Target device index
        index: DeviceIndex,
        /// Rejected command kind
        kind: CommandKind,
    },

    /// The message is neither fleet-level nor addressed to a device
    #[error("Message type unhandled: {0}")]
    MessageTypeUnhandled(String),

    /// Device error
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

/// A [`HubError`] tagged with the correlation id of the message that caused it
#[derive(Error, Debug)]
#[error("Message {id} failed: {error}")]
pub struct RouteError {
    /// Correlation identifier of the failed message
    pub id: MessageId,
    /// What went wrong
    #[source]
    pub error: HubError,
}

impl RouteError {
    /// Tag `error` with `id`
    pub fn new(id: MessageId, error: impl Into<HubError>) -> Self {
        Self {
            id,
            error: error.into(),
        }
    }
}
