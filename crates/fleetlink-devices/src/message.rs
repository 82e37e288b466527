/*!
 * Command and response messages routed by the hub.
 *
 * Messages are plain data. Encoding them on a wire is the caller's concern,
 * so they only derive serde traits.
 */
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::DeviceCapability;

/// Process-local index of a registered device
pub type DeviceIndex = u32;

/// Correlation identifier echoed back in the response to a message
pub type MessageId = u32;

/// The kind of a device-targeted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Stop all output on the device
    Stop,
    /// Set a scalar actuator level
    Scalar,
    /// Move a linear actuator
    Linear,
    /// Spin a rotating actuator
    Rotate,
    /// Read a sensor
    SensorRead,
    /// Write raw bytes to an endpoint
    RawWrite,
    /// Read raw bytes from an endpoint
    RawRead,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Stop => "Stop",
            CommandKind::Scalar => "Scalar",
            CommandKind::Linear => "Linear",
            CommandKind::Rotate => "Rotate",
            CommandKind::SensorRead => "SensorRead",
            CommandKind::RawWrite => "RawWrite",
            CommandKind::RawRead => "RawRead",
        };
        f.write_str(name)
    }
}

/// The payload of a device-targeted command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceAction {
    /// Stop all output
    Stop,
    /// Set actuator `actuator` to `level` (0.0 to 1.0)
    Scalar {
        /// Actuator index on the device
        actuator: u32,
        /// Requested level
        level: f64,
    },
    /// Move actuator `actuator` to `position` over `duration_ms`
    Linear {
        /// Actuator index on the device
        actuator: u32,
        /// Movement duration in milliseconds
        duration_ms: u32,
        /// Target position (0.0 to 1.0)
        position: f64,
    },
    /// Spin actuator `actuator`
    Rotate {
        /// Actuator index on the device
        actuator: u32,
        /// Speed (0.0 to 1.0)
        speed: f64,
        /// Rotation direction
        clockwise: bool,
    },
    /// Read sensor `sensor`
    SensorRead {
        /// Sensor index on the device
        sensor: u32,
    },
    /// Write raw bytes
    RawWrite {
        /// Target endpoint name
        endpoint: String,
        /// Bytes to write
        data: Vec<u8>,
        /// Whether the write waits for an acknowledgement from the hardware
        write_with_response: bool,
    },
    /// Read raw bytes
    RawRead {
        /// Source endpoint name
        endpoint: String,
        /// Number of bytes expected, 0 for whatever is available
        expected_length: u32,
    },
}

impl DeviceAction {
    /// The command kind checked against a device's allowed set
    pub fn kind(&self) -> CommandKind {
        match self {
            DeviceAction::Stop => CommandKind::Stop,
            DeviceAction::Scalar { .. } => CommandKind::Scalar,
            DeviceAction::Linear { .. } => CommandKind::Linear,
            DeviceAction::Rotate { .. } => CommandKind::Rotate,
            DeviceAction::SensorRead { .. } => CommandKind::SensorRead,
            DeviceAction::RawWrite { .. } => CommandKind::RawWrite,
            DeviceAction::RawRead { .. } => CommandKind::RawRead,
        }
    }
}

/// A command addressed to a single device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    /// Correlation identifier
    pub id: MessageId,
    /// Target device, if the sender supplied one
    pub device_index: Option<DeviceIndex>,
    /// What to do
    pub action: DeviceAction,
}

impl DeviceCommand {
    /// Create a command addressed to `device_index`
    pub fn new(id: MessageId, device_index: DeviceIndex, action: DeviceAction) -> Self {
        Self {
            id,
            device_index: Some(device_index),
            action,
        }
    }

    /// Create a stop command addressed to `device_index`
    pub fn stop(id: MessageId, device_index: DeviceIndex) -> Self {
        Self::new(id, device_index, DeviceAction::Stop)
    }

    /// The command kind of the payload
    pub fn kind(&self) -> CommandKind {
        self.action.kind()
    }
}

/// A message submitted to the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandMessage {
    /// Start discovery on every backend
    StartScanning {
        /// Correlation identifier
        id: MessageId,
    },
    /// Stop discovery on every backend
    StopScanning {
        /// Correlation identifier
        id: MessageId,
    },
    /// Send a stop command to every device
    StopAllDevices {
        /// Correlation identifier
        id: MessageId,
    },
    /// List every registered device
    RequestDeviceList {
        /// Correlation identifier
        id: MessageId,
    },
    /// A command for one device
    Device(DeviceCommand),
}

impl CommandMessage {
    /// Correlation identifier of the message
    pub fn id(&self) -> MessageId {
        match self {
            CommandMessage::StartScanning { id }
            | CommandMessage::StopScanning { id }
            | CommandMessage::StopAllDevices { id }
            | CommandMessage::RequestDeviceList { id } => *id,
            CommandMessage::Device(command) => command.id,
        }
    }

    /// Whether the message addresses the whole fleet rather than one device
    pub fn is_fleet_level(&self) -> bool {
        !matches!(self, CommandMessage::Device(_))
    }
}

impl From<DeviceCommand> for CommandMessage {
    fn from(command: DeviceCommand) -> Self {
        CommandMessage::Device(command)
    }
}

/// One entry of a device list response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceListEntry {
    /// Registry index
    pub index: DeviceIndex,
    /// Display name
    pub name: String,
    /// Capability specifications
    pub capabilities: Vec<DeviceCapability>,
}

/// A response produced by the hub or by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseMessage {
    /// Acknowledgement
    Ok {
        /// Correlation identifier
        id: MessageId,
    },
    /// Snapshot of the registry
    DeviceList {
        /// Correlation identifier
        id: MessageId,
        /// Registered devices in index order
        devices: Vec<DeviceListEntry>,
    },
    /// Result of a sensor read
    SensorReading {
        /// Correlation identifier
        id: MessageId,
        /// Device that produced the reading
        device_index: DeviceIndex,
        /// Sensor index on the device
        sensor: u32,
        /// Sensor values
        data: Vec<i32>,
    },
    /// Result of a raw read
    RawReading {
        /// Correlation identifier
        id: MessageId,
        /// Device that produced the reading
        device_index: DeviceIndex,
        /// Source endpoint name
        endpoint: String,
        /// Bytes read
        data: Vec<u8>,
    },
}

impl ResponseMessage {
    /// Create an acknowledgement for `id`
    pub fn ok(id: MessageId) -> Self {
        ResponseMessage::Ok { id }
    }

    /// Correlation identifier of the response
    pub fn id(&self) -> MessageId {
        match self {
            ResponseMessage::Ok { id }
            | ResponseMessage::DeviceList { id, .. }
            | ResponseMessage::SensorReading { id, .. }
            | ResponseMessage::RawReading { id, .. } => *id,
        }
    }
}
