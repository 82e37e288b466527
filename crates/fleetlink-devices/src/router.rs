/*!
 * Command routing.
 *
 * The [`MessageRouter`] is the single entry point for command messages. Fleet
 * level messages are handled here; everything else must name a live device
 * that accepts the command kind before it is forwarded.
 */
use std::sync::Arc;

use tracing::{debug, warn, Instrument};

use fleetlink_core::{logging::operation_span, utils::spawn_and_log};

use crate::discovery::ScanCoordinator;
use crate::error::{HubError, Result, RouteError};
use crate::message::{CommandKind, CommandMessage, DeviceCommand, MessageId, ResponseMessage};
use crate::registry::DeviceRegistry;

/// Message router
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<DeviceRegistry>,
    scanner: Arc<ScanCoordinator>,
}

impl MessageRouter {
    /// Create a router over a registry and a scan coordinator
    pub fn new(registry: Arc<DeviceRegistry>, scanner: Arc<ScanCoordinator>) -> Self {
        Self { registry, scanner }
    }

    /// Route one message and return its response.
    ///
    /// Failures carry the message's correlation id.
    pub async fn route(
        &self,
        message: CommandMessage,
    ) -> std::result::Result<ResponseMessage, RouteError> {
        let id = message.id();
        let result = self
            .dispatch(message)
            .instrument(operation_span("route", "message_router"))
            .await;

        match &result {
            Ok(_) => debug!(id, "Message routed"),
            Err(e) => warn!(id, "Message failed: {}", e),
        }

        result.map_err(|e| RouteError::new(id, e))
    }

    async fn dispatch(&self, message: CommandMessage) -> Result<ResponseMessage> {
        match message {
            CommandMessage::StartScanning { id } => {
                self.scanner.start_all().await?;
                Ok(ResponseMessage::ok(id))
            }
            CommandMessage::StopScanning { id } => {
                self.scanner.stop_all().await?;
                Ok(ResponseMessage::ok(id))
            }
            CommandMessage::StopAllDevices { id } => {
                self.stop_all_devices(id)?;
                Ok(ResponseMessage::ok(id))
            }
            CommandMessage::RequestDeviceList { id } => Ok(ResponseMessage::DeviceList {
                id,
                devices: self.registry.list()?,
            }),
            CommandMessage::Device(command) => self.route_device(command).await,
        }
    }

    async fn route_device(&self, command: DeviceCommand) -> Result<ResponseMessage> {
        let kind = command.kind();
        let index = command.device_index.ok_or_else(|| {
            HubError::MessageTypeUnhandled(format!("{} command without a device index", kind))
        })?;

        let device = self
            .registry
            .get(index)?
            .ok_or(HubError::UnknownDevice(index))?;

        if !device.supports(kind) {
            return Err(HubError::UnsupportedCommand { index, kind });
        }

        debug!("Forwarding {} command to device {}", kind, index);
        Ok(device.handle_command(command).await?)
    }

    /// Send a stop command to every device that accepts one, without waiting
    /// for the outcome.
    ///
    /// Individual failures are logged and never reach the caller.
    fn stop_all_devices(&self, id: MessageId) -> Result<()> {
        let devices = self.registry.devices()?;
        debug!("Stopping {} devices", devices.len());

        for (index, device) in devices {
            if !device.supports(CommandKind::Stop) {
                debug!("Device {} does not accept stop commands, skipping", index);
                continue;
            }
            spawn_and_log(&format!("stop device {}", index), async move {
                device.handle_command(DeviceCommand::stop(id, index)).await
            });
        }

        Ok(())
    }
}
