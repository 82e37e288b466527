/*!
 * Device registry for FleetLink.
 *
 * Maps process-local [`DeviceIndex`] values to admitted devices. Indices are
 * handed out from a counter that only moves forward, so an index is never
 * reused after its device is evicted.
 */
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use fleetlink_core::config::DevicesConfig;

use crate::device::{same_device, Device, DeviceError, Result};
use crate::message::{DeviceIndex, DeviceListEntry};

/// Outcome of admitting a device into the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The device was stored under a freshly allocated index
    Admitted(DeviceIndex),
    /// A live device with the same identity token already holds this index
    Duplicate(DeviceIndex),
    /// The identity token is excluded by configuration
    Denied,
}

impl Admission {
    /// The newly allocated index, if the device was admitted
    pub fn admitted(self) -> Option<DeviceIndex> {
        match self {
            Admission::Admitted(index) => Some(index),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    devices: BTreeMap<DeviceIndex, Arc<dyn Device>>,
    next_index: DeviceIndex,
}

/// Device registry
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    state: RwLock<RegistryState>,
    filter: DevicesConfig,
}

impl DeviceRegistry {
    /// Create a new device registry that admits every identity
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new device registry filtering identities through `config`
    pub fn with_config(config: DevicesConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            filter: config,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>> {
        self.state.read().map_err(|_| {
            DeviceError::Other("Failed to acquire read lock on device registry".to_string())
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>> {
        self.state.write().map_err(|_| {
            DeviceError::Other("Failed to acquire write lock on device registry".to_string())
        })
    }

    /// Admit a device.
    ///
    /// The duplicate check compares identity tokens and happens under the same
    /// lock as the insert, so concurrent re-discoveries of one device admit it once.
    pub(crate) fn admit(&self, device: Arc<dyn Device>) -> Result<Admission> {
        let identifier = device.identifier();
        if !self.filter.permits(identifier.as_str()) {
            info!("Device {} ({}) denied by configuration", device.name(), identifier);
            return Ok(Admission::Denied);
        }

        let mut state = self.write()?;

        if let Some((index, _)) = state
            .devices
            .iter()
            .find(|(_, existing)| existing.identifier() == identifier)
        {
            debug!("Device {} already registered at index {}", identifier, index);
            return Ok(Admission::Duplicate(*index));
        }

        let index = state.next_index;
        state.next_index = index.checked_add(1).ok_or_else(|| {
            DeviceError::Other("Device index space exhausted".to_string())
        })?;
        info!("Admitted device {} ({}) at index {}", device.name(), identifier, index);
        state.devices.insert(index, device);

        Ok(Admission::Admitted(index))
    }

    /// Evict the exact device instance that was admitted.
    ///
    /// Returns the freed index, or `None` if this instance is not registered.
    /// Another instance that merely shares the identity token is left alone.
    pub(crate) fn evict(&self, device: &Arc<dyn Device>) -> Result<Option<DeviceIndex>> {
        let mut state = self.write()?;

        let index = state
            .devices
            .iter()
            .find(|(_, existing)| same_device(existing, device))
            .map(|(index, _)| *index);

        match index {
            Some(index) => {
                state.devices.remove(&index);
                info!("Evicted device {} from index {}", device.identifier(), index);
            }
            None => {
                debug!("Device {} not registered, nothing to evict", device.identifier());
            }
        }

        Ok(index)
    }

    /// Get a device by index
    pub fn get(&self, index: DeviceIndex) -> Result<Option<Arc<dyn Device>>> {
        Ok(self.read()?.devices.get(&index).cloned())
    }

    /// List every registered device in index order
    pub fn list(&self) -> Result<Vec<DeviceListEntry>> {
        let state = self.read()?;
        Ok(state
            .devices
            .iter()
            .map(|(index, device)| DeviceListEntry {
                index: *index,
                name: device.name().to_string(),
                capabilities: device.capabilities().to_vec(),
            })
            .collect())
    }

    /// Snapshot of every registered device in index order
    pub fn devices(&self) -> Result<Vec<(DeviceIndex, Arc<dyn Device>)>> {
        let state = self.read()?;
        Ok(state
            .devices
            .iter()
            .map(|(index, device)| (*index, device.clone()))
            .collect())
    }

    /// Count registered devices
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.devices.len())
    }

    /// Check whether the registry is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.devices.is_empty())
    }

    /// The index the next admitted device will receive
    pub fn next_index(&self) -> Result<DeviceIndex> {
        Ok(self.read()?.next_index)
    }
}
