use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::DepthStreamError;
use crate::sdk::DeviceSdk;
use crate::session::Session;
use crate::types::{DeviceDescriptor, StreamConfig};
use crate::Result;

/// Devices claimed by a started session, keyed by device id.
///
/// Shared by every session created through one registry; `start`
/// inserts, `stop` removes. Whichever of two racing starts inserts
/// first wins the device.
pub(crate) type DeviceClaims = Arc<Mutex<HashSet<u32>>>;

/// Enumerates attached devices and creates sessions bound to them.
pub struct DeviceRegistry<S: DeviceSdk> {
    sdk: Arc<S>,
    claims: DeviceClaims,
}

impl<S: DeviceSdk> DeviceRegistry<S> {
    pub fn new(sdk: S) -> Self {
        DeviceRegistry {
            sdk: Arc::new(sdk),
            claims: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Access the underlying SDK backend.
    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    /// Number of attached devices. Side-effect-free enumeration query.
    pub fn count(&self) -> Result<usize> {
        let devices = self
            .sdk
            .enumerate_devices()
            .map_err(|e| DepthStreamError::from_sdk(e, 0))?;
        Ok(devices.len())
    }

    /// Resolve a numeric index to a device descriptor.
    pub fn resolve(&self, index: usize) -> Result<DeviceDescriptor> {
        let devices = self
            .sdk
            .enumerate_devices()
            .map_err(|e| DepthStreamError::from_sdk(e, 0))?;

        let info = devices.get(index).ok_or(DepthStreamError::DeviceNotFound {
            requested: index,
            available: devices.len(),
        })?;

        log::debug!(
            "resolved device {}: {} ({:?})",
            info.id,
            info.name,
            info.capabilities
        );

        Ok(DeviceDescriptor {
            id: info.id,
            name: info.name.clone(),
            capabilities: info.capabilities,
        })
    }

    /// Create a session bound to `device` with the given stream set.
    ///
    /// Validates the configs against the support table and the device's
    /// capabilities; the session starts in the `Created` state and does
    /// not touch the hardware until `start`.
    pub fn create_session(
        &self,
        device: &DeviceDescriptor,
        configs: Vec<StreamConfig>,
    ) -> Result<Session<S>> {
        Session::create(
            self.sdk.clone(),
            device.clone(),
            configs,
            self.claims.clone(),
        )
    }
}
