use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, PoisonError};

use crate::device::DeviceClaims;
use crate::error::DepthStreamError;
use crate::sdk::DeviceSdk;
use crate::types::{DeviceDescriptor, Extrinsics, StreamConfig, StreamKind};
use crate::Result;

/// Lifecycle of a session's pipeline.
///
/// `Started -> Stopped` is one-way; a stopped session cannot be
/// restarted because the pipeline is bound to its first configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Started,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Created => write!(f, "created"),
            SessionState::Started => write!(f, "started"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// One pipeline bound to one device.
///
/// Owns the pipeline handle exclusively between `start` and `stop`.
/// Dropping the session always runs `stop`, so SDK resources are
/// reclaimed no matter how the session's lifetime ends.
pub struct Session<S: DeviceSdk> {
    sdk: Arc<S>,
    device: DeviceDescriptor,
    configs: Arc<[StreamConfig]>,
    state: SessionState,
    pipeline: Option<S::Pipeline>,
    claims: DeviceClaims,
    /// Single-consumer guard: set while an acquisition cursor is alive.
    pub(crate) cursor_active: AtomicBool,
}

impl<S: DeviceSdk> Session<S> {
    pub(crate) fn create(
        sdk: Arc<S>,
        device: DeviceDescriptor,
        configs: Vec<StreamConfig>,
        claims: DeviceClaims,
    ) -> Result<Self> {
        if configs.is_empty() {
            return Err(DepthStreamError::UnsupportedStreamConfig(
                "at least one stream must be requested".into(),
            ));
        }
        for (i, config) in configs.iter().enumerate() {
            config
                .validate()
                .map_err(DepthStreamError::UnsupportedStreamConfig)?;
            if configs[..i].iter().any(|c| c.kind == config.kind) {
                return Err(DepthStreamError::UnsupportedStreamConfig(format!(
                    "duplicate {} stream",
                    config.kind
                )));
            }
            let needed = config.kind.required_capability();
            if !device.capabilities.contains(needed) {
                return Err(DepthStreamError::UnsupportedStreamConfig(format!(
                    "device {} ({}) has no {} capability",
                    device.id, device.name, config.kind
                )));
            }
        }

        Ok(Session {
            sdk,
            device,
            configs: configs.into(),
            state: SessionState::Created,
            pipeline: None,
            claims,
            cursor_active: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn configs(&self) -> &[StreamConfig] {
        &self.configs
    }

    pub(crate) fn sdk(&self) -> &Arc<S> {
        &self.sdk
    }

    pub(crate) fn configs_shared(&self) -> Arc<[StreamConfig]> {
        self.configs.clone()
    }

    pub(crate) fn pipeline(&self) -> Result<&S::Pipeline> {
        self.pipeline.as_ref().ok_or(DepthStreamError::NotInitialized)
    }

    /// Claim the device and bring the pipeline up with this session's
    /// stream set.
    ///
    /// Exactly one of two racing `start` calls on the same device
    /// succeeds; the loser gets `DeviceBusy`. Any SDK failure releases
    /// the claim before surfacing.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Created {
            return Err(DepthStreamError::InvalidSessionState {
                expected: SessionState::Created,
                actual: self.state,
            });
        }

        {
            let mut claimed = self
                .claims
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !claimed.insert(self.device.id) {
                return Err(DepthStreamError::DeviceBusy {
                    device_id: self.device.id,
                });
            }
        }

        match self.bring_up() {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                self.state = SessionState::Started;
                log::info!(
                    "started session on device {} ({}) with {} stream(s)",
                    self.device.id,
                    self.device.name,
                    self.configs.len()
                );
                Ok(())
            }
            Err(e) => {
                self.release_claim();
                Err(e)
            }
        }
    }

    fn bring_up(&self) -> Result<S::Pipeline> {
        let map = |e| DepthStreamError::from_sdk(e, self.device.id);
        let pipeline = self.sdk.create_pipeline(self.device.id).map_err(map)?;
        for config in self.configs.iter() {
            self.sdk.configure_stream(&pipeline, config).map_err(map)?;
        }
        self.sdk.start(&pipeline).map_err(map)?;
        Ok(pipeline)
    }

    /// Tear the pipeline down. Idempotent.
    ///
    /// An SDK stop failure is logged; the claim and the pipeline handle
    /// are reclaimed regardless.
    pub fn stop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = self.sdk.stop(&pipeline) {
                log::warn!(
                    "pipeline stop failed on device {}: {}",
                    self.device.id,
                    e
                );
            }
        }
        if self.state == SessionState::Started {
            self.release_claim();
            log::info!("stopped session on device {}", self.device.id);
        }
        self.state = SessionState::Stopped;
    }

    fn release_claim(&self) {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.device.id);
    }

    /// Rigid transform between two of this session's sensors.
    ///
    /// Only valid while started; both kinds must be configured.
    pub fn extrinsics(&self, from: StreamKind, to: StreamKind) -> Result<Extrinsics> {
        if self.state != SessionState::Started {
            return Err(DepthStreamError::InvalidSessionState {
                expected: SessionState::Started,
                actual: self.state,
            });
        }
        for kind in [from, to] {
            if !self.configs.iter().any(|c| c.kind == kind) {
                return Err(DepthStreamError::StreamNotEnabled(kind));
            }
        }
        let pipeline = self.pipeline()?;
        self.sdk
            .extrinsics(pipeline, from, to)
            .map_err(|e| DepthStreamError::from_sdk(e, self.device.id))
    }
}

impl<S: DeviceSdk> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device)
            .field("state", &self.state)
            .field("configs", &self.configs)
            .finish()
    }
}

impl<S: DeviceSdk> Drop for Session<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
