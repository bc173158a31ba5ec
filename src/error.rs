use crate::sdk::SdkError;
use crate::session::SessionState;
use crate::types::StreamKind;

/// Errors that can occur while acquiring frames from a device.
#[derive(Debug, thiserror::Error)]
pub enum DepthStreamError {
    #[error("device index {requested} not found ({available} device(s) attached)")]
    DeviceNotFound { requested: usize, available: usize },

    #[error("unsupported stream config: {0}")]
    UnsupportedStreamConfig(String),

    #[error("device {device_id} is already claimed by another session")]
    DeviceBusy { device_id: u32 },

    #[error("device SDK call `{op}` failed: {detail}")]
    DeviceIo { op: &'static str, detail: String },

    #[error("invalid session state: expected {expected}, session is {actual}")]
    InvalidSessionState {
        expected: SessionState,
        actual: SessionState,
    },

    #[error("cursor is no longer usable after a device error")]
    NotInitialized,

    #[error("timed out waiting for a frame batch")]
    AcquisitionTimeout,

    #[error("{0} stream is not enabled for this bundle")]
    StreamNotEnabled(StreamKind),

    #[error("an acquisition cursor is already active on this session")]
    ConcurrentAccess,

    #[error("bundle stream stopped")]
    StreamStopped,
}

impl DepthStreamError {
    /// Map a backend failure onto the caller-facing error set.
    ///
    /// Timeouts stay non-fatal, busy claims keep the device id for
    /// diagnostics, and everything else surfaces the failed SDK call
    /// verbatim.
    pub(crate) fn from_sdk(err: SdkError, device_id: u32) -> Self {
        match err {
            SdkError::Timeout => DepthStreamError::AcquisitionTimeout,
            SdkError::Busy => DepthStreamError::DeviceBusy { device_id },
            SdkError::Io { op, detail } => DepthStreamError::DeviceIo { op, detail },
        }
    }
}
