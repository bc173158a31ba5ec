//! The device-SDK boundary.
//!
//! Everything hardware-shaped lives behind [`DeviceSdk`]: enumeration,
//! pipeline setup, the blocking batch wait, and per-frame accessors.
//! The core never talks to a bus or driver directly; a production
//! backend wraps the vendor SDK, and [`crate::testing::ScriptedSdk`]
//! implements the same trait for deterministic tests.

use std::time::Duration;

use crate::types::{Capabilities, Extrinsics, PoseSnapshot, StreamConfig, StreamKind};

/// Failures reported by a device SDK backend.
///
/// `Io` carries the name of the failed SDK call plus its formatted
/// arguments so the caller sees exactly what was attempted.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("timed out")]
    Timeout,

    #[error("device already in use")]
    Busy,

    #[error("`{op}` failed: {detail}")]
    Io { op: &'static str, detail: String },
}

impl SdkError {
    pub fn io(op: &'static str, detail: impl Into<String>) -> Self {
        SdkError::Io {
            op,
            detail: detail.into(),
        }
    }
}

/// Enumeration record for one attached device.
#[derive(Debug, Clone)]
pub struct SdkDeviceInfo {
    pub id: u32,
    pub name: String,
    pub capabilities: Capabilities,
}

/// Narrow interface onto the camera vendor SDK.
///
/// Frame handles are references into the SDK's own frame pool. The
/// contract the core builds on:
///
/// - `extract_frame` hands out one reference that the caller must
///   balance with exactly one `release_frame`;
/// - `keep_frame` pins a handle so it stays valid after its batch is
///   dropped;
/// - `release_frame` takes the handle by value, so a second release of
///   the same handle is not expressible.
///
/// All handle types are `Send` so bundles can cross threads.
pub trait DeviceSdk: Send + Sync + 'static {
    type Pipeline: Send;
    type Batch: Send;
    type Frame: Send;

    fn enumerate_devices(&self) -> Result<Vec<SdkDeviceInfo>, SdkError>;

    fn create_pipeline(&self, device_id: u32) -> Result<Self::Pipeline, SdkError>;

    fn configure_stream(
        &self,
        pipeline: &Self::Pipeline,
        config: &StreamConfig,
    ) -> Result<(), SdkError>;

    fn start(&self, pipeline: &Self::Pipeline) -> Result<(), SdkError>;

    fn stop(&self, pipeline: &Self::Pipeline) -> Result<(), SdkError>;

    /// Block until the next frame batch arrives or `timeout` elapses.
    ///
    /// One batch may embed several frames per stream when production
    /// outpaced consumption.
    fn wait_for_batch(
        &self,
        pipeline: &Self::Pipeline,
        timeout: Duration,
    ) -> Result<Self::Batch, SdkError>;

    /// Number of frames embedded in the batch, across all streams.
    fn batch_len(&self, batch: &Self::Batch) -> usize;

    /// Borrow one embedded frame out of the batch.
    fn extract_frame(&self, batch: &Self::Batch, index: usize) -> Result<Self::Frame, SdkError>;

    /// Extend a borrowed frame's lifetime past its batch.
    fn keep_frame(&self, frame: &Self::Frame);

    /// Return a frame reference to the SDK pool. Consumes the handle.
    fn release_frame(&self, frame: Self::Frame);

    fn frame_stream_kind(&self, frame: &Self::Frame) -> StreamKind;

    fn frame_number(&self, frame: &Self::Frame) -> u64;

    /// Device-clock capture timestamp in milliseconds.
    fn frame_timestamp(&self, frame: &Self::Frame) -> f64;

    fn frame_width(&self, frame: &Self::Frame) -> usize;

    fn frame_height(&self, frame: &Self::Frame) -> usize;

    fn frame_bytes_per_pixel(&self, frame: &Self::Frame) -> usize;

    /// Raw pixel buffer of a video frame, borrowed for the frame's life.
    fn frame_data<'a>(&self, frame: &'a Self::Frame) -> &'a [u8];

    /// Scale converting a raw depth sample to meters. Depth frames only.
    fn depth_units(&self, frame: &Self::Frame) -> Result<f32, SdkError>;

    /// Copy the pose fields out of a pose frame.
    fn frame_pose(&self, frame: &Self::Frame) -> Result<PoseSnapshot, SdkError>;

    /// Rigid transform from one configured sensor to another.
    fn extrinsics(
        &self,
        pipeline: &Self::Pipeline,
        from: StreamKind,
        to: StreamKind,
    ) -> Result<Extrinsics, SdkError>;
}
