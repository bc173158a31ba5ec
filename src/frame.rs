use std::sync::Arc;

use crate::error::DepthStreamError;
use crate::sdk::DeviceSdk;
use crate::types::{PixelFormat, PoseSnapshot, StreamConfig, StreamKind};
use crate::Result;

/// One time-aligned set of per-stream frames.
///
/// The bundle exclusively owns its sub-frame handles, which are
/// references into the SDK's frame pool. Dropping the bundle returns
/// every handle exactly once, whether or not it was ever viewed;
/// `release_frame` consumes handles by value, so a double release is
/// not expressible.
pub struct FrameBundle<S: DeviceSdk> {
    sdk: Arc<S>,
    configs: Arc<[StreamConfig]>,
    device_id: u32,
    frame_number: u64,
    timestamp: f64,
    frames: Vec<(StreamKind, S::Frame)>,
}

impl<S: DeviceSdk> FrameBundle<S> {
    pub(crate) fn new(
        sdk: Arc<S>,
        configs: Arc<[StreamConfig]>,
        device_id: u32,
        frame_number: u64,
        timestamp: f64,
    ) -> Self {
        FrameBundle {
            sdk,
            configs,
            device_id,
            frame_number,
            timestamp,
            frames: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, kind: StreamKind, frame: S::Frame) {
        self.frames.push((kind, frame));
    }

    pub(crate) fn has_stream(&self, kind: StreamKind) -> bool {
        self.frames.iter().any(|(k, _)| *k == kind)
    }

    /// Monotonic per-session frame number.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Device-clock capture timestamp in milliseconds.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Stream kinds present in this bundle.
    ///
    /// A burst split can deliver bundles that miss one of the
    /// configured streams; check here before `view` to avoid a
    /// `StreamNotEnabled` round trip.
    pub fn streams(&self) -> impl Iterator<Item = StreamKind> + '_ {
        self.frames.iter().map(|(k, _)| *k)
    }

    fn sub_frame(&self, kind: StreamKind) -> Result<&S::Frame> {
        self.frames
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, f)| f)
            .ok_or(DepthStreamError::StreamNotEnabled(kind))
    }

    fn config(&self, kind: StreamKind) -> Result<&StreamConfig> {
        self.configs
            .iter()
            .find(|c| c.kind == kind)
            .ok_or(DepthStreamError::StreamNotEnabled(kind))
    }

    /// Borrow a typed zero-copy view of one video sub-frame.
    ///
    /// Shape and stride derive from the stream's pixel format. The view
    /// borrows from the bundle, so it cannot outlive the frame data it
    /// points into.
    pub fn view(&self, kind: StreamKind) -> Result<TypedFrameView<'_>> {
        let config = self.config(kind)?;
        if config.format == PixelFormat::SixDof {
            return Err(DepthStreamError::UnsupportedStreamConfig(
                "pose streams have no pixel view; use pose()".into(),
            ));
        }
        let frame = self.sub_frame(kind)?;

        let rows = self.sdk.frame_height(frame);
        let cols = self.sdk.frame_width(frame);
        let bytes_per_pixel = config.format.bytes_per_pixel();
        let row_stride = cols * bytes_per_pixel;
        let data = self.sdk.frame_data(frame);

        let expected = rows * row_stride;
        if data.len() < expected {
            return Err(DepthStreamError::DeviceIo {
                op: "frame_data",
                detail: format!(
                    "{} frame buffer is {} bytes, {}x{} {:?} needs {}",
                    kind,
                    data.len(),
                    cols,
                    rows,
                    config.format,
                    expected
                ),
            });
        }

        Ok(TypedFrameView {
            data: &data[..expected],
            rows,
            cols,
            channels: config.format.channels(),
            bytes_per_pixel,
            row_stride,
            format: config.format,
        })
    }

    /// Meters-per-unit scale of the depth stream.
    pub fn depth_units(&self) -> Result<f32> {
        self.config(StreamKind::Depth)?;
        let frame = self.sub_frame(StreamKind::Depth)?;
        self.sdk
            .depth_units(frame)
            .map_err(|e| DepthStreamError::from_sdk(e, self.device_id))
    }

    /// Copy the 6-DoF pose out of the pose sub-frame.
    ///
    /// The returned snapshot has its own lifetime; the bundle can be
    /// dropped immediately after.
    pub fn pose(&self) -> Result<PoseSnapshot> {
        self.config(StreamKind::Pose)?;
        let frame = self.sub_frame(StreamKind::Pose)?;
        self.sdk
            .frame_pose(frame)
            .map_err(|e| DepthStreamError::from_sdk(e, self.device_id))
    }
}

impl<S: DeviceSdk> std::fmt::Debug for FrameBundle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBundle")
            .field("device_id", &self.device_id)
            .field("frame_number", &self.frame_number)
            .field("timestamp", &self.timestamp)
            .field("streams", &self.streams().collect::<Vec<_>>())
            .finish()
    }
}

impl<S: DeviceSdk> Drop for FrameBundle<S> {
    fn drop(&mut self) {
        for (_, frame) in self.frames.drain(..) {
            self.sdk.release_frame(frame);
        }
    }
}

/// Zero-copy descriptor over one video frame's pixels.
///
/// Flat buffer plus shape/stride metadata, row-major, suitable for
/// handing to a numeric-array consumer without copying.
#[derive(Debug, Clone, Copy)]
pub struct TypedFrameView<'a> {
    data: &'a [u8],
    rows: usize,
    cols: usize,
    channels: usize,
    bytes_per_pixel: usize,
    row_stride: usize,
    format: PixelFormat,
}

impl<'a> TypedFrameView<'a> {
    /// The whole pixel buffer, exactly `rows * row_stride` bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    /// Bytes per image row; row-major with no padding.
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// (rows, cols, channels) for array interop.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, self.channels)
    }

    /// One image row, or `None` past the last row.
    pub fn row(&self, row: usize) -> Option<&'a [u8]> {
        if row >= self.rows {
            return None;
        }
        let offset = row * self.row_stride;
        self.data.get(offset..offset + self.row_stride)
    }

    /// Read one raw 16-bit sample of a `Z16` frame.
    ///
    /// Multiply by the bundle's `depth_units` to get meters. `None` if
    /// the format is not `Z16` or the coordinates are out of bounds.
    pub fn sample_u16(&self, row: usize, col: usize) -> Option<u16> {
        if self.format != PixelFormat::Z16 || row >= self.rows || col >= self.cols {
            return None;
        }
        let offset = row * self.row_stride + col * self.bytes_per_pixel;
        let bytes = self.data.get(offset..offset + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}
