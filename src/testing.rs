//! Deterministic in-memory device SDK.
//!
//! [`ScriptedSdk`] implements [`DeviceSdk`] over a scripted queue of
//! frame batches and keeps a ledger of every extract/keep/release and
//! lifecycle call, so tests can assert that acquisition balances its
//! frame references exactly. The demo programs use it as a replay
//! backend.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::sdk::{DeviceSdk, SdkDeviceInfo, SdkError};
use crate::types::{Capabilities, Extrinsics, PixelFormat, PoseSnapshot, StreamConfig, StreamKind};

/// Blueprint for one scripted frame inside a batch.
#[derive(Debug, Clone)]
pub struct FrameScript {
    kind: StreamKind,
    number: u64,
    timestamp: f64,
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    data: Vec<u8>,
    pose: Option<PoseSnapshot>,
}

impl FrameScript {
    /// A video frame filled with a deterministic byte pattern.
    pub fn video(
        kind: StreamKind,
        number: u64,
        timestamp: f64,
        width: usize,
        height: usize,
        format: PixelFormat,
    ) -> Self {
        let bytes_per_pixel = format.bytes_per_pixel();
        let len = width * height * bytes_per_pixel;
        FrameScript {
            kind,
            number,
            timestamp,
            width,
            height,
            bytes_per_pixel,
            data: (0..len).map(|i| (i % 251) as u8).collect(),
            pose: None,
        }
    }

    /// A depth frame where every sample holds `raw`.
    pub fn depth(number: u64, timestamp: f64, width: usize, height: usize, raw: u16) -> Self {
        let mut script = FrameScript::video(
            StreamKind::Depth,
            number,
            timestamp,
            width,
            height,
            PixelFormat::Z16,
        );
        script.data = raw
            .to_le_bytes()
            .iter()
            .copied()
            .cycle()
            .take(width * height * 2)
            .collect();
        script
    }

    /// A pose frame carrying `snapshot`.
    pub fn pose(number: u64, timestamp: f64, snapshot: PoseSnapshot) -> Self {
        FrameScript {
            kind: StreamKind::Pose,
            number,
            timestamp,
            width: 0,
            height: 0,
            bytes_per_pixel: 0,
            data: Vec::new(),
            pose: Some(snapshot),
        }
    }

    /// Replace the frame's pixel buffer.
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }
}

enum ScriptStep {
    Batch(Vec<FrameScript>),
    Fail(String),
}

/// Call-count snapshot of the scripted backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ledger {
    pub waits: usize,
    pub pipelines_created: usize,
    pub starts: usize,
    pub stops: usize,
    pub extracted: usize,
    pub kept: usize,
    pub released: usize,
    /// Handles extracted but not yet released.
    pub outstanding: usize,
}

#[derive(Default)]
struct LedgerInner {
    waits: usize,
    pipelines_created: usize,
    starts: usize,
    stops: usize,
    extracted: usize,
    kept: usize,
    released: usize,
    outstanding: HashSet<u64>,
    configured: Vec<StreamConfig>,
}

pub struct ScriptedPipeline {
    device_id: u32,
}

pub struct ScriptedBatch {
    frames: Vec<FrameScript>,
}

pub struct ScriptedFrame {
    handle: u64,
    kind: StreamKind,
    number: u64,
    timestamp: f64,
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    data: Vec<u8>,
    pose: Option<PoseSnapshot>,
    units: f32,
}

/// Scripted [`DeviceSdk`] implementation.
///
/// Build it with the `with_*` methods, hand it to a registry, then
/// feed batches through `push_batch` (usable through
/// `DeviceRegistry::sdk`). An exhausted script makes `wait_for_batch`
/// time out.
pub struct ScriptedSdk {
    devices: Vec<SdkDeviceInfo>,
    depth_units: f32,
    extrinsics: Extrinsics,
    script: Mutex<VecDeque<ScriptStep>>,
    fail_next_start: AtomicBool,
    fail_next_stop: AtomicBool,
    next_handle: AtomicU64,
    ledger: Mutex<LedgerInner>,
}

impl ScriptedSdk {
    pub fn new() -> Self {
        ScriptedSdk {
            devices: Vec::new(),
            depth_units: 0.001,
            extrinsics: Extrinsics::identity(),
            script: Mutex::new(VecDeque::new()),
            fail_next_start: AtomicBool::new(false),
            fail_next_stop: AtomicBool::new(false),
            next_handle: AtomicU64::new(1),
            ledger: Mutex::new(LedgerInner::default()),
        }
    }

    pub fn with_device(mut self, id: u32, name: &str, capabilities: Capabilities) -> Self {
        self.devices.push(SdkDeviceInfo {
            id,
            name: name.to_string(),
            capabilities,
        });
        self
    }

    pub fn with_depth_units(mut self, units: f32) -> Self {
        self.depth_units = units;
        self
    }

    pub fn with_extrinsics(mut self, extrinsics: Extrinsics) -> Self {
        self.extrinsics = extrinsics;
        self
    }

    /// Queue a batch for the next `wait_for_batch`.
    pub fn push_batch(&self, frames: Vec<FrameScript>) {
        self.script_lock().push_back(ScriptStep::Batch(frames));
    }

    /// Queue a hard wait failure (not a timeout).
    pub fn push_wait_failure(&self, detail: &str) {
        self.script_lock()
            .push_back(ScriptStep::Fail(detail.to_string()));
    }

    /// Make the next `start` call fail.
    pub fn fail_next_start(&self) {
        self.fail_next_start.store(true, Ordering::SeqCst);
    }

    /// Make the next `stop` call fail.
    pub fn fail_next_stop(&self) {
        self.fail_next_stop.store(true, Ordering::SeqCst);
    }

    pub fn ledger(&self) -> Ledger {
        let inner = self.ledger_lock();
        Ledger {
            waits: inner.waits,
            pipelines_created: inner.pipelines_created,
            starts: inner.starts,
            stops: inner.stops,
            extracted: inner.extracted,
            kept: inner.kept,
            released: inner.released,
            outstanding: inner.outstanding.len(),
        }
    }

    /// True when every extracted handle has been released.
    pub fn balanced(&self) -> bool {
        let inner = self.ledger_lock();
        inner.extracted == inner.released && inner.outstanding.is_empty()
    }

    /// Stream configs seen by `configure_stream`, in call order.
    pub fn configured_streams(&self) -> Vec<StreamConfig> {
        self.ledger_lock().configured.clone()
    }

    fn script_lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptStep>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ledger_lock(&self) -> std::sync::MutexGuard<'_, LedgerInner> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ScriptedSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSdk for ScriptedSdk {
    type Pipeline = ScriptedPipeline;
    type Batch = ScriptedBatch;
    type Frame = ScriptedFrame;

    fn enumerate_devices(&self) -> Result<Vec<SdkDeviceInfo>, SdkError> {
        Ok(self.devices.clone())
    }

    fn create_pipeline(&self, device_id: u32) -> Result<ScriptedPipeline, SdkError> {
        if !self.devices.iter().any(|d| d.id == device_id) {
            return Err(SdkError::io(
                "create_pipeline",
                format!("no device with id {}", device_id),
            ));
        }
        self.ledger_lock().pipelines_created += 1;
        Ok(ScriptedPipeline { device_id })
    }

    fn configure_stream(
        &self,
        _pipeline: &ScriptedPipeline,
        config: &StreamConfig,
    ) -> Result<(), SdkError> {
        self.ledger_lock().configured.push(*config);
        Ok(())
    }

    fn start(&self, pipeline: &ScriptedPipeline) -> Result<(), SdkError> {
        self.ledger_lock().starts += 1;
        if self.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(SdkError::io(
                "start",
                format!("injected start failure on device {}", pipeline.device_id),
            ));
        }
        Ok(())
    }

    fn stop(&self, pipeline: &ScriptedPipeline) -> Result<(), SdkError> {
        self.ledger_lock().stops += 1;
        if self.fail_next_stop.swap(false, Ordering::SeqCst) {
            return Err(SdkError::io(
                "stop",
                format!("injected stop failure on device {}", pipeline.device_id),
            ));
        }
        Ok(())
    }

    fn wait_for_batch(
        &self,
        _pipeline: &ScriptedPipeline,
        _timeout: Duration,
    ) -> Result<ScriptedBatch, SdkError> {
        self.ledger_lock().waits += 1;
        match self.script_lock().pop_front() {
            Some(ScriptStep::Batch(frames)) => Ok(ScriptedBatch { frames }),
            Some(ScriptStep::Fail(detail)) => Err(SdkError::io("wait_for_batch", detail)),
            None => Err(SdkError::Timeout),
        }
    }

    fn batch_len(&self, batch: &ScriptedBatch) -> usize {
        batch.frames.len()
    }

    fn extract_frame(&self, batch: &ScriptedBatch, index: usize) -> Result<ScriptedFrame, SdkError> {
        let script = batch.frames.get(index).ok_or_else(|| {
            SdkError::io(
                "extract_frame",
                format!("index {} out of {} frames", index, batch.frames.len()),
            )
        })?;
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.ledger_lock();
        inner.extracted += 1;
        inner.outstanding.insert(handle);
        Ok(ScriptedFrame {
            handle,
            kind: script.kind,
            number: script.number,
            timestamp: script.timestamp,
            width: script.width,
            height: script.height,
            bytes_per_pixel: script.bytes_per_pixel,
            data: script.data.clone(),
            pose: script.pose,
            units: self.depth_units,
        })
    }

    fn keep_frame(&self, _frame: &ScriptedFrame) {
        self.ledger_lock().kept += 1;
    }

    fn release_frame(&self, frame: ScriptedFrame) {
        let mut inner = self.ledger_lock();
        inner.released += 1;
        inner.outstanding.remove(&frame.handle);
    }

    fn frame_stream_kind(&self, frame: &ScriptedFrame) -> StreamKind {
        frame.kind
    }

    fn frame_number(&self, frame: &ScriptedFrame) -> u64 {
        frame.number
    }

    fn frame_timestamp(&self, frame: &ScriptedFrame) -> f64 {
        frame.timestamp
    }

    fn frame_width(&self, frame: &ScriptedFrame) -> usize {
        frame.width
    }

    fn frame_height(&self, frame: &ScriptedFrame) -> usize {
        frame.height
    }

    fn frame_bytes_per_pixel(&self, frame: &ScriptedFrame) -> usize {
        frame.bytes_per_pixel
    }

    fn frame_data<'a>(&self, frame: &'a ScriptedFrame) -> &'a [u8] {
        &frame.data
    }

    fn depth_units(&self, frame: &ScriptedFrame) -> Result<f32, SdkError> {
        if frame.kind != StreamKind::Depth {
            return Err(SdkError::io(
                "depth_units",
                format!("frame {} is a {} frame", frame.number, frame.kind),
            ));
        }
        Ok(frame.units)
    }

    fn frame_pose(&self, frame: &ScriptedFrame) -> Result<PoseSnapshot, SdkError> {
        frame.pose.ok_or_else(|| {
            SdkError::io(
                "frame_pose",
                format!("frame {} carries no pose data", frame.number),
            )
        })
    }

    fn extrinsics(
        &self,
        _pipeline: &ScriptedPipeline,
        _from: StreamKind,
        _to: StreamKind,
    ) -> Result<Extrinsics, SdkError> {
        Ok(self.extrinsics)
    }
}
