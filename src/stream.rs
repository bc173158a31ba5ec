use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::cursor::AcquisitionCursor;
use crate::error::DepthStreamError;
use crate::frame::FrameBundle;
use crate::sdk::DeviceSdk;
use crate::session::Session;
use crate::Result;

/// Handle to a background acquisition loop.
///
/// A dedicated reader thread owns the session, drives an acquisition
/// cursor, and sends bundles over a bounded channel so the caller can
/// process one bundle while the next is already being waited on.
///
/// The channel send blocks when full: bundles are never dropped, the
/// reader just stalls until the consumer catches up. Bundle order and
/// the exactly-once release of sub-frame handles are unaffected by the
/// thread hop because bundles move through the channel by value.
pub struct BundleStream<S: DeviceSdk> {
    receiver: Receiver<FrameBundle<S>>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl<S: DeviceSdk> BundleStream<S> {
    /// Start the session and spawn the reader thread.
    ///
    /// `wait_timeout` is the per-wait device timeout; it also bounds
    /// how long a stop request can go unnoticed. `depth` is the channel
    /// capacity before the reader stalls.
    pub fn spawn(
        mut session: Session<S>,
        wait_timeout: Duration,
        depth: usize,
    ) -> Result<BundleStream<S>> {
        session.start()?;

        let (sender, receiver) = crossbeam_channel::bounded(depth);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let thread = std::thread::Builder::new()
            .name("depthstream-reader".into())
            .spawn(move || {
                reader_loop(session, sender, stop_clone, wait_timeout);
            })
            .map_err(|e| DepthStreamError::DeviceIo {
                op: "spawn_reader",
                detail: e.to_string(),
            })?;

        Ok(BundleStream {
            receiver,
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Receive the next bundle (blocks until available).
    pub fn recv(&self) -> Result<FrameBundle<S>> {
        self.receiver
            .recv()
            .map_err(|_| DepthStreamError::StreamStopped)
    }

    /// Try to receive a bundle without blocking.
    pub fn try_recv(&self) -> Option<FrameBundle<S>> {
        self.receiver.try_recv().ok()
    }

    /// Receive a bundle with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<FrameBundle<S>> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => DepthStreamError::AcquisitionTimeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => DepthStreamError::StreamStopped,
        })
    }

    /// Check if the reader is still running.
    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
    }

    /// Stop the reader and wait for it to finish.
    ///
    /// The session is dropped inside the reader thread, which stops the
    /// pipeline and releases any frames still queued.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl<S: DeviceSdk> Drop for BundleStream<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The reader loop runs in a dedicated thread and owns the session.
///
/// Timeouts just re-check the stop flag; hard device errors end the
/// loop. Either way the session drops here, so pipeline stop and frame
/// release run on every exit path.
fn reader_loop<S: DeviceSdk>(
    session: Session<S>,
    sender: Sender<FrameBundle<S>>,
    stop_flag: Arc<AtomicBool>,
    wait_timeout: Duration,
) {
    log::info!("bundle reader started");

    let mut cursor = match AcquisitionCursor::begin(&session) {
        Ok(cursor) => cursor,
        Err(e) => {
            log::warn!("bundle reader failed to open a cursor: {}", e);
            stop_flag.store(true, Ordering::Relaxed);
            return;
        }
    };

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            log::info!("bundle reader stopping (stop flag set)");
            break;
        }

        match cursor.advance(wait_timeout) {
            Ok(bundle) => {
                if !deliver(&sender, &stop_flag, bundle) {
                    break;
                }
            }
            Err(DepthStreamError::AcquisitionTimeout) => continue,
            Err(e) => {
                log::warn!("bundle reader stopping on device error: {}", e);
                break;
            }
        }
    }

    stop_flag.store(true, Ordering::Relaxed);
}

/// Push one bundle into the channel, backing off in short slices so a
/// stop request is noticed even while the consumer lags.
///
/// Returns false when the reader should exit; an undelivered bundle is
/// dropped here, which releases its frame handles.
fn deliver<S: DeviceSdk>(
    sender: &Sender<FrameBundle<S>>,
    stop_flag: &AtomicBool,
    bundle: FrameBundle<S>,
) -> bool {
    let mut pending = bundle;
    loop {
        match sender.send_timeout(pending, Duration::from_millis(100)) {
            Ok(()) => return true,
            Err(crossbeam_channel::SendTimeoutError::Timeout(b)) => {
                if stop_flag.load(Ordering::Relaxed) {
                    log::info!("bundle reader stopping with a bundle undelivered");
                    return false;
                }
                pending = b;
            }
            Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                log::info!("bundle channel disconnected, stopping reader");
                return false;
            }
        }
    }
}
