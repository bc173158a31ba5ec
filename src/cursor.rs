use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::DepthStreamError;
use crate::frame::FrameBundle;
use crate::sdk::{DeviceSdk, SdkError};
use crate::session::{Session, SessionState};
use crate::Result;

/// Blocking cursor over a started session's frame pipeline.
///
/// Each `advance` yields one bundle. One SDK wait can deliver a batch
/// embedding several frames per stream; the cursor splits such batches
/// into order-preserved bundles and parks the surplus in a pending
/// queue, so no wait is issued while split bundles remain undelivered.
///
/// Single-consumer: `advance` takes `&mut self`, and the session's
/// cursor guard rejects a second live cursor with `ConcurrentAccess`.
/// The shared borrow of the session keeps `stop` (which needs `&mut`)
/// unreachable while the cursor is alive.
pub struct AcquisitionCursor<'s, S: DeviceSdk> {
    session: &'s Session<S>,
    pending: VecDeque<FrameBundle<S>>,
    last_frame_number: Option<u64>,
    faulted: bool,
}

impl<'s, S: DeviceSdk> AcquisitionCursor<'s, S> {
    /// Open a cursor over `session`, which must be started.
    pub fn begin(session: &'s Session<S>) -> Result<Self> {
        if session.state() != SessionState::Started {
            return Err(DepthStreamError::InvalidSessionState {
                expected: SessionState::Started,
                actual: session.state(),
            });
        }
        if session
            .cursor_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DepthStreamError::ConcurrentAccess);
        }
        Ok(AcquisitionCursor {
            session,
            pending: VecDeque::new(),
            last_frame_number: None,
            faulted: false,
        })
    }

    /// Block until the next bundle is available or `timeout` elapses.
    ///
    /// A timeout is non-fatal; the caller decides whether to re-wait.
    /// Any other SDK failure faults the cursor: later calls fail
    /// `NotInitialized` without touching the device.
    pub fn advance(&mut self, timeout: Duration) -> Result<FrameBundle<S>> {
        if self.faulted {
            return Err(DepthStreamError::NotInitialized);
        }

        if self.pending.is_empty() {
            self.fill_pending(timeout)?;
        }

        let bundle = self
            .pending
            .pop_front()
            .ok_or(DepthStreamError::AcquisitionTimeout)?;

        if let Some(last) = self.last_frame_number {
            if bundle.frame_number() <= last {
                log::warn!(
                    "frame number regressed: {} after {}",
                    bundle.frame_number(),
                    last
                );
            }
        }
        self.last_frame_number = Some(bundle.frame_number());

        Ok(bundle)
    }

    fn fill_pending(&mut self, timeout: Duration) -> Result<()> {
        let device_id = self.session.device().id;
        let pipeline = self.session.pipeline()?;

        let batch = match self.session.sdk().wait_for_batch(pipeline, timeout) {
            Ok(batch) => batch,
            Err(SdkError::Timeout) => return Err(DepthStreamError::AcquisitionTimeout),
            Err(e) => {
                self.faulted = true;
                return Err(DepthStreamError::from_sdk(e, device_id));
            }
        };

        if let Err(e) = self.split_batch(&batch) {
            self.faulted = true;
            return Err(e);
        }
        Ok(())
    }

    /// Split an SDK batch into bundles, preserving arrival order.
    ///
    /// Frames are grouped by equal frame number; a number change or a
    /// repeated stream kind starts a new bundle. Every extracted handle
    /// is pinned with `keep_frame` (bundles outlive the batch) and
    /// parked in exactly one bundle, so bundle teardown releases it
    /// exactly once even if this function errors midway.
    fn split_batch(&mut self, batch: &S::Batch) -> Result<()> {
        let sdk = self.session.sdk();
        let device_id = self.session.device().id;
        let count = sdk.batch_len(batch);

        let mut current: Option<FrameBundle<S>> = None;
        for index in 0..count {
            let frame = sdk
                .extract_frame(batch, index)
                .map_err(|e| DepthStreamError::from_sdk(e, device_id))?;
            sdk.keep_frame(&frame);

            let kind = sdk.frame_stream_kind(&frame);
            let number = sdk.frame_number(&frame);
            let timestamp = sdk.frame_timestamp(&frame);

            let mut bundle = match current.take() {
                Some(b) if b.frame_number() == number && !b.has_stream(kind) => b,
                Some(done) => {
                    self.pending.push_back(done);
                    FrameBundle::new(
                        sdk.clone(),
                        self.session.configs_shared(),
                        device_id,
                        number,
                        timestamp,
                    )
                }
                None => FrameBundle::new(
                    sdk.clone(),
                    self.session.configs_shared(),
                    device_id,
                    number,
                    timestamp,
                ),
            };
            bundle.push(kind, frame);
            current = Some(bundle);
        }
        if let Some(done) = current {
            self.pending.push_back(done);
        }

        if count > 0 {
            log::trace!(
                "split batch of {} frame(s) into {} pending bundle(s)",
                count,
                self.pending.len()
            );
        }
        Ok(())
    }
}

impl<S: DeviceSdk> std::fmt::Debug for AcquisitionCursor<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionCursor")
            .field("pending", &self.pending.len())
            .field("last_frame_number", &self.last_frame_number)
            .field("faulted", &self.faulted)
            .finish()
    }
}

impl<S: DeviceSdk> Drop for AcquisitionCursor<'_, S> {
    fn drop(&mut self) {
        self.session.cursor_active.store(false, Ordering::Release);
    }
}
