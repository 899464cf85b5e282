//! Multi-source frame reader: arrival waits and latest-frame fetches

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::error::{FetchStage, KinectError, Result};
use crate::frame::Frame;
use crate::handle::Handle;
use crate::native::{
    MultiSourceFrameArrivedEventArgs, MultiSourceFrameReader, MultiSourceFrameReference, ReaderOf,
    Sensor, WaitResult, Waitable, WaitableOf,
};
use crate::session::Session;
use crate::types::FrameSourceTypes;

/// Reader over the streams selected at open time.
///
/// Holds the arrival-event subscription and a shared reference to the
/// session, so the sensor outlives every reader.
pub struct FrameSourceReader<S: Sensor> {
    // Field order is drop order: the reader is released before the session
    // reference goes away.
    waitable: WaitableOf<S>,
    reader: Handle<ReaderOf<S>>,
    session: Arc<Session<S>>,
    flags: FrameSourceTypes,
    wait_timeout: Option<Duration>,
}

impl<S: Sensor> FrameSourceReader<S> {
    /// Open a reader for `flags` and subscribe to frame arrival.
    ///
    /// The reader waits indefinitely until a bound is set with
    /// [`FrameSourceReader::with_wait_timeout`].
    pub fn open(session: Arc<Session<S>>, flags: FrameSourceTypes) -> Result<Self> {
        trace!(%flags, "Opening multi-source frame reader");
        let reader = Handle::new(
            session
                .sensor()?
                .open_multi_source_frame_reader(flags)
                .map_err(|source| KinectError::ReaderOpenFailed { flags, source })?,
        );

        let waitable = reader
            .get()
            .ok_or(KinectError::HandleReleased { resource: "reader" })?
            .subscribe_frame_arrived()
            .map_err(|source| KinectError::SubscribeFailed { source })?;

        debug!(%flags, "Subscribed to multi-source frame arrival");
        Ok(Self { waitable, reader, session, flags, wait_timeout: None })
    }

    /// Bound every wait by `timeout`. `None` waits indefinitely.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn set_wait_timeout(&mut self, timeout: Option<Duration>) {
        self.wait_timeout = timeout;
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    /// Streams this reader was opened for. Fixed for the reader's lifetime.
    pub fn flags(&self) -> FrameSourceTypes {
        self.flags
    }

    pub fn session(&self) -> &Arc<Session<S>> {
        &self.session
    }

    /// Block until a new frame is signaled or the wait timeout elapses.
    pub fn wait(&self) -> Result<()> {
        let result = self
            .waitable
            .wait(self.wait_timeout)
            .map_err(|source| KinectError::WaitFailed { source })?;
        timed_out_as_error(result, self.wait_timeout)
    }

    /// Block until every reader's arrival event has signaled.
    pub fn wait_all(readers: &[&Self], timeout: Option<Duration>) -> Result<()> {
        let waitables: Vec<&WaitableOf<S>> = readers.iter().map(|r| &r.waitable).collect();
        let result = <WaitableOf<S> as Waitable>::wait_all(&waitables, timeout)
            .map_err(|source| KinectError::WaitFailed { source })?;
        timed_out_as_error(result, timeout)
    }

    /// Resolve the most recent arrival into an acquired frame.
    ///
    /// Each intermediate reference is released as soon as the next stage is
    /// resolved, on success and on failure. The frame borrows the reader, so
    /// it cannot be held across the next wait.
    pub fn latest_frame(&mut self) -> Result<Frame<'_, S>> {
        let reader = self.reader.get().ok_or(KinectError::HandleReleased { resource: "reader" })?;

        let args = Handle::new(
            reader.frame_arrived_event_data(&self.waitable).map_err(|source| {
                KinectError::FrameFetchFailed { stage: FetchStage::EventData, source }
            })?,
        );

        let reference = Handle::new(
            args.get()
                .ok_or(KinectError::HandleReleased { resource: "event data" })?
                .frame_reference()
                .map_err(|source| KinectError::FrameFetchFailed {
                    stage: FetchStage::FrameReference,
                    source,
                })?,
        );
        drop(args);

        let frame = reference
            .get()
            .ok_or(KinectError::HandleReleased { resource: "frame reference" })?
            .acquire_frame()
            .map_err(|source| KinectError::FrameFetchFailed {
                stage: FetchStage::AcquireFrame,
                source,
            })?;
        drop(reference);

        trace!(flags = %self.flags, "Acquired multi-source frame");
        Ok(Frame::new(frame, self.flags))
    }
}

fn timed_out_as_error(result: WaitResult, timeout: Option<Duration>) -> Result<()> {
    match result {
        WaitResult::Signaled => Ok(()),
        WaitResult::TimedOut => {
            Err(KinectError::Timeout { duration: timeout.unwrap_or(Duration::MAX) })
        }
    }
}

impl<S: Sensor> Drop for FrameSourceReader<S> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get() {
            if let Err(e) = reader.unsubscribe_frame_arrived(&self.waitable) {
                warn!(error = %e, "Unsubscribing from frame arrival failed during teardown");
            }
        }
        debug!(flags = %self.flags, "Multi-source frame reader closed");
    }
}
