//! Acquisition cycle: wait, fetch, extract, deliver
//!
//! [`Kinect`] owns the whole chain for one sensor: the session, a reader for
//! the selected streams, the registered callbacks and the buffers extraction
//! reuses between cycles. Every cycle runs on the calling thread and every
//! callback returns before [`Kinect::update`] does.
//!
//! ```rust,ignore
//! let api = platform_api();
//! let mut kinect = Kinect::open(&api, FrameSourceTypes::COLOR | FrameSourceTypes::BODY)?;
//!
//! kinect.on_body(|data| {
//!     for body in data.bodies {
//!         println!("slot {} head at {:?}", body.index, body.joint(JointType::Head));
//!     }
//! });
//! kinect.on_color(|image| println!("{}x{} color frame", image.width, image.height));
//!
//! loop {
//!     kinect.update();
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use crate::config::{AcquisitionConfig, StreamFailurePolicy};
use crate::error::{KinectError, Result};
use crate::extract::{extract_bodies, extract_color};
use crate::frame::Frame;
use crate::native::{KinectApi, Sensor};
use crate::reader::FrameSourceReader;
use crate::session::Session;
use crate::types::{
    Bgra, BodyFrameData, ColorImage, FrameSourceTypes, PixelSource, StreamKind, TrackedBody,
};


/// Receives the tracked bodies of one frame.
pub type BodyCallback = Box<dyn FnMut(BodyFrameData<'_>) + Send>;

/// Receives the color image of one frame.
pub type ColorCallback = Box<dyn FnMut(ColorImage<'_>) + Send>;

/// Outcome of one successful cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Where the delivered color pixels lived, if color was delivered.
    pub color: Option<PixelSource>,
    /// Number of tracked bodies delivered, if bodies were delivered.
    pub bodies: Option<usize>,
    /// Sub-stream failures skipped under [`StreamFailurePolicy::Isolate`].
    pub failures: Vec<(StreamKind, KinectError)>,
}

impl CycleReport {
    pub fn delivered(&self, stream: StreamKind) -> bool {
        match stream {
            StreamKind::Color => self.color.is_some(),
            StreamKind::Body => self.bodies.is_some(),
            _ => false,
        }
    }
}

/// One sensor's acquisition pipeline.
pub struct Kinect<S: Sensor> {
    reader: FrameSourceReader<S>,
    policy: StreamFailurePolicy,
    body_callback: Option<BodyCallback>,
    color_callback: Option<ColorCallback>,
    bodies: Vec<TrackedBody>,
    color_buffer: Vec<Bgra>,
    cycles: u64,
}

impl<S: Sensor> Kinect<S> {
    /// Open the default sensor and a reader configured by `config`.
    ///
    /// Nothing stays held when creation fails.
    pub fn create<A>(api: &A, config: &AcquisitionConfig) -> Result<Self>
    where
        A: KinectApi<Sensor = S>,
    {
        config.validate()?;
        Self::build(api, config.flags(), config)
    }

    /// Open with default settings reading `flags`.
    ///
    /// The reader is opened with `flags` exactly as given, bits without a
    /// [`StreamKind`] included.
    pub fn open<A>(api: &A, flags: FrameSourceTypes) -> Result<Self>
    where
        A: KinectApi<Sensor = S>,
    {
        if flags.is_empty() {
            return Err(KinectError::config_error("at least one stream must be selected"));
        }
        Self::build(api, flags, &AcquisitionConfig::default())
    }

    fn build<A>(api: &A, flags: FrameSourceTypes, config: &AcquisitionConfig) -> Result<Self>
    where
        A: KinectApi<Sensor = S>,
    {
        let session = Arc::new(Session::open(api)?);
        let reader = FrameSourceReader::open(session, flags)?.with_wait_timeout(config.wait_timeout());

        debug!(%flags, timeout = ?config.wait_timeout(), policy = ?config.stream_failure, "Acquisition pipeline created");
        Ok(Self {
            reader,
            policy: config.stream_failure,
            body_callback: None,
            color_callback: None,
            bodies: Vec::new(),
            color_buffer: Vec::new(),
            cycles: 0,
        })
    }

    pub fn on_body<F>(&mut self, callback: F)
    where
        F: FnMut(BodyFrameData<'_>) + Send + 'static,
    {
        self.body_callback = Some(Box::new(callback));
    }

    pub fn on_color<F>(&mut self, callback: F)
    where
        F: FnMut(ColorImage<'_>) + Send + 'static,
    {
        self.color_callback = Some(Box::new(callback));
    }

    /// Install, replace, or with `None` remove the body callback.
    pub fn set_body_callback(&mut self, callback: Option<BodyCallback>) {
        self.body_callback = callback;
    }

    /// Install, replace, or with `None` remove the color callback.
    pub fn set_color_callback(&mut self, callback: Option<ColorCallback>) {
        self.color_callback = callback;
    }

    pub fn flags(&self) -> FrameSourceTypes {
        self.reader.flags()
    }

    /// Cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn policy(&self) -> StreamFailurePolicy {
        self.policy
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.reader.wait_timeout()
    }

    pub fn set_wait_timeout(&mut self, timeout: Option<Duration>) {
        self.reader.set_wait_timeout(timeout);
    }

    /// Run one cycle, logging any failure instead of returning it.
    pub fn update(&mut self) {
        match self.try_update() {
            Ok(report) => {
                trace!(cycle = report.cycle, color = ?report.color, bodies = ?report.bodies, "Cycle complete");
            }
            Err(KinectError::Timeout { duration }) => {
                debug!(cycle = self.cycles, ?duration, "No frame arrived");
            }
            Err(e) => {
                error!(cycle = self.cycles, error = %e, "Acquisition cycle aborted");
            }
        }
    }

    /// Run one cycle and report what was delivered.
    ///
    /// Only streams the reader was opened with, that the frame carries and
    /// that have a callback are extracted. Color goes first, then bodies.
    pub fn try_update(&mut self) -> Result<CycleReport> {
        self.cycles += 1;
        let mut report = CycleReport { cycle: self.cycles, ..CycleReport::default() };

        self.reader.wait()?;
        let frame = self.reader.latest_frame()?;
        if frame.available() != frame.requested() {
            debug!(
                cycle = report.cycle,
                requested = %frame.requested(),
                available = %frame.available(),
                "Frame is missing requested streams"
            );
        }

        if let Some(callback) = self.color_callback.as_mut().filter(|_| frame.has(StreamKind::Color)) {
            match deliver_color(&frame, &mut self.color_buffer, callback) {
                Ok(source) => report.color = Some(source),
                Err(e) => isolate(self.policy, StreamKind::Color, e, &mut report)?,
            }
        }

        if let Some(callback) = self.body_callback.as_mut().filter(|_| frame.has(StreamKind::Body)) {
            match deliver_bodies(&frame, &mut self.bodies, callback) {
                Ok(count) => report.bodies = Some(count),
                Err(e) => isolate(self.policy, StreamKind::Body, e, &mut report)?,
            }
        }

        Ok(report)
    }
}

fn deliver_color<S: Sensor>(
    frame: &Frame<'_, S>,
    buffer: &mut Vec<Bgra>,
    callback: &mut ColorCallback,
) -> Result<PixelSource> {
    let color = frame.color_frame()?;
    let image = extract_color(&color, buffer)?;
    let source = image.source;
    callback(image);
    Ok(source)
}

fn deliver_bodies<S: Sensor>(
    frame: &Frame<'_, S>,
    bodies: &mut Vec<TrackedBody>,
    callback: &mut BodyCallback,
) -> Result<usize> {
    let body = frame.body_frame()?;
    let data = extract_bodies(&body, bodies)?;
    let count = data.len();
    callback(data);
    Ok(count)
}

fn isolate(
    policy: StreamFailurePolicy,
    stream: StreamKind,
    error: KinectError,
    report: &mut CycleReport,
) -> Result<()> {
    match policy {
        StreamFailurePolicy::AbortCycle => Err(error),
        StreamFailurePolicy::Isolate => {
            warn!(cycle = report.cycle, %stream, error = %error, "Stream skipped this cycle");
            report.failures.push((stream, error));
            Ok(())
        }
    }
}
