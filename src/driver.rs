//! Driver runs the acquisition cycle on a blocking task and publishes the
//! latest payloads

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::error::KinectError;
use crate::native::Sensor;
use crate::pipeline::Kinect;
use crate::types::{Bgra, ColorImage, PixelSource, RelativeTime, StreamKind, TrackedBody};

/// Owned copy of one delivered body payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BodySnapshot {
    /// Body deliveries so far, starting at 1.
    pub sequence: u64,
    pub relative_time: Option<RelativeTime>,
    pub bodies: Vec<TrackedBody>,
}

/// Owned copy of one delivered color image.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorSnapshot {
    /// Color deliveries so far, starting at 1.
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Bgra>,
    pub source: PixelSource,
}

impl ColorSnapshot {
    /// Borrow as a [`ColorImage`].
    pub fn image(&self) -> ColorImage<'_> {
        ColorImage { width: self.width, height: self.height, pixels: &self.pixels, source: self.source }
    }
}

/// Receivers and control surface of a spawned driver.
pub struct DriverChannels {
    /// Latest body payload, `None` before the first delivery. The sender
    /// closes when the loop ends.
    pub bodies: watch::Receiver<Option<Arc<BodySnapshot>>>,
    /// Latest color image, `None` before the first delivery.
    pub color: watch::Receiver<Option<Arc<ColorSnapshot>>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Resolves to the number of cycles run once the loop ends.
    pub task: JoinHandle<u64>,
}

/// Spawns the acquisition loop for one [`Kinect`].
pub struct FrameDriver;

impl FrameDriver {
    /// Wait bound applied when the pipeline would otherwise wait forever, so
    /// cancellation is observed.
    pub const POLL_TIMEOUT: Duration = Duration::from_millis(1000);

    /// Take over `kinect` and run cycles until cancelled or until
    /// `max_errors` consecutive cycles fail.
    ///
    /// Replaces any registered callbacks. Timeouts do not count as errors.
    /// Must be called from within a tokio runtime.
    pub fn spawn<S>(mut kinect: Kinect<S>, max_errors: u32) -> DriverChannels
    where
        S: Sensor + 'static,
        Kinect<S>: Send + 'static,
    {
        let (body_tx, body_rx) = watch::channel(None);
        let (color_tx, color_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        if kinect.wait_timeout().is_none() {
            debug!(timeout = ?Self::POLL_TIMEOUT, "Bounding indefinite wait for the driver");
            kinect.set_wait_timeout(Some(Self::POLL_TIMEOUT));
        }

        let flags = kinect.flags();
        if flags.has(StreamKind::Body) {
            let mut sequence = 0;
            kinect.on_body(move |data| {
                sequence += 1;
                body_tx.send_replace(Some(Arc::new(BodySnapshot {
                    sequence,
                    relative_time: data.relative_time,
                    bodies: data.bodies.to_vec(),
                })));
            });
        }
        if flags.has(StreamKind::Color) {
            let mut sequence = 0;
            kinect.on_color(move |image| {
                sequence += 1;
                color_tx.send_replace(Some(Arc::new(ColorSnapshot {
                    sequence,
                    width: image.width,
                    height: image.height,
                    pixels: image.pixels.to_vec(),
                    source: image.source,
                })));
            });
        }

        let runtime = RuntimeHandle::current();
        let cancel_loop = cancel.clone();
        let task = tokio::task::spawn_blocking(move || {
            Self::acquisition_loop(kinect, max_errors.max(1), cancel_loop, runtime)
        });

        DriverChannels { bodies: body_rx, color: color_rx, cancel, task }
    }

    fn acquisition_loop<S: Sensor>(
        mut kinect: Kinect<S>,
        max_errors: u32,
        cancel: CancellationToken,
        runtime: RuntimeHandle,
    ) -> u64 {
        info!(flags = %kinect.flags(), "Acquisition loop started");
        let mut error_count = 0u32;

        loop {
            if cancel.is_cancelled() {
                info!("Acquisition loop cancelled");
                break;
            }

            match kinect.try_update() {
                Ok(report) => {
                    error_count = 0;
                    trace!(cycle = report.cycle, bodies = ?report.bodies, color = ?report.color, "Cycle published");
                }
                Err(KinectError::Timeout { .. }) => {
                    trace!(cycle = kinect.cycles(), "No frame within wait timeout");
                }
                Err(e) => {
                    error_count += 1;
                    error!(cycle = kinect.cycles(), error = %e, "Cycle failed ({}/{})", error_count, max_errors);

                    if error_count >= max_errors {
                        error!("Too many consecutive acquisition errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 20ms, 40ms, 80ms, ...
                    let backoff = Duration::from_millis(20 * (1 << error_count.min(5)));
                    let cancelled = runtime.block_on(async {
                        tokio::select! {
                            _ = cancel.cancelled() => true,
                            _ = tokio::time::sleep(backoff) => false,
                        }
                    });
                    if cancelled {
                        info!("Acquisition loop cancelled during backoff");
                        break;
                    }
                }
            }
        }

        let cycles = kinect.cycles();
        // Dropping the pipeline drops both senders, which ends every stream.
        drop(kinect);
        info!(cycles, "Acquisition loop ended");
        cycles
    }
}
