//! Latest-frame streams over a running acquisition loop

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::AcquisitionConfig;
use crate::driver::{BodySnapshot, ColorSnapshot, FrameDriver};
use crate::error::Result;
use crate::native::{KinectApi, Sensor};
use crate::pipeline::Kinect;
use crate::types::FrameSourceTypes;

/// Live view of one sensor's body and color streams.
///
/// Holds only the latest payload of each stream. Values superseded before a
/// consumer looks at them are dropped. Dropping stops the acquisition loop.
pub struct LiveFrames {
    bodies: watch::Receiver<Option<Arc<BodySnapshot>>>,
    color: watch::Receiver<Option<Arc<ColorSnapshot>>>,
    flags: FrameSourceTypes,
    cancel: CancellationToken,
    task: Option<JoinHandle<u64>>,
}

impl LiveFrames {
    /// Open the sensor with `config` and start streaming.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect<A, S>(api: &A, config: &AcquisitionConfig) -> Result<Self>
    where
        A: KinectApi<Sensor = S>,
        S: Sensor + 'static,
        Kinect<S>: Send + 'static,
    {
        let kinect = Kinect::create(api, config)?;
        Ok(Self::start(kinect, config.max_consecutive_errors))
    }

    /// Start streaming from an already opened pipeline.
    pub fn start<S>(kinect: Kinect<S>, max_errors: u32) -> Self
    where
        S: Sensor + 'static,
        Kinect<S>: Send + 'static,
    {
        let flags = kinect.flags();
        let channels = FrameDriver::spawn(kinect, max_errors);
        info!(%flags, "Live frames started");

        Self {
            bodies: channels.bodies,
            color: channels.color,
            flags,
            cancel: channels.cancel,
            task: Some(channels.task),
        }
    }

    /// Body payloads as they are published.
    ///
    /// The current payload, if any, is yielded first. Ends when the loop stops.
    pub fn bodies(&self) -> impl Stream<Item = Arc<BodySnapshot>> + use<> {
        latest(self.bodies.clone())
    }

    /// Color images as they are published.
    pub fn color(&self) -> impl Stream<Item = Arc<ColorSnapshot>> + use<> {
        latest(self.color.clone())
    }

    pub fn latest_bodies(&self) -> Option<Arc<BodySnapshot>> {
        self.bodies.borrow().clone()
    }

    pub fn latest_color(&self) -> Option<Arc<ColorSnapshot>> {
        self.color.borrow().clone()
    }

    pub fn flags(&self) -> FrameSourceTypes {
        self.flags
    }

    /// Stop the loop and wait for it to release the sensor.
    ///
    /// Returns the number of cycles run.
    pub async fn shutdown(mut self) -> u64 {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => 0,
        }
    }
}

// Skip the initial empty value instead of ending on it.
fn latest<T>(rx: watch::Receiver<Option<Arc<T>>>) -> impl Stream<Item = Arc<T>> + 'static
where
    T: Send + Sync + 'static,
{
    WatchStream::new(rx)
        .skip_while(|opt| {
            let is_none = opt.is_none();
            async move { is_none }
        })
        .filter_map(|opt| async move { opt })
}

impl Drop for LiveFrames {
    fn drop(&mut self) {
        debug!("Dropping live frames");
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::mock::{FailPoint, MockBodies, MockColor, MockFrame, MockKinect, MockSlot};
    use crate::types::PixelSource;
    use std::time::Duration;
    use tokio::time::timeout;

    fn config(flags: FrameSourceTypes) -> AcquisitionConfig {
        AcquisitionConfig { wait_timeout_ms: Some(10), ..AcquisitionConfig::for_streams(flags) }
    }

    fn scene(time: i64) -> MockFrame {
        MockFrame::new()
            .with_color(MockColor::bgra(2, 2))
            .with_bodies(MockBodies::empty().with_slot(3, MockSlot::tracked(1.0)).at_time(time))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn streams_latest_bodies_and_color() -> anyhow::Result<()> {
        let _ = tracing_subscriber::fmt::try_init();
        let api = MockKinect::new();
        let live = LiveFrames::connect(&api, &config(FrameSourceTypes::COLOR | FrameSourceTypes::BODY))?;
        let mut bodies = Box::pin(live.bodies());
        let mut color = Box::pin(live.color());

        api.push_frame(scene(7));
        let body = timeout(Duration::from_secs(2), bodies.next()).await?.expect("body snapshot");
        assert_eq!(body.sequence, 1);
        assert_eq!(body.bodies.len(), 1);
        assert_eq!(body.bodies[0].index, 3);

        let image = timeout(Duration::from_secs(2), color.next()).await?.expect("color snapshot");
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(image.source, PixelSource::Direct);
        assert_eq!(image.image().byte_len(), 16);

        assert_eq!(live.latest_bodies().map(|b| b.relative_time), Some(body.relative_time));
        live.shutdown().await;
        assert!(api.ledger().is_balanced());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn nothing_is_yielded_before_the_first_frame() -> anyhow::Result<()> {
        let api = MockKinect::new();
        let live = LiveFrames::connect(&api, &config(FrameSourceTypes::BODY))?;
        let mut bodies = Box::pin(live.bodies());

        assert!(timeout(Duration::from_millis(50), bodies.next()).await.is_err());
        assert!(live.latest_bodies().is_none());
        assert!(live.latest_color().is_none());
        live.shutdown().await;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drop_stops_the_loop_and_releases_the_sensor() -> anyhow::Result<()> {
        let api = MockKinect::new();
        let live = LiveFrames::connect(&api, &config(FrameSourceTypes::BODY))?;
        let mut bodies = Box::pin(live.bodies());
        drop(live);

        assert!(timeout(Duration::from_secs(2), bodies.next()).await?.is_none());
        assert!(!api.is_sensor_open());
        assert!(api.ledger().is_balanced());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn persistent_errors_stop_the_loop() -> anyhow::Result<()> {
        let api = MockKinect::new();
        let config = AcquisitionConfig { max_consecutive_errors: 3, ..config(FrameSourceTypes::BODY) };
        let live = LiveFrames::connect(&api, &config)?;
        api.fail(FailPoint::EventData);

        let pusher = {
            let api = api.clone();
            tokio::spawn(async move {
                loop {
                    api.push_frame(scene(1));
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
        };

        let mut bodies = Box::pin(live.bodies());
        assert!(timeout(Duration::from_secs(5), bodies.next()).await?.is_none());
        pusher.abort();
        let cycles = live.shutdown().await;
        assert!(cycles >= 3);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn timeouts_do_not_count_as_errors() -> anyhow::Result<()> {
        let api = MockKinect::new();
        let config = AcquisitionConfig { max_consecutive_errors: 1, ..config(FrameSourceTypes::BODY) };
        let live = LiveFrames::connect(&api, &config)?;

        tokio::time::sleep(Duration::from_millis(100)).await;
        api.push_frame(scene(5));

        let mut bodies = Box::pin(live.bodies());
        let body = timeout(Duration::from_secs(2), bodies.next()).await?.expect("loop still running");
        assert_eq!(body.sequence, 1);
        live.shutdown().await;
        Ok(())
    }
}
