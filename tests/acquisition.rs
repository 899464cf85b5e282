//! End-to-end acquisition through the public API
//!
//! Requires the `mock` feature: `cargo test --features mock`.

#![cfg(feature = "mock")]

use futures::StreamExt;
use kinect2::native::mock::{MockBodies, MockColor, MockFrame, MockKinect, MockSlot};
use kinect2::{AcquisitionConfig, JointType, Kinect, LiveFrames, PixelSource, StreamFailurePolicy};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CONFIG: &str = "
streams: [color, body]
wait_timeout_ms: 50
stream_failure: isolate
max_consecutive_errors: 5
";

fn scene() -> MockFrame {
    MockFrame::new().with_color(MockColor::yuy2(6, 4)).with_bodies(
        MockBodies::empty()
            .with_slot(1, MockSlot::tracked(0.25))
            .with_slot(4, MockSlot::tracked(0.75))
            .with_slot(5, MockSlot::Untracked),
    )
}

#[test]
fn yaml_configured_pipeline_delivers_every_tracked_body() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let config = AcquisitionConfig::from_yaml_str(CONFIG)?;
    assert_eq!(config.stream_failure, StreamFailurePolicy::Isolate);

    let api = MockKinect::new();
    let mut kinect = Kinect::create(&api, &config)?;
    let heads = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&heads);
    kinect.on_body(move |data| {
        let mut heads = sink.lock().unwrap();
        heads.extend(data.bodies.iter().map(|b| (b.index, b.joint(JointType::Head))));
    });

    api.push_frame(scene());
    let report = kinect.try_update()?;
    assert_eq!(report.bodies, Some(2));
    assert_eq!(report.color, None);

    let heads = heads.lock().unwrap();
    let slots: Vec<u32> = heads.iter().map(|(slot, _)| *slot).collect();
    assert_eq!(slots, vec![1, 4]);
    assert_eq!(heads[1].1.x, 0.75);

    drop(kinect);
    assert!(api.ledger().is_balanced());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn live_frames_follow_the_latest_scene() -> anyhow::Result<()> {
    let config = AcquisitionConfig::from_yaml_str(CONFIG)?;
    let api = MockKinect::new();
    let live = LiveFrames::connect(&api, &config)?;
    let mut color = Box::pin(live.color());

    api.push_frame(scene());
    let image = tokio::time::timeout(Duration::from_secs(2), color.next())
        .await?
        .expect("color snapshot");
    assert_eq!(image.source, PixelSource::Converted);
    assert_eq!(image.pixels.len(), 24);

    live.shutdown().await;
    assert!(api.ledger().is_balanced());
    Ok(())
}
