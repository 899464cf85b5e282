//! Benchmarks for one acquisition cycle over the mock backend
//!
//! Measures the per-frame cost of:
//! - Body extraction with every slot tracked
//! - Zero-copy color pass-through at full HD
//! - Converted color into the reused buffer at full HD
//!
//! Platform: Cross-platform (mock device, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use kinect2::native::mock::{MockBodies, MockColor, MockFrame, MockKinect, MockSensor, MockSlot};
use kinect2::{AcquisitionConfig, BODY_COUNT, FrameSourceTypes, Kinect};
use std::hint::black_box;
use std::sync::Arc;

const WIDTH: i32 = 1920;
const HEIGHT: i32 = 1080;

fn pipeline(api: &MockKinect, flags: FrameSourceTypes) -> Kinect<MockSensor> {
    let config = AcquisitionConfig { wait_timeout_ms: Some(1000), ..AcquisitionConfig::for_streams(flags) };
    let mut kinect = Kinect::create(api, &config).expect("Failed to open mock pipeline");
    kinect.on_body(|data| {
        black_box(data.bodies);
    });
    kinect.on_color(|image| {
        black_box(image.pixels);
    });
    kinect
}

fn bench_body_cycle(c: &mut Criterion) {
    let api = MockKinect::new();
    let mut kinect = pipeline(&api, FrameSourceTypes::BODY);
    let bodies = (0..BODY_COUNT).fold(MockBodies::empty(), |bodies, slot| {
        bodies.with_slot(slot, MockSlot::tracked(slot as f32))
    });
    let frame = Arc::new(MockFrame::new().with_bodies(bodies));

    let mut group = c.benchmark_group("body_cycle");
    group.throughput(Throughput::Elements(BODY_COUNT as u64));
    group.bench_function("six_tracked_bodies", |b| {
        b.iter(|| {
            api.push_shared(Arc::clone(&frame));
            black_box(kinect.try_update().expect("cycle failed"))
        })
    });
    group.finish();
}

fn bench_color_cycle(c: &mut Criterion) {
    let bytes = (WIDTH * HEIGHT * 4) as u64;
    let mut group = c.benchmark_group("color_cycle");
    group.throughput(Throughput::Bytes(bytes));
    group.sample_size(20);

    let api = MockKinect::new();
    let mut kinect = pipeline(&api, FrameSourceTypes::COLOR);
    let direct = Arc::new(MockFrame::new().with_color(MockColor::bgra(WIDTH, HEIGHT)));
    group.bench_function("bgra_zero_copy", |b| {
        b.iter(|| {
            api.push_shared(Arc::clone(&direct));
            black_box(kinect.try_update().expect("cycle failed"))
        })
    });

    let converted = Arc::new(MockFrame::new().with_color(MockColor::yuy2(WIDTH, HEIGHT)));
    group.bench_function("yuy2_converted", |b| {
        b.iter(|| {
            api.push_shared(Arc::clone(&converted));
            black_box(kinect.try_update().expect("cycle failed"))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_body_cycle, bench_color_cycle);
criterion_main!(benches);
