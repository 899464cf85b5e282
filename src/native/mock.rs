//! In-memory implementation of the native interface
//!
//! [`MockKinect`] stands in for the device runtime in tests and benchmarks.
//! It keeps a ledger of every reference it hands out, lets a test fail any
//! native call site, and serves scripted frames with "latest wins" semantics.
//!
//! ```rust,ignore
//! use kinect2::native::mock::{MockBodies, MockColor, MockFrame, MockKinect, MockSlot};
//! use kinect2::{FrameSourceTypes, Kinect};
//!
//! let api = MockKinect::new();
//! let mut kinect = Kinect::open(&api, FrameSourceTypes::BODY).unwrap();
//! kinect.on_body(|data| assert_eq!(data.bodies.len(), 1));
//!
//! api.push_frame(MockFrame::new().with_bodies(MockBodies::empty().with_slot(2, MockSlot::tracked(0.5))));
//! kinect.update();
//!
//! drop(kinect);
//! assert!(api.ledger().is_balanced());
//! ```

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{WaitResult, Waitable};
use crate::error::{HResult, NativeResult};
use crate::handle::{Handle, Release};
use crate::types::{
    BODY_COUNT, CameraSpacePoint, ColorImageFormat, FrameSourceTypes, JOINT_COUNT, Joint,
    JointType, TrackingState,
};

/// Kinds of reference-counted resources the mock hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Sensor,
    Reader,
    EventArgs,
    FrameReference,
    MultiFrame,
    ColorReference,
    ColorFrame,
    FrameDescription,
    BodyReference,
    BodyFrame,
    Body,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Sensor,
        ResourceKind::Reader,
        ResourceKind::EventArgs,
        ResourceKind::FrameReference,
        ResourceKind::MultiFrame,
        ResourceKind::ColorReference,
        ResourceKind::ColorFrame,
        ResourceKind::FrameDescription,
        ResourceKind::BodyReference,
        ResourceKind::BodyFrame,
        ResourceKind::Body,
    ];

    fn name(self) -> &'static str {
        match self {
            ResourceKind::Sensor => "sensor",
            ResourceKind::Reader => "reader",
            ResourceKind::EventArgs => "event_args",
            ResourceKind::FrameReference => "frame_reference",
            ResourceKind::MultiFrame => "multi_frame",
            ResourceKind::ColorReference => "color_reference",
            ResourceKind::ColorFrame => "color_frame",
            ResourceKind::FrameDescription => "frame_description",
            ResourceKind::BodyReference => "body_reference",
            ResourceKind::BodyFrame => "body_frame",
            ResourceKind::Body => "body",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Native call sites a test can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    DefaultSensor,
    OpenSensor,
    CloseSensor,
    OpenReader,
    Subscribe,
    Unsubscribe,
    Wait,
    EventData,
    FrameReference,
    AcquireFrame,
    ColorReference,
    AcquireColorFrame,
    FrameDescription,
    ColorFormat,
    RawBuffer,
    ConvertedCopy,
    BodyReference,
    AcquireBodyFrame,
    RelativeTime,
    RefreshBodies,
    TrackingState,
    Joints,
}

/// Acquire and release totals for one resource kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCount {
    pub acquired: u64,
    pub released: u64,
}

/// Snapshot of the mock's reference accounting.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    counts: HashMap<ResourceKind, ResourceCount>,
    live: usize,
    double_releases: u64,
}

impl Ledger {
    pub fn count(&self, kind: ResourceKind) -> ResourceCount {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    pub fn acquired(&self, kind: ResourceKind) -> u64 {
        self.count(kind).acquired
    }

    pub fn released(&self, kind: ResourceKind) -> u64 {
        self.count(kind).released
    }

    /// References handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.live
    }

    pub fn double_releases(&self) -> u64 {
        self.double_releases
    }

    pub fn total_acquired(&self) -> u64 {
        self.counts.values().map(|c| c.acquired).sum()
    }

    /// Every reference was released exactly once.
    pub fn is_balanced(&self) -> bool {
        self.live == 0
            && self.double_releases == 0
            && self.counts.values().all(|c| c.acquired == c.released)
    }
}

/// Contents of one body slot.
#[derive(Debug, Clone, PartialEq)]
pub enum MockSlot {
    Empty,
    Untracked,
    Tracked(Box<[CameraSpacePoint; JOINT_COUNT]>),
}

impl MockSlot {
    /// A tracked body whose joint `j` sits at `(base, base + 0.01 * j, -base)`.
    pub fn tracked(base: f32) -> Self {
        let mut joints = [CameraSpacePoint::default(); JOINT_COUNT];
        for joint in JointType::ALL {
            let offset = joint.index() as f32 * 0.01;
            joints[joint.index()] = CameraSpacePoint::new(base, base + offset, -base);
        }
        MockSlot::Tracked(Box::new(joints))
    }
}

/// Body stream contents of one scripted frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MockBodies {
    pub slots: [MockSlot; BODY_COUNT],
    pub relative_time: i64,
}

impl MockBodies {
    pub fn empty() -> Self {
        Self { slots: std::array::from_fn(|_| MockSlot::Empty), relative_time: 0 }
    }

    pub fn with_slot(mut self, index: usize, slot: MockSlot) -> Self {
        if let Some(existing) = self.slots.get_mut(index) {
            *existing = slot;
        }
        self
    }

    pub fn at_time(mut self, ticks: i64) -> Self {
        self.relative_time = ticks;
        self
    }
}

/// Color stream contents of one scripted frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MockColor {
    pub width: i32,
    pub height: i32,
    pub format: ColorImageFormat,
    /// Bytes served by the raw buffer accessor.
    pub raw: Vec<u8>,
    /// BGRA bytes served by the converting copy.
    pub converted: Vec<u8>,
}

impl MockColor {
    /// A frame whose native format is already BGRA.
    pub fn bgra(width: i32, height: i32) -> Self {
        let pixels = Self::pattern(width, height);
        Self { width, height, format: ColorImageFormat::Bgra, raw: pixels.clone(), converted: pixels }
    }

    /// A frame delivered as packed YUY2, two bytes per pixel.
    pub fn yuy2(width: i32, height: i32) -> Self {
        let count = (width.max(0) * height.max(0)) as usize;
        let raw = (0..count * 2).map(|i| (i % 251) as u8).collect();
        Self {
            width,
            height,
            format: ColorImageFormat::Yuy2,
            raw,
            converted: Self::pattern(width, height),
        }
    }

    /// BGRA bytes where pixel `i` is `(i, i >> 8, i >> 16, 255)`.
    pub fn pattern(width: i32, height: i32) -> Vec<u8> {
        let count = (width.max(0) * height.max(0)) as usize;
        let mut bytes = Vec::with_capacity(count * 4);
        for i in 0..count {
            bytes.extend_from_slice(&[i as u8, (i >> 8) as u8, (i >> 16) as u8, 255]);
        }
        bytes
    }
}

/// One scripted multi-source frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockFrame {
    pub color: Option<MockColor>,
    pub bodies: Option<MockBodies>,
}

impl MockFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color(mut self, color: MockColor) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_bodies(mut self, bodies: MockBodies) -> Self {
        self.bodies = Some(bodies);
        self
    }
}

#[derive(Debug)]
struct MockState {
    sensor_present: bool,
    sensor_open: bool,
    failures: HashSet<FailPoint>,
    latest: Option<Arc<MockFrame>>,
    subscribers: HashMap<u64, Sender<()>>,
    live: HashMap<u64, ResourceKind>,
    counts: HashMap<ResourceKind, ResourceCount>,
    double_releases: u64,
    next_id: u64,
    calls: Vec<String>,
}

impl MockState {
    fn check(&mut self, call: &str, point: FailPoint) -> NativeResult<()> {
        self.calls.push(call.to_string());
        if self.failures.contains(&point) { Err(HResult::E_FAIL) } else { Ok(()) }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn register(&mut self, kind: ResourceKind) -> u64 {
        let id = self.next_id();
        self.live.insert(id, kind);
        self.counts.entry(kind).or_default().acquired += 1;
        id
    }

    fn release(&mut self, id: u64, kind: ResourceKind) {
        self.calls.push(format!("release {kind}"));
        match self.live.remove(&id) {
            Some(kind) => self.counts.entry(kind).or_default().released += 1,
            None => self.double_releases += 1,
        }
    }
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One native reference registered in the ledger.
#[derive(Debug)]
struct Resource {
    id: u64,
    kind: ResourceKind,
    state: Shared,
}

impl Resource {
    fn new(state: &Shared, kind: ResourceKind) -> Self {
        let id = lock(state).register(kind);
        Self { id, kind, state: Arc::clone(state) }
    }

    fn check(&self, call: &str, point: FailPoint) -> NativeResult<()> {
        lock(&self.state).check(call, point)
    }

    fn release(self) {
        lock(&self.state).release(self.id, self.kind);
    }
}

/// Mock device runtime. Clones share the same device state.
#[derive(Debug, Clone)]
pub struct MockKinect {
    state: Shared,
}

impl Default for MockKinect {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKinect {
    /// A runtime with one sensor attached and no frame yet.
    pub fn new() -> Self {
        let state = MockState {
            sensor_present: true,
            sensor_open: false,
            failures: HashSet::new(),
            latest: None,
            subscribers: HashMap::new(),
            live: HashMap::new(),
            counts: HashMap::new(),
            double_releases: 0,
            next_id: 0,
            calls: Vec::new(),
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// A runtime with no sensor attached.
    pub fn without_sensor() -> Self {
        let api = Self::new();
        lock(&api.state).sensor_present = false;
        api
    }

    /// Make a call site fail until [`MockKinect::recover`] is called.
    pub fn fail(&self, point: FailPoint) {
        lock(&self.state).failures.insert(point);
    }

    pub fn recover(&self, point: FailPoint) {
        lock(&self.state).failures.remove(&point);
    }

    pub fn recover_all(&self) {
        lock(&self.state).failures.clear();
    }

    /// Replace the latest frame and signal every subscriber. Frames pushed
    /// before the previous one was fetched are dropped.
    pub fn push_frame(&self, frame: MockFrame) {
        self.push_shared(Arc::new(frame));
    }

    /// [`MockKinect::push_frame`] without copying the payload.
    pub fn push_shared(&self, frame: Arc<MockFrame>) {
        let mut state = lock(&self.state);
        state.latest = Some(frame);
        for sender in state.subscribers.values() {
            // A full channel already holds a pending signal.
            let _ = sender.try_send(());
        }
    }

    pub fn is_sensor_open(&self) -> bool {
        lock(&self.state).sensor_open
    }

    /// Number of live arrival-event subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.state).subscribers.len()
    }

    pub fn ledger(&self) -> Ledger {
        let state = lock(&self.state);
        Ledger {
            counts: state.counts.clone(),
            live: state.live.len(),
            double_releases: state.double_releases,
        }
    }

    /// Native calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }
}

impl super::KinectApi for MockKinect {
    type Sensor = MockSensor;

    fn default_sensor(&self) -> NativeResult<MockSensor> {
        let mut state = lock(&self.state);
        state.check("default_sensor", FailPoint::DefaultSensor)?;
        if !state.sensor_present {
            return Err(HResult::E_FAIL);
        }
        drop(state);
        Ok(MockSensor { res: Resource::new(&self.state, ResourceKind::Sensor) })
    }
}

#[derive(Debug)]
pub struct MockSensor {
    res: Resource,
}

impl Release for MockSensor {
    fn release(self) {
        self.res.release();
    }
}

impl super::Sensor for MockSensor {
    type Reader = MockReader;

    fn open(&self) -> NativeResult<()> {
        let mut state = lock(&self.res.state);
        state.check("sensor.open", FailPoint::OpenSensor)?;
        state.sensor_open = true;
        Ok(())
    }

    fn close(&self) -> NativeResult<()> {
        let mut state = lock(&self.res.state);
        state.check("sensor.close", FailPoint::CloseSensor)?;
        state.sensor_open = false;
        Ok(())
    }

    fn open_multi_source_frame_reader(&self, flags: FrameSourceTypes) -> NativeResult<MockReader> {
        let mut state = lock(&self.res.state);
        state.check("sensor.open_multi_source_frame_reader", FailPoint::OpenReader)?;
        if !state.sensor_open || flags.is_empty() {
            return Err(HResult::E_FAIL);
        }
        drop(state);
        Ok(MockReader { res: Resource::new(&self.res.state, ResourceKind::Reader), flags })
    }
}

#[derive(Debug)]
pub struct MockReader {
    res: Resource,
    flags: FrameSourceTypes,
}

impl MockReader {
    pub fn flags(&self) -> FrameSourceTypes {
        self.flags
    }
}

impl Release for MockReader {
    fn release(self) {
        self.res.release();
    }
}

impl super::MultiSourceFrameReader for MockReader {
    type Waitable = MockWaitable;
    type EventArgs = MockEventArgs;

    fn subscribe_frame_arrived(&self) -> NativeResult<MockWaitable> {
        let mut state = lock(&self.res.state);
        state.check("reader.subscribe_frame_arrived", FailPoint::Subscribe)?;
        let id = state.next_id();
        let (sender, receiver) = bounded(1);
        state.subscribers.insert(id, sender);
        Ok(MockWaitable { id, receiver, state: Arc::clone(&self.res.state) })
    }

    fn unsubscribe_frame_arrived(&self, waitable: &MockWaitable) -> NativeResult<()> {
        let mut state = lock(&self.res.state);
        state.check("reader.unsubscribe_frame_arrived", FailPoint::Unsubscribe)?;
        state.subscribers.remove(&waitable.id);
        Ok(())
    }

    fn frame_arrived_event_data(&self, waitable: &MockWaitable) -> NativeResult<MockEventArgs> {
        let mut state = lock(&self.res.state);
        state.check("reader.frame_arrived_event_data", FailPoint::EventData)?;
        if !state.subscribers.contains_key(&waitable.id) {
            return Err(HResult::E_INVALIDARG);
        }
        let frame = state.latest.clone().ok_or(HResult::E_PENDING)?;
        drop(state);
        Ok(MockEventArgs { res: Resource::new(&self.res.state, ResourceKind::EventArgs), frame })
    }
}

/// Arrival event of one subscription. Signals coalesce like an auto-reset event.
#[derive(Debug)]
pub struct MockWaitable {
    id: u64,
    receiver: Receiver<()>,
    state: Shared,
}

impl Waitable for MockWaitable {
    fn wait(&self, timeout: Option<Duration>) -> NativeResult<WaitResult> {
        lock(&self.state).check("waitable.wait", FailPoint::Wait)?;

        match timeout {
            None => self.receiver.recv().map(|()| WaitResult::Signaled).map_err(|_| HResult::E_FAIL),
            Some(timeout) => match self.receiver.recv_timeout(timeout) {
                Ok(()) => Ok(WaitResult::Signaled),
                Err(RecvTimeoutError::Timeout) => Ok(WaitResult::TimedOut),
                Err(RecvTimeoutError::Disconnected) => Err(HResult::E_FAIL),
            },
        }
    }
}

#[derive(Debug)]
pub struct MockEventArgs {
    res: Resource,
    frame: Arc<MockFrame>,
}

impl Release for MockEventArgs {
    fn release(self) {
        self.res.release();
    }
}

impl super::MultiSourceFrameArrivedEventArgs for MockEventArgs {
    type Reference = MockFrameReference;

    fn frame_reference(&self) -> NativeResult<MockFrameReference> {
        self.res.check("event_args.frame_reference", FailPoint::FrameReference)?;
        Ok(MockFrameReference {
            res: Resource::new(&self.res.state, ResourceKind::FrameReference),
            frame: Arc::clone(&self.frame),
        })
    }
}

#[derive(Debug)]
pub struct MockFrameReference {
    res: Resource,
    frame: Arc<MockFrame>,
}

impl Release for MockFrameReference {
    fn release(self) {
        self.res.release();
    }
}

impl super::MultiSourceFrameReference for MockFrameReference {
    type Frame = MockMultiFrame;

    fn acquire_frame(&self) -> NativeResult<MockMultiFrame> {
        self.res.check("frame_reference.acquire_frame", FailPoint::AcquireFrame)?;
        Ok(MockMultiFrame {
            res: Resource::new(&self.res.state, ResourceKind::MultiFrame),
            frame: Arc::clone(&self.frame),
        })
    }
}

#[derive(Debug)]
pub struct MockMultiFrame {
    res: Resource,
    frame: Arc<MockFrame>,
}

impl Release for MockMultiFrame {
    fn release(self) {
        self.res.release();
    }
}

impl super::MultiSourceFrame for MockMultiFrame {
    type ColorReference = MockColorReference;
    type BodyReference = MockBodyReference;

    fn color_frame_reference(&self) -> NativeResult<MockColorReference> {
        self.res.check("multi_frame.color_frame_reference", FailPoint::ColorReference)?;
        Ok(MockColorReference {
            res: Resource::new(&self.res.state, ResourceKind::ColorReference),
            frame: Arc::clone(&self.frame),
        })
    }

    fn body_frame_reference(&self) -> NativeResult<MockBodyReference> {
        self.res.check("multi_frame.body_frame_reference", FailPoint::BodyReference)?;
        Ok(MockBodyReference {
            res: Resource::new(&self.res.state, ResourceKind::BodyReference),
            frame: Arc::clone(&self.frame),
        })
    }

    fn available_sources(&self) -> FrameSourceTypes {
        let mut sources = FrameSourceTypes::NONE;
        if self.frame.color.is_some() {
            sources |= FrameSourceTypes::COLOR;
        }
        if self.frame.bodies.is_some() {
            sources |= FrameSourceTypes::BODY;
        }
        sources
    }
}

#[derive(Debug)]
pub struct MockColorReference {
    res: Resource,
    frame: Arc<MockFrame>,
}

impl Release for MockColorReference {
    fn release(self) {
        self.res.release();
    }
}

impl super::ColorFrameReference for MockColorReference {
    type Frame = MockColorFrame;

    fn acquire_frame(&self) -> NativeResult<MockColorFrame> {
        self.res.check("color_reference.acquire_frame", FailPoint::AcquireColorFrame)?;
        if self.frame.color.is_none() {
            return Err(HResult::E_PENDING);
        }
        Ok(MockColorFrame {
            res: Resource::new(&self.res.state, ResourceKind::ColorFrame),
            frame: Arc::clone(&self.frame),
        })
    }
}

#[derive(Debug)]
pub struct MockColorFrame {
    res: Resource,
    frame: Arc<MockFrame>,
}

impl MockColorFrame {
    fn color(&self) -> NativeResult<&MockColor> {
        self.frame.color.as_ref().ok_or(HResult::E_PENDING)
    }
}

impl Release for MockColorFrame {
    fn release(self) {
        self.res.release();
    }
}

impl super::ColorFrame for MockColorFrame {
    type Description = MockFrameDescription;

    fn frame_description(&self) -> NativeResult<MockFrameDescription> {
        self.res.check("color_frame.frame_description", FailPoint::FrameDescription)?;
        let color = self.color()?;
        Ok(MockFrameDescription {
            res: Resource::new(&self.res.state, ResourceKind::FrameDescription),
            width: color.width,
            height: color.height,
        })
    }

    fn raw_color_image_format(&self) -> NativeResult<ColorImageFormat> {
        self.res.check("color_frame.raw_color_image_format", FailPoint::ColorFormat)?;
        Ok(self.color()?.format)
    }

    fn raw_underlying_buffer(&self) -> NativeResult<&[u8]> {
        self.res.check("color_frame.raw_underlying_buffer", FailPoint::RawBuffer)?;
        Ok(&self.color()?.raw)
    }

    fn copy_converted_frame_data(
        &self,
        dst: &mut [u8],
        format: ColorImageFormat,
    ) -> NativeResult<()> {
        self.res.check("color_frame.copy_converted_frame_data", FailPoint::ConvertedCopy)?;
        if format != ColorImageFormat::Bgra {
            return Err(HResult::E_NOTIMPL);
        }
        let color = self.color()?;
        if dst.len() != color.converted.len() {
            return Err(HResult::E_INVALIDARG);
        }
        dst.copy_from_slice(&color.converted);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockFrameDescription {
    res: Resource,
    width: i32,
    height: i32,
}

impl Release for MockFrameDescription {
    fn release(self) {
        self.res.release();
    }
}

impl super::FrameDescription for MockFrameDescription {
    fn width(&self) -> NativeResult<i32> {
        Ok(self.width)
    }

    fn height(&self) -> NativeResult<i32> {
        Ok(self.height)
    }
}

#[derive(Debug)]
pub struct MockBodyReference {
    res: Resource,
    frame: Arc<MockFrame>,
}

impl Release for MockBodyReference {
    fn release(self) {
        self.res.release();
    }
}

impl super::BodyFrameReference for MockBodyReference {
    type Frame = MockBodyFrame;

    fn acquire_frame(&self) -> NativeResult<MockBodyFrame> {
        self.res.check("body_reference.acquire_frame", FailPoint::AcquireBodyFrame)?;
        if self.frame.bodies.is_none() {
            return Err(HResult::E_PENDING);
        }
        Ok(MockBodyFrame {
            res: Resource::new(&self.res.state, ResourceKind::BodyFrame),
            frame: Arc::clone(&self.frame),
        })
    }
}

#[derive(Debug)]
pub struct MockBodyFrame {
    res: Resource,
    frame: Arc<MockFrame>,
}

impl MockBodyFrame {
    fn bodies(&self) -> NativeResult<&MockBodies> {
        self.frame.bodies.as_ref().ok_or(HResult::E_PENDING)
    }
}

impl Release for MockBodyFrame {
    fn release(self) {
        self.res.release();
    }
}

impl super::BodyFrame for MockBodyFrame {
    type Body = MockBody;

    fn relative_time(&self) -> NativeResult<i64> {
        self.res.check("body_frame.relative_time", FailPoint::RelativeTime)?;
        Ok(self.bodies()?.relative_time)
    }

    fn get_and_refresh_body_data(&self, bodies: &mut [Handle<MockBody>]) -> NativeResult<()> {
        self.res.check("body_frame.get_and_refresh_body_data", FailPoint::RefreshBodies)?;
        let scripted = self.bodies()?;
        if bodies.len() != BODY_COUNT {
            return Err(HResult::E_INVALIDARG);
        }

        for (slot, handle) in scripted.slots.iter().zip(bodies.iter_mut()) {
            match slot {
                MockSlot::Empty => handle.release(),
                MockSlot::Untracked | MockSlot::Tracked(_) => handle.acquire(MockBody {
                    res: Resource::new(&self.res.state, ResourceKind::Body),
                    slot: slot.clone(),
                }),
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockBody {
    res: Resource,
    slot: MockSlot,
}

impl Release for MockBody {
    fn release(self) {
        self.res.release();
    }
}

impl super::Body for MockBody {
    fn is_tracked(&self) -> NativeResult<bool> {
        self.res.check("body.is_tracked", FailPoint::TrackingState)?;
        Ok(matches!(self.slot, MockSlot::Tracked(_)))
    }

    fn joints(&self, joints: &mut [Joint; JOINT_COUNT]) -> NativeResult<()> {
        self.res.check("body.joints", FailPoint::Joints)?;
        let MockSlot::Tracked(positions) = &self.slot else {
            return Err(HResult::E_FAIL);
        };

        for (joint_type, (joint, position)) in
            JointType::ALL.iter().zip(joints.iter_mut().zip(positions.iter()))
        {
            *joint = Joint {
                joint_type: *joint_type,
                position: *position,
                tracking_state: TrackingState::Tracked,
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{KinectApi, MultiSourceFrameReader, Sensor};

    #[test]
    fn missing_sensor_fails_discovery() {
        let api = MockKinect::without_sensor();
        assert_eq!(api.default_sensor().map(|_| ()), Err(HResult::E_FAIL));
        assert_eq!(api.ledger().total_acquired(), 0);
    }

    #[test]
    fn ledger_balances_after_release() {
        let api = MockKinect::new();
        let sensor = api.default_sensor().unwrap();
        assert_eq!(api.ledger().outstanding(), 1);

        sensor.release();
        let ledger = api.ledger();
        assert!(ledger.is_balanced());
        assert_eq!(ledger.count(ResourceKind::Sensor), ResourceCount { acquired: 1, released: 1 });
    }

    #[test]
    fn reader_requires_open_sensor() {
        let api = MockKinect::new();
        let sensor = api.default_sensor().unwrap();
        assert!(sensor.open_multi_source_frame_reader(FrameSourceTypes::COLOR).is_err());

        sensor.open().unwrap();
        let reader = sensor.open_multi_source_frame_reader(FrameSourceTypes::COLOR).unwrap();
        assert_eq!(reader.flags(), FrameSourceTypes::COLOR);

        reader.release();
        sensor.release();
    }

    #[test]
    fn repeated_pushes_coalesce_into_one_signal() {
        let api = MockKinect::new();
        let sensor = api.default_sensor().unwrap();
        sensor.open().unwrap();
        let reader = sensor.open_multi_source_frame_reader(FrameSourceTypes::BODY).unwrap();
        let waitable = reader.subscribe_frame_arrived().unwrap();

        api.push_frame(MockFrame::new());
        api.push_frame(MockFrame::new());

        let timeout = Some(Duration::from_millis(10));
        assert_eq!(waitable.wait(timeout), Ok(WaitResult::Signaled));
        assert_eq!(waitable.wait(timeout), Ok(WaitResult::TimedOut));

        reader.unsubscribe_frame_arrived(&waitable).unwrap();
        assert_eq!(api.subscriber_count(), 0);
        reader.release();
        sensor.release();
        assert!(api.ledger().is_balanced());
    }

    #[test]
    fn fail_points_persist_until_recovered() {
        let api = MockKinect::new();
        api.fail(FailPoint::DefaultSensor);
        assert!(api.default_sensor().is_err());
        assert!(api.default_sensor().is_err());

        api.recover(FailPoint::DefaultSensor);
        let sensor = api.default_sensor().unwrap();
        sensor.release();
    }

    #[test]
    fn pattern_encodes_pixel_index() {
        let bytes = MockColor::pattern(300, 1);
        assert_eq!(bytes.len(), 1200);
        assert_eq!(&bytes[4 * 257..4 * 258], &[1, 1, 0, 255]);
    }
}
