//! Multi-source frame and its lazily acquired color and body sub-frames

use std::cell::Cell;
use std::marker::PhantomData;
use tracing::trace;

use crate::error::{AcquireStage, KinectError, NativeResult, Result};
use crate::handle::Handle;
use crate::native::{
    BodyFrame as _, BodyFrameOf, BodyFrameReference, BodyOf, ColorFrame as _, ColorFrameOf,
    ColorFrameReference, FrameDescription, MultiFrameOf, MultiSourceFrame, Sensor,
};
use crate::types::{BODY_COUNT, ColorImageFormat, FrameSourceTypes, RelativeTime, StreamKind};

/// Fixed-size body slot array refreshed from a body frame.
pub type BodySlots<S> = [Handle<BodyOf<S>>; BODY_COUNT];

/// Slot array with every slot empty.
pub fn empty_slots<S: Sensor>() -> BodySlots<S> {
    std::array::from_fn(|_| Handle::empty())
}

/// Streams a frame can hand out sub-frames for.
const SUB_STREAMS: [StreamKind; 2] = [StreamKind::Color, StreamKind::Body];

/// Frame acquired for one arrival event.
///
/// Borrows the reader it came from, so it is gone before the next wait.
/// Each sub-frame can be acquired at most once, and only for streams the
/// reader was opened with and the frame carries.
pub struct Frame<'r, S: Sensor> {
    frame: Handle<MultiFrameOf<S>>,
    requested: FrameSourceTypes,
    available: FrameSourceTypes,
    acquired: Cell<FrameSourceTypes>,
    _reader: PhantomData<&'r mut ()>,
}

impl<'r, S: Sensor> Frame<'r, S> {
    pub(crate) fn new(frame: MultiFrameOf<S>, flags: FrameSourceTypes) -> Self {
        let requested = SUB_STREAMS.into_iter().filter(|s| flags.has(*s)).collect();
        let carried = frame.available_sources();
        let available = SUB_STREAMS
            .into_iter()
            .filter(|s| flags.has(*s) && carried.has(*s))
            .collect();
        Self {
            frame: Handle::new(frame),
            requested,
            available,
            acquired: Cell::new(FrameSourceTypes::NONE),
            _reader: PhantomData,
        }
    }

    /// Sub-streams this frame can hand out.
    pub fn available(&self) -> FrameSourceTypes {
        self.available
    }

    /// Sub-streams the reader was opened with, whether or not this frame carries them.
    pub fn requested(&self) -> FrameSourceTypes {
        self.requested
    }

    /// Whether `stream` can still be acquired from this frame.
    pub fn has(&self, stream: StreamKind) -> bool {
        self.available.has(stream) && !self.acquired.get().has(stream)
    }

    /// Resolve and acquire the color sub-frame.
    pub fn color_frame(&self) -> Result<ColorFrame<'_, S>> {
        self.claim(StreamKind::Color)?;
        let frame = self.native()?;

        let reference = Handle::new(frame.color_frame_reference().map_err(|source| {
            KinectError::ColorAcquireFailed { stage: AcquireStage::Reference, source }
        })?);
        let color = reference
            .get()
            .ok_or(KinectError::HandleReleased { resource: "color frame reference" })?
            .acquire_frame()
            .map_err(|source| KinectError::ColorAcquireFailed {
                stage: AcquireStage::Acquire,
                source,
            })?;

        self.mark(StreamKind::Color);
        trace!("Acquired color frame");
        Ok(ColorFrame { frame: Handle::new(color), _frame: PhantomData })
    }

    /// Resolve and acquire the body sub-frame.
    pub fn body_frame(&self) -> Result<BodyFrame<'_, S>> {
        self.claim(StreamKind::Body)?;
        let frame = self.native()?;

        let reference = Handle::new(frame.body_frame_reference().map_err(|source| {
            KinectError::BodyAcquireFailed { stage: AcquireStage::Reference, source }
        })?);
        let body = reference
            .get()
            .ok_or(KinectError::HandleReleased { resource: "body frame reference" })?
            .acquire_frame()
            .map_err(|source| KinectError::BodyAcquireFailed {
                stage: AcquireStage::Acquire,
                source,
            })?;

        self.mark(StreamKind::Body);
        trace!("Acquired body frame");
        Ok(BodyFrame { frame: Handle::new(body), _frame: PhantomData })
    }

    fn native(&self) -> Result<&MultiFrameOf<S>> {
        self.frame.get().ok_or(KinectError::HandleReleased { resource: "multi-source frame" })
    }

    fn claim(&self, stream: StreamKind) -> Result<()> {
        if !self.requested.has(stream) {
            return Err(KinectError::StreamNotRequested { stream });
        }
        if !self.available.has(stream) {
            return Err(KinectError::StreamUnavailable { stream });
        }
        if self.acquired.get().has(stream) {
            return Err(KinectError::StreamAlreadyAcquired { stream });
        }
        Ok(())
    }

    fn mark(&self, stream: StreamKind) {
        self.acquired.set(self.acquired.get().with(stream));
    }
}

/// Acquired color sub-frame.
pub struct ColorFrame<'f, S: Sensor> {
    frame: Handle<ColorFrameOf<S>>,
    _frame: PhantomData<&'f ()>,
}

impl<S: Sensor> ColorFrame<'_, S> {
    /// Width and height from the frame description.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let description = Handle::new(
            self.native()?
                .frame_description()
                .map_err(|source| KinectError::DescriptionFailed { source })?,
        );
        let description = description
            .get()
            .ok_or(KinectError::HandleReleased { resource: "frame description" })?;

        let width = description.width().map_err(|source| KinectError::DescriptionFailed { source })?;
        let height =
            description.height().map_err(|source| KinectError::DescriptionFailed { source })?;

        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(KinectError::InvalidDimensions { width, height }),
        }
    }

    /// Pixel format the device delivered this frame in.
    pub fn raw_format(&self) -> NativeResult<ColorImageFormat> {
        self.frame.get().map_or(Ok(ColorImageFormat::None), |f| f.raw_color_image_format())
    }

    /// Device-owned pixel bytes, valid while this frame is held.
    pub fn raw_buffer(&self) -> Result<&[u8]> {
        self.native()?
            .raw_underlying_buffer()
            .map_err(|source| KinectError::BufferAccessFailed { source })
    }

    /// Convert into `dst`, which must hold exactly one BGRA frame.
    pub fn copy_converted(&self, dst: &mut [u8]) -> Result<()> {
        self.native()?
            .copy_converted_frame_data(dst, ColorImageFormat::TARGET)
            .map_err(|source| KinectError::ConversionFailed { source })
    }

    fn native(&self) -> Result<&ColorFrameOf<S>> {
        self.frame.get().ok_or(KinectError::HandleReleased { resource: "color frame" })
    }
}

/// Acquired body sub-frame.
pub struct BodyFrame<'f, S: Sensor> {
    frame: Handle<BodyFrameOf<S>>,
    _frame: PhantomData<&'f ()>,
}

impl<S: Sensor> BodyFrame<'_, S> {
    /// Relative timestamp of the frame.
    pub fn time(&self) -> Result<RelativeTime> {
        self.native()?
            .relative_time()
            .map(RelativeTime)
            .map_err(|source| KinectError::TimeUnavailable { source })
    }

    /// Refresh every body slot from this frame.
    pub fn refresh(&self, slots: &mut BodySlots<S>) -> Result<()> {
        self.native()?
            .get_and_refresh_body_data(slots)
            .map_err(|source| KinectError::BodyRefreshFailed { source })
    }

    fn native(&self) -> Result<&BodyFrameOf<S>> {
        self.frame.get().ok_or(KinectError::HandleReleased { resource: "body frame" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::mock::{
        FailPoint, MockBodies, MockColor, MockFrame, MockKinect, MockSensor, MockSlot,
        ResourceKind,
    };
    use crate::reader::FrameSourceReader;
    use crate::session::Session;
    use std::sync::Arc;

    fn reader(api: &MockKinect, flags: FrameSourceTypes) -> FrameSourceReader<MockSensor> {
        let session = Arc::new(Session::open(api).unwrap());
        FrameSourceReader::open(session, flags).unwrap()
    }

    fn both() -> MockFrame {
        MockFrame::new()
            .with_color(MockColor::bgra(4, 2))
            .with_bodies(MockBodies::empty().with_slot(1, MockSlot::tracked(1.0)).at_time(42))
    }

    #[test]
    fn both_sub_frames_from_one_frame() {
        let api = MockKinect::new();
        let mut reader = reader(&api, FrameSourceTypes::COLOR | FrameSourceTypes::BODY);
        api.push_frame(both());

        let frame = reader.latest_frame().unwrap();
        let color = frame.color_frame().unwrap();
        let body = frame.body_frame().unwrap();

        assert_eq!(color.dimensions().unwrap(), (4, 2));
        assert_eq!(body.time().unwrap(), RelativeTime(42));
        assert!(!frame.has(StreamKind::Color));
        assert!(!frame.has(StreamKind::Body));
    }

    #[test]
    fn unrequested_stream_is_refused() {
        let api = MockKinect::new();
        let mut reader = reader(&api, FrameSourceTypes::BODY);
        api.push_frame(both());

        let frame = reader.latest_frame().unwrap();
        assert_eq!(frame.available(), FrameSourceTypes::BODY);
        let err = frame.color_frame().err().unwrap();
        assert!(matches!(err, KinectError::StreamNotRequested { stream: StreamKind::Color }));
        assert_eq!(api.ledger().acquired(ResourceKind::ColorReference), 0);
    }

    #[test]
    fn frame_reports_only_carried_streams() {
        let api = MockKinect::new();
        let mut reader = reader(&api, FrameSourceTypes::COLOR | FrameSourceTypes::BODY);
        api.push_frame(MockFrame::new().with_bodies(MockBodies::empty().at_time(7)));

        let frame = reader.latest_frame().unwrap();
        assert_eq!(frame.requested(), FrameSourceTypes::COLOR | FrameSourceTypes::BODY);
        assert_eq!(frame.available(), FrameSourceTypes::BODY);
        assert!(!frame.has(StreamKind::Color));
        assert!(frame.has(StreamKind::Body));

        let err = frame.color_frame().err().unwrap();
        assert!(matches!(err, KinectError::StreamUnavailable { stream: StreamKind::Color }));
        assert_eq!(api.ledger().acquired(ResourceKind::ColorReference), 0);
        assert_eq!(frame.body_frame().unwrap().time().unwrap(), RelativeTime(7));
    }

    #[test]
    fn second_acquisition_is_refused() {
        let api = MockKinect::new();
        let mut reader = reader(&api, FrameSourceTypes::BODY);
        api.push_frame(both());

        let frame = reader.latest_frame().unwrap();
        let _body = frame.body_frame().unwrap();
        let err = frame.body_frame().err().unwrap();
        assert!(matches!(err, KinectError::StreamAlreadyAcquired { stream: StreamKind::Body }));
    }

    #[test]
    fn failure_in_one_stream_leaves_the_other_usable() {
        let api = MockKinect::new();
        let mut reader = reader(&api, FrameSourceTypes::COLOR | FrameSourceTypes::BODY);
        api.push_frame(both());
        api.fail(FailPoint::AcquireColorFrame);

        let frame = reader.latest_frame().unwrap();
        let err = frame.color_frame().err().unwrap();
        assert!(matches!(
            err,
            KinectError::ColorAcquireFailed { stage: AcquireStage::Acquire, .. }
        ));
        assert!(frame.has(StreamKind::Color));
        assert!(frame.body_frame().is_ok());

        drop(frame);
        drop(reader);
        assert!(api.ledger().is_balanced());
    }

    #[test]
    fn missing_time_is_reported() {
        let api = MockKinect::new();
        let mut reader = reader(&api, FrameSourceTypes::BODY);
        api.push_frame(both());
        api.fail(FailPoint::RelativeTime);

        let frame = reader.latest_frame().unwrap();
        let body = frame.body_frame().unwrap();
        assert!(matches!(body.time(), Err(KinectError::TimeUnavailable { .. })));
    }

    #[test]
    fn negative_dimensions_are_rejected() {
        let api = MockKinect::new();
        let mut reader = reader(&api, FrameSourceTypes::COLOR);
        let mut color = MockColor::bgra(0, 0);
        color.width = -1;
        color.height = 1080;
        api.push_frame(MockFrame::new().with_color(color));

        let frame = reader.latest_frame().unwrap();
        let color = frame.color_frame().unwrap();
        assert!(matches!(
            color.dimensions(),
            Err(KinectError::InvalidDimensions { width: -1, height: 1080 })
        ));
    }
}
