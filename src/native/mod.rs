//! Native device interface consumed by the pipeline
//!
//! Each trait mirrors one interface of the device SDK. Resources returned by
//! producing calls carry one native reference and implement [`Release`]; the
//! pipeline wraps every one of them in a [`Handle`] as soon as it is produced.
//!
//! # Resource chain
//!
//! ```text
//! KinectApi ─▶ Sensor ─▶ MultiSourceFrameReader ─▶ EventArgs ─▶ FrameReference ─▶ MultiSourceFrame
//!                                   │                                                  ├─▶ ColorFrameReference ─▶ ColorFrame ─▶ FrameDescription
//!                                   └─▶ Waitable                                       └─▶ BodyFrameReference  ─▶ BodyFrame  ─▶ Body
//! ```
//!
//! The [`mock`] backend implements the whole chain in memory for tests.

use std::time::{Duration, Instant};

use crate::error::NativeResult;
use crate::handle::{Handle, Release};
use crate::types::{ColorImageFormat, FrameSourceTypes, JOINT_COUNT, Joint};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// Result of waiting on an arrival event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Signaled,
    TimedOut,
}

/// A handle some native event can be waited on through.
pub trait Waitable {
    /// Block until the event signals, or `timeout` elapses. `None` waits forever.
    fn wait(&self, timeout: Option<Duration>) -> NativeResult<WaitResult>;

    /// Block until every listed event has signaled.
    ///
    /// The default waits on each event in turn against one shared deadline,
    /// which gives AND semantics for auto-reset events.
    fn wait_all(waitables: &[&Self], timeout: Option<Duration>) -> NativeResult<WaitResult>
    where
        Self: Sized,
    {
        let deadline = timeout.map(|t| Instant::now() + t);

        for waitable in waitables {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if waitable.wait(remaining)? == WaitResult::TimedOut {
                return Ok(WaitResult::TimedOut);
            }
        }
        Ok(WaitResult::Signaled)
    }
}

/// Entry point of the device runtime.
pub trait KinectApi {
    type Sensor: Sensor;

    fn default_sensor(&self) -> NativeResult<Self::Sensor>;
}

pub trait Sensor: Release {
    type Reader: MultiSourceFrameReader;

    fn open(&self) -> NativeResult<()>;
    fn close(&self) -> NativeResult<()>;
    fn open_multi_source_frame_reader(&self, flags: FrameSourceTypes)
    -> NativeResult<Self::Reader>;
}

pub trait MultiSourceFrameReader: Release {
    type Waitable: Waitable;
    type EventArgs: MultiSourceFrameArrivedEventArgs;

    fn subscribe_frame_arrived(&self) -> NativeResult<Self::Waitable>;
    fn unsubscribe_frame_arrived(&self, waitable: &Self::Waitable) -> NativeResult<()>;
    fn frame_arrived_event_data(&self, waitable: &Self::Waitable)
    -> NativeResult<Self::EventArgs>;
}

pub trait MultiSourceFrameArrivedEventArgs: Release {
    type Reference: MultiSourceFrameReference;

    fn frame_reference(&self) -> NativeResult<Self::Reference>;
}

pub trait MultiSourceFrameReference: Release {
    type Frame: MultiSourceFrame;

    fn acquire_frame(&self) -> NativeResult<Self::Frame>;
}

pub trait MultiSourceFrame: Release {
    type ColorReference: ColorFrameReference;
    type BodyReference: BodyFrameReference;

    fn color_frame_reference(&self) -> NativeResult<Self::ColorReference>;
    fn body_frame_reference(&self) -> NativeResult<Self::BodyReference>;

    /// Sub-streams this frame carries a payload for.
    ///
    /// Runtimes that only learn this on acquisition report every sub-stream
    /// and fail the sub-frame acquisition instead.
    fn available_sources(&self) -> FrameSourceTypes {
        FrameSourceTypes::COLOR | FrameSourceTypes::BODY
    }
}

pub trait ColorFrameReference: Release {
    type Frame: ColorFrame;

    fn acquire_frame(&self) -> NativeResult<Self::Frame>;
}

pub trait ColorFrame: Release {
    type Description: FrameDescription;

    fn frame_description(&self) -> NativeResult<Self::Description>;
    fn raw_color_image_format(&self) -> NativeResult<ColorImageFormat>;

    /// Device-owned pixel memory, valid while this frame is held.
    fn raw_underlying_buffer(&self) -> NativeResult<&[u8]>;

    /// Convert into `dst`, which must be exactly one frame in `format`.
    fn copy_converted_frame_data(&self, dst: &mut [u8], format: ColorImageFormat)
    -> NativeResult<()>;
}

pub trait FrameDescription: Release {
    fn width(&self) -> NativeResult<i32>;
    fn height(&self) -> NativeResult<i32>;
}

pub trait BodyFrameReference: Release {
    type Frame: BodyFrame;

    fn acquire_frame(&self) -> NativeResult<Self::Frame>;
}

pub trait BodyFrame: Release {
    type Body: Body;

    fn relative_time(&self) -> NativeResult<i64>;

    /// Fill `bodies` with one reference per occupied slot; slots without a
    /// body are left empty.
    fn get_and_refresh_body_data(&self, bodies: &mut [Handle<Self::Body>]) -> NativeResult<()>;
}

pub trait Body: Release {
    fn is_tracked(&self) -> NativeResult<bool>;
    fn joints(&self, joints: &mut [Joint; JOINT_COUNT]) -> NativeResult<()>;
}

pub type ReaderOf<S> = <S as Sensor>::Reader;
pub type WaitableOf<S> = <ReaderOf<S> as MultiSourceFrameReader>::Waitable;
pub type EventArgsOf<S> = <ReaderOf<S> as MultiSourceFrameReader>::EventArgs;
pub type FrameReferenceOf<S> = <EventArgsOf<S> as MultiSourceFrameArrivedEventArgs>::Reference;
pub type MultiFrameOf<S> = <FrameReferenceOf<S> as MultiSourceFrameReference>::Frame;
pub type ColorReferenceOf<S> = <MultiFrameOf<S> as MultiSourceFrame>::ColorReference;
pub type ColorFrameOf<S> = <ColorReferenceOf<S> as ColorFrameReference>::Frame;
pub type DescriptionOf<S> = <ColorFrameOf<S> as ColorFrame>::Description;
pub type BodyReferenceOf<S> = <MultiFrameOf<S> as MultiSourceFrame>::BodyReference;
pub type BodyFrameOf<S> = <BodyReferenceOf<S> as BodyFrameReference>::Frame;
pub type BodyOf<S> = <BodyFrameOf<S> as BodyFrame>::Body;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HResult;
    use std::cell::Cell;

    struct Scripted {
        results: Vec<WaitResult>,
        calls: Cell<usize>,
    }

    impl Waitable for Scripted {
        fn wait(&self, _timeout: Option<Duration>) -> NativeResult<WaitResult> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            self.results.get(call).copied().ok_or(HResult::E_FAIL)
        }
    }

    #[test]
    fn wait_all_requires_every_event() {
        let a = Scripted { results: vec![WaitResult::Signaled], calls: Cell::new(0) };
        let b = Scripted { results: vec![WaitResult::Signaled], calls: Cell::new(0) };

        let result = Scripted::wait_all(&[&a, &b], None);
        assert_eq!(result, Ok(WaitResult::Signaled));
        assert_eq!(a.calls.get(), 1);
        assert_eq!(b.calls.get(), 1);
    }

    #[test]
    fn wait_all_stops_at_first_timeout() {
        let a = Scripted { results: vec![WaitResult::TimedOut], calls: Cell::new(0) };
        let b = Scripted { results: vec![WaitResult::Signaled], calls: Cell::new(0) };

        let result = Scripted::wait_all(&[&a, &b], Some(Duration::from_millis(1)));
        assert_eq!(result, Ok(WaitResult::TimedOut));
        assert_eq!(b.calls.get(), 0);
    }

    #[test]
    fn wait_all_propagates_failures() {
        let a = Scripted { results: vec![], calls: Cell::new(0) };
        assert_eq!(Scripted::wait_all(&[&a], None), Err(HResult::E_FAIL));
    }
}
