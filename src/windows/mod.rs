//! Win32 primitives behind the device runtime
//!
//! The device SDK signals frame arrival through a plain Win32 event. Waiting
//! on it goes straight to `WaitForSingleObject` / `WaitForMultipleObjects`,
//! so a native backend only has to wrap the raw handle it is given.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kinect2::native::{Waitable, WaitResult};
//! use kinect2::windows::EventWaitable;
//! use std::time::Duration;
//!
//! // `raw` is the WAITABLE_HANDLE returned when subscribing to frame arrival.
//! let event = unsafe { EventWaitable::from_raw(raw) };
//! match event.wait(Some(Duration::from_millis(100)))? {
//!     WaitResult::Signaled => { /* fetch the latest frame */ }
//!     WaitResult::TimedOut => { /* device idle */ }
//! }
//! ```

mod event;

pub use event::EventWaitable;
