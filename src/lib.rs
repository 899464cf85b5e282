//! Safe, deterministic frame acquisition for Kinect v2 body and color streams.
//!
//! The device runtime hands out reference-counted interfaces, signals new
//! frames through an event and only ever keeps the latest frame. This crate
//! wraps that model into an acquisition cycle that cannot leak a reference
//! on any path.
//!
//! # Features
//!
//! - **Ownership**: every native reference lives in a move-only [`Handle`]
//! - **Bounded waits**: a stalled device times out instead of hanging the caller
//! - **Lazy sub-streams**: color and body frames are acquired only when requested
//! - **Zero-copy color**: BGRA frames are handed out straight from device memory
//! - **Streaming**: [`LiveFrames`] publishes the latest payloads to async consumers
//! - **C boundary**: the `kinect2_*` exports drive the same pipeline from C
//!
//! # Quick Start
//!
//! The device runtime is anything implementing [`native::KinectApi`].
//!
//! ```rust,no_run
//! use kinect2::{AcquisitionConfig, JointType, Kinect, native::KinectApi};
//!
//! fn run<A: KinectApi>(api: &A) -> kinect2::Result<()> {
//!     let config = AcquisitionConfig::from_yaml_str("streams: [body]\nwait_timeout_ms: 500")?;
//!     let mut kinect = Kinect::create(api, &config)?;
//!
//!     kinect.on_body(|data| {
//!         for body in data.bodies {
//!             println!("slot {}: head at {:?}", body.index, body.joint(JointType::Head));
//!         }
//!     });
//!
//!     loop {
//!         kinect.update();
//!     }
//! }
//! ```

// Core types and error handling
mod error;
pub mod handle;
pub mod types;

// Native interface and sensor-side wrappers
pub mod native;
pub mod session;
pub mod reader;
pub mod frame;
pub mod extract;

// Acquisition cycle and its surfaces
pub mod config;
pub mod pipeline;
pub mod driver;
pub mod live;
pub mod capi;

// Platform-specific modules
#[cfg(windows)]
pub mod windows;

// Core exports
pub use error::*;
pub use handle::{Handle, Release};
pub use types::*;

// Pipeline exports
pub use config::{AcquisitionConfig, StreamFailurePolicy};
pub use frame::{BodyFrame, ColorFrame, Frame};
pub use pipeline::{CycleReport, Kinect};
pub use reader::FrameSourceReader;
pub use session::Session;

// Streaming exports
pub use driver::{BodySnapshot, ColorSnapshot, FrameDriver};
pub use live::LiveFrames;

pub use capi::install_platform;
pub use native::WaitResult;

#[cfg(windows)]
pub use crate::windows::EventWaitable;
