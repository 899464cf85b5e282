//! Error types for sensor acquisition.
//!
//! Every native call that can fail reports an [`HResult`]. The pipeline maps
//! those codes onto [`KinectError`] variants that say *which* step failed, so
//! callers and logs never have to interpret raw codes.
//!
//! ## Error Categories
//!
//! - **Construction**: the sensor, session, or reader could not be set up.
//!   Creation fails outright and nothing is left held.
//! - **Per-cycle**: waiting, fetching, or extraction failed. The acquisition
//!   cycle is abandoned and the next one starts fresh.
//! - **Usage**: a sub-stream was requested that the reader was not opened for.
//!
//! Teardown failures never surface as errors; they are logged where they happen.
//!
//! ```rust
//! use kinect2::{HResult, KinectError};
//!
//! let error = KinectError::SensorNotFound { source: HResult::E_FAIL };
//! assert!(error.is_construction_error());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::types::{FrameSourceTypes, StreamKind};

/// Result type alias for acquisition operations.
pub type Result<T, E = KinectError> = std::result::Result<T, E>;

/// Result type returned by native interface calls.
pub type NativeResult<T> = std::result::Result<T, HResult>;

/// Failure code returned by a native call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[error("native call failed with HRESULT {0:#010x}")]
pub struct HResult(pub i32);

impl HResult {
    pub const E_FAIL: Self = Self(0x8000_4005_u32 as i32);
    pub const E_PENDING: Self = Self(0x8000_000A_u32 as i32);
    pub const E_POINTER: Self = Self(0x8000_4003_u32 as i32);
    pub const E_INVALIDARG: Self = Self(0x8007_0057_u32 as i32);
    pub const E_NOTIMPL: Self = Self(0x8000_4001_u32 as i32);

    pub fn code(self) -> i32 {
        self.0
    }
}

#[cfg(windows)]
impl From<windows_core::Error> for HResult {
    fn from(err: windows_core::Error) -> Self {
        HResult(err.code().0)
    }
}

/// Step of the latest-frame resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    EventData,
    FrameReference,
    AcquireFrame,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchStage::EventData => "event data",
            FetchStage::FrameReference => "frame reference",
            FetchStage::AcquireFrame => "frame acquisition",
        })
    }
}

/// Step of a sub-frame acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStage {
    Reference,
    Acquire,
}

impl fmt::Display for AcquireStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AcquireStage::Reference => "frame reference",
            AcquireStage::Acquire => "frame acquisition",
        })
    }
}

/// Main error type for acquisition operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum KinectError {
    #[error("No Kinect sensor found")]
    SensorNotFound {
        #[source]
        source: HResult,
    },

    #[error("Sensor open failed")]
    SensorOpenFailed {
        #[source]
        source: HResult,
    },

    #[error("Failed to open multi-source frame reader for {flags}")]
    ReaderOpenFailed {
        flags: FrameSourceTypes,
        #[source]
        source: HResult,
    },

    #[error("Failed to subscribe to multi-source frame arrival")]
    SubscribeFailed {
        #[source]
        source: HResult,
    },

    #[error("Waiting for frame arrival failed")]
    WaitFailed {
        #[source]
        source: HResult,
    },

    #[error("No frame arrived within {duration:?}")]
    Timeout { duration: Duration },

    #[error("Failed to fetch latest multi-source frame ({stage})")]
    FrameFetchFailed {
        stage: FetchStage,
        #[source]
        source: HResult,
    },

    #[error("The {stream} stream was not requested when the reader was opened")]
    StreamNotRequested { stream: StreamKind },

    #[error("The {stream} frame was already acquired from this multi-source frame")]
    StreamAlreadyAcquired { stream: StreamKind },

    #[error("This multi-source frame carries no {stream} data")]
    StreamUnavailable { stream: StreamKind },

    #[error("Failed to acquire color frame ({stage})")]
    ColorAcquireFailed {
        stage: AcquireStage,
        #[source]
        source: HResult,
    },

    #[error("Failed to acquire body frame ({stage})")]
    BodyAcquireFailed {
        stage: AcquireStage,
        #[source]
        source: HResult,
    },

    #[error("Body frame relative time unavailable")]
    TimeUnavailable {
        #[source]
        source: HResult,
    },

    #[error("Refreshing body data failed")]
    BodyRefreshFailed {
        #[source]
        source: HResult,
    },

    #[error("Reading tracking state of body slot {slot} failed")]
    TrackingStateFailed {
        slot: usize,
        #[source]
        source: HResult,
    },

    #[error("Cannot get joints of body slot {slot}")]
    JointFetchFailed {
        slot: usize,
        #[source]
        source: HResult,
    },

    #[error("Color frame description failed")]
    DescriptionFailed {
        #[source]
        source: HResult,
    },

    #[error("Color frame has invalid dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("Raw color buffer access failed")]
    BufferAccessFailed {
        #[source]
        source: HResult,
    },

    #[error("Raw color buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Color frame conversion copy failed")]
    ConversionFailed {
        #[source]
        source: HResult,
    },

    #[error("{resource} handle used after release")]
    HandleReleased { resource: &'static str },

    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl KinectError {
    /// Returns whether this error aborts creation of a session or reader.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            KinectError::SensorNotFound { .. }
                | KinectError::SensorOpenFailed { .. }
                | KinectError::ReaderOpenFailed { .. }
                | KinectError::SubscribeFailed { .. }
                | KinectError::Config { .. }
        )
    }

    /// Returns whether the next acquisition cycle may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            KinectError::Timeout { .. }
            | KinectError::WaitFailed { .. }
            | KinectError::StreamUnavailable { .. }
            | KinectError::FrameFetchFailed { .. }
            | KinectError::ColorAcquireFailed { .. }
            | KinectError::BodyAcquireFailed { .. }
            | KinectError::TimeUnavailable { .. }
            | KinectError::BodyRefreshFailed { .. }
            | KinectError::TrackingStateFailed { .. }
            | KinectError::JointFetchFailed { .. }
            | KinectError::DescriptionFailed { .. }
            | KinectError::InvalidDimensions { .. }
            | KinectError::BufferAccessFailed { .. }
            | KinectError::BufferSizeMismatch { .. }
            | KinectError::ConversionFailed { .. } => true,
            KinectError::SensorNotFound { .. }
            | KinectError::SensorOpenFailed { .. }
            | KinectError::ReaderOpenFailed { .. }
            | KinectError::SubscribeFailed { .. }
            | KinectError::StreamNotRequested { .. }
            | KinectError::StreamAlreadyAcquired { .. }
            | KinectError::HandleReleased { .. }
            | KinectError::Config { .. } => false,
        }
    }

    /// The sub-stream this error is confined to, if any.
    pub fn stream(&self) -> Option<StreamKind> {
        match self {
            KinectError::StreamNotRequested { stream }
            | KinectError::StreamAlreadyAcquired { stream }
            | KinectError::StreamUnavailable { stream } => Some(*stream),
            KinectError::ColorAcquireFailed { .. }
            | KinectError::DescriptionFailed { .. }
            | KinectError::InvalidDimensions { .. }
            | KinectError::BufferAccessFailed { .. }
            | KinectError::BufferSizeMismatch { .. }
            | KinectError::ConversionFailed { .. } => Some(StreamKind::Color),
            KinectError::BodyAcquireFailed { .. }
            | KinectError::TimeUnavailable { .. }
            | KinectError::BodyRefreshFailed { .. }
            | KinectError::TrackingStateFailed { .. }
            | KinectError::JointFetchFailed { .. } => Some(StreamKind::Body),
            _ => None,
        }
    }

    /// The native failure code behind this error, if one exists.
    pub fn hresult(&self) -> Option<HResult> {
        match self {
            KinectError::SensorNotFound { source }
            | KinectError::SensorOpenFailed { source }
            | KinectError::ReaderOpenFailed { source, .. }
            | KinectError::SubscribeFailed { source }
            | KinectError::WaitFailed { source }
            | KinectError::FrameFetchFailed { source, .. }
            | KinectError::ColorAcquireFailed { source, .. }
            | KinectError::BodyAcquireFailed { source, .. }
            | KinectError::TimeUnavailable { source }
            | KinectError::BodyRefreshFailed { source }
            | KinectError::TrackingStateFailed { source, .. }
            | KinectError::JointFetchFailed { source, .. }
            | KinectError::DescriptionFailed { source }
            | KinectError::BufferAccessFailed { source }
            | KinectError::ConversionFailed { source } => Some(*source),
            _ => None,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            KinectError::SensorNotFound { .. } => vec![
                "Check the sensor is plugged in and powered",
                "Verify the device runtime is installed",
            ],
            KinectError::SensorOpenFailed { .. } | KinectError::ReaderOpenFailed { .. } => vec![
                "Close other applications holding the sensor",
                "Reconnect the sensor and retry",
            ],
            KinectError::SubscribeFailed { .. } => vec!["Recreate the reader"],
            KinectError::Timeout { .. } => vec![
                "Check the sensor is still connected",
                "Increase the wait timeout",
            ],
            KinectError::StreamNotRequested { .. } => {
                vec!["Include the stream in the flags used to open the reader"]
            }
            KinectError::StreamAlreadyAcquired { .. } => {
                vec!["Acquire each sub-stream once per multi-source frame"]
            }
            KinectError::Config { .. } => vec!["Check the acquisition configuration file"],
            KinectError::HandleReleased { .. } => vec!["Do not use resources after teardown"],
            _ => vec!["Skip this cycle and retry on the next frame"],
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        KinectError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_error_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        KinectError::Config { reason: reason.into(), source: Some(source) }
    }
}
