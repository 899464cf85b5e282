//! Acquisition settings loaded from YAML

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{KinectError, Result};
use crate::types::{FrameSourceTypes, StreamKind};

/// What a cycle does when one requested sub-stream fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFailurePolicy {
    /// Abort the whole cycle on the first failure.
    #[default]
    AbortCycle,
    /// Log the failure and still deliver the other sub-stream.
    Isolate,
}

/// Settings for one acquisition pipeline.
///
/// ```yaml
/// streams: [color, body]
/// wait_timeout_ms: 1000     # null waits indefinitely
/// stream_failure: isolate
/// max_consecutive_errors: 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionConfig {
    pub streams: Vec<StreamKind>,
    pub wait_timeout_ms: Option<u64>,
    pub stream_failure: StreamFailurePolicy,
    pub max_consecutive_errors: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            streams: vec![StreamKind::Color, StreamKind::Body],
            wait_timeout_ms: Some(Self::DEFAULT_WAIT_TIMEOUT_MS),
            stream_failure: StreamFailurePolicy::AbortCycle,
            max_consecutive_errors: Self::DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

impl AcquisitionConfig {
    pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 1000;
    pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;

    /// Default settings reading the known streams in `flags`.
    ///
    /// Bits without a [`StreamKind`] have no config form and are dropped; use
    /// [`Kinect::open`](crate::Kinect::open) to pass them to the device.
    pub fn for_streams(flags: FrameSourceTypes) -> Self {
        Self { streams: flags.streams().collect(), ..Self::default() }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| {
            KinectError::config_error_with_source("failed to parse acquisition config", Box::new(e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            KinectError::config_error_with_source(
                format!("failed to read {}", path.display()),
                Box::new(e),
            )
        })?;
        debug!(path = %path.display(), "Loaded acquisition config");
        Self::from_yaml_str(&yaml)
    }

    /// Reject settings no reader can run with.
    pub fn validate(&self) -> Result<()> {
        if self.streams.is_empty() {
            return Err(KinectError::config_error("at least one stream must be selected"));
        }
        if self.wait_timeout_ms == Some(0) {
            return Err(KinectError::config_error(
                "wait_timeout_ms must be positive, or null to wait indefinitely",
            ));
        }
        if self.max_consecutive_errors == 0 {
            return Err(KinectError::config_error("max_consecutive_errors must be at least 1"));
        }
        Ok(())
    }

    /// Stream flags the reader is opened with.
    pub fn flags(&self) -> FrameSourceTypes {
        self.streams.iter().copied().collect()
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_read_color_and_body() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.flags(), FrameSourceTypes::COLOR | FrameSourceTypes::BODY);
        assert_eq!(config.wait_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(config.stream_failure, StreamFailurePolicy::AbortCycle);
        config.validate().unwrap();
    }

    #[test]
    fn parses_partial_yaml() {
        let config = AcquisitionConfig::from_yaml_str("streams: [body]\nstream_failure: isolate\n")
            .unwrap();
        assert_eq!(config.flags(), FrameSourceTypes::BODY);
        assert_eq!(config.stream_failure, StreamFailurePolicy::Isolate);
        assert_eq!(config.wait_timeout_ms, Some(1000));
    }

    #[test]
    fn null_timeout_waits_indefinitely() {
        let config = AcquisitionConfig::from_yaml_str("wait_timeout_ms: null").unwrap();
        assert_eq!(config.wait_timeout(), None);
    }

    #[test]
    fn rejects_empty_streams_and_zero_timeout() {
        for yaml in ["streams: []", "wait_timeout_ms: 0", "max_consecutive_errors: 0"] {
            let err = AcquisitionConfig::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, KinectError::Config { .. }), "{yaml} should be rejected");
        }
    }

    #[test]
    fn rejects_unknown_streams_and_fields() {
        assert!(AcquisitionConfig::from_yaml_str("streams: [thermal]").is_err());
        assert!(AcquisitionConfig::from_yaml_str("fps: 30").is_err());
    }

    #[test]
    fn for_streams_keeps_flags() {
        let flags = FrameSourceTypes::COLOR | FrameSourceTypes::DEPTH;
        assert_eq!(AcquisitionConfig::for_streams(flags).flags(), flags);
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("kinect2-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "streams: [color]\nwait_timeout_ms: 250\n").unwrap();

        let config = AcquisitionConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.flags(), FrameSourceTypes::COLOR);
        assert_eq!(config.wait_timeout(), Some(Duration::from_millis(250)));

        assert!(AcquisitionConfig::from_path(&path).is_err());
    }
}
