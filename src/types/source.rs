//! Stream selection flags for multi-source readers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of frame source types, using the device SDK's bit values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameSourceTypes(u32);

impl FrameSourceTypes {
    pub const NONE: Self = Self(0);
    pub const COLOR: Self = Self(0x1);
    pub const INFRARED: Self = Self(0x2);
    pub const LONG_EXPOSURE_INFRARED: Self = Self(0x4);
    pub const DEPTH: Self = Self(0x8);
    pub const BODY_INDEX: Self = Self(0x10);
    pub const BODY: Self = Self(0x20);
    pub const AUDIO: Self = Self(0x40);

    /// Build a flag set from raw bits. Unknown bits are kept as-is and passed
    /// through to the device untouched.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Get the raw bitmask.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check whether the flag for a single stream is set.
    pub const fn has(self, stream: StreamKind) -> bool {
        self.contains(stream.flag())
    }

    pub const fn with(self, stream: StreamKind) -> Self {
        Self(self.0 | stream.flag().0)
    }

    pub const fn without(self, stream: StreamKind) -> Self {
        Self(self.0 & !stream.flag().0)
    }

    /// Iterate the known streams present in this set, in bit order.
    pub fn streams(self) -> impl Iterator<Item = StreamKind> {
        StreamKind::ALL.into_iter().filter(move |kind| self.has(*kind))
    }
}

impl BitOr for FrameSourceTypes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FrameSourceTypes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<StreamKind> for FrameSourceTypes {
    fn from(kind: StreamKind) -> Self {
        kind.flag()
    }
}

impl FromIterator<StreamKind> for FrameSourceTypes {
    fn from_iter<I: IntoIterator<Item = StreamKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

impl fmt::Display for FrameSourceTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }

        let mut first = true;
        for kind in self.streams() {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{kind}")?;
            first = false;
        }

        let unknown = self.0 & !StreamKind::ALL.iter().fold(0, |acc, k| acc | k.flag().0);
        if unknown != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{unknown:#x}")?;
        }
        Ok(())
    }
}

/// A single sub-stream of a multi-source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Color,
    Infrared,
    LongExposureInfrared,
    Depth,
    BodyIndex,
    Body,
    Audio,
}

impl StreamKind {
    pub const ALL: [StreamKind; 7] = [
        StreamKind::Color,
        StreamKind::Infrared,
        StreamKind::LongExposureInfrared,
        StreamKind::Depth,
        StreamKind::BodyIndex,
        StreamKind::Body,
        StreamKind::Audio,
    ];

    pub const fn flag(self) -> FrameSourceTypes {
        match self {
            StreamKind::Color => FrameSourceTypes::COLOR,
            StreamKind::Infrared => FrameSourceTypes::INFRARED,
            StreamKind::LongExposureInfrared => FrameSourceTypes::LONG_EXPOSURE_INFRARED,
            StreamKind::Depth => FrameSourceTypes::DEPTH,
            StreamKind::BodyIndex => FrameSourceTypes::BODY_INDEX,
            StreamKind::Body => FrameSourceTypes::BODY,
            StreamKind::Audio => FrameSourceTypes::AUDIO,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            StreamKind::Color => "color",
            StreamKind::Infrared => "infrared",
            StreamKind::LongExposureInfrared => "long_exposure_infrared",
            StreamKind::Depth => "depth",
            StreamKind::BodyIndex => "body_index",
            StreamKind::Body => "body",
            StreamKind::Audio => "audio",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
