//! Tracked body output records

use super::joint::{CameraSpacePoint, JOINT_COUNT, JointType};
use bytemuck::{Pod, Zeroable};
use std::time::Duration;

/// A tracked skeleton, tagged with the body slot it came from.
///
/// The layout is shared with the C boundary: a `u32` slot index followed by
/// one `{x, y, z}` triple per joint type.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TrackedBody {
    pub index: u32,
    pub joints: [CameraSpacePoint; JOINT_COUNT],
}

impl TrackedBody {
    pub fn new(index: u32) -> Self {
        Self { index, joints: [CameraSpacePoint::default(); JOINT_COUNT] }
    }

    pub fn joint(&self, joint: JointType) -> CameraSpacePoint {
        self.joints[joint.index()]
    }
}

/// Frame timestamp relative to an arbitrary device epoch, in 100 ns ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativeTime(pub i64);

impl RelativeTime {
    pub const TICKS_PER_SECOND: i64 = 10_000_000;

    pub fn ticks(self) -> i64 {
        self.0
    }

    /// Convert to a duration. Negative timestamps saturate to zero.
    pub fn as_duration(self) -> Duration {
        let ticks = self.0.max(0) as u64;
        Duration::from_nanos(ticks.saturating_mul(100))
    }
}

/// Body payload handed to body callbacks.
///
/// `bodies` holds only tracked slots, in ascending slot order. The slice is
/// only valid for the duration of the callback.
#[derive(Debug, Clone, Copy)]
pub struct BodyFrameData<'a> {
    pub relative_time: Option<RelativeTime>,
    pub bodies: &'a [TrackedBody],
}

impl BodyFrameData<'_> {
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Find the body that came from a given slot.
    pub fn slot(&self, index: u32) -> Option<&TrackedBody> {
        self.bodies.iter().find(|body| body.index == index)
    }
}
