use tracing::{trace, warn};

use crate::error::{KinectError, Result};
use crate::frame::{BodyFrame, empty_slots};
use crate::handle::Handle;
use crate::native::{Body, Sensor};
use crate::types::{BodyFrameData, JOINT_COUNT, Joint, TrackedBody};

/// Extract every tracked body of `frame` into `out`.
///
/// `out` is cleared first and then holds only tracked bodies in ascending
/// slot order. A refresh failure fails the whole extraction. A missing
/// timestamp does not; it is reported as `None`.
pub fn extract_bodies<'o, S: Sensor>(
    frame: &BodyFrame<'_, S>,
    out: &'o mut Vec<TrackedBody>,
) -> Result<BodyFrameData<'o>> {
    let relative_time = match frame.time() {
        Ok(time) => Some(time),
        Err(e) => {
            warn!(error = %e, "Body frame has no relative time");
            None
        }
    };

    let mut slots = empty_slots::<S>();
    frame.refresh(&mut slots)?;
    compact_slots(&slots, out)?;

    trace!(tracked = out.len(), "Extracted bodies");
    Ok(BodyFrameData { relative_time, bodies: out.as_slice() })
}

/// Copy the joints of every tracked body in `slots` into `out`, tagged with
/// the slot index.
pub fn compact_slots<B: Body>(slots: &[Handle<B>], out: &mut Vec<TrackedBody>) -> Result<()> {
    out.clear();
    let mut joints = [Joint::default(); JOINT_COUNT];

    for (slot, body) in slots.iter().enumerate().filter_map(|(i, h)| h.get().map(|b| (i, b))) {
        let tracked = body
            .is_tracked()
            .map_err(|source| KinectError::TrackingStateFailed { slot, source })?;
        if !tracked {
            continue;
        }

        body.joints(&mut joints).map_err(|source| KinectError::JointFetchFailed { slot, source })?;

        let mut record = TrackedBody::new(slot as u32);
        for (dst, joint) in record.joints.iter_mut().zip(joints.iter()) {
            *dst = joint.position;
        }
        out.push(record);
    }
    Ok(())
}
