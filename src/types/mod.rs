//! Core value types shared by the native layer, the extractors, and callers

pub mod body;
pub mod color;
pub mod joint;
pub mod source;

pub use body::{BodyFrameData, RelativeTime, TrackedBody};
pub use color::{Bgra, ColorImage, ColorImageFormat, PixelSource};
pub use joint::{BODY_COUNT, CameraSpacePoint, JOINT_COUNT, Joint, JointType, TrackingState};
pub use source::{FrameSourceTypes, StreamKind};
