//! Conversion of acquired sub-frames into caller-facing payloads

mod body;
mod color;

pub use body::{compact_slots, extract_bodies};
pub use color::extract_color;
