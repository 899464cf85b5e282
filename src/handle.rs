//! Single-owner wrapper for reference-counted native resources
//!
//! Every native interface pointer the device hands out carries one reference
//! that must be released exactly once. [`Handle`] owns that reference: it can
//! be moved but never copied, and it releases on drop whatever it still holds.
//!
//! ```compile_fail
//! use kinect2::handle::{Handle, Release};
//!
//! struct Raw;
//! impl Release for Raw {
//!     fn release(self) {}
//! }
//!
//! let a = Handle::new(Raw);
//! let b = a.clone();
//! ```

use std::fmt;

/// The native release operation of a reference-counted resource.
///
/// Consuming `self` makes the raw reference unusable after release.
pub trait Release {
    fn release(self);
}

/// Owner of at most one native reference.
pub struct Handle<T: Release> {
    raw: Option<T>,
}

impl<T: Release> Handle<T> {
    /// Take ownership of a reference returned by a producing call.
    pub fn new(raw: T) -> Self {
        Self { raw: Some(raw) }
    }

    /// A handle that holds nothing.
    pub const fn empty() -> Self {
        Self { raw: None }
    }

    pub fn is_null(&self) -> bool {
        self.raw.is_none()
    }

    /// Non-owning access to the held reference.
    pub fn get(&self) -> Option<&T> {
        self.raw.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.raw.as_mut()
    }

    /// Store a newly produced reference, releasing any reference held before.
    pub fn acquire(&mut self, raw: T) {
        self.release();
        self.raw = Some(raw);
    }

    /// Release the held reference now. Calling this on an empty handle does
    /// nothing, so a released handle is still safe to drop.
    pub fn release(&mut self) {
        if let Some(raw) = self.raw.take() {
            raw.release();
        }
    }

    /// Give up ownership without releasing.
    pub fn into_raw(mut self) -> Option<T> {
        self.raw.take()
    }
}

impl<T: Release> Default for Handle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Release> Drop for Handle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Release> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &std::any::type_name::<T>())
            .field("held", &self.raw.is_some())
            .finish()
    }
}
