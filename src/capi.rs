//! C boundary over the acquisition pipeline
//!
//! The exported functions match the native plugin interface: create an
//! instance for a set of stream flags, register plain function callbacks,
//! call update once per frame and release the instance when done.
//!
//! The device runtime is not linked here. The embedding process installs
//! one with [`install_platform`] before the first `kinect2_init`.
//!
//! Every export carries a `kinect2_` prefix. Bindings written against the
//! unprefixed `init`, `release`, `update`, `body_callback` and
//! `color_callback` symbols must be updated to the prefixed names; the
//! signatures are otherwise unchanged.
//!
//! ```c
//! kinect2_instance *k = kinect2_init(KINECT2_COLOR | KINECT2_BODY);
//! if (k) {
//!     kinect2_body_callback(k, on_bodies);
//!     kinect2_color_callback(k, on_color);
//!     while (running) kinect2_update(k);
//!     kinect2_release(k);
//! }
//! ```

use std::ffi::{c_int, c_uint};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, error, warn};

use crate::error::{HResult, KinectError, Result};
use crate::native::{KinectApi, Sensor};
use crate::pipeline::{BodyCallback, ColorCallback, Kinect};
use crate::types::{Bgra, FrameSourceTypes, TrackedBody};

/// Body record as seen from C: `{ unsigned index; float joint[25][3]; }`.
pub type CBody = TrackedBody;

/// Color image as seen from C: `{ int width, height; bgra *data; }`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CColorImage {
    pub width: c_int,
    pub height: c_int,
    pub data: *const Bgra,
}

pub type CBodyCallback = Option<unsafe extern "C" fn(data: *const CBody, size: c_uint)>;
pub type CColorCallback = Option<unsafe extern "C" fn(image: CColorImage)>;

/// Sensor-independent view of a pipeline.
trait Acquisition: Send {
    fn update(&mut self);
    fn set_body_callback(&mut self, callback: Option<BodyCallback>);
    fn set_color_callback(&mut self, callback: Option<ColorCallback>);
}

impl<S: Sensor> Acquisition for Kinect<S>
where
    Kinect<S>: Send,
{
    fn update(&mut self) {
        Kinect::update(self);
    }

    fn set_body_callback(&mut self, callback: Option<BodyCallback>) {
        Kinect::set_body_callback(self, callback);
    }

    fn set_color_callback(&mut self, callback: Option<ColorCallback>) {
        Kinect::set_color_callback(self, callback);
    }
}

type Factory = Box<dyn Fn(FrameSourceTypes) -> Result<Box<dyn Acquisition>> + Send + Sync>;

static PLATFORM: RwLock<Option<Factory>> = RwLock::new(None);

/// Make `api` the device runtime every later `kinect2_init` opens against.
pub fn install_platform<A>(api: A)
where
    A: KinectApi + Send + Sync + 'static,
    Kinect<A::Sensor>: Send + 'static,
{
    let factory: Factory = Box::new(move |flags| {
        let kinect = Kinect::open(&api, flags)?;
        Ok(Box::new(kinect) as Box<dyn Acquisition>)
    });
    *PLATFORM.write().unwrap_or_else(PoisonError::into_inner) = Some(factory);
    debug!("Platform installed");
}

/// Remove the installed runtime. Existing instances keep working.
pub fn uninstall_platform() -> bool {
    PLATFORM.write().unwrap_or_else(PoisonError::into_inner).take().is_some()
}

/// Opaque handle returned by [`kinect2_init`].
pub struct Instance {
    pipeline: Box<dyn Acquisition>,
}

fn open_instance(flags: FrameSourceTypes) -> Result<Instance> {
    let platform = PLATFORM.read().unwrap_or_else(PoisonError::into_inner);
    let factory = platform
        .as_ref()
        .ok_or(KinectError::SensorNotFound { source: HResult::E_NOTIMPL })?;
    Ok(Instance { pipeline: factory(flags)? })
}

/// Open the sensor and a reader for `flags`. Returns null on any failure.
#[unsafe(no_mangle)]
pub extern "C" fn kinect2_init(flags: u32) -> *mut Instance {
    let flags = FrameSourceTypes::from_bits(flags);
    match catch_unwind(|| open_instance(flags)) {
        Ok(Ok(instance)) => {
            debug!(%flags, "Instance created");
            Box::into_raw(Box::new(instance))
        }
        Ok(Err(e)) => {
            error!(%flags, error = %e, "Instance creation failed");
            ptr::null_mut()
        }
        Err(_) => {
            error!(%flags, "Instance creation panicked");
            ptr::null_mut()
        }
    }
}

/// Release an instance and everything it owns.
///
/// # Safety
///
/// `instance` must be null or a pointer returned by [`kinect2_init`] that
/// has not been released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kinect2_release(instance: *mut Instance) {
    if instance.is_null() {
        return;
    }
    // SAFETY: the caller hands back ownership of a pointer from kinect2_init.
    let instance = unsafe { Box::from_raw(instance) };
    if catch_unwind(AssertUnwindSafe(move || drop(instance))).is_err() {
        error!("Instance teardown panicked");
    }
}

/// Install, replace, or with null remove the body callback.
///
/// # Safety
///
/// `instance` must be null or a live pointer from [`kinect2_init`], not used
/// concurrently from another thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kinect2_body_callback(instance: *mut Instance, callback: CBodyCallback) {
    // SAFETY: the caller guarantees a live, exclusively used instance.
    let Some(instance) = (unsafe { instance.as_mut() }) else {
        warn!("Body callback registered on a null instance");
        return;
    };
    let callback = callback.map(|cb| -> BodyCallback {
        Box::new(move |data| {
            // SAFETY: the pointer and count describe `data.bodies`, which
            // outlives the call.
            unsafe { cb(data.bodies.as_ptr(), data.bodies.len() as c_uint) }
        })
    });
    instance.pipeline.set_body_callback(callback);
}

/// Install, replace, or with null remove the color callback.
///
/// # Safety
///
/// Same contract as [`kinect2_body_callback`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kinect2_color_callback(instance: *mut Instance, callback: CColorCallback) {
    // SAFETY: the caller guarantees a live, exclusively used instance.
    let Some(instance) = (unsafe { instance.as_mut() }) else {
        warn!("Color callback registered on a null instance");
        return;
    };
    let callback = callback.map(|cb| -> ColorCallback {
        Box::new(move |image| {
            let image = CColorImage {
                width: image.width as c_int,
                height: image.height as c_int,
                data: image.pixels.as_ptr(),
            };
            // SAFETY: `data` points at width * height pixels that stay valid
            // for the duration of the call.
            unsafe { cb(image) }
        })
    });
    instance.pipeline.set_color_callback(callback);
}

/// Run one acquisition cycle. Failures are logged and no callback fires.
///
/// # Safety
///
/// Same contract as [`kinect2_body_callback`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kinect2_update(instance: *mut Instance) {
    // SAFETY: the caller guarantees a live, exclusively used instance.
    let Some(instance) = (unsafe { instance.as_mut() }) else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| instance.pipeline.update())).is_err() {
        error!("Acquisition cycle panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::mock::{MockBodies, MockColor, MockFrame, MockKinect, MockSlot};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI32, AtomicU32, AtomicUsize, Ordering};

    // The installed platform is process-wide.
    static SERIAL: Mutex<()> = Mutex::new(());

    static BODY_CALLS: AtomicUsize = AtomicUsize::new(0);
    static BODY_COUNT_SEEN: AtomicU32 = AtomicU32::new(0);
    static FIRST_INDEX: AtomicU32 = AtomicU32::new(u32::MAX);
    static COLOR_CALLS: AtomicUsize = AtomicUsize::new(0);
    static COLOR_WIDTH: AtomicI32 = AtomicI32::new(0);
    static FIRST_BLUE: AtomicU32 = AtomicU32::new(u32::MAX);

    unsafe extern "C" fn on_bodies(data: *const CBody, size: c_uint) {
        BODY_CALLS.fetch_add(1, Ordering::SeqCst);
        BODY_COUNT_SEEN.store(size, Ordering::SeqCst);
        if size > 0 {
            // SAFETY: the pipeline passes a valid array of `size` bodies.
            let first = unsafe { &*data };
            FIRST_INDEX.store(first.index, Ordering::SeqCst);
        }
    }

    unsafe extern "C" fn on_color(image: CColorImage) {
        COLOR_CALLS.fetch_add(1, Ordering::SeqCst);
        COLOR_WIDTH.store(image.width, Ordering::SeqCst);
        // SAFETY: at least one pixel is valid for non-empty images.
        let first = unsafe { *image.data };
        FIRST_BLUE.store(first.b as u32, Ordering::SeqCst);
    }

    fn reset_counters() {
        BODY_CALLS.store(0, Ordering::SeqCst);
        COLOR_CALLS.store(0, Ordering::SeqCst);
    }

    fn scene() -> MockFrame {
        MockFrame::new().with_color(MockColor::bgra(3, 2)).with_bodies(
            MockBodies::empty().with_slot(0, MockSlot::Untracked).with_slot(2, MockSlot::tracked(0.1)),
        )
    }

    #[test]
    fn init_without_platform_returns_null() {
        let _guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        uninstall_platform();
        assert!(kinect2_init(FrameSourceTypes::BODY.bits()).is_null());
    }

    #[test]
    fn init_without_sensor_returns_null() {
        let _guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        let api = MockKinect::without_sensor();
        install_platform(api.clone());

        assert!(kinect2_init(0x21).is_null());
        assert_eq!(api.ledger().total_acquired(), 0);
        uninstall_platform();
    }

    #[test]
    fn full_lifecycle_delivers_through_c_callbacks() {
        let _guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
        reset_counters();
        let api = MockKinect::new();
        install_platform(api.clone());

        let instance = kinect2_init((FrameSourceTypes::COLOR | FrameSourceTypes::BODY).bits());
        assert!(!instance.is_null());

        unsafe {
            kinect2_body_callback(instance, Some(on_bodies));
            kinect2_color_callback(instance, Some(on_color));
        }
        api.push_frame(scene());
        unsafe { kinect2_update(instance) };

        assert_eq!(BODY_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(BODY_COUNT_SEEN.load(Ordering::SeqCst), 1);
        assert_eq!(FIRST_INDEX.load(Ordering::SeqCst), 2);
        assert_eq!(COLOR_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(COLOR_WIDTH.load(Ordering::SeqCst), 3);
        assert_eq!(FIRST_BLUE.load(Ordering::SeqCst), 0);

        unsafe {
            kinect2_color_callback(instance, None);
        }
        api.push_frame(scene());
        unsafe { kinect2_update(instance) };
        assert_eq!(BODY_CALLS.load(Ordering::SeqCst), 2);
        assert_eq!(COLOR_CALLS.load(Ordering::SeqCst), 1);

        unsafe { kinect2_release(instance) };
        assert!(api.ledger().is_balanced());
        assert!(!api.is_sensor_open());
        uninstall_platform();
    }

    #[test]
    fn null_instance_calls_are_ignored() {
        unsafe {
            kinect2_body_callback(ptr::null_mut(), Some(on_bodies));
            kinect2_color_callback(ptr::null_mut(), None);
            kinect2_update(ptr::null_mut());
            kinect2_release(ptr::null_mut());
        }
    }

    #[test]
    fn color_image_matches_c_layout() {
        assert_eq!(std::mem::size_of::<CColorImage>(), 8 + std::mem::size_of::<*const Bgra>());
        assert_eq!(std::mem::offset_of!(CColorImage, data), 8);
        assert_eq!(std::mem::offset_of!(CBody, joints), 4);
    }
}
